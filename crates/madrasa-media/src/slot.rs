use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored object as referenced by a slot: the URL clients render and the
/// key the storage backend addresses it by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetPointer {
    pub url: String,
    pub object_key: String,
}

impl AssetPointer {
    pub fn new(url: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            object_key: object_key.into(),
        }
    }

    /// Two pointers name the same stored object when either the URL or the
    /// key matches.
    pub fn same_object(&self, other: &AssetPointer) -> bool {
        self.url == other.url || self.object_key == other.object_key
    }
}

/// A displaced asset kept until `delete_pending_until`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedAsset {
    pub asset: AssetPointer,
    pub delete_pending_until: DateTime<Utc>,
}

impl RetainedAsset {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.delete_pending_until <= now
    }
}

/// The two positions of a media slot.
///
/// Holding each position as an `Option` of a complete value makes half-set
/// positions unrepresentable; [`SlotState::check`] covers the one rule the
/// types cannot, that current and old never name the same asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotState {
    pub current: Option<AssetPointer>,
    pub old: Option<RetainedAsset>,
}

impl SlotState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_current(url: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            current: Some(AssetPointer::new(url, object_key)),
            old: None,
        }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current.as_ref().map(|a| a.url.as_str())
    }

    pub fn old_url(&self) -> Option<&str> {
        self.old.as_ref().map(|o| o.asset.url.as_str())
    }

    pub fn delete_pending_until(&self) -> Option<DateTime<Utc>> {
        self.old.as_ref().map(|o| o.delete_pending_until)
    }

    /// True when either position points at `object_key`.
    pub fn references_key(&self, object_key: &str) -> bool {
        self.current
            .as_ref()
            .is_some_and(|a| a.object_key == object_key)
            || self
                .old
                .as_ref()
                .is_some_and(|o| o.asset.object_key == object_key)
    }

    pub fn check(&self) -> Result<(), SlotStateError> {
        if let (Some(current), Some(old)) = (&self.current, &self.old)
            && current.same_object(&old.asset)
        {
            return Err(SlotStateError::CurrentEqualsOld);
        }
        Ok(())
    }

    pub fn to_columns(&self) -> SlotColumns {
        SlotColumns {
            url: self.current.as_ref().map(|a| a.url.clone()),
            object_key: self.current.as_ref().map(|a| a.object_key.clone()),
            url_old: self.old.as_ref().map(|o| o.asset.url.clone()),
            object_key_old: self.old.as_ref().map(|o| o.asset.object_key.clone()),
            delete_pending_until: self.delete_pending_until(),
        }
    }
}

/// The five nullable columns a slot is stored in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotColumns {
    pub url: Option<String>,
    pub object_key: Option<String>,
    pub url_old: Option<String>,
    pub object_key_old: Option<String>,
    pub delete_pending_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SlotStateError {
    #[error("current url and object key must be set together")]
    PartialCurrent,
    #[error("old url and old object key must be set together")]
    PartialOld,
    #[error("delete_pending_until must be set exactly when an old asset is retained")]
    PendingMismatch,
    #[error("current and old asset must differ")]
    CurrentEqualsOld,
}

impl TryFrom<SlotColumns> for SlotState {
    type Error = SlotStateError;

    fn try_from(cols: SlotColumns) -> Result<Self, Self::Error> {
        let current = match (cols.url, cols.object_key) {
            (Some(url), Some(object_key)) => Some(AssetPointer { url, object_key }),
            (None, None) => None,
            _ => return Err(SlotStateError::PartialCurrent),
        };

        let old = match (cols.url_old, cols.object_key_old, cols.delete_pending_until) {
            (Some(url), Some(object_key), Some(delete_pending_until)) => Some(RetainedAsset {
                asset: AssetPointer { url, object_key },
                delete_pending_until,
            }),
            (None, None, None) => None,
            (Some(_), Some(_), None) | (None, None, Some(_)) => {
                return Err(SlotStateError::PendingMismatch);
            }
            _ => return Err(SlotStateError::PartialOld),
        };

        let state = SlotState { current, old };
        state.check()?;
        Ok(state)
    }
}

/// A media slot column group on a table, e.g. `schools.logo`.
///
/// Columns are named `{slot}_url`, `{slot}_object_key`, `{slot}_url_old`,
/// `{slot}_object_key_old` and `{slot}_delete_pending_until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SlotRef {
    pub table: &'static str,
    pub slot: &'static str,
    /// Column holding the owning school, for tables nested under a school.
    pub tenant_column: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotField {
    Url,
    ObjectKey,
    UrlOld,
    ObjectKeyOld,
    DeletePendingUntil,
}

impl SlotField {
    pub const ALL: [SlotField; 5] = [
        SlotField::Url,
        SlotField::ObjectKey,
        SlotField::UrlOld,
        SlotField::ObjectKeyOld,
        SlotField::DeletePendingUntil,
    ];

    fn suffix(self) -> &'static str {
        match self {
            SlotField::Url => "url",
            SlotField::ObjectKey => "object_key",
            SlotField::UrlOld => "url_old",
            SlotField::ObjectKeyOld => "object_key_old",
            SlotField::DeletePendingUntil => "delete_pending_until",
        }
    }
}

impl SlotRef {
    pub const fn new(table: &'static str, slot: &'static str) -> Self {
        Self {
            table,
            slot,
            tenant_column: None,
        }
    }

    pub const fn scoped(
        table: &'static str,
        slot: &'static str,
        tenant_column: &'static str,
    ) -> Self {
        Self {
            table,
            slot,
            tenant_column: Some(tenant_column),
        }
    }

    pub fn column(&self, field: SlotField) -> String {
        format!("{}_{}", self.slot, field.suffix())
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.slot)
    }
}

/// One slot on one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SlotTarget {
    pub slot: SlotRef,
    pub entity_id: Uuid,
    /// Owning school; required when `slot.tenant_column` is set.
    pub tenant_id: Option<Uuid>,
}

impl SlotTarget {
    pub fn new(slot: SlotRef, entity_id: Uuid) -> Self {
        Self {
            slot,
            entity_id,
            tenant_id: None,
        }
    }

    pub fn scoped(slot: SlotRef, entity_id: Uuid, tenant_id: Uuid) -> Self {
        Self {
            slot,
            entity_id,
            tenant_id: Some(tenant_id),
        }
    }

    /// Storage key prefix for uploads into this slot.
    pub fn key_prefix(&self) -> String {
        match self.tenant_id {
            Some(tenant) => format!(
                "schools/{}/{}/{}/{}",
                tenant, self.slot.table, self.entity_id, self.slot.slot
            ),
            None => format!("{}/{}/{}", self.slot.table, self.entity_id, self.slot.slot),
        }
    }

    /// Key namespace of the school the slot belongs to.
    fn tenant_namespace(&self) -> String {
        match self.tenant_id {
            Some(tenant) => format!("schools/{tenant}/"),
            None => format!("{}/{}/", self.slot.table, self.entity_id),
        }
    }

    /// False when `object_key` lies under another school's uploads, either
    /// directly or inside the trash.
    pub fn may_reference(&self, object_key: &str) -> bool {
        if object_key.split('/').any(|segment| segment == "..") {
            return false;
        }
        let key = object_key
            .strip_prefix(".trash/")
            .and_then(|rest| rest.split_once('/'))
            .map_or(object_key, |(_, key)| key);
        !key.starts_with("schools/") || key.starts_with(&self.tenant_namespace())
    }
}

impl fmt::Display for SlotTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.slot, self.entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
    }

    fn cols(
        url: Option<&str>,
        key: Option<&str>,
        url_old: Option<&str>,
        key_old: Option<&str>,
        pending: Option<DateTime<Utc>>,
    ) -> SlotColumns {
        SlotColumns {
            url: url.map(String::from),
            object_key: key.map(String::from),
            url_old: url_old.map(String::from),
            object_key_old: key_old.map(String::from),
            delete_pending_until: pending,
        }
    }

    #[test]
    fn test_columns_to_state() {
        let state = SlotState::try_from(cols(
            Some("u2"),
            Some("k2"),
            Some("u1"),
            Some("k1"),
            Some(at(31)),
        ))
        .unwrap();
        assert_eq!(state.current_url(), Some("u2"));
        assert_eq!(state.old_url(), Some("u1"));
        assert_eq!(state.delete_pending_until(), Some(at(31)));
        assert_eq!(state.to_columns().object_key_old.as_deref(), Some("k1"));
    }

    #[test]
    fn test_empty_columns_are_empty_state() {
        let state = SlotState::try_from(SlotColumns::default()).unwrap();
        assert_eq!(state, SlotState::empty());
    }

    #[test]
    fn test_rejects_half_set_positions() {
        assert_eq!(
            SlotState::try_from(cols(Some("u"), None, None, None, None)),
            Err(SlotStateError::PartialCurrent)
        );
        assert_eq!(
            SlotState::try_from(cols(None, None, Some("u"), None, Some(at(1)))),
            Err(SlotStateError::PartialOld)
        );
    }

    #[test]
    fn test_rejects_pending_mismatch() {
        assert_eq!(
            SlotState::try_from(cols(None, None, Some("u"), Some("k"), None)),
            Err(SlotStateError::PendingMismatch)
        );
        assert_eq!(
            SlotState::try_from(cols(None, None, None, None, Some(at(1)))),
            Err(SlotStateError::PendingMismatch)
        );
    }

    #[test]
    fn test_rejects_current_equal_to_old() {
        assert_eq!(
            SlotState::try_from(cols(Some("u"), Some("k"), Some("u"), Some("k2"), Some(at(1)))),
            Err(SlotStateError::CurrentEqualsOld)
        );
    }

    #[test]
    fn test_column_names_and_key_prefix() {
        let logo = SlotRef::new("schools", "logo");
        assert_eq!(logo.column(SlotField::Url), "logo_url");
        assert_eq!(
            logo.column(SlotField::DeletePendingUntil),
            "logo_delete_pending_until"
        );
        assert_eq!(logo.to_string(), "schools.logo");

        let id = Uuid::nil();
        assert_eq!(
            SlotTarget::new(logo, id).key_prefix(),
            format!("schools/{id}/logo")
        );

        let image = SlotRef::scoped("posts", "image", "school_id");
        assert_eq!(
            SlotTarget::scoped(image, id, id).key_prefix(),
            format!("schools/{id}/posts/{id}/image")
        );
    }

    #[test]
    fn test_may_reference_only_own_school_keys() {
        let school = Uuid::new_v4();
        let other = Uuid::new_v4();
        let image = SlotRef::scoped("posts", "image", "school_id");
        let target = SlotTarget::scoped(image, Uuid::new_v4(), school);

        assert!(target.may_reference(&format!("schools/{school}/posts/x/image/a.png")));
        assert!(target.may_reference(&format!(".trash/30d/schools/{school}/logo/a.png")));
        assert!(target.may_reference("library/crest.png"));
        assert!(!target.may_reference(&format!("schools/{other}/logo/a.png")));
        assert!(!target.may_reference(&format!(".trash/30d/schools/{other}/logo/a.png")));
        assert!(!target.may_reference(&format!("schools/{school}/../{other}/logo/a.png")));

        let logo = SlotTarget::new(SlotRef::new("schools", "logo"), school);
        assert!(logo.may_reference(&format!("schools/{school}/icon/a.png")));
        assert!(!logo.may_reference(&format!("schools/{other}/icon/a.png")));
    }
}
