//! Registry of media slot columns.
//!
//! Every image-bearing column group in the schema is listed here once; the
//! Postgres slot store and the sweeper iterate [`ALL`].

use madrasa_media::{SlotColumns, SlotRef, SlotState};

pub const SCHOOL_ICON: SlotRef = SlotRef::new("schools", "icon");
pub const SCHOOL_LOGO: SlotRef = SlotRef::new("schools", "logo");
pub const SCHOOL_BACKGROUND: SlotRef = SlotRef::new("schools", "background");
pub const SUBJECT_IMAGE: SlotRef = SlotRef::scoped("subjects", "image", "school_id");
pub const POST_IMAGE: SlotRef = SlotRef::scoped("posts", "image", "school_id");
pub const SERVICE_PLAN_IMAGE: SlotRef = SlotRef::scoped("service_plans", "image", "school_id");

pub const ALL: &[SlotRef] = &[
    SCHOOL_ICON,
    SCHOOL_LOGO,
    SCHOOL_BACKGROUND,
    SUBJECT_IMAGE,
    POST_IMAGE,
    SERVICE_PLAN_IMAGE,
];

pub fn find(table: &str, slot: &str) -> Option<SlotRef> {
    ALL.iter()
        .copied()
        .find(|s| s.table == table && s.slot == slot)
}

/// Read access to the slot columns of an entity row.
pub trait HasSlots {
    const SLOTS: &'static [SlotRef];

    fn slot_columns(&self, slot: &str) -> Option<SlotColumns>;

    /// Valid slot states of this row. Slots whose columns violate the slot
    /// invariants are left out.
    fn slot_states(&self) -> Vec<(SlotRef, SlotState)> {
        Self::SLOTS
            .iter()
            .filter_map(|slot| {
                let columns = self.slot_columns(slot.slot)?;
                SlotState::try_from(columns).ok().map(|state| (*slot, state))
            })
            .collect()
    }

    fn slot(name: &str) -> Option<SlotRef> {
        Self::SLOTS.iter().copied().find(|s| s.slot == name)
    }
}

/// Builds [`SlotColumns`] from the five `{slot}_*` fields of a row.
macro_rules! slot_columns {
    ($row:expr, $url:ident, $key:ident, $url_old:ident, $key_old:ident, $pending:ident) => {
        ::madrasa_media::SlotColumns {
            url: $row.$url.clone(),
            object_key: $row.$key.clone(),
            url_old: $row.$url_old.clone(),
            object_key_old: $row.$key_old.clone(),
            delete_pending_until: $row.$pending,
        }
    };
}

pub(crate) use slot_columns;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        assert_eq!(find("schools", "logo"), Some(SCHOOL_LOGO));
        assert_eq!(find("posts", "image"), Some(POST_IMAGE));
        assert_eq!(find("posts", "logo"), None);
    }

    #[test]
    fn test_scoped_slots_name_their_tenant_column() {
        for slot in ALL {
            if slot.table == "schools" {
                assert_eq!(slot.tenant_column, None);
            } else {
                assert_eq!(slot.tenant_column, Some("school_id"));
            }
        }
    }
}
