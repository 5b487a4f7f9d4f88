use chrono::{DateTime, Utc};
use madrasa_core::{PaginationMeta, PaginationParams};
use madrasa_core::serde::deserialize_optional_string;
use madrasa_media::{SlotColumns, SlotRef};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::ids::SchoolId;
use crate::slots::{self, HasSlots, slot_columns};

/// A school or mosque. Schools are the tenant boundary; every other entity
/// belongs to exactly one school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,

    pub icon_url: Option<String>,
    pub icon_object_key: Option<String>,
    pub icon_url_old: Option<String>,
    pub icon_object_key_old: Option<String>,
    pub icon_delete_pending_until: Option<DateTime<Utc>>,

    pub logo_url: Option<String>,
    pub logo_object_key: Option<String>,
    pub logo_url_old: Option<String>,
    pub logo_object_key_old: Option<String>,
    pub logo_delete_pending_until: Option<DateTime<Utc>>,

    pub background_url: Option<String>,
    pub background_object_key: Option<String>,
    pub background_url_old: Option<String>,
    pub background_object_key_old: Option<String>,
    pub background_delete_pending_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HasSlots for School {
    const SLOTS: &'static [SlotRef] = &[
        slots::SCHOOL_ICON,
        slots::SCHOOL_LOGO,
        slots::SCHOOL_BACKGROUND,
    ];

    fn slot_columns(&self, slot: &str) -> Option<SlotColumns> {
        match slot {
            "icon" => Some(slot_columns!(
                self,
                icon_url,
                icon_object_key,
                icon_url_old,
                icon_object_key_old,
                icon_delete_pending_until
            )),
            "logo" => Some(slot_columns!(
                self,
                logo_url,
                logo_object_key,
                logo_url_old,
                logo_object_key_old,
                logo_delete_pending_until
            )),
            "background" => Some(slot_columns!(
                self,
                background_url,
                background_object_key,
                background_url_old,
                background_object_key_old,
                background_delete_pending_until
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateSchoolDto {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

/// Partial update of a school.
///
/// Sent as JSON or as multipart form data. Besides these fields, each media
/// slot (`icon`, `logo`, `background`) accepts a file part named after the
/// slot, or `{slot}_url` with an optional `{slot}_object_key`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSchoolDto {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

impl UpdateSchoolDto {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none() && self.phone.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SchoolFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedSchoolsResponse {
    pub data: Vec<School>,
    pub meta: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use madrasa_media::SlotState;
    use uuid::Uuid;

    fn school() -> School {
        let now = Utc::now();
        School {
            id: SchoolId::from(Uuid::new_v4()),
            name: "Al-Noor".to_string(),
            address: None,
            phone: None,
            icon_url: None,
            icon_object_key: None,
            icon_url_old: None,
            icon_object_key_old: None,
            icon_delete_pending_until: None,
            logo_url: Some("https://cdn.test/l2.png".to_string()),
            logo_object_key: Some("l2".to_string()),
            logo_url_old: Some("https://cdn.test/l1.png".to_string()),
            logo_object_key_old: Some("l1".to_string()),
            logo_delete_pending_until: Some(now),
            background_url: Some("https://cdn.test/b.png".to_string()),
            background_object_key: None,
            background_url_old: None,
            background_object_key_old: None,
            background_delete_pending_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_slot_states_skip_inconsistent_columns() {
        let states = school().slot_states();
        let names: Vec<_> = states.iter().map(|(slot, _)| slot.slot).collect();
        // background has a url without a key
        assert_eq!(names, vec!["icon", "logo"]);
        assert_eq!(states[0].1, SlotState::empty());
        assert_eq!(states[1].1.old_url(), Some("https://cdn.test/l1.png"));
    }

    #[test]
    fn test_slot_lookup() {
        assert_eq!(School::slot("logo"), Some(slots::SCHOOL_LOGO));
        assert_eq!(School::slot("image"), None);
    }

    #[test]
    fn test_update_dto_treats_blank_as_absent() {
        let dto: UpdateSchoolDto =
            serde_json::from_str(r#"{"name": "", "address": "12 Mosque Rd"}"#).unwrap();
        assert_eq!(dto.name, None);
        assert_eq!(dto.address.as_deref(), Some("12 Mosque Rd"));
        assert!(!dto.is_empty());
    }

    #[test]
    fn test_create_dto_validation() {
        let dto = CreateSchoolDto {
            name: String::new(),
            address: None,
            phone: None,
        };
        assert!(dto.validate().is_err());
    }
}
