use chrono::{DateTime, Utc};
use madrasa_core::serde::deserialize_optional_string;
use madrasa_core::{PaginationMeta, PaginationParams};
use madrasa_media::{SlotColumns, SlotRef};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::ids::{SchoolId, SubjectId};
use crate::slots::{self, HasSlots, slot_columns};

/// A subject taught at a school, e.g. Tajweed or Arabic grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Subject {
    pub id: SubjectId,
    pub school_id: SchoolId,
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,

    pub image_url: Option<String>,
    pub image_object_key: Option<String>,
    pub image_url_old: Option<String>,
    pub image_object_key_old: Option<String>,
    pub image_delete_pending_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HasSlots for Subject {
    const SLOTS: &'static [SlotRef] = &[slots::SUBJECT_IMAGE];

    fn slot_columns(&self, slot: &str) -> Option<SlotColumns> {
        (slot == "image").then(|| {
            slot_columns!(
                self,
                image_url,
                image_object_key,
                image_url_old,
                image_object_key_old,
                image_delete_pending_until
            )
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateSubjectDto {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 32))]
    pub code: Option<String>,
    pub description: Option<String>,
}

/// Partial update of a subject. The `image` slot accepts a file part named
/// `image`, or `image_url` with an optional `image_object_key`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSubjectDto {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(max = 32))]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub description: Option<String>,
}

impl UpdateSubjectDto {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.code.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubjectFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedSubjectsResponse {
    pub data: Vec<Subject>,
    pub meta: PaginationMeta,
}
