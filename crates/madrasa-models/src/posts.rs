use chrono::{DateTime, Utc};
use madrasa_core::serde::{deserialize_optional_bool, deserialize_optional_string};
use madrasa_core::{PaginationMeta, PaginationParams};
use madrasa_media::{SlotColumns, SlotRef};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::ids::{PostId, SchoolId};
use crate::slots::{self, HasSlots, slot_columns};

/// A news post or announcement published by a school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Post {
    pub id: PostId,
    pub school_id: SchoolId,
    pub title: String,
    pub body: String,
    pub published: bool,

    pub image_url: Option<String>,
    pub image_object_key: Option<String>,
    pub image_url_old: Option<String>,
    pub image_object_key_old: Option<String>,
    pub image_delete_pending_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HasSlots for Post {
    const SLOTS: &'static [SlotRef] = &[slots::POST_IMAGE];

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
pub struct CreatePostDto {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub published: bool,
}

/// Partial update of a post. The `image` slot accepts a file part named
/// `image`, or `image_url` with an optional `image_object_key`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePostDto {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub published: Option<bool>,
}

impl UpdatePostDto {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.published.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PostFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub published: Option<bool>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedPostsResponse {
    pub data: Vec<Post>,
    pub meta: PaginationMeta,
}
