use chrono::{DateTime, Utc};
use madrasa_core::serde::{deserialize_optional_i64, deserialize_optional_string};
use madrasa_core::{PaginationMeta, PaginationParams};
use madrasa_media::{SlotColumns, SlotRef};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::ids::{SchoolId, ServicePlanId};
use crate::slots::{self, HasSlots, slot_columns};

/// A paid plan a school offers (tuition tier, Quran class package, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ServicePlan {
    pub id: ServicePlanId,
    pub school_id: SchoolId,
    pub name: String,
    pub description: Option<String>,
    /// Price in the smallest currency unit
    pub price_cents: i64,
    /// ISO 4217 code
    pub currency: String,

    pub image_url: Option<String>,
    pub image_object_key: Option<String>,
    pub image_url_old: Option<String>,
    pub image_object_key_old: Option<String>,
    pub image_delete_pending_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HasSlots for ServicePlan {
    const SLOTS: &'static [SlotRef] = &[slots::SERVICE_PLAN_IMAGE];

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

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateServicePlanDto {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price_cents: i64,
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub currency: String,
}

/// Partial update of a service plan. The `image` slot accepts a file part
/// named `image`, or `image_url` with an optional `image_object_key`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateServicePlanDto {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    #[validate(range(min = 0))]
    pub price_cents: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
}

impl UpdateServicePlanDto {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price_cents.is_none()
            && self.currency.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ServicePlanFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedServicePlansResponse {
    pub data: Vec<ServicePlan>,
    pub meta: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipart_style_price() {
        let dto: UpdateServicePlanDto =
            serde_json::from_str(r#"{"price_cents": "2500", "currency": ""}"#).unwrap();
        assert_eq!(dto.price_cents, Some(2500));
        assert_eq!(dto.currency, None);
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_negative_price_rejected() {
        let dto = CreateServicePlanDto {
            name: "Hifz".to_string(),
            description: None,
            price_cents: -1,
            currency: "USD".to_string(),
        };
        assert!(dto.validate().is_err());
    }
}
