use chrono::{DateTime, Utc};
use madrasa_media::{DueAsset, Outcome, ReplacementReceipt, SweepReport};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// What happened to one slot during an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SlotReceipt {
    pub slot: String,
    /// `unchanged`, `rekeyed`, `replaced` or `cleared`
    pub outcome: String,
    pub uploaded_image_url: Option<String>,
    /// Trash location of the displaced asset, empty if it was not moved
    pub moved_old_image_url: Option<String>,
    /// Non-fatal storage failures
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SlotReceipt {
    pub fn new(slot: &str, receipt: &ReplacementReceipt) -> Self {
        Self {
            slot: slot.to_string(),
            outcome: receipt.outcome.as_str().to_string(),
            uploaded_image_url: receipt.uploaded_image_url.clone(),
            moved_old_image_url: receipt.moved_old_image_url.clone(),
            warnings: receipt
                .failures
                .iter()
                .map(|f| format!("{} of {} failed: {}", f.kind, f.url, f.reason))
                .collect(),
        }
    }

    pub fn changed(&self) -> bool {
        self.outcome != Outcome::Unchanged.as_str()
    }
}

/// An updated entity plus the media receipts of the update.
///
/// `uploaded_image_url` and `moved_old_image_url` repeat the first slot
/// receipt that carries them, for single-slot clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MediaUpdateResponse<T> {
    #[serde(flatten)]
    pub data: T,
    pub uploaded_image_url: Option<String>,
    pub moved_old_image_url: Option<String>,
    pub media: Vec<SlotReceipt>,
}

impl<T> MediaUpdateResponse<T> {
    pub fn new(data: T, media: Vec<SlotReceipt>) -> Self {
        Self {
            data,
            uploaded_image_url: media.iter().find_map(|r| r.uploaded_image_url.clone()),
            moved_old_image_url: media.iter().find_map(|r| r.moved_old_image_url.clone()),
            media,
        }
    }
}

/// An old asset whose retention window has elapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DueAssetView {
    pub table: String,
    pub slot: String,
    pub entity_id: Uuid,
    pub school_id: Option<Uuid>,
    pub url: String,
    pub object_key: String,
    pub delete_pending_until: DateTime<Utc>,
}

impl From<&DueAsset> for DueAssetView {
    fn from(due: &DueAsset) -> Self {
        Self {
            table: due.target.slot.table.to_string(),
            slot: due.target.slot.slot.to_string(),
            entity_id: due.target.entity_id,
            school_id: due.target.tenant_id,
            url: due.asset.url.clone(),
            object_key: due.asset.object_key.clone(),
            delete_pending_until: due.delete_pending_until,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DueAssetsResponse {
    pub data: Vec<DueAssetView>,
}

/// Result of one retention sweep.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SweepResponse {
    pub reclaimed: usize,
    /// Cleared by a concurrent writer between selection and clearing
    pub skipped: usize,
    /// Kept for the next sweep
    pub failed: Vec<DueAssetView>,
}

impl From<&SweepReport> for SweepResponse {
    fn from(report: &SweepReport) -> Self {
        Self {
            reclaimed: report.reclaimed,
            skipped: report.skipped,
            failed: report.failed.iter().map(DueAssetView::from).collect(),
        }
    }
}
