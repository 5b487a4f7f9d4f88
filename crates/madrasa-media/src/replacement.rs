//! Orchestration of a slot replacement.
//!
//! A replacement runs in three phases so that callers updating several slots
//! of one row can persist them in a single statement:
//!
//! 1. [`AssetReplacementService::prepare`] uploads the incoming file (if any),
//!    loads the slot and computes the [`Transition`].
//! 2. The caller persists every prepared slot, conditional on the state that
//!    was loaded. [`AssetReplacementService::commit`] does this for one slot.
//! 3. [`AssetReplacementService::finish`] runs the storage side effects of a
//!    persisted transition. If persisting failed, the caller hands the
//!    prepared slot to [`AssetReplacementService::abandon`] instead, which
//!    removes the orphaned upload.
//!
//! Side effects never fail the request: a failed trash move or deletion is
//! logged, counted and reported on the [`ReplacementReceipt`].

use std::sync::Arc;
use std::time::Duration;

use madrasa_core::{ObjectStorage, StoredObject, UploadedFile};
use madrasa_observability::{track_side_effect, track_transition, track_upload};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::clock::Clock;
use crate::error::MediaError;
use crate::resolver::ObjectKeyResolver;
use crate::slot::{AssetPointer, SlotState, SlotTarget};
use crate::store::SlotStore;
use crate::transition::{self, Intent, Outcome, Retention, SideEffect, Transition};

/// A client-supplied pointer to an already stored asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitAsset {
    pub url: String,
    /// Derived from `url` when absent.
    pub object_key: Option<String>,
}

/// Requested change to one slot.
#[derive(Debug, Clone)]
pub enum SlotChange {
    Upload(UploadedFile),
    Explicit(ExplicitAsset),
    Clear,
}

#[derive(Debug, Clone)]
pub struct ReplacementPolicy {
    pub retention: Retention,
    /// Passed to the storage backend when trashing a displaced asset.
    pub trash_retention_days: u32,
    pub upload_timeout: Duration,
}

impl Default for ReplacementPolicy {
    fn default() -> Self {
        Self {
            retention: Retention::days(30),
            trash_retention_days: 30,
            upload_timeout: Duration::from_secs(45),
        }
    }
}

/// A computed but not yet applied slot change.
#[derive(Debug, Clone)]
pub struct PreparedSlot {
    pub target: SlotTarget,
    /// State the transition was computed from; the persist guard.
    pub expected: SlotState,
    pub transition: Transition,
    pub uploaded: Option<StoredObject>,
}

impl PreparedSlot {
    pub fn next(&self) -> &SlotState {
        &self.transition.next
    }

    pub fn is_noop(&self) -> bool {
        self.transition.is_noop()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideEffectFailure {
    pub kind: &'static str,
    pub url: String,
    pub reason: String,
}

/// What a replacement did.
#[derive(Debug, Clone, Serialize)]
pub struct ReplacementReceipt {
    /// Slot state after side effects, including relocation of the old asset.
    pub state: SlotState,
    pub outcome: Outcome,
    pub uploaded_image_url: Option<String>,
    /// Where the displaced asset now lives, when it was moved to the trash.
    pub moved_old_image_url: Option<String>,
    pub deleted_object_keys: Vec<String>,
    pub failures: Vec<SideEffectFailure>,
}

pub struct AssetReplacementService {
    storage: Arc<dyn ObjectStorage>,
    store: Arc<dyn SlotStore>,
    resolver: ObjectKeyResolver,
    clock: Arc<dyn Clock>,
    policy: ReplacementPolicy,
}

impl AssetReplacementService {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        store: Arc<dyn SlotStore>,
        clock: Arc<dyn Clock>,
        policy: ReplacementPolicy,
    ) -> Self {
        Self {
            resolver: ObjectKeyResolver::for_storage(storage.clone()),
            storage,
            store,
            clock,
            policy,
        }
    }

    pub fn with_resolver(mut self, resolver: ObjectKeyResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn policy(&self) -> &ReplacementPolicy {
        &self.policy
    }

    pub fn resolver(&self) -> &ObjectKeyResolver {
        &self.resolver
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Prepare, persist and finish a single-slot change.
    #[instrument(skip(self, change), fields(slot = %target.slot, entity.id = %target.entity_id))]
    pub async fn replace(
        &self,
        target: &SlotTarget,
        change: SlotChange,
    ) -> Result<ReplacementReceipt, MediaError> {
        let prepared = self.prepare(target, change).await?;

        if !prepared.is_noop()
            && let Err(e) = self.commit(&prepared).await
        {
            self.abandon(&prepared).await;
            return Err(e);
        }

        Ok(self.finish(prepared).await)
    }

    pub async fn clear(&self, target: &SlotTarget) -> Result<ReplacementReceipt, MediaError> {
        self.replace(target, SlotChange::Clear).await
    }

    #[instrument(skip(self, change), fields(slot = %target.slot, entity.id = %target.entity_id))]
    pub async fn prepare(
        &self,
        target: &SlotTarget,
        change: SlotChange,
    ) -> Result<PreparedSlot, MediaError> {
        let (intent, uploaded) = match change {
            SlotChange::Upload(file) => {
                let stored = self.upload(target, file).await?;
                let pointer = AssetPointer::new(stored.url.clone(), stored.key.clone());
                (Intent::Replace(pointer), Some(stored))
            }
            SlotChange::Explicit(explicit) => {
                (Intent::Replace(self.explicit_pointer(target, explicit)?), None)
            }
            SlotChange::Clear => (Intent::Clear, None),
        };

        let expected = match self.store.load(target).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                self.discard_upload(uploaded.as_ref(), None).await;
                return Err(MediaError::NotFound(target.to_string()));
            }
            Err(e) => {
                error!(error = %e, "Failed to load slot state");
                self.discard_upload(uploaded.as_ref(), None).await;
                return Err(MediaError::LoadFailed(e));
            }
        };

        let transition = transition::compute(
            &expected,
            intent,
            self.policy.retention,
            self.clock.now(),
        );
        track_transition(&target.slot.to_string(), transition.outcome.as_str());
        debug!(
            outcome = transition.outcome.as_str(),
            effects = transition.effects.len(),
            "Computed slot transition"
        );

        Ok(PreparedSlot {
            target: target.clone(),
            expected,
            transition,
            uploaded,
        })
    }

    /// Persist one prepared slot, conditional on its expected state.
    pub async fn commit(&self, prepared: &PreparedSlot) -> Result<(), MediaError> {
        match self
            .store
            .persist(&prepared.target, &prepared.expected, prepared.next())
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(slot = %prepared.target, "Slot changed since it was loaded");
                Err(MediaError::Conflict(prepared.target.to_string()))
            }
            Err(e) => {
                error!(slot = %prepared.target, error = %e, "Failed to persist slot state");
                Err(MediaError::PersistFailed(e))
            }
        }
    }

    /// Clean up after a prepared slot that will not be persisted.
    pub async fn abandon(&self, prepared: &PreparedSlot) {
        self.discard_upload(prepared.uploaded.as_ref(), Some(&prepared.expected))
            .await;
    }

    /// Run the side effects of a persisted transition.
    pub async fn finish(&self, prepared: PreparedSlot) -> ReplacementReceipt {
        let PreparedSlot {
            target,
            transition,
            uploaded,
            ..
        } = prepared;

        let mut receipt = ReplacementReceipt {
            state: transition.next,
            outcome: transition.outcome,
            uploaded_image_url: uploaded.map(|stored| stored.url),
            moved_old_image_url: None,
            deleted_object_keys: Vec::new(),
            failures: Vec::new(),
        };

        for effect in transition.effects {
            let kind = effect.kind();
            match effect {
                SideEffect::DeleteNow(asset) => match self.storage.delete(&asset.object_key).await
                {
                    Ok(()) => {
                        track_side_effect(kind, true);
                        debug!(object_key = %asset.object_key, "Deleted displaced asset");
                        receipt.deleted_object_keys.push(asset.object_key);
                    }
                    Err(e) => {
                        track_side_effect(kind, false);
                        warn!(object_key = %asset.object_key, error = %e, "Failed to delete displaced asset");
                        receipt.failures.push(SideEffectFailure {
                            kind,
                            url: asset.url,
                            reason: e.to_string(),
                        });
                    }
                },
                SideEffect::MoveToTrash(asset) => {
                    match self
                        .storage
                        .move_to_trash(&asset.url, self.policy.trash_retention_days)
                        .await
                    {
                        Ok(trash_url) => {
                            track_side_effect(kind, true);
                            self.relocate_old(&target, &asset, &trash_url, &mut receipt.state)
                                .await;
                            receipt.moved_old_image_url = Some(trash_url);
                        }
                        Err(e) => {
                            track_side_effect(kind, false);
                            warn!(url = %asset.url, error = %e, "Failed to move displaced asset to trash");
                            receipt.failures.push(SideEffectFailure {
                                kind,
                                url: asset.url,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        info!(
            slot = %target,
            outcome = receipt.outcome.as_str(),
            failures = receipt.failures.len(),
            "Slot replacement finished"
        );

        receipt
    }

    /// Best-effort deletion of every asset a slot references.
    ///
    /// Used when the owning row is deleted.
    pub async fn purge(&self, state: &SlotState) -> Vec<SideEffectFailure> {
        let mut failures = Vec::new();
        let assets = state
            .current
            .iter()
            .chain(state.old.as_ref().map(|old| &old.asset));

        for asset in assets {
            if let Err(e) = self.storage.delete(&asset.object_key).await {
                track_side_effect("delete_now", false);
                warn!(object_key = %asset.object_key, error = %e, "Failed to purge asset");
                failures.push(SideEffectFailure {
                    kind: "delete_now",
                    url: asset.url.clone(),
                    reason: e.to_string(),
                });
            } else {
                track_side_effect("delete_now", true);
            }
        }

        failures
    }

    async fn upload(
        &self,
        target: &SlotTarget,
        file: UploadedFile,
    ) -> Result<StoredObject, MediaError> {
        let slot = target.slot.to_string();
        let prefix = target.key_prefix();
        let timeout = self.policy.upload_timeout;

        match tokio::time::timeout(timeout, self.storage.upload(&prefix, file)).await {
            Ok(Ok(stored)) => {
                track_upload(&slot, true);
                info!(object_key = %stored.key, "Uploaded asset");
                Ok(stored)
            }
            Ok(Err(e)) => {
                track_upload(&slot, false);
                warn!(error = %e, "Upload failed");
                Err(MediaError::UploadFailed(e))
            }
            Err(_) => {
                track_upload(&slot, false);
                warn!(timeout_secs = timeout.as_secs(), "Upload timed out");
                Err(MediaError::UploadTimedOut(timeout))
            }
        }
    }

    /// The pointer named by a client. A supplied key must agree with the key
    /// resolved from the URL, and neither may name another school's object.
    fn explicit_pointer(
        &self,
        target: &SlotTarget,
        explicit: ExplicitAsset,
    ) -> Result<AssetPointer, MediaError> {
        let url = explicit.url.trim();
        if url.is_empty() {
            return Err(MediaError::InvalidRequest(
                "asset url must not be empty".to_string(),
            ));
        }

        let supplied = explicit.object_key.filter(|k| !k.trim().is_empty());
        let object_key = match (supplied, self.resolver.resolve(url)) {
            (Some(key), Ok(resolved)) if key != resolved => {
                return Err(MediaError::InvalidRequest(format!(
                    "object key {key} does not match the key of {url}"
                )));
            }
            (Some(key), _) => key,
            (None, resolved) => resolved?,
        };

        if !target.may_reference(&object_key) {
            warn!(object_key = %object_key, "Rejected object key owned by another school");
            return Err(MediaError::InvalidRequest(format!(
                "object key {object_key} belongs to another school"
            )));
        }

        Ok(AssetPointer::new(url, object_key))
    }

    /// Delete a fresh upload no persisted state points at.
    async fn discard_upload(&self, uploaded: Option<&StoredObject>, still_referenced: Option<&SlotState>) {
        let Some(stored) = uploaded else {
            return;
        };
        if still_referenced.is_some_and(|state| state.references_key(&stored.key)) {
            return;
        }
        match self.storage.delete(&stored.key).await {
            Ok(()) => debug!(object_key = %stored.key, "Discarded orphaned upload"),
            Err(e) => {
                warn!(object_key = %stored.key, error = %e, "Failed to discard orphaned upload")
            }
        }
    }

    /// Point the persisted old position at the trashed copy.
    async fn relocate_old(
        &self,
        target: &SlotTarget,
        displaced: &AssetPointer,
        trash_url: &str,
        state: &mut SlotState,
    ) {
        let trash_key = match self.resolver.resolve(trash_url) {
            Ok(key) => key,
            Err(e) => {
                warn!(url = %trash_url, error = %e, "Trashed copy has no resolvable key, old position left as is");
                return;
            }
        };
        let relocated = AssetPointer::new(trash_url, trash_key);

        match self
            .store
            .relocate_old(target, &displaced.object_key, &relocated)
            .await
        {
            Ok(true) => {
                if let Some(old) = state.old.as_mut()
                    && old.asset.object_key == displaced.object_key
                {
                    old.asset = relocated;
                }
            }
            Ok(false) => debug!(slot = %target, "Old position changed before relocation"),
            Err(e) => warn!(slot = %target, error = %e, "Failed to record trashed location"),
        }
    }
}
