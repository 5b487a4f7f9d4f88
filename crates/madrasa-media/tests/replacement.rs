use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use madrasa_core::UploadedFile;
use madrasa_media::memory::{InMemoryObjectStorage, InMemorySlotStore};
use madrasa_media::{
    AssetPointer, AssetReplacementService, ExplicitAsset, FixedClock, MediaError, Outcome,
    ReplacementPolicy, RetainedAsset, Retention, SlotChange, SlotRef, SlotState, SlotTarget,
};
use uuid::Uuid;

const LOGO: SlotRef = SlotRef::new("schools", "logo");

struct Harness {
    storage: Arc<InMemoryObjectStorage>,
    store: Arc<InMemorySlotStore>,
    clock: Arc<FixedClock>,
    service: AssetReplacementService,
    target: SlotTarget,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn harness(retention: Retention) -> Harness {
    let storage = Arc::new(InMemoryObjectStorage::new());
    let store = Arc::new(InMemorySlotStore::new());
    let clock = Arc::new(FixedClock::new(t0()));
    let policy = ReplacementPolicy {
        retention,
        trash_retention_days: 30,
        upload_timeout: Duration::from_millis(200),
    };
    let service = AssetReplacementService::new(
        storage.clone(),
        store.clone(),
        clock.clone(),
        policy,
    );
    let target = SlotTarget::new(LOGO, Uuid::new_v4());
    store.insert(&target, SlotState::empty());
    Harness {
        storage,
        store,
        clock,
        service,
        target,
    }
}

fn png(bytes: &[u8]) -> UploadedFile {
    UploadedFile {
        filename: Some("logo.png".to_string()),
        content_type: "image/png".to_string(),
        bytes: bytes.to_vec(),
    }
}

fn seeded(h: &Harness, key: &str) -> AssetPointer {
    let stored = h.storage.put(key, b"seed");
    AssetPointer::new(stored.url, stored.key)
}

#[tokio::test]
async fn test_first_upload_fills_empty_slot() {
    let h = harness(Retention::days(30));

    let receipt = h
        .service
        .replace(&h.target, SlotChange::Upload(png(b"first")))
        .await
        .unwrap();

    let current = receipt.state.current.clone().unwrap();
    assert_eq!(receipt.outcome, Outcome::Replaced);
    assert_eq!(receipt.uploaded_image_url.as_deref(), Some(current.url.as_str()));
    assert_eq!(receipt.moved_old_image_url, None);
    assert!(receipt.state.old.is_none());
    assert!(h.storage.contains(&current.object_key));
    assert_eq!(h.store.state(&h.target), Some(receipt.state));
}

#[tokio::test]
async fn test_replace_moves_displaced_asset_to_trash() {
    let h = harness(Retention::days(30));
    let u1 = seeded(&h, "schools/s/logo/u1.png");
    h.store.insert(
        &h.target,
        SlotState {
            current: Some(u1.clone()),
            old: None,
        },
    );

    let receipt = h
        .service
        .replace(&h.target, SlotChange::Upload(png(b"second")))
        .await
        .unwrap();

    let trash_key = ".trash/30d/schools/s/logo/u1.png";
    let old = receipt.state.old.clone().unwrap();
    assert_eq!(old.delete_pending_until, t0() + TimeDelta::days(30));
    assert_eq!(old.asset.object_key, trash_key);
    assert_eq!(receipt.moved_old_image_url.as_deref(), Some(old.asset.url.as_str()));
    assert!(!h.storage.contains(&u1.object_key));
    assert!(h.storage.contains(trash_key));
    assert_eq!(h.store.state(&h.target), Some(receipt.state));
}

#[tokio::test]
async fn test_second_replace_deletes_pending_old_asset() {
    let h = harness(Retention::days(30));
    let u1 = seeded(&h, "schools/s/logo/u1.png");
    let u2 = seeded(&h, "schools/s/logo/u2.png");
    h.store.insert(
        &h.target,
        SlotState {
            current: Some(u2.clone()),
            old: Some(RetainedAsset {
                asset: u1.clone(),
                delete_pending_until: t0() + TimeDelta::days(5),
            }),
        },
    );

    let receipt = h
        .service
        .replace(&h.target, SlotChange::Upload(png(b"third")))
        .await
        .unwrap();

    assert_eq!(receipt.deleted_object_keys, vec![u1.object_key.clone()]);
    assert!(!h.storage.contains(&u1.object_key));
    assert!(h.storage.contains(".trash/30d/schools/s/logo/u2.png"));
    let old = receipt.state.old.unwrap();
    assert_eq!(old.asset.object_key, ".trash/30d/schools/s/logo/u2.png");
    assert_eq!(old.delete_pending_until, t0() + TimeDelta::days(30));
}

#[tokio::test]
async fn test_clear_without_retention_deletes_immediately() {
    let h = harness(Retention::disabled());
    let u1 = seeded(&h, "schools/s/logo/u1.png");
    h.store.insert(
        &h.target,
        SlotState {
            current: Some(u1.clone()),
            old: None,
        },
    );

    let receipt = h.service.clear(&h.target).await.unwrap();

    assert_eq!(receipt.outcome, Outcome::Cleared);
    assert_eq!(receipt.state, SlotState::empty());
    assert_eq!(receipt.deleted_object_keys, vec![u1.object_key.clone()]);
    assert!(h.storage.keys().is_empty());
    assert_eq!(h.store.state(&h.target), Some(SlotState::empty()));
}

#[tokio::test]
async fn test_explicit_pointer_with_same_pair_is_noop() {
    let h = harness(Retention::days(30));
    let u1 = seeded(&h, &format!("{}/u1.png", h.target.key_prefix()));
    let state = SlotState {
        current: Some(u1.clone()),
        old: None,
    };
    h.store.insert(&h.target, state.clone());

    let receipt = h
        .service
        .replace(
            &h.target,
            SlotChange::Explicit(ExplicitAsset {
                url: u1.url.clone(),
                object_key: Some(u1.object_key.clone()),
            }),
        )
        .await
        .unwrap();

    assert_eq!(receipt.outcome, Outcome::Unchanged);
    assert_eq!(receipt.state, state);
    assert!(receipt.deleted_object_keys.is_empty());
    assert!(h.storage.contains(&u1.object_key));
}

#[tokio::test]
async fn test_explicit_url_without_key_is_resolved() {
    let h = harness(Retention::days(30));
    let url = "https://cdn.test/storage/v1/object/public/media/library/crest.png";

    let receipt = h
        .service
        .replace(
            &h.target,
            SlotChange::Explicit(ExplicitAsset {
                url: url.to_string(),
                object_key: None,
            }),
        )
        .await
        .unwrap();

    assert_eq!(
        receipt.state.current,
        Some(AssetPointer::new(url, "library/crest.png"))
    );
}

#[tokio::test]
async fn test_unresolvable_explicit_url_is_rejected_without_writes() {
    let h = harness(Retention::days(30));

    let err = h
        .service
        .replace(
            &h.target,
            SlotChange::Explicit(ExplicitAsset {
                url: "https://elsewhere.test/crest.png".to_string(),
                object_key: None,
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::NotResolvable(_)));
    assert_eq!(h.store.state(&h.target), Some(SlotState::empty()));
}

#[tokio::test]
async fn test_explicit_key_must_match_its_url() {
    let h = harness(Retention::days(30));
    let mine = seeded(&h, &format!("{}/mine.png", h.target.key_prefix()));

    let err = h
        .service
        .replace(
            &h.target,
            SlotChange::Explicit(ExplicitAsset {
                url: mine.url.clone(),
                object_key: Some(format!("{}/other.png", h.target.key_prefix())),
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::InvalidRequest(_)));
    assert_eq!(h.store.state(&h.target), Some(SlotState::empty()));
}

#[tokio::test]
async fn test_explicit_pointer_into_another_school_is_rejected() {
    let h = harness(Retention::days(30));
    let foreign = seeded(&h, &format!("schools/{}/logo/theirs.png", Uuid::new_v4()));

    for object_key in [None, Some(foreign.object_key.clone())] {
        let err = h
            .service
            .replace(
                &h.target,
                SlotChange::Explicit(ExplicitAsset {
                    url: foreign.url.clone(),
                    object_key,
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidRequest(_)));
    }

    // An unresolvable URL cannot smuggle a foreign key either.
    let err = h
        .service
        .replace(
            &h.target,
            SlotChange::Explicit(ExplicitAsset {
                url: "https://elsewhere.test/theirs.png".to_string(),
                object_key: Some(foreign.object_key.clone()),
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::InvalidRequest(_)));

    assert_eq!(h.store.state(&h.target), Some(SlotState::empty()));
    assert!(h.storage.contains(&foreign.object_key));
}

#[tokio::test]
async fn test_failed_upload_leaves_slot_untouched() {
    let h = harness(Retention::days(30));
    h.storage.fail_uploads(true);

    let err = h
        .service
        .replace(&h.target, SlotChange::Upload(png(b"x")))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::UploadFailed(_)));
    assert_eq!(err.into_app_error().status.as_u16(), 502);
    assert_eq!(h.store.state(&h.target), Some(SlotState::empty()));
}

#[tokio::test]
async fn test_slow_upload_times_out() {
    let h = harness(Retention::days(30));
    h.storage.delay_uploads(Duration::from_secs(5));

    let err = h
        .service
        .replace(&h.target, SlotChange::Upload(png(b"x")))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::UploadTimedOut(_)));
    assert_eq!(h.store.state(&h.target), Some(SlotState::empty()));
}

#[tokio::test]
async fn test_rejected_mime_type_is_client_error() {
    let h = harness(Retention::days(30));
    let mut file = png(b"x");
    file.content_type = "application/pdf".to_string();

    let err = h
        .service
        .replace(&h.target, SlotChange::Upload(file))
        .await
        .unwrap_err();

    assert_eq!(err.into_app_error().status.as_u16(), 400);
}

#[tokio::test]
async fn test_concurrent_write_is_a_conflict_and_upload_is_discarded() {
    let h = harness(Retention::days(30));
    let winner = seeded(&h, "schools/s/logo/winner.png");
    h.store.race_after_next_load(SlotState {
        current: Some(winner.clone()),
        old: None,
    });

    let err = h
        .service
        .replace(&h.target, SlotChange::Upload(png(b"loser")))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::Conflict(_)));
    assert_eq!(err.into_app_error().status.as_u16(), 409);
    assert_eq!(h.storage.keys(), vec![winner.object_key.clone()]);
    assert_eq!(h.store.state(&h.target).unwrap().current, Some(winner));
}

#[tokio::test]
async fn test_persist_failure_discards_upload() {
    let h = harness(Retention::days(30));
    h.store.fail_persist(true);

    let err = h
        .service
        .replace(&h.target, SlotChange::Upload(png(b"x")))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::PersistFailed(_)));
    assert!(h.storage.keys().is_empty());
}

#[tokio::test]
async fn test_missing_row_is_not_found() {
    let h = harness(Retention::days(30));
    let missing = SlotTarget::new(LOGO, Uuid::new_v4());

    let err = h
        .service
        .replace(&missing, SlotChange::Upload(png(b"x")))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::NotFound(_)));
    assert!(h.storage.keys().is_empty());
}

#[tokio::test]
async fn test_trash_failure_is_reported_not_fatal() {
    let h = harness(Retention::days(30));
    let u1 = seeded(&h, "schools/s/logo/u1.png");
    h.store.insert(
        &h.target,
        SlotState {
            current: Some(u1.clone()),
            old: None,
        },
    );
    h.storage.fail_trash(true);

    let receipt = h
        .service
        .replace(&h.target, SlotChange::Upload(png(b"new")))
        .await
        .unwrap();

    assert_eq!(receipt.moved_old_image_url, None);
    assert_eq!(receipt.failures.len(), 1);
    assert_eq!(receipt.failures[0].kind, "move_to_trash");
    // Old still points at the original location and is swept from there.
    let stored = h.store.state(&h.target).unwrap();
    assert_eq!(stored.old.unwrap().asset, u1);
}

#[tokio::test]
async fn test_delete_failure_is_reported_not_fatal() {
    let h = harness(Retention::disabled());
    let u1 = seeded(&h, "schools/s/logo/u1.png");
    h.store.insert(
        &h.target,
        SlotState {
            current: Some(u1.clone()),
            old: None,
        },
    );
    h.storage.fail_delete_of(&u1.object_key);

    let receipt = h.service.clear(&h.target).await.unwrap();

    assert_eq!(receipt.state, SlotState::empty());
    assert_eq!(receipt.failures.len(), 1);
    assert_eq!(receipt.failures[0].kind, "delete_now");
    assert!(h.storage.contains(&u1.object_key));
}

#[tokio::test]
async fn test_multi_slot_prepare_then_finish() {
    let h = harness(Retention::days(30));
    let icon = SlotTarget::new(SlotRef::new("schools", "icon"), h.target.entity_id);
    h.store.insert(&icon, SlotState::empty());

    let logo = h
        .service
        .prepare(&h.target, SlotChange::Upload(png(b"logo")))
        .await
        .unwrap();
    let icon_prepared = h
        .service
        .prepare(&icon, SlotChange::Upload(png(b"icon")))
        .await
        .unwrap();

    h.service.commit(&logo).await.unwrap();
    h.service.commit(&icon_prepared).await.unwrap();

    let logo_receipt = h.service.finish(logo).await;
    let icon_receipt = h.service.finish(icon_prepared).await;

    assert!(logo_receipt.state.current.is_some());
    assert!(icon_receipt.state.current.is_some());
    assert_eq!(h.storage.keys().len(), 2);
}

#[tokio::test]
async fn test_abandon_removes_unreferenced_upload() {
    let h = harness(Retention::days(30));

    let prepared = h
        .service
        .prepare(&h.target, SlotChange::Upload(png(b"never saved")))
        .await
        .unwrap();
    assert_eq!(h.storage.keys().len(), 1);

    h.service.abandon(&prepared).await;
    assert!(h.storage.keys().is_empty());
}

#[tokio::test]
async fn test_deadline_follows_the_clock() {
    let h = harness(Retention::days(7));
    let u1 = seeded(&h, "schools/s/logo/u1.png");
    h.store.insert(
        &h.target,
        SlotState {
            current: Some(u1),
            old: None,
        },
    );
    h.clock.advance(TimeDelta::hours(3));

    let receipt = h
        .service
        .replace(&h.target, SlotChange::Upload(png(b"later")))
        .await
        .unwrap();

    assert_eq!(
        receipt.state.delete_pending_until(),
        Some(t0() + TimeDelta::hours(3) + TimeDelta::days(7))
    );
}

#[tokio::test]
async fn test_purge_deletes_both_positions() {
    let h = harness(Retention::days(30));
    let u1 = seeded(&h, "schools/s/logo/u1.png");
    let u2 = seeded(&h, "schools/s/logo/u2.png");
    let state = SlotState {
        current: Some(u2),
        old: Some(RetainedAsset {
            asset: u1,
            delete_pending_until: t0(),
        }),
    };

    let failures = h.service.purge(&state).await;

    assert!(failures.is_empty());
    assert!(h.storage.keys().is_empty());
}
