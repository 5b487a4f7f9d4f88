//! In-memory [`SlotStore`] and [`ObjectStorage`] doubles with failure
//! injection, for exercising the lifecycle without Postgres or a bucket.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use madrasa_core::file_storage::{DEFAULT_MAX_FILE_SIZE, validate_key, validate_upload};
use madrasa_core::object_url::{self, PUBLIC_OBJECT_PATH, SIGNED_OBJECT_PATH};
use madrasa_core::{ObjectStorage, StorageError, StorageFuture, StoredObject, UploadedFile};

use crate::error::StoreError;
use crate::slot::{AssetPointer, SlotState, SlotTarget};
use crate::store::{DueAsset, SlotStore, StoreFuture};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug)]
struct Injected(&'static str);

impl std::fmt::Display for Injected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "injected {} failure", self.0)
    }
}

impl std::error::Error for Injected {}

#[derive(Debug, Default)]
pub struct InMemorySlotStore {
    slots: Mutex<HashMap<SlotTarget, SlotState>>,
    fail_load: AtomicBool,
    fail_persist: AtomicBool,
    fail_clear: AtomicBool,
    /// Written over the slot right after the next load, as a concurrent
    /// writer would.
    race_after_load: Mutex<Option<SlotState>>,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the row owning `target` with the given slot state.
    pub fn insert(&self, target: &SlotTarget, state: SlotState) {
        lock(&self.slots).insert(target.clone(), state);
    }

    pub fn state(&self, target: &SlotTarget) -> Option<SlotState> {
        lock(&self.slots).get(target).cloned()
    }

    pub fn fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    pub fn fail_clear(&self, fail: bool) {
        self.fail_clear.store(fail, Ordering::SeqCst);
    }

    pub fn race_after_next_load(&self, state: SlotState) {
        *lock(&self.race_after_load) = Some(state);
    }
}

impl SlotStore for InMemorySlotStore {
    fn load<'a>(&'a self, target: &'a SlotTarget) -> StoreFuture<'a, Option<SlotState>> {
        Box::pin(async move {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(StoreError::backend(Injected("load")));
            }
            let mut slots = lock(&self.slots);
            let loaded = slots.get(target).cloned();
            if loaded.is_some()
                && let Some(racing) = lock(&self.race_after_load).take()
            {
                slots.insert(target.clone(), racing);
            }
            Ok(loaded)
        })
    }

    fn persist<'a>(
        &'a self,
        target: &'a SlotTarget,
        expected: &'a SlotState,
        next: &'a SlotState,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            if self.fail_persist.load(Ordering::SeqCst) {
                return Err(StoreError::backend(Injected("persist")));
            }
            let mut slots = lock(&self.slots);
            match slots.get_mut(target) {
                Some(stored) if stored == expected => {
                    *stored = next.clone();
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn relocate_old<'a>(
        &'a self,
        target: &'a SlotTarget,
        expected_old_key: &'a str,
        relocated: &'a AssetPointer,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut slots = lock(&self.slots);
            let old = slots
                .get_mut(target)
                .and_then(|state| state.old.as_mut())
                .filter(|old| old.asset.object_key == expected_old_key);
            match old {
                Some(old) => {
                    old.asset = relocated.clone();
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn due<'a>(
        &'a self,
        now: DateTime<Utc>,
        after: Option<&'a DueAsset>,
        limit: usize,
    ) -> StoreFuture<'a, Vec<DueAsset>> {
        Box::pin(async move {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(StoreError::backend(Injected("due")));
            }
            let slots = lock(&self.slots);
            let mut due: Vec<DueAsset> = slots
                .iter()
                .filter_map(|(target, state)| {
                    state.old.as_ref().filter(|old| old.is_due(now)).map(|old| DueAsset {
                        target: target.clone(),
                        asset: old.asset.clone(),
                        delete_pending_until: old.delete_pending_until,
                    })
                })
                .filter(|item| after.is_none_or(|cursor| item.sort_key() > cursor.sort_key()))
                .collect();
            due.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
            due.truncate(limit);
            Ok(due)
        })
    }

    fn clear_old<'a>(&'a self, due: &'a DueAsset, now: DateTime<Utc>) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            if self.fail_clear.load(Ordering::SeqCst) {
                return Err(StoreError::backend(Injected("clear")));
            }
            let mut slots = lock(&self.slots);
            let Some(state) = slots.get_mut(&due.target) else {
                return Ok(false);
            };
            let still_due = state
                .old
                .as_ref()
                .is_some_and(|old| old.asset.object_key == due.asset.object_key && old.is_due(now));
            if still_due {
                state.old = None;
            }
            Ok(still_due)
        })
    }
}

/// Object storage backed by a map from key to bytes.
///
/// URLs follow the same public and signed layouts as the local backend.
#[derive(Debug)]
pub struct InMemoryObjectStorage {
    base_url: String,
    bucket: String,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    stamp: AtomicI64,
    fail_uploads: AtomicBool,
    fail_trash: AtomicBool,
    failing_deletes: Mutex<HashSet<String>>,
    upload_delay: Mutex<Option<Duration>>,
}

impl Default for InMemoryObjectStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self {
            base_url: "https://cdn.test".to_string(),
            bucket: "media".to_string(),
            objects: Mutex::new(BTreeMap::new()),
            stamp: AtomicI64::new(1),
            fail_uploads: AtomicBool::new(false),
            fail_trash: AtomicBool::new(false),
            failing_deletes: Mutex::new(HashSet::new()),
            upload_delay: Mutex::new(None),
        }
    }

    /// Seed an object and return its location.
    pub fn put(&self, key: &str, bytes: &[u8]) -> StoredObject {
        lock(&self.objects).insert(key.to_string(), bytes.to_vec());
        StoredObject {
            url: format!("{}{}{}/{}", self.base_url, PUBLIC_OBJECT_PATH, self.bucket, key),
            key: key.to_string(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.objects).contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_trash(&self, fail: bool) {
        self.fail_trash.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete_of(&self, key: &str) {
        lock(&self.failing_deletes).insert(key.to_string());
    }

    pub fn heal_deletes(&self) {
        lock(&self.failing_deletes).clear();
    }

    pub fn delay_uploads(&self, delay: Duration) {
        *lock(&self.upload_delay) = Some(delay);
    }

    fn key_from_url(&self, url: &str) -> Result<String, StorageError> {
        object_url::parse_object_url(url, PUBLIC_OBJECT_PATH)
            .filter(|location| location.bucket == self.bucket)
            .map(|location| location.key)
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))
    }
}

impl ObjectStorage for InMemoryObjectStorage {
    fn upload<'a>(
        &'a self,
        key_prefix: &'a str,
        file: UploadedFile,
    ) -> StorageFuture<'a, StoredObject> {
        Box::pin(async move {
            let delay = *lock(&self.upload_delay);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("injected upload failure".to_string()));
            }
            validate_upload(&file, DEFAULT_MAX_FILE_SIZE)?;

            let stamp = self.stamp.fetch_add(1, Ordering::SeqCst);
            let key = file.object_key(key_prefix, stamp);
            let url = self.public_url(&key)?;
            lock(&self.objects).insert(key.clone(), file.bytes);
            Ok(StoredObject { url, key })
        })
    }

    fn move_to_trash<'a>(
        &'a self,
        public_url: &'a str,
        retention_hint_days: u32,
    ) -> StorageFuture<'a, String> {
        Box::pin(async move {
            if self.fail_trash.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("injected trash failure".to_string()));
            }
            let key = self.key_from_url(public_url)?;
            let mut objects = lock(&self.objects);
            let bytes = objects.remove(&key).ok_or(StorageError::NotFound)?;
            let trash_key = format!(".trash/{}d/{}", retention_hint_days, key);
            objects.insert(trash_key.clone(), bytes);
            drop(objects);
            self.public_url(&trash_key)
        })
    }

    fn delete<'a>(&'a self, object_key: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            if lock(&self.failing_deletes).contains(object_key) {
                return Err(StorageError::Backend("injected delete failure".to_string()));
            }
            lock(&self.objects).remove(object_key);
            Ok(())
        })
    }

    fn parse_signed_url(&self, url: &str) -> Option<String> {
        if !object_url::has_token(url) {
            return None;
        }
        object_url::parse_object_url(url, SIGNED_OBJECT_PATH)
            .filter(|location| location.bucket == self.bucket)
            .map(|location| location.key)
    }

    fn public_url(&self, key: &str) -> Result<String, StorageError> {
        validate_key(key)?;
        Ok(format!(
            "{}{}{}/{}",
            self.base_url, PUBLIC_OBJECT_PATH, self.bucket, key
        ))
    }
}
