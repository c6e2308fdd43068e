//! Persistent per-route price history
//!
//! The whole store is one JSON document mapping `ORIGIN-DESTINATION-CABIN`
//! keys to [`RouteProfile`]s. It is loaded once at startup and rewritten in
//! full after every update. Updates and saves happen under one lock so two
//! workers reporting fares for the same route cannot lose each other's prices.

use chrono::NaiveDate;
use shared::{RouteKey, RouteProfile};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{EngineError, EngineResult};

type ProfileMap = BTreeMap<RouteKey, RouteProfile>;

/// Price history store
pub struct PriceHistoryStore {
    path: Option<PathBuf>,
    profiles: Mutex<ProfileMap>,
}

/// Result of an update followed by a save
#[derive(Debug)]
pub struct UpsertOutcome {
    /// Profile after the update
    pub profile: RouteProfile,
    /// Whether the store reached disk; the in-memory update stands either way
    pub saved: EngineResult<()>,
}

impl PriceHistoryStore {
    /// A store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            profiles: Mutex::new(BTreeMap::new()),
        }
    }

    /// Load the store from `path`.
    ///
    /// A missing file yields an empty store. An unreadable or corrupt file is
    /// logged and also yields an empty store; the next save overwrites it.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let profiles = match read_profiles(&path) {
            Ok(Some(profiles)) => {
                tracing::info!(path = %path.display(), "Loaded price history for {} routes", profiles.len());
                profiles
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "No price history yet, starting fresh");
                BTreeMap::new()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Could not load price history, starting fresh: {}", e);
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            profiles: Mutex::new(profiles),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &RouteKey) -> Option<RouteProfile> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every profile
    pub fn snapshot(&self) -> ProfileMap {
        self.lock().clone()
    }

    /// Fold `price` into the profile for `key`, creating it on first sight.
    /// In-memory only; see [`Self::upsert_and_save`].
    pub fn upsert(&self, key: &RouteKey, price: f64, observed_on: NaiveDate) -> RouteProfile {
        let mut profiles = self.lock();
        apply(&mut profiles, key, price, observed_on)
    }

    /// Update then persist the whole store while holding the lock
    pub fn upsert_and_save(&self, key: &RouteKey, price: f64, observed_on: NaiveDate) -> UpsertOutcome {
        let mut profiles = self.lock();
        let profile = apply(&mut profiles, key, price, observed_on);
        let saved = self.write(&profiles);
        UpsertOutcome { profile, saved }
    }

    /// Persist the current state. A no-op for in-memory stores.
    pub fn save(&self) -> EngineResult<()> {
        let profiles = self.lock();
        self.write(&profiles)
    }

    fn write(&self, profiles: &ProfileMap) -> EngineResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(profiles)?;

        // Write beside the target then rename so a crash never leaves a torn file
        let tmp = path.with_extension("json.tmp");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path).map_err(|e| {
            EngineError::Persistence(format!("could not replace {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ProfileMap> {
        self.profiles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn apply(profiles: &mut ProfileMap, key: &RouteKey, price: f64, observed_on: NaiveDate) -> RouteProfile {
    let profile = profiles
        .entry(key.clone())
        .and_modify(|p| p.record(price, observed_on))
        .or_insert_with(|| RouteProfile::seed(price, observed_on));
    profile.clone()
}

fn read_profiles(path: &Path) -> EngineResult<Option<ProfileMap>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&raw)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{CabinClass, PriceTrend};

    fn key() -> RouteKey {
        RouteKey::new("CDG".parse().unwrap(), "JFK".parse().unwrap(), CabinClass::Business)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
    }

    #[test]
    fn test_missing_file_gives_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = PriceHistoryStore::load(dir.path().join("nothing.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_file_gives_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = PriceHistoryStore::load(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let store = PriceHistoryStore::in_memory();
        assert!(store.get(&key()).is_none());

        let first = store.upsert(&key(), 1000.0, day());
        assert_eq!(first.observation_count, 1);
        assert_eq!(first.max_price, 1500.0);

        let second = store.upsert(&key(), 800.0, day());
        assert_eq!(second.observation_count, 2);
        assert_eq!(second.min_price, 800.0);
        assert_eq!(store.get(&key()), Some(second));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let store = PriceHistoryStore::load(&path);
        for price in [300.0, 200.0, 100.0] {
            let outcome = store.upsert_and_save(&key(), price, day());
            assert!(outcome.saved.is_ok());
        }

        let reloaded = PriceHistoryStore::load(&path);
        let profile = reloaded.get(&key()).unwrap();
        assert_eq!(profile.observation_count, 3);
        assert_eq!(profile.trend, PriceTrend::Decreasing);
        assert_eq!(profile.price_history.len(), 3);
        assert_eq!(reloaded.snapshot(), store.snapshot());
    }

    #[test]
    fn test_persisted_document_keyed_by_route_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = PriceHistoryStore::load(&path);
        store.upsert_and_save(&key(), 500.0, day()).saved.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("CDG-JFK-Business").is_some());
        assert_eq!(raw["CDG-JFK-Business"]["observation_count"], 1);
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("history.json");
        std::fs::create_dir_all(path.join("blocker")).unwrap();

        let store = PriceHistoryStore::load(&path);
        let outcome = store.upsert_and_save(&key(), 500.0, day());
        assert!(outcome.saved.is_err());
        assert_eq!(store.get(&key()).unwrap().observation_count, 1);
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let store = PriceHistoryStore::in_memory();
        store.upsert(&key(), 10.0, day());
        assert!(store.save().is_ok());
        assert!(store.path().is_none());
    }
}
