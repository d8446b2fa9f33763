//! Process-wide holder for the active engine configuration.
//!
//! Readers get a copy of the latest committed config. Updates are merged,
//! validated and swapped in as a whole; a rejected update leaves the
//! previous config untouched.

use crate::{ConfigUpdate, EngineConfig, Result};
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};

static GLOBAL_STORE: Lazy<ConfigStore> = Lazy::new(ConfigStore::default);

/// Holds exactly one validated `EngineConfig` at a time
#[derive(Debug)]
pub struct ConfigStore {
    current: RwLock<Arc<EngineConfig>>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(EngineConfig::default())),
        }
    }
}

impl ConfigStore {
    /// Create a store seeded with `config`, which must pass validation
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// The shared instance for the process
    ///
    /// Engine functions never read this themselves; callers fetch a snapshot
    /// and pass it in.
    pub fn global() -> &'static ConfigStore {
        &GLOBAL_STORE
    }

    /// Snapshot of the current configuration
    pub fn get(&self) -> EngineConfig {
        self.snapshot().as_ref().clone()
    }

    /// Shared handle to the current configuration without copying it
    pub fn snapshot(&self) -> Arc<EngineConfig> {
        // A poisoned lock still holds a fully committed config: writers only
        // ever swap the Arc after validation.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Merge `update` over the current config and commit it if valid.
    ///
    /// Returns the newly committed configuration.
    pub fn update(&self, update: &ConfigUpdate) -> Result<EngineConfig> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let candidate = guard.merged(update);

        if let Err(e) = candidate.validate() {
            tracing::warn!("Rejected config update {:?}: {}", update, e);
            return Err(e);
        }

        *guard = Arc::new(candidate.clone());
        tracing::info!("Committed engine config: {:?}", candidate);
        Ok(candidate)
    }

    /// Replace the whole configuration if it passes validation
    pub fn replace(&self, config: EngineConfig) -> Result<()> {
        if let Err(e) = config.validate() {
            tracing::warn!("Rejected config replacement: {}", e);
            return Err(e);
        }

        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(config);
        tracing::info!("Replaced engine config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_default_store_holds_defaults() {
        let store = ConfigStore::default();
        assert_eq!(store.get(), EngineConfig::default());
    }

    #[test]
    fn test_update_merges_partial_fields() {
        let store = ConfigStore::default();
        let committed = store
            .update(&ConfigUpdate {
                carb_absorption_minutes: Some(210.0),
                ..ConfigUpdate::default()
            })
            .unwrap();

        assert_eq!(committed.carb_absorption_minutes, 210.0);
        assert_eq!(store.get().carb_absorption_minutes, 210.0);
        assert_eq!(
            store.get().insulin_action_minutes,
            EngineConfig::default().insulin_action_minutes
        );
    }

    #[test]
    fn test_rejected_update_leaves_config_unchanged() {
        crate::logging::init_test();
        let store = ConfigStore::default();
        let before = store.get();

        let result = store.update(&ConfigUpdate {
            carb_absorption_minutes: Some(-5.0),
            ..ConfigUpdate::default()
        });

        assert!(matches!(result, Err(Error::ConfigValidation(_))));
        assert_eq!(store.get(), before);
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let store = ConfigStore::default();
        let before = store.get();

        // First field is fine, second is not: neither may land
        let result = store.update(&ConfigUpdate {
            insulin_action_minutes: Some(300.0),
            insulin_to_glucose_factor: Some(0.0),
            ..ConfigUpdate::default()
        });

        assert!(result.is_err());
        assert_eq!(store.get(), before);
    }

    #[test]
    fn test_new_rejects_invalid_seed() {
        let config = EngineConfig {
            insulin_peak_minutes: 0.0,
            ..EngineConfig::default()
        };
        assert!(ConfigStore::new(config).is_err());
    }

    #[test]
    fn test_replace() {
        let store = ConfigStore::default();
        let replacement = EngineConfig {
            carb_to_glucose_factor: 0.05,
            insulin_to_glucose_factor: 2.0,
            ..EngineConfig::default()
        };
        store.replace(replacement.clone()).unwrap();
        assert_eq!(store.get(), replacement);

        let bad = EngineConfig {
            carb_absorption_minutes: f64::INFINITY,
            ..EngineConfig::default()
        };
        assert!(store.replace(bad).is_err());
        assert_eq!(store.get(), replacement);
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_updates() {
        let store = ConfigStore::default();
        let snapshot = store.snapshot();

        store
            .update(&ConfigUpdate {
                carb_peak_minutes: Some(30.0),
                ..ConfigUpdate::default()
            })
            .unwrap();

        assert_eq!(snapshot.carb_peak_minutes, 45.0);
        assert_eq!(store.get().carb_peak_minutes, 30.0);
    }

    #[test]
    fn test_global_store_is_shared() {
        assert!(std::ptr::eq(ConfigStore::global(), ConfigStore::global()));
        ConfigStore::global().get().validate().unwrap();
    }
}
