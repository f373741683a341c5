//! Configuration storage.
//!
//! Configuration is kept in the project workspace under:
//! `.steward/autopilot.json`
//!
//! The engine treats storage as synchronous key-value access and carries no
//! schema versioning of its own. Unknown fields are ignored and missing fields
//! take their defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::AutopilotConfig;
use crate::error::CoreResult;

/// Load/save pair for [`AutopilotConfig`].
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> CoreResult<AutopilotConfig>;
    fn save(&self, config: &AutopilotConfig) -> CoreResult<()>;
}

/// JSON file store.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<workspace>/.steward/autopilot.json`.
    pub fn for_workspace(workspace_root: impl AsRef<Path>) -> Self {
        Self::new(
            workspace_root
                .as_ref()
                .join(".steward")
                .join("autopilot.json"),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> CoreResult<AutopilotConfig> {
        if !self.path.exists() {
            debug!("No config at {}, using defaults", self.path.display());
            return Ok(AutopilotConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let config: AutopilotConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn save(&self, config: &AutopilotConfig) -> CoreResult<()> {
        config.validate()?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, json)?;
        debug!("Saved config to {}", self.path.display());
        Ok(())
    }
}

/// Process-local store, handy for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    inner: Arc<RwLock<AutopilotConfig>>,
}

impl MemoryConfigStore {
    pub fn new(config: AutopilotConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> CoreResult<AutopilotConfig> {
        Ok(self.inner.read().clone())
    }

    fn save(&self, config: &AutopilotConfig) -> CoreResult<()> {
        config.validate()?;
        *self.inner.write() = config.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmProvider;
    use crate::error::CoreError;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_loads_defaults() {
        let temp = tempdir().unwrap();
        let store = JsonConfigStore::for_workspace(temp.path());
        assert_eq!(store.load().unwrap(), AutopilotConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let temp = tempdir().unwrap();
        let store = JsonConfigStore::for_workspace(temp.path());

        let mut config = AutopilotConfig {
            enabled: true,
            provider: LlmProvider::Anthropic,
            max_guidances_per_hour: 4,
            ..Default::default()
        };
        config.api_keys.set(LlmProvider::Anthropic, "sk-ant");
        store.save(&config).unwrap();

        assert!(temp.path().join(".steward/autopilot.json").exists());
        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let temp = tempdir().unwrap();
        let store = JsonConfigStore::new(temp.path().join("cfg.json"));
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(CoreError::Serialization(_))));
    }

    #[test]
    fn test_memory_store_rejects_invalid() {
        let store = MemoryConfigStore::default();
        let bad = AutopilotConfig {
            analysis_delay_ms: 0,
            ..Default::default()
        };
        assert!(store.save(&bad).is_err());
        assert_eq!(store.load().unwrap().analysis_delay_ms, 30_000);
    }
}
