//! Configuration service for dependency injection and test isolation.

use std::path::PathBuf;
use std::sync::RwLock;

use config::{Config as ConfigCrate, Environment, File};
use log::debug;

use crate::config::Config;
use crate::error::LingoError;
use crate::Result;

/// Configuration loading abstraction.
///
/// Production wiring reads the layered sources; tests hold a fixed
/// configuration, so no test ever touches the real filesystem or
/// environment.
pub trait ConfigService: Send + Sync {
    /// Get the current configuration.
    fn get_config(&self) -> Result<Config>;

    /// Discard any cached configuration and reload from sources.
    fn reload(&self) -> Result<()>;
}

/// Production configuration service.
///
/// Sources in ascending priority: built-in defaults, the TOML file at
/// `$CONFIG_DIR/lingo/config.toml`, then `LINGO_*` environment variables
/// (`__` separates section and key, e.g. `LINGO_STT__API_KEY`).
pub struct ProductionConfigService {
    cached: RwLock<Option<Config>>,
    config_path: PathBuf,
}

impl ProductionConfigService {
    /// Service reading from the default platform config location.
    pub fn new() -> Result<Self> {
        let config_path = dirs::config_dir()
            .ok_or_else(|| LingoError::config("cannot determine config directory"))?
            .join("lingo")
            .join("config.toml");
        Ok(Self {
            cached: RwLock::new(None),
            config_path,
        })
    }

    /// Service reading a specific TOML file (still env-overridable).
    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self {
            cached: RwLock::new(None),
            config_path,
        }
    }

    fn load(&self) -> Result<Config> {
        debug!("loading configuration from {}", self.config_path.display());
        let builder = ConfigCrate::builder()
            .add_source(ConfigCrate::try_from(&Config::default())?)
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(
                Environment::with_prefix("LINGO")
                    .separator("__")
                    .try_parsing(true),
            );
        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

impl ConfigService for ProductionConfigService {
    fn get_config(&self) -> Result<Config> {
        {
            let cached = self.cached.read().unwrap();
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }
        let config = self.load()?;
        *self.cached.write().unwrap() = Some(config.clone());
        Ok(config)
    }

    fn reload(&self) -> Result<()> {
        let config = self.load()?;
        *self.cached.write().unwrap() = Some(config);
        Ok(())
    }
}

/// Test configuration service holding a fixed configuration.
pub struct TestConfigService {
    config: Config,
}

impl TestConfigService {
    /// Service returning exactly `config`.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Service returning the built-in defaults.
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }
}

impl ConfigService for TestConfigService {
    fn get_config(&self) -> Result<Config> {
        Ok(self.config.clone())
    }

    fn reload(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let service =
            ProductionConfigService::with_config_path(dir.path().join("absent.toml"));
        let config = service.get_config().unwrap();
        assert_eq!(config.stt.model, "whisper-1");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pipeline]\nworkers_max = 7\n[stt]\nenabled = true\n").unwrap();
        let service = ProductionConfigService::with_config_path(path);
        let config = service.get_config().unwrap();
        assert_eq!(config.pipeline.workers_max, 7);
        assert!(config.stt.enabled);
        // Untouched sections keep their defaults.
        assert_eq!(config.merge.container_ext, "mkv");
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pipeline]\nworkers_max = 0\n").unwrap();
        let service = ProductionConfigService::with_config_path(path);
        assert!(matches!(
            service.get_config(),
            Err(LingoError::Config { .. })
        ));
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pipeline]\nworkers_max = 2\n").unwrap();
        let service = ProductionConfigService::with_config_path(path.clone());
        assert_eq!(service.get_config().unwrap().pipeline.workers_max, 2);

        std::fs::write(&path, "[pipeline]\nworkers_max = 5\n").unwrap();
        // Cached until an explicit reload.
        assert_eq!(service.get_config().unwrap().pipeline.workers_max, 2);
        service.reload().unwrap();
        assert_eq!(service.get_config().unwrap().pipeline.workers_max, 5);
    }

    #[test]
    fn test_test_service_returns_injected_config() {
        let mut config = Config::default();
        config.pipeline.workers_max = 3;
        let service = TestConfigService::new(config);
        assert_eq!(service.get_config().unwrap().pipeline.workers_max, 3);
        assert!(service.reload().is_ok());
    }
}
