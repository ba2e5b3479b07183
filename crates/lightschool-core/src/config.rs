//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! server origin, the cache generation tag, the manifest of shell resources
//! and the routing table.
//!
//! Configuration is stored at `~/.config/lightschool/config.json`. Any value
//! can be overridden from the environment (see `apply_env`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::{Generation, Manifest, RoutingTable, DEFAULT_MANIFEST};
use crate::net::DEFAULT_TIMEOUT_SECS;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "lightschool";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Subdirectory of the cache dir holding generation stores
const STORES_DIR: &str = "stores";

const DEFAULT_ORIGIN: &str = "http://localhost:8000";
const DEFAULT_LOCALE: &str = "en";

pub const ENV_ORIGIN: &str = "LIGHTSCHOOL_ORIGIN";
pub const ENV_GENERATION: &str = "LIGHTSCHOOL_GENERATION";
pub const ENV_CACHE_DIR: &str = "LIGHTSCHOOL_CACHE_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub origin: String,
    pub generation: Generation,
    pub manifest: Vec<String>,
    pub routes: RoutingTable,
    pub locale: String,
    pub request_timeout_secs: u64,
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            generation: Generation::default(),
            manifest: DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect(),
            routes: RoutingTable::default(),
            locale: DEFAULT_LOCALE.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            cache_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Override values from `LIGHTSCHOOL_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(origin) = var(ENV_ORIGIN) {
            self.origin = origin;
        }
        if let Some(generation) = var(ENV_GENERATION) {
            self.generation = generation
                .parse()
                .with_context(|| format!("Invalid {}", ENV_GENERATION))?;
        }
        if let Some(dir) = var(ENV_CACHE_DIR) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin).with_context(|| format!("Invalid origin URL: {}", self.origin))
    }

    pub fn manifest(&self) -> Result<Manifest> {
        let origin = self.origin_url()?;
        Manifest::resolve(&origin, self.manifest.as_slice()).context("Invalid manifest path")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Directory holding the generation stores.
    pub fn stores_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.join(STORES_DIR));
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(STORES_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"origin": "https://school.example"}"#).unwrap();
        assert_eq!(config.origin, "https://school.example");
        assert_eq!(config.manifest.len(), DEFAULT_MANIFEST.len());
        assert_eq!(config.generation, Generation::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_manifest_resolves_against_origin() {
        let config = Config {
            origin: "https://school.example".to_string(),
            manifest: vec!["/".to_string(), "/static/css/theme.css".to_string()],
            ..Config::default()
        };
        let manifest = config.manifest().unwrap();
        assert_eq!(manifest.urls()[1].as_str(), "https://school.example/static/css/theme.css");
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            (ENV_ORIGIN, "https://offline.example"),
            (ENV_GENERATION, "lightschool-v9"),
            (ENV_CACHE_DIR, "/tmp/ls"),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.origin, "https://offline.example");
        assert_eq!(config.generation.as_str(), "lightschool-v9");
        assert_eq!(config.stores_dir().unwrap(), PathBuf::from("/tmp/ls/stores"));
    }

    #[test]
    fn test_invalid_generation_override_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_overrides(|name| (name == ENV_GENERATION).then(|| "../x".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config::load_from(&tmp.path().join("config.json")).unwrap();
        assert_eq!(config.origin, DEFAULT_ORIGIN);
    }

    #[test]
    fn test_load_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        let mut config = Config::default();
        config.locale = "es".to_string();
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.locale, "es");
        assert_eq!(loaded.routes, RoutingTable::default());
    }
}
