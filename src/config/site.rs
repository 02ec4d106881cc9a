//! Engine configuration, read from the `site` subtree of the settings

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{SettingValue, SettingsStore};
use crate::error::ConfigParseError;

/// Settings key holding the engine configuration
pub const SITE_KEY: &str = "site";

/// Key of the fingerprint table below [`SITE_KEY`]
const FINGERPRINTS_KEY: &str = "fingerprints";

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Directories
    pub content_dir: String,
    pub public_dir: String,
    pub static_dir: String,
    pub layouts_dir: String,
    /// Per-directory manifest file name
    pub manifest: String,

    // Home page
    pub home_url: String,
    pub home_title: String,

    // Assets
    pub asset_base: Option<String>,
    /// Logical asset path -> fingerprinted path
    pub fingerprints: IndexMap<String, String>,

    // Server
    pub bind: String,
    pub port: u16,

    // Build
    pub read_timeout_ms: u64,
    /// Render workers, 0 means one per core
    pub workers: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            content_dir: "content".to_string(),
            public_dir: "public".to_string(),
            static_dir: "static".to_string(),
            layouts_dir: "layouts".to_string(),
            manifest: "_dir.yml".to_string(),

            home_url: "/".to_string(),
            home_title: "Home".to_string(),

            asset_base: None,
            fingerprints: IndexMap::new(),

            bind: "127.0.0.1".to_string(),
            port: 9000,

            read_timeout_ms: 2000,
            workers: 0,
        }
    }
}

impl SiteConfig {
    /// Read the `site` subtree of the settings cascade
    pub fn from_settings(settings: &SettingsStore) -> Result<Self, ConfigParseError> {
        let mut value = settings.get(SITE_KEY);
        if value.is_absent() {
            return Ok(Self::default());
        }
        // Asset paths contain slashes, so the table arrives expanded into
        // nested mappings
        let fingerprints = match &mut value {
            SettingValue::Mapping(map) => map.shift_remove(FINGERPRINTS_KEY),
            _ => None,
        };

        let origin = settings
            .sources()
            .next()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let mut config: SiteConfig = serde_json::from_value(value.to_json())
            .map_err(|e| ConfigParseError::new(&origin, format!("invalid `site` settings: {}", e)))?;
        config.home_url = normalize_url(&config.home_url);
        if let Some(table) = fingerprints {
            flatten_paths(&table, "", &mut config.fingerprints).map_err(|key| {
                ConfigParseError::new(
                    &origin,
                    format!("invalid `site/fingerprints` entry `{}`: expected a path", key),
                )
            })?;
        }
        Ok(config)
    }

    /// Resolve a configured directory against the site base directory
    pub fn resolve_dir(&self, base_dir: &Path, dir: &str) -> PathBuf {
        let dir = Path::new(dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            base_dir.join(dir)
        }
    }

    /// Number of render workers to use
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.workers
        }
    }
}

/// Collapse nested mappings back into `a/b/c -> value` pairs; returns the
/// offending key when a leaf is not a scalar
fn flatten_paths(
    value: &SettingValue,
    prefix: &str,
    out: &mut IndexMap<String, String>,
) -> Result<(), String> {
    match value {
        SettingValue::Absent => Ok(()),
        SettingValue::Scalar(scalar) if !prefix.is_empty() => {
            out.insert(prefix.to_string(), scalar.to_string());
            Ok(())
        }
        SettingValue::Mapping(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}/{}", prefix, key)
                };
                flatten_paths(child, &path, out)?;
            }
            Ok(())
        }
        _ => Err(prefix.to_string()),
    }
}

/// Normalize a site URL to `/` or `/a/b` form
pub fn normalize_url(url: &str) -> String {
    let segments: Vec<&str> = url.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.content_dir, "content");
        assert_eq!(config.home_url, "/");
        assert_eq!(config.port, 9000);
        assert!(config.asset_base.is_none());
    }

    #[test]
    fn test_parse_config_across_layers() {
        let defaults = r#"
site:
  content_dir: docs
  port: 8080
"#;
        let instance = r#"
site:
  port: 9100
  home_url: /start/
  asset_base: https://cdn.example.com/static
"#;
        let store = SettingsStore::from_yaml(defaults, instance).unwrap();
        let config = SiteConfig::from_settings(&store).unwrap();
        assert_eq!(config.content_dir, "docs");
        assert_eq!(config.port, 9100);
        assert_eq!(config.home_url, "/start");
        assert_eq!(
            config.asset_base.as_deref(),
            Some("https://cdn.example.com/static")
        );
    }

    #[test]
    fn test_fingerprints_keep_asset_paths() {
        let instance = r#"
site:
  fingerprints:
    css/site.css: css/site.3f9a1c.css
    "js/vendor/app.js": js/vendor/app.77b2.js
    favicon.ico: favicon.1a2b.ico
"#;
        let store = SettingsStore::from_yaml("", instance).unwrap();
        let config = SiteConfig::from_settings(&store).unwrap();
        assert_eq!(
            config.fingerprints.get("css/site.css").map(String::as_str),
            Some("css/site.3f9a1c.css")
        );
        assert_eq!(
            config.fingerprints.get("js/vendor/app.js").map(String::as_str),
            Some("js/vendor/app.77b2.js")
        );
        assert_eq!(config.fingerprints.len(), 3);

        let resolver = crate::helpers::AssetResolver::from_config(&config).unwrap();
        assert_eq!(resolver.resolve("css/site.css"), "/css/site.3f9a1c.css");
        assert_eq!(resolver.resolve("favicon.ico"), "/favicon.1a2b.ico");
    }

    #[test]
    fn test_fingerprints_must_be_paths() {
        let instance = "site:\n  fingerprints:\n    css/site.css: [a, b]\n";
        let store = SettingsStore::from_yaml("", instance).unwrap();
        assert!(SiteConfig::from_settings(&store).is_err());
    }

    #[test]
    fn test_invalid_site_settings() {
        let store = SettingsStore::from_yaml("", "site:\n  port: not-a-port\n").unwrap();
        assert!(SiteConfig::from_settings(&store).is_err());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url(""), "/");
        assert_eq!(normalize_url("/"), "/");
        assert_eq!(normalize_url("db/examples/"), "/db/examples");
        assert_eq!(normalize_url("//db//x"), "/db/x");
    }
}
