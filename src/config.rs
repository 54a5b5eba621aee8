use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::rest::TypeRef;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub remote: RemoteConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  /// Base url of the entity server (e.g., "https://mail.example.com")
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Extra attempts for failed GET requests
  #[serde(default)]
  pub max_retries: u32,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Types that are never served from the cache (volatile or sensitive)
  #[serde(default = "default_ignored_types")]
  pub ignored_types: Vec<TypeRef>,
  /// Applications whose types are never cached (case-insensitive)
  #[serde(
    default = "default_ignored_apps",
    deserialize_with = "deserialize_lowercase_set"
  )]
  pub ignored_apps: BTreeSet<String>,
  /// Types whose ids are chosen by the client and carry no order
  #[serde(default)]
  pub custom_id_types: Vec<TypeRef>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ignored_types: default_ignored_types(),
      ignored_apps: default_ignored_apps(),
      custom_id_types: Vec::new(),
    }
  }
}

fn default_ignored_types() -> Vec<TypeRef> {
  [
    ("sys", "EntityEventBatch"),
    ("sys", "Permission"),
    ("sys", "BucketPermission"),
    ("sys", "Session"),
    ("tutanota", "StatisticLogEntry"),
    ("sys", "SecondFactor"),
    ("sys", "RecoverCode"),
  ]
  .into_iter()
  .map(|(app, type_name)| TypeRef::new(app, type_name))
  .collect()
}

fn default_ignored_apps() -> BTreeSet<String> {
  BTreeSet::from(["monitor".to_string()])
}

fn deserialize_lowercase_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(v.into_iter().map(|s| s.to_lowercase()).collect())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
  /// tracing filter directive (e.g., "entity_cache=debug")
  pub filter: Option<String>,
  /// Write logs to a daily file in this directory instead of stderr
  pub directory: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./entity-cache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/entity-cache/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/entity-cache/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("entity-cache.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("entity-cache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  /// Get the access token from the environment, if one is set.
  ///
  /// Reads ENTITY_CACHE_ACCESS_TOKEN.
  pub fn get_access_token() -> Option<String> {
    std::env::var("ENTITY_CACHE_ACCESS_TOKEN").ok()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::from_yaml("remote:\n  url: https://example.com\n").unwrap();
    assert_eq!(config.remote.timeout_secs, 30);
    assert_eq!(config.remote.max_retries, 0);
    assert!(config.cache.ignored_apps.contains("monitor"));
    assert!(config
      .cache
      .ignored_types
      .contains(&TypeRef::new("sys", "Session")));
    assert!(config.cache.custom_id_types.is_empty());
    assert!(config.log.directory.is_none());
  }

  #[test]
  fn test_cache_section_overrides() {
    let yaml = r#"
remote:
  url: https://example.com
  max_retries: 2
cache:
  ignored_types: ["tutanota/Draft"]
  ignored_apps: ["Monitor", "Usage"]
  custom_id_types: ["sys/MailAddressToGroup"]
log:
  filter: entity_cache=debug
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.remote.max_retries, 2);
    assert_eq!(config.cache.ignored_types, vec![TypeRef::new("tutanota", "Draft")]);
    assert_eq!(
      config.cache.ignored_apps,
      BTreeSet::from(["monitor".to_string(), "usage".to_string()])
    );
    assert_eq!(
      config.cache.custom_id_types,
      vec![TypeRef::new("sys", "MailAddressToGroup")]
    );
    assert_eq!(config.log.filter.as_deref(), Some("entity_cache=debug"));
  }

  #[test]
  fn test_bad_type_ref_is_rejected() {
    let yaml = "remote:\n  url: x\ncache:\n  ignored_types: [\"NoSlash\"]\n";
    assert!(Config::from_yaml(yaml).is_err());
  }

  #[test]
  fn test_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/entity-cache.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
