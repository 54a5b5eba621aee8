//! Which types the cache may hold, and which of them get range caching.

use std::collections::{BTreeSet, HashSet};

use crate::config::CacheConfig;
use crate::rest::TypeRef;

use super::traits::TypeResolver;

/// The non-cacheable set: single types plus whole applications.
#[derive(Debug, Clone)]
pub struct CachePolicy {
  ignored_types: HashSet<TypeRef>,
  ignored_apps: BTreeSet<String>,
}

impl CachePolicy {
  pub fn new(
    ignored_types: impl IntoIterator<Item = TypeRef>,
    ignored_apps: impl IntoIterator<Item = String>,
  ) -> Self {
    Self {
      ignored_types: ignored_types.into_iter().collect(),
      ignored_apps: ignored_apps
        .into_iter()
        .map(|app| app.to_lowercase())
        .collect(),
    }
  }

  pub fn is_ignored_app(&self, app: &str) -> bool {
    self.ignored_apps.contains(&app.to_lowercase())
  }

  pub fn is_cacheable(&self, type_ref: &TypeRef) -> bool {
    !self.is_ignored_app(&type_ref.app) && !self.ignored_types.contains(type_ref)
  }
}

impl Default for CachePolicy {
  fn default() -> Self {
    Self::from(&CacheConfig::default())
  }
}

impl From<&CacheConfig> for CachePolicy {
  fn from(config: &CacheConfig) -> Self {
    Self::new(
      config.ignored_types.iter().cloned(),
      config.ignored_apps.iter().cloned(),
    )
  }
}

/// [`TypeResolver`] that treats every type as server-generated unless it is
/// listed as a custom id type.
#[derive(Debug, Clone, Default)]
pub struct IdTypeRegistry {
  custom_id_types: HashSet<TypeRef>,
}

impl IdTypeRegistry {
  pub fn new(custom_id_types: impl IntoIterator<Item = TypeRef>) -> Self {
    Self {
      custom_id_types: custom_id_types.into_iter().collect(),
    }
  }
}

impl From<&CacheConfig> for IdTypeRegistry {
  fn from(config: &CacheConfig) -> Self {
    Self::new(config.custom_id_types.iter().cloned())
  }
}

impl TypeResolver for IdTypeRegistry {
  fn is_orderable_id(&self, type_ref: &TypeRef) -> bool {
    !self.custom_id_types.contains(type_ref)
  }
}
