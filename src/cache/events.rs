//! Applying server change notifications to the cache.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::rest::{EntityKey, Id, RemoteStore, TypeRef};

use super::layer::RangeCache;
use super::traits::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
  #[serde(rename = "0")]
  Create,
  #[serde(rename = "1")]
  Update,
  #[serde(rename = "2")]
  Delete,
}

/// One entry of a server change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityUpdate {
  pub application: String,
  #[serde(rename = "type")]
  pub type_name: String,
  pub operation: OperationType,
  #[serde(default, deserialize_with = "deserialize_optional_id")]
  pub instance_list_id: Option<Id>,
  pub instance_id: Id,
}

impl EntityUpdate {
  pub fn new(
    type_ref: &TypeRef,
    operation: OperationType,
    instance_list_id: Option<Id>,
    instance_id: Id,
  ) -> Self {
    Self {
      application: type_ref.app.clone(),
      type_name: type_ref.type_name.clone(),
      operation,
      instance_list_id,
      instance_id,
    }
  }

  pub fn type_ref(&self) -> TypeRef {
    TypeRef::new(&self.application, &self.type_name)
  }
}

/// The server sends an empty string for entities outside any list.
fn deserialize_optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<Id>, D::Error>
where
  D: Deserializer<'de>,
{
  let id: Option<String> = Option::deserialize(deserializer)?;
  Ok(id.filter(|id| !id.is_empty()).map(Id::new))
}

impl<E: Entity, R: RemoteStore<E>> RangeCache<E, R> {
  /// Bring the cache up to date with one change notification.
  ///
  /// Only entities the cache already knows about are touched. A created list
  /// element is fetched only when it falls strictly inside the cached range
  /// of its list; anywhere else the next range read picks it up.
  ///
  /// Must not run while a single read of the same entity is in flight.
  pub async fn apply_event(&mut self, update: &EntityUpdate) -> Result<()> {
    let type_ref = update.type_ref();
    if !self.policy.is_cacheable(&type_ref) {
      return Ok(());
    }

    let list_id = update.instance_list_id.as_ref();
    let id = &update.instance_id;
    let key = EntityKey::new(&type_ref, list_id, id);

    match update.operation {
      OperationType::Update => {
        if self.storage.contains(&type_ref, list_id, id) {
          debug!(%key, "Refreshing updated entity");
          let entity = self.fetch_one(&type_ref, list_id, id).await?;
          self.storage.put(entity);
        }
      }
      OperationType::Delete => {
        if self.storage.remove(&type_ref, list_id, id) {
          debug!(%key, "Removed deleted entity");
        }
      }
      OperationType::Create => {
        if let Some(list_id) = list_id {
          if self.storage.is_in_range(&type_ref, list_id, id) {
            debug!(%key, "Loading created list element");
            let entity = self.fetch_one(&type_ref, Some(list_id), id).await?;
            self.storage.put(entity);
          }
        }
      }
    }
    Ok(())
  }

  /// Apply a batch of notifications in order, stopping at the first error.
  pub async fn apply_events(&mut self, updates: &[EntityUpdate]) -> Result<()> {
    for update in updates {
      self.apply_event(update).await?;
    }
    Ok(())
  }
}
