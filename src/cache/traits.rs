//! Core traits for the caching system.

use crate::rest::{EntityKey, Id, TypeRef};

/// Trait for entities that can be cached.
///
/// The cache keeps its own clones: whatever a caller does with an entity it
/// got back never reaches the cached copy.
pub trait Entity: Clone + Send + Sync + 'static {
  /// Type tag used to key the cache
  fn type_ref(&self) -> &TypeRef;

  /// List this entity belongs to, `None` for singleton entities
  fn list_id(&self) -> Option<&Id>;

  /// Id of the entity, unique within its list (or type for singletons)
  fn element_id(&self) -> &Id;

  fn key(&self) -> EntityKey {
    EntityKey::new(self.type_ref(), self.list_id(), self.element_id())
  }
}

/// Tells the cache how a type's ids are produced.
pub trait TypeResolver: Send + Sync {
  /// `true` if ids of this type are server generated and therefore ordered.
  /// Only such types get range caching.
  fn is_orderable_id(&self, type_ref: &TypeRef) -> bool;
}

impl<F> TypeResolver for F
where
  F: Fn(&TypeRef) -> bool + Send + Sync,
{
  fn is_orderable_id(&self, type_ref: &TypeRef) -> bool {
    self(type_ref)
  }
}
