//! In-memory cache storage: single entities and list ranges.

use std::collections::HashMap;

use crate::rest::{EntityKey, Id, TypeRef};

use super::record::RangeRecord;
use super::traits::Entity;

type ListKey = (TypeRef, Id);

/// Everything the cache knows.
///
/// Singleton entities live in a flat map per type. List elements live in the
/// [`RangeRecord`] of their list, except for elements read one by one that
/// lie outside the record's bounds: those are kept next to it and never
/// become part of the range.
#[derive(Debug)]
pub struct CacheStorage<E> {
  entities: HashMap<TypeRef, HashMap<Id, E>>,
  lists: HashMap<TypeRef, HashMap<Id, RangeRecord<E>>>,
  outside: HashMap<ListKey, HashMap<Id, E>>,
}

impl<E> Default for CacheStorage<E> {
  fn default() -> Self {
    Self {
      entities: HashMap::new(),
      lists: HashMap::new(),
      outside: HashMap::new(),
    }
  }
}

impl<E: Entity> CacheStorage<E> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn contains(&self, type_ref: &TypeRef, list_id: Option<&Id>, id: &Id) -> bool {
    self.entry(type_ref, list_id, id).is_some()
  }

  /// A copy of the cached entity.
  pub fn get(&self, type_ref: &TypeRef, list_id: Option<&Id>, id: &Id) -> Option<E> {
    self.entry(type_ref, list_id, id).cloned()
  }

  fn entry(&self, type_ref: &TypeRef, list_id: Option<&Id>, id: &Id) -> Option<&E> {
    match list_id {
      Some(list_id) => self
        .range(type_ref, list_id)
        .and_then(|record| record.get(id))
        .or_else(|| {
          self
            .outside
            .get(&(type_ref.clone(), list_id.clone()))?
            .get(id)
        }),
      None => self.entities.get(type_ref)?.get(id),
    }
  }

  /// Store an entity, replacing any cached version.
  ///
  /// A list element whose list has no range yet starts a range holding just
  /// that element. One outside the bounds of an existing range is kept
  /// aside; the range itself is left as it is.
  pub fn put(&mut self, entity: E) {
    let EntityKey {
      type_ref,
      list_id,
      id,
    } = entity.key();
    let Some(list_id) = list_id else {
      self.entities.entry(type_ref).or_default().insert(id, entity);
      return;
    };

    let lists = self.lists.entry(type_ref.clone()).or_default();
    let Some(record) = lists.get_mut(&list_id) else {
      lists.insert(list_id, RangeRecord::single(entity));
      return;
    };
    let key = (type_ref, list_id);
    match record.insert(entity) {
      Some(entity) => {
        self.outside.entry(key).or_default().insert(id, entity);
      }
      None => {
        if let Some(outside) = self.outside.get_mut(&key) {
          outside.remove(&id);
        }
      }
    }
  }

  /// Remove an entity if it is cached. Returns whether it was.
  pub fn remove(&mut self, type_ref: &TypeRef, list_id: Option<&Id>, id: &Id) -> bool {
    match list_id {
      Some(list_id) => {
        let in_range = self
          .lists
          .get_mut(type_ref)
          .and_then(|lists| lists.get_mut(list_id))
          .is_some_and(|record| record.remove(id));
        let aside = self
          .outside
          .get_mut(&(type_ref.clone(), list_id.clone()))
          .is_some_and(|outside| outside.remove(id).is_some());
        in_range || aside
      }
      None => self
        .entities
        .get_mut(type_ref)
        .is_some_and(|entities| entities.remove(id).is_some()),
    }
  }

  pub fn range(&self, type_ref: &TypeRef, list_id: &Id) -> Option<&RangeRecord<E>> {
    self.lists.get(type_ref)?.get(list_id)
  }

  /// Replace the range of a list. Elements kept aside that the new bounds
  /// cover are dropped: within its bounds the range is complete.
  pub fn set_range(&mut self, type_ref: &TypeRef, list_id: &Id, record: RangeRecord<E>) {
    let key = (type_ref.clone(), list_id.clone());
    if let Some(outside) = self.outside.get_mut(&key) {
      outside.retain(|id, _| !record.in_bounds(id));
    }
    self
      .lists
      .entry(type_ref.clone())
      .or_default()
      .insert(list_id.clone(), record);
  }

  /// Whether `id` lies strictly between the bounds of the list's range.
  pub fn is_in_range(&self, type_ref: &TypeRef, list_id: &Id, id: &Id) -> bool {
    self
      .range(type_ref, list_id)
      .is_some_and(|record| record.strictly_within(id))
  }
}
