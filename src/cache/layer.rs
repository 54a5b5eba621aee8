//! Cache layer that sits between the application and the remote store.

use tracing::debug;

use crate::error::{CacheError, Result};
use crate::rest::{
  EntityKey, HttpMethod, Id, RemoteStore, RestRequest, RestResponse, TypeRef, PARAM_COUNT,
  PARAM_IDS, PARAM_REVERSE, PARAM_START, PARAM_VERSION,
};

use super::policy::CachePolicy;
use super::storage::CacheStorage;
use super::traits::{Entity, TypeResolver};

/// Read-through cache in front of a [`RemoteStore`].
///
/// Reads are answered from memory when possible; everything else goes to
/// the remote store untouched. Single entities are cached by id, list
/// elements in one contiguous range per list (see
/// [`RangeRecord`](super::RangeRecord)). The cache is kept current by feeding
/// it the server's change notifications through
/// [`apply_event`](Self::apply_event).
///
/// All operations take `&mut self`: one owner drives the cache, so a range
/// load and an event for the same list can never interleave.
pub struct RangeCache<E, R> {
  pub(super) remote: R,
  pub(super) resolver: Box<dyn TypeResolver>,
  pub(super) policy: CachePolicy,
  pub(super) storage: CacheStorage<E>,
}

impl<E: Entity, R: RemoteStore<E>> RangeCache<E, R> {
  /// Create a cache in front of `remote` with the default non-cacheable set.
  pub fn new(remote: R, resolver: impl TypeResolver + 'static) -> Self {
    Self {
      remote,
      resolver: Box::new(resolver),
      policy: CachePolicy::default(),
      storage: CacheStorage::new(),
    }
  }

  /// Set which types are never cached.
  pub fn with_policy(mut self, policy: CachePolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn remote(&self) -> &R {
    &self.remote
  }

  pub fn storage(&self) -> &CacheStorage<E> {
    &self.storage
  }

  /// Execute a request, answering reads from the cache where possible.
  ///
  /// Takes the same request as [`RemoteStore::request`].
  pub async fn request(&mut self, request: RestRequest<E>) -> Result<RestResponse<E>> {
    if request.method != HttpMethod::Get
      || !self.policy.is_cacheable(&request.type_ref)
      || request.param(PARAM_VERSION).is_some()
    {
      return Ok(self.remote.request(request).await?);
    }

    if request.id.is_none() && request.param(PARAM_IDS).is_some() {
      // Batch reads are never answered from the cache, only remembered.
      let response = self.remote.request(request).await?;
      if let RestResponse::Entities(entities) = &response {
        for entity in entities {
          self.storage.put(entity.clone());
        }
      }
      return Ok(response);
    }

    if let (Some(list_id), None) = (&request.list_id, &request.id) {
      if let Some((start, count, reverse)) = range_params(&request)? {
        if self.resolver.is_orderable_id(&request.type_ref) {
          let list_id = list_id.clone();
          let entities = self
            .load_range(&request.type_ref, &list_id, &start, count, reverse)
            .await?;
          return Ok(RestResponse::Entities(entities));
        }
        // Only ranges of generated ids are cached.
        return Ok(self.remote.request(request).await?);
      }
    }

    if let Some(id) = &request.id {
      let entity = self
        .load(&request.type_ref, request.list_id.as_ref(), id)
        .await?;
      return Ok(RestResponse::Entity(entity));
    }

    Err(CacheError::InvalidRequest(format!(
      "{} list: {:?} id: {:?} params: {:?}",
      request.type_ref,
      request.list_id.as_ref().map(Id::as_str),
      request.id.as_ref().map(Id::as_str),
      request.params
    )))
  }

  /// Load a single entity, from the cache if it is there.
  pub async fn load(&mut self, type_ref: &TypeRef, list_id: Option<&Id>, id: &Id) -> Result<E> {
    if !self.policy.is_cacheable(type_ref) {
      return self.fetch_one(type_ref, list_id, id).await;
    }

    let key = EntityKey::new(type_ref, list_id, id);
    if let Some(entity) = self.storage.get(type_ref, list_id, id) {
      debug!(%key, "Cache hit");
      return Ok(entity);
    }

    debug!(%key, "Cache miss");
    let entity = self.fetch_one(type_ref, list_id, id).await?;
    self.storage.put(entity.clone());
    Ok(entity)
  }

  /// Load several entities by id. Always goes to the remote store; the
  /// results are cached for later single reads.
  pub async fn load_multiple(
    &mut self,
    type_ref: &TypeRef,
    list_id: Option<&Id>,
    ids: &[Id],
  ) -> Result<Vec<E>> {
    let joined = ids.iter().map(Id::as_str).collect::<Vec<_>>().join(",");
    let mut request = RestRequest::get(type_ref.clone()).with_param(PARAM_IDS, joined);
    request.list_id = list_id.cloned();

    Ok(self.request(request).await?.into_entities()?)
  }

  /// Fetch a single entity from the remote store without touching the cache.
  pub(super) async fn fetch_one(
    &self,
    type_ref: &TypeRef,
    list_id: Option<&Id>,
    id: &Id,
  ) -> Result<E> {
    let mut request = RestRequest::get(type_ref.clone()).with_id(id.clone());
    request.list_id = list_id.cloned();

    Ok(self.remote.request(request).await?.into_entity()?)
  }
}

/// Parse `start`, `count` and `reverse` if the request is a range read.
/// All three must be present; a partial set is not a range read.
fn range_params<E>(request: &RestRequest<E>) -> Result<Option<(Id, usize, bool)>> {
  let (Some(start), Some(count), Some(reverse)) = (
    request.param(PARAM_START),
    request.param(PARAM_COUNT),
    request.param(PARAM_REVERSE),
  ) else {
    return Ok(None);
  };

  let count = match count.parse::<usize>() {
    Ok(count) if count > 0 => count,
    _ => {
      return Err(CacheError::InvalidRequest(format!(
        "count must be a positive integer, got '{}'",
        count
      )))
    }
  };

  let reverse = match reverse {
    "true" => true,
    "false" => false,
    other => {
      return Err(CacheError::InvalidRequest(format!(
        "reverse must be 'true' or 'false', got '{}'",
        other
      )))
    }
  };

  Ok(Some((Id::new(start), count, reverse)))
}
