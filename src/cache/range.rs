//! Loading list ranges through the cache.

use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::rest::{Id, RemoteStore, RestRequest, TypeRef};

use super::layer::RangeCache;
use super::record::{RangePlan, RangeRecord};
use super::traits::Entity;

/// Upper limit on remote requests for a single range load.
pub(super) const MAX_RANGE_FETCHES: usize = 256;

impl<E: Entity, R: RemoteStore<E>> RangeCache<E, R> {
  /// Load `count` elements of a list after `start` (before it when
  /// `reverse`), in the order of travel.
  ///
  /// Only the part of the range that is not cached yet is requested from
  /// the remote store. The cached range is extended as a whole and replaced
  /// only once every request of this load has succeeded.
  pub async fn load_range(
    &mut self,
    type_ref: &TypeRef,
    list_id: &Id,
    start: &Id,
    count: usize,
    reverse: bool,
  ) -> Result<Vec<E>> {
    if count == 0 {
      return Err(CacheError::InvalidRequest(
        "count must be a positive integer, got '0'".to_string(),
      ));
    }

    let mut record = match self.storage.range(type_ref, list_id) {
      None => return self.reset_range(type_ref, list_id, start, count, reverse).await,
      Some(record) => {
        if record.plan(start, reverse) == RangePlan::Inside
          && record.gap(start, count, reverse).count == 0
        {
          debug!(%type_ref, %list_id, %start, count, reverse, "Range served from cache");
          return Ok(record.provide(start, count, reverse));
        }
        record.clone()
      }
    };

    let mut fetches = 0;
    loop {
      if fetches == MAX_RANGE_FETCHES {
        warn!(
          %type_ref, %list_id, %start, count, reverse, fetches,
          "Giving up on range load after too many requests"
        );
        break;
      }

      let (fetch_start, fetch_count) = match record.plan(start, reverse) {
        RangePlan::Reset => {
          return self.reset_range(type_ref, list_id, start, count, reverse).await;
        }
        RangePlan::Invalid => {
          return Err(CacheError::InvalidRange {
            path: type_ref.path(),
            list_id: list_id.clone(),
            start: start.clone(),
            count,
            reverse,
            lower: record.lower().clone(),
            upper: record.upper().clone(),
          });
        }
        RangePlan::Inside => {
          let gap = record.gap(start, count, reverse);
          if gap.count == 0 {
            break;
          }
          (gap.start, gap.count)
        }
        // Load from the cached edge, not from `start`, so the range stays
        // gap-free.
        RangePlan::Outside => (record.fetch_edge(reverse).clone(), count),
      };

      debug!(%type_ref, %list_id, start = %fetch_start, count = fetch_count, reverse, "Loading range");
      let fetched = self
        .fetch_range(type_ref, list_id, &fetch_start, fetch_count, reverse)
        .await?;
      fetches += 1;
      let exhausted = fetched.len() < fetch_count;

      let known_before = record.ids().len();
      let bound_before = edge_bound(&record, reverse).clone();
      record.merge(fetched, fetch_count, reverse);

      if exhausted || record.available(start, reverse) >= count {
        break;
      }
      if record.ids().len() == known_before && edge_bound(&record, reverse) == &bound_before {
        warn!(
          %type_ref, %list_id, start = %fetch_start, reverse,
          "Remote store returned no new elements for a range request"
        );
        break;
      }
    }

    let result = record.provide(start, count, reverse);
    self.storage.set_range(type_ref, list_id, record);
    Ok(result)
  }

  /// Replace the cached range with a fresh one loaded from `start`.
  async fn reset_range(
    &mut self,
    type_ref: &TypeRef,
    list_id: &Id,
    start: &Id,
    count: usize,
    reverse: bool,
  ) -> Result<Vec<E>> {
    debug!(%type_ref, %list_id, %start, count, reverse, "Loading new range");
    let fetched = self
      .fetch_range(type_ref, list_id, start, count, reverse)
      .await?;

    let mut record = RangeRecord::new(start.clone());
    record.merge(fetched, count, reverse);
    let result = record.provide(start, count, reverse);
    self.storage.set_range(type_ref, list_id, record);
    Ok(result)
  }

  async fn fetch_range(
    &self,
    type_ref: &TypeRef,
    list_id: &Id,
    start: &Id,
    count: usize,
    reverse: bool,
  ) -> Result<Vec<E>> {
    let request = RestRequest::range(type_ref.clone(), list_id.clone(), start, count, reverse);
    Ok(self.remote.request(request).await?.into_entities()?)
  }
}

/// The bound a load in this direction moves.
fn edge_bound<E: Entity>(record: &RangeRecord<E>, reverse: bool) -> &Id {
  if reverse {
    record.lower()
  } else {
    record.upper()
  }
}
