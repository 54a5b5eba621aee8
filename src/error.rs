//! Error types for cache operations

use thiserror::Error;

use crate::rest::Id;

/// Errors returned by [`RangeCache`](crate::cache::RangeCache).
///
/// None of these are retried by the cache.
#[derive(Debug, Error)]
pub enum CacheError {
  /// The remote store failed; the error is passed through as is.
  #[error(transparent)]
  Transport(#[from] color_eyre::Report),

  /// A parameter combination the cache does not support.
  #[error("invalid request params: {0}")]
  InvalidRequest(String),

  /// A range read starting outside the cached range, moving towards it.
  #[error(
    "invalid range request. path: {path} list: {list_id} start: {start} count: {count} \
     reverse: {reverse} lower: {lower} upper: {upper}"
  )]
  InvalidRange {
    path: String,
    list_id: Id,
    start: Id,
    count: usize,
    reverse: bool,
    lower: Id,
    upper: Id,
  },
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
