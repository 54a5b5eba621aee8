//! REST entity store interface and its HTTP implementation.

mod client;
mod types;

pub use client::HttpRemoteStore;
pub use types::{EntityKey, Id, JsonEntity, TypeRef, GENERATED_MAX_ID, GENERATED_MIN_ID};

use async_trait::async_trait;
use color_eyre::Result;
use std::collections::BTreeMap;
use std::fmt;

/// Query parameters of a request, sorted by name.
pub type QueryParams = BTreeMap<String, String>;

pub const PARAM_START: &str = "start";
pub const PARAM_COUNT: &str = "count";
pub const PARAM_REVERSE: &str = "reverse";
pub const PARAM_IDS: &str = "ids";
pub const PARAM_VERSION: &str = "version";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
  Get,
  Post,
  Put,
  Delete,
}

impl fmt::Display for HttpMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Get => "GET",
      Self::Post => "POST",
      Self::Put => "PUT",
      Self::Delete => "DELETE",
    };
    f.write_str(name)
  }
}

/// A request against the entity store, keyed by type + list id + element id.
#[derive(Debug, Clone)]
pub struct RestRequest<E> {
  pub type_ref: TypeRef,
  pub method: HttpMethod,
  pub list_id: Option<Id>,
  pub id: Option<Id>,
  pub body: Option<E>,
  pub params: QueryParams,
}

impl<E> RestRequest<E> {
  pub fn new(method: HttpMethod, type_ref: TypeRef) -> Self {
    Self {
      type_ref,
      method,
      list_id: None,
      id: None,
      body: None,
      params: QueryParams::new(),
    }
  }

  pub fn get(type_ref: TypeRef) -> Self {
    Self::new(HttpMethod::Get, type_ref)
  }

  /// A range read of `count` elements after (or, reversed, before) `start`.
  pub fn range(type_ref: TypeRef, list_id: Id, start: &Id, count: usize, reverse: bool) -> Self {
    Self::get(type_ref)
      .with_list(list_id)
      .with_param(PARAM_START, start.as_str())
      .with_param(PARAM_COUNT, count.to_string())
      .with_param(PARAM_REVERSE, reverse.to_string())
  }

  pub fn with_list(mut self, list_id: Id) -> Self {
    self.list_id = Some(list_id);
    self
  }

  pub fn with_id(mut self, id: Id) -> Self {
    self.id = Some(id);
    self
  }

  pub fn with_body(mut self, body: E) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
    self.params.insert(name.to_string(), value.into());
    self
  }

  pub fn param(&self, name: &str) -> Option<&str> {
    self.params.get(name).map(String::as_str)
  }
}

/// What the store answered.
#[derive(Debug, Clone, PartialEq)]
pub enum RestResponse<E> {
  /// No content (e.g. a DELETE)
  Empty,
  /// A single entity
  Entity(E),
  /// A range or batch of entities, in the order the server returned them
  Entities(Vec<E>),
  /// A payload that is not an entity (e.g. the id returned by a POST)
  Data(serde_json::Value),
}

impl<E> RestResponse<E> {
  pub fn into_entity(self) -> Result<E> {
    match self {
      Self::Entity(entity) => Ok(entity),
      other => Err(color_eyre::eyre::eyre!(
        "Expected a single entity, got {}",
        other.kind()
      )),
    }
  }

  pub fn into_entities(self) -> Result<Vec<E>> {
    match self {
      Self::Entities(entities) => Ok(entities),
      other => Err(color_eyre::eyre::eyre!(
        "Expected a list of entities, got {}",
        other.kind()
      )),
    }
  }

  fn kind(&self) -> &'static str {
    match self {
      Self::Empty => "an empty response",
      Self::Entity(_) => "a single entity",
      Self::Entities(_) => "a list of entities",
      Self::Data(_) => "a non-entity payload",
    }
  }
}

/// The remote entity store the cache sits in front of.
///
/// Timeouts and retries are the implementor's business; whatever error it
/// returns is handed to the caller unchanged.
#[async_trait]
pub trait RemoteStore<E: Send + 'static>: Send + Sync {
  async fn request(&self, request: RestRequest<E>) -> Result<RestResponse<E>>;
}
