//! In-memory remote store for cache tests.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Mutex;

use crate::rest::{
  HttpMethod, Id, JsonEntity, RemoteStore, RestRequest, RestResponse, TypeRef, PARAM_COUNT,
  PARAM_IDS, PARAM_REVERSE, PARAM_START,
};

/// Pads a short name into a 12 character generated id so it sorts between
/// MIN and MAX.
pub fn gid(s: &str) -> Id {
  Id::new(format!("{:0>12}", s))
}

pub fn mail_type() -> TypeRef {
  TypeRef::new("tutanota", "Mail")
}

pub fn mail(list: &str, id: &str) -> JsonEntity {
  JsonEntity::new(
    mail_type(),
    Some(Id::new(list)),
    gid(id),
    json!({ "subject": id }),
  )
}

type ListKey = (TypeRef, Option<Id>);

/// Serves entities from memory and logs every request it gets.
#[derive(Default)]
pub struct FakeRemote {
  data: Mutex<HashMap<ListKey, BTreeMap<Id, JsonEntity>>>,
  log: Mutex<Vec<RestRequest<JsonEntity>>>,
  /// Requests still allowed to succeed, then requests to fail
  failures: Mutex<(usize, usize)>,
}

impl FakeRemote {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&self, entity: JsonEntity) {
    let key = (entity.type_ref.clone(), entity.list_id.clone());
    self
      .data
      .lock()
      .unwrap()
      .entry(key)
      .or_default()
      .insert(entity.id.clone(), entity);
  }

  pub fn remove(&self, type_ref: &TypeRef, list_id: Option<&Id>, id: &Id) {
    let key = (type_ref.clone(), list_id.cloned());
    if let Some(entities) = self.data.lock().unwrap().get_mut(&key) {
      entities.remove(id);
    }
  }

  /// Make the next `n` requests fail.
  pub fn fail_next(&self, n: usize) {
    *self.failures.lock().unwrap() = (0, n);
  }

  /// Let `n` requests through, then fail one.
  pub fn fail_after(&self, n: usize) {
    *self.failures.lock().unwrap() = (n, 1);
  }

  pub fn requests(&self) -> Vec<RestRequest<JsonEntity>> {
    self.log.lock().unwrap().clone()
  }

  pub fn request_count(&self) -> usize {
    self.log.lock().unwrap().len()
  }

  /// `(start, count, reverse)` of every range request so far.
  pub fn range_requests(&self) -> Vec<(Id, usize, bool)> {
    self
      .requests()
      .iter()
      .filter_map(|r| {
        Some((
          Id::new(r.param(PARAM_START)?),
          r.param(PARAM_COUNT)?.parse().ok()?,
          r.param(PARAM_REVERSE)? == "true",
        ))
      })
      .collect()
  }

  /// What the server answers to a range request, bypassing the log.
  pub fn range(&self, list_id: &str, start: &Id, count: usize, reverse: bool) -> Vec<JsonEntity> {
    let data = self.data.lock().unwrap();
    let Some(entities) = data.get(&(mail_type(), Some(Id::new(list_id)))) else {
      return Vec::new();
    };
    if reverse {
      entities
        .range(..start.clone())
        .rev()
        .take(count)
        .map(|(_, e)| e.clone())
        .collect()
    } else {
      entities
        .range((Bound::Excluded(start.clone()), Bound::Unbounded))
        .take(count)
        .map(|(_, e)| e.clone())
        .collect()
    }
  }

  fn answer(&self, request: &RestRequest<JsonEntity>) -> Result<RestResponse<JsonEntity>> {
    if request.method != HttpMethod::Get {
      return Ok(RestResponse::Data(json!({})));
    }

    let key = (request.type_ref.clone(), request.list_id.clone());
    let data = self.data.lock().unwrap();
    let entities = data.get(&key);

    if let Some(id) = &request.id {
      return entities
        .and_then(|entities| entities.get(id))
        .cloned()
        .map(RestResponse::Entity)
        .ok_or_else(|| eyre!("{} {} not found", request.type_ref, id));
    }

    if let Some(ids) = request.param(PARAM_IDS) {
      let found = ids
        .split(',')
        .filter_map(|id| entities?.get(&Id::new(id)).cloned())
        .collect();
      return Ok(RestResponse::Entities(found));
    }

    let start = Id::new(request.param(PARAM_START).unwrap_or_default());
    let count: usize = request
      .param(PARAM_COUNT)
      .and_then(|c| c.parse().ok())
      .unwrap_or(0);
    let reverse = request.param(PARAM_REVERSE) == Some("true");
    let Some(entities) = entities else {
      return Ok(RestResponse::Entities(Vec::new()));
    };
    let found = if reverse {
      entities
        .range(..start)
        .rev()
        .take(count)
        .map(|(_, e)| e.clone())
        .collect()
    } else {
      entities
        .range((Bound::Excluded(start), Bound::Unbounded))
        .take(count)
        .map(|(_, e)| e.clone())
        .collect()
    };
    Ok(RestResponse::Entities(found))
  }
}

#[async_trait]
impl RemoteStore<JsonEntity> for FakeRemote {
  async fn request(&self, request: RestRequest<JsonEntity>) -> Result<RestResponse<JsonEntity>> {
    self.log.lock().unwrap().push(request.clone());
    {
      let mut failures = self.failures.lock().unwrap();
      let (pass, fail) = &mut *failures;
      if *pass > 0 {
        *pass -= 1;
      } else if *fail > 0 {
        *fail -= 1;
        return Err(eyre!("remote store unavailable"));
      }
    }
    self.answer(&request)
  }
}
