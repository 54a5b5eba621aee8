//! Identifiers, type tags and the JSON entity shape used on the wire.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::cache::Entity;

/// Smallest generated id. Sorts before every id the server hands out.
pub const GENERATED_MIN_ID: &str = "------------";
/// Largest generated id. Sorts after every id the server hands out.
pub const GENERATED_MAX_ID: &str = "zzzzzzzzzzzz";

/// Entity identifier.
///
/// Generated ids are ordered the way the server orders them: a shorter id is
/// always smaller, ids of equal length compare bytewise. Custom ids also use
/// this type but their order carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn min() -> Self {
    Self(GENERATED_MIN_ID.to_string())
  }

  pub fn max() -> Self {
    Self(GENERATED_MAX_ID.to_string())
  }

  pub fn is_min(&self) -> bool {
    self.0 == GENERATED_MIN_ID
  }

  pub fn is_max(&self) -> bool {
    self.0 == GENERATED_MAX_ID
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Ord for Id {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .0
      .len()
      .cmp(&other.0.len())
      .then_with(|| self.0.as_bytes().cmp(other.0.as_bytes()))
  }
}

impl PartialOrd for Id {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl fmt::Display for Id {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Id {
  fn from(id: &str) -> Self {
    Self::new(id)
  }
}

impl From<String> for Id {
  fn from(id: String) -> Self {
    Self(id)
  }
}

/// Type tag of an entity: the application it belongs to and its type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeRef {
  pub app: String,
  pub type_name: String,
}

impl TypeRef {
  pub fn new(app: impl Into<String>, type_name: impl Into<String>) -> Self {
    Self {
      app: app.into(),
      type_name: type_name.into(),
    }
  }

  /// REST path of the type, e.g. `/rest/tutanota/mail`.
  pub fn path(&self) -> String {
    format!("/rest/{}/{}", self.app, self.type_name.to_lowercase())
  }
}

impl fmt::Display for TypeRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.app, self.type_name)
  }
}

impl FromStr for TypeRef {
  type Err = color_eyre::Report;

  fn from_str(s: &str) -> Result<Self> {
    match s.split_once('/') {
      Some((app, type_name)) if !app.is_empty() && !type_name.is_empty() => {
        Ok(Self::new(app, type_name))
      }
      _ => Err(eyre!("Invalid type reference '{}', expected app/Type", s)),
    }
  }
}

impl TryFrom<String> for TypeRef {
  type Error = color_eyre::Report;

  fn try_from(s: String) -> Result<Self> {
    s.parse()
  }
}

impl From<TypeRef> for String {
  fn from(type_ref: TypeRef) -> Self {
    type_ref.to_string()
  }
}

/// Full address of a cached entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
  pub type_ref: TypeRef,
  pub list_id: Option<Id>,
  pub id: Id,
}

impl EntityKey {
  pub fn new(type_ref: &TypeRef, list_id: Option<&Id>, id: &Id) -> Self {
    Self {
      type_ref: type_ref.clone(),
      list_id: list_id.cloned(),
      id: id.clone(),
    }
  }
}

impl fmt::Display for EntityKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.list_id {
      Some(list_id) => write!(f, "{} {}/{}", self.type_ref, list_id, self.id),
      None => write!(f, "{} {}", self.type_ref, self.id),
    }
  }
}

/// An entity as the REST endpoint returns it: a JSON object with an `_id`
/// that is either `"elementId"` or `["listId", "elementId"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonEntity {
  pub type_ref: TypeRef,
  pub list_id: Option<Id>,
  pub id: Id,
  pub body: Value,
}

impl JsonEntity {
  pub fn new(type_ref: TypeRef, list_id: Option<Id>, id: Id, body: Value) -> Self {
    Self {
      type_ref,
      list_id,
      id,
      body,
    }
  }

  /// Build an entity from a server object, reading its `_id` field.
  pub fn from_value(type_ref: TypeRef, body: Value) -> Result<Self> {
    let (list_id, id) = match body.get("_id") {
      Some(Value::String(id)) => (None, Id::new(id.as_str())),
      Some(Value::Array(parts)) => match parts.as_slice() {
        [Value::String(list_id), Value::String(id)] => {
          (Some(Id::new(list_id.as_str())), Id::new(id.as_str()))
        }
        _ => return Err(eyre!("Malformed list element _id for {}: {:?}", type_ref, parts)),
      },
      _ => return Err(eyre!("Entity of type {} has no _id", type_ref)),
    };

    Ok(Self::new(type_ref, list_id, id, body))
  }
}

impl Entity for JsonEntity {
  fn type_ref(&self) -> &TypeRef {
    &self.type_ref
  }

  fn list_id(&self) -> Option<&Id> {
    self.list_id.as_ref()
  }

  fn element_id(&self) -> &Id {
    &self.id
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_shorter_id_is_smaller() {
    assert!(Id::new("zz") < Id::new("aaa"));
    assert!(Id::new("abc") < Id::new("abd"));
  }

  #[test]
  fn test_sentinels_bracket_generated_ids() {
    let id = Id::new("LRsWnx3----0");
    assert!(Id::min() < id);
    assert!(id < Id::max());
    assert!(Id::min().is_min());
    assert!(Id::max().is_max());
  }

  #[test]
  fn test_type_ref_path_and_parse() {
    let type_ref: TypeRef = "tutanota/MailFolder".parse().unwrap();
    assert_eq!(type_ref, TypeRef::new("tutanota", "MailFolder"));
    assert_eq!(type_ref.path(), "/rest/tutanota/mailfolder");
    assert_eq!(type_ref.to_string(), "tutanota/MailFolder");
    assert!("nope".parse::<TypeRef>().is_err());
    assert!("/Mail".parse::<TypeRef>().is_err());
  }

  #[test]
  fn test_json_entity_reads_list_id() {
    let mail = TypeRef::new("tutanota", "Mail");
    let entity =
      JsonEntity::from_value(mail.clone(), json!({"_id": ["list1", "elem1"], "subject": "hi"}))
        .unwrap();
    assert_eq!(entity.list_id(), Some(&Id::new("list1")));
    assert_eq!(entity.element_id(), &Id::new("elem1"));

    assert_eq!(entity.key().to_string(), "tutanota/Mail list1/elem1");

    let single = JsonEntity::from_value(mail.clone(), json!({"_id": "solo"})).unwrap();
    assert_eq!(single.list_id(), None);
    assert_eq!(single.key().to_string(), "tutanota/Mail solo");

    assert!(JsonEntity::from_value(mail.clone(), json!({"subject": "no id"})).is_err());
    assert!(JsonEntity::from_value(mail, json!({"_id": ["only-one"]})).is_err());
  }
}
