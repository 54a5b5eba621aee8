use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, RemoteConfig};

use super::types::JsonEntity;
use super::{HttpMethod, RemoteStore, RestRequest, RestResponse};

const ACCESS_TOKEN_HEADER: &str = "accessToken";

/// Entity store client speaking JSON over HTTP.
#[derive(Clone)]
pub struct HttpRemoteStore {
  client: reqwest::Client,
  base_url: Url,
  access_token: Option<String>,
  max_retries: u32,
}

impl HttpRemoteStore {
  pub fn new(config: &Config) -> Result<Self> {
    Self::from_remote_config(&config.remote, Config::get_access_token())
  }

  pub fn from_remote_config(remote: &RemoteConfig, access_token: Option<String>) -> Result<Self> {
    let base_url =
      Url::parse(&remote.url).map_err(|e| eyre!("Invalid remote url {}: {}", remote.url, e))?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(remote.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      access_token,
      max_retries: remote.max_retries,
    })
  }

  /// Build `{base}/rest/{app}/{type}[/{listId}][/{id}]?{params}`.
  fn url_for(&self, request: &RestRequest<JsonEntity>) -> Result<Url> {
    let mut url = self.base_url.clone();
    {
      let mut segments = url
        .path_segments_mut()
        .map_err(|_| eyre!("Remote url {} cannot be a base", self.base_url))?;
      segments.pop_if_empty();
      segments.extend(request.type_ref.path().trim_start_matches('/').split('/'));
      if let Some(list_id) = &request.list_id {
        segments.push(list_id.as_str());
      }
      if let Some(id) = &request.id {
        segments.push(id.as_str());
      }
    }

    if !request.params.is_empty() {
      url.query_pairs_mut().extend_pairs(request.params.iter());
    }

    Ok(url)
  }

  async fn send_once(&self, request: &RestRequest<JsonEntity>, url: &Url) -> Result<Vec<u8>> {
    let method = match request.method {
      HttpMethod::Get => reqwest::Method::GET,
      HttpMethod::Post => reqwest::Method::POST,
      HttpMethod::Put => reqwest::Method::PUT,
      HttpMethod::Delete => reqwest::Method::DELETE,
    };

    let mut builder = self.client.request(method, url.clone());
    if let Some(token) = &self.access_token {
      builder = builder.header(ACCESS_TOKEN_HEADER, token);
    }
    if let Some(body) = &request.body {
      let data = serde_json::to_vec(&body.body)
        .map_err(|e| eyre!("Failed to serialize {}: {}", body.type_ref, e))?;
      builder = builder
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .body(data);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| eyre!("{} {} failed: {}", request.method, url, e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(eyre!("{} {} failed with status {}", request.method, url, status));
    }

    let bytes = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read response of {} {}: {}", request.method, url, e))?;

    Ok(bytes.to_vec())
  }

  fn parse_response(
    request: &RestRequest<JsonEntity>,
    data: &[u8],
  ) -> Result<RestResponse<JsonEntity>> {
    if data.is_empty() {
      return Ok(RestResponse::Empty);
    }

    let value: Value = serde_json::from_slice(data)
      .map_err(|e| eyre!("Failed to parse response for {}: {}", request.type_ref, e))?;

    if request.method != HttpMethod::Get {
      return Ok(RestResponse::Data(value));
    }

    match value {
      Value::Array(items) => {
        let entities = items
          .into_iter()
          .map(|item| JsonEntity::from_value(request.type_ref.clone(), item))
          .collect::<Result<Vec<_>>>()?;
        Ok(RestResponse::Entities(entities))
      }
      value => Ok(RestResponse::Entity(JsonEntity::from_value(
        request.type_ref.clone(),
        value,
      )?)),
    }
  }
}

#[async_trait]
impl RemoteStore<JsonEntity> for HttpRemoteStore {
  async fn request(&self, request: RestRequest<JsonEntity>) -> Result<RestResponse<JsonEntity>> {
    let url = self.url_for(&request)?;
    // Only reads are safe to repeat.
    let attempts = if request.method == HttpMethod::Get {
      self.max_retries + 1
    } else {
      1
    };

    let mut attempt = 1;
    let data = loop {
      debug!(method = %request.method, %url, attempt, "Sending request");
      match self.send_once(&request, &url).await {
        Ok(data) => break data,
        Err(e) if attempt < attempts => {
          warn!(method = %request.method, %url, attempt, "Request failed, retrying: {}", e);
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    };

    Self::parse_response(&request, &data)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rest::{Id, TypeRef};

  fn store(url: &str) -> HttpRemoteStore {
    let remote = RemoteConfig {
      url: url.to_string(),
      timeout_secs: 5,
      max_retries: 0,
    };
    HttpRemoteStore::from_remote_config(&remote, None).unwrap()
  }

  #[test]
  fn test_range_url() {
    let request: RestRequest<JsonEntity> = RestRequest::range(
      TypeRef::new("tutanota", "Mail"),
      Id::new("list1"),
      &Id::max(),
      100,
      true,
    );
    let url = store("https://mail.example.com/").url_for(&request).unwrap();
    assert_eq!(
      url.as_str(),
      "https://mail.example.com/rest/tutanota/mail/list1?count=100&reverse=true&start=zzzzzzzzzzzz"
    );
  }

  #[test]
  fn test_element_url_keeps_base_path() {
    let request: RestRequest<JsonEntity> =
      RestRequest::get(TypeRef::new("sys", "Customer")).with_id(Id::new("c1"));
    let url = store("https://example.com/api").url_for(&request).unwrap();
    assert_eq!(url.as_str(), "https://example.com/api/rest/sys/customer/c1");
  }

  #[test]
  fn test_parse_get_array_and_object() {
    let request: RestRequest<JsonEntity> = RestRequest::get(TypeRef::new("tutanota", "Mail"))
      .with_list(Id::new("l"))
      .with_param("ids", "a,b");
    let parsed = HttpRemoteStore::parse_response(
      &request,
      br#"[{"_id":["l","a"]},{"_id":["l","b"]}]"#,
    )
    .unwrap();
    let entities = parsed.into_entities().unwrap();
    assert_eq!(entities.len(), 2);
    assert_eq!(entities[1].id, Id::new("b"));

    let single = HttpRemoteStore::parse_response(&request, br#"{"_id":["l","a"]}"#).unwrap();
    assert!(matches!(single, RestResponse::Entity(_)));
    assert!(matches!(
      HttpRemoteStore::parse_response(&request, b"").unwrap(),
      RestResponse::Empty
    ));
  }

  #[test]
  fn test_parse_write_response_is_data() {
    let request: RestRequest<JsonEntity> =
      RestRequest::new(HttpMethod::Post, TypeRef::new("tutanota", "Mail")).with_list(Id::new("l"));
    let parsed =
      HttpRemoteStore::parse_response(&request, br#"{"generatedId":"abc"}"#).unwrap();
    assert_eq!(
      parsed,
      RestResponse::Data(serde_json::json!({"generatedId": "abc"}))
    );
  }
}
