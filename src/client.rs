//! Client scope for per-browser state the server keeps on its behalf: lesson
//! annotations and saved GitHub settings. An id is issued by
//! `POST /api/v1/clients` and sent back in the `x-planner-client` header (or the
//! `client_id` query parameter of the sketch socket).

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::ApiError;
use crate::util::is_valid_class_id;

pub const CLIENT_HEADER: &str = "x-planner-client";

const MAX_LEN: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientId(String);

impl ClientId {
  pub fn issue() -> Self {
    Self(Uuid::new_v4().simple().to_string())
  }

  /// Ids become part of store keys, so only `[A-Za-z0-9_-]` is accepted.
  pub fn parse(raw: &str) -> Result<Self, ApiError> {
    if raw.len() > MAX_LEN || !is_valid_class_id(raw) {
      return Err(ApiError::BadRequest(format!("invalid client id {:?}", raw)));
    }
    Ok(Self(raw.to_string()))
  }

  /// Client named by the request headers, if any. A present but unusable
  /// header is an error rather than an anonymous request.
  pub fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, ApiError> {
    let Some(value) = headers.get(CLIENT_HEADER) else { return Ok(None) };
    let raw = value
      .to_str()
      .map_err(|_| ApiError::BadRequest(format!("{} header is not text", CLIENT_HEADER)))?;
    Self::parse(raw).map(Some)
  }

  pub fn require(headers: &HeaderMap) -> Result<Self, ApiError> {
    Self::from_headers(headers)?
      .ok_or_else(|| ApiError::BadRequest(format!("missing {} header; request an id from /api/v1/clients", CLIENT_HEADER)))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Store key for this client's entry of `kind` under `key`.
  pub fn scoped(&self, kind: &str, key: &str) -> String {
    format!("{}:{}:{}", kind, self.0, key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderValue;

  #[test]
  fn issued_ids_are_distinct_and_parse_back() {
    let a = ClientId::issue();
    let b = ClientId::issue();
    assert_ne!(a, b);
    assert_eq!(ClientId::parse(a.as_str()).unwrap(), a);
  }

  #[test]
  fn ids_are_restricted_to_key_safe_characters() {
    assert!(ClientId::parse("").is_err());
    assert!(ClientId::parse("a:b").is_err());
    assert!(ClientId::parse(&"x".repeat(65)).is_err());
    assert!(ClientId::parse("tab-1_A").is_ok());
  }

  #[test]
  fn header_is_optional_but_must_be_valid_when_sent() {
    let mut headers = HeaderMap::new();
    assert_eq!(ClientId::from_headers(&headers).unwrap(), None);
    assert!(ClientId::require(&headers).is_err());

    headers.insert(CLIENT_HEADER, HeaderValue::from_static("bad id"));
    assert!(ClientId::from_headers(&headers).is_err());

    headers.insert(CLIENT_HEADER, HeaderValue::from_static("c1"));
    assert_eq!(ClientId::require(&headers).unwrap().scoped("notes", "k"), "notes:c1:k");
  }
}
