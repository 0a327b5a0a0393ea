//! Error kinds for loading, editing and saving plans, and their HTTP mapping.
//!
//! Every API error body has the shape `{"error": {"code": ..., "message": ...}}`.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

/// Reference or plan data could not be fetched.
#[derive(Debug, Error)]
#[error("Failed to load {label}: {reason}\nURL: {url}")]
pub struct FetchError {
  pub label: String,
  pub url: String,
  /// HTTP status when the source answered with a non-success response.
  pub status: Option<u16>,
  pub reason: String,
}

/// A plan file that does not have the required top-level structure.
#[derive(Debug, Error)]
pub enum MalformedDocument {
  #[error("plan is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),
  #[error("plan has no `terms` array")]
  MissingTerms,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid date {0:?}: expected a real calendar date as YYYY-MM-DD")]
pub struct InvalidDate(pub String);

/// Failure to commit a plan to the GitHub repository.
#[derive(Debug, Error)]
pub enum SaveError {
  #[error("Missing GitHub settings. Fill owner/repo/branch/token and save the GitHub settings.")]
  MissingCredentials,
  #[error("GitHub reports a conflict ({message}). Reload the plan before retrying.")]
  Conflict { message: String },
  #[error("GitHub rejected the credentials ({status}): {message}")]
  Auth { status: u16, message: String },
  #[error("GitHub API error ({status}): {message}\nURL: {url}")]
  Http { status: u16, message: String, url: String },
  #[error("GitHub request failed: {0}")]
  Transport(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("store quota exceeded: {needed} bytes needed, {quota} allowed")]
  QuotaExceeded { needed: usize, quota: usize },
  #[error("store io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("store file is corrupt: {0}")]
  Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum SketchError {
  #[error("sketch is not valid JSON: {0}")]
  Json(String),
  #[error("bad path data {0:?}")]
  Path(String),
}

/// Everything a handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Fetch(#[from] FetchError),
  #[error(transparent)]
  Malformed(#[from] MalformedDocument),
  #[error(transparent)]
  InvalidDate(#[from] InvalidDate),
  #[error(transparent)]
  Save(#[from] SaveError),
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error(transparent)]
  Sketch(#[from] SketchError),
  #[error("{0}")]
  NotFound(String),
  #[error("{0}")]
  BadRequest(String),
  #[error("a newer load replaced this one for session {0}")]
  Superseded(String),
}

impl ApiError {
  pub fn status_and_code(&self) -> (StatusCode, &'static str) {
    match self {
      ApiError::Fetch(_) => (StatusCode::BAD_GATEWAY, "fetch_failed"),
      ApiError::Malformed(_) => (StatusCode::UNPROCESSABLE_ENTITY, "malformed_document"),
      ApiError::InvalidDate(_) => (StatusCode::BAD_REQUEST, "invalid_date"),
      ApiError::Save(SaveError::MissingCredentials) => (StatusCode::BAD_REQUEST, "missing_credentials"),
      ApiError::Save(SaveError::Conflict { .. }) => (StatusCode::CONFLICT, "conflict"),
      ApiError::Save(SaveError::Auth { .. }) => (StatusCode::UNAUTHORIZED, "github_auth"),
      ApiError::Save(_) => (StatusCode::BAD_GATEWAY, "github_error"),
      ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
      ApiError::Sketch(_) => (StatusCode::BAD_REQUEST, "bad_sketch"),
      ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
      ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
      ApiError::Superseded(_) => (StatusCode::CONFLICT, "superseded"),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code) = self.status_and_code();
    if status.is_server_error() {
      tracing::error!(target: "planner_backend", %code, error = %self, "Request failed");
    } else {
      tracing::warn!(target: "planner_backend", %code, error = %self, "Request rejected");
    }
    let body = json!({ "error": { "code": code, "message": self.to_string() } });
    (status, Json(body)).into_response()
  }
}
