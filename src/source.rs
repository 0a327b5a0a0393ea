//! Where reference tables and plan files are read from: a local directory or a
//! remote base URL with the same layout (e.g. the published GitHub Pages site).

use std::{path::PathBuf, time::Duration};

use reqwest::header::{CACHE_CONTROL, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::{info, instrument};

use crate::domain::PlanDocument;
use crate::error::{ApiError, FetchError};
use crate::plan::load_document;
use crate::reference::ReferenceData;
use crate::util::is_valid_class_id;

const SYLLABUS_FILE: &str = "syllabus_objectives.json";
const TEXTBOOKS_FILE: &str = "textbook_references.json";

#[derive(Clone, Debug)]
pub enum DataSource {
  Dir(PathBuf),
  Remote { base_url: String, client: reqwest::Client },
}

impl DataSource {
  pub fn remote(base_url: &str) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(20)).build()?;
    let mut base_url = base_url.trim().to_string();
    if !base_url.ends_with('/') {
      base_url.push('/');
    }
    Ok(DataSource::Remote { base_url, client })
  }

  pub fn describe(&self) -> String {
    match self {
      DataSource::Dir(p) => p.display().to_string(),
      DataSource::Remote { base_url, .. } => base_url.clone(),
    }
  }

  /// Where `rel` is read from, as reported in errors.
  fn location(&self, rel: &str) -> String {
    match self {
      DataSource::Dir(root) => root.join(rel).display().to_string(),
      DataSource::Remote { base_url, .. } => format!("{}{}", base_url, rel),
    }
  }

  /// Fetch one file as text. `rel` is relative to the data root.
  #[instrument(level = "debug", skip(self), fields(source = %self.describe()))]
  async fn fetch_text(&self, rel: &str, label: &str) -> Result<String, FetchError> {
    match self {
      DataSource::Dir(root) => {
        tokio::fs::read_to_string(root.join(rel)).await.map_err(|e| FetchError {
          label: label.to_string(),
          url: self.location(rel),
          status: None,
          reason: e.to_string(),
        })
      }
      DataSource::Remote { client, .. } => {
        let url = self.location(rel);
        let fail = |status: Option<u16>, reason: String| FetchError {
          label: label.to_string(),
          url: url.clone(),
          status,
          reason,
        };
        let res = client
          .get(&url)
          .header(USER_AGENT, "planner-backend/0.1")
          .header(CACHE_CONTROL, "no-store")
          .send()
          .await
          .map_err(|e| fail(None, e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
          return Err(fail(Some(status.as_u16()), status.to_string()));
        }
        res.text().await.map_err(|e| fail(Some(status.as_u16()), e.to_string()))
      }
    }
  }

  async fn fetch_json<T: DeserializeOwned>(&self, rel: &str) -> Result<T, FetchError> {
    let text = self.fetch_text(rel, rel).await?;
    serde_json::from_str(&text).map_err(|e| FetchError {
      label: rel.to_string(),
      url: self.location(rel),
      status: None,
      reason: format!("invalid JSON: {}", e),
    })
  }

  /// Both reference tables, fetched concurrently.
  #[instrument(level = "info", skip(self))]
  pub async fn load_reference_data(&self) -> Result<ReferenceData, FetchError> {
    let (syllabus, textbooks) = tokio::try_join!(self.fetch_json(SYLLABUS_FILE), self.fetch_json(TEXTBOOKS_FILE))?;
    let data = ReferenceData { syllabus, textbooks };
    info!(target: "planner", syllabus = data.syllabus.len(), textbooks = data.textbooks.len(), "Reference data loaded");
    Ok(data)
  }

  /// Load `plans/<class_id>.json`. A document without `class_id` adopts the requested one.
  #[instrument(level = "info", skip(self), fields(%class_id))]
  pub async fn load_plan(&self, class_id: &str) -> Result<PlanDocument, ApiError> {
    if !is_valid_class_id(class_id) {
      return Err(ApiError::BadRequest(format!("invalid class id {:?}", class_id)));
    }
    let label = format!("{}.json", class_id);
    let text = self.fetch_text(&format!("plans/{}", label), &label).await?;
    let mut doc = load_document(&text)?;
    if doc.class_id.is_empty() {
      doc.class_id = class_id.to_string();
    }
    info!(target: "planner", %class_id, terms = doc.terms.len(), "Plan loaded");
    Ok(doc)
  }
}
