//! Minimal GitHub Contents API client for committing a plan file.
//!
//! A commit is GET (current blob sha) followed by PUT (new content + that sha).
//! There is no retry and no merge: a stale sha comes back as `SaveError::Conflict`.
//!
//! NOTE: the token is never logged, and remote error bodies are truncated.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::GithubCfg;
use crate::domain::PlanDocument;
use crate::error::SaveError;
use crate::plan::to_pretty_json;
use crate::util::{fill_template, trunc_for_log};

const API_VERSION: &str = "2022-11-28";

/// Repository coordinates plus the user's access token.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GithubSettings {
  #[serde(default)] pub owner: String,
  #[serde(default)] pub repo: String,
  #[serde(default)] pub branch: String,
  #[serde(default)] pub token: String,
}

impl GithubSettings {
  fn trimmed(&self) -> Self {
    Self {
      owner: self.owner.trim().to_string(),
      repo: self.repo.trim().to_string(),
      branch: self.branch.trim().to_string(),
      token: self.token.trim().to_string(),
    }
  }

  /// Fields set in `other` (non-blank) win over ours.
  pub fn overlay(&self, other: &GithubSettings) -> GithubSettings {
    let pick = |mine: &String, theirs: &String| if theirs.trim().is_empty() { mine.clone() } else { theirs.clone() };
    GithubSettings {
      owner: pick(&self.owner, &other.owner),
      repo: pick(&self.repo, &other.repo),
      branch: pick(&self.branch, &other.branch),
      token: pick(&self.token, &other.token),
    }
  }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CommitInfo {
  pub path: String,
  pub branch: String,
  pub commit_sha: Option<String>,
  /// False when the file did not exist yet and was created.
  pub updated: bool,
}

#[derive(Clone)]
pub struct GithubClient {
  pub client: reqwest::Client,
  pub cfg: GithubCfg,
}

#[derive(Deserialize)]
struct ContentsGet {
  sha: String,
}

#[derive(Serialize)]
struct ContentsPut<'a> {
  message: String,
  content: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  sha: Option<&'a str>,
  branch: &'a str,
}

#[derive(Deserialize)]
struct ContentsPutResponse {
  #[serde(default)]
  commit: Option<CommitRef>,
}

#[derive(Deserialize)]
struct CommitRef {
  sha: Option<String>,
}

#[derive(Deserialize)]
struct GithubErrorBody {
  message: Option<String>,
}

fn extract_github_error(body: &str) -> Option<String> {
  serde_json::from_str::<GithubErrorBody>(body).ok().and_then(|b| b.message)
}

impl GithubClient {
  pub fn new(cfg: GithubCfg) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(cfg.timeout_secs)).build()?;
    Ok(Self { client, cfg })
  }

  fn contents_url(&self, s: &GithubSettings, path: &str) -> String {
    format!("{}/repos/{}/{}/contents/{}", self.cfg.api_base.trim_end_matches('/'), s.owner, s.repo, path)
  }

  fn request(&self, method: reqwest::Method, url: &str, token: &str) -> reqwest::RequestBuilder {
    self.client
      .request(method, url)
      .header(ACCEPT, "application/vnd.github+json")
      .header(AUTHORIZATION, format!("Bearer {}", token))
      .header("X-GitHub-Api-Version", API_VERSION)
      .header(USER_AGENT, "planner-backend/0.1")
  }

  /// Map a non-success response into the matching `SaveError`.
  async fn error_from(res: reqwest::Response, url: &str) -> SaveError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    let message = extract_github_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
    match status {
      409 => SaveError::Conflict { message },
      401 | 403 => SaveError::Auth { status, message },
      _ => SaveError::Http { status, message, url: url.to_string() },
    }
  }

  /// Current blob sha of `path` on `branch`, or `None` when the file does not exist.
  async fn current_sha(&self, s: &GithubSettings, path: &str) -> Result<Option<String>, SaveError> {
    let url = self.contents_url(s, path);
    let res = self
      .request(reqwest::Method::GET, &url, &s.token)
      .query(&[("ref", s.branch.as_str())])
      .send()
      .await
      .map_err(|e| SaveError::Transport(e.to_string()))?;
    if res.status().as_u16() == 404 {
      return Ok(None);
    }
    if !res.status().is_success() {
      return Err(Self::error_from(res, &url).await);
    }
    let body: ContentsGet = res.json().await.map_err(|e| SaveError::Transport(e.to_string()))?;
    Ok(Some(body.sha))
  }

  /// Commit `doc` as `<path_template>` on the configured branch.
  #[instrument(level = "info", skip(self, settings, doc), fields(class_id = %doc.class_id, owner = %settings.owner, repo = %settings.repo))]
  pub async fn commit_plan(&self, settings: &GithubSettings, doc: &PlanDocument) -> Result<CommitInfo, SaveError> {
    let s = settings.trimmed();
    if s.owner.is_empty() || s.repo.is_empty() || s.branch.is_empty() || s.token.is_empty() {
      return Err(SaveError::MissingCredentials);
    }
    let class_id = doc.class_id.as_str();
    let path = fill_template(&self.cfg.path_template, &[("class_id", class_id)]);

    let sha = self.current_sha(&s, &path).await?;
    if sha.is_none() {
      warn!(target: "planner", %path, branch = %s.branch, "Plan file not on GitHub yet; creating it");
    }

    let body = ContentsPut {
      message: fill_template(&self.cfg.message_template, &[("class_id", class_id)]),
      content: STANDARD.encode(to_pretty_json(doc)),
      sha: sha.as_deref(),
      branch: &s.branch,
    };
    let url = self.contents_url(&s, &path);
    let start = std::time::Instant::now();
    let res = self
      .request(reqwest::Method::PUT, &url, &s.token)
      .json(&body)
      .send()
      .await
      .map_err(|e| SaveError::Transport(e.to_string()))?;
    if !res.status().is_success() {
      return Err(Self::error_from(res, &url).await);
    }
    let put: ContentsPutResponse = res.json().await.map_err(|e| SaveError::Transport(e.to_string()))?;
    let commit_sha = put.commit.and_then(|c| c.sha);
    info!(target: "planner", %path, branch = %s.branch, commit = ?commit_sha, elapsed = ?start.elapsed(), "Plan committed");

    Ok(CommitInfo { path, branch: s.branch, commit_sha, updated: sha.is_some() })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};

  use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
  };
  use serde_json::{json, Value};

  /// What the fake Contents API saw and how it should answer.
  #[derive(Default)]
  struct Fake {
    existing_sha: Option<String>,
    put_status: Option<u16>,
    puts: Vec<Value>,
    auth_headers: Vec<String>,
  }

  type Shared = Arc<Mutex<Fake>>;

  async fn fake_get(
    State(fake): State<Shared>,
    Path((_owner, _repo, _path)): Path<(String, String, String)>,
    Query(q): Query<std::collections::HashMap<String, String>>,
    headers: HeaderMap,
  ) -> (StatusCode, Json<Value>) {
    let mut f = fake.lock().unwrap();
    f.auth_headers.push(headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string());
    assert_eq!(q.get("ref").map(String::as_str), Some("main"));
    match &f.existing_sha {
      Some(sha) => (StatusCode::OK, Json(json!({ "sha": sha }))),
      None => (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" }))),
    }
  }

  async fn fake_put(
    State(fake): State<Shared>,
    Path((_owner, _repo, _path)): Path<(String, String, String)>,
    Json(body): Json<Value>,
  ) -> (StatusCode, Json<Value>) {
    let mut f = fake.lock().unwrap();
    f.puts.push(body);
    match f.put_status {
      Some(409) => (StatusCode::CONFLICT, Json(json!({ "message": "is at abc but expected def" }))),
      Some(401) => (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Bad credentials" }))),
      Some(other) => (StatusCode::from_u16(other).unwrap(), Json(json!({ "message": "boom" }))),
      None => (StatusCode::OK, Json(json!({ "commit": { "sha": "c0ffee" } }))),
    }
  }

  async fn spawn_fake(fake: Fake) -> (String, Shared) {
    let shared: Shared = Arc::new(Mutex::new(fake));
    let app = Router::new()
      .route("/repos/:owner/:repo/contents/*path", get(fake_get).put(fake_put))
      .with_state(shared.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{}", addr), shared)
  }

  fn client(api_base: String) -> GithubClient {
    GithubClient::new(GithubCfg { api_base, ..GithubCfg::default() }).unwrap()
  }

  fn settings() -> GithubSettings {
    GithubSettings { owner: "school".into(), repo: "planner".into(), branch: "main".into(), token: " tok123 ".into() }
  }

  fn doc() -> PlanDocument {
    PlanDocument { class_id: "12AA_SL".into(), label: "12 AA SL".into(), ..PlanDocument::default() }
  }

  #[tokio::test]
  async fn commit_sends_sha_branch_and_base64_content() {
    let (base, fake) = spawn_fake(Fake { existing_sha: Some("abc".into()), ..Fake::default() }).await;
    let info = client(base).commit_plan(&settings(), &doc()).await.unwrap();
    assert_eq!(
      info,
      CommitInfo { path: "data/plans/12AA_SL.json".into(), branch: "main".into(), commit_sha: Some("c0ffee".into()), updated: true }
    );

    let f = fake.lock().unwrap();
    assert_eq!(f.auth_headers, vec!["Bearer tok123"]);
    let put = &f.puts[0];
    assert_eq!(put["sha"], json!("abc"));
    assert_eq!(put["branch"], json!("main"));
    assert_eq!(put["message"], json!("Update plan: 12AA_SL"));
    let decoded = STANDARD.decode(put["content"].as_str().unwrap()).unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), to_pretty_json(&doc()));
  }

  #[tokio::test]
  async fn missing_file_is_created_without_sha() {
    let (base, fake) = spawn_fake(Fake::default()).await;
    let info = client(base).commit_plan(&settings(), &doc()).await.unwrap();
    assert!(!info.updated);
    assert!(fake.lock().unwrap().puts[0].get("sha").is_none());
  }

  #[tokio::test]
  async fn remote_failures_map_to_save_errors() {
    let (base, _) = spawn_fake(Fake { existing_sha: Some("old".into()), put_status: Some(409), ..Fake::default() }).await;
    match client(base).commit_plan(&settings(), &doc()).await {
      Err(SaveError::Conflict { message }) => assert!(message.contains("expected def")),
      other => panic!("expected conflict, got {other:?}"),
    }

    let (base, _) = spawn_fake(Fake { existing_sha: Some("old".into()), put_status: Some(401), ..Fake::default() }).await;
    assert!(matches!(client(base).commit_plan(&settings(), &doc()).await, Err(SaveError::Auth { status: 401, .. })));

    let (base, _) = spawn_fake(Fake { existing_sha: Some("old".into()), put_status: Some(422), ..Fake::default() }).await;
    match client(base).commit_plan(&settings(), &doc()).await {
      Err(SaveError::Http { status, message, url }) => {
        assert_eq!(status, 422);
        assert_eq!(message, "boom");
        assert!(url.ends_with("/repos/school/planner/contents/data/plans/12AA_SL.json"));
      }
      other => panic!("expected http error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn blank_settings_never_reach_the_network() {
    let gh = client("http://127.0.0.1:9".into());
    let mut s = settings();
    s.token = "   ".into();
    assert!(matches!(gh.commit_plan(&s, &doc()).await, Err(SaveError::MissingCredentials)));
  }

  #[test]
  fn overlay_prefers_non_blank_fields() {
    let saved = settings();
    let req = GithubSettings { branch: "dev".into(), token: " ".into(), ..GithubSettings::default() };
    let merged = saved.overlay(&req);
    assert_eq!(merged.branch, "dev");
    assert_eq!(merged.owner, "school");
    assert_eq!(merged.token, " tok123 ");
  }
}
