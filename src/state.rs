//! Application state: configuration, data source, cached reference data, editor
//! sessions, the local store and the GitHub client.
//!
//! Each editor session owns one workspace (document + selection/expansion). A
//! load replaces the whole workspace in one write-locked step. Loads carry a
//! ticket; a load that finishes after a newer one started for the same session
//! is discarded instead of overwriting the newer document.
//!
//! Sessions end when the client deletes them or, failing that, after sitting
//! idle for `session_idle_secs`.

use std::{
  collections::HashMap,
  sync::Arc,
  time::{Duration, Instant},
};

use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::PlannerConfig;
use crate::domain::PlanDocument;
use crate::error::{ApiError, FetchError};
use crate::github::GithubClient;
use crate::reference::ReferenceData;
use crate::source::DataSource;
use crate::store::{FileStore, KvStore, MemoryStore};
use crate::workspace::Workspace;

#[derive(Debug)]
pub struct Session {
  /// Ticket of the most recently started load.
  generation: u64,
  pub workspace: Option<Workspace>,
  last_used: Instant,
}

impl Default for Session {
  fn default() -> Self {
    Self { generation: 0, workspace: None, last_used: Instant::now() }
  }
}

impl Session {
  pub fn touch(&mut self) {
    self.last_used = Instant::now();
  }

  pub fn idle_for(&self) -> Duration {
    self.last_used.elapsed()
  }
}

/// How often idle sessions are looked for.
const SWEEP_EVERY: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
  pub config: Arc<PlannerConfig>,
  pub source: DataSource,
  pub reference: Arc<RwLock<Option<Arc<ReferenceData>>>>,
  pub sessions: Arc<RwLock<HashMap<String, Session>>>,
  pub store: Arc<dyn KvStore>,
  pub github: GithubClient,
}

impl AppState {
  /// Build state from config: data source, local store, GitHub client.
  #[instrument(level = "info", skip_all)]
  pub fn new(config: PlannerConfig) -> Result<Self, Box<dyn std::error::Error>> {
    let source = match &config.data_url {
      Some(url) => DataSource::remote(url)?,
      None => DataSource::Dir(config.data_dir.clone().into()),
    };
    info!(target: "planner_backend", source = %source.describe(), classes = config.classes.len(), "Data source configured");

    let store: Arc<dyn KvStore> = match &config.store_path {
      Some(path) => Arc::new(FileStore::open(path, config.store_quota_bytes)?),
      None => {
        warn!(target: "planner_backend", "No store_path configured; annotations are kept in memory only");
        Arc::new(MemoryStore::with_quota(config.store_quota_bytes))
      }
    };

    let github = GithubClient::new(config.github.clone())?;
    Ok(Self::with_parts(config, source, store, github))
  }

  pub fn with_parts(config: PlannerConfig, source: DataSource, store: Arc<dyn KvStore>, github: GithubClient) -> Self {
    Self {
      config: Arc::new(config),
      source,
      reference: Arc::new(RwLock::new(None)),
      sessions: Arc::new(RwLock::new(HashMap::new())),
      store,
      github,
    }
  }

  /// Reference tables, fetched on first use and cached. A failed fetch is not cached.
  #[instrument(level = "debug", skip(self))]
  pub async fn reference(&self) -> Result<Arc<ReferenceData>, FetchError> {
    if let Some(r) = self.reference.read().await.as_ref() {
      return Ok(r.clone());
    }
    let mut slot = self.reference.write().await;
    if let Some(r) = slot.as_ref() {
      return Ok(r.clone());
    }
    match self.source.load_reference_data().await {
      Ok(data) => {
        let data = Arc::new(data);
        *slot = Some(data.clone());
        Ok(data)
      }
      Err(e) => {
        error!(target: "planner_backend", error = %e, "Reference data unavailable");
        Err(e)
      }
    }
  }

  pub fn is_known_class(&self, class_id: &str) -> bool {
    self.config.classes.iter().any(|c| c == class_id)
  }

  pub async fn create_session(&self) -> String {
    let id = Uuid::new_v4().to_string();
    self.sessions.write().await.insert(id.clone(), Session::default());
    info!(target: "planner", session = %id, "Editor session created");
    id
  }

  /// Start a load: bump the session's generation and hand back the ticket.
  pub async fn begin_load(&self, session_id: &str) -> Result<u64, ApiError> {
    let mut sessions = self.sessions.write().await;
    let session = sessions.get_mut(session_id).ok_or_else(|| unknown_session(session_id))?;
    session.generation += 1;
    session.touch();
    Ok(session.generation)
  }

  /// Install a loaded document if `ticket` is still the newest load.
  pub async fn finish_load(&self, session_id: &str, ticket: u64, doc: PlanDocument) -> Result<(), ApiError> {
    let mut sessions = self.sessions.write().await;
    let session = sessions.get_mut(session_id).ok_or_else(|| unknown_session(session_id))?;
    if session.generation != ticket {
      warn!(target: "planner", session = %session_id, ticket, newest = session.generation, class_id = %doc.class_id, "Discarding superseded plan load");
      return Err(ApiError::Superseded(session_id.to_string()));
    }
    info!(target: "planner", session = %session_id, class_id = %doc.class_id, "Workspace replaced");
    session.touch();
    session.workspace = Some(Workspace::open(doc));
    Ok(())
  }

  /// Load a class plan into a session.
  #[instrument(level = "info", skip(self))]
  pub async fn load_into_session(&self, session_id: &str, class_id: &str) -> Result<(), ApiError> {
    let ticket = self.begin_load(session_id).await?;
    let doc = self.source.load_plan(class_id).await?;
    self.finish_load(session_id, ticket, doc).await
  }

  /// Run `f` against a session's workspace under the write lock.
  pub async fn with_workspace<R>(&self, session_id: &str, f: impl FnOnce(&mut Workspace) -> R) -> Result<R, ApiError> {
    let mut sessions = self.sessions.write().await;
    let session = sessions.get_mut(session_id).ok_or_else(|| unknown_session(session_id))?;
    session.touch();
    let ws = session
      .workspace
      .as_mut()
      .ok_or_else(|| ApiError::BadRequest(format!("session {} has no plan loaded", session_id)))?;
    Ok(f(ws))
  }

  /// Drop a session and its workspace. False when it did not exist.
  pub async fn close_session(&self, session_id: &str) -> bool {
    let closed = self.sessions.write().await.remove(session_id).is_some();
    if closed {
      info!(target: "planner", session = %session_id, "Editor session closed");
    }
    closed
  }

  /// Drop every session idle for at least `idle`; returns how many went.
  pub async fn sweep_idle_sessions(&self, idle: Duration) -> usize {
    let mut sessions = self.sessions.write().await;
    let before = sessions.len();
    sessions.retain(|_, s| s.idle_for() < idle);
    let dropped = before - sessions.len();
    if dropped > 0 {
      info!(target: "planner", dropped, remaining = sessions.len(), "Idle editor sessions dropped");
    }
    dropped
  }

  /// Background task that sweeps idle sessions for the life of the server.
  pub fn spawn_session_sweeper(&self) -> JoinHandle<()> {
    let state = self.clone();
    let idle = Duration::from_secs(self.config.session_idle_secs);
    tokio::spawn(async move {
      let mut tick = tokio::time::interval(SWEEP_EVERY);
      loop {
        tick.tick().await;
        let dropped = state.sweep_idle_sessions(idle).await;
        debug!(target: "planner_backend", dropped, "Session sweep done");
      }
    })
  }
}

fn unknown_session(id: &str) -> ApiError {
  ApiError::NotFound(format!("unknown session {}", id))
}
