//! HTTP endpoint handlers. These are thin wrappers that forward to the model,
//! the data source and the adapters. Each handler is instrumented and logs
//! parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::{header, HeaderMap},
  response::IntoResponse,
  Json,
};
use chrono::{Local, NaiveDate};
use tracing::{info, instrument, warn};

use crate::annotations::{self, LessonAddress};
use crate::client::ClientId;
use crate::coverage::coverage_report;
use crate::domain::PlanDocument;
use crate::error::{ApiError, InvalidDate};
use crate::github::GithubSettings;
use crate::plan::{find_week_for_date, parse_iso_date, to_pretty_json, TreePath};
use crate::protocol::*;
use crate::state::AppState;
use crate::view::{editor_view, plan_view};
use crate::workspace::LessonEdit;

/// Local store kind for a client's saved GitHub settings.
const GITHUB_SETTINGS: &str = "planner_github";

type ApiResult<T> = Result<T, ApiError>;

fn parse_date_or_today(raw: Option<&str>) -> ApiResult<NaiveDate> {
  match raw.map(str::trim).filter(|s| !s.is_empty()) {
    Some(s) => parse_iso_date(s).ok_or_else(|| InvalidDate(s.to_string()).into()),
    None => Ok(Local::now().date_naive()),
  }
}

/// `<class_id>.json` as an attachment, two-space pretty JSON.
fn download_response(doc: &PlanDocument) -> impl IntoResponse {
  let name = if doc.class_id.is_empty() { "plan".to_string() } else { doc.class_id.clone() };
  (
    [
      (header::CONTENT_TYPE, "application/json".to_string()),
      (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}.json\"", name)),
    ],
    to_pretty_json(doc),
  )
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_classes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(ClassesOut { classes: &state.config.classes }).into_response()
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_reference(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
  let refs = state.reference().await?;
  Ok(Json(refs.as_ref().clone()))
}

#[instrument(level = "info", skip(state), fields(q = %q.q))]
pub async fn http_search_syllabus(
  State(state): State<Arc<AppState>>,
  Query(q): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
  let refs = state.reference().await?;
  let out = Json(SyllabusSearchOut { items: refs.search_syllabus(&q.q) }).into_response();
  Ok(out)
}

#[instrument(level = "info", skip(state), fields(q = %q.q))]
pub async fn http_search_textbooks(
  State(state): State<Arc<AppState>>,
  Query(q): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
  let refs = state.reference().await?;
  let out = Json(TextbookSearchOut { items: refs.search_textbooks(&q.q) }).into_response();
  Ok(out)
}

// ---------- Student viewer / coverage (read straight from the source) ----------

#[instrument(level = "info", skip(state), fields(%class_id))]
pub async fn http_get_plan_view(
  State(state): State<Arc<AppState>>,
  Path(class_id): Path<String>,
  Query(q): Query<DateQuery>,
) -> ApiResult<impl IntoResponse> {
  let today = parse_date_or_today(q.date.as_deref())?;
  let refs = state.reference().await?;
  let doc = state.source.load_plan(&class_id).await?;
  let view = plan_view(&doc, &refs, today);
  info!(target: "planner", %class_id, %today, current = ?view.current_week, "Plan view served");
  Ok(Json(view))
}

#[instrument(level = "info", skip(state), fields(%class_id))]
pub async fn http_get_current_week(
  State(state): State<Arc<AppState>>,
  Path(class_id): Path<String>,
  Query(q): Query<DateQuery>,
) -> ApiResult<impl IntoResponse> {
  let date = parse_date_or_today(q.date.as_deref())?;
  let doc = state.source.load_plan(&class_id).await?;
  Ok(Json(CurrentWeekOut { date: date.to_string(), current_week: find_week_for_date(&doc, date) }))
}

#[instrument(level = "info", skip(state), fields(%class_id, q = %q.q))]
pub async fn http_get_coverage(
  State(state): State<Arc<AppState>>,
  Path(class_id): Path<String>,
  Query(q): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
  let refs = state.reference().await?;
  let doc = state.source.load_plan(&class_id).await?;
  let report = coverage_report(&doc, &refs.syllabus, &q.q);
  info!(target: "planner", %class_id, total = report.total, scheduled = report.scheduled, unscheduled = report.unscheduled_count, "Coverage computed");
  Ok(Json(report))
}

#[instrument(level = "info", skip(state), fields(%class_id))]
pub async fn http_download_plan(
  State(state): State<Arc<AppState>>,
  Path(class_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
  let doc = state.source.load_plan(&class_id).await?;
  Ok(download_response(&doc))
}

#[instrument(level = "info")]
pub async fn http_create_client() -> impl IntoResponse {
  let client = ClientId::issue();
  info!(target: "planner", client = %client.as_str(), "Client id issued");
  Json(ClientOut { client_id: client.as_str().to_string() })
}

// ---------- Editor sessions ----------

#[instrument(level = "info", skip(state))]
pub async fn http_create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(SessionOut { session_id: state.create_session().await })
}

#[instrument(level = "info", skip(state), fields(%sid))]
pub async fn http_close_session(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
) -> ApiResult<impl IntoResponse> {
  if !state.close_session(&sid).await {
    return Err(ApiError::NotFound(format!("unknown session {}", sid)));
  }
  Ok(Json(ClosedOut { closed: true }))
}

/// Current editor view for a session (document, selection, expansion, lesson form).
async fn session_view(state: &AppState, sid: &str) -> ApiResult<axum::response::Response> {
  let refs = state.reference().await?;
  let mut sessions = state.sessions.write().await;
  let session = sessions
    .get_mut(sid)
    .ok_or_else(|| ApiError::NotFound(format!("unknown session {}", sid)))?;
  session.touch();
  let ws = session
    .workspace
    .as_ref()
    .ok_or_else(|| ApiError::BadRequest(format!("session {} has no plan loaded", sid)))?;
  Ok(Json(editor_view(sid, ws, &refs)).into_response())
}

#[instrument(level = "info", skip(state, body), fields(%sid, class_id = %body.class_id))]
pub async fn http_load_session(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
  Json(body): Json<LoadIn>,
) -> ApiResult<impl IntoResponse> {
  if !state.is_known_class(&body.class_id) {
    warn!(target: "planner", class_id = %body.class_id, "Loading a class that is not in the configured list");
  }
  state.load_into_session(&sid, &body.class_id).await?;
  session_view(&state, &sid).await
}

#[instrument(level = "info", skip(state), fields(%sid))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
) -> ApiResult<impl IntoResponse> {
  session_view(&state, &sid).await
}

#[instrument(level = "info", skip(state, body), fields(%sid))]
pub async fn http_select(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
  Json(body): Json<TreePath>,
) -> ApiResult<impl IntoResponse> {
  state.with_workspace(&sid, |ws| ws.select(body)).await?;
  session_view(&state, &sid).await
}

#[instrument(level = "info", skip(state, body), fields(%sid))]
pub async fn http_toggle(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
  Json(body): Json<ToggleIn>,
) -> ApiResult<impl IntoResponse> {
  let collapsed = state
    .with_workspace(&sid, |ws| ws.toggle(body.kind.into(), body.term_index, body.week_index))
    .await?;
  Ok(Json(ToggleOut { collapsed }))
}

#[instrument(level = "info", skip(state), fields(%sid))]
pub async fn http_add_week(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
) -> ApiResult<impl IntoResponse> {
  let added = state.with_workspace(&sid, |ws| ws.add_week()).await?;
  if added.is_none() {
    return Err(ApiError::BadRequest("select a term first".into()));
  }
  info!(target: "planner", %sid, path = ?added, "Week added");
  session_view(&state, &sid).await
}

#[instrument(level = "info", skip(state), fields(%sid))]
pub async fn http_add_lesson(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
) -> ApiResult<impl IntoResponse> {
  let added = state.with_workspace(&sid, |ws| ws.add_lesson()).await?;
  if added.is_none() {
    return Err(ApiError::BadRequest("select a week first".into()));
  }
  info!(target: "planner", %sid, path = ?added, "Lesson added");
  session_view(&state, &sid).await
}

#[instrument(level = "info", skip(state, body), fields(%sid))]
pub async fn http_edit_lesson(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
  Json(body): Json<LessonEdit>,
) -> ApiResult<impl IntoResponse> {
  if !state.with_workspace(&sid, |ws| ws.apply_lesson_edit(body)).await? {
    return Err(ApiError::BadRequest("no lesson selected".into()));
  }
  session_view(&state, &sid).await
}

#[instrument(level = "info", skip(state, body), fields(%sid, id = %body.id))]
pub async fn http_attach_ref(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
  Json(body): Json<RefIn>,
) -> ApiResult<impl IntoResponse> {
  let changed = state.with_workspace(&sid, |ws| ws.attach(body.list, &body.id)).await?;
  Ok(Json(ChangedOut { changed }))
}

#[instrument(level = "info", skip(state, body), fields(%sid, id = %body.id))]
pub async fn http_detach_ref(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
  Json(body): Json<RefIn>,
) -> ApiResult<impl IntoResponse> {
  let changed = state.with_workspace(&sid, |ws| ws.detach(body.list, &body.id)).await?;
  Ok(Json(ChangedOut { changed }))
}

#[instrument(level = "info", skip(state, body), fields(%sid, delta = body.delta))]
pub async fn http_move_lesson(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
  Json(body): Json<MoveIn>,
) -> ApiResult<impl IntoResponse> {
  let changed = state.with_workspace(&sid, |ws| ws.move_selected_lesson(body.delta)).await?;
  Ok(Json(ChangedOut { changed }))
}

#[instrument(level = "info", skip(state), fields(%sid))]
pub async fn http_delete_lesson(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
) -> ApiResult<impl IntoResponse> {
  let removed = state.with_workspace(&sid, |ws| ws.delete_selected_lesson()).await?;
  if let Some(l) = &removed {
    info!(target: "planner", %sid, lesson_id = %l.lesson_id, "Lesson deleted");
  }
  Ok(Json(ChangedOut { changed: removed.is_some() }))
}

#[instrument(level = "info", skip(state, body), fields(%sid, start_date = %body.start_date))]
pub async fn http_set_start_date(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
  Json(body): Json<StartDateIn>,
) -> ApiResult<impl IntoResponse> {
  let changed = state.with_workspace(&sid, |ws| ws.set_selected_week_start_date(&body.start_date)).await??;
  Ok(Json(ChangedOut { changed }))
}

#[instrument(level = "info", skip(state), fields(%sid))]
pub async fn http_download_session(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
) -> ApiResult<impl IntoResponse> {
  let doc = state.with_workspace(&sid, |ws| ws.document.clone()).await?;
  info!(target: "planner", %sid, class_id = %doc.class_id, "Plan downloaded");
  Ok(download_response(&doc))
}

// ---------- GitHub ----------

fn saved_github_settings(state: &AppState, client: &ClientId) -> GithubSettings {
  state
    .store
    .get(&client.scoped(GITHUB_SETTINGS, "settings"))
    .and_then(|raw| serde_json::from_str(&raw).ok())
    .unwrap_or_default()
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_get_github_settings(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
  let client = ClientId::require(&headers)?;
  Ok(Json(GithubSettingsOut::from(&saved_github_settings(&state, &client))))
}

#[instrument(level = "info", skip(state, headers, body), fields(owner = %body.owner, repo = %body.repo))]
pub async fn http_put_github_settings(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<GithubSettings>,
) -> ApiResult<impl IntoResponse> {
  let client = ClientId::require(&headers)?;
  // Blank fields (the token in particular) keep what this client saved before.
  let mut merged = saved_github_settings(&state, &client).overlay(&body);
  if merged.branch.trim().is_empty() {
    merged.branch = state.config.github.default_branch.clone();
  }
  let raw = serde_json::to_string(&merged).map_err(|e| ApiError::BadRequest(e.to_string()))?;
  state.store.set(&client.scoped(GITHUB_SETTINGS, "settings"), &raw)?;
  info!(target: "planner", client = %client.as_str(), "Saved GitHub settings locally");
  Ok(Json(GithubSettingsOut::from(&merged)))
}

/// Credentials come from the request body, over the settings saved by the
/// calling client. Without a client header only the body counts.
#[instrument(level = "info", skip(state, headers, body), fields(%sid))]
pub async fn http_commit_session(
  State(state): State<Arc<AppState>>,
  Path(sid): Path<String>,
  headers: HeaderMap,
  body: Option<Json<GithubSettings>>,
) -> ApiResult<impl IntoResponse> {
  let client = ClientId::from_headers(&headers)?;
  let doc = state.with_workspace(&sid, |ws| ws.document.clone()).await?;
  let mut settings = match &client {
    Some(c) => saved_github_settings(&state, c),
    None => GithubSettings::default(),
  };
  if let Some(Json(req)) = body {
    settings = settings.overlay(&req);
  }
  if settings.branch.trim().is_empty() {
    settings.branch = state.config.github.default_branch.clone();
  }
  let commit = state.github.commit_plan(&settings, &doc).await?;
  Ok(Json(CommitOut { commit }))
}

// ---------- Student annotations ----------

#[instrument(level = "info", skip(state, headers, q), fields(class_id = %q.class_id))]
pub async fn http_get_annotations(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Query(q): Query<LessonAddress>,
) -> ApiResult<impl IntoResponse> {
  let client = ClientId::require(&headers)?;
  let key = q.key()?;
  Ok(Json(annotations::load(state.store.as_ref(), &client, &key)))
}

#[instrument(level = "info", skip(state, headers, body), fields(class_id = %body.lesson.class_id, bytes = body.notes.len()))]
pub async fn http_put_notes(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<NotesIn>,
) -> ApiResult<impl IntoResponse> {
  let client = ClientId::require(&headers)?;
  let key = body.lesson.key()?;
  Ok(Json(annotations::save_notes(state.store.as_ref(), &client, &key, &body.notes)?))
}

#[instrument(level = "info", skip(state, headers, q), fields(class_id = %q.class_id))]
pub async fn http_clear_sketch(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Query(q): Query<LessonAddress>,
) -> ApiResult<impl IntoResponse> {
  let client = ClientId::require(&headers)?;
  let key = q.key()?;
  Ok(Json(annotations::clear_sketch(state.store.as_ref(), &client, &key)?))
}
