//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::annotations::LessonAddress;
use crate::domain::{SyllabusObjective, TextbookReference};
use crate::github::{CommitInfo, GithubSettings};
use crate::plan::WeekPos;
use crate::selection::NodeKind;
use crate::sketch::{StrokePath, Tool};
use crate::workspace::RefList;

/// Messages the sketch canvas sends over WebSocket, one per pointer event.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    /// Attach the connection to a lesson's sketch (loads what was saved).
    Open {
        #[serde(flatten)]
        lesson: LessonAddress,
    },
    /// Pointer down. Tool defaults to the configured pen.
    Begin {
        x: f64,
        y: f64,
        #[serde(default)]
        tool: Option<Tool>,
    },
    /// Pointer move.
    Point { x: f64, y: f64 },
    /// Pointer up, cancel or leave: finalize and persist the stroke.
    End,
    Clear,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Opened {
        key: String,
        strokes: Vec<StrokePath>,
    },
    Saved {
        strokes: usize,
        saved: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct ClassesOut<'a> {
    pub classes: &'a [String],
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize)]
pub struct SyllabusSearchOut<'a> {
    pub items: Vec<&'a SyllabusObjective>,
}

#[derive(Serialize)]
pub struct TextbookSearchOut<'a> {
    pub items: Vec<&'a TextbookReference>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    /// `YYYY-MM-DD`; today (server local time) when absent.
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct CurrentWeekOut {
    pub date: String,
    pub current_week: Option<WeekPos>,
}

#[derive(Serialize)]
pub struct ClientOut {
    pub client_id: String,
}

/// Client scope for the sketch socket, which cannot send custom headers.
#[derive(Debug, Deserialize)]
pub struct ClientQuery {
    pub client_id: String,
}

#[derive(Serialize)]
pub struct ClosedOut {
    pub closed: bool,
}

#[derive(Serialize)]
pub struct SessionOut {
    pub session_id: String,
}

#[derive(Deserialize)]
pub struct LoadIn {
    pub class_id: String,
}

#[derive(Deserialize)]
pub struct ToggleIn {
    pub kind: ToggleKind,
    pub term_index: usize,
    #[serde(default)]
    pub week_index: usize,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleKind {
    Term,
    Week,
}

impl From<ToggleKind> for NodeKind {
    fn from(k: ToggleKind) -> Self {
        match k {
            ToggleKind::Term => NodeKind::Term,
            ToggleKind::Week => NodeKind::Week,
        }
    }
}

#[derive(Serialize)]
pub struct ToggleOut {
    pub collapsed: bool,
}

#[derive(Deserialize)]
pub struct RefIn {
    pub list: RefList,
    pub id: String,
}

#[derive(Deserialize)]
pub struct MoveIn {
    pub delta: isize,
}

#[derive(Deserialize)]
pub struct StartDateIn {
    #[serde(default)]
    pub start_date: String,
}

#[derive(Serialize)]
pub struct ChangedOut {
    pub changed: bool,
}

#[derive(Serialize)]
pub struct CommitOut {
    pub commit: CommitInfo,
}

/// Saved GitHub settings as shown to the client; the token itself never leaves.
#[derive(Serialize)]
pub struct GithubSettingsOut {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub has_token: bool,
}

impl From<&GithubSettings> for GithubSettingsOut {
    fn from(s: &GithubSettings) -> Self {
        Self {
            owner: s.owner.clone(),
            repo: s.repo.clone(),
            branch: s.branch.clone(),
            has_token: !s.token.trim().is_empty(),
        }
    }
}

#[derive(Deserialize)]
pub struct NotesIn {
    #[serde(flatten)]
    pub lesson: LessonAddress,
    #[serde(default)]
    pub notes: String,
}
