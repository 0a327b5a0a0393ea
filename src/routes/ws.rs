//! Sketch WebSocket: one connection draws on one lesson's canvas at a time,
//! inside the client scope named by the `client_id` query parameter.
//! Pointer down/move messages are applied silently; pointer up adds the stroke
//! to the saved sketch and replies with one JSON message, as do open, clear and
//! ping.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    Query, State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument, warn};

use crate::annotations;
use crate::client::ClientId;
use crate::error::ApiError;
use crate::protocol::{ClientQuery, ClientWsMessage, ServerWsMessage};
use crate::sketch::{self, Point, SketchPad, Tool, ToolMode};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state, q))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  State(state): State<Arc<AppState>>,
  Query(q): Query<ClientQuery>,
) -> Result<impl IntoResponse, ApiError> {
  let client = ClientId::parse(&q.client_id)?;
  info!(target: "planner_backend", client = %client.as_str(), "Sketch WebSocket upgrade requested");
  Ok(ws.on_upgrade(move |socket| handle_ws(socket, state, client)))
}

/// Canvas attached to a connection after `open`.
struct Canvas {
  client: ClientId,
  key: Option<String>,
  pad: SketchPad,
}

impl Canvas {
  fn new(client: ClientId) -> Self {
    Self { client, key: None, pad: SketchPad::default() }
  }

  /// Finish a stroke still under the pointer and add it to the open lesson.
  fn settle(&mut self, state: &AppState) -> Option<ServerWsMessage> {
    if !self.pad.pointer_up() {
      return None;
    }
    let key = self.key.clone()?;
    Some(persist_last(state, &self.client, &key, &self.pad))
  }
}

#[instrument(level = "info", skip(socket, state, client))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, client: ClientId) {
  info!(target: "planner_backend", "Sketch WebSocket connected");
  let mut canvas = Canvas::new(client);
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "planner_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &mut canvas)
          }
          Err(e) => Some(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }),
        };
        let Some(reply) = reply else { continue };

        let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });
        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "planner_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  // A stroke still under the pointer when the socket drops is kept.
  let _ = canvas.settle(&state);
  info!(target: "planner_backend", "Sketch WebSocket disconnected");
}

/// Add the pad's newest stroke to the saved sketch for `key`.
fn persist_last(state: &AppState, client: &ClientId, key: &str, pad: &SketchPad) -> ServerWsMessage {
  let Some(stroke) = pad.last_stroke() else {
    return ServerWsMessage::Error { message: "no stroke to save".into() };
  };
  match annotations::append_stroke(state.store.as_ref(), client, key, stroke) {
    Ok(done) => ServerWsMessage::Saved { strokes: done.strokes, saved: done.outcome.saved, warning: done.outcome.warning },
    Err(e) => {
      error!(target: "planner", %key, error = %e, "Failed to persist stroke");
      ServerWsMessage::Error { message: e.to_string() }
    }
  }
}

fn default_tool(state: &AppState) -> Tool {
  let cfg = &state.config.sketch;
  Tool { mode: ToolMode::Pen, color: cfg.default_color.clone(), width: cfg.default_width }
}

fn not_open() -> Option<ServerWsMessage> {
  Some(ServerWsMessage::Error { message: "open a lesson before drawing".into() })
}

/// Apply one client message. `None` means no reply is sent.
fn handle_client_ws(msg: ClientWsMessage, state: &AppState, canvas: &mut Canvas) -> Option<ServerWsMessage> {
  match msg {
    ClientWsMessage::Ping => Some(ServerWsMessage::Pong),

    ClientWsMessage::Open { lesson } => {
      let key = match lesson.key() {
        Ok(k) => k,
        Err(e) => return Some(ServerWsMessage::Error { message: e.to_string() }),
      };
      // Switching lessons mid-stroke keeps the stroke on the lesson it was drawn on.
      if let Some(ServerWsMessage::Error { message }) = canvas.settle(state) {
        warn!(target: "planner", %message, "Stroke in progress was not saved before switching lessons");
      }
      let strokes = annotations::load_strokes(state.store.as_ref(), &canvas.client, &key);
      info!(target: "planner", %key, strokes = strokes.len(), "Sketch opened");
      let paths = sketch::to_paths(&strokes);
      canvas.pad = SketchPad::new(strokes);
      canvas.key = Some(key.clone());
      Some(ServerWsMessage::Opened { key, strokes: paths })
    }

    ClientWsMessage::Begin { x, y, tool } => {
      if canvas.key.is_none() {
        return not_open();
      }
      let tool = tool.unwrap_or_else(|| default_tool(state));
      let Some(point) = Point::captured(x, y) else {
        return Some(ServerWsMessage::Error { message: format!("point ({}, {}) is outside the canvas", x, y) });
      };
      // A stroke left open by a missing pointer up is finished and saved first.
      let pending = canvas.settle(state);
      canvas.pad.pointer_down(point, &tool, &state.config.sketch.background);
      pending
    }

    ClientWsMessage::Point { x, y } => {
      if !canvas.pad.is_drawing() {
        debug!(target: "planner", "Pointer move without an active stroke ignored");
        return None;
      }
      match Point::captured(x, y) {
        Some(point) => {
          canvas.pad.pointer_move(point);
        }
        None => debug!(target: "planner", x, y, "Out-of-range pointer move dropped"),
      }
      None
    }

    ClientWsMessage::End => canvas.settle(state),

    ClientWsMessage::Clear => {
      let Some(key) = canvas.key.clone() else { return not_open() };
      canvas.pad.clear();
      info!(target: "planner", %key, "Sketch cleared");
      match annotations::clear_sketch(state.store.as_ref(), &canvas.client, &key) {
        Ok(outcome) => Some(ServerWsMessage::Saved { strokes: 0, saved: outcome.saved, warning: outcome.warning }),
        Err(e) => Some(ServerWsMessage::Error { message: e.to_string() }),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::annotations::LessonAddress;
  use crate::state::tests::test_state;

  fn open_msg(lesson_id: &str) -> ClientWsMessage {
    let raw = format!(r#"{{"type":"open","class_id":"12AA_SL","term_id":"T1","week_id":"T1-W1","lesson_id":"{}"}}"#, lesson_id);
    serde_json::from_str(&raw).unwrap()
  }

  fn key_of(lesson_id: &str) -> String {
    LessonAddress {
      class_id: "12AA_SL".into(),
      term_id: "T1".into(),
      week_id: "T1-W1".into(),
      lesson_id: Some(lesson_id.into()),
      lesson_ordinal: None,
    }
    .key()
    .unwrap()
  }

  fn canvas(client: &str) -> Canvas {
    Canvas::new(ClientId::parse(client).unwrap())
  }

  fn draw(state: &AppState, canvas: &mut Canvas, x: f64) -> Option<ServerWsMessage> {
    assert!(handle_client_ws(ClientWsMessage::Begin { x, y: 2.0, tool: None }, state, canvas).is_none());
    assert!(handle_client_ws(ClientWsMessage::Point { x: 3.333, y: 4.0 }, state, canvas).is_none());
    handle_client_ws(ClientWsMessage::End, state, canvas)
  }

  fn saved_count(state: &AppState, client: &str, lesson_id: &str) -> usize {
    annotations::load_strokes(state.store.as_ref(), &ClientId::parse(client).unwrap(), &key_of(lesson_id)).len()
  }

  #[test]
  fn drawing_requires_an_open_lesson() {
    let state = test_state();
    let mut canvas = canvas("c1");
    let reply = handle_client_ws(ClientWsMessage::Begin { x: 1.0, y: 1.0, tool: None }, &state, &mut canvas);
    assert!(matches!(reply, Some(ServerWsMessage::Error { .. })));
    assert!(!canvas.pad.is_drawing());
  }

  #[test]
  fn stroke_is_persisted_on_pointer_up_and_reloaded_on_open() {
    let state = test_state();
    let mut first = canvas("c1");
    assert!(matches!(handle_client_ws(open_msg("L1"), &state, &mut first), Some(ServerWsMessage::Opened { ref strokes, .. }) if strokes.is_empty()));

    let saved = draw(&state, &mut first, 1.0);
    assert!(matches!(saved, Some(ServerWsMessage::Saved { strokes: 1, saved: true, .. })));
    // A second pointer up with nothing active is silent.
    assert!(handle_client_ws(ClientWsMessage::End, &state, &mut first).is_none());

    let mut other = canvas("c1");
    match handle_client_ws(open_msg("L1"), &state, &mut other) {
      Some(ServerWsMessage::Opened { key, strokes }) => {
        assert_eq!(key, r#"["12AA_SL","T1","T1-W1","L1"]"#);
        assert_eq!(strokes.len(), 1);
        assert_eq!(strokes[0].d, "M 1 2 L 3.33 4");
        assert_eq!(strokes[0].color, "#111111");
      }
      reply => panic!("unexpected reply {:?}", reply),
    }

    assert!(matches!(handle_client_ws(ClientWsMessage::Clear, &state, &mut other), Some(ServerWsMessage::Saved { strokes: 0, .. })));
    assert_eq!(saved_count(&state, "c1", "L1"), 0);
  }

  #[test]
  fn canvases_opened_together_keep_each_others_strokes() {
    let state = test_state();
    let (mut a, mut b) = (canvas("c1"), canvas("c1"));
    handle_client_ws(open_msg("L1"), &state, &mut a);
    handle_client_ws(open_msg("L1"), &state, &mut b);

    draw(&state, &mut a, 1.0);
    let reply = draw(&state, &mut b, 5.0);
    assert!(matches!(reply, Some(ServerWsMessage::Saved { strokes: 2, .. })));
    assert_eq!(saved_count(&state, "c1", "L1"), 2);
  }

  #[test]
  fn sketches_are_private_to_their_client() {
    let state = test_state();
    let (mut alice, mut bob) = (canvas("alice"), canvas("bob"));
    handle_client_ws(open_msg("L1"), &state, &mut alice);
    draw(&state, &mut alice, 1.0);

    match handle_client_ws(open_msg("L1"), &state, &mut bob) {
      Some(ServerWsMessage::Opened { strokes, .. }) => assert!(strokes.is_empty()),
      reply => panic!("unexpected reply {:?}", reply),
    }
    handle_client_ws(ClientWsMessage::Clear, &state, &mut bob);
    assert_eq!(saved_count(&state, "alice", "L1"), 1);
  }

  #[test]
  fn switching_lessons_mid_stroke_keeps_the_stroke_where_it_was_drawn() {
    let state = test_state();
    let mut c = canvas("c1");
    handle_client_ws(open_msg("L1"), &state, &mut c);
    handle_client_ws(ClientWsMessage::Begin { x: 1.0, y: 2.0, tool: None }, &state, &mut c);
    handle_client_ws(ClientWsMessage::Point { x: 3.0, y: 4.0 }, &state, &mut c);

    assert!(matches!(handle_client_ws(open_msg("L2"), &state, &mut c), Some(ServerWsMessage::Opened { .. })));
    assert!(!c.pad.is_drawing());
    assert_eq!(saved_count(&state, "c1", "L1"), 1);
    assert_eq!(saved_count(&state, "c1", "L2"), 0);
  }

  #[test]
  fn out_of_range_points_are_refused() {
    let state = test_state();
    let mut c = canvas("c1");
    handle_client_ws(open_msg("L1"), &state, &mut c);
    let reply = handle_client_ws(ClientWsMessage::Begin { x: f64::INFINITY, y: 1.0, tool: None }, &state, &mut c);
    assert!(matches!(reply, Some(ServerWsMessage::Error { .. })));
    assert!(!c.pad.is_drawing());

    handle_client_ws(ClientWsMessage::Begin { x: 1.0, y: 1.0, tool: None }, &state, &mut c);
    handle_client_ws(ClientWsMessage::Point { x: 1e300, y: 1.0 }, &state, &mut c);
    handle_client_ws(ClientWsMessage::End, &state, &mut c);
    let saved = annotations::load(state.store.as_ref(), &c.client, &key_of("L1"));
    assert_eq!(saved.sketch.len(), 1);
    assert_eq!(saved.sketch[0].d, "M 1 1");
  }

  #[test]
  fn open_with_bad_address_is_an_error() {
    let state = test_state();
    let mut canvas = canvas("c1");
    let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"open","class_id":"12AA_SL","term_id":"T1","week_id":"T1-W1"}"#).unwrap();
    assert!(matches!(handle_client_ws(msg, &state, &mut canvas), Some(ServerWsMessage::Error { .. })));
    assert!(canvas.key.is_none());
  }
}
