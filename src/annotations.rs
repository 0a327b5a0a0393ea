//! Student annotations on a lesson: freeform notes and a sketch, both kept in
//! the local store under the client's scope and the lesson's composite key.
//! Nothing here touches the plan document.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::ClientId;
use crate::error::{ApiError, StoreError};
use crate::sketch::{self, LessonRef, Stroke, StrokePath};
use crate::store::KvStore;

/// Identifies a lesson from the viewer's point of view.
#[derive(Clone, Debug, Deserialize)]
pub struct LessonAddress {
  pub class_id: String,
  pub term_id: String,
  pub week_id: String,
  #[serde(default)] pub lesson_id: Option<String>,
  /// 1-based position in the week; used only when `lesson_id` is absent.
  #[serde(default)] pub lesson_ordinal: Option<usize>,
}

impl LessonAddress {
  pub fn key(&self) -> Result<String, ApiError> {
    if self.class_id.trim().is_empty() {
      return Err(ApiError::BadRequest("class_id is required".into()));
    }
    let lesson = match (self.lesson_id.as_deref(), self.lesson_ordinal) {
      (Some(id), ordinal) if !id.trim().is_empty() => LessonRef::new(id, ordinal.unwrap_or(0)),
      (_, Some(n)) if n > 0 => LessonRef::Ordinal(n),
      _ => return Err(ApiError::BadRequest("lesson_id or a positive lesson_ordinal is required".into())),
    };
    Ok(sketch::key_for(&self.class_id, &self.term_id, &self.week_id, &lesson))
  }
}

const NOTES: &str = "notes";
const SKETCH: &str = "sketch";

#[derive(Debug, Serialize)]
pub struct Annotations {
  pub key: String,
  pub notes: String,
  pub sketch: Vec<StrokePath>,
}

/// Outcome of a write. Quota failures are not fatal: the edit just isn't kept.
#[derive(Debug, Serialize, PartialEq)]
pub struct SaveOutcome {
  pub saved: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub warning: Option<String>,
}

fn soften(key: &str, result: Result<(), StoreError>) -> Result<SaveOutcome, StoreError> {
  match result {
    Ok(()) => Ok(SaveOutcome { saved: true, warning: None }),
    Err(e @ StoreError::QuotaExceeded { .. }) => {
      warn!(target: "planner", %key, error = %e, "Local store quota exceeded; annotation not saved");
      Ok(SaveOutcome { saved: false, warning: Some(e.to_string()) })
    }
    Err(e) => Err(e),
  }
}

/// Saved sketch for `key`. A corrupt entry is logged and treated as empty.
pub fn load_strokes(store: &dyn KvStore, client: &ClientId, key: &str) -> Vec<Stroke> {
  let Some(raw) = store.get(&client.scoped(SKETCH, key)) else { return Vec::new() };
  sketch::deserialize(&raw).unwrap_or_else(|e| {
    warn!(target: "planner", %key, error = %e, "Ignoring unreadable saved sketch");
    Vec::new()
  })
}

pub fn load(store: &dyn KvStore, client: &ClientId, key: &str) -> Annotations {
  Annotations {
    key: key.to_string(),
    notes: store.get(&client.scoped(NOTES, key)).unwrap_or_default(),
    sketch: sketch::to_paths(&load_strokes(store, client, key)),
  }
}

/// Store notes; empty notes remove the entry.
pub fn save_notes(store: &dyn KvStore, client: &ClientId, key: &str, notes: &str) -> Result<SaveOutcome, StoreError> {
  debug!(target: "planner", %key, bytes = notes.len(), "Saving lesson notes");
  let nkey = client.scoped(NOTES, key);
  if notes.is_empty() {
    return soften(key, store.remove(&nkey));
  }
  soften(key, store.set(&nkey, notes))
}

/// Result of adding one stroke: the write outcome and how many strokes the
/// saved sketch now holds.
#[derive(Debug, PartialEq)]
pub struct StrokeSaved {
  pub outcome: SaveOutcome,
  pub strokes: usize,
}

/// Add a finished stroke to whatever is saved for `key` right now, so canvases
/// open on the same lesson never drop each other's strokes. A saved sketch that
/// no longer parses is left alone and reported as a sketch error.
pub fn append_stroke(store: &dyn KvStore, client: &ClientId, key: &str, stroke: &Stroke) -> Result<StrokeSaved, ApiError> {
  let mut count = 0;
  let mut unreadable = None;
  let result = store.update(&client.scoped(SKETCH, key), &mut |current: Option<&str>| -> Option<String> {
    let mut strokes = match current.map(sketch::deserialize).transpose() {
      Ok(saved) => saved.unwrap_or_default(),
      Err(e) => {
        unreadable = Some(e);
        return current.map(String::from);
      }
    };
    strokes.push(stroke.clone());
    count = strokes.len();
    Some(sketch::serialize(&strokes))
  });
  if let Some(e) = unreadable {
    warn!(target: "planner", %key, error = %e, "Saved sketch is unreadable; stroke not added");
    return Err(e.into());
  }
  let outcome = soften(key, result)?;
  if !outcome.saved {
    count -= 1;
  }
  debug!(target: "planner", %key, strokes = count, "Stroke appended");
  Ok(StrokeSaved { outcome, strokes: count })
}

pub fn clear_sketch(store: &dyn KvStore, client: &ClientId, key: &str) -> Result<SaveOutcome, StoreError> {
  debug!(target: "planner", %key, "Clearing sketch");
  soften(key, store.remove(&client.scoped(SKETCH, key)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sketch::{begin_stroke, Point, Tool, ToolMode};
  use crate::store::MemoryStore;

  fn address(lesson_id: Option<&str>, ordinal: Option<usize>) -> LessonAddress {
    LessonAddress {
      class_id: "12AA_SL".into(),
      term_id: "T1".into(),
      week_id: "T1-W1".into(),
      lesson_id: lesson_id.map(String::from),
      lesson_ordinal: ordinal,
    }
  }

  fn client(id: &str) -> ClientId {
    ClientId::parse(id).unwrap()
  }

  fn stroke_at(x: f64) -> Stroke {
    let tool = Tool { mode: ToolMode::Pen, color: "#000".into(), width: 3.0 };
    begin_stroke(Point { x, y: 5.0 }, &tool, "#fff").unwrap()
  }

  #[test]
  fn address_keys_prefer_ids_and_require_some_lesson_handle() {
    assert_eq!(address(Some("L2"), Some(5)).key().unwrap(), r#"["12AA_SL","T1","T1-W1","L2"]"#);
    assert_eq!(address(Some(""), Some(3)).key().unwrap(), r#"["12AA_SL","T1","T1-W1",3]"#);
    assert!(address(None, None).key().is_err());
    assert!(address(None, Some(0)).key().is_err());
  }

  #[test]
  fn notes_and_sketch_round_trip_through_the_store() {
    let store = MemoryStore::default();
    let me = client("c1");
    let key = address(Some("L1"), None).key().unwrap();
    assert_eq!(load(&store, &me, &key).notes, "");

    save_notes(&store, &me, &key, "remember the chain rule").unwrap();
    let stroke = stroke_at(1.234);
    let saved = append_stroke(&store, &me, &key, &stroke).unwrap();
    assert_eq!(saved.strokes, 1);
    assert!(saved.outcome.saved);

    let got = load(&store, &me, &key);
    assert_eq!(got.notes, "remember the chain rule");
    assert_eq!(got.sketch, sketch::to_paths(&[stroke]));

    clear_sketch(&store, &me, &key).unwrap();
    assert!(load(&store, &me, &key).sketch.is_empty());
    save_notes(&store, &me, &key, "").unwrap();
    assert_eq!(store.get(&me.scoped(NOTES, &key)), None);
  }

  #[test]
  fn appends_from_separate_canvases_accumulate() {
    let store = MemoryStore::default();
    let me = client("c1");
    let key = address(Some("L1"), None).key().unwrap();
    // Two canvases opened while the sketch was empty both add a stroke.
    append_stroke(&store, &me, &key, &stroke_at(1.0)).unwrap();
    let second = append_stroke(&store, &me, &key, &stroke_at(2.0)).unwrap();
    assert_eq!(second.strokes, 2);
    assert_eq!(load_strokes(&store, &me, &key).len(), 2);
  }

  #[test]
  fn clients_do_not_see_each_others_annotations() {
    let store = MemoryStore::default();
    let (alice, bob) = (client("alice"), client("bob"));
    let key = address(Some("L1"), None).key().unwrap();

    save_notes(&store, &alice, &key, "mine").unwrap();
    append_stroke(&store, &alice, &key, &stroke_at(1.0)).unwrap();
    let seen = load(&store, &bob, &key);
    assert_eq!(seen.notes, "");
    assert!(seen.sketch.is_empty());

    append_stroke(&store, &bob, &key, &stroke_at(2.0)).unwrap();
    clear_sketch(&store, &bob, &key).unwrap();
    assert_eq!(load_strokes(&store, &alice, &key).len(), 1);
    assert_eq!(load(&store, &alice, &key).notes, "mine");
  }

  #[test]
  fn quota_failures_are_warnings_not_errors() {
    let store = MemoryStore::with_quota(Some(16));
    let outcome = save_notes(&store, &client("c1"), "k", "far too long to fit in sixteen bytes").unwrap();
    assert!(!outcome.saved);
    assert!(outcome.warning.unwrap().contains("quota"));

    let appended = append_stroke(&store, &client("c1"), "k", &stroke_at(1.0)).unwrap();
    assert!(!appended.outcome.saved);
    assert_eq!(appended.strokes, 0);
  }

  #[test]
  fn corrupt_sketch_reads_as_empty_but_refuses_appends() {
    let store = MemoryStore::default();
    let me = client("c1");
    let corrupt = "[{\"color\":\"#000\",\"width\":1,\"d\":\"Q\"}]";
    store.set(&me.scoped(SKETCH, "k"), corrupt).unwrap();
    assert!(load_strokes(&store, &me, "k").is_empty());

    let err = append_stroke(&store, &me, "k", &stroke_at(1.0)).unwrap_err();
    assert_eq!(err.status_and_code().1, "bad_sketch");
    assert_eq!(store.get(&me.scoped(SKETCH, "k")).as_deref(), Some(corrupt));
  }
}
