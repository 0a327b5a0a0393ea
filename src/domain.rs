//! Domain models: the two reference tables and the term → week → lesson plan tree.
//!
//! Optional nested collections accept both a missing key and an explicit `null`.
//! Fields this crate does not know about are kept in `extra` and written back out.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// One syllabus learning outcome.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SyllabusObjective {
  pub id: String,
  #[serde(default, deserialize_with = "null_as_default")] pub section: String,
  #[serde(default, deserialize_with = "null_as_default")] pub topic: String,
  #[serde(default, deserialize_with = "null_as_default")] pub text: String,
}

/// One textbook section/exercise reference.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TextbookReference {
  pub id: String,
  #[serde(default, deserialize_with = "null_as_default")] pub textbook: String,
  #[serde(default, deserialize_with = "null_as_default")] pub label: String,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub detail: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub url: Option<String>,
}

/// Anything with a stable string identity inside a flat lookup table.
pub trait Identified {
  fn id(&self) -> &str;
}

impl Identified for SyllabusObjective {
  fn id(&self) -> &str { &self.id }
}

impl Identified for TextbookReference {
  fn id(&self) -> &str { &self.id }
}

/// Root record for one class.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct PlanDocument {
  #[serde(default, deserialize_with = "null_as_default")] pub class_id: String,
  #[serde(default, deserialize_with = "null_as_default")] pub label: String,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub programme: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub level: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub years: Option<Vec<String>>,
  pub terms: Vec<Term>,
  #[serde(flatten)] pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Term {
  #[serde(default, deserialize_with = "null_as_default")] pub term_id: String,
  #[serde(default, deserialize_with = "null_as_default")] pub label: String,
  #[serde(default, deserialize_with = "null_as_default")] pub weeks: Vec<Week>,
  #[serde(flatten)] pub extra: Map<String, Value>,
}

impl Term {
  /// The term's id, or `T<n>` (1-based) when the document left it blank.
  pub fn effective_id(&self, index: usize) -> String {
    if self.term_id.is_empty() { format!("T{}", index + 1) } else { self.term_id.clone() }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Week {
  #[serde(default, deserialize_with = "null_as_default")] pub week_id: String,
  #[serde(default, deserialize_with = "null_as_default")] pub label: String,
  #[serde(default, deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
  pub start_date: Option<NaiveDate>,
  #[serde(default, deserialize_with = "null_as_default")] pub lessons: Vec<Lesson>,
  #[serde(flatten)] pub extra: Map<String, Value>,
}

impl Week {
  /// The week's id, or `W<n>` (1-based) when the document left it blank.
  pub fn effective_id(&self, index: usize) -> String {
    if self.week_id.is_empty() { format!("W{}", index + 1) } else { self.week_id.clone() }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Lesson {
  #[serde(default, deserialize_with = "null_as_default")] pub lesson_id: String,
  #[serde(default, deserialize_with = "null_as_default")] pub title: String,
  #[serde(default, deserialize_with = "null_as_default")] pub syllabus_ids: Vec<String>,
  #[serde(default, deserialize_with = "null_as_default")] pub textbook_ids: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub homework: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub notes_latex: Option<String>,
  #[serde(flatten)] pub extra: Map<String, Value>,
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de> + Default,
{
  Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Week dates are `YYYY-MM-DD`. Anything else (wrong shape, impossible date,
/// non-string) is dropped with a warning instead of being guessed at.
fn lenient_date<'de, D>(d: D) -> Result<Option<NaiveDate>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = Option::<Value>::deserialize(d)?;
  match raw {
    None | Some(Value::Null) => Ok(None),
    Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
    Some(Value::String(s)) => match crate::plan::parse_iso_date(&s) {
      Some(date) => Ok(Some(date)),
      None => {
        warn!(target: "planner", value = %s, "Dropping malformed week start_date");
        Ok(None)
      }
    },
    Some(other) => {
      warn!(target: "planner", value = %other, "Dropping non-string week start_date");
      Ok(None)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn nulls_and_missing_collections_become_empty() {
    let week: Week = serde_json::from_value(json!({ "week_id": "T1-W1", "lessons": null })).unwrap();
    assert!(week.lessons.is_empty());
    let lesson: Lesson = serde_json::from_value(json!({ "title": "Limits", "syllabus_ids": null })).unwrap();
    assert!(lesson.syllabus_ids.is_empty());
    assert!(lesson.textbook_ids.is_empty());
  }

  #[test]
  fn malformed_start_dates_are_dropped() {
    let bad: Week = serde_json::from_value(json!({ "start_date": "2025-02-30" })).unwrap();
    assert_eq!(bad.start_date, None);
    let shape: Week = serde_json::from_value(json!({ "start_date": "6/1/2025" })).unwrap();
    assert_eq!(shape.start_date, None);
    let num: Week = serde_json::from_value(json!({ "start_date": 20250106 })).unwrap();
    assert_eq!(num.start_date, None);
    let ok: Week = serde_json::from_value(json!({ "start_date": "2025-01-06" })).unwrap();
    assert_eq!(ok.start_date, NaiveDate::from_ymd_opt(2025, 1, 6));
  }

  #[test]
  fn unknown_fields_survive_a_round_trip() {
    let raw = json!({ "lesson_id": "L1", "title": "Sequences", "duration": 70, "homework": "Ex 1A" });
    let lesson: Lesson = serde_json::from_value(raw).unwrap();
    assert_eq!(lesson.extra.get("duration"), Some(&json!(70)));
    let back = serde_json::to_value(&lesson).unwrap();
    assert_eq!(back["duration"], json!(70));
    assert_eq!(back["homework"], json!("Ex 1A"));
    assert!(back.get("notes_latex").is_none());
  }

  #[test]
  fn effective_ids_fall_back_to_ordinals() {
    let term = Term::default();
    assert_eq!(term.effective_id(1), "T2");
    let week = Week { week_id: "T1-W3".into(), ..Week::default() };
    assert_eq!(week.effective_id(0), "T1-W3");
  }
}
