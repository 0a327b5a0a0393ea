//! Plan document model: loading, path lookup, structural edits and derived views.
//!
//! Every operation is total. Stale or out-of-range indices give `None`/`false`
//! or a no-op, so callers driven by transient UI indices never panic.

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Identified, Lesson, PlanDocument, Term, Week};
use crate::error::{InvalidDate, MalformedDocument};

/// Length of the interval a dated week covers.
const WEEK_DAYS: u64 = 7;

/// A path into the plan tree. Trailing `None`s mean "nothing at this depth".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePath {
  #[serde(default)] pub term_index: Option<usize>,
  #[serde(default)] pub week_index: Option<usize>,
  #[serde(default)] pub lesson_index: Option<usize>,
}

impl TreePath {
  pub fn term(t: usize) -> Self {
    Self { term_index: Some(t), week_index: None, lesson_index: None }
  }
  pub fn week(t: usize, w: usize) -> Self {
    Self { term_index: Some(t), week_index: Some(w), lesson_index: None }
  }
  pub fn lesson(t: usize, w: usize, l: usize) -> Self {
    Self { term_index: Some(t), week_index: Some(w), lesson_index: Some(l) }
  }
}

/// Result of [`resolve_path`]; each level is `None` when it does not resolve.
#[derive(Debug, Default)]
pub struct ResolvedPath<'a> {
  pub term: Option<&'a Term>,
  pub week: Option<&'a Week>,
  pub lesson: Option<&'a Lesson>,
}

/// Position of a week inside a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WeekPos {
  pub term_index: usize,
  pub week_index: usize,
}

/// Parse a plan document.
///
/// The top-level `terms` must be an array. Optional nested collections that are
/// absent or `null` become empty, and duplicate ids in a lesson's reference
/// lists are dropped (first occurrence wins).
pub fn load_document(source: &str) -> Result<PlanDocument, MalformedDocument> {
  let raw: Value = serde_json::from_str(source)?;
  if !raw.get("terms").map_or(false, Value::is_array) {
    return Err(MalformedDocument::MissingTerms);
  }
  let mut doc: PlanDocument = serde_json::from_value(raw)?;
  for lesson in doc.terms.iter_mut().flat_map(|t| t.weeks.iter_mut()).flat_map(|w| w.lessons.iter_mut()) {
    dedup_in_place(&mut lesson.syllabus_ids);
    dedup_in_place(&mut lesson.textbook_ids);
  }
  Ok(doc)
}

/// Serialize the way the files are stored in the repository: two-space pretty JSON.
pub fn to_pretty_json(doc: &PlanDocument) -> String {
  // A PlanDocument only holds strings, dates, lists and JSON maps.
  serde_json::to_string_pretty(doc).unwrap_or_else(|_| String::from("{}"))
}

fn dedup_in_place(ids: &mut Vec<String>) {
  let mut seen = BTreeSet::new();
  ids.retain(|id| seen.insert(id.clone()));
}

pub fn resolve_path<'a>(doc: &'a PlanDocument, path: TreePath) -> ResolvedPath<'a> {
  let term = path.term_index.and_then(|t| doc.terms.get(t));
  let week = term.zip(path.week_index).and_then(|(t, w)| t.weeks.get(w));
  let lesson = week.zip(path.lesson_index).and_then(|(w, l)| w.lessons.get(l));
  ResolvedPath { term, week, lesson }
}

pub fn term_mut(doc: &mut PlanDocument, t: usize) -> Option<&mut Term> {
  doc.terms.get_mut(t)
}

pub fn week_mut(doc: &mut PlanDocument, t: usize, w: usize) -> Option<&mut Week> {
  doc.terms.get_mut(t)?.weeks.get_mut(w)
}

pub fn lesson_mut(doc: &mut PlanDocument, t: usize, w: usize, l: usize) -> Option<&mut Lesson> {
  week_mut(doc, t, w)?.lessons.get_mut(l)
}

/// Linear lookup in a reference table.
pub fn find_by_id<'a, T: Identified>(table: &'a [T], id: &str) -> Option<&'a T> {
  table.iter().find(|x| x.id() == id)
}

/// Append an empty week to `term`. `term_index` is only used to name the week
/// when the term has no id of its own.
pub fn insert_week(term: &mut Term, term_index: usize) -> &Week {
  let next = term.weeks.len() + 1;
  let week = Week {
    week_id: format!("{}-W{}", term.effective_id(term_index), next),
    label: format!("Week {}", next),
    ..Week::default()
  };
  term.weeks.push(week);
  &term.weeks[term.weeks.len() - 1]
}

pub fn insert_lesson(week: &mut Week) -> &Lesson {
  let next = week.lessons.len() + 1;
  let lesson = Lesson {
    lesson_id: format!("L{}", next),
    title: format!("New Lesson {}", next),
    homework: Some(String::new()),
    notes_latex: Some(String::new()),
    ..Lesson::default()
  };
  week.lessons.push(lesson);
  &week.lessons[week.lessons.len() - 1]
}

/// Swap the lesson at `from` with its neighbour at `from + delta`.
/// Returns false (and leaves the week alone) when either index is out of bounds.
pub fn move_lesson(week: &mut Week, from: usize, delta: isize) -> bool {
  let len = week.lessons.len();
  if from >= len {
    return false;
  }
  match from.checked_add_signed(delta) {
    Some(to) if to < len => {
      week.lessons.swap(from, to);
      true
    }
    _ => false,
  }
}

/// Remove the lesson at `index`; returns it, or `None` if the index was stale.
pub fn delete_lesson(week: &mut Week, index: usize) -> Option<Lesson> {
  (index < week.lessons.len()).then(|| week.lessons.remove(index))
}

/// Set or clear (`""`) a week's start date. Rejected input, including blank or
/// padded strings, leaves the week untouched.
pub fn set_week_start_date(week: &mut Week, raw: &str) -> Result<(), InvalidDate> {
  if raw.is_empty() {
    week.start_date = None;
    return Ok(());
  }
  let date = parse_iso_date(raw).ok_or_else(|| InvalidDate(raw.to_string()))?;
  week.start_date = Some(date);
  Ok(())
}

/// Strict `YYYY-MM-DD`: fixed width, ASCII digits, and a real calendar date.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
  let b = raw.as_bytes();
  let shape_ok = b.len() == 10
    && b[4] == b'-'
    && b[7] == b'-'
    && b.iter().enumerate().all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit());
  if !shape_ok {
    return None;
  }
  NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Add an id to a reference list unless it is already there.
pub fn attach_id(ids: &mut Vec<String>, id: &str) -> bool {
  if ids.iter().any(|x| x == id) {
    return false;
  }
  ids.push(id.to_string());
  true
}

pub fn detach_id(ids: &mut Vec<String>, id: &str) -> bool {
  let before = ids.len();
  ids.retain(|x| x != id);
  ids.len() != before
}

/// Every syllabus id referenced by any lesson in the document.
pub fn scheduled_objective_ids(doc: &PlanDocument) -> BTreeSet<String> {
  lessons(doc).flat_map(|l| l.syllabus_ids.iter().cloned()).collect()
}

/// First week in document order whose `[start_date, start_date + 7 days)` contains `date`.
pub fn find_week_for_date(doc: &PlanDocument, date: NaiveDate) -> Option<WeekPos> {
  for (term_index, term) in doc.terms.iter().enumerate() {
    for (week_index, week) in term.weeks.iter().enumerate() {
      let Some(start) = week.start_date else { continue };
      let Some(end) = start.checked_add_days(Days::new(WEEK_DAYS)) else { continue };
      if start <= date && date < end {
        return Some(WeekPos { term_index, week_index });
      }
    }
  }
  None
}

pub fn lessons(doc: &PlanDocument) -> impl Iterator<Item = &Lesson> {
  doc.terms.iter().flat_map(|t| t.weeks.iter()).flat_map(|w| w.lessons.iter())
}
