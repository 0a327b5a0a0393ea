//! An editor's working copy: one plan document plus the selection/expansion
//! state pointing into it. Each operation acts on the current selection the way
//! the editor buttons do, then re-validates the selection itself.

use serde::Deserialize;

use crate::domain::{Lesson, PlanDocument, Week};
use crate::error::InvalidDate;
use crate::plan::{self, TreePath};
use crate::selection::{EditorState, NodeKind};

/// Which reference list of a lesson an id goes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefList {
  Syllabus,
  Textbook,
}

/// Field edits from the lesson form. `None` leaves the field alone.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LessonEdit {
  #[serde(default)] pub title: Option<String>,
  #[serde(default)] pub homework: Option<String>,
  #[serde(default)] pub notes_latex: Option<String>,
}

#[derive(Debug)]
pub struct Workspace {
  pub document: PlanDocument,
  pub editor: EditorState,
}

impl Workspace {
  /// Take ownership of a freshly loaded document and reset the editor state for it.
  pub fn open(document: PlanDocument) -> Self {
    let mut editor = EditorState::default();
    editor.reset_for_new_document(&document);
    Self { document, editor }
  }

  pub fn selection(&self) -> TreePath {
    self.editor.selection()
  }

  /// Select a node; indices that don't resolve are trimmed away.
  pub fn select(&mut self, path: TreePath) {
    self.editor.select(path);
    self.editor.revalidate(&self.document);
  }

  pub fn toggle(&mut self, kind: NodeKind, term: usize, week: usize) -> bool {
    self.editor.toggle_expanded(kind, term, week)
  }

  pub fn selected_lesson(&self) -> Option<&Lesson> {
    plan::resolve_path(&self.document, self.selection()).lesson
  }

  fn selected_lesson_mut(&mut self) -> Option<&mut Lesson> {
    let TreePath { term_index, week_index, lesson_index } = self.selection();
    plan::lesson_mut(&mut self.document, term_index?, week_index?, lesson_index?)
  }

  /// Selected week, defaulting to the first week of the selected term.
  fn target_week_mut(&mut self) -> Option<(usize, usize, &mut Week)> {
    let sel = self.selection();
    let t = sel.term_index.unwrap_or(0);
    let w = sel.week_index.unwrap_or(0);
    plan::week_mut(&mut self.document, t, w).map(|week| (t, w, week))
  }

  /// Append a week to the selected term (first term if none) and select it.
  pub fn add_week(&mut self) -> Option<TreePath> {
    let t = self.selection().term_index.unwrap_or(0);
    let term = plan::term_mut(&mut self.document, t)?;
    plan::insert_week(term, t);
    let path = TreePath::week(t, term.weeks.len() - 1);
    self.select(path);
    Some(path)
  }

  /// Append a lesson to the selected week and select it.
  pub fn add_lesson(&mut self) -> Option<TreePath> {
    let (t, w, week) = self.target_week_mut()?;
    plan::insert_lesson(week);
    let path = TreePath::lesson(t, w, week.lessons.len() - 1);
    self.select(path);
    Some(path)
  }

  pub fn apply_lesson_edit(&mut self, edit: LessonEdit) -> bool {
    let Some(lesson) = self.selected_lesson_mut() else { return false };
    if let Some(title) = edit.title {
      lesson.title = title;
    }
    if let Some(homework) = edit.homework {
      lesson.homework = Some(homework);
    }
    if let Some(notes) = edit.notes_latex {
      lesson.notes_latex = Some(notes);
    }
    true
  }

  /// Add `id` to the selected lesson's list. False when nothing is selected or it was already there.
  pub fn attach(&mut self, list: RefList, id: &str) -> bool {
    let id = id.trim();
    if id.is_empty() {
      return false;
    }
    match self.selected_lesson_mut() {
      Some(l) => plan::attach_id(ids_mut(l, list), id),
      None => false,
    }
  }

  pub fn detach(&mut self, list: RefList, id: &str) -> bool {
    match self.selected_lesson_mut() {
      Some(l) => plan::detach_id(ids_mut(l, list), id),
      None => false,
    }
  }

  /// Move the selected lesson by `delta`; the selection follows it.
  pub fn move_selected_lesson(&mut self, delta: isize) -> bool {
    let TreePath { term_index: Some(t), week_index: Some(w), lesson_index: Some(l) } = self.selection() else {
      return false;
    };
    let Some(week) = plan::week_mut(&mut self.document, t, w) else { return false };
    if !plan::move_lesson(week, l, delta) {
      return false;
    }
    // move_lesson only succeeds when l + delta is in range.
    let to = l.checked_add_signed(delta).unwrap_or(l);
    self.select(TreePath::lesson(t, w, to));
    true
  }

  /// Delete the selected lesson and fall back to selecting its week.
  pub fn delete_selected_lesson(&mut self) -> Option<Lesson> {
    let TreePath { term_index: Some(t), week_index: Some(w), lesson_index: Some(l) } = self.selection() else {
      return None;
    };
    let removed = plan::delete_lesson(plan::week_mut(&mut self.document, t, w)?, l)?;
    self.select(TreePath::week(t, w));
    Some(removed)
  }

  /// Set the start date of the selected week (first week of the term if none).
  pub fn set_selected_week_start_date(&mut self, raw: &str) -> Result<bool, InvalidDate> {
    match self.target_week_mut() {
      Some((_, _, week)) => plan::set_week_start_date(week, raw).map(|_| true),
      None => Ok(false),
    }
  }
}

fn ids_mut(lesson: &mut Lesson, list: RefList) -> &mut Vec<String> {
  match list {
    RefList::Syllabus => &mut lesson.syllabus_ids,
    RefList::Textbook => &mut lesson.textbook_ids,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Term;
  use chrono::NaiveDate;

  fn workspace() -> Workspace {
    let doc = PlanDocument {
      class_id: "12AA_HL".into(),
      terms: vec![
        Term { term_id: "T1".into(), weeks: vec![Week { week_id: "T1-W1".into(), ..Week::default() }], ..Term::default() },
        Term { term_id: "T2".into(), ..Term::default() },
      ],
      ..PlanDocument::default()
    };
    Workspace::open(doc)
  }

  #[test]
  fn open_selects_first_week() {
    assert_eq!(workspace().selection(), TreePath::week(0, 0));
  }

  #[test]
  fn add_week_and_lesson_select_the_new_node() {
    let mut ws = workspace();
    ws.select(TreePath::term(1));
    assert_eq!(ws.add_week(), Some(TreePath::week(1, 0)));
    assert_eq!(ws.document.terms[1].weeks[0].week_id, "T2-W1");

    assert_eq!(ws.add_lesson(), Some(TreePath::lesson(1, 0, 0)));
    assert_eq!(ws.add_lesson(), Some(TreePath::lesson(1, 0, 1)));
    assert_eq!(ws.selected_lesson().map(|l| l.lesson_id.as_str()), Some("L2"));
  }

  #[test]
  fn add_lesson_without_weeks_is_a_no_op() {
    let mut ws = workspace();
    ws.select(TreePath::term(1));
    assert_eq!(ws.add_lesson(), None);
    assert_eq!(ws.selection(), TreePath::term(1));
  }

  #[test]
  fn edits_and_references_target_the_selected_lesson() {
    let mut ws = workspace();
    assert!(!ws.apply_lesson_edit(LessonEdit { title: Some("nothing selected".into()), ..LessonEdit::default() }));
    assert!(!ws.attach(RefList::Syllabus, "A.1"));

    ws.add_lesson();
    assert!(ws.apply_lesson_edit(LessonEdit { title: Some("Limits".into()), notes_latex: Some(r"$\lim_{x\to0}$".into()), ..LessonEdit::default() }));
    assert!(ws.attach(RefList::Syllabus, "A.1"));
    assert!(!ws.attach(RefList::Syllabus, "A.1"));
    assert!(ws.attach(RefList::Textbook, "OX-1A"));
    assert!(!ws.attach(RefList::Textbook, "  "));
    assert!(ws.detach(RefList::Textbook, "OX-1A"));

    let l = ws.selected_lesson().unwrap();
    assert_eq!(l.title, "Limits");
    assert_eq!(l.homework.as_deref(), Some(""));
    assert_eq!(l.syllabus_ids, vec!["A.1"]);
    assert!(l.textbook_ids.is_empty());
  }

  #[test]
  fn move_follows_lesson_and_delete_clears_lesson_selection() {
    let mut ws = workspace();
    ws.add_lesson();
    ws.add_lesson();
    ws.select(TreePath::lesson(0, 0, 0));
    assert!(ws.move_selected_lesson(1));
    assert_eq!(ws.selection(), TreePath::lesson(0, 0, 1));
    assert_eq!(ws.selected_lesson().unwrap().lesson_id, "L1");
    assert!(!ws.move_selected_lesson(1));

    let removed = ws.delete_selected_lesson().unwrap();
    assert_eq!(removed.lesson_id, "L1");
    assert_eq!(ws.selection(), TreePath::week(0, 0));
    assert_eq!(ws.document.terms[0].weeks[0].lessons.len(), 1);
    assert!(ws.delete_selected_lesson().is_none());
  }

  #[test]
  fn week_date_edits_are_validated() {
    let mut ws = workspace();
    assert_eq!(ws.set_selected_week_start_date("2025-02-30"), Err(InvalidDate("2025-02-30".into())));
    assert!(ws.document.terms[0].weeks[0].start_date.is_none());
    assert_eq!(ws.set_selected_week_start_date("2025-03-03"), Ok(true));
    assert_eq!(ws.document.terms[0].weeks[0].start_date, NaiveDate::from_ymd_opt(2025, 3, 3));

    ws.select(TreePath::term(1));
    assert_eq!(ws.set_selected_week_start_date("2025-03-03"), Ok(false));
  }
}
