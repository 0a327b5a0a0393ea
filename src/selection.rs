//! Editor UI state that lives beside a plan document: which node is selected and
//! which nodes are expanded. Nothing here observes the document; callers run
//! [`EditorState::revalidate`] after structural edits.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::PlanDocument;
use crate::plan::TreePath;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
  Term,
  Week,
}

/// Collapsed flags per node. A node nobody touched is collapsed.
#[derive(Clone, Debug, Default)]
pub struct ExpansionState {
  terms: HashMap<usize, bool>,
  weeks: HashMap<(usize, usize), bool>,
}

impl ExpansionState {
  pub fn is_collapsed_term(&self, t: usize) -> bool {
    self.terms.get(&t).copied().unwrap_or(true)
  }

  pub fn is_collapsed_week(&self, t: usize, w: usize) -> bool {
    self.weeks.get(&(t, w)).copied().unwrap_or(true)
  }

  /// Flip a node's collapsed flag; returns the new value. `week` is ignored for terms.
  pub fn toggle(&mut self, kind: NodeKind, term: usize, week: usize) -> bool {
    let flag = match kind {
      NodeKind::Term => self.terms.entry(term).or_insert(true),
      NodeKind::Week => self.weeks.entry((term, week)).or_insert(true),
    };
    *flag = !*flag;
    *flag
  }

  pub fn clear(&mut self) {
    self.terms.clear();
    self.weeks.clear();
  }

  /// Sorted list of expanded nodes, for clients.
  pub fn snapshot(&self) -> ExpansionSnapshot {
    let mut expanded_terms: Vec<usize> = self.terms.keys().copied().filter(|t| !self.is_collapsed_term(*t)).collect();
    let mut expanded_weeks: Vec<[usize; 2]> = self.weeks.keys().filter(|(t, w)| !self.is_collapsed_week(*t, *w)).map(|(t, w)| [*t, *w]).collect();
    expanded_terms.sort_unstable();
    expanded_weeks.sort_unstable();
    ExpansionSnapshot { expanded_terms, expanded_weeks }
  }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ExpansionSnapshot {
  pub expanded_terms: Vec<usize>,
  pub expanded_weeks: Vec<[usize; 2]>,
}

#[derive(Clone, Debug, Default)]
pub struct EditorState {
  selection: TreePath,
  pub expansion: ExpansionState,
}

impl EditorState {
  pub fn selection(&self) -> TreePath {
    self.selection
  }

  /// Replace the selection wholesale. A deeper index without its parent is dropped.
  pub fn select(&mut self, path: TreePath) {
    let mut path = path;
    if path.term_index.is_none() {
      path.week_index = None;
    }
    if path.week_index.is_none() {
      path.lesson_index = None;
    }
    self.selection = path;
  }

  pub fn toggle_expanded(&mut self, kind: NodeKind, term: usize, week: usize) -> bool {
    self.expansion.toggle(kind, term, week)
  }

  /// First term, first week, no lesson (for the parts that exist); everything collapsed.
  pub fn reset_for_new_document(&mut self, doc: &PlanDocument) {
    let term = (!doc.terms.is_empty()).then_some(0);
    let week = doc.terms.first().filter(|t| !t.weeks.is_empty()).map(|_| 0);
    self.select(TreePath { term_index: term, week_index: week, lesson_index: None });
    self.expansion.clear();
  }

  /// Drop selection levels whose index no longer resolves in `doc`.
  pub fn revalidate(&mut self, doc: &PlanDocument) {
    let TreePath { term_index, week_index, lesson_index } = self.selection;
    let term = term_index.and_then(|t| doc.terms.get(t).map(|term| (t, term)));
    let week = term.zip(week_index).and_then(|((_, term), w)| term.weeks.get(w).map(|week| (w, week)));
    let lesson = week.zip(lesson_index).and_then(|((_, week), l)| (l < week.lessons.len()).then_some(l));
    self.selection = TreePath {
      term_index: term.map(|(t, _)| t),
      week_index: week.map(|(w, _)| w),
      lesson_index: lesson,
    };
  }
}
