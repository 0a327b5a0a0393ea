//! Shared reference datasets (syllabus objectives, textbook references),
//! search over them, and resolution of a lesson's weak references.

use serde::Serialize;

use crate::domain::{SyllabusObjective, TextbookReference};
use crate::plan::find_by_id;
use crate::util::matches_query;

/// Search results are capped so a blank query doesn't dump the whole table.
pub const SEARCH_LIMIT: usize = 60;

#[derive(Clone, Debug, Default, Serialize)]
pub struct ReferenceData {
  pub syllabus: Vec<SyllabusObjective>,
  pub textbooks: Vec<TextbookReference>,
}

/// A weak reference after lookup. Dangling ids become `Missing`, never an error.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolved<T> {
  Found(T),
  Missing { id: String },
}

impl ReferenceData {
  pub fn search_syllabus(&self, query: &str) -> Vec<&SyllabusObjective> {
    self.syllabus
      .iter()
      .filter(|x| matches_query(query, &[&x.id, &x.section, &x.topic, &x.text]))
      .take(SEARCH_LIMIT)
      .collect()
  }

  pub fn search_textbooks(&self, query: &str) -> Vec<&TextbookReference> {
    self.textbooks
      .iter()
      .filter(|x| {
        let detail = x.detail.as_deref().unwrap_or_default();
        matches_query(query, &[&x.id, &x.textbook, &x.label, detail])
      })
      .take(SEARCH_LIMIT)
      .collect()
  }

  pub fn resolve_objectives(&self, ids: &[String]) -> Vec<Resolved<SyllabusObjective>> {
    resolve_all(&self.syllabus, ids)
  }

  pub fn resolve_textbooks(&self, ids: &[String]) -> Vec<Resolved<TextbookReference>> {
    resolve_all(&self.textbooks, ids)
  }
}

fn resolve_all<T: crate::domain::Identified + Clone>(table: &[T], ids: &[String]) -> Vec<Resolved<T>> {
  ids
    .iter()
    .map(|id| match find_by_id(table, id) {
      Some(x) => Resolved::Found(x.clone()),
      None => Resolved::Missing { id: id.clone() },
    })
    .collect()
}
