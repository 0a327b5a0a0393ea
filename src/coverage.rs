//! Coverage audit: which syllabus objectives no lesson in a plan schedules.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::{PlanDocument, SyllabusObjective};
use crate::plan::scheduled_objective_ids;
use crate::util::matches_query;

const FALLBACK_TOPIC: &str = "Other";

#[derive(Debug, Serialize)]
pub struct CoverageReport {
  pub class_id: String,
  pub total: usize,
  /// Distinct ids the plan schedules, including ids the syllabus no longer has.
  pub scheduled: usize,
  pub unscheduled_count: usize,
  pub groups: Vec<TopicGroup>,
}

#[derive(Debug, Serialize)]
pub struct TopicGroup {
  pub topic: String,
  pub items: Vec<SyllabusObjective>,
}

/// Objectives in `all` that `scheduled` does not mention, in syllabus order.
pub fn uncovered<'a>(all: &'a [SyllabusObjective], scheduled: &BTreeSet<String>) -> Vec<&'a SyllabusObjective> {
  all.iter().filter(|o| !scheduled.contains(&o.id)).collect()
}

/// Build the report. `query` filters the unscheduled list only; the totals are unaffected.
pub fn coverage_report(doc: &PlanDocument, syllabus: &[SyllabusObjective], query: &str) -> CoverageReport {
  let scheduled = scheduled_objective_ids(doc);
  let unscheduled: Vec<&SyllabusObjective> = uncovered(syllabus, &scheduled)
    .into_iter()
    .filter(|s| matches_query(query, &[&s.id, &s.section, &s.topic, &s.text]))
    .collect();

  // Group by topic, groups in order of first appearance.
  let mut groups: Vec<TopicGroup> = Vec::new();
  for s in &unscheduled {
    let topic = if s.topic.trim().is_empty() { FALLBACK_TOPIC } else { s.topic.as_str() };
    match groups.iter_mut().find(|g| g.topic == topic) {
      Some(g) => g.items.push((*s).clone()),
      None => groups.push(TopicGroup { topic: topic.to_string(), items: vec![(*s).clone()] }),
    }
  }

  CoverageReport {
    class_id: doc.class_id.clone(),
    total: syllabus.len(),
    scheduled: scheduled.len(),
    unscheduled_count: unscheduled.len(),
    groups,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Lesson, Term, Week};

  fn objective(id: &str, topic: &str) -> SyllabusObjective {
    SyllabusObjective { id: id.into(), section: String::new(), topic: topic.into(), text: format!("objective {id}") }
  }

  fn doc_with(ids: &[&str]) -> PlanDocument {
    let lesson = Lesson { syllabus_ids: ids.iter().map(|s| s.to_string()).collect(), ..Lesson::default() };
    PlanDocument {
      class_id: "11AI_SL".into(),
      terms: vec![Term { weeks: vec![Week { lessons: vec![lesson], ..Week::default() }], ..Term::default() }],
      ..PlanDocument::default()
    }
  }

  #[test]
  fn uncovered_is_syllabus_minus_scheduled() {
    let all = vec![objective("A.1", "Number"), objective("A.2", "Number")];
    let report = coverage_report(&doc_with(&["A.1"]), &all, "");
    assert_eq!(report.total, 2);
    assert_eq!(report.scheduled, 1);
    assert_eq!(report.unscheduled_count, 1);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].items[0].id, "A.2");
  }

  #[test]
  fn groups_follow_first_appearance_and_blank_topics_fall_back() {
    let all = vec![
      objective("C.1", "Calculus"),
      objective("A.1", "Number"),
      objective("X.1", " "),
      objective("C.2", "Calculus"),
    ];
    let report = coverage_report(&doc_with(&[]), &all, "");
    let topics: Vec<_> = report.groups.iter().map(|g| g.topic.as_str()).collect();
    assert_eq!(topics, ["Calculus", "Number", "Other"]);
    assert_eq!(report.groups[0].items.len(), 2);
  }

  #[test]
  fn query_filters_list_but_not_totals() {
    let all = vec![objective("A.1", "Number"), objective("C.1", "Calculus")];
    let report = coverage_report(&doc_with(&["GONE"]), &all, "calc");
    assert_eq!(report.total, 2);
    assert_eq!(report.scheduled, 1);
    assert_eq!(report.unscheduled_count, 1);
    assert_eq!(report.groups[0].topic, "Calculus");
  }
}
