//! Read-only JSON views the frontend renders: the student plan view (weak
//! references resolved, current week marked) and the editor view of a workspace.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{Lesson, PlanDocument, SyllabusObjective, TextbookReference};
use crate::plan::{find_week_for_date, TreePath, WeekPos};
use crate::reference::{ReferenceData, Resolved};
use crate::selection::ExpansionSnapshot;
use crate::sketch::{key_for, LessonRef};
use crate::workspace::Workspace;

#[derive(Debug, Serialize)]
pub struct PlanView {
  pub class_id: String,
  pub label: String,
  pub programme: Option<String>,
  pub level: Option<String>,
  pub years: Option<Vec<String>>,
  pub current_week: Option<WeekPos>,
  pub terms: Vec<TermView>,
}

#[derive(Debug, Serialize)]
pub struct TermView {
  pub term_id: String,
  pub label: String,
  pub weeks: Vec<WeekView>,
}

#[derive(Debug, Serialize)]
pub struct WeekView {
  pub week_id: String,
  pub label: String,
  pub start_date: Option<NaiveDate>,
  pub is_current: bool,
  pub lessons: Vec<LessonView>,
}

#[derive(Debug, Serialize)]
pub struct LessonView {
  pub lesson_id: String,
  pub ordinal: usize,
  pub title: String,
  pub syllabus: Vec<Resolved<SyllabusObjective>>,
  pub textbooks: Vec<Resolved<TextbookReference>>,
  /// Omitted when blank.
  pub homework: Option<String>,
  pub notes_latex: Option<String>,
  /// Local store key for this lesson's student notes and sketch.
  pub annotation_key: String,
}

fn non_blank(s: &Option<String>) -> Option<String> {
  s.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

fn display_label(label: &str, id: &str, fallback: String) -> String {
  if !label.trim().is_empty() {
    label.to_string()
  } else if !id.trim().is_empty() {
    id.to_string()
  } else {
    fallback
  }
}

fn lesson_view(refs: &ReferenceData, lesson: &Lesson, ordinal: usize, key: String) -> LessonView {
  LessonView {
    lesson_id: lesson.lesson_id.clone(),
    ordinal,
    title: display_label(&lesson.title, &lesson.lesson_id, format!("Lesson {}", ordinal)),
    syllabus: refs.resolve_objectives(&lesson.syllabus_ids),
    textbooks: refs.resolve_textbooks(&lesson.textbook_ids),
    homework: non_blank(&lesson.homework),
    notes_latex: non_blank(&lesson.notes_latex),
    annotation_key: key,
  }
}

/// Build the student view. `today` picks the highlighted week.
pub fn plan_view(doc: &PlanDocument, refs: &ReferenceData, today: NaiveDate) -> PlanView {
  let current_week = find_week_for_date(doc, today);
  let terms = doc
    .terms
    .iter()
    .enumerate()
    .map(|(t, term)| {
      let term_id = term.effective_id(t);
      let weeks = term
        .weeks
        .iter()
        .enumerate()
        .map(|(w, week)| {
          let week_id = week.effective_id(w);
          let lessons = week
            .lessons
            .iter()
            .enumerate()
            .map(|(l, lesson)| {
              let key = key_for(&doc.class_id, &term_id, &week_id, &LessonRef::new(&lesson.lesson_id, l + 1));
              lesson_view(refs, lesson, l + 1, key)
            })
            .collect();
          WeekView {
            week_id: week.week_id.clone(),
            label: display_label(&week.label, &week.week_id, format!("Week {}", w + 1)),
            start_date: week.start_date,
            is_current: current_week == Some(WeekPos { term_index: t, week_index: w }),
            lessons,
          }
        })
        .collect();
      TermView {
        term_id: term.term_id.clone(),
        label: display_label(&term.label, &term.term_id, format!("Term {}", t + 1)),
        weeks,
      }
    })
    .collect();

  PlanView {
    class_id: doc.class_id.clone(),
    label: display_label(&doc.label, &doc.class_id, "Plan".into()),
    programme: doc.programme.clone(),
    level: doc.level.clone(),
    years: doc.years.clone(),
    current_week,
    terms,
  }
}

#[derive(Debug, Serialize)]
pub struct EditorView<'a> {
  pub session_id: &'a str,
  pub document: &'a PlanDocument,
  pub selection: TreePath,
  pub expansion: ExpansionSnapshot,
  pub selected_lesson: Option<SelectedLesson<'a>>,
}

/// The lesson form: raw lesson plus its references resolved for the chips.
#[derive(Debug, Serialize)]
pub struct SelectedLesson<'a> {
  pub lesson: &'a Lesson,
  pub syllabus: Vec<Resolved<SyllabusObjective>>,
  pub textbooks: Vec<Resolved<TextbookReference>>,
}

pub fn editor_view<'a>(session_id: &'a str, ws: &'a Workspace, refs: &ReferenceData) -> EditorView<'a> {
  EditorView {
    session_id,
    document: &ws.document,
    selection: ws.selection(),
    expansion: ws.editor.expansion.snapshot(),
    selected_lesson: ws.selected_lesson().map(|lesson| SelectedLesson {
      lesson,
      syllabus: refs.resolve_objectives(&lesson.syllabus_ids),
      textbooks: refs.resolve_textbooks(&lesson.textbook_ids),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Term, Week};
  use crate::reference::tests::sample;

  fn doc() -> PlanDocument {
    let lesson = |id: &str, title: &str, homework: &str| Lesson {
      lesson_id: id.into(),
      title: title.into(),
      syllabus_ids: vec!["A.1".into(), "GONE".into()],
      homework: Some(homework.into()),
      ..Lesson::default()
    };
    PlanDocument {
      class_id: "12AA_SL".into(),
      terms: vec![Term {
        term_id: "T1".into(),
        weeks: vec![
          Week {
            week_id: "T1-W1".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 6),
            lessons: vec![lesson("L1", "Standard form", "  "), lesson("", "", "Ex 1A q1-5")],
            ..Week::default()
          },
          Week::default(),
        ],
        ..Term::default()
      }],
      ..PlanDocument::default()
    }
  }

  #[test]
  fn student_view_marks_current_week_and_missing_refs() {
    let view = plan_view(&doc(), &sample(), NaiveDate::from_ymd_opt(2025, 1, 8).unwrap());
    assert_eq!(view.label, "12AA_SL");
    assert_eq!(view.current_week, Some(WeekPos { term_index: 0, week_index: 0 }));
    let week = &view.terms[0].weeks[0];
    assert!(week.is_current);
    assert!(!view.terms[0].weeks[1].is_current);
    assert_eq!(view.terms[0].weeks[1].label, "Week 2");

    let first = &week.lessons[0];
    assert!(first.homework.is_none());
    assert!(matches!(&first.syllabus[1], Resolved::Missing { id } if id == "GONE"));
    assert_eq!(first.annotation_key, r#"["12AA_SL","T1","T1-W1","L1"]"#);

    let second = &week.lessons[1];
    assert_eq!(second.title, "Lesson 2");
    assert_eq!(second.homework.as_deref(), Some("Ex 1A q1-5"));
    assert_eq!(second.annotation_key, r#"["12AA_SL","T1","T1-W1",2]"#);
  }

  #[test]
  fn editor_view_resolves_the_selected_lesson() {
    let mut ws = Workspace::open(doc());
    let refs = sample();
    assert!(editor_view("s1", &ws, &refs).selected_lesson.is_none());

    ws.select(TreePath::lesson(0, 0, 0));
    let view = editor_view("s1", &ws, &refs);
    let sel = view.selected_lesson.unwrap();
    assert_eq!(sel.lesson.title, "Standard form");
    assert!(matches!(&sel.syllabus[0], Resolved::Found(o) if o.id == "A.1"));
    assert_eq!(sel.syllabus.len(), 2);
  }
}
