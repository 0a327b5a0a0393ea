//! Freehand sketch model: strokes captured from pointer events, stored as
//! SVG-style path records under a per-lesson key.
//!
//! Persisted form is a JSON array of `{ "color", "width", "d" }` where `d` is
//! `M x y L x y ...`. Coordinates are rounded to two decimals when captured,
//! so a serialize/deserialize round trip is exact.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SketchError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
  pub x: f64,
  pub y: f64,
}

/// Largest coordinate magnitude accepted, in canvas pixels.
pub const MAX_COORD: f64 = 1.0e7;

fn in_range(v: f64) -> bool {
  v.is_finite() && v.abs() <= MAX_COORD
}

impl Point {
  /// Capture a point, rounding both coordinates to two decimals. Non-finite or
  /// out-of-range coordinates are refused.
  pub fn captured(x: f64, y: f64) -> Option<Self> {
    (in_range(x) && in_range(y)).then(|| Self { x: round2(x), y: round2(y) })
  }
}

fn round2(v: f64) -> f64 {
  (v * 100.0).round() / 100.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolMode {
  Pen,
  Eraser,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tool {
  pub mode: ToolMode,
  pub color: String,
  pub width: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stroke {
  pub color: String,
  pub width_px: f64,
  pub points: Vec<Point>,
}

/// Start a stroke at `point`. The eraser paints in `background` over earlier strokes.
/// `None` when the point cannot be captured.
pub fn begin_stroke(point: Point, tool: &Tool, background: &str) -> Option<Stroke> {
  let first = Point::captured(point.x, point.y)?;
  let color = match tool.mode {
    ToolMode::Pen => tool.color.clone(),
    ToolMode::Eraser => background.to_string(),
  };
  Some(Stroke { color, width_px: tool.width, points: vec![first] })
}

/// Append a captured point; false (and nothing appended) when it is out of range.
pub fn append_point(stroke: &mut Stroke, point: Point) -> bool {
  match Point::captured(point.x, point.y) {
    Some(p) => {
      stroke.points.push(p);
      true
    }
    None => false,
  }
}

/// One stroke in its persisted vector form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokePath {
  pub color: String,
  pub width: f64,
  pub d: String,
}

pub fn to_paths(strokes: &[Stroke]) -> Vec<StrokePath> {
  strokes
    .iter()
    .map(|s| StrokePath { color: s.color.clone(), width: s.width_px, d: path_data(&s.points) })
    .collect()
}

pub fn from_paths(paths: Vec<StrokePath>) -> Result<Vec<Stroke>, SketchError> {
  paths
    .into_iter()
    .map(|r| Ok(Stroke { color: r.color, width_px: r.width, points: parse_path_data(&r.d)? }))
    .collect()
}

pub fn serialize(strokes: &[Stroke]) -> String {
  // Only strings and finite floats; serde_json only fails on non-finite numbers.
  serde_json::to_string(&to_paths(strokes)).unwrap_or_else(|_| String::from("[]"))
}

pub fn deserialize(raw: &str) -> Result<Vec<Stroke>, SketchError> {
  if raw.trim().is_empty() {
    return Ok(Vec::new());
  }
  let paths: Vec<StrokePath> = serde_json::from_str(raw).map_err(|e| SketchError::Json(e.to_string()))?;
  from_paths(paths)
}

fn path_data(points: &[Point]) -> String {
  let mut out = String::new();
  for (i, p) in points.iter().enumerate() {
    if i > 0 {
      out.push(' ');
    }
    out.push_str(if i == 0 { "M " } else { "L " });
    out.push_str(&format!("{} {}", p.x, p.y));
  }
  out
}

fn parse_path_data(d: &str) -> Result<Vec<Point>, SketchError> {
  let bad = || SketchError::Path(d.to_string());
  let mut tokens = d.split_whitespace();
  let mut points = Vec::new();
  while let Some(cmd) = tokens.next() {
    let expected = if points.is_empty() { "M" } else { "L" };
    if cmd != expected {
      return Err(bad());
    }
    let x: f64 = tokens.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let y: f64 = tokens.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    if !in_range(x) || !in_range(y) {
      return Err(bad());
    }
    points.push(Point { x, y });
  }
  if points.is_empty() {
    return Err(bad());
  }
  Ok(points)
}

/// How a lesson is addressed in a storage key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LessonRef {
  Id(String),
  /// 1-based position in its week, for lessons without an id.
  Ordinal(usize),
}

impl LessonRef {
  pub fn new(lesson_id: &str, ordinal: usize) -> Self {
    if lesson_id.trim().is_empty() { LessonRef::Ordinal(ordinal) } else { LessonRef::Id(lesson_id.to_string()) }
  }
}

/// Composite storage key for a lesson's notes and sketch: a compact JSON array
/// `[class, term, week, lesson]` where the lesson is its id (a string) or its
/// ordinal (a number), so no id can be mistaken for another component.
pub fn key_for(class_id: &str, term_id: &str, week_id: &str, lesson: &LessonRef) -> String {
  let lesson = match lesson {
    LessonRef::Id(id) => Value::from(id.as_str()),
    LessonRef::Ordinal(n) => Value::from(*n),
  };
  Value::Array(vec![class_id.into(), term_id.into(), week_id.into(), lesson]).to_string()
}

/// Strokes for one lesson plus the stroke currently under the pointer.
#[derive(Debug, Default)]
pub struct SketchPad {
  pub strokes: Vec<Stroke>,
  active: Option<Stroke>,
}

impl SketchPad {
  pub fn new(strokes: Vec<Stroke>) -> Self {
    Self { strokes, active: None }
  }

  pub fn is_drawing(&self) -> bool {
    self.active.is_some()
  }

  /// Pointer down. An unfinished stroke is committed first. False when the
  /// point is refused; the pad is then left as it was.
  pub fn pointer_down(&mut self, point: Point, tool: &Tool, background: &str) -> bool {
    let Some(stroke) = begin_stroke(point, tool, background) else { return false };
    self.pointer_up();
    self.active = Some(stroke);
    true
  }

  /// Pointer move; ignored when no stroke is active or the point is refused.
  pub fn pointer_move(&mut self, point: Point) -> bool {
    match self.active.as_mut() {
      Some(s) => append_point(s, point),
      None => false,
    }
  }

  /// The most recently committed stroke.
  pub fn last_stroke(&self) -> Option<&Stroke> {
    self.strokes.last()
  }

  /// Pointer up, cancel or leave. Returns true when a stroke was committed.
  pub fn pointer_up(&mut self) -> bool {
    match self.active.take() {
      Some(s) => {
        self.strokes.push(s);
        true
      }
      None => false,
    }
  }

  pub fn clear(&mut self) {
    self.strokes.clear();
    self.active = None;
  }
}
