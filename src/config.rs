//! Loading planner configuration from TOML, with environment overrides.
//!
//! See `PlannerConfig` for the expected schema. Every key is optional.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
  /// Class ids offered in the class picker.
  pub classes: Vec<String>,
  /// Frontend bundle served for every non-API path.
  pub static_dir: String,
  /// Directory holding `syllabus_objectives.json`, `textbook_references.json` and `plans/`.
  pub data_dir: String,
  /// Base URL with the same layout as `data_dir`. Takes precedence when set.
  pub data_url: Option<String>,
  /// Local key-value store file. In-memory when unset.
  pub store_path: Option<String>,
  pub store_quota_bytes: Option<usize>,
  /// Editor sessions untouched for this long are dropped.
  pub session_idle_secs: u64,
  pub sketch: SketchCfg,
  pub github: GithubCfg,
}

impl Default for PlannerConfig {
  fn default() -> Self {
    Self {
      classes: ["12AA_SL", "12AA_HL", "12AI_SL", "11AA_SL", "11AA_HL", "11AI_SL"]
        .into_iter()
        .map(String::from)
        .collect(),
      static_dir: "./static".into(),
      data_dir: "./data".into(),
      data_url: None,
      store_path: Some("./local_store.json".into()),
      store_quota_bytes: Some(5 * 1024 * 1024),
      session_idle_secs: 4 * 60 * 60,
      sketch: SketchCfg::default(),
      github: GithubCfg::default(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SketchCfg {
  /// Canvas background; eraser strokes are drawn in this colour.
  pub background: String,
  pub default_color: String,
  pub default_width: f64,
}

impl Default for SketchCfg {
  fn default() -> Self {
    Self { background: "#ffffff".into(), default_color: "#111111".into(), default_width: 2.0 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GithubCfg {
  pub api_base: String,
  /// Repository path of a plan file; `{class_id}` is substituted.
  pub path_template: String,
  /// Commit message; `{class_id}` is substituted.
  pub message_template: String,
  pub default_branch: String,
  pub timeout_secs: u64,
}

impl Default for GithubCfg {
  fn default() -> Self {
    Self {
      api_base: "https://api.github.com".into(),
      path_template: "data/plans/{class_id}.json".into(),
      message_template: "Update plan: {class_id}".into(),
      default_branch: "main".into(),
      timeout_secs: 20,
    }
  }
}

/// Parse a config document. Unknown keys are ignored.
pub fn parse_config(src: &str) -> Result<PlannerConfig, toml::de::Error> {
  toml::from_str::<PlannerConfig>(src)
}

/// Load from PLANNER_CONFIG_PATH (defaults on any IO/parse error), then apply
/// PLANNER_DATA_DIR, PLANNER_DATA_URL and PLANNER_STORE_PATH.
pub fn load_config_from_env() -> PlannerConfig {
  let mut cfg = match std::env::var("PLANNER_CONFIG_PATH") {
    Ok(path) => match std::fs::read_to_string(&path) {
      Ok(s) => match parse_config(&s) {
        Ok(cfg) => {
          info!(target: "planner_backend", %path, "Loaded planner config (TOML)");
          cfg
        }
        Err(e) => {
          error!(target: "planner_backend", %path, error = %e, "Failed to parse TOML config; using defaults");
          PlannerConfig::default()
        }
      },
      Err(e) => {
        error!(target: "planner_backend", %path, error = %e, "Failed to read TOML config file; using defaults");
        PlannerConfig::default()
      }
    },
    Err(_) => PlannerConfig::default(),
  };

  if let Ok(dir) = std::env::var("PLANNER_DATA_DIR") {
    cfg.data_dir = dir;
  }
  if let Ok(url) = std::env::var("PLANNER_DATA_URL") {
    cfg.data_url = Some(url).filter(|u| !u.trim().is_empty());
  }
  if let Ok(path) = std::env::var("PLANNER_STORE_PATH") {
    cfg.store_path = Some(path).filter(|p| !p.trim().is_empty());
  }
  cfg
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_config_is_all_defaults() {
    let cfg = parse_config("").unwrap();
    assert_eq!(cfg.classes.len(), 6);
    assert_eq!(cfg.github.api_base, "https://api.github.com");
    assert_eq!(cfg.github.path_template, "data/plans/{class_id}.json");
    assert_eq!(cfg.sketch.background, "#ffffff");
    assert_eq!(cfg.session_idle_secs, 14_400);
  }

  #[test]
  fn partial_tables_keep_remaining_defaults() {
    let cfg = parse_config(
      r##"
        classes = ["10MYP"]
        session_idle_secs = 600
        data_url = "https://school.github.io/planner/"

        [github]
        default_branch = "gh-pages"

        [sketch]
        background = "#fafafa"
      "##,
    )
    .unwrap();
    assert_eq!(cfg.classes, vec!["10MYP"]);
    assert_eq!(cfg.session_idle_secs, 600);
    assert_eq!(cfg.data_url.as_deref(), Some("https://school.github.io/planner/"));
    assert_eq!(cfg.github.default_branch, "gh-pages");
    assert_eq!(cfg.github.message_template, "Update plan: {class_id}");
    assert_eq!(cfg.sketch.background, "#fafafa");
    assert_eq!(cfg.sketch.default_width, 2.0);
  }

  #[test]
  fn wrong_types_are_errors() {
    assert!(parse_config("classes = 3").is_err());
  }
}
