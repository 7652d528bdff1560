//! Loading game configuration (rules + text-generation prompts) from TOML.
//!
//! See `GameConfig`, `GameSection` and `Prompts` for the expected schema.
//! Every field has a default, so an empty file is a valid configuration.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{info, error};

use crate::progression::ProgressionMode;
use crate::scoring::ScoringPolicy;
use crate::session::SessionSettings;
use crate::state::SessionLimits;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct GameConfig {
  #[serde(default)]
  pub game: GameSection,
  #[serde(default)]
  pub prompts: Prompts,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GameSection {
  pub scoring: ScoringPolicy,
  pub progression: ProgressionMode,
  pub assistance_threshold: u32,
  pub persistence_timeout_ms: u64,
  /// Problem bank JSON. Falls back to CATALOG_PATH, then to the built-in course.
  pub catalog_path: Option<PathBuf>,
  /// Where attempts and progress are mirrored. Falls back to DATA_DIR, then memory only.
  pub data_dir: Option<PathBuf>,
  pub max_live_sessions: usize,
  pub session_idle_secs: u64,
}

impl Default for GameSection {
  fn default() -> Self {
    let s = SessionSettings::default();
    let limits = SessionLimits::default();
    Self {
      scoring: s.scoring,
      progression: s.progression,
      assistance_threshold: s.assistance_threshold,
      persistence_timeout_ms: s.persistence_timeout_ms,
      catalog_path: None,
      data_dir: None,
      max_live_sessions: limits.max_live,
      session_idle_secs: limits.idle_secs,
    }
  }
}

impl GameSection {
  pub fn session_settings(&self) -> SessionSettings {
    SessionSettings {
      scoring: self.scoring,
      progression: self.progression,
      assistance_threshold: self.assistance_threshold.max(1),
      persistence_timeout_ms: self.persistence_timeout_ms,
    }
  }

  pub fn session_limits(&self) -> SessionLimits {
    SessionLimits { max_live: self.max_live_sessions, idle_secs: self.session_idle_secs }
  }

  pub fn catalog_path(&self) -> Option<PathBuf> {
    self.catalog_path.clone().or_else(|| std::env::var_os("CATALOG_PATH").map(PathBuf::from))
  }

  pub fn data_dir(&self) -> Option<PathBuf> {
    self.data_dir.clone().or_else(|| std::env::var_os("DATA_DIR").map(PathBuf::from))
  }
}

/// Prompts used by the OpenAI client. Placeholders in `{braces}` are filled
/// from the structured input; the model must answer with a JSON object.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub struggle_system: String,
  pub struggle_user_template: String,
  pub report_system: String,
  pub report_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      struggle_system: "You help children who are stuck on visual algebra puzzles, where shapes stand for unknown numbers. Be warm and concrete. Never give away the values. Respond ONLY with strict JSON.".into(),
      struggle_user_template: "Problem:\n{problem}\nAttempts: {attempts}\nTime spent: {time_spent} seconds\nHint used: {hint_used}\nObserved pattern: {pattern}\n\nReturn JSON {\"advice\": string, \"resourceLinks\": [string]}. Advice: 2-3 short sentences a child can act on.".into(),
      report_system: "You write short progress reports for parents about their child's problem-solving skills. Plain, encouraging, specific. Respond ONLY with strict JSON.".into(),
      report_user_template: "Student name: {student_name}\nChallenges completed: {challenges_completed}\nPatience score: {patience_score}\nStrategy adaptation score: {strategy_adaptation_score}\nFocus score: {focus_score}\nStrengths: {strengths}\nStruggles: {struggles}\n\nReturn JSON {\"report\": string}. One paragraph, highlight strengths first, then one area to practise.".into(),
    }
  }
}

/// Attempt to load `GameConfig` from GAME_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_game_config_from_env() -> Option<GameConfig> {
  let path = std::env::var("GAME_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<GameConfig>(&s) {
      Ok(cfg) => {
        info!(target: "visuequation_backend", %path, "Loaded game config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "visuequation_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "visuequation_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
