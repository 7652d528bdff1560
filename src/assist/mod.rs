//! Assistance and reporting.
//!
//! This is the only consumer of the read-only analytics port and the only
//! place struggle patterns exist. The detector module is private; callers get
//! a plain label string, never the pattern type.

mod report;
mod struggle;

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::catalog::{Catalog, CatalogError};
use crate::config::Prompts;
use crate::openai::OpenAI;
use crate::session::ProgressState;
use crate::store::{AnalyticsRepository, LevelKey, StoreError};
use crate::util::now_ms;

pub use report::StudentMetrics;
use struggle::classify;

#[derive(Debug, Error)]
pub enum AssistError {
  #[error("assistance is unavailable right now: {0}")]
  Unavailable(String),
  #[error(transparent)]
  Catalog(#[from] CatalogError),
  #[error(transparent)]
  Store(#[from] StoreError),
}

/// What the text generator is told about a stuck student.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StruggleAdviceInput {
  pub problem_description: String,
  pub attempts: u32,
  /// Seconds since the problem was first shown.
  pub time_spent: u64,
  pub hint_used: bool,
  pub pattern: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StruggleAdvice {
  pub advice: String,
  #[serde(default)]
  pub resource_links: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistReply {
  pub pattern: String,
  pub advice: String,
  pub resource_links: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportReply {
  pub metrics: StudentMetrics,
  pub report: String,
}

/// Text-generation capability. Inputs are structured records; prompt wording
/// belongs to the implementation.
pub trait TextGenerator: Send + Sync {
  fn struggle_advice(&self, input: &StruggleAdviceInput) -> impl Future<Output = Result<StruggleAdvice, String>> + Send;

  fn progress_report(&self, metrics: &StudentMetrics) -> impl Future<Output = Result<String, String>> + Send;
}

/// Deterministic offline coach, used when no API key is configured.
#[derive(Clone, Debug, Default)]
pub struct LocalCoach;

impl TextGenerator for LocalCoach {
  async fn struggle_advice(&self, input: &StruggleAdviceInput) -> Result<StruggleAdvice, String> {
    let mut advice = match input.pattern.as_str() {
      "random_guessing" => "Slow down and pick one equation. Find the line with only one kind of shape and work that shape out first.".to_string(),
      "single_variable_fixation" => "You keep changing the same shape. Check whether your other shapes really fit every line, not just one.".to_string(),
      "inconsistent_reasoning" => "Put your numbers back into each line and add them up. The line that does not match tells you which shape to fix.".to_string(),
      _ => "Look for a line with only one kind of shape. Once you know one shape, use it in the other lines.".to_string(),
    };
    if !input.hint_used {
      advice.push_str(" A hint can show you where to start.");
    }
    Ok(StruggleAdvice { advice, resource_links: Vec::new() })
  }

  async fn progress_report(&self, m: &StudentMetrics) -> Result<String, String> {
    let mut out = format!(
      "{} has completed {} challenge{}. Focus {}%, patience {}%, strategy adaptation {}%.",
      m.student_name,
      m.challenges_completed,
      if m.challenges_completed == 1 { "" } else { "s" },
      m.focus_score,
      m.patience_score,
      m.strategy_adaptation_score,
    );
    if !m.strengths.is_empty() {
      out.push_str(&format!(" Strong at: {}.", m.strengths.join(", ")));
    }
    if !m.struggles.is_empty() {
      out.push_str(&format!(" Worth practising together: {}.", m.struggles.join(", ")));
    }
    Ok(out)
  }
}

/// Remote model when configured, local coach otherwise.
#[derive(Clone, Debug)]
pub enum Coach {
  Remote { client: OpenAI, prompts: Prompts },
  Local(LocalCoach),
}

impl Coach {
  pub fn from_env(prompts: Prompts) -> Self {
    match OpenAI::from_env() {
      Some(client) => Coach::Remote { client, prompts },
      None => Coach::Local(LocalCoach),
    }
  }

  pub fn is_remote(&self) -> bool {
    matches!(self, Coach::Remote { .. })
  }
}

impl TextGenerator for Coach {
  async fn struggle_advice(&self, input: &StruggleAdviceInput) -> Result<StruggleAdvice, String> {
    match self {
      Coach::Remote { client, prompts } => client.struggle_advice(prompts, input).await,
      Coach::Local(local) => local.struggle_advice(input).await,
    }
  }

  async fn progress_report(&self, metrics: &StudentMetrics) -> Result<String, String> {
    match self {
      Coach::Remote { client, prompts } => client.progress_report(prompts, metrics).await,
      Coach::Local(local) => local.progress_report(metrics).await,
    }
  }
}

/// Classify how the student is doing on the current problem and ask the
/// generator for advice. Never touches the session.
#[instrument(level = "info", skip_all, fields(%student_id, problem_id = %progress.current_problem_id))]
pub async fn struggle_advice<A, G>(
  catalog: &Catalog,
  analytics: &A,
  generator: &G,
  student_id: &str,
  progress: &ProgressState,
) -> Result<AssistReply, AssistError>
where
  A: AnalyticsRepository,
  G: TextGenerator,
{
  let problem = catalog.problem_at(&progress.position())?;
  let level = progress.level_key();
  let attempts: Vec<_> = analytics
    .get_attempts_for_analysis(student_id, level)
    .await?
    .into_iter()
    .filter(|a| a.problem_id == progress.current_problem_id)
    .collect();
  let pattern = classify(&attempts);

  let input = StruggleAdviceInput {
    problem_description: problem.describe(),
    attempts: progress.attempts,
    time_spent: now_ms().saturating_sub(progress.problem_started_at) / 1000,
    hint_used: progress.hints_used > 0,
    pattern: pattern.label().to_string(),
  };
  let advice = generator.struggle_advice(&input).await.map_err(|e| {
    warn!(target: "assist", error = %e, "Struggle advice failed");
    AssistError::Unavailable(e)
  })?;
  info!(target: "assist", pattern = pattern.label(), "Struggle advice ready");
  Ok(AssistReply { pattern: input.pattern, advice: advice.advice, resource_links: advice.resource_links })
}

/// Derive metrics from the student's history and recorded attempts, then ask
/// the generator for a parental report.
#[instrument(level = "info", skip_all, fields(%student_id))]
pub async fn progress_report<A, G>(
  catalog: &Catalog,
  analytics: &A,
  generator: &G,
  student_id: &str,
  student_name: &str,
  progress: &ProgressState,
) -> Result<ReportReply, AssistError>
where
  A: AnalyticsRepository,
  G: TextGenerator,
{
  let mut attempts = Vec::new();
  for block in catalog.blocks() {
    for level in &block.levels {
      let key = LevelKey { block_id: block.id, level_id: level.id };
      attempts.extend(analytics.get_attempts_for_analysis(student_id, key).await?);
    }
  }
  let metrics = report::compute_metrics(catalog, student_name, &progress.history, &attempts);
  let report = generator.progress_report(&metrics).await.map_err(|e| {
    warn!(target: "assist", error = %e, "Progress report failed");
    AssistError::Unavailable(e)
  })?;
  info!(target: "assist", completed = metrics.challenges_completed, "Progress report ready");
  Ok(ReportReply { metrics, report })
}
