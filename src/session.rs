//! Game Session Controller: one explicit state machine per student.
//!
//! The controller is the only writer of `ProgressState`. It exposes command
//! methods (`submit`, `request_hint`, `advance`, `select`, `reset`) plus a
//! read-only snapshot, and depends on nothing but the write-side persistence
//! port. Local state is decided and applied first; persistence runs after,
//! best effort, and its failures come back as warnings instead of errors.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::{Catalog, CatalogError, Position};
use crate::domain::{HistoryEntry, Problem, SolutionAttempt};
use crate::evaluation::{evaluate, normalize, RawValues};
use crate::progression::{is_unlocked, Next, ProgressionMode};
use crate::scoring::{Award, ScoringPolicy};
use crate::store::{GameRepository, LevelKey, StoreError};
use crate::util::now_ms;

/// Per-student progress aggregate. Serialized as one opaque record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
  pub current_block_id: u32,
  pub current_level_id: u32,
  pub current_problem_id: String,
  pub score: u32,
  /// Submissions on the current problem, the correct one included.
  pub attempts: u32,
  pub hints_used: u32,
  pub history: Vec<HistoryEntry>,
  /// When the current problem was first shown (ms since epoch).
  #[serde(default)] pub problem_started_at: u64,
  #[serde(default)] pub course_complete: bool,
}

impl ProgressState {
  pub fn initial(catalog: &Catalog) -> Self {
    let start = catalog.first_position();
    Self {
      current_block_id: start.block_id,
      current_level_id: start.level_id,
      current_problem_id: start.problem_id,
      score: 0,
      attempts: 0,
      hints_used: 0,
      history: Vec::new(),
      problem_started_at: now_ms(),
      course_complete: false,
    }
  }

  pub fn position(&self) -> Position {
    Position::new(self.current_block_id, self.current_level_id, self.current_problem_id.clone())
  }

  pub fn level_key(&self) -> LevelKey {
    LevelKey { block_id: self.current_block_id, level_id: self.current_level_id }
  }

  pub fn is_solved(&self, problem_id: &str) -> bool {
    self.history.iter().any(|h| h.correct && h.problem_id == problem_id)
  }

  fn move_to(&mut self, at: &Position) {
    self.current_block_id = at.block_id;
    self.current_level_id = at.level_id;
    self.current_problem_id = at.problem_id.clone();
    self.attempts = 0;
    self.hints_used = 0;
    self.problem_started_at = now_ms();
  }

  /// Drop an earlier entry for the same problem and append the new one, so the
  /// tail of `history` is always the most recent solve and the cumulative
  /// score stays the sum over distinct solved problems.
  fn record_solve(&mut self, entry: HistoryEntry) {
    if let Some(i) = self.history.iter().position(|h| h.problem_id == entry.problem_id) {
      let prev = self.history.remove(i);
      self.score = self.score.saturating_sub(prev.points);
    }
    self.score += entry.points;
    self.history.push(entry);
  }

  fn apply(&mut self, next: &Next) {
    match next.position() {
      Some(at) => {
        self.move_to(at);
        self.course_complete = false;
      }
      None => {
        // Leaving the final problem: counters close with it.
        self.attempts = 0;
        self.hints_used = 0;
        self.course_complete = true;
      }
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Loading,
  Active,
  LevelComplete,
  Checkpoint,
  BlockComplete,
  CourseComplete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
  NextProblem,
  LevelComplete,
  Checkpoint,
  BlockComplete,
  CourseComplete,
}

impl From<&Next> for Transition {
  fn from(n: &Next) -> Self {
    match n {
      Next::Problem(_) => Transition::NextProblem,
      Next::LevelComplete(_) => Transition::LevelComplete,
      Next::Checkpoint(_) => Transition::Checkpoint,
      Next::BlockComplete(_) => Transition::BlockComplete,
      Next::CourseComplete => Transition::CourseComplete,
    }
  }
}

impl From<Transition> for Phase {
  fn from(t: Transition) -> Self {
    match t {
      Transition::NextProblem => Phase::Active,
      Transition::LevelComplete => Phase::LevelComplete,
      Transition::Checkpoint => Phase::Checkpoint,
      Transition::BlockComplete => Phase::BlockComplete,
      Transition::CourseComplete => Phase::CourseComplete,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
  pub scoring: ScoringPolicy,
  pub progression: ProgressionMode,
  /// Consecutive wrong answers on one problem before assistance is offered.
  pub assistance_threshold: u32,
  pub persistence_timeout_ms: u64,
}

impl Default for SessionSettings {
  fn default() -> Self {
    Self {
      scoring: ScoringPolicy::Stars,
      progression: ProgressionMode::Linear,
      assistance_threshold: 3,
      persistence_timeout_ms: 3000,
    }
  }
}

#[derive(Debug, Error)]
pub enum SessionError {
  #[error(transparent)]
  Catalog(#[from] CatalogError),
  #[error("problem '{0}' is in a level that is still locked")]
  Locked(String),
  #[error("the course is complete; select a problem or reset to play again")]
  CourseComplete,
  #[error("problem '{0}' has not been solved yet")]
  NotSolved(String),
}

/// A command's result plus any non-fatal persistence warnings.
#[derive(Clone, Debug, Serialize)]
pub struct Applied<T> {
  pub value: T,
  pub warnings: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
  pub correct: bool,
  pub attempts: u32,
  pub award: Option<Award>,
  pub transition: Option<Transition>,
  pub offer_assistance: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HintOutcome {
  Hint { number: u32, text: String },
  Exhausted,
  NotOnCheckpoint,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
  pub student_id: String,
  pub phase: Phase,
  pub progress: ProgressState,
}

pub struct GameSession<R> {
  student_id: String,
  catalog: Arc<Catalog>,
  store: Arc<R>,
  settings: SessionSettings,
  progress: ProgressState,
  phase: Phase,
}

impl<R: GameRepository> GameSession<R> {
  pub fn new(student_id: impl Into<String>, catalog: Arc<Catalog>, store: Arc<R>, settings: SessionSettings) -> Self {
    let progress = ProgressState::initial(&catalog);
    Self { student_id: student_id.into(), catalog, store, settings, progress, phase: Phase::Loading }
  }

  /// Build and restore in one step.
  pub async fn open(student_id: impl Into<String>, catalog: Arc<Catalog>, store: Arc<R>, settings: SessionSettings) -> Self {
    let mut s = Self::new(student_id, catalog, store, settings);
    s.restore().await;
    s
  }

  /// Loading → Active. A missing, unreachable or stale record starts fresh.
  #[instrument(level = "info", skip(self), fields(student_id = %self.student_id))]
  pub async fn restore(&mut self) {
    let loaded = tokio::time::timeout(self.timeout(), self.store.load_progress(&self.student_id)).await;
    match loaded {
      Ok(Ok(Some(mut p))) => {
        if self.catalog.problem_at(&p.position()).is_ok() {
          debug!(target: "session", problem_id = %p.current_problem_id, "Progress restored");
          self.progress = p;
        } else if let Some(moved) = self.catalog.locate(&p.current_problem_id) {
          warn!(target: "session", problem_id = %p.current_problem_id, block_id = moved.block_id, level_id = moved.level_id, "Stored problem moved in catalog; following it");
          p.move_to(&moved);
          self.progress = p;
        } else {
          warn!(target: "session", problem_id = %p.current_problem_id, "Stored position no longer in catalog; starting over");
          self.progress = ProgressState::initial(&self.catalog);
        }
      }
      Ok(Ok(None)) => debug!(target: "session", "No stored progress; new student"),
      Ok(Err(e)) => error!(target: "session", error = %e, "Could not load progress; starting fresh"),
      Err(_) => error!(target: "session", "Loading progress timed out; starting fresh"),
    }
    self.phase = if self.progress.course_complete { Phase::CourseComplete } else { Phase::Active };
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn progress(&self) -> &ProgressState {
    &self.progress
  }

  pub fn snapshot(&self) -> SessionSnapshot {
    SessionSnapshot { student_id: self.student_id.clone(), phase: self.phase, progress: self.progress.clone() }
  }

  pub fn current_problem(&self) -> Result<&Problem, CatalogError> {
    self.catalog.problem_at(&self.progress.position())
  }

  /// Whether the current problem is its block's checkpoint.
  pub fn on_block_checkpoint(&self) -> bool {
    self.catalog
      .get_block(self.progress.current_block_id)
      .is_some_and(|b| b.is_checkpoint(&self.progress.current_problem_id))
  }

  #[instrument(level = "info", skip(self, raw), fields(student_id = %self.student_id, problem_id = %self.progress.current_problem_id))]
  pub async fn submit(&mut self, raw: &RawValues) -> Result<Applied<SubmitOutcome>, SessionError> {
    if self.phase == Phase::CourseComplete {
      return Err(SessionError::CourseComplete);
    }
    let catalog = Arc::clone(&self.catalog);
    let at = self.progress.position();
    let problem = catalog.problem_at(&at)?;

    let submitted = normalize(raw);
    let correct = evaluate(&problem.solution, &submitted);
    let attempt = SolutionAttempt {
      id: Uuid::new_v4(),
      problem_id: at.problem_id.clone(),
      student_id: self.student_id.clone(),
      block_id: at.block_id,
      level_id: at.level_id,
      timestamp: now_ms(),
      submitted_solution: submitted,
      is_consistent: correct,
    };

    let mut updated = self.progress.clone();
    updated.attempts += 1;
    let attempts = updated.attempts;

    let outcome = if correct {
      let award = self.settings.scoring.award(attempts, updated.hints_used);
      updated.record_solve(HistoryEntry {
        problem_id: at.problem_id.clone(),
        correct: true,
        hints: updated.hints_used,
        attempts,
        stars: award.stars,
        points: award.points,
      });
      let next = self.settings.progression.resolver().next(&catalog, &updated.history, &at)?;
      let transition = Transition::from(&next);
      updated.apply(&next);
      self.progress = updated;
      self.phase = transition.into();
      info!(target: "session", stars = u8::from(award.stars), points = award.points, ?transition, "Correct answer");
      SubmitOutcome { correct, attempts, award: Some(award), transition: Some(transition), offer_assistance: false }
    } else {
      self.progress = updated;
      self.phase = Phase::Active;
      let offer_assistance = attempts >= self.settings.assistance_threshold;
      debug!(target: "session", attempts, offer_assistance, "Incorrect answer");
      SubmitOutcome { correct, attempts, award: None, transition: None, offer_assistance }
    };

    let mut warnings = Vec::new();
    let timeout = self.timeout();
    warnings.extend(best_effort(timeout, "your answer", self.store.save_attempt(&attempt)).await);
    if outcome.transition.is_some_and(|t| matches!(t, Transition::LevelComplete | Transition::BlockComplete)) {
      let key = self.progress.level_key();
      warnings.extend(best_effort(timeout, "your level", self.store.update_level_state(&self.student_id, key)).await);
    }
    warnings.extend(self.persist_progress().await);
    Ok(Applied { value: outcome, warnings })
  }

  #[instrument(level = "info", skip(self), fields(student_id = %self.student_id, problem_id = %self.progress.current_problem_id))]
  pub async fn request_hint(&mut self) -> Result<Applied<HintOutcome>, SessionError> {
    if self.phase == Phase::CourseComplete {
      return Err(SessionError::CourseComplete);
    }
    let catalog = Arc::clone(&self.catalog);
    let at = self.progress.position();
    let problem = catalog.problem_at(&at)?;
    if problem.checkpoint || self.on_block_checkpoint() {
      return Ok(Applied { value: HintOutcome::NotOnCheckpoint, warnings: vec![] });
    }

    let used = self.progress.hints_used as usize;
    let Some(text) = problem.hints.get(used) else {
      return Ok(Applied { value: HintOutcome::Exhausted, warnings: vec![] });
    };
    self.progress.hints_used += 1;
    self.phase = Phase::Active;
    let number = self.progress.hints_used;
    debug!(target: "session", number, "Hint revealed");
    let warnings = self.persist_progress().await.into_iter().collect();
    Ok(Applied { value: HintOutcome::Hint { number, text: text.clone() }, warnings })
  }

  /// Move on from a problem that is already solved (e.g. after navigating back to it).
  #[instrument(level = "info", skip(self), fields(student_id = %self.student_id, problem_id = %self.progress.current_problem_id))]
  pub async fn advance(&mut self) -> Result<Applied<Transition>, SessionError> {
    if self.phase == Phase::CourseComplete {
      return Err(SessionError::CourseComplete);
    }
    let at = self.progress.position();
    if !self.progress.is_solved(&at.problem_id) {
      return Err(SessionError::NotSolved(at.problem_id));
    }
    let next = self.settings.progression.resolver().next(&self.catalog, &self.progress.history, &at)?;
    let transition = Transition::from(&next);
    self.progress.apply(&next);
    self.phase = transition.into();

    let mut warnings = Vec::new();
    if next.crosses_level() {
      let key = self.progress.level_key();
      warnings.extend(best_effort(self.timeout(), "your level", self.store.update_level_state(&self.student_id, key)).await);
    }
    warnings.extend(self.persist_progress().await);
    Ok(Applied { value: transition, warnings })
  }

  /// Sidebar navigation. Only into unlocked units.
  #[instrument(level = "info", skip(self, target), fields(student_id = %self.student_id, problem_id = %target.problem_id))]
  pub async fn select(&mut self, target: Position) -> Result<Applied<()>, SessionError> {
    let same_place = target == self.progress.position();
    if !same_place && !is_unlocked(&self.catalog, &self.progress.history, &target)? {
      return Err(SessionError::Locked(target.problem_id));
    }
    self.catalog.problem_at(&target)?;
    self.progress.move_to(&target);
    self.progress.course_complete = false;
    self.phase = Phase::Active;
    debug!(target: "session", "Problem selected");
    let warnings = self.persist_progress().await.into_iter().collect();
    Ok(Applied { value: (), warnings })
  }

  /// Discard everything and start again from the first problem.
  #[instrument(level = "info", skip(self), fields(student_id = %self.student_id))]
  pub async fn reset(&mut self) -> Applied<()> {
    self.progress = ProgressState::initial(&self.catalog);
    self.phase = Phase::Active;
    info!(target: "session", "Progress reset");
    let warnings = self.persist_progress().await.into_iter().collect();
    Applied { value: (), warnings }
  }

  fn timeout(&self) -> Duration {
    Duration::from_millis(self.settings.persistence_timeout_ms)
  }

  async fn persist_progress(&self) -> Option<String> {
    best_effort(self.timeout(), "your progress", self.store.save_progress(&self.student_id, &self.progress)).await
  }
}

/// Run a persistence call with a deadline; a failure becomes a user-facing warning.
async fn best_effort<F>(timeout: Duration, what: &str, call: F) -> Option<String>
where
  F: Future<Output = Result<(), StoreError>>,
{
  match tokio::time::timeout(timeout, call).await {
    Ok(Ok(())) => None,
    Ok(Err(e)) => {
      error!(target: "store", error = %e, what, "Persistence failed");
      Some(format!("Could not save {what} right now. Your game continues; please try again later."))
    }
    Err(_) => {
      error!(target: "store", timeout_ms = timeout.as_millis() as u64, what, "Persistence timed out");
      Some(format!("Saving {what} is taking too long. Your game continues; please try again later."))
    }
  }
}
