//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! Every command resolves the student's session, runs the controller method
//! under the session lock, and answers with the resulting session view.
//! Assistance and reports read a progress copy and never hold the lock while
//! the coach is thinking.

use thiserror::Error;
use tracing::{info, instrument};

use crate::assist::{self, AssistError, AssistReply, ReportReply};
use crate::catalog::{CatalogError, Position};
use crate::evaluation::RawValues;
use crate::protocol::{problem_view, CommandOut, SessionOut};
use crate::session::{Applied, GameSession, HintOutcome, Phase, SessionError, SubmitOutcome, Transition};
use crate::state::AppState;
use crate::store::DocumentStore;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("studentId must not be empty")]
  MissingStudent,
  #[error(transparent)]
  Session(#[from] SessionError),
  #[error(transparent)]
  Assist(#[from] AssistError),
}

impl ApiError {
  pub fn is_not_found(&self) -> bool {
    let catalog = match self {
      ApiError::Session(SessionError::Catalog(e)) | ApiError::Assist(AssistError::Catalog(e)) => e,
      _ => return false,
    };
    matches!(
      catalog,
      CatalogError::BlockNotFound(_) | CatalogError::LevelNotFound { .. } | CatalogError::ProblemNotFound { .. }
    )
  }
}

fn student(id: &str) -> Result<&str, ApiError> {
  let id = id.trim();
  if id.is_empty() { Err(ApiError::MissingStudent) } else { Ok(id) }
}

pub fn session_view(s: &GameSession<DocumentStore>) -> SessionOut {
  let problem = if s.phase() == Phase::CourseComplete {
    None
  } else {
    s.current_problem().ok().map(|p| {
      let on_checkpoint = p.checkpoint || s.on_block_checkpoint();
      problem_view(p, on_checkpoint)
    })
  };
  let snap = s.snapshot();
  SessionOut { student_id: snap.student_id, phase: snap.phase, progress: snap.progress, problem }
}

fn command<T>(s: &GameSession<DocumentStore>, applied: Applied<T>) -> CommandOut<T> {
  CommandOut { result: applied.value, warnings: applied.warnings, session: session_view(s) }
}

#[instrument(level = "info", skip(state))]
pub async fn get_session(state: &AppState, student_id: &str) -> Result<SessionOut, ApiError> {
  let id = student(student_id)?;
  let shared = state.session(id).await;
  let s = shared.lock().await;
  Ok(session_view(&s))
}

#[instrument(level = "info", skip(state, values), fields(values = values.len()))]
pub async fn submit_answer(state: &AppState, student_id: &str, values: &RawValues) -> Result<CommandOut<SubmitOutcome>, ApiError> {
  let id = student(student_id)?;
  let shared = state.session(id).await;
  let mut s = shared.lock().await;
  let applied = s.submit(values).await?;
  info!(target: "session", student_id = %id, correct = applied.value.correct, warnings = applied.warnings.len(), "Answer evaluated");
  Ok(command(&s, applied))
}

#[instrument(level = "info", skip(state))]
pub async fn request_hint(state: &AppState, student_id: &str) -> Result<CommandOut<HintOutcome>, ApiError> {
  let id = student(student_id)?;
  let shared = state.session(id).await;
  let mut s = shared.lock().await;
  let applied = s.request_hint().await?;
  Ok(command(&s, applied))
}

#[instrument(level = "info", skip(state))]
pub async fn advance(state: &AppState, student_id: &str) -> Result<CommandOut<Transition>, ApiError> {
  let id = student(student_id)?;
  let shared = state.session(id).await;
  let mut s = shared.lock().await;
  let applied = s.advance().await?;
  Ok(command(&s, applied))
}

#[instrument(level = "info", skip(state))]
pub async fn select(state: &AppState, student_id: &str, target: Position) -> Result<CommandOut<()>, ApiError> {
  let id = student(student_id)?;
  let shared = state.session(id).await;
  let mut s = shared.lock().await;
  let applied = s.select(target).await?;
  Ok(command(&s, applied))
}

#[instrument(level = "info", skip(state))]
pub async fn reset(state: &AppState, student_id: &str) -> Result<CommandOut<()>, ApiError> {
  let id = student(student_id)?;
  let shared = state.session(id).await;
  let mut s = shared.lock().await;
  let applied = s.reset().await;
  Ok(command(&s, applied))
}

#[instrument(level = "info", skip(state))]
pub async fn assist(state: &AppState, student_id: &str) -> Result<AssistReply, ApiError> {
  let id = student(student_id)?;
  let progress = { state.session(id).await.lock().await.progress().clone() };
  let reply = assist::struggle_advice(&state.catalog, state.store.as_ref(), &state.coach, id, &progress).await?;
  Ok(reply)
}

#[instrument(level = "info", skip(state))]
pub async fn report(state: &AppState, student_id: &str, student_name: Option<&str>) -> Result<ReportReply, ApiError> {
  let id = student(student_id)?;
  let name = student_name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or(id);
  let progress = { state.session(id).await.lock().await.progress().clone() };
  let reply = assist::progress_report(&state.catalog, state.store.as_ref(), &state.coach, id, name, &progress).await?;
  Ok(reply)
}
