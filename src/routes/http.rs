//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{State, Query}, http::StatusCode, Json, response::{IntoResponse, Response}};
use tracing::{info, instrument, warn};

use crate::assist::AssistError;
use crate::catalog::Position;
use crate::logic::{self, ApiError};
use crate::protocol::*;
use crate::session::SessionError;
use crate::state::AppState;

const RETRY_LATER: &str = "Assistance is not available right now. Please try again in a moment.";

impl ApiError {
  pub fn status(&self) -> StatusCode {
    if self.is_not_found() {
      return StatusCode::NOT_FOUND;
    }
    match self {
      ApiError::MissingStudent => StatusCode::BAD_REQUEST,
      ApiError::Session(SessionError::Locked(_) | SessionError::CourseComplete | SessionError::NotSolved(_)) => StatusCode::CONFLICT,
      ApiError::Session(SessionError::Catalog(_)) | ApiError::Assist(AssistError::Catalog(_)) => StatusCode::INTERNAL_SERVER_ERROR,
      ApiError::Assist(AssistError::Unavailable(_) | AssistError::Store(_)) => StatusCode::SERVICE_UNAVAILABLE,
    }
  }

  /// What the client is told. Collaborator details stay in the logs.
  pub fn public_message(&self) -> String {
    match self {
      ApiError::Assist(AssistError::Unavailable(_) | AssistError::Store(_)) => RETRY_LATER.to_string(),
      other => other.to_string(),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      warn!(target: "visuequation_backend", %status, error = %self, "Request failed");
    }
    (status, Json(ErrorOut { error: self.public_message() })).into_response()
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let coach = if state.coach.is_remote() { "openai" } else { "local" };
  Json(HealthOut { ok: true, coach })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_catalog(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(catalog_outline(&state.catalog))
}

#[instrument(level = "info", skip(state), fields(student_id = %q.student_id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Query(q): Query<StudentQuery>,
) -> Result<impl IntoResponse, ApiError> {
  let out = logic::get_session(&state, &q.student_id).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(student_id = %body.student_id, values = body.values.len()))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> Result<impl IntoResponse, ApiError> {
  let out = logic::submit_answer(&state, &body.student_id, &body.values).await?;
  info!(target: "session", student_id = %body.student_id, correct = out.result.correct, "HTTP answer evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(student_id = %body.student_id))]
pub async fn http_post_hint(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StudentIn>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::request_hint(&state, &body.student_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(student_id = %body.student_id))]
pub async fn http_post_advance(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StudentIn>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::advance(&state, &body.student_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(student_id = %body.student_id, problem_id = %body.problem_id))]
pub async fn http_post_select(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SelectIn>,
) -> Result<impl IntoResponse, ApiError> {
  let target = Position::new(body.block_id, body.level_id, body.problem_id);
  Ok(Json(logic::select(&state, &body.student_id, target).await?))
}

#[instrument(level = "info", skip(state, body), fields(student_id = %body.student_id))]
pub async fn http_post_reset(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StudentIn>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::reset(&state, &body.student_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(student_id = %body.student_id))]
pub async fn http_post_assist(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StudentIn>,
) -> Result<impl IntoResponse, ApiError> {
  let reply = logic::assist(&state, &body.student_id).await?;
  info!(target: "assist", student_id = %body.student_id, pattern = %reply.pattern, "HTTP assistance served");
  Ok(Json(reply))
}

#[instrument(level = "info", skip(state), fields(student_id = %q.student_id))]
pub async fn http_get_report(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::report(&state, &q.student_id, q.student_name.as_deref()).await?))
}
