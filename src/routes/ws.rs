//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::catalog::Position;
use crate::logic::{self, ApiError};
use crate::protocol::{catalog_outline, ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "visuequation_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "visuequation_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "visuequation_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "visuequation_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "visuequation_backend", "WebSocket disconnected");
}

fn error_reply(e: ApiError) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.public_message() }
}

#[instrument(level = "info", skip(state))]
pub(crate) async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  let reply = match msg {
    ClientWsMessage::Ping => Ok(ServerWsMessage::Pong),

    ClientWsMessage::GetCatalog => Ok(ServerWsMessage::Catalog { catalog: catalog_outline(&state.catalog) }),

    ClientWsMessage::GetSession { student_id } =>
      logic::get_session(state, &student_id).await.map(|session| ServerWsMessage::Session { session }),

    ClientWsMessage::SubmitAnswer { student_id, values } => {
      let out = logic::submit_answer(state, &student_id, &values).await;
      if let Ok(o) = &out {
        info!(target: "session", %student_id, correct = o.result.correct, "WS submit_answer evaluated");
      }
      out.map(ServerWsMessage::AnswerResult)
    }

    ClientWsMessage::Hint { student_id } =>
      logic::request_hint(state, &student_id).await.map(ServerWsMessage::Hint),

    ClientWsMessage::Advance { student_id } =>
      logic::advance(state, &student_id).await.map(ServerWsMessage::Advanced),

    ClientWsMessage::Select { student_id, block_id, level_id, problem_id } => {
      let target = Position::new(block_id, level_id, problem_id);
      logic::select(state, &student_id, target).await.map(ServerWsMessage::Selected)
    }

    ClientWsMessage::Reset { student_id } =>
      logic::reset(state, &student_id).await.map(ServerWsMessage::Reset),

    ClientWsMessage::Assist { student_id } =>
      logic::assist(state, &student_id).await.map(|reply| ServerWsMessage::Assist { reply }),

    ClientWsMessage::Report { student_id, student_name } =>
      logic::report(state, &student_id, student_name.as_deref()).await.map(|reply| ServerWsMessage::Report { reply }),
  };
  reply.unwrap_or_else(error_reply)
}
