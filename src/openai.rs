//! Minimal OpenAI client for our use-cases.
//!
//! We only call chat.completions and request a strict JSON object back.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key, and student data leaves the process only as
//! the aggregate numbers the prompts ask for.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{instrument, info, error};

use crate::assist::{StruggleAdvice, StruggleAdviceInput, StudentMetrics};
use crate::config::Prompts;
use crate::util::{fill_template, trunc_for_log};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
}

impl std::fmt::Debug for OpenAI {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OpenAI")
      .field("base_url", &self.base_url)
      .field("fast_model", &self.fast_model)
      .field("strong_model", &self.strong_model)
      .finish_non_exhaustive()
  }
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, fast_model, strong_model })
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
    max_tokens: u32,
  ) -> Result<T, String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = json_request(model, system, user, temperature, max_tokens);

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "visuequation-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      error!(target: "assist", %status, elapsed = ?start.elapsed(), "OpenAI call failed");
      return Err(format!("OpenAI HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Model response received");

    serde_json::from_str::<T>(&text).map_err(|e| format!("JSON parse error: {}", e))
  }

  // --- High-level helpers (domain-specialized) ---

  #[instrument(level = "info", skip(self, prompts, input),
               fields(attempts = input.attempts, pattern = %input.pattern, model = %self.fast_model))]
  pub async fn struggle_advice(
    &self,
    prompts: &Prompts,
    input: &StruggleAdviceInput,
  ) -> Result<StruggleAdvice, String> {
    let attempts = input.attempts.to_string();
    let time_spent = input.time_spent.to_string();
    let user = fill_template(
      &prompts.struggle_user_template,
      &[
        ("problem",    input.problem_description.as_str()),
        ("attempts",   attempts.as_str()),
        ("time_spent", time_spent.as_str()),
        ("hint_used",  if input.hint_used { "yes" } else { "no" }),
        ("pattern",    input.pattern.as_str()),
      ],
    );
    let advice: StruggleAdvice = self.chat_json(&self.fast_model, &prompts.struggle_system, &user, 0.4, ADVICE_MAX_TOKENS).await?;
    if advice.advice.trim().is_empty() {
      return Err("model returned empty advice".into());
    }
    Ok(advice)
  }

  #[instrument(level = "info", skip(self, prompts, metrics),
               fields(completed = metrics.challenges_completed, model = %self.strong_model))]
  pub async fn progress_report(
    &self,
    prompts: &Prompts,
    metrics: &StudentMetrics,
  ) -> Result<String, String> {
    #[derive(Deserialize)]
    struct Report { report: String }

    let numbers = [
      metrics.challenges_completed.to_string(),
      metrics.patience_score.to_string(),
      metrics.strategy_adaptation_score.to_string(),
      metrics.focus_score.to_string(),
    ];
    let strengths = list_or_none(&metrics.strengths);
    let struggles = list_or_none(&metrics.struggles);
    let user = fill_template(
      &prompts.report_user_template,
      &[
        ("student_name",              metrics.student_name.as_str()),
        ("challenges_completed",      numbers[0].as_str()),
        ("patience_score",            numbers[1].as_str()),
        ("strategy_adaptation_score", numbers[2].as_str()),
        ("focus_score",               numbers[3].as_str()),
        ("strengths",                 strengths.as_str()),
        ("struggles",                 struggles.as_str()),
      ],
    );
    let r: Report = self.chat_json(&self.strong_model, &prompts.report_system, &user, 0.5, REPORT_MAX_TOKENS).await?;
    Ok(r.report)
  }
}

fn list_or_none(items: &[String]) -> String {
  if items.is_empty() { "none yet".into() } else { items.join(", ") }
}

/// Advice is two or three sentences; a report is one paragraph.
const ADVICE_MAX_TOKENS: u32 = 300;
const REPORT_MAX_TOKENS: u32 = 600;

fn json_request(model: &str, system: &str, user: &str, temperature: f32, max_tokens: u32) -> ChatCompletionRequest {
  ChatCompletionRequest {
    model: model.to_string(),
    messages: vec![
      ChatMessageReq { role: "system".into(), content: system.into() },
      ChatMessageReq { role: "user".into(), content: user.into() },
    ],
    temperature,
    response_format: ResponseFormat { r#type: "json_object".into() },
    max_tokens,
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  response_format: ResponseFormat,
  max_tokens: u32,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn provider_error_message_is_extracted() {
    let body = r#"{"error":{"message":"Invalid API key","type":"auth"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Invalid API key"));
    assert!(extract_openai_error("<html>bad gateway</html>").is_none());
  }

  #[test]
  fn requests_ask_for_json_with_a_token_cap() {
    let body = serde_json::to_value(json_request("m", "sys", "usr", 0.4, ADVICE_MAX_TOKENS)).unwrap();
    assert_eq!(body["max_tokens"], 300);
    assert_eq!(body["response_format"]["type"], "json_object");
    assert_eq!(body["messages"][1]["content"], "usr");
  }

  #[test]
  fn empty_lists_read_naturally() {
    assert_eq!(list_or_none(&[]), "none yet");
    assert_eq!(list_or_none(&["a".into(), "b".into()]), "a, b");
  }
}
