//! Persistence ports and the document-store adapter.
//!
//! Two capability traits keep the write path and the analytics path apart:
//! - `GameRepository`: what the session controller needs (record attempts,
//!   level changes, and the per-student progress record).
//! - `AnalyticsRepository`: strictly read-only attempt queries for the
//!   assistance/reporting path.
//!
//! `DocumentStore` implements both. It keeps everything in memory and, when a
//! data directory is configured, mirrors attempts to `attempts.jsonl` (append
//! only) and each progress record to `progress/<student>.json`.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::domain::SolutionAttempt;
use crate::session::ProgressState;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("store IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("store serialization error: {0}")]
  Json(#[from] serde_json::Error),
}

/// Block + level coordinates (level ids are only unique within a block).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelKey {
  pub block_id: u32,
  pub level_id: u32,
}

pub trait GameRepository: Send + Sync + 'static {
  fn save_attempt(&self, attempt: &SolutionAttempt) -> impl Future<Output = Result<(), StoreError>> + Send;

  fn update_level_state(&self, student_id: &str, level: LevelKey) -> impl Future<Output = Result<(), StoreError>> + Send;

  fn save_progress(&self, student_id: &str, progress: &ProgressState) -> impl Future<Output = Result<(), StoreError>> + Send;

  fn load_progress(&self, student_id: &str) -> impl Future<Output = Result<Option<ProgressState>, StoreError>> + Send;
}

pub trait AnalyticsRepository: Send + Sync + 'static {
  /// Attempts of one student within one level, oldest first.
  fn get_attempts_for_analysis(
    &self,
    student_id: &str,
    level: LevelKey,
  ) -> impl Future<Output = Result<Vec<SolutionAttempt>, StoreError>> + Send;
}

#[derive(Default)]
pub struct DocumentStore {
  attempts: RwLock<Vec<SolutionAttempt>>,
  progress: RwLock<HashMap<String, ProgressState>>,
  levels: RwLock<HashMap<String, LevelKey>>,
  data_dir: Option<PathBuf>,
}

const ATTEMPTS_FILE: &str = "attempts.jsonl";
const PROGRESS_DIR: &str = "progress";

impl DocumentStore {
  pub fn in_memory() -> Self {
    Self::default()
  }

  /// Open (or create) a data directory and load what it already holds.
  /// Malformed attempt lines are skipped with a warning.
  #[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
  pub async fn open(dir: PathBuf) -> Result<Self, StoreError> {
    tokio::fs::create_dir_all(dir.join(PROGRESS_DIR)).await?;

    let mut attempts = Vec::new();
    match tokio::fs::read_to_string(dir.join(ATTEMPTS_FILE)).await {
      Ok(content) => {
        for (n, line) in content.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
          match serde_json::from_str::<SolutionAttempt>(line) {
            Ok(a) => attempts.push(a),
            Err(e) => warn!(target: "store", line = n + 1, error = %e, "Skipping malformed attempt line"),
          }
        }
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => return Err(e.into()),
    }

    let mut progress = HashMap::new();
    let mut entries = tokio::fs::read_dir(dir.join(PROGRESS_DIR)).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().and_then(|e| e.to_str()) != Some("json") {
        continue;
      }
      let raw = tokio::fs::read_to_string(&path).await?;
      match serde_json::from_str::<StoredProgress>(&raw) {
        Ok(doc) => {
          progress.insert(doc.student_id, doc.progress);
        }
        Err(e) => warn!(target: "store", path = %path.display(), error = %e, "Skipping unreadable progress record"),
      }
    }

    info!(target: "store", attempts = attempts.len(), students = progress.len(), "Document store opened");
    Ok(Self {
      attempts: RwLock::new(attempts),
      progress: RwLock::new(progress),
      levels: RwLock::new(HashMap::new()),
      data_dir: Some(dir),
    })
  }

  async fn append_attempt_line(dir: &Path, attempt: &SolutionAttempt) -> Result<(), StoreError> {
    let mut line = serde_json::to_vec(attempt)?;
    line.push(b'\n');
    let mut f = tokio::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(dir.join(ATTEMPTS_FILE))
      .await?;
    f.write_all(&line).await?;
    f.flush().await?;
    Ok(())
  }
}

/// On-disk progress document; the student id travels with the record so file
/// names can be sanitized freely.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProgress {
  student_id: String,
  progress: ProgressState,
}

fn file_stem(student_id: &str) -> String {
  student_id
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
    .collect()
}

impl GameRepository for DocumentStore {
  #[instrument(level = "debug", skip_all, fields(problem_id = %attempt.problem_id, student_id = %attempt.student_id))]
  async fn save_attempt(&self, attempt: &SolutionAttempt) -> Result<(), StoreError> {
    if let Some(dir) = &self.data_dir {
      Self::append_attempt_line(dir, attempt).await?;
    }
    self.attempts.write().await.push(attempt.clone());
    debug!(target: "store", consistent = attempt.is_consistent, "Attempt recorded");
    Ok(())
  }

  async fn update_level_state(&self, student_id: &str, level: LevelKey) -> Result<(), StoreError> {
    self.levels.write().await.insert(student_id.to_string(), level);
    info!(target: "store", %student_id, block_id = level.block_id, level_id = level.level_id, "Level state updated");
    Ok(())
  }

  async fn save_progress(&self, student_id: &str, progress: &ProgressState) -> Result<(), StoreError> {
    if let Some(dir) = &self.data_dir {
      let doc = StoredProgress { student_id: student_id.to_string(), progress: progress.clone() };
      let bytes = serde_json::to_vec_pretty(&doc)?;
      let path = dir.join(PROGRESS_DIR).join(format!("{}.json", file_stem(student_id)));
      tokio::fs::write(path, bytes).await?;
    }
    self.progress.write().await.insert(student_id.to_string(), progress.clone());
    Ok(())
  }

  async fn load_progress(&self, student_id: &str) -> Result<Option<ProgressState>, StoreError> {
    Ok(self.progress.read().await.get(student_id).cloned())
  }
}

impl AnalyticsRepository for DocumentStore {
  async fn get_attempts_for_analysis(&self, student_id: &str, level: LevelKey) -> Result<Vec<SolutionAttempt>, StoreError> {
    let attempts = self.attempts.read().await;
    Ok(attempts
      .iter()
      .filter(|a| a.student_id == student_id && a.block_id == level.block_id && a.level_id == level.level_id)
      .cloned()
      .collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Values;
  use uuid::Uuid;

  fn attempt(student: &str, problem: &str, level_id: u32, consistent: bool) -> SolutionAttempt {
    SolutionAttempt {
      id: Uuid::new_v4(),
      problem_id: problem.into(),
      student_id: student.into(),
      block_id: 1,
      level_id,
      timestamp: 1,
      submitted_solution: Values::from([("star".to_string(), 3.0)]),
      is_consistent: consistent,
    }
  }

  fn progress() -> ProgressState {
    ProgressState {
      current_block_id: 1,
      current_level_id: 2,
      current_problem_id: "1.3".into(),
      score: 7,
      attempts: 2,
      hints_used: 1,
      history: vec![],
      problem_started_at: 42,
      course_complete: false,
    }
  }

  #[tokio::test]
  async fn analytics_filters_by_student_and_level() {
    let store = DocumentStore::in_memory();
    store.save_attempt(&attempt("s1", "1.1", 1, false)).await.unwrap();
    store.save_attempt(&attempt("s1", "1.3", 2, true)).await.unwrap();
    store.save_attempt(&attempt("s2", "1.1", 1, true)).await.unwrap();

    let got = store.get_attempts_for_analysis("s1", LevelKey { block_id: 1, level_id: 1 }).await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].problem_id, "1.1");
    assert!(!got[0].is_consistent);
  }

  #[tokio::test]
  async fn progress_round_trips_in_memory() {
    let store = DocumentStore::in_memory();
    assert!(store.load_progress("s1").await.unwrap().is_none());
    store.save_progress("s1", &progress()).await.unwrap();
    assert_eq!(store.load_progress("s1").await.unwrap(), Some(progress()));
  }

  #[tokio::test]
  async fn data_dir_survives_reopen() {
    let dir = std::env::temp_dir().join(format!("visuequation-store-{}", Uuid::new_v4()));
    {
      let store = DocumentStore::open(dir.clone()).await.unwrap();
      store.save_attempt(&attempt("kid/1", "1.1", 1, false)).await.unwrap();
      store.save_progress("kid/1", &progress()).await.unwrap();
    }
    let reopened = DocumentStore::open(dir.clone()).await.unwrap();
    assert_eq!(reopened.load_progress("kid/1").await.unwrap(), Some(progress()));
    let got = reopened
      .get_attempts_for_analysis("kid/1", LevelKey { block_id: 1, level_id: 1 })
      .await
      .unwrap();
    assert_eq!(got.len(), 1);
    let _ = std::fs::remove_dir_all(dir);
  }

  #[test]
  fn file_stems_are_sanitized() {
    assert_eq!(file_stem("../etc/passwd"), "___etc_passwd");
    assert_eq!(file_stem("student-1_a"), "student-1_a");
  }
}
