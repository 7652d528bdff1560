//! Application state: catalog, document store, coach, and live sessions.
//!
//! This module owns:
//!   - the read-only catalog (JSON file or the built-in course)
//!   - the document store (memory, optionally mirrored to a data directory)
//!   - one `GameSession` per student, opened lazily on first access and
//!     evicted once idle (progress is already in the store, so it reopens)
//!   - the coach used for assistance and reports (OpenAI or local)

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use crate::assist::Coach;
use crate::catalog::{Catalog, CatalogError};
use crate::config::{load_game_config_from_env, GameConfig};
use crate::seeds::seed_problem_bank;
use crate::session::{GameSession, SessionSettings};
use crate::store::{DocumentStore, StoreError};
use crate::util::now_ms;

pub type SharedSession = Arc<Mutex<GameSession<DocumentStore>>>;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Bounds on the live-session map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionLimits {
    /// Soft cap: sessions held by an in-flight request are never dropped.
    pub max_live: usize,
    pub idle_secs: u64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self { max_live: 10_000, idle_secs: 30 * 60 }
    }
}

struct LiveSession {
    session: SharedSession,
    last_seen: AtomicU64,
}

impl LiveSession {
    fn touch(&self, now: u64) -> SharedSession {
        self.last_seen.store(now, Ordering::Relaxed);
        Arc::clone(&self.session)
    }

    fn last_seen(&self) -> u64 {
        self.last_seen.load(Ordering::Relaxed)
    }

    fn in_use(&self) -> bool {
        Arc::strong_count(&self.session) > 1
    }
}

pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub store: Arc<DocumentStore>,
    sessions: RwLock<HashMap<String, LiveSession>>,
    pub coach: Coach,
    pub settings: SessionSettings,
    limits: SessionLimits,
}

impl AppState {
    /// Build state from env: load config, load and validate the catalog, open the store, init the coach.
    /// An invalid catalog is fatal.
    #[instrument(level = "info", skip_all)]
    pub async fn new() -> Result<Self, StartupError> {
        let cfg: GameConfig = load_game_config_from_env().unwrap_or_default();

        let catalog = match cfg.game.catalog_path() {
            Some(path) => {
                info!(target: "visuequation_backend", path = %path.display(), "Loading catalog from file");
                Catalog::from_file(&path)?
            }
            None => {
                info!(target: "visuequation_backend", "No catalog path configured; using the built-in course");
                Catalog::new(seed_problem_bank())?
            }
        };

        let store = match cfg.game.data_dir() {
            Some(dir) => DocumentStore::open(dir).await?,
            None => {
                info!(target: "visuequation_backend", "No data dir configured; progress lives in memory only");
                DocumentStore::in_memory()
            }
        };

        let coach = Coach::from_env(cfg.prompts.clone());
        match &coach {
            Coach::Remote { client, .. } => {
                info!(target: "visuequation_backend", base_url = %client.base_url, fast_model = %client.fast_model, strong_model = %client.strong_model, "OpenAI enabled.");
            }
            Coach::Local(_) => {
                info!(target: "visuequation_backend", "OpenAI disabled (no OPENAI_API_KEY). Using the local coach.");
            }
        }

        let settings = cfg.game.session_settings();
        info!(target: "visuequation_backend", scoring = ?settings.scoring, progression = ?settings.progression, "Game rules");
        let limits = cfg.game.session_limits();
        info!(target: "visuequation_backend", max_live = limits.max_live, idle_secs = limits.idle_secs, "Session limits");
        Ok(Self::from_parts(Arc::new(catalog), Arc::new(store), coach, settings).with_limits(limits))
    }

    pub fn from_parts(catalog: Arc<Catalog>, store: Arc<DocumentStore>, coach: Coach, settings: SessionSettings) -> Self {
        Self {
            catalog,
            store,
            sessions: RwLock::new(HashMap::new()),
            coach,
            settings,
            limits: SessionLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = SessionLimits { max_live: limits.max_live.max(1), ..limits };
        self
    }

    /// The student's session, restoring it from the store on first access.
    #[instrument(level = "debug", skip(self))]
    pub async fn session(&self, student_id: &str) -> SharedSession {
        if let Some(s) = { self.sessions.read().await.get(student_id).map(|l| l.touch(now_ms())) } {
            return s;
        }
        let opened = GameSession::open(
            student_id,
            Arc::clone(&self.catalog),
            Arc::clone(&self.store),
            self.settings.clone(),
        )
        .await;
        let now = now_ms();
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(student_id) && sessions.len() >= self.limits.max_live {
            let evicted = evict(&mut sessions, now, self.limits);
            info!(target: "session", evicted, live_sessions = sessions.len(), "Evicted idle sessions");
        }
        let s = sessions
            .entry(student_id.to_string())
            .or_insert_with(|| LiveSession { session: Arc::new(Mutex::new(opened)), last_seen: AtomicU64::new(now) })
            .touch(now);
        debug!(target: "session", live_sessions = sessions.len(), "Session ready");
        s
    }
}

/// Drop sessions idle past the limit, then, if the map is still full, the
/// least recently seen ones. Sessions a request is holding are kept.
fn evict(sessions: &mut HashMap<String, LiveSession>, now: u64, limits: SessionLimits) -> usize {
    let before = sessions.len();
    let idle_ms = limits.idle_secs.saturating_mul(1000);
    sessions.retain(|_, l| l.in_use() || now.saturating_sub(l.last_seen()) < idle_ms);

    if sessions.len() >= limits.max_live {
        let mut idle: Vec<(u64, String)> = sessions
            .iter()
            .filter(|(_, l)| !l.in_use())
            .map(|(id, l)| (l.last_seen(), id.clone()))
            .collect();
        idle.sort();
        let excess = sessions.len() + 1 - limits.max_live;
        for (_, id) in idle.into_iter().take(excess) {
            sessions.remove(&id);
        }
    }
    before - sessions.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assist::LocalCoach;

    fn state() -> AppState {
        AppState::from_parts(
            Arc::new(Catalog::new(seed_problem_bank()).unwrap()),
            Arc::new(DocumentStore::in_memory()),
            Coach::Local(LocalCoach),
            SessionSettings::default(),
        )
    }

    #[tokio::test]
    async fn sessions_are_opened_once_per_student() {
        let st = state();
        let a = st.session("kid").await;
        let b = st.session("kid").await;
        assert!(Arc::ptr_eq(&a, &b));
        let other = st.session("other").await;
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(a.lock().await.progress().current_problem_id, "1.1");
    }

    fn capped(max_live: usize) -> AppState {
        state().with_limits(SessionLimits { max_live, idle_secs: 3600 })
    }

    #[tokio::test]
    async fn full_map_drops_the_least_recent_student_and_reopens_from_the_store() {
        let st = capped(2);
        {
            let a = st.session("a").await;
            let mut s = a.lock().await;
            let values = serde_json::from_value(serde_json::json!({ "star": 3, "circle": 5 })).unwrap();
            assert!(s.submit(&values).await.unwrap().value.correct);
        }
        drop(st.session("b").await);
        drop(st.session("c").await);

        let live = st.sessions.read().await;
        assert_eq!(live.len(), 2);
        assert!(!live.contains_key("a"));
        drop(live);

        let back = st.session("a").await;
        assert_eq!(back.lock().await.progress().current_problem_id, "1.2");
    }

    #[tokio::test]
    async fn sessions_in_use_are_never_evicted() {
        let st = capped(1);
        let a = st.session("a").await;
        let _b = st.session("b").await;
        assert!(Arc::ptr_eq(&a, &st.session("a").await));
        assert_eq!(st.sessions.read().await.len(), 2);
    }

    #[tokio::test]
    async fn idle_sessions_go_first() {
        let st = state().with_limits(SessionLimits { max_live: 2, idle_secs: 0 });
        drop(st.session("a").await);
        drop(st.session("b").await);
        drop(st.session("c").await);
        let live = st.sessions.read().await;
        assert_eq!(live.len(), 1);
        assert!(live.contains_key("c"));
    }
}
