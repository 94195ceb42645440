use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::limiter::clock::Clock;
use crate::models::resume::RankedResultSet;
use crate::models::user::UserIdentity;

struct CachedRun {
    results: RankedResultSet,
    touched_at: DateTime<Utc>,
}

/// Latest ranked results per session.
///
/// A session untouched for longer than `ttl` is gone: reads miss and the next write sweeps it.
pub struct ResultCache {
    sessions: RwLock<HashMap<UserIdentity, CachedRun>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    fn is_live(&self, run: &CachedRun, now: DateTime<Utc>) -> bool {
        now - run.touched_at < self.ttl
    }

    pub async fn get(&self, user: &UserIdentity) -> Option<RankedResultSet> {
        let now = self.clock.now();
        self.sessions
            .read()
            .await
            .get(user)
            .filter(|run| self.is_live(run, now))
            .map(|run| run.results.clone())
    }

    /// Replaces the session's results wholesale.
    pub async fn replace(&self, user: &UserIdentity, results: RankedResultSet) {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, run| self.is_live(run, now));
        if sessions.len() < before {
            debug!("Evicted {} expired result sets", before - sessions.len());
        }

        sessions.insert(
            user.clone(),
            CachedRun {
                results,
                touched_at: now,
            },
        );
    }

    /// Stores `next` only if the session still holds `expected` (same run, same revision).
    pub async fn compare_and_swap(
        &self,
        user: &UserIdentity,
        expected: &RankedResultSet,
        next: RankedResultSet,
    ) -> bool {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(user) {
            Some(run) if self.is_live(run, now) && run.results.same_version(expected) => {
                run.results = next;
                run.touched_at = now;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    async fn stored_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}
