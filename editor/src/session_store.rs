//! Keyed store of in-flight edit sessions and the caller-facing surface.
//!
//! Each session sits behind its own mutex. Decisions take it with `try_lock`,
//! so a second request racing an in-progress one fails with
//! [`SessionError::Busy`] instead of queueing. Sessions for different owners
//! never share a lock beyond the short registry lookup.
//!
//! One session per owner: starting a new one cancels the owner's previous
//! session. Completed sessions stay as a result slot until [`get_result`]
//! takes the document; cancelled sessions are dropped immediately.
//!
//! [`get_result`]: SessionStore::get_result

use chrono::{DateTime, Utc};
use shared_types::{
    Decision, EditCandidate, ReviewItem, ReviewSummary, SessionId, SessionMode, SessionState,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::candidates::{generate_literal, map_suggestions, CandidateSet};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::segmenter::Segmenter;
use crate::session::{EditSession, SessionError, Strategy};
use crate::suggestions::{Instruction, SharedSuggestionProvider};

struct SessionSlot {
    session: EditSession,
    owner: String,
    last_activity: DateTime<Utc>,
    warned: bool,
    settled: watch::Sender<SessionState>,
}

impl SessionSlot {
    fn touch(&mut self) {
        self.last_activity = Utc::now();
        self.warned = false;
    }

    fn publish(&self) {
        self.settled.send_replace(self.session.state());
    }

    fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_activity
    }
}

/// Idle threshold as a chrono duration, saturating instead of wrapping
fn idle_limit(seconds: u64) -> chrono::Duration {
    i64::try_from(seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

#[derive(Clone)]
struct Entry {
    slot: Arc<Mutex<SessionSlot>>,
    settled: watch::Receiver<SessionState>,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<SessionId, Entry>,
    owners: HashMap<String, SessionId>,
}

impl Registry {
    fn remove(&mut self, id: &SessionId) -> Option<Entry> {
        self.owners.retain(|_, owned| *owned != *id);
        self.sessions.remove(id)
    }
}

/// Session idle past the warning threshold, reported once per idle stretch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleWarning {
    pub session_id: SessionId,
    pub owner: String,
    pub idle_seconds: i64,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    config: EditorConfig,
    segmenter: Segmenter,
    suggestions: SharedSuggestionProvider,
    registry: Mutex<Registry>,
}

impl SessionStore {
    pub fn new(config: EditorConfig, suggestions: SharedSuggestionProvider) -> Self {
        let segmenter = Segmenter::new(&config.abbreviations);
        Self {
            inner: Arc::new(SessionStoreInner {
                config,
                segmenter,
                suggestions,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.inner.config
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.inner.segmenter
    }

    /// Create a session for `owner` and start generating candidates.
    ///
    /// Literal sessions are ready (reviewing or completed) on return.
    /// Suggested sessions return in `Collecting`; the backend call runs in a
    /// spawned task, see [`SessionStore::wait_until_settled`].
    pub async fn start_session(
        &self,
        owner: &str,
        document: Document,
        mode: Option<SessionMode>,
        strategy: Strategy,
    ) -> Result<SessionId, SessionError> {
        let id = SessionId::new();
        let mode = mode.unwrap_or(self.inner.config.mode);
        let mut session = EditSession::new(id.clone(), document, mode);
        session.begin_collecting()?;

        let collect_with = match strategy {
            Strategy::Literal { rules, options } => {
                let options = options.unwrap_or_else(|| self.inner.config.match_options());
                let set = generate_literal(session.document(), &rules, options);
                session.install(set)?;
                None
            }
            Strategy::Suggested { instruction } => Some((instruction, session.document().text())),
        };

        let (settled_tx, settled_rx) = watch::channel(session.state());
        let entry = Entry {
            slot: Arc::new(Mutex::new(SessionSlot {
                session,
                owner: owner.to_string(),
                last_activity: Utc::now(),
                warned: false,
                settled: settled_tx,
            })),
            settled: settled_rx,
        };

        // Owner swap happens under one registry lock so concurrent starts for
        // the same owner leave exactly one session behind.
        let replaced = {
            let mut registry = self.inner.registry.lock().await;
            let previous = registry.owners.insert(owner.to_string(), id.clone());
            registry.sessions.insert(id.clone(), entry.clone());
            previous.and_then(|previous| {
                let removed = registry.sessions.remove(&previous)?;
                Some((previous, removed))
            })
        };

        if let Some((previous, removed)) = replaced {
            tracing::info!(owner, session_id = %previous, "Replacing owner's previous session");
            Self::cancel_entry(&previous, removed).await;
        }

        tracing::info!(session_id = %id, owner, ?mode, "Started edit session");

        if let Some((instruction, text)) = collect_with {
            self.spawn_collection(id.clone(), entry.slot, instruction, text);
        }

        Ok(id)
    }

    fn spawn_collection(
        &self,
        id: SessionId,
        slot: Arc<Mutex<SessionSlot>>,
        instruction: Instruction,
        text: String,
    ) {
        let store = self.clone();
        tokio::spawn(async move {
            let result = store.inner.suggestions.suggest(&text, &instruction).await;

            let mut slot = slot.lock().await;
            if slot.session.state() != SessionState::Collecting {
                tracing::debug!(
                    session_id = %id,
                    state = ?slot.session.state(),
                    "Discarding suggestions for a session no longer collecting"
                );
                return;
            }

            let set = match result {
                Ok(suggestions) => map_suggestions(
                    slot.session.document(),
                    &store.inner.segmenter,
                    &suggestions,
                    store.inner.config.suggestion_match_threshold,
                ),
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "Suggestions unavailable");
                    CandidateSet {
                        warnings: vec![e.to_string()],
                        ..Default::default()
                    }
                }
            };

            match slot.session.install(set) {
                Ok(state) => {
                    slot.touch();
                    slot.publish();
                    tracing::info!(session_id = %id, ?state, "Suggestion collection finished");
                }
                Err(e) => tracing::warn!(session_id = %id, error = %e, "Failed to install suggestions"),
            }
        });
    }

    async fn entry(&self, id: &SessionId) -> Result<Entry, SessionError> {
        self.inner
            .registry
            .lock()
            .await
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    pub async fn session_for_owner(&self, owner: &str) -> Option<SessionId> {
        self.inner.registry.lock().await.owners.get(owner).cloned()
    }

    pub async fn state(&self, id: &SessionId) -> Result<SessionState, SessionError> {
        Ok(*self.entry(id).await?.settled.borrow())
    }

    pub async fn get_current_candidate(
        &self,
        id: &SessionId,
    ) -> Result<Option<EditCandidate>, SessionError> {
        let entry = self.entry(id).await?;
        let slot = entry.slot.lock().await;
        Ok(slot.session.current().cloned())
    }

    pub async fn current_review(&self, id: &SessionId) -> Result<Option<ReviewItem>, SessionError> {
        let entry = self.entry(id).await?;
        let slot = entry.slot.lock().await;
        Ok(slot.session.review_item(&self.inner.segmenter))
    }

    pub async fn summary(&self, id: &SessionId) -> Result<ReviewSummary, SessionError> {
        let entry = self.entry(id).await?;
        let slot = entry.slot.lock().await;
        Ok(slot.session.summary())
    }

    /// Apply one decision. Fails with `Busy` if another request holds the
    /// session.
    pub async fn decide(
        &self,
        id: &SessionId,
        decision: Decision,
    ) -> Result<SessionState, SessionError> {
        let entry = self.entry(id).await?;
        let mut slot = entry
            .slot
            .try_lock()
            .map_err(|_| SessionError::Busy(id.clone()))?;

        let result = slot.session.decide(decision);
        slot.touch();
        slot.publish();
        let state = slot.session.state();
        drop(slot);

        if state == SessionState::Cancelled {
            self.inner.registry.lock().await.remove(id);
            tracing::info!(session_id = %id, "Session cancelled by decision");
        }
        result
    }

    /// Cancel and discard a session. A suggestion call still in flight is not
    /// interrupted; its result is dropped when it arrives.
    pub async fn cancel(&self, id: &SessionId) -> Result<(), SessionError> {
        let entry = self
            .inner
            .registry
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;

        Self::cancel_entry(id, entry).await;
        Ok(())
    }

    /// Cancel an entry already removed from the registry
    async fn cancel_entry(id: &SessionId, entry: Entry) {
        let mut slot = entry.slot.lock().await;
        slot.session.cancel();
        slot.publish();
        tracing::info!(session_id = %id, owner = %slot.owner, "Session cancelled");
    }

    /// Take the edited document of a completed session, removing it.
    pub async fn get_result(&self, id: &SessionId) -> Result<Document, SessionError> {
        let entry = self.entry(id).await?;
        let slot = entry
            .slot
            .try_lock()
            .map_err(|_| SessionError::Busy(id.clone()))?;
        if slot.session.state() != SessionState::Completed {
            return Err(SessionError::NotCompleted(id.clone()));
        }
        let document = slot.session.document().clone();
        let summary = slot.session.summary();
        drop(slot);

        self.inner.registry.lock().await.remove(id);
        tracing::info!(
            session_id = %id,
            applied = summary.applied,
            rejected = summary.rejected,
            stale = summary.stale,
            "Session result collected"
        );
        Ok(document)
    }

    /// Wait until the session leaves `Collecting`
    pub async fn wait_until_settled(&self, id: &SessionId) -> Result<SessionState, SessionError> {
        let mut settled = self.entry(id).await?.settled;
        let state = settled
            .wait_for(|state| *state != SessionState::Collecting)
            .await
            .map(|state| *state)
            .unwrap_or(SessionState::Cancelled);
        Ok(state)
    }

    /// Sessions idle past the warning threshold and not yet warned
    pub async fn sessions_needing_warning(&self, now: DateTime<Utc>) -> Vec<IdleWarning> {
        let threshold = idle_limit(self.inner.config.session_warning_seconds);
        let mut warnings = Vec::new();

        for (id, entry) in self.entries().await {
            let Ok(mut slot) = entry.slot.try_lock() else {
                continue;
            };
            let idle = slot.idle_for(now);
            if slot.warned || slot.session.state().is_terminal() || idle < threshold {
                continue;
            }
            slot.warned = true;
            warnings.push(IdleWarning {
                session_id: id,
                owner: slot.owner.clone(),
                idle_seconds: idle.num_seconds(),
            });
        }
        warnings
    }

    /// Cancel sessions idle past the timeout and drop uncollected results
    /// of the same age. Returns the removed ids.
    pub async fn expire_idle(&self, now: DateTime<Utc>) -> Vec<SessionId> {
        let timeout = idle_limit(self.inner.config.session_timeout_seconds);
        let mut expired = Vec::new();

        for (id, entry) in self.entries().await {
            let Ok(mut slot) = entry.slot.try_lock() else {
                continue;
            };
            if slot.idle_for(now) < timeout {
                continue;
            }
            slot.session.cancel();
            slot.publish();
            tracing::info!(session_id = %id, owner = %slot.owner, "Session expired after inactivity");
            expired.push(id);
        }

        if !expired.is_empty() {
            let mut registry = self.inner.registry.lock().await;
            for id in &expired {
                registry.remove(id);
            }
        }
        expired
    }

    async fn entries(&self) -> Vec<(SessionId, Entry)> {
        self.inner
            .registry
            .lock()
            .await
            .sessions
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.registry.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggestions::DisabledSuggestions;

    fn store() -> SessionStore {
        SessionStore::new(EditorConfig::default(), Arc::new(DisabledSuggestions))
    }

    #[tokio::test]
    async fn test_new_session_replaces_owners_previous_one() {
        let store = store();
        let doc = Document::from_plain_text("a a");
        let first = store
            .start_session("alice", doc.clone(), None, Strategy::literal("a", "b"))
            .await
            .unwrap();
        let second = store
            .start_session("alice", doc, None, Strategy::literal("a", "c"))
            .await
            .unwrap();

        assert!(matches!(store.state(&first).await, Err(SessionError::NotFound(_))));
        assert_eq!(store.state(&second).await.unwrap(), SessionState::Reviewing);
        assert_eq!(store.session_for_owner("alice").await, Some(second));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_for_one_owner_leave_one_session() {
        let store = store();
        for _ in 0..200 {
            let starts: Vec<_> = (0..2)
                .map(|_| {
                    let store = store.clone();
                    tokio::spawn(async move {
                        store
                            .start_session(
                                "alice",
                                Document::from_plain_text("a a"),
                                None,
                                Strategy::literal("a", "b"),
                            )
                            .await
                            .unwrap()
                    })
                })
                .collect();
            let mut ids = Vec::new();
            for start in starts {
                ids.push(start.await.unwrap());
            }

            assert_eq!(store.len().await, 1);
            let owned = store.session_for_owner("alice").await.unwrap();
            assert!(ids.contains(&owned));
            assert_eq!(store.state(&owned).await.unwrap(), SessionState::Reviewing);
        }
    }

    #[tokio::test]
    async fn test_out_of_range_timeouts_never_expire_early() {
        let config = EditorConfig {
            session_warning_seconds: u64::MAX - 1,
            session_timeout_seconds: u64::MAX,
            ..Default::default()
        };
        let store = SessionStore::new(config, Arc::new(DisabledSuggestions));
        store
            .start_session("erin", Document::from_plain_text("x"), None, Strategy::literal("x", "y"))
            .await
            .unwrap();

        let now = Utc::now();
        assert!(store.sessions_needing_warning(now).await.is_empty());
        assert!(store.expire_idle(now).await.is_empty());
        assert_eq!(store.len().await, 1);
        assert_eq!(idle_limit(u64::MAX), chrono::Duration::MAX);
        assert_eq!(idle_limit(420), chrono::Duration::seconds(420));
    }

    #[tokio::test]
    async fn test_decide_on_locked_session_is_busy() {
        let store = store();
        let id = store
            .start_session("bob", Document::from_plain_text("x"), None, Strategy::literal("x", "y"))
            .await
            .unwrap();

        let entry = store.entry(&id).await.unwrap();
        let _held = entry.slot.lock().await;
        let err = store.decide(&id, Decision::Accept).await.unwrap_err();
        assert!(matches!(err, SessionError::Busy(_)));
    }

    #[tokio::test]
    async fn test_warning_is_reported_once_per_idle_stretch() {
        let store = store();
        let id = store
            .start_session("carol", Document::from_plain_text("x"), None, Strategy::literal("x", "y"))
            .await
            .unwrap();

        let later = Utc::now() + chrono::Duration::seconds(301);
        let warnings = store.sessions_needing_warning(later).await;
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].session_id, id);
        assert!(store.sessions_needing_warning(later).await.is_empty());
        assert!(store.expire_idle(later).await.is_empty());
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let store = store();
        let id = store
            .start_session("dave", Document::from_plain_text("x"), None, Strategy::literal("x", "y"))
            .await
            .unwrap();

        let expired = store
            .expire_idle(Utc::now() + chrono::Duration::seconds(421))
            .await;
        assert_eq!(expired, vec![id.clone()]);
        assert!(store.is_empty().await);
        assert!(store.session_for_owner("dave").await.is_none());
    }
}
