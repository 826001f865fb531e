//! Registry of live interactive sessions, keyed by affordance id.
//!
//! The transport collaborator delivers interaction events by affordance id;
//! the engine looks the session up here and advances its state machine.
//! Removing an entry releases everything the session held.

use crate::backfill::BackfillSession;
use crate::incident::IncidentDetail;
use crate::suggest::SuggestionPrompt;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use warden_core::AffordanceId;

/// A live interactive session.
#[derive(Debug)]
pub enum SessionEntry {
    /// Missing-argument collection
    Backfill(BackfillSession),
    /// Command-suggestion confirm prompt
    Suggestion(SuggestionPrompt),
    /// Incident detail view; not owner-restricted
    IncidentDetail(IncidentDetail),
}

/// Process-wide session registry.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: DashMap<AffordanceId, Arc<Mutex<SessionEntry>>>,
}

impl SessionRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its affordance id.
    pub fn insert(&self, id: AffordanceId, entry: SessionEntry) {
        self.entries.insert(id, Arc::new(Mutex::new(entry)));
    }

    /// Fetch a live session.
    #[must_use]
    pub fn get(&self, id: AffordanceId) -> Option<Arc<Mutex<SessionEntry>>> {
        self.entries.get(&id).map(|e| e.clone())
    }

    /// Remove a session, releasing its state.
    pub fn remove(&self, id: AffordanceId) -> Option<Arc<Mutex<SessionEntry>>> {
        self.entries.remove(&id).map(|(_, entry)| entry)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
