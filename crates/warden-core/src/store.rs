//! Persistent-store collaborator interface.
//!
//! The relational store itself is outside this subsystem; Warden consumes it
//! through these row-oriented traits. Logical tables:
//! `Restrictions(snowflake, reason, expires_at, scope)`,
//! `Incidents(id, command, user_id, guild_id, signature, full_trace,
//! origin_url, occurred_at, fixed)` and `IncidentWatches(incident_id,
//! user_id)`.

use crate::types::{Incident, IncidentId, NewIncident, Restriction, Snowflake};
use async_trait::async_trait;

/// Store-level failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("conflicting row already exists")]
    Conflict,
    /// The backing store failed
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Persistence for access restrictions.
#[async_trait]
pub trait RestrictionStore: Send + Sync {
    /// Load every persisted restriction; called once at startup to populate
    /// the gate's cache in full.
    async fn load_all(&self) -> Result<Vec<Restriction>, StoreError>;

    /// Insert a restriction row.
    ///
    /// # Errors
    /// `StoreError::Conflict` when a row for the snowflake already exists.
    async fn insert(&self, restriction: &Restriction) -> Result<(), StoreError>;

    /// Delete the row for a snowflake. Deleting an absent row is not an
    /// error, so interrupted removals can be retried safely.
    async fn delete(&self, snowflake: Snowflake) -> Result<(), StoreError>;
}

/// Persistence for incidents and watch registrations.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Find the unfixed incident matching `(command, signature)`, if any.
    async fn find_open(
        &self,
        command: &str,
        signature: &str,
    ) -> Result<Option<Incident>, StoreError>;

    /// Insert a new incident row and return it with its assigned id.
    async fn insert(&self, incident: NewIncident) -> Result<Incident, StoreError>;

    /// Fetch an incident by id.
    async fn get(&self, id: IncidentId) -> Result<Option<Incident>, StoreError>;

    /// Fetch every incident, ordered by id.
    async fn all(&self) -> Result<Vec<Incident>, StoreError>;

    /// Flip an incident's fixed flag to true.
    async fn set_fixed(&self, id: IncidentId) -> Result<(), StoreError>;

    /// Register a watch for a user on an incident.
    async fn add_watch(&self, id: IncidentId, user: Snowflake) -> Result<(), StoreError>;

    /// Remove a user's watch on an incident.
    async fn remove_watch(&self, id: IncidentId, user: Snowflake) -> Result<(), StoreError>;

    /// Whether a user currently watches an incident.
    async fn has_watch(&self, id: IncidentId, user: Snowflake) -> Result<bool, StoreError>;

    /// Every user watching an incident.
    async fn watchers(&self, id: IncidentId) -> Result<Vec<Snowflake>, StoreError>;

    /// Delete every watch row for an incident.
    async fn clear_watches(&self, id: IncidentId) -> Result<(), StoreError>;
}
