//! Incident store logic and fix-notification fan-out.
//!
//! Unexpected failures become durable incidents, deduplicated on
//! `(command, signature)` while unfixed. Marking one fixed fans a notice out
//! to every watcher and clears the watch rows whether or not each notice
//! lands.

use crate::engine::RecoveryEngine;
use futures::future::join_all;
use std::sync::Arc;
use warden_core::{
    AffordanceId, Incident, IncidentFeed, IncidentId, IncidentStore, NewIncident, Snowflake,
    StoreError, Transport,
};

/// Button id revealing the stored trace.
pub(crate) const DETAILS_BUTTON: &str = "incident:details";
/// Button id toggling fix notification.
pub(crate) const WATCH_BUTTON: &str = "incident:watch";

/// Failures of the incident operations.
#[derive(Debug, thiserror::Error)]
pub enum IncidentError {
    /// No incident exists under the id
    #[error("no incident with id {id}")]
    NotFound {
        /// The id that was looked up
        id: IncidentId,
    },

    /// The persistent store failed
    #[error("incident store failure: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of toggling a watch registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchToggle {
    /// The user will now be notified when the incident is fixed
    Registered,
    /// The user's registration was removed
    Unregistered,
}

/// Outcome of a fix fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixReport {
    /// Watch registrations found
    pub watchers: usize,
    /// Notices actually delivered
    pub delivered: usize,
}

/// Durable incident recording and notification fan-out.
pub struct IncidentService {
    store: Arc<dyn IncidentStore>,
    feed: Arc<dyn IncidentFeed>,
    transport: Arc<dyn Transport>,
}

impl IncidentService {
    /// Create a service over a store, feed and transport.
    #[must_use]
    pub fn new(
        store: Arc<dyn IncidentStore>,
        feed: Arc<dyn IncidentFeed>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            store,
            feed,
            transport,
        }
    }

    /// Record a failure, reusing the open incident with the same
    /// `(command, signature)` when one exists. Only a genuinely new incident
    /// is published to the external feed.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn record_or_reuse(&self, new: NewIncident) -> Result<Incident, IncidentError> {
        if let Some(existing) = self
            .store
            .find_open(&new.command, &new.signature)
            .await?
        {
            tracing::debug!(
                "failure in `{}` matches incident #{}",
                new.command,
                existing.id
            );
            return Ok(existing);
        }

        let incident = self.store.insert(new).await?;
        tracing::info!(
            "recorded incident #{} for `{}`",
            incident.id,
            incident.command
        );
        // Feed delivery is fire-and-forget.
        if let Err(err) = self.feed.publish(&incident).await {
            tracing::warn!("incident feed delivery failed: {err}");
        }
        Ok(incident)
    }

    /// Mark an incident fixed and notify every watcher.
    ///
    /// Unreachable watchers are skipped; watch rows are cleared regardless of
    /// delivery outcomes.
    ///
    /// # Errors
    /// - `IncidentError::NotFound` when no such incident exists
    /// - `IncidentError::Store` on store failures
    pub async fn mark_fixed(&self, id: IncidentId) -> Result<FixReport, IncidentError> {
        let incident = self
            .store
            .get(id)
            .await?
            .ok_or(IncidentError::NotFound { id })?;

        self.store.set_fixed(id).await?;

        let watchers = self.store.watchers(id).await?;
        let notice = format!(
            "Hey! Error `#{id}` in the `{}` command has been fixed.",
            incident.command
        );
        let deliveries = watchers
            .iter()
            .map(|watcher| self.transport.direct_message(*watcher, &notice));
        let delivered = join_all(deliveries)
            .await
            .into_iter()
            .zip(&watchers)
            .filter(|(outcome, watcher)| {
                if let Err(err) = outcome {
                    tracing::warn!("could not notify watcher {watcher}: {err}");
                    return false;
                }
                true
            })
            .count();

        self.store.clear_watches(id).await?;
        tracing::info!("incident #{id} fixed, {delivered}/{} watchers notified", watchers.len());
        Ok(FixReport {
            watchers: watchers.len(),
            delivered,
        })
    }

    /// Register or unregister a user's interest in an incident's fix.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn toggle_watch(
        &self,
        id: IncidentId,
        user: Snowflake,
    ) -> Result<WatchToggle, IncidentError> {
        if self.store.has_watch(id, user).await? {
            self.store.remove_watch(id, user).await?;
            Ok(WatchToggle::Unregistered)
        } else {
            self.store.add_watch(id, user).await?;
            Ok(WatchToggle::Registered)
        }
    }

    /// Fetch one incident for the operator surface.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn get(&self, id: IncidentId) -> Result<Option<Incident>, IncidentError> {
        Ok(self.store.get(id).await?)
    }

    /// Fetch every incident, ordered by id, for the operator surface.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn list(&self) -> Result<Vec<Incident>, IncidentError> {
        Ok(self.store.all().await?)
    }

    /// The text behind the "show details" affordance.
    #[must_use]
    pub fn detail_text(incident: &Incident) -> String {
        let fixed = if incident.fixed { "is" } else { "is not" };
        format!(
            "Error #{}\n```\n{}\n```\nThe error was discovered at **{}** in the \
             **{}** command and **{fixed}** fixed.",
            incident.id,
            incident.full_trace,
            incident.occurred_at.format("%Y-%m-%d %H:%M UTC"),
            incident.command,
        )
    }
}

impl std::fmt::Debug for IncidentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentService").finish_non_exhaustive()
    }
}

/// Detail view attached to a "command failed" reply. Deliberately not
/// owner-restricted: anyone may inspect the trace or register a watch.
#[derive(Debug)]
pub struct IncidentDetail {
    /// Snapshot of the incident at reporting time
    pub incident: Incident,
}

impl RecoveryEngine {
    /// "Show details": reveal the stored trace privately to the requester.
    pub(crate) async fn incident_show_details(
        &self,
        detail: &IncidentDetail,
        affordance: AffordanceId,
        actor: Snowflake,
    ) {
        let text = IncidentService::detail_text(&detail.incident);
        if let Err(err) = self.transport.respond_private(affordance, actor, &text).await {
            tracing::warn!("could not deliver incident details: {err}");
        }
    }

    /// "Notify me when fixed": toggle the requester's watch registration.
    pub(crate) async fn incident_toggle_watch(
        &self,
        detail: &IncidentDetail,
        affordance: AffordanceId,
        actor: Snowflake,
    ) {
        let confirmation = match self.incidents.toggle_watch(detail.incident.id, actor).await {
            Ok(WatchToggle::Registered) => {
                "You will now be notified when this error is fixed.".to_string()
            }
            Ok(WatchToggle::Unregistered) => {
                "You will no longer be notified when this error is fixed.".to_string()
            }
            Err(err) => {
                tracing::warn!("watch toggle failed: {err}");
                return;
            }
        };
        if let Err(err) = self
            .transport
            .respond_private(affordance, actor, &confirmation)
            .await
        {
            tracing::warn!("could not confirm watch toggle: {err}");
        }
    }
}
