//! The recovery engine: one service object owning the router, the session
//! registry and the collaborator handles.
//!
//! The host feeds it failed invocations ([`RecoveryEngine::handle_failure`])
//! and interaction events ([`RecoveryEngine::handle_interaction`]); the
//! interactive-affordance collaborator reports expiries through
//! [`RecoveryEngine::expire`].

use crate::backfill::CANCEL_BUTTON;
use crate::config::RecoveryConfig;
use crate::incident::{IncidentService, DETAILS_BUTTON, WATCH_BUTTON};
use crate::session::{SessionEntry, SessionRegistry};
use crate::suggest::{DISMISS_BUTTON, RUN_BUTTON};
use std::sync::Arc;
use warden_core::{
    AffordanceId, CommandRegistry, Dispatcher, InteractionEvent, InteractionInput, Transport,
};
use warden_gate::AccessGate;

/// The error classification/recovery engine.
pub struct RecoveryEngine {
    pub(crate) gate: Arc<AccessGate>,
    pub(crate) commands: Arc<CommandRegistry>,
    pub(crate) dispatcher: Arc<dyn Dispatcher>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) incidents: Arc<IncidentService>,
    pub(crate) sessions: SessionRegistry,
    pub(crate) config: RecoveryConfig,
}

impl RecoveryEngine {
    /// Assemble the engine. Constructed once at startup, after the gate has
    /// loaded its cache.
    #[must_use]
    pub fn new(
        gate: Arc<AccessGate>,
        commands: Arc<CommandRegistry>,
        dispatcher: Arc<dyn Dispatcher>,
        transport: Arc<dyn Transport>,
        incidents: Arc<IncidentService>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            gate,
            commands,
            dispatcher,
            transport,
            incidents,
            sessions: SessionRegistry::new(),
            config,
        }
    }

    /// Number of live interactive sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Deliver an interaction event to the session owning the affordance.
    ///
    /// Owner restriction is enforced here for backfill and suggestion
    /// sessions; incident detail views accept any requester. Events for
    /// unknown or expired affordances are dropped.
    pub async fn handle_interaction(&self, event: InteractionEvent) {
        let Some(entry) = self.sessions.get(event.affordance) else {
            tracing::debug!("interaction for unknown affordance {}", event.affordance);
            return;
        };
        let mut entry = entry.lock().await;

        match &mut *entry {
            SessionEntry::Backfill(session) => {
                if event.actor != session.owner() {
                    tracing::debug!("non-owner interaction on backfill session rejected");
                    return;
                }
                match event.input {
                    InteractionInput::Select { value } => {
                        self.backfill_select(session, event.affordance, &value).await;
                    }
                    InteractionInput::Submit { text } => {
                        self.backfill_submit(session, event.affordance, &text).await;
                    }
                    InteractionInput::Button { id } if id == CANCEL_BUTTON => {
                        self.backfill_cancel(session, event.affordance).await;
                    }
                    InteractionInput::Button { .. } => {}
                }
            }
            SessionEntry::Suggestion(prompt) => {
                if event.actor != prompt.owner() {
                    tracing::debug!("non-owner interaction on suggestion prompt rejected");
                    return;
                }
                match event.input {
                    InteractionInput::Button { id } if id == RUN_BUTTON => {
                        self.suggestion_accept(prompt, event.affordance).await;
                    }
                    InteractionInput::Button { id } if id == DISMISS_BUTTON => {
                        self.suggestion_dismiss(prompt, event.affordance).await;
                    }
                    _ => {}
                }
            }
            SessionEntry::IncidentDetail(detail) => match event.input {
                InteractionInput::Button { id } if id == DETAILS_BUTTON => {
                    self.incident_show_details(detail, event.affordance, event.actor)
                        .await;
                }
                InteractionInput::Button { id } if id == WATCH_BUTTON => {
                    self.incident_toggle_watch(detail, event.affordance, event.actor)
                        .await;
                }
                _ => {}
            },
        }
    }

    /// The affordance collaborator reports a bounded-lifetime expiry: the
    /// session is forced to Abandoned and every reference it held is
    /// released. No message is sent; the platform cleans up the stale widget.
    pub async fn expire(&self, affordance: AffordanceId) {
        let Some(entry) = self.sessions.remove(affordance) else {
            return;
        };
        let mut entry = entry.lock().await;
        if let SessionEntry::Backfill(session) = &mut *entry {
            let _ = session.transition(crate::backfill::BackfillState::Abandoned);
            tracing::debug!(
                "backfill session for `{}` abandoned on timeout",
                session.command.name
            );
        }
    }
}

impl std::fmt::Debug for RecoveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryEngine")
            .field("sessions", &self.sessions.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
