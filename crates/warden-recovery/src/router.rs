//! The error classifier/router.
//!
//! Receives every condition a failed invocation raised, classifies it through
//! the closed [`FailureKind`] mapping, and drives exactly one recovery:
//! silence, a reply, a backfill session, a suggestion prompt, or a durable
//! incident. The gate's sentinel and check failures are never re-reported.
//!
//! Domain signals are a disjoint taxonomy with their own mapping; whether a
//! signal is silent is independent of the message a mapped signal produces.

use crate::engine::RecoveryEngine;
use chrono::Utc;
use warden_core::{
    classify, AffordanceId, AffordanceSpec, ButtonSpec, ButtonStyle, CommandFailure, DomainSignal,
    FailureKind, IncidentId, InvocationContext, NewIncident, RoleRef,
};

use crate::incident::{IncidentDetail, DETAILS_BUTTON, WATCH_BUTTON};
use crate::session::SessionEntry;

/// What the router did with a failure, for observability and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// The command handles its own errors, or the gate already handled this
    Skipped,
    /// Intentionally silent
    Silenced,
    /// A message was sent and that is the whole recovery
    Replied,
    /// A backfill session is collecting the missing argument
    BackfillStarted {
        /// The session's affordance id
        affordance: AffordanceId,
    },
    /// A suggestion prompt was offered
    SuggestionOffered {
        /// The suggested command name
        command: String,
    },
    /// The failure was durably recorded
    IncidentReported {
        /// The recorded (or reused) incident
        id: IncidentId,
    },
}

impl RecoveryEngine {
    /// Route a failed invocation to its recovery.
    ///
    /// Skips commands that declare a dedicated handler, unwraps one level of
    /// cause-wrapping, then dispatches on the total classification.
    pub async fn handle_failure(
        &self,
        ctx: &InvocationContext,
        failure: CommandFailure,
    ) -> RecoveryAction {
        if self.has_dedicated_handler(ctx) {
            return RecoveryAction::Skipped;
        }

        let failure = failure.unwrap_once();
        let kind = classify(&failure);
        // A condition surfaced by an invocation that never resolved a
        // command can only go through the suggestion flow, whatever shape
        // the condition itself has.
        let kind = if ctx.command.is_none()
            && !matches!(kind, FailureKind::GateSentinel | FailureKind::Domain)
        {
            FailureKind::UnknownCommand
        } else {
            kind
        };
        tracing::debug!("failure in {:?} classified as {kind:?}", ctx.command);

        match kind {
            FailureKind::GateSentinel => RecoveryAction::Skipped,
            FailureKind::UnknownCommand => {
                let attempted = match &failure {
                    CommandFailure::UnknownCommand { attempted } => attempted.clone(),
                    _ => ctx.invoked_with.clone().unwrap_or_default(),
                };
                self.offer_suggestion(ctx, &attempted).await
            }
            FailureKind::MissingArgument => self.handle_missing_argument(ctx, &failure).await,
            FailureKind::MissingAttachment => {
                let CommandFailure::MissingAttachment { param } = &failure else {
                    return RecoveryAction::Silenced;
                };
                // Attachments cannot arrive through a text prompt, so no
                // backfill here; static guidance only.
                let guidance = format!(
                    "The **{param}** attachment is required. Re-run the command with the \
                     file attached."
                );
                self.reply(ctx, &guidance, None).await;
                RecoveryAction::Replied
            }
            FailureKind::Shortfall => {
                self.reply(ctx, &shortfall_message(&failure), None).await;
                RecoveryAction::Replied
            }
            FailureKind::Expected => {
                self.reply(ctx, &failure.to_string(), failure.retry_after())
                    .await;
                RecoveryAction::Replied
            }
            FailureKind::SilentCheck => RecoveryAction::Silenced,
            FailureKind::Domain => match &failure {
                CommandFailure::Domain(signal) => self.handle_domain(ctx, signal).await,
                _ => RecoveryAction::Silenced,
            },
            FailureKind::Unexpected => self.handle_unexpected(ctx, failure).await,
        }
    }

    /// Route an internal domain signal: tailored message or silence.
    ///
    /// Checked only for conditions outside the framework taxonomy, so silent
    /// signals can serve as pure control flow between components.
    pub async fn handle_domain(
        &self,
        ctx: &InvocationContext,
        signal: &DomainSignal,
    ) -> RecoveryAction {
        match signal.user_message() {
            Some(message) => {
                self.reply(ctx, &message, None).await;
                RecoveryAction::Replied
            }
            None => RecoveryAction::Silenced,
        }
    }

    async fn handle_missing_argument(
        &self,
        ctx: &InvocationContext,
        failure: &CommandFailure,
    ) -> RecoveryAction {
        let CommandFailure::MissingArgument { param } = failure else {
            return RecoveryAction::Silenced;
        };
        let Some(command) = ctx.command.as_deref().and_then(|name| self.commands.get(name))
        else {
            tracing::debug!("missing argument without a resolved command");
            return RecoveryAction::Silenced;
        };

        match self.start_backfill(ctx, command.clone(), param).await {
            Some(affordance) => RecoveryAction::BackfillStarted { affordance },
            None => RecoveryAction::Silenced,
        }
    }

    /// Durably record an unexpected failure and surface the generic notice
    /// with its detail affordance.
    async fn handle_unexpected(
        &self,
        ctx: &InvocationContext,
        failure: CommandFailure,
    ) -> RecoveryAction {
        let command = ctx
            .command
            .clone()
            .or_else(|| ctx.invoked_with.clone())
            .unwrap_or_else(|| "unknown".to_string());
        tracing::error!(
            "ignoring exception in running `{command}`: {}",
            failure.signature()
        );

        let new = NewIncident {
            command,
            user_id: ctx.user,
            guild_id: ctx.guild,
            signature: failure.signature(),
            full_trace: failure.full_trace(),
            origin_url: ctx.origin_url.clone(),
            occurred_at: Utc::now(),
        };
        let incident = match self.incidents.record_or_reuse(new).await {
            Ok(incident) => incident,
            Err(err) => {
                tracing::error!("could not record incident: {err}");
                self.reply(ctx, "The command borked.", None).await;
                return RecoveryAction::Replied;
            }
        };

        let id = AffordanceId::new();
        let spec = AffordanceSpec {
            id,
            owner: None,
            ttl: self.config.affordance_ttl,
            select: None,
            buttons: vec![
                ButtonSpec::new(DETAILS_BUTTON, "Wanna know more?", ButtonStyle::Neutral),
                ButtonSpec::new(WATCH_BUTTON, "Get notified", ButtonStyle::Confirm),
            ],
        };
        match self
            .transport
            .present(ctx.channel, Some(ctx.message), "The command borked.", spec)
            .await
        {
            Ok(_) => {
                self.sessions.insert(
                    id,
                    SessionEntry::IncidentDetail(IncidentDetail {
                        incident: incident.clone(),
                    }),
                );
            }
            Err(err) => {
                tracing::warn!("could not present incident notice: {err}");
            }
        }

        RecoveryAction::IncidentReported { id: incident.id }
    }

    pub(crate) fn has_dedicated_handler(&self, ctx: &InvocationContext) -> bool {
        ctx.command
            .as_deref()
            .and_then(|name| self.commands.get(name))
            .is_some_and(|spec| spec.has_error_handler)
    }

    pub(crate) async fn reply(
        &self,
        ctx: &InvocationContext,
        content: &str,
        delete_after: Option<std::time::Duration>,
    ) {
        if let Err(err) = self
            .transport
            .reply(ctx.channel, ctx.message, content, delete_after)
            .await
        {
            tracing::warn!("could not deliver reply: {err}");
        }
    }
}

/// Bulleted shortfall message: role mentions as `<@&id>`, permission names
/// capitalized with underscores spaced out.
#[must_use]
pub fn shortfall_message(failure: &CommandFailure) -> String {
    let (subject, wording, items) = match failure {
        CommandFailure::MissingPermissions { missing } => {
            ("You are", "permissions", tidy_permissions(missing))
        }
        CommandFailure::BotMissingPermissions { missing } => {
            ("I am", "permissions", tidy_permissions(missing))
        }
        CommandFailure::MissingRoles { roles } => ("You are", "roles", render_roles(roles)),
        CommandFailure::BotMissingRoles { roles } => ("I am", "roles", render_roles(roles)),
        _ => return failure.to_string(),
    };

    let mut message = format!("{subject} missing the following {wording} to run this command:");
    for item in items {
        message.push_str(&format!("\n- {item}"));
    }
    message
}

fn tidy_permissions(permissions: &[String]) -> Vec<String> {
    permissions
        .iter()
        .map(|permission| {
            let spaced = permission.replace('_', " ");
            let mut chars = spaced.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => spaced,
            }
        })
        .collect()
}

fn render_roles(roles: &[RoleRef]) -> Vec<String> {
    roles.iter().map(ToString::to_string).collect()
}
