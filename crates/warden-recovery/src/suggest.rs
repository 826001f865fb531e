//! Command suggestion for unresolved names.
//!
//! Picks the single closest registered command by Jaro-Winkler similarity,
//! verifies the issuer could actually run it (check failures are swallowed
//! as "cannot run", never surfaced as new errors), and offers a confirm
//! prompt. Accepting re-runs full dispatch, so checks are enforced again at
//! execution time.

use crate::engine::RecoveryEngine;
use crate::router::RecoveryAction;
use crate::session::SessionEntry;
use warden_core::{
    AffordanceId, AffordanceSpec, ButtonSpec, ButtonStyle, InvocationContext, PresentedMessage,
    Snowflake,
};

/// Button id accepting the suggested command.
pub(crate) const RUN_BUTTON: &str = "suggest:run";
/// Button id declining the suggestion.
pub(crate) const DISMISS_BUTTON: &str = "suggest:dismiss";

/// The single best match above the threshold, if any.
#[must_use]
pub fn closest_command<'a, I>(attempted: &str, names: I, threshold: f64) -> Option<&'a str>
where
    I: Iterator<Item = &'a str>,
{
    let attempted = attempted.to_lowercase();
    names
        .map(|name| (name, strsim::jaro_winkler(&attempted, &name.to_lowercase())))
        .filter(|(_, score)| *score >= threshold)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(name, _)| name)
}

/// One offered suggestion awaiting confirmation.
#[derive(Debug)]
pub struct SuggestionPrompt {
    /// The failed invocation
    pub ctx: InvocationContext,
    /// The command being offered
    pub suggested: String,
    /// The prompt's rendered message, once presented
    pub message: Option<PresentedMessage>,
}

impl SuggestionPrompt {
    /// The only principal allowed to confirm or decline.
    #[inline]
    #[must_use]
    pub fn owner(&self) -> Snowflake {
        self.ctx.user
    }
}

impl RecoveryEngine {
    /// Offer the closest runnable command for an unresolved name.
    pub(crate) async fn offer_suggestion(
        &self,
        ctx: &InvocationContext,
        attempted: &str,
    ) -> RecoveryAction {
        if attempted.is_empty() {
            return RecoveryAction::Silenced;
        }
        // Restricted issuers get nothing, not even a suggestion.
        if self.gate.is_restricted(ctx.user) {
            return RecoveryAction::Silenced;
        }

        let Some(suggested) = closest_command(
            attempted,
            self.commands.names(),
            self.config.similarity_threshold,
        )
        .map(str::to_string) else {
            tracing::debug!("no suggestion close enough to `{attempted}`");
            return RecoveryAction::Silenced;
        };

        match self.dispatcher.can_run(ctx, &suggested).await {
            Ok(()) => {}
            Err(failure) if failure.is_check_failure() => {
                tracing::debug!("issuer cannot run suggested `{suggested}`");
                return RecoveryAction::Silenced;
            }
            Err(failure) => {
                tracing::warn!("suggestion vetting for `{suggested}` failed: {failure}");
                return RecoveryAction::Silenced;
            }
        }

        let id = AffordanceId::new();
        let spec = AffordanceSpec {
            id,
            owner: Some(ctx.user),
            ttl: self.config.affordance_ttl,
            select: None,
            buttons: vec![
                ButtonSpec::new(RUN_BUTTON, &format!("Run {suggested}"), ButtonStyle::Confirm),
                ButtonSpec::new(DISMISS_BUTTON, "Dismiss", ButtonStyle::Neutral),
            ],
        };
        let content = format!(
            "Couldn't find a command named `{attempted}`. Perhaps you meant `{suggested}`?"
        );
        let presented = match self
            .transport
            .present(ctx.channel, Some(ctx.message), &content, spec)
            .await
        {
            Ok(presented) => presented,
            Err(err) => {
                tracing::warn!("could not present suggestion: {err}");
                return RecoveryAction::Silenced;
            }
        };

        self.sessions.insert(
            id,
            SessionEntry::Suggestion(SuggestionPrompt {
                ctx: ctx.clone(),
                suggested: suggested.clone(),
                message: Some(presented),
            }),
        );
        RecoveryAction::SuggestionOffered { command: suggested }
    }

    /// Owner accepted: re-run full dispatch with the suggested command
    /// substituted; any failure re-enters the router.
    pub(crate) async fn suggestion_accept(
        &self,
        prompt: &SuggestionPrompt,
        affordance: AffordanceId,
    ) {
        self.sessions.remove(affordance);
        self.delete_presented(prompt.message).await;

        let ctx = prompt.ctx.clone().with_command(&prompt.suggested);
        let args = ctx.supplied.clone();
        tracing::info!("re-dispatching as `{}`", prompt.suggested);
        if let Err(failure) = self.dispatcher.invoke(&ctx, &prompt.suggested, &args).await {
            self.handle_failure(&ctx, failure).await;
        }
    }

    /// Owner declined: drop the prompt with no further message.
    pub(crate) async fn suggestion_dismiss(
        &self,
        prompt: &SuggestionPrompt,
        affordance: AffordanceId,
    ) {
        self.sessions.remove(affordance);
        self.delete_presented(prompt.message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: [&str; 4] = ["greet", "ping", "purge", "help"];

    #[test]
    fn close_typo_matches() {
        assert_eq!(
            closest_command("gret", NAMES.iter().copied(), 0.7),
            Some("greet")
        );
        assert_eq!(
            closest_command("PUGRE", NAMES.iter().copied(), 0.7),
            Some("purge")
        );
    }

    #[test]
    fn distant_input_matches_nothing() {
        assert_eq!(closest_command("xyzzy", NAMES.iter().copied(), 0.7), None);
        assert_eq!(closest_command("q", NAMES.iter().copied(), 0.7), None);
    }

    #[test]
    fn exact_name_beats_near_names() {
        assert_eq!(
            closest_command("ping", NAMES.iter().copied(), 0.7),
            Some("ping")
        );
    }
}
