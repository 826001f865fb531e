//! Missing-argument backfill: an interactive session that collects the
//! missing value(s) without the user re-typing the whole command.
//!
//! The session itself is pure state: a partial bind of the original
//! invocation plus a state tag. The engine drives transitions from
//! interaction events; the only legal moves are Collecting to Complete (all
//! required parameters supplied, command re-invoked) and Collecting to
//! Abandoned (owner cancel or timeout).

use crate::engine::RecoveryEngine;
use crate::session::SessionEntry;
use warden_core::{
    convert, AffordanceId, AffordanceSpec, ArgValue, BoundArgs, ButtonSpec, ButtonStyle,
    CommandFailure, CommandSpec, InvocationContext, ParameterKind, ParameterSpec,
    PresentedMessage, PromptSpec, SelectEntry, SelectSpec, Snowflake, StatusGlyph,
};

/// Button id for owner-initiated cancellation.
pub(crate) const CANCEL_BUTTON: &str = "backfill:cancel";

/// State tag of a backfill session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillState {
    /// Collecting parameter values from the owner
    Collecting,
    /// All required parameters supplied; re-invocation attempted
    Complete,
    /// Owner cancelled or the session timed out
    Abandoned,
}

/// Attempted illegal state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal backfill transition: {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// State the session was in
    pub from: BackfillState,
    /// State the caller asked for
    pub to: BackfillState,
}

/// Legal transitions out of a state. Complete and Abandoned are terminal.
#[must_use]
pub fn allowed_transitions(from: BackfillState) -> Vec<BackfillState> {
    match from {
        BackfillState::Collecting => vec![BackfillState::Complete, BackfillState::Abandoned],
        BackfillState::Complete | BackfillState::Abandoned => vec![],
    }
}

/// One command parameter and what the session knows about it.
#[derive(Debug, Clone)]
pub struct BoundArgument {
    /// The parameter descriptor
    pub spec: ParameterSpec,
    /// Current value: pre-bound, supplied during the session, or the default
    pub value: Option<ArgValue>,
    /// Whether the value came from the user (originally or via the session)
    pub supplied: bool,
}

impl BoundArgument {
    /// Status glyph for the selectable list.
    #[must_use]
    pub fn glyph(&self) -> StatusGlyph {
        if self.supplied {
            StatusGlyph::Supplied
        } else if self.spec.required {
            StatusGlyph::StillRequired
        } else {
            StatusGlyph::NotYetNeeded
        }
    }

    /// Selectable entry shown to the owner.
    #[must_use]
    pub fn to_entry(&self) -> SelectEntry {
        let label = if self.spec.required {
            format!("{} [required]", self.spec.label())
        } else {
            self.spec.label().to_string()
        };
        let mut description = self.spec.description.clone();
        if !self.spec.required {
            if let Some(default) = &self.spec.default {
                if !description.is_empty() {
                    description.push('\n');
                }
                description.push_str(&format!("(Default: {default})"));
            }
        }
        SelectEntry {
            value: self.spec.name.clone(),
            label,
            description,
            glyph: self.glyph(),
        }
    }
}

/// One in-flight backfill session.
#[derive(Debug)]
pub struct BackfillSession {
    /// The failed invocation being recovered
    pub ctx: InvocationContext,
    /// The command to re-invoke
    pub command: CommandSpec,
    /// State tag
    pub state: BackfillState,
    /// Parameters in declaration order with their bind status
    pub arguments: Vec<BoundArgument>,
    /// Parameter with an open text prompt; selecting again replaces it
    pub pending_prompt: Option<String>,
    /// The session's rendered message, once presented
    pub message: Option<PresentedMessage>,
}

impl BackfillSession {
    /// Bind the already-supplied values of a failed invocation against the
    /// command's parameter list.
    ///
    /// Positional values fill non-keyword-only parameters in declaration
    /// order, keywords bind by name; unbound optionals keep their declared
    /// default with `supplied` false.
    #[must_use]
    pub fn bind(ctx: InvocationContext, command: CommandSpec) -> Self {
        let mut arguments: Vec<BoundArgument> = command
            .parameters
            .iter()
            .map(|spec| BoundArgument {
                value: spec.default.clone(),
                supplied: false,
                spec: spec.clone(),
            })
            .collect();

        let mut positional = ctx.supplied.positional.iter();
        for argument in arguments
            .iter_mut()
            .filter(|a| a.spec.kind != ParameterKind::KeywordOnly)
        {
            match positional.next() {
                Some(value) => {
                    argument.value = Some(value.clone());
                    argument.supplied = true;
                }
                None => break,
            }
        }

        for (name, value) in &ctx.supplied.keyword {
            if let Some(argument) = arguments.iter_mut().find(|a| &a.spec.name == name) {
                argument.value = Some(value.clone());
                argument.supplied = true;
            }
        }

        Self {
            ctx,
            command,
            state: BackfillState::Collecting,
            arguments,
            pending_prompt: None,
            message: None,
        }
    }

    /// The only principal allowed to interact with the session.
    #[inline]
    #[must_use]
    pub fn owner(&self) -> Snowflake {
        self.ctx.user
    }

    /// Selectable entries in declaration order.
    #[must_use]
    pub fn entries(&self) -> Vec<SelectEntry> {
        self.arguments.iter().map(BoundArgument::to_entry).collect()
    }

    /// Record a converted value for a parameter.
    pub fn mark_supplied(&mut self, name: &str, value: ArgValue) {
        if let Some(argument) = self.arguments.iter_mut().find(|a| a.spec.name == name) {
            argument.value = Some(value);
            argument.supplied = true;
        }
    }

    /// Whether every required parameter has been supplied.
    #[must_use]
    pub fn all_required_supplied(&self) -> bool {
        self.arguments
            .iter()
            .filter(|a| a.spec.required)
            .all(|a| a.supplied)
    }

    /// Reconstruct the invocation arguments, respecting each parameter's
    /// binding kind.
    #[must_use]
    pub fn invoke_args(&self) -> BoundArgs {
        let mut args = BoundArgs::empty();
        for argument in &self.arguments {
            let Some(value) = argument.value.clone() else {
                continue;
            };
            match argument.spec.kind {
                ParameterKind::PositionalOnly => args.positional.push(value),
                ParameterKind::PositionalOrKeyword | ParameterKind::KeywordOnly => {
                    args.keyword.insert(argument.spec.name.clone(), value);
                }
            }
        }
        args
    }

    /// Move to a new state.
    ///
    /// # Errors
    /// [`IllegalTransition`] when the move is not Collecting to
    /// Complete/Abandoned.
    pub fn transition(&mut self, to: BackfillState) -> Result<(), IllegalTransition> {
        if allowed_transitions(self.state).contains(&to) {
            self.state = to;
            Ok(())
        } else {
            Err(IllegalTransition {
                from: self.state,
                to,
            })
        }
    }

    /// The affordance attached to the session's message.
    pub(crate) fn affordance_spec(&self, id: AffordanceId, ttl: std::time::Duration) -> AffordanceSpec {
        AffordanceSpec {
            id,
            owner: Some(self.owner()),
            ttl,
            select: Some(SelectSpec {
                placeholder: "Select an argument to add".to_string(),
                entries: self.entries(),
            }),
            buttons: vec![ButtonSpec::new(CANCEL_BUTTON, "Cancel", ButtonStyle::Danger)],
        }
    }
}

impl RecoveryEngine {
    /// Owner selected a parameter: open (or replace) the text prompt.
    pub(crate) async fn backfill_select(
        &self,
        session: &mut BackfillSession,
        affordance: AffordanceId,
        value: &str,
    ) {
        let Some(argument) = session.arguments.iter().find(|a| a.spec.name == value) else {
            tracing::debug!("selection of unknown parameter `{value}` ignored");
            return;
        };
        let prompt = PromptSpec::for_argument(argument.spec.label());
        session.pending_prompt = Some(argument.spec.name.clone());
        if let Err(err) = self.transport.open_prompt(affordance, prompt).await {
            tracing::warn!("could not open argument prompt: {err}");
            session.pending_prompt = None;
        }
    }

    /// Owner submitted the pending prompt: convert, record, and either
    /// refresh the list or complete the session.
    pub(crate) async fn backfill_submit(
        &self,
        session: &mut BackfillSession,
        affordance: AffordanceId,
        text: &str,
    ) {
        let Some(param_name) = session.pending_prompt.take() else {
            tracing::debug!("prompt submission without a pending prompt ignored");
            return;
        };
        let Some(spec) = session.command.parameter(&param_name).cloned() else {
            return;
        };

        match convert(spec.converter, &spec.name, text) {
            Err(err) => {
                // A rejected value ends the session; the conversion failure
                // re-enters the router as a fresh error.
                let _ = session.transition(BackfillState::Abandoned);
                self.sessions.remove(affordance);
                self.delete_presented(session.message).await;
                let ctx = session.ctx.clone();
                self.handle_failure(&ctx, CommandFailure::BadArgument(err.to_string()))
                    .await;
            }
            Ok(value) => {
                session.mark_supplied(&spec.name, value);
                if session.all_required_supplied() {
                    self.backfill_complete(session, affordance).await;
                } else if let Some(message) = session.message {
                    let refreshed =
                        session.affordance_spec(affordance, self.config.backfill_timeout);
                    if let Err(err) = self.transport.update(&message, refreshed).await {
                        tracing::warn!("could not refresh argument list: {err}");
                    }
                }
            }
        }
    }

    /// Owner pressed Cancel: abandon immediately, no re-invocation.
    pub(crate) async fn backfill_cancel(
        &self,
        session: &mut BackfillSession,
        affordance: AffordanceId,
    ) {
        let _ = session.transition(BackfillState::Abandoned);
        self.sessions.remove(affordance);
        self.delete_presented(session.message).await;
        tracing::debug!("backfill for `{}` cancelled by owner", session.command.name);
    }

    /// Every required parameter is supplied: re-invoke through the full
    /// check pipeline, routing any failure back through the classifier.
    async fn backfill_complete(&self, session: &mut BackfillSession, affordance: AffordanceId) {
        let _ = session.transition(BackfillState::Complete);
        self.sessions.remove(affordance);
        self.delete_presented(session.message).await;

        let args = session.invoke_args();
        let ctx = session.ctx.clone();
        let command = session.command.name.clone();
        tracing::info!("re-invoking `{command}` with backfilled arguments");
        if let Err(failure) = self.dispatcher.invoke(&ctx, &command, &args).await {
            self.handle_failure(&ctx, failure).await;
        }
    }

    /// Start a backfill session for a missing-argument failure.
    pub(crate) async fn start_backfill(
        &self,
        ctx: &InvocationContext,
        command: CommandSpec,
        missing_param: &str,
    ) -> Option<AffordanceId> {
        let session = BackfillSession::bind(ctx.clone(), command);
        let display = session
            .command
            .parameter(missing_param)
            .map_or(missing_param.to_string(), |p| p.label().to_string());
        let content = format!(
            "Missing the **{display}** argument!\n> `{}`\n-# The command will run as soon as \
             every required argument has been provided.",
            session.command.signature(),
        );

        let id = AffordanceId::new();
        let spec = session.affordance_spec(id, self.config.backfill_timeout);
        let presented = match self
            .transport
            .present(ctx.channel, Some(ctx.message), &content, spec)
            .await
        {
            Ok(presented) => presented,
            Err(err) => {
                tracing::warn!("could not present backfill session: {err}");
                return None;
            }
        };

        let mut session = session;
        session.message = Some(presented);
        self.sessions.insert(id, SessionEntry::Backfill(session));
        Some(id)
    }

    pub(crate) async fn delete_presented(&self, message: Option<PresentedMessage>) {
        if let Some(message) = message {
            if let Err(err) = self.transport.delete(message.channel, message.message).await {
                tracing::debug!("could not delete session message: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::ConverterKind;
    use warden_test_utils::{greet_command, guild_ctx};

    #[test]
    fn bind_applies_defaults_without_marking_supplied() {
        let session = BackfillSession::bind(guild_ctx(1, 2), greet_command());

        assert_eq!(session.state, BackfillState::Collecting);
        let target = &session.arguments[0];
        assert!(target.spec.required);
        assert!(!target.supplied);
        assert_eq!(target.glyph(), StatusGlyph::StillRequired);

        let repeat = &session.arguments[1];
        assert_eq!(repeat.value, Some(ArgValue::Int(5)));
        assert!(!repeat.supplied);
        assert_eq!(repeat.glyph(), StatusGlyph::NotYetNeeded);
    }

    #[test]
    fn bind_consumes_positional_then_keyword_values() {
        let mut supplied = BoundArgs::empty();
        supplied.positional.push(ArgValue::Str("world".to_string()));
        supplied
            .keyword
            .insert("repeat".to_string(), ArgValue::Int(2));
        let ctx = guild_ctx(1, 2).with_supplied(supplied);

        let session = BackfillSession::bind(ctx, greet_command());
        assert!(session.arguments[0].supplied);
        assert_eq!(
            session.arguments[0].value,
            Some(ArgValue::Str("world".to_string()))
        );
        assert!(session.arguments[1].supplied);
        assert_eq!(session.arguments[1].value, Some(ArgValue::Int(2)));
        assert!(session.all_required_supplied());
    }

    #[test]
    fn keyword_only_parameters_skip_positional_binding() {
        let command = CommandSpec::new("tag", "Create a tag")
            .with_parameter(ParameterSpec::required(
                "name",
                "Tag name",
                ConverterKind::Text,
            ))
            .with_parameter(
                ParameterSpec::required("content", "Tag content", ConverterKind::Text)
                    .with_kind(ParameterKind::KeywordOnly),
            );
        let mut supplied = BoundArgs::empty();
        supplied.positional.push(ArgValue::Str("faq".to_string()));
        let session = BackfillSession::bind(guild_ctx(1, 2).with_supplied(supplied), command);

        assert!(session.arguments[0].supplied, "positional bound to `name`");
        assert!(!session.arguments[1].supplied, "keyword-only untouched");
    }

    #[test]
    fn supplying_the_missing_value_completes_required_set() {
        let mut session = BackfillSession::bind(guild_ctx(1, 2), greet_command());
        assert!(!session.all_required_supplied());

        session.mark_supplied("target", ArgValue::Str("world".to_string()));
        assert!(session.all_required_supplied());

        let args = session.invoke_args();
        assert!(args.positional.is_empty());
        assert_eq!(
            args.keyword.get("target"),
            Some(&ArgValue::Str("world".to_string()))
        );
        assert_eq!(args.keyword.get("repeat"), Some(&ArgValue::Int(5)));
    }

    #[test]
    fn positional_only_parameters_rebuild_positionally() {
        let command = CommandSpec::new("roll", "Roll dice").with_parameter(
            ParameterSpec::required("sides", "Die sides", ConverterKind::Integer)
                .with_kind(ParameterKind::PositionalOnly),
        );
        let mut session = BackfillSession::bind(guild_ctx(1, 2), command);
        session.mark_supplied("sides", ArgValue::Int(20));

        let args = session.invoke_args();
        assert_eq!(args.positional, vec![ArgValue::Int(20)]);
        assert!(args.keyword.is_empty());
    }

    #[test]
    fn entries_render_requirement_and_default() {
        let session = BackfillSession::bind(guild_ctx(1, 2), greet_command());
        let entries = session.entries();

        assert_eq!(entries[0].label, "target [required]");
        assert_eq!(entries[0].glyph, StatusGlyph::StillRequired);
        assert_eq!(entries[1].label, "repeat");
        assert!(entries[1].description.contains("(Default: 5)"));
    }

    #[test]
    fn only_collecting_can_transition() {
        let mut session = BackfillSession::bind(guild_ctx(1, 2), greet_command());
        session.transition(BackfillState::Complete).unwrap();

        let err = session.transition(BackfillState::Abandoned).unwrap_err();
        assert_eq!(err.from, BackfillState::Complete);
        assert_eq!(err.to, BackfillState::Abandoned);
    }

    #[test]
    fn terminal_states_allow_nothing() {
        assert!(allowed_transitions(BackfillState::Complete).is_empty());
        assert!(allowed_transitions(BackfillState::Abandoned).is_empty());
        assert_eq!(
            allowed_transitions(BackfillState::Collecting),
            vec![BackfillState::Complete, BackfillState::Abandoned]
        );
    }
}
