//! Closed failure taxonomy and its classification.
//!
//! Every condition a command invocation can raise is one variant of
//! [`CommandFailure`]; [`classify`] is a total function from failure to
//! [`FailureKind`], so the router's dispatch is exhaustiveness-checked at
//! compile time instead of probing error types at runtime.
//!
//! Domain-specific signals ([`DomainSignal`]) are a disjoint taxonomy:
//! internal components raise them as control flow, and whether a signal is
//! silent is decided independently of what message (if any) the user sees.

use std::time::Duration;

/// Reference to a role the principal or the bot is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRef {
    /// Role id, rendered as a `<@&id>` mention
    Id(u64),
    /// Role referenced by name
    Named(String),
}

impl std::fmt::Display for RoleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "<@&{id}>"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Internal domain conditions, disjoint from the framework taxonomy.
///
/// Components use these as control-flow signals between each other; a signal
/// is mapped to exactly one tailored user message or intentionally left
/// silent via [`DomainSignal::user_message`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainSignal {
    /// A lookup command found nothing for the query
    #[error("no results for {query}")]
    SearchMiss {
        /// What the user searched for
        query: String,
    },
    /// The owner abandoned an interactive flow; nothing left to say
    #[error("flow cancelled")]
    Cancelled,
    /// Another component already told the user everything relevant
    #[error("already handled")]
    Handled,
}

impl DomainSignal {
    /// The tailored user-facing message, or `None` for silent signals.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::SearchMiss { query } => Some(format!(
                "Cannot find any results for **{query}**. \
                 Try a different spelling or a broader term."
            )),
            Self::Cancelled | Self::Handled => None,
        }
    }
}

/// Every condition a command invocation can raise.
#[derive(Debug, thiserror::Error)]
pub enum CommandFailure {
    /// No registered command matched the invoked name
    #[error("no command named `{attempted}`")]
    UnknownCommand {
        /// The raw name the user typed
        attempted: String,
    },

    /// A required argument was never supplied
    #[error("missing required argument `{param}`")]
    MissingArgument {
        /// Binding name of the missing parameter
        param: String,
    },

    /// A required attachment was never supplied
    #[error("missing required attachment `{param}`")]
    MissingAttachment {
        /// Binding name of the missing parameter
        param: String,
    },

    /// The issuer lacks permissions
    #[error("issuer is missing permissions")]
    MissingPermissions {
        /// Permission names, in the platform's snake_case spelling
        missing: Vec<String>,
    },

    /// The bot lacks permissions
    #[error("bot is missing permissions")]
    BotMissingPermissions {
        /// Permission names, in the platform's snake_case spelling
        missing: Vec<String>,
    },

    /// The issuer lacks one of the listed roles
    #[error("issuer is missing a role")]
    MissingRoles {
        /// Acceptable roles
        roles: Vec<RoleRef>,
    },

    /// The bot lacks one of the listed roles
    #[error("bot is missing a role")]
    BotMissingRoles {
        /// Acceptable roles
        roles: Vec<RoleRef>,
    },

    /// The user supplied input a converter rejected
    #[error("{0}")]
    BadArgument(String),

    /// The command is administratively disabled
    #[error("This command is currently disabled.")]
    Disabled,

    /// The command's concurrency limit is saturated
    #[error("Too many people are using this command right now. Try again in a moment.")]
    MaxConcurrency,

    /// The issuer is on cooldown
    #[error("You are on cooldown. Try again in {}s.", .retry_after.as_secs())]
    Cooldown {
        /// How long until the command may run again
        retry_after: Duration,
    },

    /// The command only runs in private channels
    #[error("This command only works in direct messages.")]
    PrivateMessageOnly,

    /// The command only runs inside a community
    #[error("This command only works inside a server.")]
    GuildOnly,

    /// The command is reserved for the bot owner
    #[error("Only the bot owner can use this command.")]
    NotOwner,

    /// The command requires an age-restricted channel
    #[error("This command only works in age-restricted channels.")]
    NsfwRequired,

    /// More positional arguments than the command accepts
    #[error("Too many arguments were provided for this command.")]
    TooManyArguments,

    /// Some other check declined the invocation; already communicated or
    /// intentionally silent
    #[error("check failed: {reason}")]
    CheckFailed {
        /// Which check declined
        reason: String,
    },

    /// The gate's sentinel; the gate has already handled disclosure
    #[error("access denied")]
    AccessDenied,

    /// One level of cause-wrapping added by the host framework
    #[error(transparent)]
    Wrapped(Box<CommandFailure>),

    /// Internal domain signal
    #[error(transparent)]
    Domain(#[from] DomainSignal),

    /// Anything unexpected raised by a command body
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CommandFailure {
    /// Strip exactly one level of cause-wrapping, as the router does before
    /// classifying.
    #[must_use]
    pub fn unwrap_once(self) -> Self {
        match self {
            Self::Wrapped(inner) => *inner,
            other => other,
        }
    }

    /// Short rendering used as the incident dedup key.
    #[must_use]
    pub fn signature(&self) -> String {
        self.to_string()
    }

    /// Full rendering of the failure chain for the incident record.
    #[must_use]
    pub fn full_trace(&self) -> String {
        match self {
            Self::Internal(err) => format!("{err:?}"),
            other => format!("{other:?}"),
        }
    }

    /// Whether this failure came from a command check, as opposed to the
    /// command body. Swallowed by the suggestion flow as "cannot run".
    #[must_use]
    pub fn is_check_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingPermissions { .. }
                | Self::BotMissingPermissions { .. }
                | Self::MissingRoles { .. }
                | Self::BotMissingRoles { .. }
                | Self::PrivateMessageOnly
                | Self::GuildOnly
                | Self::NotOwner
                | Self::NsfwRequired
                | Self::CheckFailed { .. }
                | Self::AccessDenied
        )
    }

    /// Auto-delete window for the reply, when the failure carries one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Cooldown { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Closed classification of a failure, driving the router's total dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Already handled by the gate; never re-reported
    GateSentinel,
    /// Unresolved command name
    UnknownCommand,
    /// Missing required argument, recoverable interactively
    MissingArgument,
    /// Missing required attachment, static guidance only
    MissingAttachment,
    /// Permission or role shortfall, structured list reply
    Shortfall,
    /// Expected condition, replied with its own message text
    Expected,
    /// Check declined silently
    SilentCheck,
    /// Internal domain signal, routed through the domain mapping
    Domain,
    /// Unexpected failure, durably logged
    Unexpected,
}

/// Total mapping from failure to classification.
///
/// `Wrapped` is classified as whatever it wraps; callers unwrap before
/// acting so the inner failure's data is at hand.
#[must_use]
pub fn classify(failure: &CommandFailure) -> FailureKind {
    match failure {
        CommandFailure::AccessDenied => FailureKind::GateSentinel,
        CommandFailure::UnknownCommand { .. } => FailureKind::UnknownCommand,
        CommandFailure::MissingArgument { .. } => FailureKind::MissingArgument,
        CommandFailure::MissingAttachment { .. } => FailureKind::MissingAttachment,
        CommandFailure::MissingPermissions { .. }
        | CommandFailure::BotMissingPermissions { .. }
        | CommandFailure::MissingRoles { .. }
        | CommandFailure::BotMissingRoles { .. } => FailureKind::Shortfall,
        CommandFailure::BadArgument(_)
        | CommandFailure::Disabled
        | CommandFailure::MaxConcurrency
        | CommandFailure::Cooldown { .. }
        | CommandFailure::PrivateMessageOnly
        | CommandFailure::GuildOnly
        | CommandFailure::NotOwner
        | CommandFailure::NsfwRequired
        | CommandFailure::TooManyArguments => FailureKind::Expected,
        CommandFailure::CheckFailed { .. } => FailureKind::SilentCheck,
        CommandFailure::Wrapped(inner) => classify(inner),
        CommandFailure::Domain(_) => FailureKind::Domain,
        CommandFailure::Internal(_) => FailureKind::Unexpected,
    }
}
