//! Snapshot of a failed command invocation.

use crate::command::BoundArgs;
use crate::types::{ChannelKind, Snowflake};
use serde::{Deserialize, Serialize};

/// Everything the recovery layer needs to know about the invocation that
/// failed: who issued it, where, which command resolved (if any), and the
/// arguments that were already bound before the failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationContext {
    /// Issuing user
    pub user: Snowflake,
    /// Community the invocation came from, if any
    pub guild: Option<Snowflake>,
    /// Channel the invocation arrived through
    pub channel: Snowflake,
    /// Direct or community channel
    pub channel_kind: ChannelKind,
    /// The triggering message
    pub message: Snowflake,
    /// Link back to the triggering message
    pub origin_url: String,
    /// Qualified name of the resolved command, when resolution succeeded
    pub command: Option<String>,
    /// The raw first token the user typed, for unresolved names
    pub invoked_with: Option<String>,
    /// Arguments bound before the failure (a partial bind)
    pub supplied: BoundArgs,
}

impl InvocationContext {
    /// Context for a direct-channel invocation.
    #[must_use]
    pub fn direct(user: Snowflake, channel: Snowflake, message: Snowflake) -> Self {
        Self {
            user,
            guild: None,
            channel,
            channel_kind: ChannelKind::Direct,
            message,
            origin_url: String::new(),
            command: None,
            invoked_with: None,
            supplied: BoundArgs::empty(),
        }
    }

    /// Context for an invocation inside a community channel.
    #[must_use]
    pub fn in_guild(
        user: Snowflake,
        guild: Snowflake,
        channel: Snowflake,
        message: Snowflake,
    ) -> Self {
        Self {
            user,
            guild: Some(guild),
            channel,
            channel_kind: ChannelKind::Guild,
            message,
            origin_url: String::new(),
            command: None,
            invoked_with: None,
            supplied: BoundArgs::empty(),
        }
    }

    /// With the resolved command name
    #[must_use]
    pub fn with_command(mut self, command: &str) -> Self {
        self.command = Some(command.to_string());
        self
    }

    /// With the raw invoked token
    #[must_use]
    pub fn with_invoked_with(mut self, raw: &str) -> Self {
        self.invoked_with = Some(raw.to_string());
        self
    }

    /// With the origin link
    #[must_use]
    pub fn with_origin_url(mut self, url: &str) -> Self {
        self.origin_url = url.to_string();
        self
    }

    /// With pre-bound arguments
    #[must_use]
    pub fn with_supplied(mut self, supplied: BoundArgs) -> Self {
        self.supplied = supplied;
        self
    }
}
