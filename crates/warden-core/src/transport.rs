//! Transport and interactive-UI collaborator interface.
//!
//! The chat platform delivers messages and renders interactive widgets;
//! Warden only describes what to present. Each affordance carries its own
//! [`AffordanceId`]; the collaborator owner-checks interactions, enforces the
//! bounded lifetime, and hands events back to the engine keyed by that id.

use crate::types::{AffordanceId, GuildChannel, Incident, Snowflake};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transport-level failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The destination cannot be reached at all
    #[error("destination unreachable")]
    Unreachable,
    /// The platform refused the delivery (closed DMs, missing permission)
    #[error("delivery forbidden")]
    Forbidden,
    /// The affordance already expired on the platform side
    #[error("affordance expired")]
    Expired,
}

/// Status glyph shown next to a backfill argument entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusGlyph {
    /// Required and not yet supplied
    StillRequired,
    /// Supplied by the user during this session
    Supplied,
    /// Optional and untouched
    NotYetNeeded,
}

/// One selectable entry in a select affordance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectEntry {
    /// Value reported back when the entry is chosen
    pub value: String,
    /// Entry label
    pub label: String,
    /// Longer description under the label
    pub description: String,
    /// Status glyph
    pub glyph: StatusGlyph,
}

/// Rendering style for a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonStyle {
    /// Low-emphasis gray
    Neutral,
    /// Affirmative green
    Confirm,
    /// Destructive red
    Danger,
}

/// One button in an affordance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonSpec {
    /// Value reported back when the button is pressed
    pub id: String,
    /// Button label
    pub label: String,
    /// Rendering style
    pub style: ButtonStyle,
}

impl ButtonSpec {
    /// Shorthand constructor.
    #[must_use]
    pub fn new(id: &str, label: &str, style: ButtonStyle) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            style,
        }
    }
}

/// A select menu plus its placeholder text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectSpec {
    /// Placeholder shown before anything is chosen
    pub placeholder: String,
    /// Selectable entries
    pub entries: Vec<SelectEntry>,
}

/// Interactive widget attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffordanceSpec {
    /// Session key; interaction events come back under this id
    pub id: AffordanceId,
    /// Owner restriction; `None` lets any principal interact
    pub owner: Option<Snowflake>,
    /// Lifetime after which the collaborator silently expires the widget
    pub ttl: Duration,
    /// Optional select menu
    pub select: Option<SelectSpec>,
    /// Buttons, in display order
    pub buttons: Vec<ButtonSpec>,
}

/// A message the transport rendered with an affordance attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentedMessage {
    /// Channel the message went to
    pub channel: Snowflake,
    /// The rendered message
    pub message: Snowflake,
    /// The attached affordance
    pub affordance: AffordanceId,
}

/// Modal-style single-field text prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSpec {
    /// Prompt title (the parameter's label)
    pub title: String,
    /// Field label
    pub label: String,
    /// Placeholder text inside the field
    pub placeholder: String,
    /// Maximum accepted input length
    pub max_length: usize,
}

impl PromptSpec {
    /// The single-field prompt used for missing-argument collection.
    #[must_use]
    pub fn for_argument(title: &str) -> Self {
        Self {
            title: title.to_string(),
            label: "Enter the missing argument".to_string(),
            placeholder: "...".to_string(),
            max_length: 2000,
        }
    }
}

/// What the user did with an affordance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionInput {
    /// Chose a select entry
    Select {
        /// Value of the chosen entry
        value: String,
    },
    /// Submitted a text prompt
    Submit {
        /// The entered text
        text: String,
    },
    /// Pressed a button
    Button {
        /// Id of the pressed button
        id: String,
    },
}

/// An interaction event delivered by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEvent {
    /// Which affordance was interacted with
    pub affordance: AffordanceId,
    /// Who interacted
    pub actor: Snowflake,
    /// What they did
    pub input: InteractionInput,
}

/// Message and interactive-widget delivery.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a plain message to a channel.
    async fn send(&self, channel: Snowflake, content: &str) -> Result<Snowflake, TransportError>;

    /// Reply to a message; `delete_after` schedules removal of the reply.
    async fn reply(
        &self,
        channel: Snowflake,
        to: Snowflake,
        content: &str,
        delete_after: Option<Duration>,
    ) -> Result<Snowflake, TransportError>;

    /// Edit a previously sent message.
    async fn edit(
        &self,
        channel: Snowflake,
        message: Snowflake,
        content: &str,
    ) -> Result<(), TransportError>;

    /// Delete a message. Deleting an already-deleted message is not an error.
    async fn delete(&self, channel: Snowflake, message: Snowflake) -> Result<(), TransportError>;

    /// Send a private one-to-one message to a user.
    async fn direct_message(&self, user: Snowflake, content: &str) -> Result<(), TransportError>;

    /// List a community's channels for notice-channel resolution.
    async fn guild_channels(&self, guild: Snowflake)
        -> Result<Vec<GuildChannel>, TransportError>;

    /// Reply to a message with an interactive affordance attached.
    async fn present(
        &self,
        channel: Snowflake,
        reply_to: Option<Snowflake>,
        content: &str,
        affordance: AffordanceSpec,
    ) -> Result<PresentedMessage, TransportError>;

    /// Re-render an affordance in place (refreshed entries, same message).
    async fn update(
        &self,
        presented: &PresentedMessage,
        affordance: AffordanceSpec,
    ) -> Result<(), TransportError>;

    /// Open a text prompt for the principal currently interacting with an
    /// affordance. Opening a second prompt replaces the first.
    async fn open_prompt(
        &self,
        affordance: AffordanceId,
        prompt: PromptSpec,
    ) -> Result<(), TransportError>;

    /// Respond privately (visible only to `user`) to an interaction.
    async fn respond_private(
        &self,
        affordance: AffordanceId,
        user: Snowflake,
        content: &str,
    ) -> Result<(), TransportError>;
}

/// Outbound incident-feed collaborator; delivery is fire-and-forget.
#[async_trait]
pub trait IncidentFeed: Send + Sync {
    /// Publish a formatted incident summary.
    async fn publish(&self, incident: &Incident) -> Result<(), TransportError>;
}
