//! Identity and domain types shared across the workspace:
//! - Snowflake identities for principals, channels and messages
//! - Access restrictions and their expiry rules
//! - Incident records and watch registrations
//! - Affordance identifiers for interactive sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Stable numeric identity used by the chat platform for users, communities,
/// channels and messages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Snowflake(pub u64);

impl std::fmt::Display for Snowflake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Snowflake {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Incident row identifier, assigned by the persistent store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct IncidentId(pub i64);

impl std::fmt::Display for IncidentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-unique key for an interactive affordance and the session behind it
/// (ULID for sortability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AffordanceId(pub Ulid);

impl AffordanceId {
    /// Generate new affordance ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for AffordanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AffordanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a restriction targets a single user or a whole community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestrictionScope {
    /// A single user
    User,
    /// A community (guild)
    Community,
}

/// An access restriction on a principal.
///
/// At most one active restriction exists per snowflake. `expires_at = None`
/// means permanent; expired entries are removed lazily by the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restriction {
    /// The restricted principal
    pub snowflake: Snowflake,
    /// Operator-supplied reason, shown in every notice
    pub reason: String,
    /// Expiry instant; `None` is permanent
    pub expires_at: Option<DateTime<Utc>>,
    /// User or community scope
    pub scope: RestrictionScope,
}

impl Restriction {
    /// Whether the restriction has lapsed at `now`.
    #[inline]
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|until| now > until)
    }

    /// Duration wording used by restriction notices.
    #[must_use]
    pub fn until_phrase(&self) -> String {
        match self.expires_at {
            Some(until) => format!("until {}", until.format("%Y-%m-%d %H:%M UTC")),
            None => "permanently".to_string(),
        }
    }
}

/// Kind of channel a command invocation arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Private one-to-one channel
    Direct,
    /// Channel inside a community
    Guild,
}

/// A community channel candidate for restriction notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildChannel {
    /// Channel identity
    pub id: Snowflake,
    /// Channel name
    pub name: String,
    /// Whether this is the community's designated system channel
    pub is_system: bool,
    /// Whether the bot may send messages here
    pub can_send: bool,
}

/// A persisted record of an unexpected command failure.
///
/// Deduplicated on `(command, signature)` while unfixed: repeated identical
/// failures reuse the existing row instead of creating and re-alerting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Store-assigned row id
    pub id: IncidentId,
    /// Qualified name of the failing command
    pub command: String,
    /// User whose invocation first tripped the failure
    pub user_id: Snowflake,
    /// Community the invocation came from, if any
    pub guild_id: Option<Snowflake>,
    /// Short rendering of the failure, the dedup key together with `command`
    pub signature: String,
    /// Full trace of the failure chain
    pub full_trace: String,
    /// Link back to the originating message
    pub origin_url: String,
    /// When the failure was first recorded
    pub occurred_at: DateTime<Utc>,
    /// Set by an explicit operator action
    pub fixed: bool,
}

/// Incident fields supplied by the caller; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIncident {
    /// Qualified name of the failing command
    pub command: String,
    /// Triggering user
    pub user_id: Snowflake,
    /// Originating community, if any
    pub guild_id: Option<Snowflake>,
    /// Short failure rendering
    pub signature: String,
    /// Full trace of the failure chain
    pub full_trace: String,
    /// Link back to the originating message
    pub origin_url: String,
    /// When the failure occurred
    pub occurred_at: DateTime<Utc>,
}

impl NewIncident {
    /// Promote to a full record once the store has assigned an id.
    #[must_use]
    pub fn into_incident(self, id: IncidentId) -> Incident {
        Incident {
            id,
            command: self.command,
            user_id: self.user_id,
            guild_id: self.guild_id,
            signature: self.signature,
            full_trace: self.full_trace,
            origin_url: self.origin_url,
            occurred_at: self.occurred_at,
            fixed: false,
        }
    }
}
