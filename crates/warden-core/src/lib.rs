//! Warden Core
//!
//! Shared foundation for the Warden recovery layer:
//! - Identity and domain types (snowflakes, restrictions, incidents)
//! - The closed command-failure taxonomy and its classification
//! - The command model consumed for re-invocation
//! - Collaborator interfaces: persistent store, transport/interactive UI,
//!   incident feed, command dispatch
//!
//! # Example
//!
//! ```rust
//! use warden_core::{classify, CommandFailure, FailureKind};
//!
//! let failure = CommandFailure::MissingArgument { param: "target".to_string() };
//! assert_eq!(classify(&failure), FailureKind::MissingArgument);
//! ```

#![warn(unreachable_pub)]

pub mod command;
pub mod context;
pub mod convert;
pub mod failure;
pub mod store;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use command::{
    BoundArgs, CommandRegistry, CommandSpec, Dispatcher, ParameterKind, ParameterSpec,
};
pub use context::InvocationContext;
pub use convert::{convert, ArgValue, ConvertError, ConverterKind};
pub use failure::{classify, CommandFailure, DomainSignal, FailureKind, RoleRef};
pub use store::{IncidentStore, RestrictionStore, StoreError};
pub use transport::{
    AffordanceSpec, ButtonSpec, ButtonStyle, IncidentFeed, InteractionEvent, InteractionInput,
    PresentedMessage, PromptSpec, SelectEntry, SelectSpec, StatusGlyph, Transport, TransportError,
};
pub use types::{
    AffordanceId, ChannelKind, GuildChannel, Incident, IncidentId, NewIncident, Restriction,
    RestrictionScope, Snowflake,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Warden Core
    pub use crate::{
        classify, ArgValue, BoundArgs, CommandFailure, CommandRegistry, CommandSpec, Dispatcher,
        FailureKind, InvocationContext, Restriction, Snowflake, Transport,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
