//! Warden Recovery
//!
//! The runtime-error recovery engine for a command-driven chat bot:
//! - Error classifier/router over the closed failure taxonomy
//! - Missing-argument backfill sessions (interactive state machines)
//! - Fuzzy command suggestion with a confirm flow
//! - Durable incident recording with deduplication and fix-notification
//!   fan-out
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_recovery::{RecoveryConfig, RecoveryEngine};
//!
//! # async fn example(engine: RecoveryEngine,
//! #                  ctx: warden_core::InvocationContext,
//! #                  failure: warden_core::CommandFailure) {
//! let action = engine.handle_failure(&ctx, failure).await;
//! println!("recovered via {action:?}");
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod backfill;
pub mod config;
pub mod engine;
pub mod incident;
pub mod router;
pub mod session;
pub mod suggest;

// Re-exports for convenience
pub use backfill::{
    allowed_transitions, BackfillSession, BackfillState, BoundArgument, IllegalTransition,
};
pub use config::RecoveryConfig;
pub use engine::RecoveryEngine;
pub use incident::{FixReport, IncidentDetail, IncidentError, IncidentService, WatchToggle};
pub use router::{shortfall_message, RecoveryAction};
pub use session::{SessionEntry, SessionRegistry};
pub use suggest::{closest_command, SuggestionPrompt};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Warden Recovery
    pub use crate::{
        BackfillSession, BackfillState, IncidentService, RecoveryAction, RecoveryConfig,
        RecoveryEngine,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
