//! Warden Gate
//!
//! The access-restriction layer run before every command:
//! - Process-wide restriction cache, loaded in full at startup
//! - Lazy expiry of timed restrictions
//! - Add/remove lifecycle with conflict detection
//! - Rate-limited denial disclosure for users, notice-channel resolution for
//!   communities
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_gate::{AccessGate, GateConfig};
//!
//! # async fn example(store: std::sync::Arc<dyn warden_core::RestrictionStore>,
//! #                  transport: std::sync::Arc<dyn warden_core::Transport>)
//! # -> Result<(), Box<dyn std::error::Error>> {
//! let gate = AccessGate::new(store, transport, GateConfig::new());
//! gate.load().await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod gate;

// Re-exports for convenience
pub use error::GateError;
pub use gate::{AccessGate, GateConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
