//! Error types for the access gate.

use warden_core::{Restriction, Snowflake, StoreError};

/// Failures of the gate's add/remove lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// An active restriction already exists for the snowflake
    #[error("{} is already restricted for `{}`", .existing.snowflake, .existing.reason)]
    AlreadyRestricted {
        /// The restriction that is still in force
        existing: Restriction,
    },

    /// No active restriction exists for the snowflake
    #[error("{snowflake} is not restricted")]
    NotRestricted {
        /// The snowflake that was looked up
        snowflake: Snowflake,
    },

    /// The snowflake is on the protected list and can never be restricted
    #[error("{snowflake} is protected and cannot be restricted")]
    Protected {
        /// The protected snowflake
        snowflake: Snowflake,
    },

    /// The persistent store failed; cache state is unchanged
    #[error("restriction store failure: {0}")]
    Store(#[from] StoreError),
}
