//! Unified error type for the lending engine.
//!
//! Every fallible operation returns [`Result`]. Notification failures are deliberately
//! not part of this enum: they live in [`crate::core::notification::NotificationError`]
//! and are attached to successful outcomes instead of aborting them.

use crate::entities::reservation::ReservationStatus;
use thiserror::Error;

/// All errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Malformed caller input; nothing was changed
    #[error("Validation failed: {message}")]
    Validation {
        /// Human readable reason
        message: String,
    },

    /// Committing the line would allocate more units than the pool can provide
    #[error(
        "Reservation {line_id} would overbook model {model_id}: requested {requested}, available {available}"
    )]
    CapacityExceeded {
        /// Offending reservation line
        line_id: i64,
        /// Model being reserved
        model_id: i64,
        /// Quantity the line asks for
        requested: u32,
        /// Quantity still free in the line's date range
        available: u32,
    },

    /// The state machine does not allow this move
    #[error("Reservation {line_id} cannot move from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition {
        /// Offending reservation line
        line_id: i64,
        /// Current status
        from: ReservationStatus,
        /// Requested status
        to: ReservationStatus,
    },

    /// The acting user lacks a manager role in the pool
    #[error("User {user_id} is not a manager of inventory pool {inventory_pool_id}")]
    PermissionDenied {
        /// Acting user
        user_id: i64,
        /// Pool the action targets
        inventory_pool_id: i64,
    },

    /// A referenced row does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of row ("reservation", "model", ...)
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable missing or not unicode
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// A stored number does not fit the target type
    #[error("Integer conversion error: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),
}

impl Error {
    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
