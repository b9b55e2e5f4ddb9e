//! Common types shared across the crosspost crates.
//!
//! This crate defines the error type every adapter reports with, plus the
//! observability helpers binaries and tests use to install `tracing`.
//!
//! # Overview
//!
//! - [`CrosspostError`] and [`Result`]: shared error handling
//! - [`Provider`]: which social network an error came from
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use crosspost_common::{CrosspostError, Provider};
//!
//! let err = CrosspostError::Provider {
//!     provider: Provider::LinkedIn,
//!     status: 422,
//!     message: "duplicate post".into(),
//! };
//! assert_eq!(err.status(), Some(422));
//! ```
use std::fmt;

pub mod observability;

/// Social network an adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    LinkedIn,
    Twitter,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::LinkedIn => f.write_str("linkedin"),
            Provider::Twitter => f.write_str("twitter"),
        }
    }
}

/// Error types reported by the adapters.
#[derive(thiserror::Error, Debug)]
pub enum CrosspostError {
    /// Credentials or endpoints were missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The provider rejected an authorization code or the configured credentials.
    #[error("Authentication rejected{}: {message}", fmt_status(.status))]
    Auth {
        status: Option<u16>,
        message: String,
    },

    /// The request never produced an HTTP answer.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("{provider} error {status}: {message}")]
    Provider {
        provider: Provider,
        status: u16,
        message: String,
    },

    /// The provider answered with a body we could not understand.
    #[error("Invalid server response: {0}")]
    Parse(String),

    /// The caller asked for a request that cannot be sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A local file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrosspostError {
    /// HTTP status attached to the error, when the provider answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            CrosspostError::Auth { status, .. } => *status,
            CrosspostError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Convenient alias for results that use [`CrosspostError`].
pub type Result<T> = std::result::Result<T, CrosspostError>;
