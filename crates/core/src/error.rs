//! Error types for unitwork
//!
//! Every fallible operation in the workspace returns [`TxnResult`].
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Error kinds
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | `IllegalState` | coordinator misuse, e.g. `begin` while active |
//! | `SetupFailure` | ambient suspend/begin/resume failed |
//! | `ResourceFailure` | one enlisted resource failed an operation |
//! | `Translated` | a registered translator claimed a raw failure |
//! | `Config` | configuration could not be read or is invalid |

use crate::types::ResourcePhase;
use std::error::Error as StdError;
use thiserror::Error;

/// Boxed cause carried by failures
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type alias for unitwork operations
pub type TxnResult<T> = std::result::Result<T, TxnError>;

/// Error types for the transaction coordinator and its adapters
#[derive(Debug, Error)]
pub enum TxnError {
    /// The coordinator was used out of order
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Ambient transaction setup failed
    ///
    /// Fatal for the enlistment that triggered it.
    #[error("Setup failed: {message}")]
    SetupFailure {
        /// What was being set up
        message: String,
        /// Underlying failure, if any
        #[source]
        source: Option<BoxError>,
    },

    /// A single enlisted resource failed
    #[error("Resource '{resource}' failed during {phase}: {source}")]
    ResourceFailure {
        /// Operation that failed
        phase: ResourcePhase,
        /// Name of the failing resource
        resource: String,
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// A failure rewritten by a registered translator
    #[error("Resource '{resource}' failed during {phase}: {source}")]
    Translated {
        /// Operation that failed
        phase: ResourcePhase,
        /// Name of the failing resource
        resource: String,
        /// Failure produced by the translator
        #[source]
        source: BoxError,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TxnError {
    /// Create an IllegalState error
    pub fn illegal_state(message: impl Into<String>) -> Self {
        TxnError::IllegalState(message.into())
    }

    /// Create a SetupFailure error
    pub fn setup(message: impl Into<String>, source: Option<BoxError>) -> Self {
        TxnError::SetupFailure {
            message: message.into(),
            source,
        }
    }

    /// Create a ResourceFailure error
    pub fn resource(
        phase: ResourcePhase,
        resource: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        TxnError::ResourceFailure {
            phase,
            resource: resource.into(),
            source: source.into(),
        }
    }

    /// Phase of a resource-level failure
    ///
    /// Returns `None` for errors not tied to a single resource.
    pub fn phase(&self) -> Option<ResourcePhase> {
        match self {
            TxnError::ResourceFailure { phase, .. } | TxnError::Translated { phase, .. } => {
                Some(*phase)
            }
            _ => None,
        }
    }

    /// Name of the failing resource, if any
    pub fn resource_name(&self) -> Option<&str> {
        match self {
            TxnError::ResourceFailure { resource, .. } | TxnError::Translated { resource, .. } => {
                Some(resource.as_str())
            }
            _ => None,
        }
    }

    /// Check if this is an IllegalState error
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, TxnError::IllegalState(_))
    }

    /// Check if this is a SetupFailure error
    pub fn is_setup_failure(&self) -> bool {
        matches!(self, TxnError::SetupFailure { .. })
    }

    /// Check if this error was produced by a translator
    pub fn is_translated(&self) -> bool {
        matches!(self, TxnError::Translated { .. })
    }

    /// The failure carried by this error, if any
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            TxnError::SetupFailure { source, .. } => source.as_deref(),
            TxnError::ResourceFailure { source, .. } | TxnError::Translated { source, .. } => {
                Some(&**source)
            }
            _ => None,
        }
    }
}
