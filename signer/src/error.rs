//! The signing session error type.

use thiserror::Error;

use sigstream_core::{enc::EncError, ser::SerError};

/// Errors raised while driving a signing session. Every failure aborts the
/// session immediately; the host must restart the protocol from scratch.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The host supplied structurally invalid data: an unknown script type,
    /// a missing amount, an invalid address, a capability the coin does not
    /// have.
    #[error("{0}")]
    DataError(&'static str),

    /// A consistency violation: the host's stream diverged from previously
    /// witnessed data, or a previous transaction failed to authenticate.
    #[error("{0}")]
    ProcessError(&'static str),

    /// The user declined a confirmation prompt.
    #[error("{0}")]
    ActionCancelled(&'static str),

    /// The fee is negative on a coin that does not permit reward
    /// transactions.
    #[error("Not enough funds")]
    NotEnoughFunds,
}

impl From<SerError> for SigningError {
    fn from(_: SerError) -> Self {
        SigningError::ProcessError("Failed to serialize transaction data")
    }
}

impl From<EncError> for SigningError {
    fn from(_: EncError) -> Self {
        SigningError::DataError("Invalid address")
    }
}
