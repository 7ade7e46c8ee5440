//! Error taxonomy for the cache core.
//!
//! Cache-layer failures (remote unavailability, lock timeouts, serialization
//! of a cached value) are absorbed by the engine to preserve availability;
//! data-source failures and cancellation are propagated verbatim to the
//! caller. See [`CacheError`] for the full taxonomy.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the cache core.
///
/// `NotFound` and `KnownAbsent` are intentionally absent from this enum —
/// they are expected outcomes, encoded as [`crate::CacheStatus`] values
/// rather than errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The codec could not encode or decode a value.
    #[error("serialization failure for key '{key}': {source}")]
    SerializationFailure {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// A transport error occurred talking to the remote tier.
    #[error("remote tier unavailable: {0}")]
    RemoteUnavailable(String),

    /// The in-process or remote lock could not be acquired within its wait budget.
    #[error("lock acquisition timed out for key '{key}' after {waited:?}")]
    LockAcquisitionTimeout { key: String, waited: Duration },

    /// The user-supplied data source returned an error. Propagated verbatim.
    #[error("data source failure: {0}")]
    DataSourceFailure(#[source] anyhow::Error),

    /// The caller's cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,

    /// A backend-specific failure that does not fit the taxonomy above.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CacheError {
    /// True for errors the engine absorbs (logs and degrades) rather than
    /// propagates to the caller of a read/write path.
    #[must_use]
    pub fn is_absorbed(&self) -> bool {
        matches!(
            self,
            CacheError::SerializationFailure { .. }
                | CacheError::RemoteUnavailable(_)
                | CacheError::LockAcquisitionTimeout { .. }
        )
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
