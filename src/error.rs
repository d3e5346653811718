//! The typed error surface returned by every public broker operation.

use thiserror::Error;

/// Errors returned by [`crate::Broker`] operations.
///
/// All three variants are expected outcomes of normal operation, not bugs:
/// a cancellation token fires, a caller references a settled delivery, or the
/// broker has been shut down. None are retried inside the core; callers decide
/// whether and how to retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The caller's cancellation token was already triggered when the
    /// operation was invoked.
    #[error("operation cancelled")]
    Cancelled,

    /// `id` is not currently in-flight: it was never published, has already
    /// been settled (acknowledged or re-queued), or is simply unknown.
    #[error("delivery {id} is not in-flight")]
    InvalidId {
        /// The id the caller referenced.
        id: u64,
    },

    /// The broker has been closed via [`crate::Broker::close`].
    #[error("broker is closed")]
    Closed,
}

/// Convenience alias for broker operation results.
pub type Result<T> = std::result::Result<T, BrokerError>;
