//! Broker construction parameters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default capacity for the command mailbox.
const DEFAULT_MAILBOX_CAPACITY: usize = 128;

/// Default capacity for the consumer request channel.
///
/// This bounds how many concurrent `DeliveryStream::recv` registrations may
/// be outstanding without a caller's registration blocking; it has no
/// bearing on how many deliveries may be buffered ahead of a consumer, which
/// is always zero (the hand-off itself is an unbuffered rendezvous).
const DEFAULT_REQUEST_CAPACITY: usize = 16;

/// Construction parameters for a [`crate::Broker`].
///
/// This type carries no behavior of its own; it is read once by
/// [`crate::Broker::new`] and then owned by the state machine task. An
/// embedding binary is free to build it directly, or populate it from a
/// config file / environment via `serde`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Time a delivery may remain in-flight before the broker automatically
    /// re-queues it.
    pub ttl: Duration,

    /// Bounded capacity of the command mailbox.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Bounded capacity of the consumer request channel.
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
}

fn default_mailbox_capacity() -> usize {
    DEFAULT_MAILBOX_CAPACITY
}

fn default_request_capacity() -> usize {
    DEFAULT_REQUEST_CAPACITY
}

impl BrokerConfig {
    /// Construct a config with the given TTL and default channel capacities.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            request_capacity: DEFAULT_REQUEST_CAPACITY,
        }
    }

    /// Override the mailbox capacity.
    #[must_use]
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Override the consumer request channel capacity.
    #[must_use]
    pub fn with_request_capacity(mut self, capacity: usize) -> Self {
        self.request_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_defaults() {
        let config = BrokerConfig::new(Duration::from_millis(100));
        assert_eq!(config.mailbox_capacity, DEFAULT_MAILBOX_CAPACITY);
        assert_eq!(config.request_capacity, DEFAULT_REQUEST_CAPACITY);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = BrokerConfig::new(Duration::from_millis(50))
            .with_mailbox_capacity(4)
            .with_request_capacity(8);
        assert_eq!(config.mailbox_capacity, 4);
        assert_eq!(config.request_capacity, 8);
    }
}
