//! Commands sent from callers (and from TTL timers) to the broker's state
//! machine task.
//!
//! Every variant carries a `oneshot::Sender` for its reply. This is the same
//! pattern the hub command channel uses: serialize every mutation through one
//! channel, reply on a one-shot per call, and let the receiving loop be the
//! sole owner of the state.

use tokio::sync::oneshot;

use crate::delivery_stream::DeliveryStream;
use crate::error::BrokerError;
use crate::message::Message;

/// A command accepted by the broker's mailbox.
///
/// The `Command` enum is closed: there is no "unknown command" case to guard
/// against at runtime, unlike a channel carrying `Box<dyn Any>` or an untyped
/// envelope. Every variant is handled exhaustively by the state machine.
#[derive(Debug)]
pub(crate) enum Command {
    /// Request the shared outbound delivery stream.
    ObtainDelivery {
        response_tx: oneshot::Sender<Result<DeliveryStream, BrokerError>>,
    },
    /// Acknowledge a delivery, removing it permanently.
    Acknowledge {
        id: u64,
        response_tx: oneshot::Sender<Result<(), BrokerError>>,
    },
    /// Re-queue a delivery at the tail under a fresh id.
    ReQueue {
        id: u64,
        response_tx: oneshot::Sender<Result<(), BrokerError>>,
    },
    /// Publish a new message to the tail of the published queue.
    Publish {
        message: Message,
        response_tx: oneshot::Sender<Result<(), BrokerError>>,
    },
    /// Transition the broker to `Closed`. Idempotent.
    Close {
        response_tx: oneshot::Sender<Result<(), BrokerError>>,
    },
}
