//! The public handle applications hold onto: [`Broker`].

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::command::Command;
use crate::config::BrokerConfig;
use crate::core::Core;
use crate::delivery_stream::DeliveryStream;
use crate::error::BrokerError;
use crate::message::Message;

/// A handle onto an in-process message broker.
///
/// `Broker` is cheap to clone: every clone shares the same mailbox sender and
/// therefore the same underlying state machine task. Dropping the last clone
/// does not close the broker; only [`Broker::close`] does that explicitly.
///
/// Every operation accepts a [`CancellationToken`] so a caller can bound how
/// long it is willing to wait for the mailbox to be serviced. The token is
/// checked before the command is sent; once a command has been accepted by
/// the mailbox it always runs to completion.
#[derive(Debug, Clone)]
pub struct Broker {
    mailbox_tx: mpsc::Sender<Command>,
}

impl Broker {
    /// Construct a broker and spawn its state machine task.
    ///
    /// The task keeps running, independent of how many `Broker` clones are
    /// dropped, until [`Broker::close`] is called (or every clone and every
    /// outstanding TTL timer is dropped, which ends the task without ever
    /// having transitioned to `Closed`).
    #[must_use]
    pub fn new(config: BrokerConfig) -> Self {
        let (mailbox_tx, mailbox_rx) = mpsc::channel(config.mailbox_capacity.max(1));
        let core = Core::new(&config, mailbox_tx.clone(), mailbox_rx);
        tokio::spawn(core.run());
        Self { mailbox_tx }
    }

    /// Obtain the shared outbound delivery stream.
    ///
    /// Every successful call returns a handle onto the same underlying
    /// rendezvous channel; there is exactly one logical consumer.
    #[instrument(skip(self, cancel))]
    pub async fn delivery(&self, cancel: CancellationToken) -> Result<DeliveryStream, BrokerError> {
        self.call(cancel, |response_tx| Command::ObtainDelivery { response_tx })
            .await
    }

    /// Publish a message to the tail of the published queue.
    #[instrument(skip(self, message, cancel))]
    pub async fn publish(&self, message: Message, cancel: CancellationToken) -> Result<(), BrokerError> {
        self.call(cancel, |response_tx| Command::Publish { message, response_tx })
            .await
    }

    /// Acknowledge a delivery, removing it permanently from the broker.
    #[instrument(skip(self, cancel))]
    pub async fn acknowledge(&self, id: u64, cancel: CancellationToken) -> Result<(), BrokerError> {
        self.call(cancel, |response_tx| Command::Acknowledge { id, response_tx })
            .await
    }

    /// Re-queue a delivery at the tail of the published queue under a fresh id.
    #[instrument(skip(self, cancel))]
    pub async fn requeue(&self, id: u64, cancel: CancellationToken) -> Result<(), BrokerError> {
        self.call(cancel, |response_tx| Command::ReQueue { id, response_tx })
            .await
    }

    /// Transition the broker to `Closed`. Idempotent: closing an
    /// already-closed broker succeeds.
    #[instrument(skip(self, cancel))]
    pub async fn close(&self, cancel: CancellationToken) -> Result<(), BrokerError> {
        self.call(cancel, |response_tx| Command::Close { response_tx })
            .await
    }

    /// Check cancellation, send a command built from a fresh reply channel,
    /// and await the reply.
    ///
    /// A send or receive failure here means the state machine task has
    /// already exited, which only happens after `close`, so it is reported
    /// as [`BrokerError::Closed`].
    async fn call<T>(
        &self,
        cancel: CancellationToken,
        build: impl FnOnce(oneshot::Sender<Result<T, BrokerError>>) -> Command,
    ) -> Result<T, BrokerError> {
        if cancel.is_cancelled() {
            return Err(BrokerError::Cancelled);
        }
        let (response_tx, response_rx) = oneshot::channel();
        if self.mailbox_tx.send(build(response_tx)).await.is_err() {
            return Err(BrokerError::Closed);
        }
        response_rx.await.unwrap_or(Err(BrokerError::Closed))
    }
}
