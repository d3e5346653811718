//! The outbound delivery handle returned by [`crate::Broker::delivery`].

use tokio::sync::{mpsc, oneshot};

use crate::message::Delivery;

/// A cloneable handle onto the broker's single logical consumer.
///
/// Every call to [`DeliveryStream::recv`] registers a fresh one-shot reply
/// slot with the state machine rather than reading from a shared buffer: a
/// delivery leaves the broker's published queue only once a registration is
/// actually present to receive it, so nothing is ever buffered ahead of a
/// waiting consumer. Cloning a `DeliveryStream` does not create a second
/// request channel, it shares the one [`crate::Broker::delivery`] was first
/// called on. The rendezvous is single-consumer by design: if more than one
/// clone calls `recv` concurrently, each delivery still goes to exactly one
/// caller, but which one is unspecified.
#[derive(Debug, Clone)]
pub struct DeliveryStream {
    requests_tx: mpsc::Sender<oneshot::Sender<Delivery>>,
}

impl DeliveryStream {
    pub(crate) fn new(requests_tx: mpsc::Sender<oneshot::Sender<Delivery>>) -> Self {
        Self { requests_tx }
    }

    /// Await the next delivery.
    ///
    /// Returns `None` once the broker has closed: either the registration
    /// itself is rejected because the request channel is already closed, or
    /// a registration that was already pending is woken with no value
    /// because the broker closed before it could be matched.
    pub async fn recv(&self) -> Option<Delivery> {
        let (response_tx, response_rx) = oneshot::channel();
        self.requests_tx.send(response_tx).await.ok()?;
        response_rx.await.ok()
    }
}
