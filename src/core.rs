//! The broker's single-actor state machine.
//!
//! `Core` owns the published queue, the in-flight table, the id allocator,
//! and the outbound request channel. It is never shared: a single
//! `tokio::spawn`ed task drives it via [`Core::run`], and every mutation
//! arrives serialized through the mailbox.

use std::collections::{HashMap, VecDeque};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

use crate::command::Command;
use crate::config::BrokerConfig;
use crate::delivery_stream::DeliveryStream;
use crate::error::BrokerError;
use crate::message::{Delivery, Message, SequenceCounter};

pub(crate) struct Core {
    ttl: std::time::Duration,
    closed: bool,
    published: VecDeque<Delivery>,
    in_flight: HashMap<u64, Delivery>,
    /// Consumers that have registered for a delivery but have not yet been
    /// matched with one, oldest first.
    waiting: VecDeque<oneshot::Sender<Delivery>>,
    seq: SequenceCounter,
    mailbox_rx: mpsc::Receiver<Command>,
    /// Retained only while the broker is open, so that new TTL timers can be
    /// spawned on hand-off. Dropped on close: no further hand-offs occur
    /// once the request channel is closed, so no further timers are needed.
    mailbox_tx: Option<mpsc::Sender<Command>>,
    /// Template clone handed out to every `DeliveryStream` returned by
    /// `ObtainDelivery`. Cloning it never fails even once `requests_rx` is
    /// gone; only an actual `send` on a clone observes that.
    requests_tx: mpsc::Sender<oneshot::Sender<Delivery>>,
    /// Dropped on close so that registering (or already holding) a request
    /// observably fails, closing the outbound path immediately.
    requests_rx: Option<mpsc::Receiver<oneshot::Sender<Delivery>>>,
}

impl Core {
    pub(crate) fn new(
        config: &BrokerConfig,
        mailbox_tx: mpsc::Sender<Command>,
        mailbox_rx: mpsc::Receiver<Command>,
    ) -> Self {
        let (requests_tx, requests_rx) = mpsc::channel(config.request_capacity.max(1));
        Self {
            ttl: config.ttl,
            closed: false,
            published: VecDeque::new(),
            in_flight: HashMap::new(),
            waiting: VecDeque::new(),
            seq: SequenceCounter::default(),
            mailbox_rx,
            mailbox_tx: Some(mailbox_tx),
            requests_tx,
            requests_rx: Some(requests_rx),
        }
    }

    /// Drive the state machine until the mailbox drains after close.
    pub(crate) async fn run(mut self) {
        loop {
            if self.closed {
                if !self.closed_tick().await {
                    return;
                }
                continue;
            }

            self.try_match();
            self.tick().await;
        }
    }

    /// Pair waiting consumers with queued deliveries one at a time.
    ///
    /// A delivery leaves the published queue only once a waiting consumer's
    /// one-shot reply actually succeeds; nothing is ever buffered ahead of a
    /// waiting consumer, which is what makes the hand-off a true rendezvous
    /// rather than a one-slot buffer.
    fn try_match(&mut self) {
        loop {
            let Some(waiting) = self.waiting.pop_front() else {
                return;
            };
            let Some(head) = self.published.front().cloned() else {
                self.waiting.push_front(waiting);
                return;
            };
            match waiting.send(head) {
                Ok(()) => {
                    let accepted = self.published.pop_front().expect("head was just peeked");
                    self.spawn_ttl_requeue(accepted.id);
                    self.in_flight.insert(accepted.id, accepted);
                }
                Err(_) => {
                    // This consumer's `recv` future was dropped (e.g.
                    // cancelled) before the hand-off completed, so the
                    // delivery was never actually received. The queue is
                    // untouched; try the next waiting consumer, if any,
                    // against the same still-queued head.
                }
            }
        }
    }

    /// One iteration of the open posture once matching has no pairs left to
    /// make: race a new mailbox command against a new consumer registration.
    async fn tick(&mut self) {
        let requests_rx = self
            .requests_rx
            .as_mut()
            .expect("request channel is live while open");

        tokio::select! {
            command = self.mailbox_rx.recv() => {
                match command {
                    Some(command) => self.handle_command(command),
                    // Unreachable while open: `self.mailbox_tx` is a live
                    // sender clone until `close` runs, so the channel never
                    // observes end-of-stream before then. Handled rather
                    // than matched irrefutably so the loop stays correct if
                    // that invariant ever changes.
                    None => self.closed = true,
                }
            }
            request = requests_rx.recv() => {
                if let Some(response_tx) = request {
                    self.waiting.push_back(response_tx);
                }
                // `None` means every `DeliveryStream` clone has been
                // dropped; harmless, the broker just has no one registered
                // to deliver to right now.
            }
        }
    }

    /// One iteration of the closed posture: service the mailbox until it
    /// drains. Returns `false` once the mailbox is exhausted.
    async fn closed_tick(&mut self) -> bool {
        match self.mailbox_rx.recv().await {
            Some(command) => {
                self.handle_command_closed(command);
                true
            }
            None => false,
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::ObtainDelivery { response_tx } => {
                trace!("obtain-delivery");
                let _ = response_tx.send(Ok(DeliveryStream::new(self.requests_tx.clone())));
            }
            Command::Publish { message, response_tx } => {
                let id = self.publish(message);
                debug!(id, "published");
                let _ = response_tx.send(Ok(()));
            }
            Command::Acknowledge { id, response_tx } => {
                let result = self.acknowledge(id);
                debug!(id, ok = result.is_ok(), "acknowledge");
                let _ = response_tx.send(result);
            }
            Command::ReQueue { id, response_tx } => {
                let result = self.requeue(id);
                debug!(id, ok = result.is_ok(), "requeue");
                let _ = response_tx.send(result);
            }
            Command::Close { response_tx } => {
                self.close();
                let _ = response_tx.send(Ok(()));
            }
        }
    }

    fn handle_command_closed(&mut self, command: Command) {
        match command {
            Command::ObtainDelivery { response_tx } => {
                let _ = response_tx.send(Err(BrokerError::Closed));
            }
            Command::Publish { response_tx, .. } => {
                let _ = response_tx.send(Err(BrokerError::Closed));
            }
            Command::Acknowledge { id, response_tx } => {
                trace!(id, "acknowledge on closed broker");
                let _ = response_tx.send(Err(BrokerError::Closed));
            }
            Command::ReQueue { id, response_tx } => {
                trace!(id, "requeue on closed broker");
                let _ = response_tx.send(Err(BrokerError::Closed));
            }
            Command::Close { response_tx } => {
                let _ = response_tx.send(Ok(()));
            }
        }
    }

    fn publish(&mut self, message: Message) -> u64 {
        let id = self.seq.next();
        self.published.push_back(Delivery::new(id, message));
        id
    }

    fn acknowledge(&mut self, id: u64) -> Result<(), BrokerError> {
        self.in_flight
            .remove(&id)
            .map(|_| ())
            .ok_or(BrokerError::InvalidId { id })
    }

    fn requeue(&mut self, id: u64) -> Result<(), BrokerError> {
        let delivery = self
            .in_flight
            .remove(&id)
            .ok_or(BrokerError::InvalidId { id })?;
        self.publish(delivery.message);
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        info!("broker closing");
        self.closed = true;
        self.mailbox_tx = None;
        // Dropping the receiving half now (rather than waiting for `self`
        // to drop) makes a fresh `recv` registration fail immediately, and
        // wakes every consumer already registered in `waiting` with an
        // error instead of letting it stall forever.
        self.requests_rx = None;
        self.waiting.clear();
    }

    /// Spawn a tokio task that sleeps for the configured TTL, then posts a
    /// best-effort re-queue command through the mailbox. The command's reply
    /// is discarded: both possible errors (`InvalidId`, `Closed`) represent
    /// the consumer having won the race, or the broker having shut down.
    fn spawn_ttl_requeue(&self, id: u64) {
        let Some(mailbox_tx) = self.mailbox_tx.clone() else {
            return;
        };
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let (response_tx, response_rx) = oneshot::channel();
            if mailbox_tx
                .send(Command::ReQueue { id, response_tx })
                .await
                .is_err()
            {
                // Mailbox is gone; broker has shut down entirely.
                return;
            }
            match response_rx.await {
                Ok(Ok(())) => trace!(id, "ttl auto-requeue applied"),
                Ok(Err(_)) => trace!(id, "ttl auto-requeue discarded: already settled or closed"),
                Err(_) => trace!(id, "ttl auto-requeue reply dropped"),
            }
        });
    }
}
