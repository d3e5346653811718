//! # ubroker
//!
//! An in-process message broker mediating publishers and a single logical
//! consumer, with acknowledge/re-queue semantics and a TTL-driven automatic
//! re-queue for deliveries a consumer never settles.
//!
//! [`Broker`] is the entry point. It owns no visible internals: every
//! operation is serialized through an internal actor task, so a `Broker`
//! handle is cheap to clone and safe to share across tasks.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//!
//! use tokio_util::sync::CancellationToken;
//! use ubroker::{Broker, BrokerConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ubroker::BrokerError> {
//! let broker = Broker::new(BrokerConfig::new(Duration::from_secs(5)));
//! let cancel = CancellationToken::new();
//!
//! broker.publish(b"hello".to_vec(), cancel.clone()).await?;
//!
//! let deliveries = broker.delivery(cancel.clone()).await?;
//! let delivery = deliveries.recv().await.expect("broker is open");
//! broker.acknowledge(delivery.id, cancel.clone()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Behavior
//! - Deliveries are handed out in FIFO order of publish/re-queue.
//! - A delivery stays in-flight until acknowledged, explicitly re-queued, or
//!   its TTL elapses, whichever comes first.
//! - Closing the broker is terminal: every operation after `close` returns
//!   [`BrokerError::Closed`].

mod broker;
mod command;
mod config;
mod core;
mod delivery_stream;
mod error;
mod message;

pub use broker::Broker;
pub use config::BrokerConfig;
pub use delivery_stream::DeliveryStream;
pub use error::{BrokerError, Result};
pub use message::{Delivery, Message};
