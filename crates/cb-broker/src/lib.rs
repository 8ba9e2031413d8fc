#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Message broker abstraction connecting the control client and schedulers.
//!
//! The core only consumes a generic publish/consume/acknowledge contract; the
//! production transport (Kafka or similar) is an external deployment concern.
//! This crate defines the [`MessageBroker`] trait, the [`BrokerConnector`]
//! factory used to recreate connections after transport errors, topic naming,
//! and an in-memory bus with consumer-group semantics for tests and
//! single-host deployments.

use std::time::Duration;

use async_trait::async_trait;

pub mod error;
pub mod memory;
pub mod topics;

pub use error::{BrokerError, BrokerResult};
pub use memory::{MemoryBroker, MemoryBus, MemoryConnector};

/// One message consumed from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Topic the message was read from.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// Connection to a topic-based publish/consume/acknowledge transport.
///
/// Consumption is at-least-once: a message's effects must be durably applied
/// before [`MessageBroker::acknowledge`] commits it, and messages read but
/// never acknowledged are redelivered to the next connection of the same
/// consumer group.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish a message to `topic`. Best effort; no delivery acknowledgement
    /// beyond transport-level success.
    ///
    /// # Errors
    ///
    /// Returns a [`BrokerError`] when the connection is closed or the
    /// transport rejects the publish.
    async fn send(&self, topic: &str, payload: &[u8]) -> BrokerResult<()>;

    /// Poll `topic` as a member of consumer group `group`, blocking for up to
    /// `timeout` of inactivity. Returns whatever arrived within the window;
    /// an empty batch means the topic stayed quiet.
    ///
    /// # Errors
    ///
    /// Returns a [`BrokerError`] when the connection is closed or the
    /// transport fails mid-poll; callers close this instance and reconnect.
    async fn read(
        &self,
        topic: &str,
        group: &str,
        timeout: Duration,
    ) -> BrokerResult<Vec<Message>>;

    /// Commit the consumption offset for the most recently read batch.
    ///
    /// # Errors
    ///
    /// Returns a [`BrokerError`] when the connection is closed or the commit
    /// does not reach the transport.
    async fn acknowledge(&self) -> BrokerResult<()>;

    /// Release the underlying connection. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a [`BrokerError`] when the transport fails to release the
    /// connection cleanly.
    async fn close(&self) -> BrokerResult<()>;
}

/// Factory for broker connections.
///
/// Connectivity errors are not retried on a live connection: callers close
/// the broken instance and connect again through this trait.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Open a fresh broker connection.
    ///
    /// # Errors
    ///
    /// Returns a [`BrokerError`] when the transport is unreachable.
    async fn connect(&self) -> BrokerResult<Box<dyn MessageBroker>>;
}
