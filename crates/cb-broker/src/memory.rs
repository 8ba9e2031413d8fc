//! In-memory broker with consumer-group offsets.
//!
//! Backs tests and single-host deployments. Topics are append-only logs; each
//! `(topic, group)` pair tracks a committed offset shared by every connection
//! of the group. A connection remembers its own read position so repeated
//! polls advance, but positions beyond the committed offset are forgotten
//! when the connection closes, which is what redelivers unacknowledged
//! messages to the next connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{Instant, timeout_at};
use tracing::trace;

use crate::error::{BrokerError, BrokerResult};
use crate::{BrokerConnector, Message, MessageBroker};

#[derive(Default)]
struct BusState {
    logs: HashMap<String, Vec<Arc<[u8]>>>,
    committed: HashMap<(String, String), usize>,
}

/// Shared in-memory message bus. Cloning yields handles to the same topics.
#[derive(Clone, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<BusState>>,
    notify: Arc<Notify>,
}

impl MemoryBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed consumption offset for a `(topic, group)` pair.
    ///
    /// # Panics
    ///
    /// Panics if the bus mutex has been poisoned.
    #[must_use]
    pub fn committed(&self, topic: &str, group: &str) -> usize {
        let state = self.state.lock().expect("bus mutex poisoned");
        state
            .committed
            .get(&(topic.to_owned(), group.to_owned()))
            .copied()
            .unwrap_or(0)
    }

    /// Number of messages published to a topic so far.
    ///
    /// # Panics
    ///
    /// Panics if the bus mutex has been poisoned.
    #[must_use]
    pub fn topic_len(&self, topic: &str) -> usize {
        let state = self.state.lock().expect("bus mutex poisoned");
        state.logs.get(topic).map_or(0, Vec::len)
    }

    fn append(&self, topic: &str, payload: &[u8]) {
        {
            let mut state = self.state.lock().expect("bus mutex poisoned");
            state
                .logs
                .entry(topic.to_owned())
                .or_default()
                .push(Arc::from(payload));
        }
        self.notify.notify_waiters();
    }

    fn collect_from(&self, topic: &str, group: &str, position: Option<usize>) -> (Vec<Message>, usize) {
        let state = self.state.lock().expect("bus mutex poisoned");
        let committed = state
            .committed
            .get(&(topic.to_owned(), group.to_owned()))
            .copied()
            .unwrap_or(0);
        let start = position.map_or(committed, |pos| pos.max(committed));
        let log = state.logs.get(topic);
        let end = log.map_or(start, Vec::len);
        let messages = log.map_or_else(Vec::new, |entries| {
            entries[start.min(entries.len())..]
                .iter()
                .map(|payload| Message {
                    topic: topic.to_owned(),
                    payload: payload.to_vec(),
                })
                .collect()
        });
        (messages, end)
    }

    fn commit(&self, topic: &str, group: &str, offset: usize) {
        let mut state = self.state.lock().expect("bus mutex poisoned");
        let entry = state
            .committed
            .entry((topic.to_owned(), group.to_owned()))
            .or_insert(0);
        *entry = (*entry).max(offset);
    }
}

#[derive(Default)]
struct Session {
    positions: HashMap<(String, String), usize>,
    last_batch: Option<(String, String, usize)>,
    closed: bool,
}

/// One connection to a [`MemoryBus`].
pub struct MemoryBroker {
    bus: MemoryBus,
    session: Mutex<Session>,
}

impl MemoryBroker {
    /// Open a connection against the given bus.
    #[must_use]
    pub fn connect(bus: MemoryBus) -> Self {
        Self {
            bus,
            session: Mutex::new(Session::default()),
        }
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        let session = self.session.lock().expect("session mutex poisoned");
        if session.closed {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn send(&self, topic: &str, payload: &[u8]) -> BrokerResult<()> {
        self.ensure_open()?;
        self.bus.append(topic, payload);
        Ok(())
    }

    async fn read(
        &self,
        topic: &str,
        group: &str,
        timeout: Duration,
    ) -> BrokerResult<Vec<Message>> {
        self.ensure_open()?;
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.bus.notify.notified();
            tokio::pin!(notified);

            let position = {
                let session = self.session.lock().expect("session mutex poisoned");
                session
                    .positions
                    .get(&(topic.to_owned(), group.to_owned()))
                    .copied()
            };
            let (messages, end) = self.bus.collect_from(topic, group, position);
            if !messages.is_empty() {
                let mut session = self.session.lock().expect("session mutex poisoned");
                session
                    .positions
                    .insert((topic.to_owned(), group.to_owned()), end);
                session.last_batch = Some((topic.to_owned(), group.to_owned(), end));
                trace!(topic, group, count = messages.len(), "delivered batch");
                return Ok(messages);
            }

            if timeout_at(deadline, &mut notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn acknowledge(&self) -> BrokerResult<()> {
        self.ensure_open()?;
        let batch = {
            let session = self.session.lock().expect("session mutex poisoned");
            session.last_batch.clone()
        };
        if let Some((topic, group, offset)) = batch {
            self.bus.commit(&topic, &group, offset);
            trace!(topic, group, offset, "committed batch");
        }
        Ok(())
    }

    async fn close(&self) -> BrokerResult<()> {
        let mut session = self.session.lock().expect("session mutex poisoned");
        session.closed = true;
        session.positions.clear();
        session.last_batch = None;
        Ok(())
    }
}

/// Connector handing out fresh connections to one shared [`MemoryBus`].
#[derive(Clone, Default)]
pub struct MemoryConnector {
    bus: MemoryBus,
}

impl MemoryConnector {
    /// Build a connector around an existing bus.
    #[must_use]
    pub const fn new(bus: MemoryBus) -> Self {
        Self { bus }
    }

    /// The underlying bus, for test inspection.
    #[must_use]
    pub const fn bus(&self) -> &MemoryBus {
        &self.bus
    }
}

#[async_trait]
impl BrokerConnector for MemoryConnector {
    async fn connect(&self) -> BrokerResult<Box<dyn MessageBroker>> {
        Ok(Box::new(MemoryBroker::connect(self.bus.clone())))
    }
}
