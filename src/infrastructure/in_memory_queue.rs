//! In-process topics for tests and single-process runs.
//!
//! [`topic`] returns a connected writer/reader pair over an unbounded channel.
//! The writer implements [`EventPublisher`] and the reader implements
//! [`EventConsumer`], so either end can stand in for a broker.

use crate::domain::events::DeferralEvent;
use crate::domain::ports::{EventConsumer, EventPublisher};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

/// Creates a connected writer/reader pair.
pub fn topic(name: impl Into<String>) -> (TopicWriter, TopicReader) {
    let (tx, rx) = mpsc::unbounded_channel();
    let name = name.into();
    (
        TopicWriter {
            name: name.clone(),
            tx,
        },
        TopicReader { name, rx },
    )
}

#[derive(Clone)]
pub struct TopicWriter {
    name: String,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl TopicWriter {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues a raw payload. Fails once the reader has been dropped.
    pub fn send_raw(&self, payload: Vec<u8>) -> Result<()> {
        self.tx
            .send(payload)
            .map_err(|_| GatewayError::PublishFailed(format!("topic {} is closed", self.name)))
    }

    pub fn send<T: Serialize>(&self, message: &T) -> Result<()> {
        self.send_raw(serde_json::to_vec(message)?)
    }
}

#[async_trait]
impl EventPublisher for TopicWriter {
    async fn publish_deferral(&self, event: &DeferralEvent) -> Result<()> {
        self.send(event)
    }
}

pub struct TopicReader {
    name: String,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl TopicReader {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a queued payload without waiting.
    pub fn try_receive(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }

    /// Drains every queued payload without waiting.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| self.try_receive()).collect()
    }
}

#[async_trait]
impl EventConsumer for TopicReader {
    async fn receive(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.rx.recv().await)
    }
}
