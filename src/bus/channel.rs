use crate::bus::envelope::Envelope;
use crate::bus::{Channel, Transport, TransportKind};
use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

static SHARED_TRANSPORT: Lazy<ChannelTransport> = Lazy::new(ChannelTransport::new);

/// Process-wide transport, the analogue of an origin-scoped broadcast channel.
pub fn shared() -> &'static ChannelTransport {
    &SHARED_TRANSPORT
}

struct Subscriber {
    id: u64,
    tx: Sender<Envelope>,
}

type Registry = Arc<Mutex<HashMap<String, Vec<Subscriber>>>>;

/// In-process transport: every open channel gets its own mpsc queue and a
/// post fans out a clone to every other subscriber of the topic.
#[derive(Clone, Default)]
pub struct ChannelTransport {
    registry: Registry,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry
            .lock()
            .map(|registry| registry.get(topic).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl Transport for ChannelTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Channel
    }

    fn open(&self, topic: &str) -> Result<Box<dyn Channel>> {
        let id = NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = channel::<Envelope>();
        self.registry
            .lock()
            .map_err(|_| anyhow!("channel transport registry lock poisoned"))?
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, tx });
        Ok(Box::new(ChannelEndpoint {
            registry: Arc::clone(&self.registry),
            topic: topic.to_string(),
            id,
            rx,
        }))
    }
}

struct ChannelEndpoint {
    registry: Registry,
    topic: String,
    id: u64,
    rx: Receiver<Envelope>,
}

impl Channel for ChannelEndpoint {
    fn post(&mut self, envelope: &Envelope) -> Result<()> {
        let mut registry = self
            .registry
            .lock()
            .map_err(|_| anyhow!("channel transport registry lock poisoned"))?;
        if let Some(subscribers) = registry.get_mut(&self.topic) {
            subscribers.retain(|sub| sub.id == self.id || sub.tx.send(envelope.clone()).is_ok());
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<Vec<Envelope>> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(envelope) => out.push(envelope),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(out)
    }

    fn close(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            if let Some(subscribers) = registry.get_mut(&self.topic) {
                subscribers.retain(|sub| sub.id != self.id);
                if subscribers.is_empty() {
                    registry.remove(&self.topic);
                }
            }
        }
    }
}

impl Drop for ChannelEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}
