//! Named, best-effort publish/subscribe bus shared by every presentation window.
//!
//! A transport hands out one [`Channel`] per `open(topic)`. Channels never see
//! their own posts, deliver at most once, keep no history for late openers and
//! give no ordering guarantee across senders.

pub mod channel;
pub mod envelope;
pub mod spool;

use crate::session::{Identity, Role};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use channel::ChannelTransport;
pub use envelope::{ControlCommand, Envelope, Message, SlideSnapshot, SlideUpdate, SourceId};
pub use spool::{SpoolLimits, SpoolTransport};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    Auto,
    Channel,
    Spool,
}

pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;
    fn open(&self, topic: &str) -> Result<Box<dyn Channel>>;
}

pub trait Channel: Send {
    fn post(&mut self, envelope: &Envelope) -> Result<()>;
    /// Everything delivered since the previous drain, in arrival order.
    fn drain(&mut self) -> Result<Vec<Envelope>>;
    fn close(&mut self);
}

/// A window's subscription to one topic.
pub struct BusHandle {
    topic: String,
    identity: Identity,
    channel: Option<Box<dyn Channel>>,
}

impl BusHandle {
    pub fn open(transport: &dyn Transport, topic: &str, identity: Identity) -> Result<Self> {
        let channel = transport.open(topic)?;
        tracing::debug!(
            topic,
            source_id = %identity.source_id,
            role = ?identity.role,
            transport = ?transport.kind(),
            "bus topic opened"
        );
        Ok(Self {
            topic: topic.to_string(),
            identity,
            channel: Some(channel),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn source_id(&self) -> &SourceId {
        &self.identity.source_id
    }

    pub fn role(&self) -> Role {
        self.identity.role
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_none()
    }

    /// Fire-and-forget. Nothing is reported back to the caller.
    pub fn post(&mut self, message: Message) {
        self.post_envelope(Envelope::new(self.identity.source_id.clone(), message));
    }

    pub fn post_request(&mut self, message: Message, request_id: &str) {
        self.post_envelope(
            Envelope::new(self.identity.source_id.clone(), message).with_request_id(request_id),
        );
    }

    fn post_envelope(&mut self, envelope: Envelope) {
        if !self.identity.role.may_post(&envelope.message) {
            tracing::warn!(
                topic = %self.topic,
                role = ?self.identity.role,
                kind = envelope.message.kind(),
                "refusing to post authoritative message from non-source role"
            );
            return;
        }
        let Some(channel) = self.channel.as_mut() else {
            tracing::debug!(topic = %self.topic, kind = envelope.message.kind(), "post after close dropped");
            return;
        };
        if let Err(err) = channel.post(&envelope) {
            tracing::warn!(?err, topic = %self.topic, kind = envelope.message.kind(), "bus post failed");
        }
    }

    /// Hands every pending envelope to `on_message`. No-op once closed.
    pub fn pump<F>(&mut self, mut on_message: F)
    where
        F: FnMut(Envelope),
    {
        let Some(channel) = self.channel.as_mut() else {
            return;
        };
        match channel.drain() {
            Ok(envelopes) => envelopes.into_iter().for_each(&mut on_message),
            Err(err) => tracing::warn!(?err, topic = %self.topic, "bus receive failed"),
        }
    }

    pub fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
            tracing::debug!(topic = %self.topic, "bus topic closed");
        }
    }
}

impl Drop for BusHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusSettings {
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub spool_dir: Option<PathBuf>,
    /// A spool file past this size is compacted by the next post.
    #[serde(default = "default_spool_max_bytes")]
    pub spool_max_bytes: u64,
    /// How long a spooled record survives compaction.
    #[serde(default = "default_spool_retention_secs")]
    pub spool_retention_secs: u64,
}

fn default_spool_max_bytes() -> u64 {
    spool::DEFAULT_SPOOL_MAX_BYTES
}

fn default_spool_retention_secs() -> u64 {
    spool::DEFAULT_SPOOL_RETENTION.as_secs()
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            spool_dir: None,
            spool_max_bytes: default_spool_max_bytes(),
            spool_retention_secs: default_spool_retention_secs(),
        }
    }
}

impl BusSettings {
    pub fn spool_limits(&self) -> SpoolLimits {
        SpoolLimits {
            max_bytes: self.spool_max_bytes,
            retention: Duration::from_secs(self.spool_retention_secs),
        }
    }
}

/// Picks the transport at startup. `Auto` uses the spool when a spool
/// directory is configured and writable, the in-process channel otherwise.
pub fn select_transport(settings: &BusSettings) -> Result<Arc<dyn Transport>> {
    match settings.transport {
        TransportKind::Channel => Ok(Arc::new(channel::shared().clone())),
        TransportKind::Spool => {
            let dir = settings
                .spool_dir
                .clone()
                .unwrap_or_else(spool::default_spool_dir);
            Ok(Arc::new(SpoolTransport::new(dir)?.with_limits(settings.spool_limits())))
        }
        TransportKind::Auto => {
            let Some(dir) = settings.spool_dir.clone() else {
                return Ok(Arc::new(channel::shared().clone()));
            };
            match SpoolTransport::new(dir.clone()) {
                Ok(spool) => Ok(Arc::new(spool.with_limits(settings.spool_limits()))),
                Err(err) => {
                    tracing::warn!(
                        ?err,
                        dir = %dir.display(),
                        "spool transport unavailable; falling back to in-process channel"
                    );
                    Ok(Arc::new(channel::shared().clone()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::envelope::ControlCommand;

    fn handle(transport: &ChannelTransport, topic: &str, role: Role) -> BusHandle {
        BusHandle::open(transport, topic, Identity::new(role)).expect("open topic")
    }

    fn received(handle: &mut BusHandle) -> Vec<Envelope> {
        let mut out = Vec::new();
        handle.pump(|envelope| out.push(envelope));
        out
    }

    #[test]
    fn mirror_role_cannot_post_slide_state() {
        let transport = ChannelTransport::new();
        let mut mirror = handle(&transport, "session-1", Role::Mirror);
        let mut source = handle(&transport, "session-1", Role::Source);

        mirror.post(Message::Slide(crate::bus::SlideUpdate {
            index: 0,
            slide: crate::deck::Slide {
                id: "s".into(),
                kind: crate::deck::SlideKind::Cover,
                title: "t".into(),
                subtitle: None,
                number: None,
                documents: Vec::new(),
            },
            next_slide: None,
            total_slides: None,
            session_meta: None,
        }));
        mirror.post(Message::Control(ControlCommand::Next));

        let got = received(&mut source);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].message, Message::Control(ControlCommand::Next));
    }

    #[test]
    fn closed_handle_neither_posts_nor_receives() {
        let transport = ChannelTransport::new();
        let mut a = handle(&transport, "t", Role::Source);
        let mut b = handle(&transport, "t", Role::Mirror);

        b.post(Message::RequestInit {});
        a.close();
        assert!(a.is_closed());
        assert!(received(&mut a).is_empty());

        a.post(Message::RequestInit {});
        assert!(received(&mut b).is_empty());
    }

    #[test]
    fn auto_selection_without_spool_dir_uses_channel() {
        let transport = select_transport(&BusSettings::default()).expect("transport");
        assert_eq!(transport.kind(), TransportKind::Channel);
    }

    #[test]
    fn auto_selection_prefers_writable_spool_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        let transport = select_transport(&BusSettings {
            transport: TransportKind::Auto,
            spool_dir: Some(dir.path().to_path_buf()),
            ..BusSettings::default()
        })
        .expect("transport");
        assert_eq!(transport.kind(), TransportKind::Spool);
    }

    #[test]
    fn auto_selection_falls_back_when_spool_dir_is_unusable() {
        let dir = tempfile::tempdir().expect("temp dir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").expect("write blocker");

        let transport = select_transport(&BusSettings {
            transport: TransportKind::Auto,
            spool_dir: Some(blocker.join("spool")),
            ..BusSettings::default()
        })
        .expect("transport");
        assert_eq!(transport.kind(), TransportKind::Channel);
    }
}
