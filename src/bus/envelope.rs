//! Wire contract carried over the broadcast bus.
//!
//! Every envelope serializes to a flat JSON object:
//! `{"type": "...", "sourceId": "...", "requestId": "...", "payload": {...}}`.
//! `requestId` is omitted when absent.

use crate::deck::{SessionMeta, Slide};
use crate::draw::model::Stroke;
use rand::Rng;
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque per-window identifier used only for echo suppression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn generate() -> Self {
        let bytes: [u8; 8] = rand::thread_rng().gen();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-chosen correlation id for the two halves of a handshake.
pub fn new_request_id() -> String {
    let bytes: [u8; 6] = rand::thread_rng().gen();
    format!("req-{}", hex::encode(bytes))
}

/// Full state snapshot sent in reply to `request-init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideSnapshot {
    pub index: usize,
    pub slide: Slide,
    pub next_slide: Option<Slide>,
    pub total_slides: usize,
    pub session_meta: SessionMeta,
}

/// Per-transition update. Receivers keep their previous values for absent fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideUpdate {
    pub index: usize,
    pub slide: Slide,
    #[serde(default)]
    pub next_slide: Option<Slide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_slides: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_meta: Option<SessionMeta>,
}

impl From<SlideSnapshot> for SlideUpdate {
    fn from(snapshot: SlideSnapshot) -> Self {
        Self {
            index: snapshot.index,
            slide: snapshot.slide,
            next_slide: snapshot.next_slide,
            total_slides: Some(snapshot.total_slides),
            session_meta: Some(snapshot.session_meta),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ControlCommand {
    Next,
    Prev,
    Goto { index: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum Message {
    Init(SlideSnapshot),
    Slide(SlideUpdate),
    RequestInit {},
    Control(ControlCommand),
    PresenterWindowOpened {},
    PresenterWindowCloseRequest {},
    PresenterWindowClosed {},
    PresenterAlive {},
    DrawingStroke { stroke: Stroke },
    DrawingClear {},
    DrawingRequestState {},
    DrawingState { strokes: Vec<Stroke> },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Init(_) => "init",
            Message::Slide(_) => "slide",
            Message::RequestInit {} => "request-init",
            Message::Control(_) => "control",
            Message::PresenterWindowOpened {} => "presenter-window-opened",
            Message::PresenterWindowCloseRequest {} => "presenter-window-close-request",
            Message::PresenterWindowClosed {} => "presenter-window-closed",
            Message::PresenterAlive {} => "presenter-alive",
            Message::DrawingStroke { .. } => "drawing-stroke",
            Message::DrawingClear {} => "drawing-clear",
            Message::DrawingRequestState {} => "drawing-request-state",
            Message::DrawingState { .. } => "drawing-state",
        }
    }

    /// `slide` and `init` carry the canonical index and may only come from the source.
    pub fn is_authoritative(&self) -> bool {
        matches!(self, Message::Init(_) | Message::Slide(_))
    }

    /// The one exception to echo suppression: `drawing-clear` is applied even
    /// when it carries the receiver's own source id, so a clear that loops back
    /// through a relay still empties the issuer's canvas.
    pub fn bypasses_echo_suppression(&self) -> bool {
        matches!(self, Message::DrawingClear {})
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub source_id: SourceId,
    pub request_id: Option<String>,
    pub message: Message,
}

impl Envelope {
    pub fn new(source_id: SourceId, message: Message) -> Self {
        Self {
            source_id,
            request_id: None,
            message,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn is_echo_of(&self, own: &SourceId) -> bool {
        &self.source_id == own
    }

    /// Echo suppression with the `drawing-clear` exception applied.
    pub fn accepted_by(&self, own: &SourceId) -> bool {
        !self.is_echo_of(own) || self.message.bypasses_echo_suppression()
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut value = serde_json::to_value(&self.message).map_err(S::Error::custom)?;
        let Value::Object(map) = &mut value else {
            return Err(S::Error::custom("message did not serialize to an object"));
        };
        map.insert(
            "sourceId".to_string(),
            Value::String(self.source_id.as_str().to_string()),
        );
        if let Some(request_id) = &self.request_id {
            map.insert("requestId".to_string(), Value::String(request_id.clone()));
        }
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map = Map::deserialize(deserializer)?;
        let source_id = match map.remove("sourceId") {
            Some(Value::String(id)) => SourceId(id),
            Some(_) => return Err(D::Error::custom("sourceId must be a string")),
            None => return Err(D::Error::missing_field("sourceId")),
        };
        let request_id = match map.remove("requestId") {
            Some(Value::String(id)) => Some(id),
            Some(Value::Null) | None => None,
            Some(_) => return Err(D::Error::custom("requestId must be a string")),
        };
        // Payload-less messages (`request-init` and friends) may omit it entirely.
        map.entry("payload")
            .or_insert_with(|| Value::Object(Map::new()));
        let message = serde_json::from_value(Value::Object(map)).map_err(D::Error::custom)?;
        Ok(Self {
            source_id,
            request_id,
            message,
        })
    }
}
