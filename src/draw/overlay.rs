//! Peer replication of freehand annotation strokes.
//!
//! Every window that shows an annotation layer runs one [`DrawingOverlay`]
//! on the session's drawing topic. There is no owner: any peer may append
//! or clear, and each peer's canvas is a projection of its own log.

use crate::bus::envelope::new_request_id;
use crate::bus::{BusHandle, Envelope, Message};
use crate::draw::input::StrokeCapture;
use crate::draw::model::{CanvasSize, Color, DrawingLog, Stroke};
use crate::draw::render::DrawingCanvas;
use std::collections::VecDeque;

/// How many answered snapshot request ids a peer remembers.
const ANSWERED_REQUEST_MEMORY: usize = 32;

pub struct DrawingOverlay {
    handle: BusHandle,
    log: DrawingLog,
    canvas: DrawingCanvas,
    capture: StrokeCapture,
    pending_request: Option<String>,
    received_initial_state: bool,
    answered_requests: VecDeque<String>,
}

impl DrawingOverlay {
    pub fn new(handle: BusHandle, size: CanvasSize) -> Self {
        let capture = StrokeCapture::new(handle.source_id().clone());
        Self {
            handle,
            log: DrawingLog::default(),
            canvas: DrawingCanvas::new(size),
            capture,
            pending_request: None,
            received_initial_state: false,
            answered_requests: VecDeque::new(),
        }
    }

    /// Late-joiner handshake: asks existing peers for their strokes.
    pub fn attach(&mut self) {
        let request_id = new_request_id();
        tracing::debug!(topic = self.handle.topic(), %request_id, "requesting drawing state");
        self.handle
            .post_request(Message::DrawingRequestState {}, &request_id);
        self.pending_request = Some(request_id);
        self.received_initial_state = false;
    }

    pub fn log(&self) -> &DrawingLog {
        &self.log
    }

    pub fn canvas(&self) -> &DrawingCanvas {
        &self.canvas
    }

    pub fn has_received_initial_state(&self) -> bool {
        self.received_initial_state
    }

    pub fn is_eraser(&self) -> bool {
        self.capture.is_eraser()
    }

    pub fn toggle_eraser(&mut self) -> bool {
        self.capture.toggle_eraser()
    }

    pub fn set_style(&mut self, color: Color, width: u32) {
        self.capture.set_style(color, width);
    }

    pub fn start_stroke(&mut self, point: (f64, f64)) {
        self.capture.start_stroke(point);
    }

    pub fn extend_stroke(&mut self, point: (f64, f64)) {
        self.capture.extend_stroke(point);
    }

    /// Appends and broadcasts the stroke. Strokes under two points are
    /// dropped here and never reach the log or the wire.
    pub fn commit_stroke(&mut self) -> Option<Stroke> {
        let stroke = self.capture.commit_stroke(self.canvas.size())?;
        if !self.log.append(stroke.clone()) {
            return None;
        }
        self.redraw();
        self.handle.post(Message::DrawingStroke {
            stroke: stroke.clone(),
        });
        Some(stroke)
    }

    pub fn clear(&mut self) {
        tracing::debug!(strokes = self.log.len(), "clearing drawing for all peers");
        self.log.clear();
        self.redraw();
        self.handle.post(Message::DrawingClear {});
    }

    /// Reallocates the canvas, replays the log from normalized points and
    /// re-arms the one-shot snapshot guard.
    pub fn resize(&mut self, size: CanvasSize) {
        self.canvas.resize(size);
        self.redraw();
        self.received_initial_state = false;
    }

    /// Applies everything pending. Returns whether the canvas was redrawn.
    pub fn pump(&mut self) -> bool {
        let mut inbox = Vec::new();
        self.handle.pump(|envelope| inbox.push(envelope));
        let mut redrawn = false;
        for envelope in inbox {
            redrawn |= self.handle_envelope(envelope);
        }
        redrawn
    }

    fn handle_envelope(&mut self, envelope: Envelope) -> bool {
        // `drawing-clear` passes this check even from ourselves.
        if !envelope.accepted_by(self.handle.source_id()) {
            tracing::trace!(kind = envelope.message.kind(), "suppressed own echo");
            return false;
        }
        match envelope.message {
            Message::DrawingStroke { stroke } => {
                if !stroke.is_well_formed() {
                    tracing::warn!(
                        source = %envelope.source_id,
                        stroke = %stroke.id,
                        "dropping malformed drawing stroke"
                    );
                    return false;
                }
                if self.log.append(stroke) {
                    self.redraw();
                    true
                } else {
                    false
                }
            }
            Message::DrawingClear {} => {
                self.log.clear();
                self.redraw();
                true
            }
            Message::DrawingRequestState {} => {
                self.answer_state_request(envelope.request_id);
                false
            }
            Message::DrawingState { strokes } => {
                self.accept_state(envelope.request_id.as_deref(), strokes)
            }
            other => {
                tracing::trace!(kind = other.kind(), "drawing overlay ignores message");
                false
            }
        }
    }

    fn answer_state_request(&mut self, request_id: Option<String>) {
        let Some(request_id) = request_id else {
            tracing::debug!("drawing state request without request id ignored");
            return;
        };
        if self.log.is_empty() || self.answered_requests.contains(&request_id) {
            return;
        }
        if self.answered_requests.len() == ANSWERED_REQUEST_MEMORY {
            self.answered_requests.pop_front();
        }
        self.answered_requests.push_back(request_id.clone());
        tracing::debug!(%request_id, strokes = self.log.len(), "answering drawing state request");
        self.handle.post_request(
            Message::DrawingState {
                strokes: self.log.strokes().to_vec(),
            },
            &request_id,
        );
    }

    fn accept_state(&mut self, request_id: Option<&str>, strokes: Vec<Stroke>) -> bool {
        let ours = request_id.is_some() && request_id == self.pending_request.as_deref();
        if !ours || self.received_initial_state {
            tracing::debug!(?request_id, "ignoring drawing state reply");
            return false;
        }
        self.received_initial_state = true;
        let total = strokes.len();
        let strokes: Vec<Stroke> = strokes.into_iter().filter(Stroke::is_well_formed).collect();
        if strokes.len() < total {
            tracing::warn!(
                dropped = total - strokes.len(),
                "drawing state reply carried malformed strokes"
            );
        }
        let added = self.log.merge(strokes);
        tracing::debug!(added, "drawing state accepted");
        if added > 0 {
            self.redraw();
        }
        added > 0
    }

    fn redraw(&mut self) {
        self.canvas.replay(&self.log);
    }

    pub fn close(&mut self) {
        self.handle.close();
    }
}
