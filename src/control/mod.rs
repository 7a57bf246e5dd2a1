//! Outbound control events
//!
//! The router's control endpoints produce typed events for the owner of the
//! external frame source. Delivery is fire-and-forget over an unbounded
//! channel: the core never waits for acknowledgment and never learns the
//! resulting state.

use tokio::sync::mpsc;

/// A control command for the frame source's owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Toggle the video feed on/off
    ToggleVideo,
    /// Toggle the audio feed on/off
    ToggleAudio,
    /// Toggle the recording pipeline on/off
    ToggleRecording,
    /// Switch capture resolution to the named label (opaque to the core)
    ChangeResolution(String),
}

/// Receiving side handed to the embedding application
pub type ControlReceiver = mpsc::UnboundedReceiver<ControlEvent>;

/// Sending side held by the server's connection workers
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::UnboundedSender<ControlEvent>,
}

impl ControlSender {
    /// Emit an event without waiting for delivery
    ///
    /// A dropped receiver discards the event; the endpoint still answers ok.
    pub fn emit(&self, event: ControlEvent) {
        tracing::debug!(event = ?event, "Control event");
        if self.tx.send(event).is_err() {
            tracing::warn!("Control event dropped: receiver gone");
        }
    }
}

/// Create a connected sender/receiver pair
pub fn channel() -> (ControlSender, ControlReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControlSender { tx }, rx)
}
