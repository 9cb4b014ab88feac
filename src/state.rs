use crate::protocol::ServerEvent;
use std::sync::atomic::AtomicBool;

/// Discrete triggers consumed by the client actor. Each trigger runs to
/// completion before the next is taken, which is what keeps all conversation
/// log mutations totally ordered without locking.
#[derive(Debug)]
pub enum Trigger {
    /// Push-to-talk engaged: begin a capture.
    StartCapture,
    /// Push-to-talk released: finalize, optimistically insert, transmit.
    StopCapture,
    /// One structured event from the backend, in socket arrival order.
    Inbound(ServerEvent),
    /// The duplex channel ended. Terminal for the session; no reconnect.
    ConnectionClosed,
    /// Ctrl-C: tear everything down.
    Shutdown,
}

/// Flags shared between the hotkey listener thread and the client actor.
pub struct AppState {
    /// Mirrors the recording state so the listener thread knows whether the
    /// next key press means start or stop.
    pub recording: AtomicBool,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            recording: AtomicBool::new(false),
        }
    }
}
