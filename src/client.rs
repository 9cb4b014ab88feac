use crate::audio::Recorder;
use crate::conversation::{ConversationLog, Role};
use crate::settings::Settings;
use crate::state::{AppState, Trigger};
use crate::transport::{TransportError, TransportSession};
use chrono::Local;
use log::{debug, error, info, warn};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Content of the optimistic human turn until the STT result lands.
pub const PENDING_PLACEHOLDER: &str = "Transcribing...";

/// The session state machine. One instance per process; everything that
/// mutates the conversation log goes through `handle_trigger`, one trigger
/// at a time.
pub struct VoiceClient {
    settings: Settings,
    state: Arc<AppState>,
    log: ConversationLog,
    transport: TransportSession,
    recorder: Recorder,
}

impl VoiceClient {
    pub fn new(settings: Settings, state: Arc<AppState>) -> Self {
        Self {
            settings,
            state,
            log: ConversationLog::new(),
            transport: TransportSession::new(),
            recorder: Recorder::new(),
        }
    }

    /// Open the duplex channel. Called once at startup; a failure leaves the
    /// client running with sends failing fast as NotConnected.
    pub async fn connect(
        &mut self,
        trigger_tx: UnboundedSender<Trigger>,
    ) -> Result<(), TransportError> {
        self.transport
            .open(&self.settings.server_url, trigger_tx)
            .await
    }

    /// Consume the trigger queue until shutdown. Each trigger runs to
    /// completion before the next is taken, so log mutations never
    /// interleave.
    pub async fn run(&mut self, mut triggers: UnboundedReceiver<Trigger>) {
        while let Some(trigger) = triggers.recv().await {
            if !self.handle_trigger(trigger).await {
                break;
            }
        }
        self.teardown().await;
    }

    async fn handle_trigger(&mut self, trigger: Trigger) -> bool {
        match trigger {
            Trigger::StartCapture => self.start_capture(),
            Trigger::StopCapture => self.stop_capture().await,
            Trigger::Inbound(event) => {
                self.log.apply(&event);
                self.render();
            }
            Trigger::ConnectionClosed => {
                error!("connection to backend lost; no further events will arrive");
                self.transport.close().await;
                self.status("Disconnected");
            }
            Trigger::Shutdown => return false,
        }
        true
    }

    fn start_capture(&mut self) {
        if !self.transport.is_open() {
            // Capture may proceed, but the finalized buffer will have
            // nowhere to go.
            warn!("not connected; recording will not be transmitted");
        }
        match self.recorder.start(self.settings.mic_device()) {
            Ok(()) => {
                self.state.recording.store(true, Ordering::SeqCst);
                self.status("Recording... press Right Ctrl to stop");
            }
            Err(e) => {
                // Surfaced to the trigger source only; recoverable by
                // pressing again.
                self.state
                    .recording
                    .store(self.recorder.is_recording(), Ordering::SeqCst);
                error!("capture error: {}", e);
                info!("available inputs: {:?}", crate::audio::list_input_devices());
                self.status("Mic unavailable");
            }
        }
    }

    async fn stop_capture(&mut self) {
        self.state.recording.store(false, Ordering::SeqCst);
        let buffer = match self.recorder.stop() {
            Some(b) => b,
            // Stop while idle is a silent no-op.
            None => return,
        };
        self.finish_utterance(buffer).await;
    }

    /// The optimistic-insert half of the reconciliation contract: the
    /// pending turn goes into the log BEFORE the buffer is handed to the
    /// transport, so the transcript shows the utterance even if the send
    /// fails or no confirmation ever arrives.
    async fn finish_utterance(&mut self, buffer: Vec<u8>) {
        if self.log.has_pending() {
            debug!("superseding an utterance that was never confirmed");
        }
        self.log.push_pending(PENDING_PLACEHOLDER);
        self.render();

        match self.transport.send(buffer).await {
            Ok(()) => debug!("utterance sent"),
            Err(TransportError::NotConnected) => {
                error!("cannot send utterance: not connected");
                self.status("Not connected");
            }
            Err(e) => {
                error!("send failed: {}", e);
                self.status("Send failed");
            }
        }
    }

    /// Release the microphone and close the channel, whatever state either
    /// was in.
    async fn teardown(&mut self) {
        let _ = self.recorder.stop();
        self.state.recording.store(false, Ordering::SeqCst);
        self.transport.close().await;
        info!("session torn down");
    }

    /// Read-only projection of the log; nothing here mutates state.
    fn render(&self) {
        if self.log.is_empty() {
            return;
        }
        println!();
        println!("--- transcript {} ---", Local::now().format("%H:%M:%S"));
        for turn in self.log.turns() {
            let who = match turn.role {
                Role::Human => "you",
                Role::Assistant => "assistant",
            };
            if turn.pending {
                println!("  [{}] {} (pending)", who, turn.content);
            } else {
                println!("  [{}] {}", who, turn.content);
            }
        }
    }

    fn status(&self, text: &str) {
        println!("* {}", text);
    }

    #[cfg(test)]
    fn conversation(&self) -> &ConversationLog {
        &self.log
    }
}
