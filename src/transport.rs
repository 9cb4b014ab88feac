use crate::protocol;
use crate::state::Trigger;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::{connect_async, tungstenite};

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    tungstenite::Message,
>;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The channel is not open: `open` has not succeeded yet, or the session
    /// was closed. Sends fail fast instead of queueing, so a lost connection
    /// is never hidden.
    #[error("not connected")]
    NotConnected,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
}

enum Link {
    Closed,
    Open(WsSink),
}

/// One long-lived duplex channel to the backend. Created once per client
/// lifetime and torn down once at shutdown; there is no reconnect.
pub struct TransportSession {
    link: Link,
}

impl TransportSession {
    pub fn new() -> Self {
        Self { link: Link::Closed }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.link, Link::Open(_))
    }

    /// Establish the channel and spawn the inbound reader. Parsed events are
    /// forwarded onto the trigger queue in the order the socket delivers
    /// them; this layer never buffers or reorders.
    pub async fn open(
        &mut self,
        url: &str,
        trigger_tx: UnboundedSender<Trigger>,
    ) -> Result<(), TransportError> {
        if self.is_open() {
            warn!("open called on an already-open session, ignoring");
            return Ok(());
        }

        info!("connecting to {}", url);
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        info!("websocket connected");

        let (ws_tx, mut ws_rx) = ws_stream.split();

        tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                let msg = match msg {
                    Ok(m) => m,
                    Err(e) => {
                        error!("websocket error: {}", e);
                        break;
                    }
                };

                let text = match msg {
                    tungstenite::Message::Text(t) => t,
                    tungstenite::Message::Close(frame) => {
                        if let Some(frame) = frame {
                            info!("websocket closed by server: {} {}", frame.code, frame.reason);
                        } else {
                            info!("websocket closed by server");
                        }
                        break;
                    }
                    // The backend only ever speaks JSON text frames; control
                    // frames are the library's business.
                    _ => continue,
                };

                match protocol::parse_event(&text) {
                    Ok(event) => {
                        debug!("inbound event: {:?}", event);
                        if trigger_tx.send(Trigger::Inbound(event)).is_err() {
                            break;
                        }
                    }
                    // Malformed or unrecognized frames are dropped here and
                    // never reach the conversation log.
                    Err(e) => warn!("dropping inbound frame: {}", e),
                }
            }
            let _ = trigger_tx.send(Trigger::ConnectionClosed);
        });

        self.link = Link::Open(ws_tx);
        Ok(())
    }

    /// Transmit one utterance as a single opaque binary frame. No
    /// fragmentation and no app-level ack; delivery confidence comes only
    /// from inbound events.
    pub async fn send(&mut self, buffer: Vec<u8>) -> Result<(), TransportError> {
        let sink = match &mut self.link {
            Link::Open(sink) => sink,
            Link::Closed => return Err(TransportError::NotConnected),
        };
        debug!("sending utterance: {} bytes", buffer.len());
        if let Err(e) = sink.send(tungstenite::Message::Binary(buffer.into())).await {
            // A failed sink is as good as closed; later sends fail fast.
            self.link = Link::Closed;
            return Err(TransportError::Send(e.to_string()));
        }
        Ok(())
    }

    /// Idempotent: closing a closed session is a no-op.
    pub async fn close(&mut self) {
        if let Link::Open(mut sink) = std::mem::replace(&mut self.link, Link::Closed) {
            let _ = sink.close().await;
            info!("websocket closed");
        }
    }
}
