//! Duplex transport to the orchestrator.
//!
//! One persistent connection carries request frames in and response frames
//! out, strictly in arrival order. The channel itself is abstracted behind
//! [`FrameChannel`] so the loop can be driven by the WebSocket client in
//! production and by an in-memory channel in tests.
//!
//! - [`websocket`]: `WsChannel`, a `tokio-tungstenite` client.
//! - [`event_loop`]: `TransportLoop`, the receive → dispatch → send cycle.

pub mod event_loop;
pub mod websocket;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub use event_loop::TransportLoop;
pub use websocket::WsChannel;

/// Connection state of the transport loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The peer sent a close frame with a non-normal code.
    #[error("connection closed by peer with code {0}")]
    Closed(u16),

    #[error("channel error: {0}")]
    Channel(String),
}

/// A bidirectional text frame channel.
#[async_trait]
pub trait FrameChannel: Send {
    /// Receive the next text frame. `Ok(None)` means the peer closed the
    /// channel cleanly.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;

    /// Send one text frame.
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;
}
