//! `WebSocket` channel to the orchestrator.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{FrameChannel, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A live `WebSocket` connection, split into its read and write halves.
pub struct WsChannel {
    writer: SplitSink<WsStream, Message>,
    reader: SplitStream<WsStream>,
}

impl WsChannel {
    /// Perform the handshake with `url` (`ws://` or `wss://`).
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|source| TransportError::Connect {
                url: url.to_string(),
                source,
            })?;
        let (writer, reader) = ws.split();
        Ok(Self { writer, reader })
    }

    /// Send a normal close frame.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "closing".into(),
        };
        self.writer.send(Message::Close(Some(frame))).await?;
        Ok(())
    }
}

#[async_trait]
impl FrameChannel for WsChannel {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.reader.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(frame))) => return close_outcome(frame.as_ref()),
                // Ping/pong are answered by tungstenite; binary frames are not part of the protocol.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.writer.send(Message::Text(frame)).await?;
        Ok(())
    }
}

/// A close without a frame, with `Normal` or with `Away` ends the channel
/// cleanly; any other code is an error.
fn close_outcome(frame: Option<&CloseFrame<'_>>) -> Result<Option<String>, TransportError> {
    match frame.map(|f| f.code) {
        None | Some(CloseCode::Normal | CloseCode::Away) => Ok(None),
        Some(code) => Err(TransportError::Closed(u16::from(code))),
    }
}
