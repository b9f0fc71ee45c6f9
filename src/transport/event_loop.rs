//! The receive → dispatch → send loop.
//!
//! Frames are handled one at a time. A slow capability blocks every frame
//! queued behind it on the same channel; there is no pipelining and no
//! per-execution timeout.

use tokio_util::sync::CancellationToken;

use super::{ConnectionState, FrameChannel, TransportError, WsChannel};
use crate::dispatcher::Dispatcher;
use crate::protocol::{decode_frame, ExecutionRequest, ExecutionResponse, InboundFrame};

/// Serves execution requests arriving over one channel.
#[derive(Debug)]
pub struct TransportLoop {
    dispatcher: Dispatcher,
    state: ConnectionState,
}

impl TransportLoop {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connect to `url` and serve until the channel closes or `cancel` fires.
    ///
    /// Only the handshake failure is returned; errors after the channel is
    /// up are logged and end the loop.
    pub async fn connect_and_serve(
        &mut self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        let mut channel = WsChannel::connect(url).await?;
        log::info!("connected to orchestrator at {}", url);
        self.serve(&mut channel, cancel).await;
        if cancel.is_cancelled() {
            let _ = channel.close().await;
        }
        Ok(())
    }

    /// Serve frames from an established channel.
    pub async fn serve<C: FrameChannel>(&mut self, channel: &mut C, cancel: &CancellationToken) {
        self.state = ConnectionState::Connected;
        log::info!("transport loop {}", self.state);

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("closed by task cancellation");
                    break;
                }
                received = channel.recv() => received,
            };

            let raw = match received {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    log::info!("closed by connection closing");
                    break;
                }
                Err(e) => {
                    log::error!("unexpected error: {}", e);
                    break;
                }
            };

            // An in-flight execution is abandoned when the token fires.
            let handled = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::info!("closed by task cancellation");
                    break;
                }
                handled = self.handle_frame(&raw) => handled,
            };
            let Some(response) = handled else {
                continue;
            };

            if let Err(e) = channel.send(response).await {
                log::error!("unexpected error while sending response: {}", e);
                break;
            }
        }

        self.state = ConnectionState::Disconnected;
        log::info!("transport loop {}", self.state);
    }

    /// Process one raw frame and return the encoded response, if any.
    pub async fn handle_frame(&self, raw: &str) -> Option<String> {
        let response = match decode_frame(raw) {
            Ok(InboundFrame::UpstreamError(frame)) => {
                log::error!("received error message: {}", serde_json::Value::Object(frame));
                return None;
            }
            Ok(InboundFrame::Invalid {
                request_id,
                passthrough,
                reason,
            }) => {
                log::error!("message validation failed with error: {}", reason);
                ExecutionResponse::fail(request_id, passthrough, "message validation failed")
            }
            Ok(InboundFrame::Request {
                request,
                passthrough,
            }) => self.execute(request, passthrough).await,
            Err(e) => {
                log::error!("dropping frame: {}", e);
                return None;
            }
        };

        match response.encode() {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::error!("could not encode response: {}", e);
                None
            }
        }
    }

    async fn execute(
        &self,
        request: ExecutionRequest,
        passthrough: serde_json::Map<String, serde_json::Value>,
    ) -> ExecutionResponse {
        let ExecutionRequest {
            request_id,
            system_name,
            action_name,
            input_data,
            system_authorization_data,
        } = request;

        let outcome = self
            .dispatcher
            .execute(
                &system_name,
                &action_name,
                &input_data,
                system_authorization_data.as_ref(),
            )
            .await;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                log::error!("request {} failed: {}", request_id, e);
                let message = self
                    .dispatcher
                    .form_result_message(&system_name, &action_name, None)
                    .ok()
                    .flatten();
                return ExecutionResponse::fail(request_id, passthrough, e.public_message())
                    .with_message(message);
            }
        };

        match self
            .dispatcher
            .form_result_message(&system_name, &action_name, Some(&result))
        {
            Ok(message) => ExecutionResponse::success(request_id, passthrough, result, message),
            Err(e) => {
                log::error!("request {} failed: {}", request_id, e);
                ExecutionResponse::fail(request_id, passthrough, e.public_message())
            }
        }
    }
}
