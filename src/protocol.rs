//! Wire frames exchanged with the orchestrator.
//!
//! Inbound request frame:
//!
//! ```json
//! {"request_id": "r1", "system_name": "General", "action_name": "weather_action",
//!  "input_data": {"city": "Kazan"}, "system_authorization_data": null}
//! ```
//!
//! Outbound response frames echo every top-level field of the request frame
//! and then set `request_id`, `status` and, when present, `message_str`,
//! `message_dict`, `result` and `error_message`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::capabilities::{AuthContext, ResultMessage};

/// Decoded execution request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub request_id: String,
    pub system_name: String,
    pub action_name: String,
    pub input_data: Map<String, Value>,
    #[serde(default)]
    pub system_authorization_data: Option<AuthContext>,
}

/// Outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultStatus {
    Success,
    Fail,
}

/// Classification of a raw inbound frame.
#[derive(Debug)]
pub enum InboundFrame {
    /// The orchestrator reported an error; nothing is sent back.
    UpstreamError(Map<String, Value>),
    Request {
        request: ExecutionRequest,
        passthrough: Map<String, Value>,
    },
    /// Well-formed JSON object that is not a valid request but carries a
    /// recoverable correlation id.
    Invalid {
        request_id: String,
        passthrough: Map<String, Value>,
        reason: String,
    },
}

/// Frame that cannot be answered at all.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("invalid request without a recoverable request_id: {0}")]
    Unrecoverable(String),
}

/// Parse and classify a raw text frame.
pub fn decode_frame(raw: &str) -> Result<InboundFrame, FrameError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(frame) = value else {
        return Err(FrameError::NotAnObject);
    };

    if frame.contains_key("error") {
        return Ok(InboundFrame::UpstreamError(frame));
    }

    match serde_json::from_value::<ExecutionRequest>(Value::Object(frame.clone())) {
        Ok(request) => Ok(InboundFrame::Request {
            request,
            passthrough: frame,
        }),
        Err(e) => match frame.get("request_id").and_then(Value::as_str) {
            Some(id) => Ok(InboundFrame::Invalid {
                request_id: id.to_string(),
                reason: e.to_string(),
                passthrough: frame,
            }),
            None => Err(FrameError::Unrecoverable(e.to_string())),
        },
    }
}

/// Response frame under construction.
#[derive(Debug, Clone)]
pub struct ExecutionResponse {
    pub request_id: String,
    pub status: ResultStatus,
    pub message: Option<ResultMessage>,
    pub result: Option<Map<String, Value>>,
    pub error_message: Option<String>,
    /// Top-level fields of the originating frame, echoed unchanged.
    pub passthrough: Map<String, Value>,
}

impl ExecutionResponse {
    pub fn success(
        request_id: impl Into<String>,
        passthrough: Map<String, Value>,
        result: Map<String, Value>,
        message: Option<ResultMessage>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            status: ResultStatus::Success,
            message,
            result: Some(result),
            error_message: None,
            passthrough,
        }
    }

    pub fn fail(
        request_id: impl Into<String>,
        passthrough: Map<String, Value>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            status: ResultStatus::Fail,
            message: None,
            result: None,
            error_message: Some(error_message.into()),
            passthrough,
        }
    }

    pub fn with_message(mut self, message: Option<ResultMessage>) -> Self {
        self.message = message;
        self
    }

    /// Flatten into the outbound JSON object.
    pub fn into_frame(self) -> Map<String, Value> {
        let mut frame = self.passthrough;
        if let Some(message) = self.message {
            frame.insert("message_str".into(), Value::String(message.display_text));
            frame.insert("message_dict".into(), message.structured_echo);
        }
        frame.insert("request_id".into(), Value::String(self.request_id));
        frame.insert(
            "status".into(),
            serde_json::to_value(self.status).unwrap_or(Value::Null),
        );
        if let Some(result) = self.result {
            frame.insert("result".into(), Value::Object(result));
        }
        if let Some(error) = self.error_message {
            frame.insert("error_message".into(), Value::String(error));
        }
        frame
    }

    pub fn encode(self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Value::Object(self.into_frame()))
    }
}
