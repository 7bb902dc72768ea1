//! Wire messages: GraphQL-over-HTTP envelopes and `graphql-ws` frames.

use crate::error::{Result, WebstackError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a GraphQL POST request.
#[derive(Debug, Clone, Serialize)]
pub struct GraphRequestBody<'a> {
    /// Rendered document text.
    pub query: &'a str,
    /// Variables object (`{}` when the operation has no arguments).
    pub variables: &'a Value,
}

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphErrorEntry {
    /// Human readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Implementation specific extensions; the controller puts `errorCode` here.
    #[serde(default)]
    pub extensions: Option<Value>,
}

impl GraphErrorEntry {
    /// `extensions.errorCode`, if present.
    pub fn error_code(&self) -> Option<String> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.get("errorCode"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// A decoded GraphQL response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphEnvelope {
    /// Result data, absent when the whole operation failed.
    #[serde(default)]
    pub data: Option<Value>,
    /// Errors reported by the server.
    #[serde(default)]
    pub errors: Vec<GraphErrorEntry>,
}

impl GraphEnvelope {
    /// Decode an envelope from a response body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(WebstackError::Decode("empty GraphQL response".into()));
        }
        Ok(serde_json::from_slice(body)?)
    }

    /// Turn the envelope into its `data`, or the first reported error.
    pub fn into_data(self) -> Result<Value> {
        if let Some(first) = self.errors.first() {
            return Err(WebstackError::Graph {
                message: first
                    .message
                    .clone()
                    .unwrap_or_else(|| "unknown GraphQL error".to_string()),
                error_code: first.error_code(),
            });
        }
        self.data
            .ok_or_else(|| WebstackError::Decode("GraphQL response has no data".into()))
    }
}

/// Payload of a `start` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartPayload {
    /// Rendered subscription document.
    pub query: String,
    /// Variables object.
    #[serde(default)]
    pub variables: Value,
}

/// Frames of the `graphql-ws` protocol spoken on the subscription socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Client → server: open the session; carries the Authorization header.
    ConnectionInit {
        /// Frame payload, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Server → client: session accepted.
    ConnectionAck {
        /// Frame payload, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Server → client: session rejected.
    ConnectionError {
        /// Frame payload, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Server → client keep-alive.
    #[serde(rename = "ka")]
    KeepAlive,
    /// Client → server: start an operation.
    Start {
        /// Operation id chosen by the client.
        id: String,
        /// Document and variables.
        payload: StartPayload,
    },
    /// Client → server: stop an operation.
    Stop {
        /// Operation id.
        id: String,
    },
    /// Server → client: operation result, `{data}` or `{errors}`.
    Data {
        /// Operation id.
        id: String,
        /// GraphQL response object.
        payload: Value,
    },
    /// Server → client: operation failed.
    Error {
        /// Operation id.
        id: String,
        /// Error description.
        payload: Value,
    },
    /// Server → client: operation finished.
    Complete {
        /// Operation id.
        id: String,
    },
    /// Client → server: end the session.
    ConnectionTerminate,
}

impl WsMessage {
    /// Encode as a JSON text frame.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON text frame.
    pub fn from_text(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
