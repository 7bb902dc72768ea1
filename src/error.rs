//! Error types for the webstack client.
//!
//! Every fallible operation in the crate returns [`Result<T>`], whose error is a
//! [`WebstackError`]. The taxonomy mirrors the layers of the client:
//!
//! | Variant | Raised by |
//! |---------|-----------|
//! | [`WebstackError::Schema`] | query builder, before any network activity |
//! | [`WebstackError::Transport`] | HTTP transport (unreachable, timeout, non-2xx) |
//! | [`WebstackError::Graph`] | GraphQL `errors` carried in a successful response |
//! | [`WebstackError::ChannelClosed`] | subscription closed by the caller |
//! | [`WebstackError::Channel`] | subscription closed unexpectedly |
//! | [`WebstackError::Auth`] | token exchange / credential handling |
//!
//! No layer retries on its own. [`WebstackError::is_retryable`] only classifies
//! errors so that callers can build their own policy.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WebstackError>;

/// Top-level client error.
#[derive(Debug, Error)]
pub enum WebstackError {
    /// A requested operation, argument or field is not in the schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The HTTP transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with GraphQL errors.
    #[error("GraphQL error: {message}")]
    Graph {
        /// First error message reported by the server.
        message: String,
        /// `extensions.errorCode` of the first error, e.g. `not-found`.
        error_code: Option<String>,
    },

    /// A REST endpoint reported an error or an unexpected status.
    #[error("API server error: {message}")]
    Api {
        /// Error message from the server, or a description of the unexpected status.
        message: String,
        /// `error_code` reported by the server, if any.
        error_code: Option<String>,
    },

    /// The subscription was closed by the caller.
    #[error("subscription channel closed")]
    ChannelClosed,

    /// The subscription connection failed or was closed by the server.
    #[error("subscription channel error: {0}")]
    Channel(String),

    /// Token exchange failed or a credential was required but missing.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The response could not be decoded.
    #[error("unexpected server response: {0}")]
    Decode(String),

    /// Invalid client configuration or call parameters.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Local I/O failure (e.g. writing a download to disk).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebstackError {
    /// Whether a caller-level retry has a chance of succeeding.
    ///
    /// Only transport-level hiccups and a handful of transient status codes qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            WebstackError::Transport(TransportError::Unreachable(_)) => true,
            WebstackError::Transport(TransportError::Timeout(_)) => true,
            WebstackError::Transport(TransportError::ServerError { status, .. }) => {
                crate::client::is_retryable_status(*status)
            }
            WebstackError::Channel(_) => true,
            _ => false,
        }
    }

    /// HTTP status of a `ServerError`, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            WebstackError::Transport(TransportError::ServerError { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for WebstackError {
    fn from(err: serde_json::Error) -> Self {
        WebstackError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for WebstackError {
    fn from(err: url::ParseError) -> Self {
        WebstackError::Config(format!("invalid URL: {}", err))
    }
}

impl From<http::Error> for WebstackError {
    fn from(err: http::Error) -> Self {
        WebstackError::Config(format!("invalid request: {}", err))
    }
}

impl From<http::header::InvalidHeaderValue> for WebstackError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        WebstackError::Config(format!("invalid header value: {}", err))
    }
}

/// Errors raised while validating a document against the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No root operation with this name exists for the operation kind.
    #[error("unknown {kind} operation '{name}'")]
    UnknownOperation {
        /// `query`, `mutation` or `subscription`.
        kind: String,
        /// Operation name as requested.
        name: String,
    },

    /// The operation does not declare this argument.
    #[error("operation '{operation}' has no argument '{argument}'")]
    UnknownArgument {
        /// Operation name.
        operation: String,
        /// Argument name as requested.
        argument: String,
    },

    /// A non-null argument was not supplied.
    #[error("operation '{operation}' requires argument '{argument}'")]
    MissingArgument {
        /// Operation name.
        operation: String,
        /// Missing argument name.
        argument: String,
    },

    /// Field does not exist on the parent type.
    #[error("type '{type_name}' has no field '{path}'")]
    UnknownField {
        /// Parent type name.
        type_name: String,
        /// Dotted path of the offending field.
        path: String,
    },

    /// Subfields were requested on a scalar or enum.
    #[error("field '{path}' of scalar type '{type_name}' cannot have subfields")]
    SubfieldsOnScalar {
        /// Dotted path of the offending field.
        path: String,
        /// The scalar type.
        type_name: String,
    },

    /// An object-typed field (or operation) was requested without any subfields.
    #[error("field '{path}' of type '{type_name}' needs an explicit selection")]
    EmptySelection {
        /// Dotted path of the field, or the operation name.
        path: String,
        /// The object type.
        type_name: String,
    },

    /// A type is referenced but never defined.
    #[error("type '{0}' is not defined in the schema")]
    UnknownType(String),

    /// An argument has the wrong shape for the requested operation (e.g. chunking
    /// over a value that is not a list).
    #[error("argument '{argument}' is invalid: {reason}")]
    InvalidArgument {
        /// Argument name.
        argument: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Failures of a single transport call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, reset, or otherwise failed before a response arrived.
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// The call did not complete within its timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-2xx status.
    #[error("server responded {status}: {body}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Fully captured response body.
        body: BodySnapshot,
    },
}

/// An eagerly captured response body.
///
/// The bytes are read off the network once; decoding can be attempted any number of
/// times with identical results.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct BodySnapshot(Bytes);

impl BodySnapshot {
    /// Wrap already received bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        BodySnapshot(bytes.into())
    }

    /// Raw body bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    /// Body as (lossy) UTF-8 text, trimmed.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0).trim().to_string()
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.0)?)
    }

    /// Number of captured bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the body was empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BodySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 256;
        let text = self.text();
        if text.len() > PREVIEW {
            let mut end = PREVIEW;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            write!(f, "{}...", &text[..end])
        } else {
            f.write_str(&text)
        }
    }
}

impl fmt::Debug for BodySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BodySnapshot").field(&self.text()).finish()
    }
}
