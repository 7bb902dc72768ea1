//! Protocol constants, header helpers and wire messages.
//!
//! - **[constants]** - Paths, header names, cookie names, WebSocket subprotocol
//! - **[headers]** - Authorization, locale, cookie and `Server` header helpers
//! - **[message]** - GraphQL-over-HTTP envelopes and `graphql-ws` frames

pub mod constants;
pub mod headers;
pub mod message;

pub use headers::*;
pub use message::{GraphEnvelope, GraphErrorEntry, GraphRequestBody, StartPayload, WsMessage};
