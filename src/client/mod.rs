//! Controller WebAPI client.
//!
//! This module provides the client that executes documents built by the
//! [`query`](crate::query) module, enabling callers to:
//!
//! - **Run queries and mutations** through a pooled transport
//! - **Split large-collection queries** into sequential bounded chunks
//! - **Page through list queries** with `options {offset, first}`
//! - **Subscribe to pushed updates** over a dedicated WebSocket
//! - **Stream downloads** without buffering the whole payload
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── fetch        - WebstackClient and its operations
//! ├── chunked      - ChunkPlan and the merged chunk stream
//! ├── paged        - Offset paging stream
//! ├── subscription - graphql-ws subscriptions
//! ├── config       - Client configuration
//! └── utils        - Status classification and result extraction
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`WebstackClient`] | Main client |
//! | [`ClientConfig`] | Client configuration options |
//! | [`ChunkPlan`] | Ordered chunk documents for one list argument |
//! | [`ChunkedResults`] | Lazy merged stream of chunk results |
//! | [`PagedResults`] | Lazy stream over offset pages |
//! | [`SubscriptionHandle`] | One open subscription |
//!
//! # Examples
//!
//! ## Creating a Client
//!
//! ```
//! use webstack_client::client::{ClientConfig, WebstackClient};
//! use webstack_client::Endpoint;
//!
//! let config = ClientConfig {
//!     endpoint: Endpoint::unix("/tmp/ctrl.sock"),
//!     pool_size: 2,
//!     ..Default::default()
//! };
//! let client = WebstackClient::new(config).unwrap();
//! assert_eq!(client.pool_stats().unwrap().size, 2);
//! ```
//!
//! ## Utility Functions
//!
//! ```
//! use webstack_client::client::{expected_status_for, is_retryable_status};
//! use http::Method;
//!
//! assert!(is_retryable_status(503));
//! assert_eq!(expected_status_for(&Method::DELETE), 204);
//! ```

mod chunked;
mod config;
mod fetch;
mod paged;
mod subscription;
mod utils;

pub use chunked::{ChunkCanceller, ChunkPlan, ChunkedResults};
pub use config::ClientConfig;
pub use fetch::WebstackClient;
pub use paged::{PagedResults, OPTIONS_ARGUMENT};
pub use subscription::{SubscriptionCloser, SubscriptionHandle};
pub use utils::*;
