//! Helpers shared by the client operations.
//!
//! - Status code classification
//! - Expected statuses for the REST helper
//! - Extracting result items from an operation value

use crate::error::{Result, WebstackError};
use http::Method;
use serde_json::Value;

/// Whether a status code is worth retrying at the caller's discretion.
///
/// # Examples
///
/// ```
/// use webstack_client::client::is_retryable_status;
///
/// assert!(is_retryable_status(503));
/// assert!(!is_retryable_status(404));
/// ```
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429 | 502 | 503 | 504)
}

/// Whether a status code means the credential was rejected.
pub fn is_access_denied_status(status: u16) -> bool {
    matches!(status, 401 | 403)
}

/// Status a successful REST call answers with, per method.
///
/// | Method | Status |
/// |--------|--------|
/// | GET | 200 |
/// | POST | 201 |
/// | DELETE | 204 |
/// | PUT | 202 |
/// | PATCH | 201 |
pub fn expected_status_for(method: &Method) -> u16 {
    match *method {
        Method::POST | Method::PATCH => 201,
        Method::DELETE => 204,
        Method::PUT => 202,
        _ => 200,
    }
}

/// Result items of a list-returning operation value.
///
/// The value is either the list itself, or an object whose single list-valued field
/// (ignoring `meta` and `__typename`) holds the items. `null` yields nothing.
pub fn extract_items(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            map.remove("meta");
            map.remove("__typename");
            if map.is_empty() {
                return Ok(Vec::new());
            }
            let mut lists = map.into_iter().filter(|(_, v)| v.is_array() || v.is_null());
            match (lists.next(), lists.next()) {
                (Some((_, Value::Array(items))), None) => Ok(items),
                (Some((_, _)), None) => Ok(Vec::new()),
                (None, _) => Err(WebstackError::Decode(
                    "operation result has no list field".into(),
                )),
                (Some((first, _)), Some((second, _))) => Err(WebstackError::Decode(format!(
                    "operation result has several list fields ('{}', '{}')",
                    first, second
                ))),
            }
        }
        other => Err(WebstackError::Decode(format!(
            "expected a list of results, got {}",
            other
        ))),
    }
}
