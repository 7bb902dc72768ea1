//! Shared header parsing and formatting for the controller WebAPI.
//!
//! # Header Formats
//!
//! | Header | Format | Example |
//! |--------|--------|---------|
//! | Authorization (basic) | `Basic base64(user:password)` | `Basic bXVqaW46bXVqaW4=` |
//! | Authorization (token) | `Bearer {token}` | `Bearer eyJhbGciOi...` |
//! | Accept-Language | lowercase language tag | `en-us`, `ja-jp` |
//! | Set-Cookie | `{name}={value}; attributes` | `jwttoken=abc; Path=/` |
//! | Server | product token first | `webstack/1.2.3 linux` |
//!
//! # Examples
//!
//! ```
//! use webstack_client::protocol::{
//!     format_basic_auth, format_bearer_auth, language_from_locale, parse_cookie,
//! };
//!
//! assert_eq!(format_basic_auth("mujin", "mujin"), "Basic bXVqaW46bXVqaW4=");
//! assert_eq!(format_bearer_auth("abc"), "Bearer abc");
//! assert_eq!(language_from_locale(Some("en_US.UTF-8")), "en-us");
//! assert_eq!(parse_cookie("jwttoken=abc; Path=/", "jwttoken").as_deref(), Some("abc"));
//! ```

use super::constants::DEFAULT_LANGUAGE;
use base64::Engine;

/// Format a Basic `Authorization` header value.
///
/// # Examples
///
/// ```
/// use webstack_client::protocol::format_basic_auth;
///
/// assert_eq!(format_basic_auth("user", "pass"), "Basic dXNlcjpwYXNz");
/// ```
pub fn format_basic_auth(username: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", username, password).as_bytes());
    format!("Basic {}", encoded)
}

/// Format a Bearer `Authorization` header value.
#[inline]
pub fn format_bearer_auth(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Convert a POSIX locale into an `Accept-Language` value.
///
/// The encoding suffix is dropped, underscores become dashes and the result is
/// lowercased. Missing or empty locales fall back to `en`.
///
/// | Locale | Result |
/// |--------|--------|
/// | `en_US.UTF-8` | `en-us` |
/// | `ja_JP` | `ja-jp` |
/// | `en` | `en` |
/// | *(none)* | `en` |
pub fn language_from_locale(locale: Option<&str>) -> String {
    match locale.map(str::trim) {
        Some(locale) if !locale.is_empty() => locale
            .split('.')
            .next()
            .unwrap_or(locale)
            .replace('_', "-")
            .to_lowercase(),
        _ => DEFAULT_LANGUAGE.to_string(),
    }
}

/// Extract the value of cookie `name` from a `Set-Cookie` header value.
///
/// Attributes after the first `;` are ignored. Returns `None` for other cookies
/// or an empty value.
///
/// # Examples
///
/// ```
/// use webstack_client::protocol::parse_cookie;
///
/// assert_eq!(parse_cookie("jwttoken=t0k; HttpOnly", "jwttoken").as_deref(), Some("t0k"));
/// assert_eq!(parse_cookie("sessionid=1", "jwttoken"), None);
/// ```
pub fn parse_cookie(set_cookie: &str, name: &str) -> Option<String> {
    let pair = set_cookie.split(';').next()?.trim();
    let (key, value) = pair.split_once('=')?;
    if key.trim() != name {
        return None;
    }
    let value = value.trim().trim_matches('"');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Format a `Cookie` request header value from name/value pairs.
pub fn format_cookie_header<'a>(cookies: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    cookies
        .into_iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Extract the server version from a `Server` header (its first token).
///
/// # Examples
///
/// ```
/// use webstack_client::protocol::parse_server_version;
///
/// assert_eq!(parse_server_version("webstack/1.2.3 linux").as_deref(), Some("webstack/1.2.3"));
/// assert_eq!(parse_server_version("   "), None);
/// ```
pub fn parse_server_version(value: &str) -> Option<String> {
    value.split_whitespace().next().map(str::to_string)
}
