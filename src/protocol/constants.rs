//! Protocol constants: paths, header names, cookie names and WebSocket subprotocol.

/// Path of the GraphQL endpoint, for both HTTP calls and subscriptions.
pub const GRAPHQL_PATH: &str = "/api/v2/graphql";

/// Prefix of the REST API. The version segment follows.
pub const API_PREFIX: &str = "/api";

/// Subprotocol negotiated on the subscription WebSocket.
pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-ws";

/// Cookie carrying the JSON web token handed out after a Basic login.
pub const JWT_COOKIE: &str = "jwttoken";

/// Name of the CSRF cookie. Any value is accepted as long as header and cookie match.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Value sent in both the CSRF header and cookie.
pub const CSRF_TOKEN: &str = "csrftoken";

/// Language used when no locale is configured.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Header names used by the controller beyond the standard set.
pub mod headers {
    use http::HeaderName;

    /// Author recorded on changes made through this client.
    pub const X_AUTHOR: HeaderName = HeaderName::from_static("x-author");

    /// CSRF token, must match the `csrftoken` cookie.
    pub const X_CSRFTOKEN: HeaderName = HeaderName::from_static("x-csrftoken");
}
