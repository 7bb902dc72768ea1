//! Core addressing types.
//!
//! An [`Endpoint`] names where the controller web server lives: a TCP host
//! (optionally behind TLS) or a Unix domain socket on the local filesystem.
//! It is fixed when the client is built.

use crate::error::{Result, WebstackError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// URL scheme for TCP endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP.
    #[default]
    Http,
    /// HTTP over TLS.
    Https,
}

impl Scheme {
    /// Default port for the scheme.
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    /// Scheme used for the WebSocket upgrade.
    pub fn websocket_scheme(self) -> &'static str {
        match self {
            Scheme::Http => "ws",
            Scheme::Https => "wss",
        }
    }

    /// Scheme as it appears in a URL.
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Target address of the controller web server.
///
/// # Examples
///
/// ```
/// use webstack_client::Endpoint;
///
/// let tcp = Endpoint::from_url("http://controller14:8080").unwrap();
/// assert_eq!(tcp.authority(), "controller14:8080");
///
/// let unix = Endpoint::unix("/tmp/ctrl.sock");
/// assert_eq!(unix.authority(), "localhost");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Endpoint {
    /// Host and port over TCP.
    Tcp {
        /// `http` or `https`.
        #[serde(default)]
        scheme: Scheme,
        /// Hostname or IP address.
        host: String,
        /// TCP port.
        port: u16,
    },
    /// Filesystem path of a Unix domain socket. Always plain HTTP.
    Unix {
        /// Socket path.
        path: PathBuf,
    },
}

impl Endpoint {
    /// TCP endpoint.
    pub fn tcp(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Endpoint::Tcp {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// Unix domain socket endpoint.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Endpoint::Unix { path: path.into() }
    }

    /// Parse an `http://` or `https://` URL into a TCP endpoint.
    ///
    /// Any path, query or credentials in the URL are ignored here; see
    /// [`ClientConfig::from_url`](crate::client::ClientConfig::from_url) for credentials.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)?;
        let scheme = match parsed.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(WebstackError::Config(format!(
                    "unsupported URL scheme '{}'",
                    other
                )))
            }
        };
        let host = parsed
            .host_str()
            .ok_or_else(|| WebstackError::Config(format!("URL '{}' has no host", url)))?
            .to_string();
        let port = parsed.port().unwrap_or_else(|| scheme.default_port());
        Ok(Endpoint::Tcp { scheme, host, port })
    }

    /// The scheme spoken on the connection. Unix sockets never use TLS.
    pub fn scheme(&self) -> Scheme {
        match self {
            Endpoint::Tcp { scheme, .. } => *scheme,
            Endpoint::Unix { .. } => Scheme::Http,
        }
    }

    /// Value for the `Host` header.
    pub fn authority(&self) -> String {
        match self {
            Endpoint::Tcp { scheme, host, port } if *port == scheme.default_port() => host.clone(),
            Endpoint::Tcp { host, port, .. } => format!("{}:{}", host, port),
            Endpoint::Unix { .. } => "localhost".to_string(),
        }
    }

    /// Base URL of the web server, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme().as_str(), self.authority())
    }

    /// WebSocket URL for a path on this endpoint.
    pub fn websocket_url(&self, path: &str) -> String {
        format!(
            "{}://{}{}",
            self.scheme().websocket_scheme(),
            self.authority(),
            path
        )
    }

    /// Whether this endpoint is a Unix domain socket.
    pub fn is_unix(&self) -> bool {
        matches!(self, Endpoint::Unix { .. })
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::tcp(Scheme::Http, "127.0.0.1", 80)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { .. } => f.write_str(&self.base_url()),
            Endpoint::Unix { path } => write!(f, "unix:{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_default_port() {
        let endpoint = Endpoint::from_url("http://controller14").unwrap();
        assert_eq!(endpoint, Endpoint::tcp(Scheme::Http, "controller14", 80));
        assert_eq!(endpoint.authority(), "controller14");
        assert_eq!(endpoint.base_url(), "http://controller14");
    }

    #[test]
    fn test_from_url_https_with_port() {
        let endpoint = Endpoint::from_url("https://10.2.0.4:8443/ignored/path").unwrap();
        assert_eq!(endpoint.scheme(), Scheme::Https);
        assert_eq!(endpoint.authority(), "10.2.0.4:8443");
        assert_eq!(
            endpoint.websocket_url("/api/v2/graphql"),
            "wss://10.2.0.4:8443/api/v2/graphql"
        );
    }

    #[test]
    fn test_from_url_rejects_other_schemes() {
        assert!(Endpoint::from_url("ftp://controller").is_err());
        assert!(Endpoint::from_url("not a url").is_err());
    }

    #[test]
    fn test_unix_endpoint() {
        let endpoint = Endpoint::unix("/tmp/ctrl.sock");
        assert!(endpoint.is_unix());
        assert_eq!(endpoint.scheme(), Scheme::Http);
        assert_eq!(endpoint.websocket_url("/x"), "ws://localhost/x");
        assert_eq!(endpoint.to_string(), "unix:/tmp/ctrl.sock");
    }

    #[test]
    fn test_endpoint_deserialize() {
        let endpoint: Endpoint =
            serde_json::from_str(r#"{"kind": "unix", "path": "/run/webstack.sock"}"#).unwrap();
        assert_eq!(endpoint, Endpoint::unix("/run/webstack.sock"));

        let endpoint: Endpoint =
            serde_json::from_str(r#"{"kind": "tcp", "host": "ctrl", "port": 8080}"#).unwrap();
        assert_eq!(endpoint, Endpoint::tcp(Scheme::Http, "ctrl", 8080));
    }
}
