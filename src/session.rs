//! Credential state shared by every call a client makes.
//!
//! The current [`Credential`] lives behind an `Arc` that is swapped as a whole, so a
//! reader always sees either the old or the new value. A request takes one snapshot when
//! it is initiated and keeps it; later updates never touch requests already in flight.

use crate::error::{Result, WebstackError};
use crate::protocol::constants::JWT_COOKIE;
use crate::protocol::{format_basic_auth, format_bearer_auth, parse_cookie};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// An authentication credential.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// A static `Authorization` header value.
    Header(String),
    /// Username and password, sent as HTTP Basic.
    Basic {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// A bearer token, e.g. the controller's JWT.
    Bearer(String),
}

impl Credential {
    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        match self {
            Credential::Header(value) => value.clone(),
            Credential::Basic { username, password } => format_basic_auth(username, password),
            Credential::Bearer(token) => format_bearer_auth(token),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Header(_) => f.write_str("Header(***)"),
            Credential::Basic { username, .. } => {
                f.debug_struct("Basic").field("username", username).finish_non_exhaustive()
            }
            Credential::Bearer(_) => f.write_str("Bearer(***)"),
        }
    }
}

/// Exchanges some external secret for a credential.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtain a fresh credential.
    async fn fetch(&self) -> Result<Credential>;
}

/// [`TokenSource`] backed by an async closure.
pub struct FnTokenSource<F>(pub F);

#[async_trait]
impl<F, Fut> TokenSource for FnTokenSource<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Credential>> + Send,
{
    async fn fetch(&self) -> Result<Credential> {
        (self.0)().await
    }
}

/// Shared credential state.
pub struct Session {
    credential: RwLock<Option<Arc<Credential>>>,
    token_source: Option<Arc<dyn TokenSource>>,
    login: tokio::sync::Mutex<()>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("credential", &*self.credential.read())
            .field("token_source", &self.token_source.is_some())
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Session {
    /// Session starting with `credential`.
    pub fn new(credential: Option<Credential>) -> Self {
        Self {
            credential: RwLock::new(credential.map(Arc::new)),
            token_source: None,
            login: tokio::sync::Mutex::new(()),
        }
    }

    /// Session that logs in through `source` on first use.
    pub fn with_token_source(source: Arc<dyn TokenSource>) -> Self {
        Self {
            token_source: Some(source),
            ..Self::new(None)
        }
    }

    /// Snapshot of the current credential.
    pub fn current_credential(&self) -> Option<Arc<Credential>> {
        self.credential.read().clone()
    }

    /// Atomically replace the credential.
    pub fn update_credential(&self, credential: Credential) {
        *self.credential.write() = Some(Arc::new(credential));
    }

    /// Forget the credential.
    pub fn clear(&self) {
        *self.credential.write() = None;
    }

    /// Whether a token source is configured.
    pub fn has_token_source(&self) -> bool {
        self.token_source.is_some()
    }

    /// Exchange a token through the configured source and install the result.
    pub async fn login_with_token(&self) -> Result<Arc<Credential>> {
        let source = self
            .token_source
            .as_ref()
            .ok_or_else(|| WebstackError::Auth("no token source configured".into()))?;
        let credential = Arc::new(source.fetch().await?);
        *self.credential.write() = Some(Arc::clone(&credential));
        tracing::debug!("obtained credential from token source");
        Ok(credential)
    }

    /// Re-run the token exchange, replacing the current credential.
    pub async fn refresh(&self) -> Result<Arc<Credential>> {
        let _guard = self.login.lock().await;
        self.login_with_token().await
    }

    /// The credential to attach to a call being initiated now.
    ///
    /// When nothing is set and a token source exists, logs in first. Concurrent first
    /// calls wait for one exchange instead of each running their own.
    pub async fn snapshot_for_call(&self) -> Result<Option<Arc<Credential>>> {
        if let Some(credential) = self.current_credential() {
            return Ok(Some(credential));
        }
        if self.token_source.is_none() {
            return Ok(None);
        }
        let _guard = self.login.lock().await;
        if let Some(credential) = self.current_credential() {
            return Ok(Some(credential));
        }
        self.login_with_token().await.map(Some)
    }

    /// React to a `Set-Cookie` header on a response to a request sent with `sent_with`:
    /// a `jwttoken` cookie replaces a Basic credential with a Bearer one. Returns whether
    /// the credential changed.
    ///
    /// Only applies while `sent_with` is still the current credential, so a late response
    /// never overrides an [`update_credential`](Self::update_credential) made meanwhile.
    pub fn observe_set_cookie(&self, set_cookie: &str, sent_with: &Arc<Credential>) -> bool {
        let Some(token) = parse_cookie(set_cookie, JWT_COOKIE) else {
            return false;
        };
        let mut credential = self.credential.write();
        let Some(current) = credential.as_ref() else {
            return false;
        };
        if !Arc::ptr_eq(current, sent_with) {
            return false;
        }
        match current.as_ref() {
            Credential::Basic { .. } => {
                *credential = Some(Arc::new(Credential::Bearer(token)));
                tracing::debug!("switched to JWT bearer authentication");
                true
            }
            Credential::Bearer(current) if *current != token => {
                *credential = Some(Arc::new(Credential::Bearer(token)));
                true
            }
            _ => false,
        }
    }
}
