//! Authentication session.
//!
//! State machine over `Anonymous -> Authenticating -> {Authenticated |
//! Invalid}`, with `Invalid` collapsing back to `Anonymous` once the token
//! is cleared. The manager owns the token and identity, and the transition
//! into `Authenticated` is the single synchronization point that populates
//! the cart and wishlist stores - once per login event, never twice.

use std::sync::{Arc, Mutex, PoisonError};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use copperleaf_core::{Email, Identity};

use crate::error::ApiError;
use crate::http::{RequestPipeline, TokenCell};
use crate::persist::PersistenceGateway;
use crate::store::cart::CartStore;
use crate::store::wishlist::WishlistStore;

// =============================================================================
// Session state machine
// =============================================================================

/// Authentication lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// No session.
    Anonymous,
    /// A token exists (restored or just exchanged) but the identity is not
    /// yet confirmed.
    Authenticating,
    /// Token and identity are both present.
    Authenticated,
    /// The attempt failed; collapses to `Anonymous` after the token clears.
    Invalid,
}

/// The session: token, identity, and lifecycle status.
///
/// Invariant: `Authenticated` implies both token and identity are present;
/// an absent token implies the status is not `Authenticated`. All writes go
/// through the transition methods, which uphold this by construction.
#[derive(Debug, Clone)]
pub struct Session {
    status: AuthStatus,
    token: Option<SecretString>,
    identity: Option<Identity>,
}

impl Session {
    /// An empty session.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            status: AuthStatus::Anonymous,
            token: None,
            identity: None,
        }
    }

    /// A session resumed from a persisted token: identity unknown.
    #[must_use]
    pub const fn resumed(token: SecretString) -> Self {
        Self {
            status: AuthStatus::Authenticating,
            token: Some(token),
            identity: None,
        }
    }

    /// Current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> AuthStatus {
        self.status
    }

    /// The confirmed identity, present only when `Authenticated`.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Whether a token is held.
    #[must_use]
    pub const fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn token(&self) -> Option<SecretString> {
        self.token.clone()
    }

    /// Enter `Authenticating` for an explicit credential exchange.
    fn begin(&mut self) {
        *self = Self::anonymous();
        self.status = AuthStatus::Authenticating;
    }

    /// Enter `Authenticated`, returning the previous status.
    fn establish(&mut self, token: SecretString, identity: Identity) -> AuthStatus {
        let previous = self.status;
        self.status = AuthStatus::Authenticated;
        self.token = Some(token);
        self.identity = Some(identity);
        previous
    }

    /// Fail the attempt: `Invalid`, token cleared.
    fn invalidate(&mut self) {
        self.status = AuthStatus::Invalid;
        self.token = None;
        self.identity = None;
    }

    /// Collapse `Invalid` (or anything else) back to `Anonymous`.
    fn collapse(&mut self) {
        *self = Self::anonymous();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

// =============================================================================
// Wire shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct AuthPayload {
    token: String,
    user: Identity,
}

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterBody<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

// =============================================================================
// SessionManager
// =============================================================================

/// Owner of the session state machine.
///
/// Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    state: Mutex<Session>,
    pipeline: RequestPipeline,
    persistence: PersistenceGateway,
    token: TokenCell,
    cart: CartStore,
    wishlist: WishlistStore,
}

impl SessionManager {
    /// Create the manager.
    ///
    /// If the token cell already holds a restored credential the session
    /// starts `Authenticating`; otherwise `Anonymous`.
    #[must_use]
    pub fn new(
        pipeline: RequestPipeline,
        persistence: PersistenceGateway,
        token: TokenCell,
        cart: CartStore,
        wishlist: WishlistStore,
    ) -> Self {
        let initial = token.current().map_or_else(Session::anonymous, Session::resumed);
        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(initial),
                pipeline,
                persistence,
                token,
                cart,
                wishlist,
            }),
        }
    }

    /// A point-in-time copy of the session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.lock().clone()
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.inner.lock().status()
    }

    /// The confirmed identity, when `Authenticated`.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.inner.lock().identity().cloned()
    }

    /// Whether the session is `Authenticated`.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status() == AuthStatus::Authenticated
    }

    /// Exchange credentials for a session.
    ///
    /// On success the session becomes `Authenticated` and the cart and
    /// wishlist populate (the cascade). On failure the session collapses to
    /// `Anonymous` and nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns the classified error from the exchange.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &str) -> Result<Identity, ApiError> {
        self.inner.lock().begin();
        let body = LoginBody {
            email: email.as_str(),
            password,
        };
        match self
            .inner
            .pipeline
            .post::<AuthPayload, _>("/auth/login", &body)
            .await
        {
            Ok(payload) => Ok(self.establish(payload).await),
            Err(err) => {
                let mut state = self.inner.lock();
                state.invalidate();
                state.collapse();
                Err(err)
            }
        }
    }

    /// Create an account and start a session in one exchange.
    ///
    /// # Errors
    ///
    /// Returns the classified error; validation messages (400) carry the
    /// server's field feedback for the form.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn register(
        &self,
        name: &str,
        email: &Email,
        password: &str,
    ) -> Result<Identity, ApiError> {
        self.inner.lock().begin();
        let body = RegisterBody {
            name,
            email: email.as_str(),
            password,
        };
        match self
            .inner
            .pipeline
            .post::<AuthPayload, _>("/auth/register", &body)
            .await
        {
            Ok(payload) => Ok(self.establish(payload).await),
            Err(err) => {
                let mut state = self.inner.lock();
                state.invalidate();
                state.collapse();
                Err(err)
            }
        }
    }

    /// Validate a restored token and populate dependent stores.
    ///
    /// - Already `Authenticated`: plain refresh of both stores, no second
    ///   cascade.
    /// - Restored token present: identity fetch; success cascades, failure
    ///   clears the token and collapses to `Anonymous` with no retry.
    /// - No token: stays `Anonymous`.
    ///
    /// Returns the resulting status. Fetch failures surface through the
    /// pipeline's notification path and each store's `last_error`.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> AuthStatus {
        let resume = {
            let state = self.inner.lock();
            match state.status() {
                AuthStatus::Authenticated => None,
                _ => state.token(),
            }
        };

        match resume {
            None if self.is_authenticated() => {
                debug!("already authenticated; refreshing dependent stores");
                self.populate().await;
                AuthStatus::Authenticated
            }
            None => AuthStatus::Anonymous,
            Some(token) => match self.inner.pipeline.get::<Identity>("/auth/me").await {
                Ok(identity) => {
                    self.establish_with(token, identity).await;
                    AuthStatus::Authenticated
                }
                Err(err) => {
                    warn!(error = %err, "persisted token rejected; clearing session");
                    self.inner.discard_session();
                    AuthStatus::Anonymous
                }
            },
        }
    }

    /// End the session locally: clears token, identity, and both stores.
    /// Synchronous by design - no server confirmation is required.
    pub fn logout(&self) {
        self.inner.lock().collapse();
        self.inner.token.clear();
        self.inner.persistence.save_session_token(None);
        self.inner.pipeline.guard().renew();
        self.inner.cart.reset();
        self.inner.wishlist.reset();
    }

    /// The handler the pipeline invokes when a 401 claims the current
    /// session generation. Holds a weak reference so the pipeline does not
    /// keep the session alive.
    pub(crate) fn invalidation_handler(&self) -> Box<dyn Fn() + Send + Sync> {
        let weak = Arc::downgrade(&self.inner);
        Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.discard_session();
            }
        })
    }

    async fn establish(&self, payload: AuthPayload) -> Identity {
        let token = SecretString::from(payload.token);
        self.inner.token.set(token.clone());
        self.inner.persistence.save_session_token(Some(&token));
        self.inner.pipeline.guard().renew();
        self.establish_with(token, payload.user.clone()).await;
        payload.user
    }

    async fn establish_with(&self, token: SecretString, identity: Identity) {
        let previous = self.inner.lock().establish(token, identity);
        if previous == AuthStatus::Authenticated {
            debug!("re-entrant authentication; cascade suppressed");
        } else {
            self.populate().await;
        }
    }

    /// The cascade: populate both dependent stores.
    async fn populate(&self) {
        let (cart, wishlist) =
            tokio::join!(self.inner.cart.fetch_all(), self.inner.wishlist.fetch_all());
        if let Err(err) = cart {
            warn!(error = %err, "cart population failed");
        }
        if let Err(err) = wishlist {
            warn!(error = %err, "wishlist population failed");
        }
    }
}

impl SessionInner {
    /// Shared teardown for pipeline-triggered invalidation and rejected
    /// restored tokens. Idempotent.
    fn discard_session(&self) {
        {
            let mut state = self.lock();
            state.invalidate();
            state.collapse();
        }
        self.token.clear();
        self.persistence.save_session_token(None);
        self.cart.reset();
        self.wishlist.reset();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Session> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
