//! Authenticated request pipeline.
//!
//! Single chokepoint for all network I/O. Every request runs through the
//! same ordered stages:
//!
//! 1. **Credential injection** - a bearer token from the shared [`TokenCell`]
//!    is attached when present; callers never manage credentials.
//! 2. **Dispatch** - the request is sent with the fixed timeout configured
//!    at construction.
//! 3. **Classification** - the outcome maps to exactly one
//!    [`ApiError`](crate::ApiError) kind, derived purely from the status or
//!    transport failure.
//! 4. **Side-effect dispatch** - at most one user-visible notification per
//!    completed request. A 401 additionally triggers session invalidation,
//!    deduplicated by the [`InvalidationGuard`] so concurrent failures clear
//!    state and navigate at most once per session generation.

mod envelope;

pub use envelope::{ApiEnvelope, ErrorBody};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::events::{Notice, SharedNotifier, Surface};

// =============================================================================
// TokenCell
// =============================================================================

/// Shared holder for the session bearer token.
///
/// Written by the session manager, read by the pipeline on every request.
#[derive(Clone, Default)]
pub struct TokenCell {
    inner: Arc<RwLock<Option<SecretString>>>,
}

impl TokenCell {
    /// Create an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored token.
    pub fn set(&self, token: SecretString) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Remove the stored token.
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Whether a token is currently present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// A clone of the current token.
    #[must_use]
    pub fn current(&self) -> Option<SecretString> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The `Authorization` header value, if a token is present.
    fn bearer_header(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }
}

impl std::fmt::Debug for TokenCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCell")
            .field("present", &self.is_present())
            .finish()
    }
}

// =============================================================================
// InvalidationGuard
// =============================================================================

/// Deduplicates session-invalidation side effects.
///
/// Each logical session carries a generation; the first 401 of a generation
/// claims it, and every later 401 of the same generation is a no-op. A new
/// login or logout renews the generation.
#[derive(Debug)]
pub struct InvalidationGuard {
    generation: AtomicU64,
    handled: AtomicU64,
}

impl InvalidationGuard {
    /// A fresh guard with an unclaimed first generation.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            generation: AtomicU64::new(1),
            handled: AtomicU64::new(0),
        }
    }

    /// Start a new session generation (login, logout).
    pub fn renew(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Attempt to claim the current generation's invalidation.
    ///
    /// Returns `true` for exactly one caller per generation.
    pub fn try_claim(&self) -> bool {
        let generation = self.generation.load(Ordering::SeqCst);
        self.handled.fetch_max(generation, Ordering::SeqCst) < generation
    }
}

impl Default for InvalidationGuard {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// RequestPipeline
// =============================================================================

type UnauthorizedHandler = Box<dyn Fn() + Send + Sync>;

/// The authenticated request pipeline.
///
/// Cheap to clone; all clones share the HTTP client, token cell, and
/// invalidation guard.
#[derive(Clone)]
pub struct RequestPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    client: reqwest::Client,
    base: Url,
    token: TokenCell,
    guard: Arc<InvalidationGuard>,
    notifier: SharedNotifier,
    on_unauthorized: RwLock<Option<UnauthorizedHandler>>,
}

impl RequestPipeline {
    /// Build a pipeline against the configured base path.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest` error if the HTTP client cannot be
    /// constructed.
    pub fn new(
        config: &ClientConfig,
        token: TokenCell,
        guard: Arc<InvalidationGuard>,
        notifier: SharedNotifier,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(PipelineInner {
                client,
                base: config.api_base.clone(),
                token,
                guard,
                notifier,
                on_unauthorized: RwLock::new(None),
            }),
        })
    }

    /// Install the session-invalidation handler.
    ///
    /// Called once during context wiring; the handler clears session and
    /// store state when a 401 claims the current generation.
    pub(crate) fn set_unauthorized_handler(&self, handler: UnauthorizedHandler) {
        *self
            .inner
            .on_unauthorized
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// The shared invalidation guard.
    #[must_use]
    pub fn guard(&self) -> Arc<InvalidationGuard> {
        Arc::clone(&self.inner.guard)
    }

    // =========================================================================
    // Request Methods
    // =========================================================================

    /// `GET` a payload.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] on any failure.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::GET, path, None::<&()>).await
    }

    /// `POST` a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] on any failure.
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// `POST` without a body.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] on any failure.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::POST, path, None::<&()>).await
    }

    /// `PUT` a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] on any failure.
    pub async fn put<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Method::PUT, path, Some(body)).await
    }

    /// `DELETE` a resource.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] on any failure.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::DELETE, path, None::<&()>).await
    }

    // =========================================================================
    // Pipeline Stages
    // =========================================================================

    /// Run one request through the full stage sequence.
    #[instrument(skip_all, fields(%method, path))]
    async fn send<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let url = self.join(path);
        let mut request = self.inner.client.request(method, url);

        // Stage 1: credential injection
        if let Some(bearer) = self.inner.token.bearer_header() {
            request = request.header(reqwest::header::AUTHORIZATION, bearer);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        // Stage 2: dispatch (timeout is configured on the client)
        let outcome = request.send().await;

        // Stage 3: classification
        let result = match outcome {
            Err(transport) => Err(ApiError::from_transport(transport)),
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    Self::parse_success(response, status).await
                } else {
                    let message = Self::error_message(response).await;
                    Err(ApiError::classify(status, message))
                }
            }
        };

        // Stage 4: side-effect dispatch
        if let Err(err) = &result {
            self.dispatch_side_effects(err);
        }
        result
    }

    async fn parse_success<T: DeserializeOwned>(
        response: reqwest::Response,
        status: reqwest::StatusCode,
    ) -> Result<T, ApiError> {
        let envelope: ApiEnvelope<T> =
            response.json().await.map_err(|err| ApiError::Unknown {
                status: Some(status.as_u16()),
                message: format!("malformed response: {err}"),
            })?;
        envelope.into_data().map_err(|message| ApiError::Unknown {
            status: Some(status.as_u16()),
            message,
        })
    }

    /// Best-effort extraction of the server's error message.
    async fn error_message(response: reqwest::Response) -> Option<String> {
        let body: ErrorBody = response.json().await.unwrap_or_default();
        body.message
    }

    fn dispatch_side_effects(&self, err: &ApiError) {
        debug!(error = %err, "request failed");
        match err {
            ApiError::Unauthorized => self.handle_unauthorized(),
            // Forms render their own field feedback for validation errors.
            ApiError::Validation { .. } => {}
            other if other.is_notifiable() => {
                self.inner.notifier.notify(Notice::error(other.to_string()));
            }
            _ => {}
        }
    }

    /// Idempotent session invalidation.
    ///
    /// Only the first 401 of a session generation clears state; navigation
    /// and the notification are additionally suppressed when the shopper is
    /// already on the login surface.
    fn handle_unauthorized(&self) {
        if !self.inner.guard.try_claim() {
            debug!("invalidation already handled for this session generation");
            return;
        }
        warn!("session token rejected; invalidating session");

        if let Some(handler) = self
            .inner
            .on_unauthorized
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            handler();
        }

        if self.inner.notifier.current_surface() != Surface::Login {
            self.inner
                .notifier
                .notify(Notice::error(ApiError::Unauthorized.to_string()));
            self.inner.notifier.navigate(Surface::Login);
        }
    }

    fn join(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.inner.base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("base", &self.inner.base.as_str())
            .field("token", &self.inner.token)
            .finish_non_exhaustive()
    }
}
