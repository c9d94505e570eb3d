//! Copperleaf storefront client library.
//!
//! This crate is the synchronization core of the Copperleaf storefront: it
//! owns the authenticated request pipeline, the session state machine, the
//! optimistic cart and wishlist stores, and the durable-state gateway that
//! rehydrates them before the UI becomes interactive. The remote service is
//! always the source of truth; local state is a responsive prediction that
//! reconciles against server responses.
//!
//! # Architecture
//!
//! - [`http`] - single chokepoint for network I/O: credential injection,
//!   error classification, session-invalidation side effects
//! - [`session`] - Anonymous/Authenticating/Authenticated/Invalid state
//!   machine; fires the cart+wishlist cascade exactly once per login
//! - [`store`] - generic optimistic collection store, instantiated for the
//!   cart and the wishlist
//! - [`persist`] - file-backed snapshot of the whitelisted partitions,
//!   restored once at startup
//! - [`context`] - explicit process-scoped wiring of all of the above;
//!   there are no module-level singletons
//! - [`catalog`], [`orders`], [`theme`] - pass-through surfaces gated by the
//!   same pipeline
//!
//! # Example
//!
//! ```rust,ignore
//! use copperleaf_client::AppContext;
//!
//! let context = AppContext::init()?;
//! context.session().bootstrap().await;
//! let cart = context.cart().snapshot();
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod http;
pub mod orders;
pub mod persist;
pub mod session;
pub mod store;
pub mod theme;

pub use config::ClientConfig;
pub use context::AppContext;
pub use error::ApiError;
pub use session::{AuthStatus, SessionManager};
