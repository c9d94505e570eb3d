//! Copperleaf Core - Shared types library.
//!
//! This crate provides the domain types shared by the Copperleaf client
//! components:
//! - `client` - Session, cart, and wishlist synchronization layer
//! - `integration-tests` - End-to-end test harness
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! Everything here is plain data that crosses the wire or the persistence
//! boundary.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, products, identity, orders, and theme

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
