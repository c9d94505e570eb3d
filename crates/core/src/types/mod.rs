//! Core types for the Copperleaf storefront client.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod identity;
pub mod money;
pub mod order;
pub mod product;
pub mod theme;

pub use email::{Email, EmailError};
pub use id::*;
pub use identity::{Identity, Role};
pub use money::Money;
pub use order::*;
pub use product::{Product, ProductImage, ProductSummary};
pub use theme::{ColorScheme, ThemePreference};
