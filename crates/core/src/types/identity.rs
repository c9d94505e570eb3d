//! User identity as returned by the identity endpoint.

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::UserId;

/// Minimal user record fetched once per session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Service-assigned user ID.
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: Email,
    /// Authorization role.
    #[serde(default)]
    pub role: Role,
}

/// Authorization role attached to an identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}
