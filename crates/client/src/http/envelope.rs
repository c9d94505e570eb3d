//! Service response envelope.
//!
//! Every endpoint wraps its payload as `{ "success": bool, "data": ...,
//! "message": ... }`. The pipeline unwraps `data`; error bodies share the
//! same shape with `message` carrying the human-readable reason.

use serde::Deserialize;
use serde::de::DeserializeOwned;

/// The standard response wrapper.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "none")]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

fn none<T>() -> Option<T> {
    None
}

impl<T: DeserializeOwned> ApiEnvelope<T> {
    /// Extract the payload.
    ///
    /// Endpoints that acknowledge without a body (wishlist add/remove) are
    /// deserialized as `()` from the absent `data` field.
    pub fn into_data(self) -> Result<T, String> {
        match self.data {
            Some(data) => Ok(data),
            None => serde_json::from_value(serde_json::Value::Null)
                .map_err(|_| "response missing data".to_string()),
        }
    }
}

/// Minimal error-body shape, tolerant of anything the service sends.
#[derive(Debug, Deserialize, Default)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
