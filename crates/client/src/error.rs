//! Unified error handling for the client.
//!
//! Every public operation returns [`Result`]. The variants follow how a front
//! end reacts to them:
//! - `Http` - transport failure, nothing reached the server
//! - `Api` - the server answered with an error; `message` is safe to show
//! - `Unauthorized` - the session could not be renewed; send the user to login
//! - `Rejected`, `Cart`, `Checkout`, `InvalidTransition` - business rules
//!   checked before any request is made

use crumb_core::OrderStatus;
use thiserror::Error;

use crate::cart::CartError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::models::DeleteRejection;
use crate::session::SessionError;
use crate::storage::StorageError;

/// Maximum number of body characters kept in error messages.
const MAX_MESSAGE_CHARS: usize = 300;

/// Application-level error type for the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request did not complete.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Authentication is missing or could not be renewed.
    #[error("Unauthorized: please log in again")]
    Unauthorized,

    /// An order deletion was refused.
    #[error("Deletion refused: {0}")]
    Rejected(#[from] DeleteRejection),

    /// An order status change does not follow the lifecycle.
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Whether the user has to log in again.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Build an `Api` error from a status and raw response body.
    ///
    /// Understands the usual error shapes: `{"message": ..}`,
    /// `{"error": ..}`, `{"detail": ..}` and field maps like
    /// `{"price": ["must be positive"]}`. Anything else is passed through
    /// truncated.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        Self::Api {
            status,
            message: extract_message(body).unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    format!("HTTP {status}")
                } else {
                    trimmed.chars().take(MAX_MESSAGE_CHARS).collect()
                }
            }),
        }
    }
}

fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;

    for key in ["message", "error", "detail"] {
        if let Some(text) = object.get(key).and_then(serde_json::Value::as_str) {
            return Some(text.to_owned());
        }
    }

    let fields: Vec<String> = object
        .iter()
        .filter_map(|(field, errors)| {
            let text = match errors {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Array(items) => items
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => return None,
            };
            (!text.is_empty()).then(|| format!("{field}: {text}"))
        })
        .collect();
    (!fields.is_empty()).then(|| fields.join("; "))
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: ClientError) -> String {
        match err {
            ClientError::Api { message, .. } => message,
            other => other.to_string(),
        }
    }

    #[test]
    fn test_message_keys() {
        assert_eq!(
            message(ClientError::from_response(400, r#"{"detail":"Out of stock"}"#)),
            "Out of stock"
        );
        assert_eq!(
            message(ClientError::from_response(409, r#"{"message":"Duplicate"}"#)),
            "Duplicate"
        );
    }

    #[test]
    fn test_field_errors_are_joined() {
        let err = ClientError::from_response(
            400,
            r#"{"name":["This field is required."],"price":["Must be positive.","Too many digits."]}"#,
        );
        assert_eq!(
            message(err),
            "name: This field is required.; price: Must be positive., Too many digits."
        );
    }

    #[test]
    fn test_plain_and_empty_bodies() {
        assert_eq!(
            message(ClientError::from_response(502, "Bad Gateway")),
            "Bad Gateway"
        );
        assert_eq!(message(ClientError::from_response(500, "  ")), "HTTP 500");
        let long = "x".repeat(1000);
        assert_eq!(
            message(ClientError::from_response(500, &long)).len(),
            MAX_MESSAGE_CHARS
        );
    }

    #[test]
    fn test_display() {
        let err = ClientError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Preparing,
        };
        assert_eq!(err.to_string(), "Cannot move order from delivered to preparing");
        assert!(ClientError::Unauthorized.is_unauthorized());
    }
}
