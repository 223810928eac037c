use reqwest::header::InvalidHeaderValue;

use crate::CartItemId;

/// Errors surfaced by the marketplace backend and the local cart model.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("Failed to create header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parsing failed: {0}")]
    Url(#[from] url::ParseError),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{action} failed with status: {status}, body: {body}")]
    RequestFailed {
        action: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error(
        "Failed to parse API response: {action}, response: {response_text}, error: {parse_error}"
    )]
    ApiResponseParse {
        action: String,
        response_text: String,
        parse_error: String,
    },
    #[error("Cart item {0} not found in cart")]
    CartItemNotFound(CartItemId),
    #[error("Invalid quantity: {0}. Quantity must be at least 1")]
    InvalidQuantity(u32),
}

/// Failures reported by a payment gateway while confirming a payment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment declined: {0}")]
    Declined(String),
    #[error("Payment details rejected: {0}")]
    Validation(String),
    #[error("An unexpected payment error occurred: {0}")]
    Unexpected(String),
}
