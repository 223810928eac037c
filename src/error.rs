//! Error types for the client flows, one per flow, each mapping collaborator
//! failures separately from validation and business-rule failures.

use quickbite_marketplace::{MarketplaceError, PaymentError};
use rust_decimal::Decimal;
use std::time::Duration;

use crate::checkout::CheckoutStep;

/// Checkout state machine errors. Every variant leaves the machine in a
/// state from which the user can retry or navigate away.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Cannot proceed to payment with an empty cart")]
    EmptyCart,
    #[error("Cannot {action} while in {from} step")]
    InvalidTransition {
        from: CheckoutStep,
        action: &'static str,
    },
    #[error("Order has already been placed for this checkout")]
    AlreadyPlaced,
    #[error(
        "A payment of {confirmed} is already confirmed but the cart now totals {total}; \
         restore the cart to retry placing the order"
    )]
    ConfirmedPaymentMismatch { confirmed: Decimal, total: Decimal },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Payment failed: {0}")]
    Payment(PaymentError),
    #[error("Marketplace error: {0}")]
    Marketplace(#[from] MarketplaceError),
}

impl From<PaymentError> for CheckoutError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(reason) => Self::Validation(reason),
            other => Self::Payment(other),
        }
    }
}

/// Order status polling errors. Any of them stops the polling loop.
#[derive(Debug, thiserror::Error)]
pub enum OrderPollingError {
    #[error("Marketplace error: {0}")]
    Marketplace(#[from] MarketplaceError),
    #[error("Order refresh timed out after {0:?}")]
    Timeout(Duration),
    #[error("Polling task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Marketplace error: {0}")]
    Marketplace(#[from] MarketplaceError),
    #[error("Invalid quantity: {0}. Quantity must be at least 1")]
    InvalidQuantity(u32),
}
