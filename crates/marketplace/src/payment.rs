use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tracing::{info, warn};

use crate::PaymentError;

/// Payment intent created by the backend for a checkout amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub client_secret: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub reference: String,
}

/// Details the customer enters on the payment step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaymentDetails {
    pub cardholder_name: String,
    pub delivery_address: String,
}

impl PaymentDetails {
    pub fn new(cardholder_name: impl Into<String>, delivery_address: impl Into<String>) -> Self {
        Self {
            cardholder_name: cardholder_name.into(),
            delivery_address: delivery_address.into(),
        }
    }

    /// Blocks submission of empty required fields.
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.cardholder_name.trim().is_empty() {
            return Err(PaymentError::Validation(
                "cardholder name is required".to_string(),
            ));
        }

        if self.delivery_address.trim().is_empty() {
            return Err(PaymentError::Validation(
                "delivery address is required".to_string(),
            ));
        }

        Ok(())
    }
}

/// Confirms a payment intent with the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn confirm(
        &self,
        intent: &PaymentIntent,
        details: &PaymentDetails,
    ) -> Result<PaymentReceipt, PaymentError>;
}

/// Gateway that approves or declines without contacting a provider
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    confirmations: Arc<AtomicU64>,
    decline_reason: Option<String>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self {
            confirmations: Arc::new(AtomicU64::new(0)),
            decline_reason: None,
        }
    }

    pub fn declining(reason: impl Into<String>) -> Self {
        Self {
            confirmations: Arc::new(AtomicU64::new(0)),
            decline_reason: Some(reason.into()),
        }
    }

    /// Number of confirmation attempts seen, approved or not.
    pub fn confirmations(&self) -> u64 {
        self.confirmations.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn confirm(
        &self,
        intent: &PaymentIntent,
        details: &PaymentDetails,
    ) -> Result<PaymentReceipt, PaymentError> {
        let attempt = self.confirmations.fetch_add(1, Ordering::SeqCst) + 1;
        details.validate()?;

        if let Some(reason) = &self.decline_reason {
            warn!(
                "[SIMULATED] Declining payment of {} (attempt {attempt}): {reason}",
                intent.amount
            );
            return Err(PaymentError::Declined(reason.clone()));
        }

        info!("[SIMULATED] Approved payment of {} for {}", intent.amount, details.cardholder_name);

        Ok(PaymentReceipt {
            reference: format!("SIM_{attempt}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn intent() -> PaymentIntent {
        PaymentIntent {
            client_secret: "pi_secret".to_string(),
            amount: dec!(400),
        }
    }

    #[test]
    fn test_validate_requires_fields() {
        assert!(PaymentDetails::new("Asha", "12 MG Road").validate().is_ok());
        assert!(matches!(
            PaymentDetails::new("  ", "12 MG Road").validate(),
            Err(PaymentError::Validation(msg)) if msg.contains("cardholder")
        ));
        assert!(matches!(
            PaymentDetails::new("Asha", "").validate(),
            Err(PaymentError::Validation(msg)) if msg.contains("address")
        ));
    }

    #[tokio::test]
    async fn test_simulated_gateway_approves() {
        let gateway = SimulatedGateway::new();
        let receipt = gateway
            .confirm(&intent(), &PaymentDetails::new("Asha", "12 MG Road"))
            .await
            .unwrap();

        assert_eq!(receipt.reference, "SIM_1");
        assert_eq!(gateway.confirmations(), 1);
    }

    #[tokio::test]
    async fn test_simulated_gateway_declines() {
        let gateway = SimulatedGateway::declining("insufficient funds");
        let err = gateway
            .confirm(&intent(), &PaymentDetails::new("Asha", "12 MG Road"))
            .await
            .unwrap_err();

        assert_eq!(err, PaymentError::Declined("insufficient funds".to_string()));
    }
}
