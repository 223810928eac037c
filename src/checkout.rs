use quickbite_marketplace::{
    Cart, Marketplace, Order, OrderRequest, PaymentDetails, PaymentGateway, PaymentReceipt,
};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::error::CheckoutError;

/// Step of a single checkout attempt. `Success` is terminal; leaving it is
/// navigation, not a transition of this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutStep {
    #[default]
    Cart,
    Payment,
    Success,
}

impl CheckoutStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Payment => "payment",
            Self::Success => "success",
        }
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
struct ConfirmedPayment {
    receipt: PaymentReceipt,
    amount: Decimal,
}

/// Cart -> payment -> success flow.
///
/// The order-placed effect is issued at most once per successful checkout:
/// once `Success` is reached every further submit is rejected without
/// touching the marketplace. A payment confirmed during an attempt is reused
/// if order placement has to be retried, and the retry must be for the same
/// amount: no second payment is taken while the first is unused.
#[derive(Debug, Default)]
pub struct Checkout {
    step: CheckoutStep,
    confirmed_payment: Option<ConfirmedPayment>,
    placed_order: Option<Order>,
}

impl Checkout {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    pub const fn placed_order(&self) -> Option<&Order> {
        self.placed_order.as_ref()
    }

    pub fn proceed_to_payment(&mut self, cart: &Cart) -> Result<(), CheckoutError> {
        match self.step {
            CheckoutStep::Cart if cart.is_empty() => {
                info!("Checkout requested with an empty cart, staying on cart step");
                Err(CheckoutError::EmptyCart)
            }
            CheckoutStep::Cart => {
                info!(
                    "Proceeding to payment with {} items totalling {:.2}",
                    cart.item_count(),
                    cart.total_price()
                );
                self.step = CheckoutStep::Payment;
                Ok(())
            }
            CheckoutStep::Payment => Ok(()),
            CheckoutStep::Success => Err(CheckoutError::InvalidTransition {
                from: self.step,
                action: "proceed to payment",
            }),
        }
    }

    pub fn back_to_cart(&mut self) -> Result<(), CheckoutError> {
        match self.step {
            CheckoutStep::Cart => Ok(()),
            CheckoutStep::Payment => {
                info!("Returning to cart from payment step");
                self.step = CheckoutStep::Cart;
                Ok(())
            }
            CheckoutStep::Success => Err(CheckoutError::InvalidTransition {
                from: self.step,
                action: "go back to cart",
            }),
        }
    }

    /// Confirms payment for the cart total and places the order.
    ///
    /// Any failure keeps the machine on the payment step with the cart
    /// untouched. On success the cart is cleared and the placed order is
    /// returned.
    pub async fn submit_payment<M, G>(
        &mut self,
        cart: &mut Cart,
        details: &PaymentDetails,
        marketplace: &M,
        gateway: &G,
    ) -> Result<&Order, CheckoutError>
    where
        M: Marketplace + ?Sized,
        G: PaymentGateway + ?Sized,
    {
        match self.step {
            CheckoutStep::Payment => {}
            CheckoutStep::Success => return Err(CheckoutError::AlreadyPlaced),
            CheckoutStep::Cart => {
                return Err(CheckoutError::InvalidTransition {
                    from: self.step,
                    action: "submit payment",
                });
            }
        }

        details.validate()?;

        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let total = cart.total_price();
        if total <= Decimal::ZERO {
            return Err(CheckoutError::Validation(format!(
                "Invalid cart total: {total}"
            )));
        }

        if let Some(confirmed) = &self.confirmed_payment
            && confirmed.amount != total
        {
            warn!(
                "Cart total changed from {} to {total} after payment {} was confirmed",
                confirmed.amount, confirmed.receipt.reference
            );
            return Err(CheckoutError::ConfirmedPaymentMismatch {
                confirmed: confirmed.amount,
                total,
            });
        }

        let reusable = self
            .confirmed_payment
            .as_ref()
            .map(|confirmed| confirmed.receipt.clone());

        let receipt = match reusable {
            Some(receipt) => {
                info!(
                    "Reusing confirmed payment {} for order placement retry",
                    receipt.reference
                );
                receipt
            }
            None => {
                let intent = marketplace.create_payment_intent(total).await?;
                let receipt = gateway.confirm(&intent, details).await.map_err(|e| {
                    warn!("Payment confirmation failed: {e}");
                    e
                })?;

                self.confirmed_payment = Some(ConfirmedPayment {
                    receipt: receipt.clone(),
                    amount: total,
                });
                receipt
            }
        };

        let request =
            OrderRequest::from_cart(marketplace.user_id(), cart, &details.delivery_address);

        let order = marketplace.place_order(&request).await.map_err(|e| {
            warn!(
                "Order placement failed after payment {}: {e}",
                receipt.reference
            );
            e
        })?;

        info!(
            "Order {} placed for {:.2} with payment {}",
            order.id, order.total_price, receipt.reference
        );

        cart.clear();
        self.step = CheckoutStep::Success;
        self.confirmed_payment = None;
        let order: &Order = self.placed_order.insert(order);
        Ok(order)
    }
}
