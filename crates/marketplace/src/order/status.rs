use serde::{Deserialize, Serialize};

/// Order lifecycle as reported by the marketplace backend.
///
/// Orders move forward only:
/// - `Pending` -> `Preparing` | `Cancelled`
/// - `Preparing` -> `ReadyForPickup` | `Cancelled`
/// - `ReadyForPickup` -> `OutForDelivery` | `Cancelled`
/// - `OutForDelivery` -> `Delivered`
///
/// `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed by the customer, not yet accepted by the restaurant
    Pending,

    /// Accepted by the restaurant and being cooked
    Preparing,

    /// Cooked and waiting for a delivery partner
    ReadyForPickup,

    /// Picked up and on the way to the customer
    OutForDelivery,

    Delivered,

    Cancelled,
}

impl OrderStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Preparing => "PREPARING",
            Self::ReadyForPickup => "READY_FOR_PICKUP",
            Self::OutForDelivery => "OUT_FOR_DELIVERY",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// An active order still needs tracking.
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Preparing | Self::ReadyForPickup | Self::OutForDelivery
        )
    }

    pub const fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Single-step transitions accepted by the backend.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Preparing | Self::Cancelled)
                | (Self::Preparing, Self::ReadyForPickup | Self::Cancelled)
                | (Self::ReadyForPickup, Self::OutForDelivery | Self::Cancelled)
                | (Self::OutForDelivery, Self::Delivered)
        )
    }

    /// Whether `next` can be reached from `self` in zero or more forward steps.
    pub fn reaches(self, next: Self) -> bool {
        let mut current = self;

        loop {
            if current == next || current.can_transition_to(next) {
                return true;
            }

            match current.next_in_progression() {
                Some(following) => current = following,
                None => return false,
            }
        }
    }

    const fn next_in_progression(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Preparing),
            Self::Preparing => Some(Self::ReadyForPickup),
            Self::ReadyForPickup => Some(Self::OutForDelivery),
            Self::OutForDelivery => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseOrderStatusError {
    #[error(
        "Invalid order status: '{0}'. Expected one of: PENDING, PREPARING, READY_FOR_PICKUP, OUT_FOR_DELIVERY, DELIVERED, CANCELLED"
    )]
    InvalidStatus(String),
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseOrderStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PREPARING" => Ok(Self::Preparing),
            "READY_FOR_PICKUP" => Ok(Self::ReadyForPickup),
            "OUT_FOR_DELIVERY" => Ok(Self::OutForDelivery),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(ParseOrderStatusError::InvalidStatus(s.to_string())),
        }
    }
}
