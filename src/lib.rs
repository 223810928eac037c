pub mod cart;
pub mod checkout;
pub mod cli;
pub mod env;
mod error;
pub mod poller;
mod telemetry;

pub use cart::CartService;
pub use checkout::{Checkout, CheckoutStep};
pub use env::{Env, LogLevel, setup_tracing};
pub use error::{CartError, CheckoutError, OrderPollingError};
pub use poller::{
    OrderPollerConfig, OrderStatusPoller, PollerHandle, PollingStopped, RefreshOutcome,
};
pub use telemetry::{TelemetryError, TelemetryGuard};
