use clap::Parser;
use quickbite_marketplace::{
    ApiEnv, BearerToken, DynMarketplace, HttpMarketplace, MarketplaceError, Session,
    TestMarketplace, UserId,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

use crate::poller::OrderPollerConfig;
use crate::telemetry::{TelemetryConfig, TelemetryGuard, default_filter, setup_telemetry};

#[derive(clap::ValueEnum, Debug, Clone)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        (&log_level).into()
    }
}

impl From<&LogLevel> for Level {
    fn from(log_level: &LogLevel) -> Self {
        match log_level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct Env {
    #[clap(long, env, default_value = "info")]
    pub log_level: LogLevel,
    #[clap(flatten)]
    pub api: ApiEnv,
    /// Identifier of the signed-in user
    #[clap(long, env)]
    pub user_id: u64,
    /// Bearer token issued at sign-in
    #[clap(long, env)]
    pub auth_token: BearerToken,
    /// Interval in seconds between order status refreshes
    #[clap(long, env, default_value = "10")]
    pub order_polling_interval: u64,
    /// Use an in-memory marketplace instead of the REST API
    #[clap(long, env, default_value = "false")]
    pub dry_run: bool,
    /// OTLP/HTTP traces endpoint (optional)
    #[clap(long, env)]
    pub otlp_endpoint: Option<String>,
    /// Value sent as the authorization header to the OTLP endpoint
    #[clap(long, env)]
    pub otlp_api_key: Option<String>,
    #[clap(long, env, default_value = "quickbite")]
    pub service_name: String,
}

impl Env {
    pub const fn get_order_poller_config(&self) -> OrderPollerConfig {
        OrderPollerConfig {
            polling_interval: Duration::from_secs(self.order_polling_interval),
            request_timeout: self.api.request_timeout(),
        }
    }

    pub fn session(&self) -> Session {
        Session {
            user_id: UserId(self.user_id),
            token: self.auth_token.clone(),
        }
    }

    pub fn get_marketplace(&self) -> Result<DynMarketplace, MarketplaceError> {
        if self.dry_run {
            Ok(Arc::new(TestMarketplace::new(UserId(self.user_id))))
        } else {
            Ok(Arc::new(HttpMarketplace::new(&self.api, self.session())?))
        }
    }
}

/// Installs console logging, plus span export when an OTLP endpoint is
/// configured. Keep the returned guard alive for the life of the process.
pub fn setup_tracing(env: &Env) -> Option<TelemetryGuard> {
    let level: Level = (&env.log_level).into();

    if let Some(endpoint) = &env.otlp_endpoint {
        let config = TelemetryConfig {
            endpoint: endpoint.clone(),
            api_key: env.otlp_api_key.clone(),
            service_name: env.service_name.clone(),
        };

        match setup_telemetry(config, level) {
            Ok(guard) => return Some(guard),
            Err(e) => {
                eprintln!("Failed to set up OTLP export: {e}, falling back to console logging");
            }
        }
    }

    setup_console_tracing(level);
    None
}

fn setup_console_tracing(level: Level) {
    // Ignore the error if a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(level).into()),
        )
        .compact()
        .try_init();
}
