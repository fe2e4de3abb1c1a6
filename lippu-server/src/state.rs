//! Application state shared across all request handlers.

use crate::config::LoadedConfig;
use lippu_core::config::{AdminConfig, OrderPolicy, PaymentConfig};
use lippu_core::providers::address::{AddressProvider, BlockchainReceiveApi};
use lippu_core::providers::rates::{
    BlockchainTickerSource, CoinDeskSource, FallbackRateSource, RateProviderKind, RateSource,
};
use lippu_core::token::OrderTokenCodec;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Application state that is shared across all request handlers.
///
/// Cloneable and cheap to pass around (everything is behind Arc). The
/// config sections are individually locked so a SIGHUP reload swaps them
/// without blocking in-flight requests. The token codec and the provider
/// clients are fixed at startup; changing the token secret or provider
/// endpoints requires a restart.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Admin authentication (reloadable).
    pub admin: Arc<RwLock<AdminConfig>>,
    /// Payment-side configuration (reloadable).
    pub payment: Arc<RwLock<PaymentConfig>>,
    /// Order placement and expiry policy (reloadable).
    pub policy: Arc<RwLock<OrderPolicy>>,
    /// Codec for the signed order tokens in customer URLs.
    pub codec: Arc<OrderTokenCodec>,
    /// EUR/BTC exchange rate source (primary with fallback).
    pub rates: Arc<dyn RateSource>,
    /// Forwarding-address provider.
    pub addresses: Arc<dyn AddressProvider>,
}

impl AppState {
    /// Build the state from a freshly loaded configuration.
    pub fn new(db: PgPool, config: LoadedConfig) -> Self {
        let http = reqwest::Client::new();

        let ticker: Box<dyn RateSource> = Box::new(BlockchainTickerSource::new(
            http.clone(),
            config.providers.ticker_base_url.clone(),
        ));
        let coindesk: Box<dyn RateSource> = Box::new(CoinDeskSource::new(
            http.clone(),
            config.providers.coindesk_base_url.clone(),
        ));
        let rates = match config.providers.rate_provider {
            RateProviderKind::BlockchainTicker => FallbackRateSource::new(ticker, coindesk),
            RateProviderKind::CoinDesk => FallbackRateSource::new(coindesk, ticker),
        };

        let addresses =
            BlockchainReceiveApi::new(http, config.providers.receive_base_url.clone());

        Self {
            db,
            admin: Arc::new(RwLock::new(config.admin)),
            payment: Arc::new(RwLock::new(config.payment)),
            policy: Arc::new(RwLock::new(config.policy)),
            codec: Arc::new(OrderTokenCodec::new(config.token_secret.as_bytes())),
            rates: Arc::new(rates),
            addresses: Arc::new(addresses),
        }
    }

    /// Update the reloadable config sections (used during SIGHUP reload).
    pub async fn update_config(&self, new_config: LoadedConfig) {
        *self.admin.write().await = new_config.admin;
        *self.payment.write().await = new_config.payment;
        *self.policy.write().await = new_config.policy;
    }
}
