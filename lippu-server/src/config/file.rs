//! TOML file configuration structures.
//!
//! These structs directly map to the `lippu-config.toml` file format.

use lippu_core::providers::rates::RateProviderKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub payment: PaymentConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid default address")
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// Payment and order-policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Our long-term bitcoin address; customer payments are forwarded here.
    pub receiving_address: String,
    /// Public base URL of this server, used to build callback URLs.
    pub callback_base_url: Url,
    /// Revenue-sharing flag passed through to the address provider.
    #[serde(default)]
    pub shared: bool,
    /// Key for signing the order tokens in customer and callback URLs.
    pub token_secret: String,
    /// Shared secret the payment notifier must echo on every callback.
    pub webhook_secret: String,
    /// Fee margin on top of the fiat price, as a fraction in `[0, 1)`.
    #[serde(default)]
    pub fee_fraction: Decimal,
    /// Minimum confirmations before a payment is credited.
    #[serde(default)]
    pub min_confirmations: i32,
    /// Retries of the paid transition on transaction conflicts.
    #[serde(default = "default_paid_transition_retries")]
    pub paid_transition_retries: u32,
    /// Maximum total tickets in one order.
    #[serde(default = "default_max_tickets_per_order")]
    pub max_tickets_per_order: i64,
    /// Minutes before an unpaid order is expired.
    #[serde(default = "default_order_timeout_minutes")]
    pub order_timeout_minutes: i64,
}

fn default_paid_transition_retries() -> u32 {
    3
}

fn default_max_tickets_per_order() -> i64 {
    5
}

fn default_order_timeout_minutes() -> i64 {
    60
}

/// External provider endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Which ticker API is the primary exchange-rate source; the other
    /// one is used as fallback.
    #[serde(default = "default_rate_provider")]
    pub rate_provider: RateProviderKind,
    #[serde(default = "default_ticker_base_url")]
    pub ticker_base_url: Url,
    #[serde(default = "default_coindesk_base_url")]
    pub coindesk_base_url: Url,
    /// Base URL of the forwarding-address receive API.
    #[serde(default = "default_receive_base_url")]
    pub receive_base_url: Url,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            rate_provider: default_rate_provider(),
            ticker_base_url: default_ticker_base_url(),
            coindesk_base_url: default_coindesk_base_url(),
            receive_base_url: default_receive_base_url(),
        }
    }
}

fn default_rate_provider() -> RateProviderKind {
    RateProviderKind::BlockchainTicker
}

fn default_ticker_base_url() -> Url {
    "https://blockchain.info/".parse().expect("valid default URL")
}

fn default_coindesk_base_url() -> Url {
    "https://api.coindesk.com/".parse().expect("valid default URL")
}

fn default_receive_base_url() -> Url {
    "https://blockchain.info/".parse().expect("valid default URL")
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[admin]
secret = "test-secret"

[payment]
receiving_address = "1LongTermAddress"
callback_base_url = "https://shop.example/"
token_secret = "token-key"
webhook_secret = "hunter2"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert!(!config.is_admin_secret_hashed());
        assert_eq!(config.payment.max_tickets_per_order, 5);
        assert_eq!(config.payment.order_timeout_minutes, 60);
        assert_eq!(config.payment.min_confirmations, 0);
        assert!(!config.payment.shared);
        assert_eq!(
            config.providers.rate_provider,
            RateProviderKind::BlockchainTicker
        );
        assert_eq!(
            config.providers.receive_base_url.as_str(),
            "https://blockchain.info/"
        );
    }

    #[test]
    fn provider_selection_parses() {
        let toml_str = r#"
[server]

[admin]
secret = "$argon2id$v=19$m=19456,t=2,p=1$abc123"

[payment]
receiving_address = "1LongTermAddress"
callback_base_url = "https://shop.example/"
token_secret = "token-key"
webhook_secret = "hunter2"
fee_fraction = "0.02"
min_confirmations = 2

[providers]
rate_provider = "coin-desk"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.is_admin_secret_hashed());
        assert_eq!(config.providers.rate_provider, RateProviderKind::CoinDesk);
        assert_eq!(config.payment.min_confirmations, 2);
        assert_eq!(
            config.payment.fee_fraction,
            "0.02".parse::<Decimal>().unwrap()
        );
    }
}
