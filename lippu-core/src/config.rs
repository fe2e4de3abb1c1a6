//! Runtime configuration types.
//!
//! These are the validated forms the core components take in their
//! constructors. Loading and parsing the TOML file is the server's job;
//! nothing in this crate reads global state.

use rust_decimal::Decimal;
use url::Url;

/// Business rules for order placement and expiry.
#[derive(Debug, Clone)]
pub struct OrderPolicy {
    /// Maximum total quantity of tickets across one order's basket.
    pub max_tickets_per_order: i64,
    /// How long an open order may stay unpaid before the expiry sweep
    /// closes it.
    pub order_timeout: time::Duration,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            max_tickets_per_order: 5,
            order_timeout: time::Duration::minutes(60),
        }
    }
}

/// Payment-side configuration shared by the session initiator and the
/// reconciler.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Our long-term receiving address; payments are forwarded here.
    pub receiving_address: String,
    /// Base URL the notifier calls back on, e.g. `https://shop.example`.
    /// The per-order callback path is appended to this.
    pub callback_base_url: Url,
    /// Revenue-sharing flag passed through to the address provider.
    pub shared: bool,
    /// Shared secret embedded in callback URLs and checked on every
    /// inbound notification.
    pub webhook_secret: String,
    /// Fee margin added on top of the fiat price, as a fraction in
    /// `[0, 1)`. `0.02` means the customer pays ~2% over the spot rate.
    pub fee_fraction: Decimal,
    /// Minimum confirmation count before a payment event is credited.
    /// Zero accepts provisional (mempool) notifications.
    pub min_confirmations: i32,
    /// How many times the paid transition is retried on transaction
    /// conflicts before the failure is surfaced.
    pub paid_transition_retries: u32,
}

impl PaymentConfig {
    pub fn webhook_secret_bytes(&self) -> &[u8] {
        self.webhook_secret.as_bytes()
    }
}

/// Admin authentication: an argon2 hash of the admin secret.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    /// Verify a presented plaintext secret against the stored hash.
    pub fn verify(&self, presented: &str) -> bool {
        use argon2::{Argon2, PasswordHash, PasswordVerifier};

        let Ok(parsed) = PasswordHash::new(&self.secret_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(presented.as_bytes(), &parsed)
            .is_ok()
    }
}
