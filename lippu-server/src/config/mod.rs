//! Configuration module for lippu-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments,
//! and environment variables. Also handles admin secret hashing.

pub mod file;

use crate::config::file::{FileConfig, ProvidersConfig};
use lippu_core::config::{AdminConfig, OrderPolicy, PaymentConfig};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub admin: AdminConfig,
    pub payment: PaymentConfig,
    pub policy: OrderPolicy,
    pub token_secret: String,
    pub providers: ProvidersConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        self.validate(&file_config)?;

        // Hash admin secret if needed and rewrite config
        let secret_hash = if file_config.is_admin_secret_hashed() {
            file_config.admin.secret.clone()
        } else {
            let hash = self.hash_secret(&file_config.admin.secret)?;
            file_config.admin.secret = hash.clone();
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin secret hashed and config file updated");
            hash
        };

        Ok(build_loaded_config(file_config, secret_hash))
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let payment = &config.payment;
        if payment.receiving_address.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "payment.receiving_address must not be empty".into(),
            ));
        }
        if payment.token_secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "payment.token_secret must not be empty".into(),
            ));
        }
        if payment.webhook_secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "payment.webhook_secret must not be empty".into(),
            ));
        }
        if payment.fee_fraction < Decimal::ZERO || payment.fee_fraction >= Decimal::ONE {
            return Err(ConfigError::ValidationError(format!(
                "payment.fee_fraction {} must lie in [0, 1)",
                payment.fee_fraction
            )));
        }
        if payment.max_tickets_per_order <= 0 {
            return Err(ConfigError::ValidationError(
                "payment.max_tickets_per_order must be positive".into(),
            ));
        }
        if payment.order_timeout_minutes <= 0 {
            return Err(ConfigError::ValidationError(
                "payment.order_timeout_minutes must be positive".into(),
            ));
        }
        if payment.callback_base_url.cannot_be_a_base() {
            return Err(ConfigError::ValidationError(format!(
                "payment.callback_base_url {} cannot carry a path",
                payment.callback_base_url
            )));
        }
        Ok(())
    }

    fn hash_secret(&self, plaintext: &str) -> Result<String, ConfigError> {
        use argon2::{
            Argon2, PasswordHasher,
            password_hash::{SaltString, rand_core::OsRng},
        };

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ConfigError::HashError(e.to_string()))
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn build_loaded_config(file_config: FileConfig, secret_hash: String) -> LoadedConfig {
    let p = file_config.payment;
    LoadedConfig {
        listen: file_config.server.listen,
        admin: AdminConfig::new(secret_hash),
        payment: PaymentConfig {
            receiving_address: p.receiving_address,
            callback_base_url: p.callback_base_url,
            shared: p.shared,
            webhook_secret: p.webhook_secret,
            fee_fraction: p.fee_fraction,
            min_confirmations: p.min_confirmations,
            paid_transition_retries: p.paid_transition_retries,
        },
        policy: OrderPolicy {
            max_tickets_per_order: p.max_tickets_per_order,
            order_timeout: time::Duration::minutes(p.order_timeout_minutes),
        },
        token_secret: p.token_secret,
        providers: file_config.providers,
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
