//! Payment session initiation.
//!
//! Attaches payment coordinates to a pending order: the satoshi price
//! (via the exchange-rate provider) and a forwarding address bound to a
//! signed callback URL (via the address provider). Each coordinate is
//! written at most once; re-initiation is explicit and idempotent, and a
//! provider failure leaves the order pending and untouched.

use crate::checkout::pricing::satoshi_price;
use crate::config::PaymentConfig;
use crate::entities::OrderState;
use crate::entities::order::{Order, OrderLine};
use crate::entities::order_status::OrderStatus;
use crate::providers::address::{AddressError, AddressProvider};
use crate::providers::rates::{RateError, RateSource};
use crate::token::OrderTokenCodec;
use sqlx::PgPool;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// The payment coordinates of an initiated order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCoordinates {
    pub payment_address: String,
    pub price_satoshi: i64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unknown order {0}")]
    UnknownOrder(Uuid),

    #[error("order is already {0}")]
    Closed(OrderState),

    #[error("exchange rate unavailable: {0}")]
    RateUnavailable(#[from] RateError),

    #[error("address provider failed: {0}")]
    AddressUnavailable(#[from] AddressError),

    #[error("order total does not convert to a positive payment amount")]
    UnpriceableOrder,

    #[error("callback base URL cannot carry path segments")]
    InvalidCallbackBase,
}

/// Payment session initiator. Holds the provider capabilities and the
/// payment configuration; all state lives in the database.
pub struct PaymentSession<'a> {
    rates: &'a dyn RateSource,
    addresses: &'a dyn AddressProvider,
    codec: &'a OrderTokenCodec,
    config: &'a PaymentConfig,
}

impl<'a> PaymentSession<'a> {
    pub fn new(
        rates: &'a dyn RateSource,
        addresses: &'a dyn AddressProvider,
        codec: &'a OrderTokenCodec,
        config: &'a PaymentConfig,
    ) -> Self {
        Self {
            rates,
            addresses,
            codec,
            config,
        }
    }

    /// Initiate (or re-initiate) the payment session for an open order.
    ///
    /// Fills in whichever coordinate is still missing and returns both.
    /// Calling it on a fully initiated order is a read-only no-op, so the
    /// operation can be retried freely after provider outages.
    pub async fn initiate(
        &self,
        pool: &PgPool,
        order_id: Uuid,
    ) -> Result<SessionCoordinates, SessionError> {
        let order = Order::get(pool, order_id)
            .await?
            .ok_or(SessionError::UnknownOrder(order_id))?;
        if let Some(status) = OrderStatus::get_for_order(pool, order_id).await? {
            return Err(SessionError::Closed(status.status));
        }

        if let (Some(address), Some(price)) = (&order.payment_address, order.price_satoshi) {
            return Ok(SessionCoordinates {
                payment_address: address.clone(),
                price_satoshi: price,
            });
        }

        // Price first: if the rate source is down we fail before spending
        // an address-provider call.
        let price_satoshi = match order.price_satoshi {
            Some(price) => price,
            None => {
                let rate = self.rates.eur_per_btc().await?;
                let lines = Order::lines(pool, order_id).await?;
                let total_cents = OrderLine::total_cents(&lines);
                let price = satoshi_price(total_cents, rate, self.config.fee_fraction)
                    .ok_or(SessionError::UnpriceableOrder)?;
                Order::attach_price(pool, order_id, price)
                    .await?
                    .ok_or(SessionError::UnknownOrder(order_id))?
            }
        };

        let payment_address = match order.payment_address {
            Some(address) => address,
            None => {
                let callback = self.callback_url(order_id)?;
                let address = self
                    .addresses
                    .forwarding_address(&self.config.receiving_address, self.config.shared, &callback)
                    .await?;
                Order::attach_payment_address(pool, order_id, &address)
                    .await?
                    .ok_or(SessionError::UnknownOrder(order_id))?
            }
        };

        tracing::info!(
            %order_id,
            payment_address = %payment_address,
            price_satoshi,
            "payment session initiated"
        );
        Ok(SessionCoordinates {
            payment_address,
            price_satoshi,
        })
    }

    /// The notifier's callback URL for an order:
    /// `{base}/callback/{signed token}?secret={webhook secret}`.
    ///
    /// The token binds the callback to the order id, the secret
    /// authenticates the notifier; both are verified on every inbound
    /// notification.
    fn callback_url(&self, order_id: Uuid) -> Result<Url, SessionError> {
        let token = self.codec.encode(order_id);
        let mut url = self.config.callback_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SessionError::InvalidCallbackBase)?
            .pop_if_empty()
            .extend(["callback", &token]);
        url.query_pairs_mut()
            .append_pair("secret", &self.config.webhook_secret);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use rust_decimal::Decimal;

    fn config() -> PaymentConfig {
        PaymentConfig {
            receiving_address: "1ReceivingAddress".into(),
            callback_base_url: "https://shop.example".parse().expect("static url"),
            shared: false,
            webhook_secret: "hunter2".into(),
            fee_fraction: Decimal::ZERO,
            min_confirmations: 0,
            paid_transition_retries: 3,
        }
    }

    struct NoRates;
    #[async_trait::async_trait]
    impl RateSource for NoRates {
        async fn eur_per_btc(&self) -> Result<Decimal, RateError> {
            Err(RateError::Unavailable("test".into()))
        }
    }

    struct NoAddresses;
    #[async_trait::async_trait]
    impl AddressProvider for NoAddresses {
        async fn forwarding_address(
            &self,
            _receiving: &str,
            _shared: bool,
            _callback: &Url,
        ) -> Result<String, AddressError> {
            Err(AddressError::Unavailable("test".into()))
        }
    }

    #[test]
    fn callback_url_carries_token_and_secret() {
        let config = config();
        let codec = OrderTokenCodec::new(b"token-key");
        let session = PaymentSession::new(&NoRates, &NoAddresses, &codec, &config);

        let order_id = Uuid::new_v4();
        let url = session.callback_url(order_id).expect("valid base");

        assert_eq!(url.host_str(), Some("shop.example"));
        let segments: Vec<&str> = url.path_segments().expect("path").collect();
        assert_eq!(segments[0], "callback");
        // The embedded token decodes back to the same order.
        assert_eq!(codec.decode(segments[1]).ok(), Some(order_id));
        assert_eq!(
            url.query_pairs().find(|(k, _)| k == "secret").map(|(_, v)| v.into_owned()),
            Some("hunter2".to_string())
        );
    }
}
