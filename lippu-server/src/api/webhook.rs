//! Inbound payment webhook.
//!
//! The forwarding-address provider notifies us with a GET request to the
//! callback URL we registered for the order:
//!
//! ```text
//! GET /callback/{token}?value=..&input_address=..&destination_address=..
//!     &confirmations=..&transaction_hash=..&input_transaction_hash=..
//!     &secret=..
//! ```
//!
//! The notifier retries the callback until the response body is exactly
//! `*ok*`, so that acknowledgment is only sent once the event is safely
//! recorded. A bad token, bad secret, or unknown order all answer 404
//! without distinguishing which check failed.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lippu_core::checkout::reconciler::IncomingPayment;
use lippu_core::checkout::{PaymentOutcome, ReconcileError, record_payment};
use serde::Deserialize;

use crate::state::AppState;

/// Body the notifier looks for to stop retrying.
const ACK: &str = "*ok*";

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// Amount received, in satoshi.
    pub value: i64,
    pub input_address: String,
    pub destination_address: String,
    pub confirmations: i32,
    pub transaction_hash: String,
    #[serde(default)]
    pub input_transaction_hash: Option<String>,
    pub secret: String,
}

/// `GET /callback/{token}` — process one payment notification.
pub async fn payment_callback(
    state: State<AppState>,
    Path(token): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Ok(order_id) = state.codec.decode(&token) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    let payment_config = state.payment.read().await.clone();
    if ring::constant_time::verify_slices_are_equal(
        params.secret.as_bytes(),
        payment_config.webhook_secret_bytes(),
    )
    .is_err()
    {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }

    let payment = IncomingPayment {
        order_id,
        amount_satoshi: params.value,
        source_address: params.input_address,
        destination_address: params.destination_address,
        confirmations: params.confirmations,
        txn_hash: params.transaction_hash,
        source_txn_hash: params.input_transaction_hash.unwrap_or_default(),
    };

    match record_payment(&state.db, &payment_config, payment).await {
        Ok(PaymentOutcome::Paid { .. })
        | Ok(PaymentOutcome::Accumulating { .. })
        | Ok(PaymentOutcome::AlreadyClosed { .. }) => (StatusCode::OK, ACK).into_response(),
        // Recorded but not reconcilable yet; withhold the ack so the
        // notifier redelivers once the session is initiated.
        Ok(PaymentOutcome::AwaitingInitiation { .. }) => {
            (StatusCode::OK, "pending").into_response()
        }
        // Not enough confirmations yet. The notifier re-notifies on each
        // new block, so answer 200 without the ack.
        Err(ReconcileError::Unconfirmed { confirmations, required }) => {
            tracing::debug!(%order_id, confirmations, required, "payment not yet confirmed");
            (StatusCode::OK, "waiting for confirmations").into_response()
        }
        Err(ReconcileError::UnknownOrder(_)) => {
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
        Err(e) => {
            tracing::error!(%order_id, error = %e, "payment callback processing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}
