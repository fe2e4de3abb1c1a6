use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use lippu_core::checkout::PaymentSession;

use super::{OrderApiError, PaymentView, resolve_token};
use crate::state::AppState;

/// `POST /orders/{token}/payment` — initiate the payment session.
///
/// Converts the order total at the current exchange rate, requests a
/// forwarding address bound to our callback URL, and returns both.
/// Idempotent: repeating the call returns the coordinates already on the
/// order, so customers can safely retry after a provider outage.
pub(super) async fn initiate_payment(
    state: State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, OrderApiError> {
    let order_id = resolve_token(&state, &token)?;

    let payment_config = state.payment.read().await.clone();
    let session = PaymentSession::new(
        state.rates.as_ref(),
        state.addresses.as_ref(),
        state.codec.as_ref(),
        &payment_config,
    );

    let coordinates = session.initiate(&state.db, order_id).await?;

    Ok(Json(PaymentView {
        address: coordinates.payment_address,
        price_satoshi: coordinates.price_satoshi,
    }))
}
