use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use lippu_core::checkout::{CloseOutcome, LifecycleError, cancel};
use lippu_core::entities::OrderState;
use lippu_core::entities::order::Order;

use super::{OrderApiError, order_view, resolve_token};
use crate::state::AppState;

/// `POST /orders/{token}/cancel` — cancel an open order.
///
/// Idempotent: cancelling an already-cancelled order succeeds again, but
/// a paid or expired order answers 409 with its actual state.
pub(super) async fn cancel_order(
    state: State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, OrderApiError> {
    let order_id = resolve_token(&state, &token)?;

    let outcome = cancel(&state.db, order_id).await.map_err(|e| match e {
        LifecycleError::Database(e) => OrderApiError::Database(e),
        LifecycleError::UnknownOrder(_) => OrderApiError::NotFound,
    })?;

    match outcome {
        CloseOutcome::Closed(_) | CloseOutcome::AlreadyClosed(OrderState::Cancelled) => {}
        CloseOutcome::AlreadyClosed(state) => return Err(OrderApiError::Closed(state)),
    }

    let order = Order::get(&state.db, order_id)
        .await
        .map_err(OrderApiError::Database)?
        .ok_or(OrderApiError::NotFound)?;
    let view = order_view(&state, &order).await?;
    Ok(Json(view))
}
