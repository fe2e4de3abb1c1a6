use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use lippu_core::entities::order::Order;

use super::{OrderApiError, order_view, resolve_token};
use crate::state::AppState;

/// `GET /orders/{token}` — poll the order: lifecycle state, basket lines,
/// payment coordinates, and the allocated tickets once paid.
pub(super) async fn get_order(
    state: State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, OrderApiError> {
    let order_id = resolve_token(&state, &token)?;

    let order = Order::get(&state.db, order_id)
        .await
        .map_err(OrderApiError::Database)?
        .ok_or(OrderApiError::NotFound)?;

    let view = order_view(&state, &order).await?;
    Ok(Json(view))
}
