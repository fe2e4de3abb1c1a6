use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use lippu_core::checkout::{BasketItem, NewOrder, place_order};
use serde::Deserialize;

use super::{OrderApiError, order_view};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct CreateOrderRequest {
    email: String,
    items: Vec<BasketItem>,
}

/// `POST /orders` — validate a basket and place a pending order.
///
/// Responds 201 with the order view; the `token` field is the handle for
/// all further customer requests.
pub(super) async fn create_order(
    state: State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, OrderApiError> {
    let policy = state.policy.read().await.clone();

    let order = place_order(
        &state.db,
        &policy,
        NewOrder {
            email: body.email,
            ip: client_ip(&headers),
            items: body.items,
        },
    )
    .await?;

    let view = order_view(&state, &order).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// The client address as reported by the reverse proxy, for the audit
/// trail on the order row.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ip_takes_the_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "198.51.100.7, 10.0.0.1".parse().unwrap(),
        );
        assert_eq!(client_ip(&headers), Some("198.51.100.7".to_string()));
    }

    #[test]
    fn client_ip_is_absent_without_proxy_header() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
