//! Customer order API.
//!
//! Customers address orders only by the signed token issued at creation;
//! raw order UUIDs never leave the admin surface. An unknown token and a
//! token with a bad signature both answer 404.
//!
//! # Endpoints
//!
//! - `POST /`                 – place an order
//! - `GET  /{token}`          – order status, lines, payment coordinates
//! - `POST /{token}/payment`  – initiate (or re-initiate) the payment session
//! - `POST /{token}/cancel`   – cancel an open order

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use lippu_core::checkout::{OrderValidationError, PlaceOrderError, SessionError};
use lippu_core::entities::OrderState;
use lippu_core::entities::allocation::Allocation;
use lippu_core::entities::order::{Order, OrderLine};
use lippu_core::entities::order_status::OrderStatus;
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;

mod cancel_order;
mod create_order;
mod get_order;
mod initiate_payment;

/// Build the customer order router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order::create_order))
        .route("/{token}", get(get_order::get_order))
        .route(
            "/{token}/payment",
            post(initiate_payment::initiate_payment),
        )
        .route("/{token}/cancel", post(cancel_order::cancel_order))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in customer order handlers.
#[derive(Debug)]
pub(crate) enum OrderApiError {
    /// A database query failed.
    Database(sqlx::Error),
    /// Bad token signature or no such order.
    NotFound,
    /// The submitted basket was rejected.
    Validation(OrderValidationError),
    /// The order is already in a terminal state.
    Closed(OrderState),
    /// An external payment provider is unavailable.
    ProviderUnavailable,
    /// The order total does not convert to a positive payment amount.
    Unpriceable,
}

impl IntoResponse for OrderApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            OrderApiError::Database(e) => {
                tracing::error!(error = %e, "order API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            OrderApiError::NotFound => (StatusCode::NOT_FOUND, "order not found").into_response(),
            OrderApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
            OrderApiError::Closed(state) => {
                (StatusCode::CONFLICT, format!("order is already {state}")).into_response()
            }
            OrderApiError::ProviderUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "payment provider unavailable, try again later",
            )
                .into_response(),
            OrderApiError::Unpriceable => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "order total cannot be priced",
            )
                .into_response(),
        }
    }
}

impl From<PlaceOrderError> for OrderApiError {
    fn from(err: PlaceOrderError) -> Self {
        match err {
            PlaceOrderError::Validation(e) => OrderApiError::Validation(e),
            PlaceOrderError::Database(e) => OrderApiError::Database(e),
        }
    }
}

impl From<SessionError> for OrderApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Database(e) => OrderApiError::Database(e),
            SessionError::UnknownOrder(_) => OrderApiError::NotFound,
            SessionError::Closed(state) => OrderApiError::Closed(state),
            SessionError::RateUnavailable(e) => {
                tracing::warn!(error = %e, "exchange rate unavailable");
                OrderApiError::ProviderUnavailable
            }
            SessionError::AddressUnavailable(e) => {
                tracing::warn!(error = %e, "address provider unavailable");
                OrderApiError::ProviderUnavailable
            }
            SessionError::UnpriceableOrder => OrderApiError::Unpriceable,
            SessionError::InvalidCallbackBase => {
                tracing::error!("callback base URL cannot carry path segments");
                OrderApiError::ProviderUnavailable
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shared response assembly
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub(crate) struct OrderView {
    pub token: String,
    pub created_at: i64,
    pub email: String,
    pub state: String,
    pub total_cents: i64,
    pub lines: Vec<LineView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tickets: Vec<TicketView>,
}

#[derive(Serialize)]
pub(crate) struct LineView {
    pub category_id: i64,
    pub quantity: i64,
    pub price_cents: i64,
}

#[derive(Serialize)]
pub(crate) struct PaymentView {
    pub address: String,
    pub price_satoshi: i64,
}

#[derive(Serialize)]
pub(crate) struct TicketView {
    pub category_id: i64,
    pub category_name: String,
    pub serial_no: String,
    pub expires: time::Date,
}

/// Resolve a presented token to an order id, mapping both a bad signature
/// and a malformed token to 404.
pub(crate) fn resolve_token(state: &AppState, token: &str) -> Result<Uuid, OrderApiError> {
    state.codec.decode(token).map_err(|_| OrderApiError::NotFound)
}

/// Assemble the customer-facing view of an order: lifecycle state, lines,
/// payment coordinates once initiated, and the allocated tickets once paid.
pub(crate) async fn order_view(
    state: &AppState,
    order: &Order,
) -> Result<OrderView, OrderApiError> {
    let status = OrderStatus::get_for_order(&state.db, order.id)
        .await
        .map_err(OrderApiError::Database)?;
    let lines = Order::lines(&state.db, order.id)
        .await
        .map_err(OrderApiError::Database)?;

    let tickets = match &status {
        Some(s) if s.status == OrderState::Paid => {
            Allocation::list_for_status(&state.db, s.id)
                .await
                .map_err(OrderApiError::Database)?
                .into_iter()
                .map(|t| TicketView {
                    category_id: t.category_id,
                    category_name: t.category_name,
                    serial_no: t.serial_no,
                    expires: t.expires,
                })
                .collect()
        }
        _ => Vec::new(),
    };

    let payment = match (&order.payment_address, order.price_satoshi) {
        (Some(address), Some(price_satoshi)) => Some(PaymentView {
            address: address.clone(),
            price_satoshi,
        }),
        _ => None,
    };

    Ok(OrderView {
        token: state.codec.encode(order.id),
        created_at: order.created_at.assume_utc().unix_timestamp(),
        email: order.email.clone(),
        state: match &status {
            None => "open".to_string(),
            Some(s) => s.status.to_string(),
        },
        total_cents: OrderLine::total_cents(&lines),
        lines: lines
            .into_iter()
            .map(|l| LineView {
                category_id: l.category_id,
                quantity: l.quantity,
                price_cents: l.price_cents,
            })
            .collect(),
        payment,
        tickets,
    })
}
