//! Admin API handlers.
//!
//! These endpoints are called by back-office tooling and require the
//! `Lippu-Admin-Authorization` header with the plaintext admin secret.
//!
//! # Endpoints
//!
//! - `GET  /orders`                      – list orders by lifecycle state
//! - `POST /orders/{order_id}/force-pay` – mark an order paid, bypassing payment
//! - `POST /categories`                  – create a ticket category
//! - `POST /tickets`                     – add a ticket to stock

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use lippu_core::entities::order::Order;
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;

mod add_ticket;
mod create_category;
mod force_pay;
mod list_orders;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders::list_orders))
        .route("/orders/{order_id}/force-pay", post(force_pay::force_pay))
        .route("/categories", post(create_category::create_category))
        .route("/tickets", post(add_ticket::add_ticket))
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in Admin API handlers.
#[derive(Debug)]
pub(crate) enum AdminApiError {
    Database(sqlx::Error),
    NotFound,
    Conflict(String),
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminApiError::Database(e) => {
                tracing::error!(error = %e, "Admin API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            AdminApiError::NotFound => {
                (StatusCode::NOT_FOUND, "resource not found").into_response()
            }
            AdminApiError::Conflict(message) => (StatusCode::CONFLICT, message).into_response(),
        }
    }
}

/// Postgres unique-constraint violation (SQLSTATE 23505).
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.as_ref() == "23505")
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// The admin's view of an order. Unlike the customer view it exposes the
/// raw UUID, which the force-pay endpoint is addressed by.
#[derive(Serialize)]
pub(crate) struct AdminOrderView {
    pub id: Uuid,
    pub created_at: i64,
    pub email: String,
    pub ip: Option<String>,
    pub state: String,
    pub payment_address: Option<String>,
    pub price_satoshi: Option<i64>,
}

pub(crate) fn order_to_admin_view(order: &Order, state: &str) -> AdminOrderView {
    AdminOrderView {
        id: order.id,
        created_at: order.created_at.assume_utc().unix_timestamp(),
        email: order.email.clone(),
        ip: order.ip.clone(),
        state: state.to_string(),
        payment_address: order.payment_address.clone(),
        price_satoshi: order.price_satoshi,
    }
}
