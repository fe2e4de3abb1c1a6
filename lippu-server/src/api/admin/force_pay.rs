use axum::{Json, extract::Path, http::StatusCode, response::IntoResponse};
use lippu_core::checkout::{self, PaidTransition, ReconcileError};
use lippu_core::entities::OrderState;
use serde::Serialize;
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

#[derive(Serialize)]
struct ForcePayResponse {
    order_id: Uuid,
    state: &'static str,
    tickets_allocated: u64,
}

/// `POST /orders/{order_id}/force-pay` — mark an order paid without
/// payment verification, e.g. for cash sales or goodwill.
///
/// Runs the same transition and ticket allocation as a real payment.
/// Idempotent on already-paid orders; a cancelled or expired order
/// answers 409, and so does an order the inventory cannot cover.
pub(super) async fn force_pay(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    match checkout::force_pay(&state.db, order_id).await {
        Ok(PaidTransition::Completed { tickets_allocated }) => Ok((
            StatusCode::OK,
            Json(ForcePayResponse {
                order_id,
                state: "paid",
                tickets_allocated,
            }),
        )),
        Ok(PaidTransition::AlreadyClosed(OrderState::Paid)) => Ok((
            StatusCode::OK,
            Json(ForcePayResponse {
                order_id,
                state: "paid",
                tickets_allocated: 0,
            }),
        )),
        Ok(PaidTransition::AlreadyClosed(other)) => Err(AdminApiError::Conflict(format!(
            "order is already {other}"
        ))),
        Err(ReconcileError::UnknownOrder(_)) => Err(AdminApiError::NotFound),
        Err(ReconcileError::Allocation(e)) => Err(AdminApiError::Conflict(format!(
            "cannot allocate tickets: {e}"
        ))),
        Err(ReconcileError::Database(e)) => Err(AdminApiError::Database(e)),
        Err(e) => {
            tracing::error!(%order_id, error = %e, "force-pay failed");
            Err(AdminApiError::Conflict(e.to_string()))
        }
    }
}
