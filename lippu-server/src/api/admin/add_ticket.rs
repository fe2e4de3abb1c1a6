use axum::{Json, http::StatusCode, response::IntoResponse};
use lippu_core::entities::category::Category;
use lippu_core::entities::ticket::{NewTicket, Ticket};
use serde::{Deserialize, Serialize};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, is_unique_violation};

#[derive(Debug, Deserialize)]
pub(super) struct AddTicketRequest {
    category_id: i64,
    serial_no: String,
    cost_cents: i64,
    expires: time::Date,
}

#[derive(Serialize)]
struct TicketAdded {
    id: i64,
    category_id: i64,
    serial_no: String,
    expires: time::Date,
}

/// `POST /tickets` — add one purchased ticket to the stock of a category.
pub(super) async fn add_ticket(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Json(body): Json<AddTicketRequest>,
) -> Result<impl IntoResponse, AdminApiError> {
    Category::get(&state.db, body.category_id)
        .await
        .map_err(AdminApiError::Database)?
        .ok_or(AdminApiError::NotFound)?;

    let ticket = Ticket::insert(
        &state.db,
        NewTicket {
            category_id: body.category_id,
            serial_no: body.serial_no,
            cost_cents: body.cost_cents,
            expires: body.expires,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AdminApiError::Conflict("a ticket with this serial number already exists".into())
        } else {
            AdminApiError::Database(e)
        }
    })?;

    tracing::info!(
        ticket_id = ticket.id,
        category_id = ticket.category_id,
        serial_no = %ticket.serial_no,
        "ticket added to stock"
    );
    Ok((
        StatusCode::CREATED,
        Json(TicketAdded {
            id: ticket.id,
            category_id: ticket.category_id,
            serial_no: ticket.serial_no,
            expires: ticket.expires,
        }),
    ))
}
