use axum::{Json, extract::Query, response::IntoResponse};
use kanau::processor::Processor;
use lippu_core::entities::OrderState;
use lippu_core::entities::order::ListOrdersByState;
use lippu_core::framework::DatabaseProcessor;
use serde::Deserialize;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, order_to_admin_view};

/// Lifecycle filter for the order listing. `open` selects orders with no
/// terminal status yet.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum StateFilter {
    #[default]
    Open,
    Paid,
    Cancelled,
    Expired,
}

impl StateFilter {
    fn to_state(self) -> Option<OrderState> {
        match self {
            StateFilter::Open => None,
            StateFilter::Paid => Some(OrderState::Paid),
            StateFilter::Cancelled => Some(OrderState::Cancelled),
            StateFilter::Expired => Some(OrderState::Expired),
        }
    }

    fn label(self) -> &'static str {
        match self {
            StateFilter::Open => "open",
            StateFilter::Paid => "paid",
            StateFilter::Cancelled => "cancelled",
            StateFilter::Expired => "expired",
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ListOrdersQuery {
    #[serde(default)]
    state: StateFilter,
}

/// `GET /orders?state=` — list orders in one lifecycle state.
///
/// Defaults to the open orders, the ones that may still need attention.
pub(super) async fn list_orders(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, AdminApiError> {
    let processor = DatabaseProcessor {
        pool: state.db.clone(),
    };

    let orders = processor
        .process(ListOrdersByState {
            state: query.state.to_state(),
        })
        .await
        .map_err(AdminApiError::Database)?;

    let label = query.state.label();
    let response: Vec<_> = orders
        .iter()
        .map(|o| order_to_admin_view(o, label))
        .collect();
    Ok(Json(response))
}
