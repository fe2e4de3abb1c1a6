//! Public storefront category listing.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use kanau::processor::Processor;
use lippu_core::entities::category::{CategoryAvailability, ListCategories};
use lippu_core::framework::DatabaseProcessor;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct CategoryView {
    id: i64,
    name: String,
    description: String,
    price_cents: i64,
    available: i64,
}

/// `GET /categories` — list ticket categories with remaining availability.
pub async fn list_categories(state: State<AppState>) -> impl IntoResponse {
    let processor = DatabaseProcessor {
        pool: state.db.clone(),
    };

    match processor.process(ListCategories).await {
        Ok(categories) => {
            let view: Vec<CategoryView> = categories.into_iter().map(to_view).collect();
            Json(view).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "category listing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}

fn to_view(c: CategoryAvailability) -> CategoryView {
    CategoryView {
        id: c.id,
        name: c.name,
        description: c.description,
        price_cents: c.price_cents,
        // Oversold inventory reads as zero, not negative.
        available: c.available.max(0),
    }
}
