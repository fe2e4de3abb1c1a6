use axum::{Json, http::StatusCode, response::IntoResponse};
use lippu_core::entities::category::{Category, NewCategory};
use serde::{Deserialize, Serialize};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

#[derive(Debug, Deserialize)]
pub(super) struct CreateCategoryRequest {
    name: String,
    #[serde(default)]
    description: String,
    price_cents: i64,
}

#[derive(Serialize)]
struct CategoryCreated {
    id: i64,
    name: String,
    description: String,
    price_cents: i64,
}

/// `POST /categories` — create a ticket category.
pub(super) async fn create_category(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, AdminApiError> {
    if body.price_cents < 0 {
        return Err(AdminApiError::Conflict("price must not be negative".into()));
    }

    let category = Category::insert(
        &state.db,
        NewCategory {
            name: body.name,
            description: body.description,
            price_cents: body.price_cents,
        },
    )
    .await
    .map_err(AdminApiError::Database)?;

    tracing::info!(category_id = category.id, name = %category.name, "category created");
    Ok((
        StatusCode::CREATED,
        Json(CategoryCreated {
            id: category.id,
            name: category.name,
            description: category.description,
            price_cents: category.price_cents,
        }),
    ))
}
