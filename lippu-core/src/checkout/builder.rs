//! Order placement: basket validation and the pending-order insert.

use crate::config::OrderPolicy;
use crate::entities::category::Category;
use crate::entities::order::{Order, OrderLine};
use sqlx::PgPool;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// One requested basket entry. Zero quantities are allowed and mean
/// "not ordered".
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct BasketItem {
    pub category_id: i64,
    pub quantity: i64,
}

/// A proposed order as received from the customer.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub email: String,
    pub ip: Option<String>,
    pub items: Vec<BasketItem>,
}

/// Rejections of a proposed basket. These are user-facing and carry the
/// field/category they apply to; nothing is persisted when one occurs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderValidationError {
    #[error("email address is required")]
    MissingEmail,
    #[error("the basket is empty")]
    EmptyBasket,
    #[error("at most {limit} tickets may be ordered at once, requested {requested}")]
    TooManyTickets { requested: i64, limit: i64 },
    #[error("category {category_id} appears more than once in the basket")]
    DuplicateCategory { category_id: i64 },
    #[error("negative quantity for category {category_id}")]
    NegativeQuantity { category_id: i64 },
    #[error("unknown category {category_id}")]
    UnknownCategory { category_id: i64 },
    #[error("only {available} tickets of category {category_id} available, requested {requested}")]
    Unavailable {
        category_id: i64,
        requested: i64,
        available: i64,
    },
}

#[derive(Debug, Error)]
pub enum PlaceOrderError {
    #[error(transparent)]
    Validation(#[from] OrderValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Validate a basket and persist a pending order with one line per
/// positive-quantity category, unit prices snapshotted at this instant.
///
/// The availability check here is the soft one: it runs in the same
/// transaction as the inserts but can still be overtaken by a concurrent
/// order that commits first. The allocator re-checks authoritatively at
/// payment time; over-acceptance surfaces there as a clean allocation
/// failure, never as a double-sold ticket.
pub async fn place_order(
    pool: &PgPool,
    policy: &OrderPolicy,
    new_order: NewOrder,
) -> Result<Order, PlaceOrderError> {
    validate_shape(policy, &new_order)?;

    let mut tx = pool.begin().await?;

    // Resolve categories and snapshot prices inside the transaction so
    // the soft check and the inserts see one snapshot.
    let mut lines: Vec<(i64, i64, i64)> = Vec::new();
    for item in new_order.items.iter().filter(|i| i.quantity > 0) {
        let category = Category::get(&mut *tx, item.category_id)
            .await?
            .ok_or(OrderValidationError::UnknownCategory {
                category_id: item.category_id,
            })?;
        let available = Category::available(&mut *tx, category.id).await?;
        if item.quantity > available {
            return Err(OrderValidationError::Unavailable {
                category_id: category.id,
                requested: item.quantity,
                available: available.max(0),
            }
            .into());
        }
        lines.push((category.id, item.quantity, category.price_cents));
    }

    let order_id = Uuid::new_v4();
    let order = Order::insert_tx(&mut tx, order_id, &new_order.email, new_order.ip.as_deref()).await?;
    for (category_id, quantity, price_cents) in lines {
        OrderLine::insert_tx(&mut tx, order_id, category_id, quantity, price_cents).await?;
    }
    tx.commit().await?;

    tracing::info!(
        order_id = %order.id,
        email = %order.email,
        "placed pending order"
    );
    Ok(order)
}

/// Shape checks that need no database: email, duplicates, quantity bounds.
fn validate_shape(policy: &OrderPolicy, new_order: &NewOrder) -> Result<(), OrderValidationError> {
    if new_order.email.trim().is_empty() {
        return Err(OrderValidationError::MissingEmail);
    }

    let mut seen = HashSet::new();
    for item in &new_order.items {
        if item.quantity < 0 {
            return Err(OrderValidationError::NegativeQuantity {
                category_id: item.category_id,
            });
        }
        if !seen.insert(item.category_id) {
            return Err(OrderValidationError::DuplicateCategory {
                category_id: item.category_id,
            });
        }
    }

    let total: i64 = new_order.items.iter().map(|i| i.quantity).sum();
    if total == 0 {
        return Err(OrderValidationError::EmptyBasket);
    }
    if total > policy.max_tickets_per_order {
        return Err(OrderValidationError::TooManyTickets {
            requested: total,
            limit: policy.max_tickets_per_order,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> OrderPolicy {
        OrderPolicy::default()
    }

    fn order(items: Vec<BasketItem>) -> NewOrder {
        NewOrder {
            email: "customer@example.com".into(),
            ip: None,
            items,
        }
    }

    fn item(category_id: i64, quantity: i64) -> BasketItem {
        BasketItem {
            category_id,
            quantity,
        }
    }

    #[test]
    fn accepts_a_plain_basket() {
        let new_order = order(vec![item(1, 2), item(2, 0), item(3, 3)]);
        assert_eq!(validate_shape(&policy(), &new_order), Ok(()));
    }

    #[test]
    fn rejects_empty_and_all_zero_baskets() {
        assert_eq!(
            validate_shape(&policy(), &order(vec![])),
            Err(OrderValidationError::EmptyBasket)
        );
        assert_eq!(
            validate_shape(&policy(), &order(vec![item(1, 0), item(2, 0)])),
            Err(OrderValidationError::EmptyBasket)
        );
    }

    #[test]
    fn rejects_totals_over_the_limit() {
        let new_order = order(vec![item(1, 3), item(2, 3)]);
        assert_eq!(
            validate_shape(&policy(), &new_order),
            Err(OrderValidationError::TooManyTickets {
                requested: 6,
                limit: 5
            })
        );
    }

    #[test]
    fn rejects_duplicate_categories() {
        // Duplicates are rejected even when the quantities agree; the
        // basket is ambiguous either way.
        let new_order = order(vec![item(7, 1), item(7, 1)]);
        assert_eq!(
            validate_shape(&policy(), &new_order),
            Err(OrderValidationError::DuplicateCategory { category_id: 7 })
        );
    }

    #[test]
    fn rejects_negative_quantities() {
        let new_order = order(vec![item(1, 5), item(2, -1)]);
        assert_eq!(
            validate_shape(&policy(), &new_order),
            Err(OrderValidationError::NegativeQuantity { category_id: 2 })
        );
    }

    #[test]
    fn rejects_missing_email() {
        let mut new_order = order(vec![item(1, 1)]);
        new_order.email = "   ".into();
        assert_eq!(
            validate_shape(&policy(), &new_order),
            Err(OrderValidationError::MissingEmail)
        );
    }
}
