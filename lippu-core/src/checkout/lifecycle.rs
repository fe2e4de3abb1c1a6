//! Cancellation and expiry of open orders.
//!
//! Both are single status-row inserts; the uniqueness constraint makes
//! them idempotent and mutually exclusive with the paid transition.
//! Closing an order releases its claim on inventory implicitly, because
//! the inventory counter only counts open and paid orders.

use crate::entities::OrderState;
use crate::entities::order::Order;
use crate::entities::order_status::OrderStatus;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// This call closed the order.
    Closed(OrderState),
    /// The order was already terminal; nothing changed.
    AlreadyClosed(OrderState),
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unknown order {0}")]
    UnknownOrder(Uuid),
}

/// Customer-facing cancellation. Idempotent: cancelling a closed order
/// reports its existing state instead of failing.
pub async fn cancel(pool: &PgPool, order_id: Uuid) -> Result<CloseOutcome, LifecycleError> {
    close(pool, order_id, OrderState::Cancelled).await
}

async fn close(
    pool: &PgPool,
    order_id: Uuid,
    state: OrderState,
) -> Result<CloseOutcome, LifecycleError> {
    Order::get(pool, order_id)
        .await?
        .ok_or(LifecycleError::UnknownOrder(order_id))?;

    match OrderStatus::try_close(pool, order_id, state).await? {
        Some(status) => {
            tracing::info!(%order_id, state = %status.status, "order closed");
            Ok(CloseOutcome::Closed(status.status))
        }
        None => {
            let existing = OrderStatus::get_for_order(pool, order_id)
                .await?
                .ok_or(LifecycleError::UnknownOrder(order_id))?;
            Ok(CloseOutcome::AlreadyClosed(existing.status))
        }
    }
}

/// Expire every open order created before `now - timeout`.
///
/// Each order is transitioned independently: one failure is logged and
/// skipped so the rest of the sweep proceeds. Returns the number of
/// orders this sweep actually expired. Orders that became terminal
/// between the select and the insert are silently left alone.
pub async fn expire_stale(
    pool: &PgPool,
    now: time::OffsetDateTime,
    timeout: time::Duration,
) -> Result<u64, sqlx::Error> {
    let cutoff_utc = now - timeout;
    let cutoff = time::PrimitiveDateTime::new(cutoff_utc.date(), cutoff_utc.time());

    let stale: Vec<Uuid> = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT o.id
        FROM orders o
        WHERE o.created_at < $1
          AND NOT EXISTS (
              SELECT 1 FROM order_statuses os WHERE os.order_id = o.id
          )
        ORDER BY o.created_at
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    let mut expired = 0u64;
    for order_id in stale {
        match OrderStatus::try_close(pool, order_id, OrderState::Expired).await {
            Ok(Some(_)) => {
                tracing::info!(%order_id, "expired stale order");
                expired += 1;
            }
            Ok(None) => {
                // Paid or cancelled since the select; leave it be.
            }
            Err(e) => {
                tracing::error!(%order_id, error = %e, "failed to expire order, continuing sweep");
            }
        }
    }
    Ok(expired)
}
