//! The one-shot terminal status record of an order.

use crate::entities::OrderState;
use uuid::Uuid;

/// The terminal status row of a closed order.
///
/// Its `UNIQUE (order_id)` constraint is what makes the lifecycle
/// transition exactly-once: whichever insert commits first closes the
/// order, every later attempt is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderStatus {
    pub id: i64,
    pub order_id: Uuid,
    pub created_at: time::PrimitiveDateTime,
    pub status: OrderState,
}

impl OrderStatus {
    /// Attempt the single lifecycle transition for an order.
    ///
    /// Returns the freshly created status row, or `None` when the order
    /// is already closed (in any state). Single-statement, so it is
    /// atomic on a bare pool as well as inside a transaction.
    pub(crate) async fn try_close<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        order_id: Uuid,
        state: OrderState,
    ) -> Result<Option<OrderStatus>, sqlx::Error> {
        sqlx::query_as::<_, OrderStatus>(
            r#"
            INSERT INTO order_statuses (order_id, status)
            VALUES ($1, $2)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING id, order_id, created_at, status
            "#,
        )
        .bind(order_id)
        .bind(state)
        .fetch_optional(executor)
        .await
    }

    pub async fn get_for_order<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        order_id: Uuid,
    ) -> Result<Option<OrderStatus>, sqlx::Error> {
        sqlx::query_as::<_, OrderStatus>(
            r#"
            SELECT id, order_id, created_at, status
            FROM order_statuses
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(executor)
        .await
    }
}
