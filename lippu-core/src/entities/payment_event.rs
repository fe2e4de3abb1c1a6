//! Append-only log of confirmed inbound payments.

use uuid::Uuid;

/// One confirmed on-chain payment credited toward an order.
///
/// Rows are never updated or deleted; the running total for an order is
/// the sum over its rows. `txn_hash` uniqueness makes webhook replays
/// idempotent.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PaymentEvent {
    pub id: i64,
    pub order_id: Uuid,
    pub amount_satoshi: i64,
    pub source_address: String,
    pub destination_address: String,
    pub confirmations: i32,
    pub txn_hash: String,
    pub source_txn_hash: String,
    pub received_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPaymentEvent {
    pub order_id: Uuid,
    pub amount_satoshi: i64,
    pub source_address: String,
    pub destination_address: String,
    pub confirmations: i32,
    pub txn_hash: String,
    pub source_txn_hash: String,
}

impl PaymentEvent {
    /// Append a payment event; returns `false` when the transaction hash
    /// is already recorded (replayed delivery, nothing written).
    pub async fn record<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        new: NewPaymentEvent,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO payment_events
                (order_id, amount_satoshi, source_address, destination_address,
                 confirmations, txn_hash, source_txn_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (txn_hash) DO NOTHING
            "#,
        )
        .bind(new.order_id)
        .bind(new.amount_satoshi)
        .bind(new.source_address)
        .bind(new.destination_address)
        .bind(new.confirmations)
        .bind(new.txn_hash)
        .bind(new.source_txn_hash)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Running satoshi total credited to an order.
    pub async fn total_for_order<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        order_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount_satoshi), 0)::BIGINT
            FROM payment_events
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_one(executor)
        .await
    }
}
