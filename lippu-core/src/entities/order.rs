//! Orders and their line items.

use crate::entities::OrderState;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

/// A customer's reservation.
///
/// `payment_address` and `price_satoshi` stay `NULL` until the payment
/// session initiator attaches them; each is written at most once.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub created_at: time::PrimitiveDateTime,
    pub email: String,
    pub ip: Option<String>,
    pub payment_address: Option<String>,
    pub price_satoshi: Option<i64>,
}

/// One `(category, quantity)` entry of an order, with the unit price
/// snapshotted at placement time.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderLine {
    pub order_id: Uuid,
    pub category_id: i64,
    pub quantity: i64,
    pub price_cents: i64,
}

const ORDER_COLUMNS: &str = "id, created_at, email, ip, payment_address, price_satoshi";

impl Order {
    pub(crate) async fn insert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
        email: &str,
        ip: Option<&str>,
    ) -> Result<Order, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (id, email, ip)
            VALUES ($1, $2, $3)
            RETURNING id, created_at, email, ip, payment_address, price_satoshi
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(ip)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn get<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<Order>, sqlx::Error> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn lines<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        order_id: Uuid,
    ) -> Result<Vec<OrderLine>, sqlx::Error> {
        sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT order_id, category_id, quantity, price_cents
            FROM order_lines
            WHERE order_id = $1
            ORDER BY category_id
            "#,
        )
        .bind(order_id)
        .fetch_all(executor)
        .await
    }

    /// Attach the converted price if none is set yet, returning the price
    /// that is now on the order (ours or a concurrent initiator's).
    pub(crate) async fn attach_price(
        pool: &sqlx::PgPool,
        order_id: Uuid,
        price_satoshi: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        let written = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE orders
            SET price_satoshi = $2
            WHERE id = $1 AND price_satoshi IS NULL
            RETURNING price_satoshi
            "#,
        )
        .bind(order_id)
        .bind(price_satoshi)
        .fetch_optional(pool)
        .await?;
        match written {
            Some(price) => Ok(Some(price)),
            // Set-once guard lost or order vanished; reread what is there.
            None => {
                sqlx::query_scalar::<_, Option<i64>>(
                    "SELECT price_satoshi FROM orders WHERE id = $1",
                )
                .bind(order_id)
                .fetch_optional(pool)
                .await
                .map(Option::flatten)
            }
        }
    }

    /// Attach the generated payment address if none is set yet, returning
    /// the address that is now on the order.
    pub(crate) async fn attach_payment_address(
        pool: &sqlx::PgPool,
        order_id: Uuid,
        address: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let written = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE orders
            SET payment_address = $2
            WHERE id = $1 AND payment_address IS NULL
            RETURNING payment_address
            "#,
        )
        .bind(order_id)
        .bind(address)
        .fetch_optional(pool)
        .await?;
        match written {
            Some(addr) => Ok(Some(addr)),
            None => {
                sqlx::query_scalar::<_, Option<String>>(
                    "SELECT payment_address FROM orders WHERE id = $1",
                )
                .bind(order_id)
                .fetch_optional(pool)
                .await
                .map(Option::flatten)
            }
        }
    }
}

impl OrderLine {
    pub(crate) async fn insert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order_id: Uuid,
        category_id: i64,
        quantity: i64,
        price_cents: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO order_lines (order_id, category_id, quantity, price_cents)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id)
        .bind(category_id)
        .bind(quantity)
        .bind(price_cents)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Total fiat price of an order: `sum(quantity * unit price snapshot)`.
    pub fn total_cents(lines: &[OrderLine]) -> i64 {
        lines.iter().map(|l| l.quantity * l.price_cents).sum()
    }
}

// ---------------------------------------------------------------------------
// Read messages
// ---------------------------------------------------------------------------

/// Fetch one order by id.
#[derive(Debug, Clone)]
pub struct GetOrderById {
    pub order_id: Uuid,
}

impl Processor<GetOrderById> for DatabaseProcessor {
    type Output = Option<Order>;
    type Error = sqlx::Error;

    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderById")]
    async fn process(&self, query: GetOrderById) -> Result<Self::Output, Self::Error> {
        Order::get(&self.pool, query.order_id).await
    }
}

/// List orders in a lifecycle state; `None` lists open orders.
#[derive(Debug, Clone)]
pub struct ListOrdersByState {
    pub state: Option<OrderState>,
}

impl Processor<ListOrdersByState> for DatabaseProcessor {
    type Output = Vec<Order>;
    type Error = sqlx::Error;

    #[tracing::instrument(skip_all, err, name = "SQL:ListOrdersByState")]
    async fn process(&self, query: ListOrdersByState) -> Result<Self::Output, Self::Error> {
        match query.state {
            None => {
                sqlx::query_as::<_, Order>(&format!(
                    r#"
                    SELECT {ORDER_COLUMNS}
                    FROM orders o
                    WHERE NOT EXISTS (
                        SELECT 1 FROM order_statuses os WHERE os.order_id = o.id
                    )
                    ORDER BY o.created_at DESC
                    "#
                ))
                .fetch_all(&self.pool)
                .await
            }
            Some(state) => {
                sqlx::query_as::<_, Order>(
                    r#"
                    SELECT o.id, o.created_at, o.email, o.ip,
                           o.payment_address, o.price_satoshi
                    FROM orders o
                    JOIN order_statuses os ON os.order_id = o.id
                    WHERE os.status = $1
                    ORDER BY o.created_at DESC
                    "#,
                )
                .bind(state)
                .fetch_all(&self.pool)
                .await
            }
        }
    }
}
