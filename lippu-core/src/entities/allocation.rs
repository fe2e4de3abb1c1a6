//! Ticket-to-order allocations.

/// Marker for the `allocations` relation.
///
/// An allocation binds one ticket to one paid order's status row. The
/// `UNIQUE (ticket_id)` constraint is the authoritative no-double-sale
/// invariant; the allocator's availability checks are only fast paths.
pub struct Allocation;

/// A ticket as handed to the customer of a paid order.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AllocatedTicket {
    pub category_id: i64,
    pub category_name: String,
    pub serial_no: String,
    pub expires: time::Date,
}

impl Allocation {
    /// Try to claim one ticket for a paid order.
    ///
    /// Returns `false` when a concurrent allocator claimed the ticket
    /// first; the caller skips it and draws the next candidate.
    pub(crate) async fn try_claim_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ticket_id: i64,
        order_status_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO allocations (ticket_id, order_status_id)
            VALUES ($1, $2)
            ON CONFLICT (ticket_id) DO NOTHING
            "#,
        )
        .bind(ticket_id)
        .bind(order_status_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Post-condition check: allocations of one category held by a status
    /// row.
    pub(crate) async fn count_for_category_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order_status_id: i64,
        category_id: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM allocations a
            JOIN tickets t ON t.id = a.ticket_id
            WHERE a.order_status_id = $1 AND t.category_id = $2
            "#,
        )
        .bind(order_status_id)
        .bind(category_id)
        .fetch_one(&mut **tx)
        .await
    }

    /// The tickets handed out for a paid order, for receipts and the
    /// customer status view.
    pub async fn list_for_status<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        order_status_id: i64,
    ) -> Result<Vec<AllocatedTicket>, sqlx::Error> {
        sqlx::query_as::<_, AllocatedTicket>(
            r#"
            SELECT t.category_id, c.name AS category_name, t.serial_no, t.expires
            FROM allocations a
            JOIN tickets t ON t.id = a.ticket_id
            JOIN categories c ON c.id = t.category_id
            WHERE a.order_status_id = $1
            ORDER BY t.category_id, t.expires
            "#,
        )
        .bind(order_status_id)
        .fetch_all(executor)
        .await
    }
}
