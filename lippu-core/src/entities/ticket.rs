//! Physical ticket inventory.

/// One concrete movie ticket held in stock.
///
/// `(category_id, serial_no)` is the unique physical identity;
/// `cost_cents` is what the shop paid the theater for it. A ticket is
/// available until a row in `allocations` references it, and that can
/// happen at most once.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Ticket {
    pub id: i64,
    pub category_id: i64,
    pub serial_no: String,
    pub cost_cents: i64,
    pub expires: time::Date,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub category_id: i64,
    pub serial_no: String,
    pub cost_cents: i64,
    pub expires: time::Date,
}

impl Ticket {
    pub async fn insert<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        new: NewTicket,
    ) -> Result<Ticket, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (category_id, serial_no, cost_cents, expires)
            VALUES ($1, $2, $3, $4)
            RETURNING id, category_id, serial_no, cost_cents, expires
            "#,
        )
        .bind(new.category_id)
        .bind(new.serial_no)
        .bind(new.cost_cents)
        .bind(new.expires)
        .fetch_one(executor)
        .await
    }

    /// Ids of unallocated tickets in a category, soonest expiry first.
    ///
    /// `skip` holds ids the allocator already tried and lost to a
    /// concurrent claim, so refetching draws the next candidates deeper
    /// in the expiry order.
    pub(crate) async fn allocation_candidates_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        category_id: i64,
        skip: &[i64],
        limit: i64,
    ) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT t.id
            FROM tickets t
            LEFT JOIN allocations a ON a.ticket_id = t.id
            WHERE t.category_id = $1
              AND a.id IS NULL
              AND t.id != ALL($2)
            ORDER BY t.expires ASC, t.id ASC
            LIMIT $3
            "#,
        )
        .bind(category_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut **tx)
        .await
    }
}
