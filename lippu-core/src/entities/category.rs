//! Ticket categories and the inventory counter.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

/// A type of ticket sold by the shop, e.g. "Student" or "Regular".
///
/// `price_cents` is the current selling price; orders snapshot it into
/// their lines, so editing it only affects future orders.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
}

impl Category {
    pub async fn get<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        id: i64,
    ) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, description, price_cents
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn insert<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        new: NewCategory,
    ) -> Result<Category, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, description, price_cents)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, price_cents
            "#,
        )
        .bind(new.name)
        .bind(new.description)
        .bind(new.price_cents)
        .fetch_one(executor)
        .await
    }

    /// How many tickets of this category are still unreserved.
    ///
    /// Total tickets minus quantities held by orders that are open (no
    /// status row) or paid. Cancelled and expired orders release their
    /// claim. Runs on whatever executor the caller supplies so the order
    /// builder can evaluate it inside its own transaction snapshot.
    pub async fn available<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        category_id: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM tickets t WHERE t.category_id = $1)
                - COALESCE((
                    SELECT SUM(ol.quantity)
                    FROM order_lines ol
                    LEFT JOIN order_statuses os ON os.order_id = ol.order_id
                    WHERE ol.category_id = $1
                      AND (os.status IS NULL OR os.status = 'paid')
                ), 0)::BIGINT
            "#,
        )
        .bind(category_id)
        .fetch_one(executor)
        .await
    }
}

/// A category row joined with its availability, for the storefront listing.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CategoryAvailability {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub available: i64,
}

/// List all categories with their remaining availability.
#[derive(Debug, Clone)]
pub struct ListCategories;

impl Processor<ListCategories> for DatabaseProcessor {
    type Output = Vec<CategoryAvailability>;
    type Error = sqlx::Error;

    #[tracing::instrument(skip_all, err, name = "SQL:ListCategories")]
    async fn process(&self, _query: ListCategories) -> Result<Self::Output, Self::Error> {
        sqlx::query_as::<_, CategoryAvailability>(
            r#"
            SELECT
                c.id,
                c.name,
                c.description,
                c.price_cents,
                (SELECT COUNT(*) FROM tickets t WHERE t.category_id = c.id)
                - COALESCE((
                    SELECT SUM(ol.quantity)
                    FROM order_lines ol
                    LEFT JOIN order_statuses os ON os.order_id = ol.order_id
                    WHERE ol.category_id = c.id
                      AND (os.status IS NULL OR os.status = 'paid')
                ), 0)::BIGINT AS available
            FROM categories c
            ORDER BY c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}
