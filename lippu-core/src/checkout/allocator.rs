//! Ticket allocation for freshly paid orders.

use crate::entities::allocation::Allocation;
use crate::entities::order::Order;
use crate::entities::ticket::Ticket;
use thiserror::Error;
use uuid::Uuid;

/// Failures while binding tickets to a paid order. Any of these aborts
/// the whole order's allocation; the caller rolls the paid transition
/// back so the order is never observably paid-but-short.
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Fewer unallocated tickets exist than the order paid for. Either
    /// the soft availability check was overtaken beyond tolerance or
    /// inventory accounting is broken; alert-worthy either way.
    #[error(
        "inventory exhausted for category {category_id}: needed {requested}, claimed {claimed}"
    )]
    InventoryExhausted {
        category_id: i64,
        requested: i64,
        claimed: i64,
    },

    /// Post-condition violation: the claims we made do not add up to the
    /// line quantity. Must never happen; indicates an allocator bug.
    #[error("short allocation for category {category_id}: expected {expected}, found {actual}")]
    ShortAllocation {
        category_id: i64,
        expected: i64,
        actual: i64,
    },
}

/// Bind concrete tickets to a paid order, soonest expiry first.
///
/// Runs inside the caller's paid-transition transaction. Per line the
/// allocator draws unallocated candidates in expiry order and claims them
/// one by one; a claim lost to a concurrent allocator (unique constraint
/// on ticket) is skipped and the next candidate drawn, until the quantity
/// is met or candidates run out.
pub(crate) async fn allocate_order_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: Uuid,
    order_status_id: i64,
) -> Result<u64, AllocationError> {
    let lines = Order::lines(&mut **tx, order_id).await?;

    let mut total_allocated = 0u64;
    for line in &lines {
        let mut claimed: i64 = 0;
        let mut tried: Vec<i64> = Vec::new();

        while claimed < line.quantity {
            let candidates =
                Ticket::allocation_candidates_tx(tx, line.category_id, &tried, line.quantity - claimed)
                    .await?;
            if candidates.is_empty() {
                return Err(AllocationError::InventoryExhausted {
                    category_id: line.category_id,
                    requested: line.quantity,
                    claimed,
                });
            }
            for ticket_id in candidates {
                if Allocation::try_claim_tx(tx, ticket_id, order_status_id).await? {
                    claimed += 1;
                } else {
                    // Lost the ticket to a concurrent order between the
                    // candidate select and our insert; draw the next one.
                    tracing::warn!(
                        order_id = %order_id,
                        category_id = line.category_id,
                        ticket_id,
                        "ticket claimed concurrently, skipping"
                    );
                }
                tried.push(ticket_id);
            }
        }

        let actual = Allocation::count_for_category_tx(tx, order_status_id, line.category_id).await?;
        if actual != line.quantity {
            return Err(AllocationError::ShortAllocation {
                category_id: line.category_id,
                expected: line.quantity,
                actual,
            });
        }
        total_allocated += line.quantity as u64;
    }

    Ok(total_allocated)
}
