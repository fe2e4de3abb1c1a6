//! The payment reconciliation state machine.
//!
//! Orders move `OPEN -> PAID | CANCELLED | EXPIRED`, exactly once. This
//! module owns the `OPEN -> PAID` edge: it accumulates confirmed payment
//! events against an order and, when the running total reaches the
//! snapshotted price, performs the paid transition and ticket allocation
//! as one atomic unit.

use crate::checkout::allocator::{AllocationError, allocate_order_tx};
use crate::config::PaymentConfig;
use crate::entities::OrderState;
use crate::entities::order::Order;
use crate::entities::order_status::OrderStatus;
use crate::entities::payment_event::{NewPaymentEvent, PaymentEvent};
use crate::framework::is_retryable_conflict;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

/// A confirmed inbound payment, as decoded from the webhook.
#[derive(Debug, Clone)]
pub struct IncomingPayment {
    pub order_id: Uuid,
    pub amount_satoshi: i64,
    pub source_address: String,
    pub destination_address: String,
    pub confirmations: i32,
    pub txn_hash: String,
    pub source_txn_hash: String,
}

/// What processing one payment event did to the order.
///
/// `recorded` is `false` when the event's transaction hash was already in
/// the log (replayed delivery); the total check still runs so a delivery
/// that crashed after the insert can be completed on retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Credited, but the running total is still below the required price.
    Accumulating {
        recorded: bool,
        total_satoshi: i64,
        required_satoshi: i64,
    },
    /// This event completed the order; tickets are allocated.
    Paid { recorded: bool },
    /// The order was already closed; the event is logged but has no
    /// effect (late payment, replay after settlement).
    AlreadyClosed { recorded: bool, state: OrderState },
    /// The order has no price snapshot yet (session never initiated), so
    /// there is nothing to reconcile against.
    AwaitingInitiation { recorded: bool },
}

/// Result of a direct paid-transition attempt ([`force_pay`] and the
/// reconciler's internal settlement).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaidTransition {
    /// The order is now paid with all tickets allocated.
    Completed { tickets_allocated: u64 },
    /// Some earlier transition won; nothing changed.
    AlreadyClosed(OrderState),
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unknown order {0}")]
    UnknownOrder(Uuid),

    #[error("payment has {confirmations} confirmations, policy requires {required}")]
    Unconfirmed { confirmations: i32, required: i32 },

    /// The paid transition rolled back because tickets could not be
    /// fully allocated. The order remains open; see [`AllocationError`].
    #[error("allocation failed: {0}")]
    Allocation(#[source] AllocationError),

    #[error("paid transition for order {order_id} still conflicting after {attempts} attempts")]
    RetriesExhausted { order_id: Uuid, attempts: u32 },
}

/// Credit one confirmed payment event to its order and advance the state
/// machine if the total is reached.
///
/// Idempotent on the event's transaction hash and a no-op on orders that
/// are already terminal, so at-least-once webhook delivery is safe.
pub async fn record_payment(
    pool: &PgPool,
    config: &PaymentConfig,
    payment: IncomingPayment,
) -> Result<PaymentOutcome, ReconcileError> {
    let required_confirmations = config.min_confirmations.max(0);
    if payment.confirmations < 0 || payment.confirmations < required_confirmations {
        return Err(ReconcileError::Unconfirmed {
            confirmations: payment.confirmations,
            required: required_confirmations,
        });
    }

    let order = Order::get(pool, payment.order_id)
        .await?
        .ok_or(ReconcileError::UnknownOrder(payment.order_id))?;

    // The event goes into the append-only log regardless of the order's
    // state: the money moved on chain either way. Uniqueness on the
    // transaction hash absorbs replays.
    let recorded = PaymentEvent::record(
        pool,
        NewPaymentEvent {
            order_id: order.id,
            amount_satoshi: payment.amount_satoshi,
            source_address: payment.source_address,
            destination_address: payment.destination_address,
            confirmations: payment.confirmations,
            txn_hash: payment.txn_hash.clone(),
            source_txn_hash: payment.source_txn_hash,
        },
    )
    .await?;
    if recorded {
        tracing::info!(
            order_id = %order.id,
            amount_satoshi = payment.amount_satoshi,
            txn_hash = %payment.txn_hash,
            "recorded payment event"
        );
    } else {
        tracing::debug!(
            order_id = %order.id,
            txn_hash = %payment.txn_hash,
            "replayed payment event, already recorded"
        );
    }

    if let Some(status) = OrderStatus::get_for_order(pool, order.id).await? {
        return Ok(PaymentOutcome::AlreadyClosed {
            recorded,
            state: status.status,
        });
    }

    let Some(required_satoshi) = order.price_satoshi else {
        tracing::warn!(
            order_id = %order.id,
            "payment received for an order without a price snapshot"
        );
        return Ok(PaymentOutcome::AwaitingInitiation { recorded });
    };

    let total_satoshi = PaymentEvent::total_for_order(pool, order.id).await?;
    if total_satoshi < required_satoshi {
        return Ok(PaymentOutcome::Accumulating {
            recorded,
            total_satoshi,
            required_satoshi,
        });
    }

    match settle_paid(pool, config.paid_transition_retries, order.id).await? {
        PaidTransition::Completed { .. } => Ok(PaymentOutcome::Paid { recorded }),
        PaidTransition::AlreadyClosed(state) => {
            Ok(PaymentOutcome::AlreadyClosed { recorded, state })
        }
    }
}

/// Administrative paid transition, bypassing payment verification.
///
/// Same transition and allocation path as the reconciler; access control
/// is the caller's responsibility.
pub async fn force_pay(pool: &PgPool, order_id: Uuid) -> Result<PaidTransition, ReconcileError> {
    Order::get(pool, order_id)
        .await?
        .ok_or(ReconcileError::UnknownOrder(order_id))?;
    let transition = settle_paid(pool, 1, order_id).await?;
    if let PaidTransition::Completed { tickets_allocated } = &transition {
        tracing::info!(%order_id, tickets_allocated, "order force-paid");
    }
    Ok(transition)
}

/// Perform `OPEN -> PAID` with allocation, retrying bounded times on
/// transaction conflicts. Never retries allocation failures: those mean
/// the inventory genuinely cannot cover the order.
async fn settle_paid(
    pool: &PgPool,
    retries: u32,
    order_id: Uuid,
) -> Result<PaidTransition, ReconcileError> {
    let attempts = retries.max(1);
    for attempt in 1..=attempts {
        match try_settle_once(pool, order_id).await {
            Ok(transition) => return Ok(transition),
            Err(ReconcileError::Database(e)) if is_retryable_conflict(&e) && attempt < attempts => {
                tracing::warn!(
                    %order_id,
                    attempt,
                    error = %e,
                    "paid transition hit a transaction conflict, retrying"
                );
            }
            Err(ReconcileError::Database(e)) if is_retryable_conflict(&e) => {
                tracing::error!(
                    %order_id,
                    attempts,
                    error = %e,
                    "paid transition kept conflicting, giving up"
                );
                return Err(ReconcileError::RetriesExhausted { order_id, attempts });
            }
            Err(e) => return Err(e),
        }
    }
    Err(ReconcileError::RetriesExhausted { order_id, attempts })
}

/// One atomic attempt: status insert + full allocation, all or nothing.
async fn try_settle_once(pool: &PgPool, order_id: Uuid) -> Result<PaidTransition, ReconcileError> {
    let mut tx = pool.begin().await?;

    let Some(status) = OrderStatus::try_close(&mut *tx, order_id, OrderState::Paid).await? else {
        tx.rollback().await?;
        let state = OrderStatus::get_for_order(pool, order_id)
            .await?
            .map(|s| s.status)
            .ok_or(sqlx::Error::RowNotFound)?;
        return Ok(PaidTransition::AlreadyClosed(state));
    };

    match allocate_order_tx(&mut tx, order_id, status.id).await {
        Ok(tickets_allocated) => {
            tx.commit().await?;
            tracing::info!(
                %order_id,
                tickets_allocated,
                "order paid and fully allocated"
            );
            Ok(PaidTransition::Completed { tickets_allocated })
        }
        Err(AllocationError::Database(e)) => {
            // Rollback is implicit when the transaction drops, but be
            // explicit so the error path reads correctly.
            tx.rollback().await.ok();
            Err(ReconcileError::Database(e))
        }
        Err(fatal) => {
            tx.rollback().await?;
            tracing::error!(
                %order_id,
                error = %fatal,
                "paid order could not be fully allocated; transition rolled back"
            );
            Err(ReconcileError::Allocation(fatal))
        }
    }
}
