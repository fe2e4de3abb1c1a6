//! End-to-end checkout tests against a real Postgres instance.
//!
//! These need `DATABASE_URL` pointing at a scratch database and are
//! ignored by default:
//!
//! ```sh
//! DATABASE_URL=postgres://localhost/lippu_test cargo test -- --ignored
//! ```
//!
//! Every test creates its own categories and tickets, so they can share
//! one database and run in any order.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use lippu_core::checkout::{
    self, BasketItem, NewOrder, PaidTransition, PaymentOutcome, ReconcileError,
};
use lippu_core::checkout::reconciler::IncomingPayment;
use lippu_core::config::{OrderPolicy, PaymentConfig};
use lippu_core::entities::OrderState;
use lippu_core::entities::allocation::Allocation;
use lippu_core::entities::category::{Category, NewCategory};
use lippu_core::entities::order_status::OrderStatus;
use lippu_core::entities::ticket::{NewTicket, Ticket};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    let pool = PgPool::connect(&url).await.expect("connect");
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

fn payment_config() -> PaymentConfig {
    PaymentConfig {
        receiving_address: "1ReceivingAddress".into(),
        callback_base_url: "https://shop.example".parse().unwrap(),
        shared: false,
        webhook_secret: "sekrit".into(),
        fee_fraction: Decimal::ZERO,
        min_confirmations: 0,
        paid_transition_retries: 3,
    }
}

async fn seed_category(pool: &PgPool, price_cents: i64, stock: usize) -> Category {
    let tag = Uuid::new_v4();
    let category = Category::insert(
        pool,
        NewCategory {
            name: format!("test-{tag}"),
            description: "integration test category".into(),
            price_cents,
        },
    )
    .await
    .expect("insert category");
    for n in 0..stock {
        Ticket::insert(
            pool,
            NewTicket {
                category_id: category.id,
                serial_no: format!("{tag}-{n}"),
                cost_cents: price_cents / 2,
                expires: time::Date::from_calendar_date(2030, time::Month::January, 1).unwrap(),
            },
        )
        .await
        .expect("insert ticket");
    }
    category
}

async fn place(pool: &PgPool, category_id: i64, quantity: i64) -> Uuid {
    let order = checkout::place_order(
        pool,
        &OrderPolicy::default(),
        NewOrder {
            email: "customer@example.com".into(),
            ip: Some("198.51.100.7".into()),
            items: vec![BasketItem {
                category_id,
                quantity,
            }],
        },
    )
    .await
    .expect("place order");
    order.id
}

async fn set_price(pool: &PgPool, order_id: Uuid, price_satoshi: i64) {
    sqlx::query("UPDATE orders SET price_satoshi = $2 WHERE id = $1")
        .bind(order_id)
        .bind(price_satoshi)
        .execute(pool)
        .await
        .expect("set price");
}

fn payment(order_id: Uuid, amount_satoshi: i64, txn_hash: &str) -> IncomingPayment {
    IncomingPayment {
        order_id,
        amount_satoshi,
        source_address: "1Payer".into(),
        destination_address: "1Forwarding".into(),
        confirmations: 6,
        txn_hash: txn_hash.into(),
        source_txn_hash: format!("src-{txn_hash}"),
    }
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn open_orders_reserve_inventory_and_cancellation_releases_it() {
    let pool = pool().await;
    let category = seed_category(&pool, 1000, 4).await;
    assert_eq!(Category::available(&pool, category.id).await.unwrap(), 4);

    let order_id = place(&pool, category.id, 3).await;
    assert_eq!(Category::available(&pool, category.id).await.unwrap(), 1);

    // A second order beyond the remainder is rejected up front.
    let too_big = checkout::place_order(
        &pool,
        &OrderPolicy::default(),
        NewOrder {
            email: "other@example.com".into(),
            ip: None,
            items: vec![BasketItem {
                category_id: category.id,
                quantity: 2,
            }],
        },
    )
    .await;
    assert!(too_big.is_err());

    checkout::cancel(&pool, order_id).await.expect("cancel");
    assert_eq!(Category::available(&pool, category.id).await.unwrap(), 4);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn payments_accumulate_until_the_price_is_reached() {
    let pool = pool().await;
    let config = payment_config();
    let category = seed_category(&pool, 1000, 2).await;
    let order_id = place(&pool, category.id, 2).await;
    set_price(&pool, order_id, 5_000_000).await;

    let first = Uuid::new_v4().to_string();
    let outcome = checkout::record_payment(&pool, &config, payment(order_id, 2_000_000, &first))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        PaymentOutcome::Accumulating {
            recorded: true,
            total_satoshi: 2_000_000,
            required_satoshi: 5_000_000,
        }
    );

    let second = Uuid::new_v4().to_string();
    let outcome = checkout::record_payment(&pool, &config, payment(order_id, 3_000_000, &second))
        .await
        .unwrap();
    assert_eq!(outcome, PaymentOutcome::Paid { recorded: true });

    let status = OrderStatus::get_for_order(&pool, order_id)
        .await
        .unwrap()
        .expect("order closed");
    assert_eq!(status.status, OrderState::Paid);

    let tickets = Allocation::list_for_status(&pool, status.id).await.unwrap();
    assert_eq!(tickets.len(), 2);
    let mut serials: Vec<_> = tickets.iter().map(|t| t.serial_no.clone()).collect();
    serials.sort();
    serials.dedup();
    assert_eq!(serials.len(), 2, "allocated tickets must be distinct");
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn replayed_webhook_deliveries_credit_at_most_once() {
    let pool = pool().await;
    let config = payment_config();
    let category = seed_category(&pool, 1000, 1).await;
    let order_id = place(&pool, category.id, 1).await;
    set_price(&pool, order_id, 4_000_000).await;

    let hash = Uuid::new_v4().to_string();
    let outcome = checkout::record_payment(&pool, &config, payment(order_id, 1_000_000, &hash))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        PaymentOutcome::Accumulating {
            recorded: true,
            total_satoshi: 1_000_000,
            required_satoshi: 4_000_000,
        }
    );

    // Same transaction hash again: logged as a replay, total unchanged.
    let outcome = checkout::record_payment(&pool, &config, payment(order_id, 1_000_000, &hash))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        PaymentOutcome::Accumulating {
            recorded: false,
            total_satoshi: 1_000_000,
            required_satoshi: 4_000_000,
        }
    );
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn terminal_states_are_monotonic() {
    let pool = pool().await;
    let config = payment_config();
    let category = seed_category(&pool, 1000, 1).await;
    let order_id = place(&pool, category.id, 1).await;
    set_price(&pool, order_id, 1_000_000).await;

    checkout::cancel(&pool, order_id).await.expect("cancel");

    // A late payment is still logged but cannot reopen or pay the order.
    let hash = Uuid::new_v4().to_string();
    let outcome = checkout::record_payment(&pool, &config, payment(order_id, 2_000_000, &hash))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        PaymentOutcome::AlreadyClosed {
            recorded: true,
            state: OrderState::Cancelled,
        }
    );

    // Force-pay after cancellation reports the existing state.
    let transition = checkout::force_pay(&pool, order_id).await.unwrap();
    assert_eq!(
        transition,
        PaidTransition::AlreadyClosed(OrderState::Cancelled)
    );
    let status = OrderStatus::get_for_order(&pool, order_id)
        .await
        .unwrap()
        .expect("still closed");
    assert_eq!(status.status, OrderState::Cancelled);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn allocation_shortfall_rolls_the_paid_transition_back() {
    let pool = pool().await;
    let category = seed_category(&pool, 1000, 3).await;

    // Both orders pass the soft check against 3 tickets, together they
    // want 4. Whoever settles second must fail cleanly.
    let first = place(&pool, category.id, 2).await;
    let second = place(&pool, category.id, 2).await;

    let transition = checkout::force_pay(&pool, first).await.unwrap();
    assert_eq!(transition, PaidTransition::Completed { tickets_allocated: 2 });

    let err = checkout::force_pay(&pool, second).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Allocation(_)));

    // The losing order is still open, not half-paid.
    assert!(
        OrderStatus::get_for_order(&pool, second)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn concurrent_settlement_never_double_sells() {
    let pool = pool().await;
    let category = seed_category(&pool, 1000, 2).await;

    let first = place(&pool, category.id, 2).await;
    let second = place(&pool, category.id, 2).await;

    let (a, b) = tokio::join!(
        checkout::force_pay(&pool, first),
        checkout::force_pay(&pool, second),
    );
    let completions = [a, b]
        .into_iter()
        .filter(|r| matches!(r, Ok(PaidTransition::Completed { .. })))
        .count();
    assert_eq!(completions, 1, "exactly one order may win the inventory");

    let allocated: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM allocations a JOIN tickets t ON t.id = a.ticket_id WHERE t.category_id = $1")
            .bind(category.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(allocated, 2);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn stale_open_orders_expire_and_paid_orders_do_not() {
    let pool = pool().await;
    let category = seed_category(&pool, 1000, 2).await;
    let stale = place(&pool, category.id, 1).await;
    let paid = place(&pool, category.id, 1).await;
    checkout::force_pay(&pool, paid).await.unwrap();

    // Backdate both orders past the timeout.
    sqlx::query("UPDATE orders SET created_at = created_at - INTERVAL '2 hours' WHERE id = ANY($1)")
        .bind(vec![stale, paid])
        .execute(&pool)
        .await
        .unwrap();

    checkout::expire_stale(
        &pool,
        time::OffsetDateTime::now_utc(),
        time::Duration::minutes(60),
    )
    .await
    .unwrap();

    let stale_status = OrderStatus::get_for_order(&pool, stale)
        .await
        .unwrap()
        .expect("expired");
    assert_eq!(stale_status.status, OrderState::Expired);

    let paid_status = OrderStatus::get_for_order(&pool, paid)
        .await
        .unwrap()
        .expect("still paid");
    assert_eq!(paid_status.status, OrderState::Paid);

    // The expired order's inventory is free again.
    assert_eq!(Category::available(&pool, category.id).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn payment_before_session_initiation_is_parked() {
    let pool = pool().await;
    let config = payment_config();
    let category = seed_category(&pool, 1000, 1).await;
    let order_id = place(&pool, category.id, 1).await;

    // No price snapshot yet: the event is kept but nothing settles.
    let hash = Uuid::new_v4().to_string();
    let outcome = checkout::record_payment(&pool, &config, payment(order_id, 9_000_000, &hash))
        .await
        .unwrap();
    assert_eq!(outcome, PaymentOutcome::AwaitingInitiation { recorded: true });
    assert!(
        OrderStatus::get_for_order(&pool, order_id)
            .await
            .unwrap()
            .is_none()
    );
}
