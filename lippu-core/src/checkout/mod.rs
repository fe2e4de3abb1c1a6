//! The order-to-payment reconciliation protocol.
//!
//! - [`builder`] validates a basket and persists a pending order
//! - [`pricing`] converts the fiat total to a satoshi amount
//! - [`session`] attaches payment coordinates (address + price) to an order
//! - [`reconciler`] accumulates payment events and drives `OPEN -> PAID`
//! - [`allocator`] binds concrete tickets to a freshly paid order
//! - [`lifecycle`] handles `OPEN -> CANCELLED/EXPIRED`

pub mod allocator;
pub mod builder;
pub mod lifecycle;
pub mod pricing;
pub mod reconciler;
pub mod session;

pub use allocator::AllocationError;
pub use builder::{BasketItem, NewOrder, OrderValidationError, PlaceOrderError, place_order};
pub use lifecycle::{CloseOutcome, LifecycleError, cancel, expire_stale};
pub use pricing::satoshi_price;
pub use reconciler::{
    IncomingPayment, PaidTransition, PaymentOutcome, ReconcileError, force_pay, record_payment,
};
pub use session::{PaymentSession, SessionCoordinates, SessionError};
