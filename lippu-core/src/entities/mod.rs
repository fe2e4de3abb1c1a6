pub mod allocation;
pub mod category;
pub mod order;
pub mod order_status;
pub mod payment_event;
pub mod ticket;

/// Terminal lifecycle states of an order.
///
/// An open order has no `order_statuses` row at all; this enum only covers
/// the states an order can close into. The row's uniqueness constraint
/// makes the single transition exactly-once.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    sqlx::Type,
    serde::Serialize,
    serde::Deserialize,
)]
#[sqlx(rename_all = "lowercase", type_name = "order_state")]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Paid,
    Cancelled,
    Expired,
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderState::Paid => write!(f, "paid"),
            OrderState::Cancelled => write!(f, "cancelled"),
            OrderState::Expired => write!(f, "expired"),
        }
    }
}
