//! Order domain
//!
//! - [`OrderStatus`]: lifecycle state machine
//! - [`Order`] / [`OrderPatch`]: full record and the partial carried by events
//! - [`KitchenStats`]: aggregate counters

pub mod stats;
pub mod status;
pub mod types;

// Re-exports
pub use stats::KitchenStats;
pub use status::{AdvanceAction, OrderStatus, PaymentStatus, StatusTone, TransitionError};
pub use types::*;

/// Next status for the order's primary action
pub fn advance(order: &Order) -> Result<OrderStatus, TransitionError> {
    match order.status.next() {
        Some(next) => Ok(next),
        None => Err(TransitionError::InvalidTransition {
            from: order.status,
            to: order.status,
        }),
    }
}

/// Target status for cancelling the order
pub fn cancel(order: &Order) -> Result<OrderStatus, TransitionError> {
    order.status.transition(OrderStatus::Cancelled)
}

/// Target status for rejecting the order (only while pending)
pub fn reject(order: &Order) -> Result<OrderStatus, TransitionError> {
    order.status.transition(OrderStatus::Rejected)
}

/// Non-terminal and waiting longer than `threshold_minutes`
pub fn is_urgent(order: &Order, elapsed_minutes: i64, threshold_minutes: i64) -> bool {
    !order.is_terminal() && elapsed_minutes > threshold_minutes
}
