//! Order status - the lifecycle state machine
//!
//! ```text
//! pending ─► accepted ─► preparing ─► ready ─► completed
//!    │           │            │          │
//!    ├───────────┴────────────┴──────────┴──► cancelled
//!    └──► rejected
//! ```
//!
//! `completed`, `cancelled` and `rejected` are terminal: nothing leaves them.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Order status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Accepted,
    Preparing,
    Ready,
    Completed,
    Cancelled,
    Rejected,
}

/// Display tone of a status (maps to the badge color on every display)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    Yellow,
    Blue,
    Orange,
    Green,
    Gray,
    Red,
}

impl StatusTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusTone::Yellow => "yellow",
            StatusTone::Blue => "blue",
            StatusTone::Orange => "orange",
            StatusTone::Green => "green",
            StatusTone::Gray => "gray",
            StatusTone::Red => "red",
        }
    }
}

/// The single forward action offered for an order in the kitchen view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceAction {
    /// Button label
    pub label: &'static str,
    /// Status the order moves to
    pub target: OrderStatus,
}

/// Status transition error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

impl From<TransitionError> for crate::error::AppError {
    fn from(err: TransitionError) -> Self {
        use crate::error::ErrorCode;

        let TransitionError::InvalidTransition { from, to } = err;
        let code = match from {
            OrderStatus::Completed => ErrorCode::OrderAlreadyCompleted,
            OrderStatus::Cancelled | OrderStatus::Rejected => ErrorCode::OrderAlreadyCancelled,
            _ => ErrorCode::InvalidTransition,
        };
        crate::error::AppError::with_message(code, err.to_string())
            .with_detail("from", from.as_str())
            .with_detail("to", to.as_str())
    }
}

impl OrderStatus {
    /// Statuses shown under the kitchen's "active" filter
    pub const ACTIVE: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Preparing,
    ];

    /// Every status, in lifecycle order
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "New",
            OrderStatus::Accepted => "Confirmed",
            OrderStatus::Preparing => "Preparing",
            OrderStatus::Ready => "Ready",
            OrderStatus::Completed => "Done",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Rejected => "Rejected",
        }
    }

    pub fn tone(&self) -> StatusTone {
        match self {
            OrderStatus::Pending => StatusTone::Yellow,
            OrderStatus::Accepted => StatusTone::Blue,
            OrderStatus::Preparing => StatusTone::Orange,
            OrderStatus::Ready => StatusTone::Green,
            OrderStatus::Completed => StatusTone::Gray,
            OrderStatus::Cancelled | OrderStatus::Rejected => StatusTone::Red,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// Next status on the forward path, `None` once terminal
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Accepted),
            OrderStatus::Accepted => Some(OrderStatus::Preparing),
            OrderStatus::Preparing => Some(OrderStatus::Ready),
            OrderStatus::Ready => Some(OrderStatus::Completed),
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Rejected => None,
        }
    }

    /// The one primary action for this status
    pub fn advance_action(&self) -> Option<AdvanceAction> {
        let label = match self {
            OrderStatus::Pending => "Accept",
            OrderStatus::Accepted => "Start",
            OrderStatus::Preparing => "Mark Ready",
            OrderStatus::Ready => "Complete",
            _ => return None,
        };
        self.next().map(|target| AdvanceAction { label, target })
    }

    /// Whether `self -> to` is an edge of the lifecycle graph
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            OrderStatus::Cancelled => true,
            OrderStatus::Rejected => *self == OrderStatus::Pending,
            _ => self.next() == Some(to),
        }
    }

    /// Validate `self -> to`, returning the new status
    pub fn transition(self, to: OrderStatus) -> Result<OrderStatus, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = crate::error::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::error::AppError::validation(format!("unknown order status: {s}")))
    }
}

/// Payment status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        let mut status = OrderStatus::Pending;
        let mut path = vec![status];
        while let Some(next) = status.next() {
            status = next;
            path.push(status);
        }
        assert_eq!(
            path,
            vec![
                OrderStatus::Pending,
                OrderStatus::Accepted,
                OrderStatus::Preparing,
                OrderStatus::Ready,
                OrderStatus::Completed,
            ]
        );
    }

    #[test]
    fn test_cancel_legal_from_every_non_terminal() {
        for status in OrderStatus::ALL {
            assert_eq!(
                status.can_transition_to(OrderStatus::Cancelled),
                !status.is_terminal(),
                "{status}"
            );
        }
    }

    #[test]
    fn test_reject_only_from_pending() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Rejected));
        assert!(!OrderStatus::Accepted.can_transition_to(OrderStatus::Rejected));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Rejected));
    }

    #[test]
    fn test_no_backward_or_skipping_edges() {
        assert!(!OrderStatus::Accepted.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Preparing));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Ready));
        assert_eq!(
            OrderStatus::Ready.transition(OrderStatus::Accepted),
            Err(TransitionError::InvalidTransition {
                from: OrderStatus::Ready,
                to: OrderStatus::Accepted,
            })
        );
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in [
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Rejected,
        ] {
            assert!(from.next().is_none());
            assert!(from.advance_action().is_none());
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_exactly_one_advance_action_per_open_status() {
        let action = OrderStatus::Pending.advance_action().unwrap();
        assert_eq!(action.label, "Accept");
        assert_eq!(action.target, OrderStatus::Accepted);

        let action = OrderStatus::Ready.advance_action().unwrap();
        assert_eq!(action.label, "Complete");
        assert_eq!(action.target, OrderStatus::Completed);
    }

    #[test]
    fn test_labels_and_tones() {
        assert_eq!(OrderStatus::Pending.label(), "New");
        assert_eq!(OrderStatus::Pending.tone(), StatusTone::Yellow);
        assert_eq!(OrderStatus::Preparing.tone().as_str(), "orange");
        assert_eq!(OrderStatus::Rejected.tone(), StatusTone::Red);
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Preparing).unwrap(),
            "\"preparing\""
        );
        let status: OrderStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(status, OrderStatus::Cancelled);
        assert!(serde_json::from_str::<OrderStatus>("\"lost\"").is_err());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Ready".parse::<OrderStatus>().unwrap(), OrderStatus::Ready);
        assert!("served".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_transition_error_into_app_error() {
        let err = OrderStatus::Completed
            .transition(OrderStatus::Cancelled)
            .unwrap_err();
        let app: crate::error::AppError = err.into();
        assert_eq!(app.code, crate::error::ErrorCode::OrderAlreadyCompleted);
        assert_eq!(app.message, "invalid transition: completed -> cancelled");

        let app: crate::error::AppError = OrderStatus::Rejected
            .transition(OrderStatus::Accepted)
            .unwrap_err()
            .into();
        assert_eq!(app.code, crate::error::ErrorCode::OrderAlreadyCancelled);

        let app: crate::error::AppError = OrderStatus::Preparing
            .transition(OrderStatus::Rejected)
            .unwrap_err()
            .into();
        assert_eq!(app.code, crate::error::ErrorCode::InvalidTransition);
    }
}
