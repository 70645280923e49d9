//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// Categories are determined by the leading digit of the error code:
/// - 0xxx: General errors
/// - 4xxx: Order errors
/// - 9xxx: System errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Order errors (4xxx)
    Order,
    /// System errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..4000 => Self::General,
            4000..5000 => Self::Order,
            _ => Self::System,
        }
    }

    /// Whether errors of this category come from the network boundary
    /// and should be shown as a transient notice.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::System)
    }
}

impl From<ErrorCode> for ErrorCategory {
    fn from(code: ErrorCode) -> Self {
        Self::from_code(code.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_code() {
        assert_eq!(ErrorCategory::from_code(2), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(4001), ErrorCategory::Order);
        assert_eq!(ErrorCategory::from_code(9003), ErrorCategory::System);
    }

    #[test]
    fn test_category_from_error_code() {
        assert_eq!(
            ErrorCategory::from(ErrorCode::InvalidTransition),
            ErrorCategory::Order
        );
        assert!(ErrorCategory::from(ErrorCode::NetworkError).is_transient());
        assert!(!ErrorCategory::from(ErrorCode::OrderNotFound).is_transient());
    }
}
