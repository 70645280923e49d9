//! Shared types for the Delicacy live order core
//!
//! Types used by every consumer of the order stream: the order record and
//! its lifecycle state machine, the event channel wire protocol, REST
//! payloads and the unified error type. Nothing in this crate performs I/O.

pub mod error;
pub mod message;
pub mod order;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, AppResult, ErrorCode};
pub use message::{ChannelEvent, ClientMessage, Role};
pub use order::{Order, OrderStatus, PaymentStatus, TransitionError};
