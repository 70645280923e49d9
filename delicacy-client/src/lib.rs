//! Delicacy Client - live order synchronization core
//!
//! Keeps one viewer's picture of the order board consistent with the
//! backend: a periodic REST snapshot, a reconnecting push channel, and the
//! merge logic between them.
//!
//! ```text
//! HttpClient ──snapshot──┐
//!                        ├─► SnapshotReconciler ─► AlertTrigger ─► Board
//! EventChannel ─events───┘
//! ```
//!
//! [`LiveSession`] owns all of it for one view and releases everything when
//! it stops.

pub mod alert;
pub mod channel;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod reconcile;
pub mod session;

pub use alert::{AlertSink, AlertTrigger, NewOrderAlert};
pub use channel::{ChannelState, EventChannel, ReconnectPolicy};
pub use config::{ChannelConfig, ClientConfig, PathForm};
pub use error::{ClientError, ClientResult};
pub use health::{ConnectivityTracker, Probe};
pub use http::HttpClient;
pub use reconcile::{OrderView, SnapshotReconciler, StatusCounts, StatusFilter};
pub use session::{Board, LiveSession, Notice, OrderAction, SessionHandle, ViewScope};

// Re-export shared types for convenience
pub use shared::{ChannelEvent, ClientMessage, Order, OrderStatus, PaymentStatus, Role};
