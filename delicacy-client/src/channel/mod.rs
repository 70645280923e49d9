//! Event channel: one reconnecting push connection per viewer
//!
//! - [`address`]: channel URL from role / identifier
//! - [`backoff`]: pure reconnect state machine
//! - [`client`]: the connection task itself

pub mod address;
pub mod backoff;
pub mod client;

pub use address::channel_url;
pub use backoff::{ChannelState, ReconnectPolicy};
pub use client::EventChannel;
