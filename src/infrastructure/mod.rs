//! Infrastructure Layer
//!
//! Contains the concrete implementations behind the domain contracts:
//! - Wire codecs for TCP and WebSocket transports
//! - The in-memory channel registry
//! - Outbound dialers
//! - Prometheus metrics

pub mod codec;
pub mod dialer;
pub mod metrics;
pub mod registry;

pub use dialer::{TcpDialer, WebSocketDialer};
pub use registry::ChannelRegistry;
