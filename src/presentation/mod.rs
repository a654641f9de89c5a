//! Presentation Layer
//!
//! Business-side capability implementations wired into the gateway by the
//! binary.

pub mod handlers;

pub use handlers::{EchoListener, LoggingStateListener, LoginAcceptor};
