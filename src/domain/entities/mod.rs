//! # Domain Entities
//!
//! Core objects the gateway moves around.
//!
//! - **Frame**: One protocol unit with an operation code and payload
//! - **Conn**: A framed full-duplex transport, split after the handshake
//! - **DialerContext**: Parameters for one outbound connection

mod conn;
mod dialer_context;
mod frame;

pub use conn::*;
pub use dialer_context::*;
pub use frame::*;
