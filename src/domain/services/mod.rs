//! # Domain Services
//!
//! Capability traits injected into the gateway and the client.

mod channel_map;
mod dialer;
mod listeners;

pub use channel_map::*;
pub use dialer::*;
pub use listeners::*;
