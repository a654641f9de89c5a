//! Application Layer
//!
//! Orchestrates the domain contracts into running components:
//! the gateway [`Server`], its per-connection sessions and the outbound
//! [`Client`].

pub mod client;
pub mod server;
pub mod session;

pub use client::{Client, ClientOptions};
pub use server::{Server, ServerOptions};
pub use session::{DisconnectReason, Session, SessionAgent};
