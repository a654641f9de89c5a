//! # Domain Layer
//!
//! The contracts of the gateway: frames, connections and the capability
//! traits business code plugs in. It is independent of any concrete
//! transport.
//!
//! ## Structure
//!
//! - **entities**: Frame, Conn and DialerContext
//! - **value_objects**: OpCode, SessionState, Protocol
//! - **services**: Acceptor, MessageListener, StateListener, Agent,
//!   ChannelMap and Dialer traits
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or application layers
//! - Strategies are trait objects selected at configuration time

pub mod entities;
pub mod services;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use services::*;
pub use value_objects::*;
