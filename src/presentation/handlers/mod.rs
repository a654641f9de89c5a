//! Demo Handlers
//!
//! Small capability implementations used by the bundled binary and the
//! integration tests.

pub mod echo;
pub mod login;
pub mod state;

pub use echo::EchoListener;
pub use login::LoginAcceptor;
pub use state::LoggingStateListener;
