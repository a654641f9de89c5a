//! # Configuration Module
//!
//! This module handles application configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__, plus GATEWAY_HOST,
//!   GATEWAY_PORT and GATEWAY_PROTOCOL)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use conn_gateway::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Gateway will listen on {}", settings.server_addr());
//! ```

mod settings;

pub use settings::*;
