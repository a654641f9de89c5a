//! # Connection Gateway Library
//!
//! This crate provides a long-lived connection gateway with:
//! - TCP (length-prefixed frames) and WebSocket transports
//! - Pluggable handshake, message and disconnect hooks
//! - A concurrent channel registry for server-initiated pushes
//! - Read-deadline heartbeats and bounded graceful shutdown
//! - An outbound client with pluggable dialers
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Frames, connections and capability traits
//! - **Application Layer**: Server, sessions and client
//! - **Infrastructure Layer**: Codecs, registry, dialers and metrics
//! - **Presentation Layer**: Demo capability implementations
//!
//! ## Module Structure
//!
//! ```text
//! conn_gateway/
//! +-- config/         Configuration management
//! +-- domain/         Frames, connections and capability traits
//! +-- application/    Server, session lifecycle and client
//! +-- infrastructure/ Codecs, registry, dialers and metrics
//! +-- presentation/   Demo acceptor and listeners
//! +-- shared/         Common utilities (errors)
//! ```

// Configuration module
pub mod config;

// Domain layer - Contracts
pub mod domain;

// Application layer - Gateway and client
pub mod application;

// Infrastructure layer - Transport and storage implementations
pub mod infrastructure;

// Presentation layer - Demo handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup
pub mod startup;

// Telemetry and observability
pub mod telemetry;

pub use application::{Client, ClientOptions, Server, ServerOptions};
pub use shared::error::{GatewayError, Result};
