//! Webhook receiver - minimal HTTP endpoint for signed webhook deliveries.
//!
//! This library provides the pieces wired together by the `webhook-receiver`
//! binary:
//! - `config`: environment-driven settings
//! - `web`: routes, HMAC signature verification and JSON error mapping
//! - `lifecycle`: listener ownership, signal handling and bounded shutdown
//!
//! ## Architecture
//!
//! ```text
//! Signals → ShutdownTrigger ─┐
//! Client → Router → handlers  ├→ ServerHandle::wait → exit code
//!           (signature check) ┘
//! ```

pub mod config;
pub mod lifecycle;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use lifecycle::{start, LifecycleState, ServerHandle, ShutdownOutcome, ShutdownTrigger};
pub use web::{router, validate_signature, AppState};
