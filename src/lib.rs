//! # webguard
//!
//! Client-side security and trust utilities for a web-facing application:
//! token lifecycle management, request/attempt throttling, content-security
//! policy enforcement, and input/URL sanitization behind a single facade.
//!
//! ## Features
//!
//! - **Token lifecycle**: sealed persistence of the access/refresh bundle,
//!   client-side expiry checks, and network refresh with no partial writes
//! - **Throttling**: sliding-window rate limiting and failed-attempt IP
//!   blocking over a pluggable key-value store
//! - **Content policy**: a process-wide Content-Security-Policy table with
//!   candidate-policy validation and live header assembly
//! - **Sanitization**: allow-list HTML sanitization plus URL scheme/host
//!   gating for navigation targets
//!
//! Everything here is an advisory, client-side gate. None of it replaces
//! server-side authorization, rate limiting, or abuse prevention.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use webguard::{SecurityConfig, SecurityGuard};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let guard = SecurityGuard::new(
//!         SecurityConfig::default().with_base_url("https://api.example.com"),
//!     )?;
//!
//!     // Attach to every outbound API call
//!     let headers = guard.request_headers();
//!
//!     // Gate a form submission
//!     let clean = guard.sanitize_input("<b>hello</b><script>x</script>");
//!     let strength = guard.validate_password_strength("Candidate#1");
//!
//!     println!("{} headers, clean = {clean}, ok = {}", headers.len(), strength.is_valid);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod csp;
pub mod facade;
pub mod fingerprint;
pub mod ip_block;
pub mod password;
pub mod rate_limit;
pub mod sanitize;
pub mod storage;
pub mod token;
pub mod utils;


// Re-export main types for convenience
pub use config::{
    ApiConfig, IpBlockConfig, PasswordPolicyConfig, RateLimitConfig, SecurityConfig,
    StorageBackend, StorageConfig, UrlGuardConfig,
};
pub use csp::CspManager;
pub use facade::SecurityGuard;
pub use fingerprint::{device_fingerprint, DeviceFingerprint, SIGNAL_COUNT};
pub use ip_block::IpBlockGuard;
pub use password::{PasswordPolicy, PasswordValidationResult};
pub use rate_limit::RateLimiter;
pub use sanitize::{InputSanitizer, UrlGuard};
pub use storage::{create_store, FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use token::{is_token_valid, TokenBundle, TokenStore};
pub use utils::error::{GuardError, Result};

/// Initialize the security module with default logging
pub fn init() -> Result<()> {
    utils::logging::init_logging()
}

/// Initialize the security module with a custom logging level
pub fn init_with_logging(level: tracing::Level) -> Result<()> {
    utils::logging::init_logging_with_level(level)
}
