//! Security module for shell-relay.
//!
//! Requests carry a shared secret in the `hash` query parameter. When a
//! secret is configured, every route except `/health` rejects requests
//! whose `hash` does not match it.
//!
//! ## Example
//!
//! ```rust
//! use shell_relay::security::HashAuth;
//!
//! let auth = HashAuth::new("0123456789abcdef0123456789abcdef");
//! assert!(auth.verify(Some("0123456789abcdef0123456789abcdef")));
//! assert!(!auth.verify(Some("guess")));
//! ```

pub mod auth;

pub use auth::{hash_middleware, HashAuth, HashParam, MIN_HASH_LEN};
