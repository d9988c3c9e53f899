//! Session management module.
//!
//! A session is a caller-named shell that lives for the whole process.
//! The [`SessionRegistry`] starts one lazily on first use and hands the
//! same instance to every later caller.

mod id;
mod registry;

pub use id::{SessionId, MAX_SESSION_ID_LEN};
pub use registry::{Session, SessionRegistry};
