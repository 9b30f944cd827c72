//! Authentication abuse protection.
//!
//! Credential verification itself belongs to the application; this module
//! only tracks failed attempts around it.

pub mod lockout;

pub use lockout::{FailedLoginTracker, LockoutPolicy, LoginGate};
