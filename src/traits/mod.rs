//! Trait definitions for extensible components
//!
//! These traits allow users to swap the shared store that backs rate limits
//! and failed-login counters, or provide their own.

pub mod store;

pub use store::CounterStore;
