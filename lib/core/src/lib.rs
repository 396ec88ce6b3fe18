//! Core types shared across the wraith crates.
//!
//! This crate provides the leaf types that every other wraith crate may use
//! without pulling in any web or authentication machinery:
//!
//! - [`Clock`]: wall-clock abstraction so expiry logic can be driven by tests
//! - [`Version`]: semantic version reported by the app and its providers

pub mod clock;
pub mod version;

pub use clock::{Clock, ManualClock, SystemClock};
pub use version::Version;
