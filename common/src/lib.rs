//! RateBridge Common Types
//!
//! This crate contains shared types used across RateBridge, including
//! currency codes, rate tables, historical series and correlation identifiers.

pub mod identifiers;
pub mod monetary;
pub mod history;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use history::*;
pub use error::*;
pub use time::*;
