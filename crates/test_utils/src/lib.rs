//! Test Utilities Crate
//!
//! Shared fixtures and builders for the policy lifecycle test suite.
//!
//! # Modules
//!
//! - `builders`: request builders with defaults the default rules accept
//! - `catalog`: producer/product/plan/contract fixtures over `MemoryStore`
//! - `assertions`: assertion helpers for `ServiceError`

pub mod assertions;
pub mod builders;
pub mod catalog;

pub use assertions::*;
pub use builders::*;
pub use catalog::*;
