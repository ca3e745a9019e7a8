//! Core Kernel - Foundational types and utilities for the policy lifecycle system
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - The service-wide error taxonomy with HTTP status mapping
//! - Temporal helpers: unit truncation, relative durations, whole-year age
//! - National ID parsing for identity-derived defaults
//! - Canonical request fingerprints
//! - Ports to the external mutual-exclusion and sequence services

pub mod error;
pub mod fingerprint;
pub mod idcard;
pub mod ports;
pub mod temporal;

pub use error::{ErrorCode, ServiceError, ServiceResult};
pub use fingerprint::{fingerprint, person_set_fingerprint};
pub use idcard::{parse_id_card, Gender, IdCardInfo};
pub use ports::{LockStore, SequenceStore};
pub use temporal::{RelativeDirection, RelativeDuration, TimeUnit};
