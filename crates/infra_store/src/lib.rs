//! Infrastructure Adapters
//!
//! In-memory implementations of every storage and coordination port, plus
//! the HTTP webhook transport. One store instance backs the catalog,
//! policies, claims, notifications, locks and counters; a single state lock
//! makes the multi-row writes the ports declare atomic actually atomic.

pub mod memory;
pub mod seed;
pub mod webhook;

pub use memory::MemoryStore;
pub use seed::{demo_catalog, DemoCatalog};
pub use webhook::HttpWebhookTransport;
