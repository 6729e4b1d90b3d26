//! Persistence contracts for the Papercast pipeline.
//!
//! This crate provides:
//! - [`JobStore`] and [`ContentStore`] traits the pipeline is written
//!   against; any store with atomic partial updates satisfies them
//! - In-memory implementations used by tests and local runs

pub mod content_store;
pub mod error;
pub mod job_store;
pub mod memory;

pub use content_store::ContentStore;
pub use error::{StoreError, StoreResult};
pub use job_store::JobStore;
pub use memory::{MemoryContentStore, MemoryJobStore};
