//! Collaborator implementations.
//!
//! - [`memory`] - In-process store and session provider
//! - [`rest`] - HTTP client for hosted auth and data APIs

pub mod memory;
pub mod rest;

pub use memory::{MemorySessions, MemoryStore};
pub use rest::RestClient;
