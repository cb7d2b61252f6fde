//! Porchlight Core - Shared types library.
//!
//! This crate provides the domain types used across all Porchlight components:
//! - `client` - Session-gated address book and identity resolution
//! - `cli` - Command-line tools for migrations and admin grants
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, addresses and identities

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
