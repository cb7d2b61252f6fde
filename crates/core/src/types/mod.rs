//! Core types for Porchlight.
//!
//! This module provides type-safe wrappers for the address book and identity
//! domain.

pub mod address;
pub mod email;
pub mod id;
pub mod identity;

pub use address::{Address, NewAddress};
pub use email::{Email, EmailError};
pub use id::*;
pub use identity::{AdminGrant, Identity};
