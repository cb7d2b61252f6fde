//! Session-gated services.
//!
//! - [`addresses`] - The signed-in user's postal addresses
//! - [`identity`] - Identity and admin role resolution, sign-in and sign-out

pub mod addresses;
pub mod identity;
