//! Domain models for ACCORD.
//!
//! Plain data shared across crates. Membership and grant relations are
//! not embedded in these types; they live in the storage layer.

pub mod grant;
pub mod group;
pub mod user;
