//! ACCORD Core — domain models, repository traits, and the error
//! taxonomy for the group/resource access-control subsystem.
//!
//! This crate is pure: no I/O, no storage backend. Implementations of
//! the repository traits live in `accord-db`.

pub mod error;
pub mod keys;
pub mod models;
pub mod repository;
