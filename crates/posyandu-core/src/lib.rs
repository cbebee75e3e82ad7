//! Core types and the storage trait for the Posyandu immunization registry.
//!
//! Everything here is pure domain: no HTTP, no SQL, no async runtime.
//! The SMS protocol, the SQLite backend, and the server all build on this
//! crate and never on each other's internals.

pub mod baby;
pub mod error;
pub mod log;
pub mod schedule;
pub mod store;
pub mod village;
pub mod worker;

pub use error::{Error, Result};
