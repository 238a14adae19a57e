//! Read-side lookups against the hosted database's REST interface.

pub mod rest;

pub use rest::RestBackend;
