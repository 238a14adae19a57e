//! # market-core
//!
//! Core crate for the Deniz Market notifier. Contains the unified error
//! system, configuration schemas, typed identifiers, change-feed event
//! types, and the collaborator traits the realtime pipelines depend on.
//!
//! This crate has **no** internal dependencies on other workspace crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
