//! Change-feed clients.
//!
//! [`MemoryChangeFeed`] delivers events published in-process and is used by
//! tests and local runs. [`SupabaseRealtimeFeed`] speaks the Phoenix channel
//! protocol of Supabase Realtime and reconnects with backoff.

pub mod backoff;
pub mod memory;
pub mod protocol;
pub mod socket;

pub use backoff::ReconnectPolicy;
pub use memory::MemoryChangeFeed;
pub use socket::SupabaseRealtimeFeed;
