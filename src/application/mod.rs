//! Application services composed from the cache tier components.

pub mod error;
pub mod invalidation;
