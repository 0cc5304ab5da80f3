pub mod application;
pub mod cache;
pub mod config;
pub mod content;
pub mod edge;
pub mod infra;
pub mod kv;
pub mod warmup;
