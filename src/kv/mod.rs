//! Replicated key-value access for the page cache.
//!
//! Reads may be served by a replica when one is configured and answers a
//! liveness probe; writes always go to the master. Node backends sit behind
//! [`KvNode`] so the routing and retry logic in [`ReplicatedKv`] is shared by
//! the Redis backend and the in-process [`MemoryNode`].

mod client;
mod lock;
mod memory;
mod redis_node;

use std::{future::Future, pin::Pin, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use client::{ReplicatedKv, RetryPolicy, Route};
pub use memory::MemoryNode;
pub use redis_node::RedisNode;

/// Boxed future returned by operations handed to [`ReplicatedKv::with_retry`].
pub type KvFuture<'f, T> = Pin<Box<dyn Future<Output = Result<T, KvError>> + Send + 'f>>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
    #[error("connection to `{node}` failed: {message}")]
    Connectivity { node: String, message: String },
    #[error("`{op}` on `{node}` timed out after {timeout_ms} ms")]
    Timeout {
        node: String,
        op: &'static str,
        timeout_ms: u64,
    },
    #[error("`{op}` rejected by `{node}`: {message}")]
    Command {
        node: String,
        op: &'static str,
        message: String,
    },
    #[error("no replica is configured")]
    NoReplica,
}

impl KvError {
    pub fn connectivity(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connectivity {
            node: node.into(),
            message: message.into(),
        }
    }

    pub fn command(node: impl Into<String>, op: &'static str, message: impl Into<String>) -> Self {
        Self::Command {
            node: node.into(),
            op,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Master,
    Replica,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeHealth {
    Healthy,
    Unhealthy,
}

/// Point-in-time view of one cluster member. Health is probed on demand and
/// never stored.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterNode {
    pub role: NodeRole,
    pub address: String,
    pub health: NodeHealth,
}

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    Persistent,
    Expires(Duration),
}

/// One addressable store node.
///
/// Implementations must be safe to share between request tasks; connection
/// setup through [`KvNode::connect`] is idempotent and may be re-run after a
/// failure has been detected.
#[async_trait]
pub trait KvNode: Send + Sync {
    /// Display address used in logs and errors. Never contains credentials.
    fn address(&self) -> &str;

    async fn connect(&self) -> Result<(), KvError>;

    async fn ping(&self) -> Result<(), KvError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), KvError>;

    /// Deletes the given keys and returns how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64, KvError>;

    async fn sadd(&self, key: &str, member: &str) -> Result<(), KvError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, KvError>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl, KvError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError>;

    /// Increments a counter, giving it `ttl` when the increment created it.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, KvError>;

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, KvError>;
}

pub(crate) fn whole_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
