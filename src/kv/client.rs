//! Read/write-split client over a master and an optional replica.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use metrics::counter;
use tracing::{debug, warn};

use crate::config::KvSettings;

use super::{ClusterNode, KvError, KvFuture, KvNode, NodeHealth, NodeRole, RedisNode};

const TARGET: &str = "folio::kv";
const METRIC_KV_RETRY: &str = "folio_kv_retry_total";

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(250);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Bounded retry with linear backoff (`backoff * attempt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Read,
    Write,
}

/// Replicated KV client.
///
/// Routing is decided per call: a read probes the replica and falls back to
/// the master the moment the probe fails. The only state that outlives a call
/// is the advisory promotion flag.
pub struct ReplicatedKv {
    master: Arc<dyn KvNode>,
    replica: Option<Arc<dyn KvNode>>,
    replication_enabled: bool,
    promoted: AtomicBool,
    retry: RetryPolicy,
    probe_timeout: Duration,
    command_timeout: Duration,
}

impl ReplicatedKv {
    pub fn new(master: Arc<dyn KvNode>) -> Self {
        Self {
            master,
            replica: None,
            replication_enabled: false,
            promoted: AtomicBool::new(false),
            retry: RetryPolicy::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Build a Redis-backed client from deployment settings. Connections are
    /// opened lazily on first use.
    pub fn from_settings(settings: &KvSettings) -> Result<Self, KvError> {
        let master: Arc<dyn KvNode> = Arc::new(RedisNode::new(&settings.master)?);
        let replica = settings
            .replica
            .as_ref()
            .map(|node| RedisNode::new(node).map(|node| Arc::new(node) as Arc<dyn KvNode>))
            .transpose()?;

        Ok(Self::new(master)
            .with_replica_opt(replica, settings.replication_enabled)
            .with_retry_policy(RetryPolicy {
                attempts: settings.retry_attempts.get(),
                backoff: settings.retry_backoff,
            })
            .with_timeouts(settings.probe_timeout, settings.command_timeout))
    }

    pub fn with_replica(self, replica: Arc<dyn KvNode>, enabled: bool) -> Self {
        self.with_replica_opt(Some(replica), enabled)
    }

    pub fn with_replica_opt(mut self, replica: Option<Arc<dyn KvNode>>, enabled: bool) -> Self {
        self.replica = replica;
        self.replication_enabled = enabled;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = RetryPolicy {
            attempts: retry.attempts.max(1),
            backoff: retry.backoff,
        };
        self
    }

    pub fn with_timeouts(mut self, probe: Duration, command: Duration) -> Self {
        self.probe_timeout = probe;
        self.command_timeout = command;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Open connections to every configured node. Safe to call repeatedly.
    pub async fn connect(&self) -> Result<(), KvError> {
        self.master.connect().await?;
        if let Some(replica) = &self.replica
            && let Err(err) = replica.connect().await
        {
            warn!(
                target: TARGET,
                node = replica.address(),
                error = %err,
                "replica connection failed; reads will use master"
            );
        }
        Ok(())
    }

    /// Flip the local routing preference so the replica receives master
    /// duties. No data is migrated and no other process is told; real
    /// failover still needs a DNS or configuration change.
    pub fn promote_replica_to_master(&self) -> Result<(), KvError> {
        let replica = self.replica.as_ref().ok_or(KvError::NoReplica)?;
        self.promoted.store(true, Ordering::SeqCst);
        warn!(
            target: TARGET,
            node = replica.address(),
            "replica promoted locally; update DNS/configuration to complete failover"
        );
        Ok(())
    }

    pub fn is_promoted(&self) -> bool {
        self.promoted.load(Ordering::SeqCst)
    }

    /// Probe every node and report its current role and health.
    pub async fn cluster_nodes(&self) -> Vec<ClusterNode> {
        let promoted = self.is_promoted();
        let mut nodes = Vec::with_capacity(2);

        let master_role = if promoted {
            NodeRole::Replica
        } else {
            NodeRole::Master
        };
        nodes.push(self.describe(&self.master, master_role).await);

        if let Some(replica) = &self.replica {
            let role = if promoted {
                NodeRole::Master
            } else {
                NodeRole::Replica
            };
            nodes.push(self.describe(replica, role).await);
        }

        nodes
    }

    async fn describe(&self, node: &Arc<dyn KvNode>, role: NodeRole) -> ClusterNode {
        let health = if self.probe(node).await {
            NodeHealth::Healthy
        } else {
            NodeHealth::Unhealthy
        };
        ClusterNode {
            role,
            address: node.address().to_string(),
            health,
        }
    }

    /// Run `op` against the node chosen for `route`, retrying with linear
    /// backoff. Between attempts the failed node is re-probed and, when it
    /// does not answer, reconnected. The last error is returned once the
    /// attempts are exhausted.
    pub async fn with_retry<'f, T, F>(
        &self,
        route: Route,
        op: &'static str,
        run: F,
    ) -> Result<T, KvError>
    where
        F: Fn(Arc<dyn KvNode>) -> KvFuture<'f, T>,
    {
        let attempts = self.retry.attempts;
        let mut attempt = 1;

        loop {
            let (node, role) = self.resolve(route).await;
            let outcome = self.timed(&node, op, run(Arc::clone(&node))).await;

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= attempts {
                warn!(
                    target: TARGET,
                    op,
                    attempt,
                    node = node.address(),
                    role = ?role,
                    error = %err,
                    "kv operation failed after final attempt"
                );
                return Err(err);
            }

            warn!(
                target: TARGET,
                op,
                attempt,
                attempts,
                node = node.address(),
                role = ?role,
                error = %err,
                "kv operation failed; retrying"
            );
            counter!(METRIC_KV_RETRY, "op" => op).increment(1);

            if !self.probe(&node).await
                && let Err(reconnect) = node.connect().await
            {
                debug!(
                    target: TARGET,
                    node = node.address(),
                    error = %reconnect,
                    "reconnect attempt failed"
                );
            }

            tokio::time::sleep(self.retry.delay_after(attempt)).await;
            attempt += 1;
        }
    }

    async fn resolve(&self, route: Route) -> (Arc<dyn KvNode>, NodeRole) {
        if self.is_promoted()
            && let Some(replica) = &self.replica
        {
            return (Arc::clone(replica), NodeRole::Master);
        }

        if route == Route::Read
            && self.replication_enabled
            && let Some(replica) = &self.replica
        {
            if self.probe(replica).await {
                return (Arc::clone(replica), NodeRole::Replica);
            }
            debug!(
                target: TARGET,
                node = replica.address(),
                "replica probe failed; routing read to master"
            );
        }

        (Arc::clone(&self.master), NodeRole::Master)
    }

    async fn probe(&self, node: &Arc<dyn KvNode>) -> bool {
        matches!(
            tokio::time::timeout(self.probe_timeout, node.ping()).await,
            Ok(Ok(()))
        )
    }

    async fn timed<'f, T>(
        &self,
        node: &Arc<dyn KvNode>,
        op: &'static str,
        fut: KvFuture<'f, T>,
    ) -> Result<T, KvError> {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(KvError::Timeout {
                node: node.address().to_string(),
                op,
                timeout_ms: u64::try_from(self.command_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        self.with_retry(Route::Read, "get", |node| {
            Box::pin(async move { node.get(key).await })
        })
        .await
    }

    pub async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), KvError> {
        self.with_retry(Route::Write, "set_ex", |node| {
            Box::pin(async move { node.set_ex(key, value, ttl).await })
        })
        .await
    }

    pub async fn del(&self, keys: &[String]) -> Result<u64, KvError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.with_retry(Route::Write, "del", |node| {
            Box::pin(async move { node.del(keys).await })
        })
        .await
    }

    pub async fn sadd(&self, key: &str, member: &str) -> Result<(), KvError> {
        self.with_retry(Route::Write, "sadd", |node| {
            Box::pin(async move { node.sadd(key, member).await })
        })
        .await
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, KvError> {
        self.with_retry(Route::Read, "smembers", |node| {
            Box::pin(async move { node.smembers(key).await })
        })
        .await
    }

    /// TTL lookups feed write decisions, so they are answered by the master.
    pub async fn ttl(&self, key: &str) -> Result<super::KeyTtl, KvError> {
        self.with_retry(Route::Write, "ttl", |node| {
            Box::pin(async move { node.ttl(key).await })
        })
        .await
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        self.with_retry(Route::Write, "expire", |node| {
            Box::pin(async move { node.expire(key, ttl).await })
        })
        .await
    }

    pub async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, KvError> {
        self.with_retry(Route::Write, "incr", |node| {
            Box::pin(async move { node.incr(key, ttl).await })
        })
        .await
    }

    pub async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        self.with_retry(Route::Read, "scan_prefix", |node| {
            Box::pin(async move { node.scan_prefix(prefix).await })
        })
        .await
    }
}
