//! Redis-compatible node over a multiplexed tokio connection.

use std::time::Duration;

use async_trait::async_trait;
use redis::{Client, RedisError, aio::MultiplexedConnection};
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::config::NodeSettings;

use super::{KeyTtl, KvError, KvNode, whole_seconds};

const TARGET: &str = "folio::kv::redis";
const SCAN_BATCH: usize = 500;

/// One Redis endpoint.
///
/// The multiplexed connection is cloned per command so every request task
/// shares one socket. It is opened on first use and dropped when an I/O
/// error is observed, so the next call (or an explicit
/// [`KvNode::connect`]) dials again.
pub struct RedisNode {
    address: String,
    client: Client,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisNode {
    pub fn new(settings: &NodeSettings) -> Result<Self, KvError> {
        let address = format!("{}:{}/{}", settings.host, settings.port, settings.db);
        let url = connection_url(settings)
            .map_err(|reason| KvError::connectivity(&address, reason))?;
        let client = Client::open(url.as_str())
            .map_err(|err| KvError::connectivity(&address, err.to_string()))?;

        Ok(Self {
            address,
            client,
            connection: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, KvError> {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.as_ref() {
            return Ok(connection.clone());
        }

        let connection = self.dial().await?;
        *guard = Some(connection.clone());
        Ok(connection)
    }

    async fn dial(&self) -> Result<MultiplexedConnection, KvError> {
        let connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| KvError::connectivity(&self.address, err.to_string()))?;
        info!(target: TARGET, node = %self.address, "connected");
        Ok(connection)
    }

    async fn fail(&self, op: &'static str, err: RedisError) -> KvError {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            self.connection.lock().await.take();
            debug!(target: TARGET, node = %self.address, op, "dropped broken connection");
            KvError::connectivity(&self.address, err.to_string())
        } else {
            KvError::command(&self.address, op, err.to_string())
        }
    }
}

fn connection_url(settings: &NodeSettings) -> Result<Url, String> {
    let raw = format!("redis://{}:{}/{}", settings.host, settings.port, settings.db);
    let mut url = Url::parse(&raw).map_err(|err| format!("invalid address `{raw}`: {err}"))?;
    if let Some(password) = settings.password.as_deref().filter(|p| !p.is_empty()) {
        url.set_password(Some(password))
            .map_err(|_| format!("cannot attach password to `{raw}`"))?;
    }
    Ok(url)
}

/// Escape glob metacharacters so a key prefix matches literally in `SCAN`.
fn glob_escape(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('*');
    escaped
}

#[async_trait]
impl KvNode for RedisNode {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<(), KvError> {
        let connection = self.dial().await?;
        *self.connection.lock().await = Some(connection);
        Ok(())
    }

    async fn ping(&self) -> Result<(), KvError> {
        let mut conn = self.connection().await?;
        let reply: Result<String, RedisError> = redis::cmd("PING").query_async(&mut conn).await;
        match reply {
            Ok(_) => Ok(()),
            Err(err) => Err(self.fail("ping", err).await),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let mut conn = self.connection().await?;
        let reply: Result<Option<Vec<u8>>, RedisError> =
            redis::cmd("GET").arg(key).query_async(&mut conn).await;
        match reply {
            Ok(value) => Ok(value),
            Err(err) => Err(self.fail("get", err).await),
        }
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.connection().await?;
        let reply: Result<(), RedisError> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(whole_seconds(ttl))
            .query_async(&mut conn)
            .await;
        match reply {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail("set_ex", err).await),
        }
    }

    async fn del(&self, keys: &[String]) -> Result<u64, KvError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        let reply: Result<u64, RedisError> =
            redis::cmd("DEL").arg(keys).query_async(&mut conn).await;
        match reply {
            Ok(removed) => Ok(removed),
            Err(err) => Err(self.fail("del", err).await),
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), KvError> {
        let mut conn = self.connection().await?;
        let reply: Result<u64, RedisError> = redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await;
        match reply {
            Ok(_) => Ok(()),
            Err(err) => Err(self.fail("sadd", err).await),
        }
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, KvError> {
        let mut conn = self.connection().await?;
        let reply: Result<Vec<String>, RedisError> =
            redis::cmd("SMEMBERS").arg(key).query_async(&mut conn).await;
        match reply {
            Ok(members) => Ok(members),
            Err(err) => Err(self.fail("smembers", err).await),
        }
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, KvError> {
        let mut conn = self.connection().await?;
        let reply: Result<i64, RedisError> = redis::cmd("TTL").arg(key).query_async(&mut conn).await;
        match reply {
            Ok(-2) => Ok(KeyTtl::Missing),
            Ok(seconds) if seconds < 0 => Ok(KeyTtl::Persistent),
            Ok(seconds) => Ok(KeyTtl::Expires(Duration::from_secs(seconds.unsigned_abs()))),
            Err(err) => Err(self.fail("ttl", err).await),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.connection().await?;
        let reply: Result<i64, RedisError> = redis::cmd("EXPIRE")
            .arg(key)
            .arg(whole_seconds(ttl))
            .query_async(&mut conn)
            .await;
        match reply {
            Ok(_) => Ok(()),
            Err(err) => Err(self.fail("expire", err).await),
        }
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, KvError> {
        let mut conn = self.connection().await?;
        let reply: Result<u64, RedisError> =
            redis::cmd("INCR").arg(key).query_async(&mut conn).await;
        let value = match reply {
            Ok(value) => value,
            Err(err) => return Err(self.fail("incr", err).await),
        };

        if value == 1 {
            let reply: Result<i64, RedisError> = redis::cmd("EXPIRE")
                .arg(key)
                .arg(whole_seconds(ttl))
                .query_async(&mut conn)
                .await;
            if let Err(err) = reply {
                return Err(self.fail("incr", err).await);
            }
        }

        Ok(value)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let mut conn = self.connection().await?;
        let pattern = glob_escape(prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let reply: Result<(u64, Vec<String>), RedisError> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await;
            let (next, batch) = match reply {
                Ok(page) => page,
                Err(err) => return Err(self.fail("scan_prefix", err).await),
            };
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(password: Option<&str>) -> NodeSettings {
        NodeSettings {
            host: "cache.internal".to_string(),
            port: 6380,
            password: password.map(str::to_string),
            db: 2,
        }
    }

    #[test]
    fn connection_url_includes_db_and_password() {
        let url = connection_url(&node(Some("s3cret"))).expect("url");
        assert_eq!(url.as_str(), "redis://:s3cret@cache.internal:6380/2");
    }

    #[test]
    fn connection_url_without_password() {
        let url = connection_url(&node(None)).expect("url");
        assert_eq!(url.as_str(), "redis://cache.internal:6380/2");
    }

    #[test]
    fn address_never_carries_credentials() {
        let node = RedisNode::new(&node(Some("s3cret"))).expect("node");
        assert_eq!(node.address(), "cache.internal:6380/2");
    }

    #[test]
    fn glob_escape_protects_metacharacters() {
        assert_eq!(glob_escape("folio:page:"), "folio:page:*");
        assert_eq!(glob_escape("a*b?[c]"), "a\\*b\\?\\[c\\]*");
    }
}
