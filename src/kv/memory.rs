//! In-process node with Redis-like semantics.
//!
//! Backs single-process deployments and tests. Expiry is evaluated lazily on
//! access against the tokio clock, so paused-time tests can age entries.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;

use super::{
    KeyTtl, KvError, KvNode,
    lock::{rw_read, rw_write},
};

#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

pub struct MemoryNode {
    address: String,
    slots: RwLock<HashMap<String, Slot>>,
    available: AtomicBool,
}

impl MemoryNode {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            slots: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every call fails with a
    /// connectivity error, including probes and reconnects.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        rw_read(&self.slots, &self.address, "len")
            .values()
            .filter(|slot| slot.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_available(&self) -> Result<(), KvError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(KvError::connectivity(&self.address, "node unavailable"))
        }
    }

    fn wrong_type(&self, op: &'static str) -> KvError {
        KvError::command(
            &self.address,
            op,
            "WRONGTYPE operation against a key holding the wrong kind of value",
        )
    }
}

#[async_trait]
impl KvNode for MemoryNode {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<(), KvError> {
        self.ensure_available()
    }

    async fn ping(&self) -> Result<(), KvError> {
        self.ensure_available()
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        self.ensure_available()?;
        let now = Instant::now();
        let slots = rw_read(&self.slots, &self.address, "get");
        match slots.get(key).filter(|slot| slot.is_live(now)) {
            None => Ok(None),
            Some(Slot {
                value: Value::Bytes(bytes),
                ..
            }) => Ok(Some(bytes.clone())),
            Some(_) => Err(self.wrong_type("get")),
        }
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), KvError> {
        self.ensure_available()?;
        let slot = Slot {
            value: Value::Bytes(value.to_vec()),
            expires_at: Some(Instant::now() + ttl),
        };
        rw_write(&self.slots, &self.address, "set_ex").insert(key.to_string(), slot);
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, KvError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut slots = rw_write(&self.slots, &self.address, "del");
        let removed = keys
            .iter()
            .filter_map(|key| slots.remove(key))
            .filter(|slot| slot.is_live(now))
            .count();
        Ok(removed as u64)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), KvError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut slots = rw_write(&self.slots, &self.address, "sadd");
        if slots.get(key).is_some_and(|slot| !slot.is_live(now)) {
            slots.remove(key);
        }
        let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
            value: Value::Set(BTreeSet::new()),
            expires_at: None,
        });
        match &mut slot.value {
            Value::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            Value::Bytes(_) => Err(self.wrong_type("sadd")),
        }
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, KvError> {
        self.ensure_available()?;
        let now = Instant::now();
        let slots = rw_read(&self.slots, &self.address, "smembers");
        match slots.get(key).filter(|slot| slot.is_live(now)) {
            None => Ok(Vec::new()),
            Some(Slot {
                value: Value::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(self.wrong_type("smembers")),
        }
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, KvError> {
        self.ensure_available()?;
        let now = Instant::now();
        let slots = rw_read(&self.slots, &self.address, "ttl");
        Ok(match slots.get(key).filter(|slot| slot.is_live(now)) {
            None => KeyTtl::Missing,
            Some(Slot {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Slot {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(at.saturating_duration_since(now)),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut slots = rw_write(&self.slots, &self.address, "expire");
        if let Some(slot) = slots.get_mut(key).filter(|slot| slot.is_live(now)) {
            slot.expires_at = Some(now + ttl);
        }
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, KvError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut slots = rw_write(&self.slots, &self.address, "incr");
        let current = match slots.get(key).filter(|slot| slot.is_live(now)) {
            None => None,
            Some(Slot {
                value: Value::Bytes(bytes),
                expires_at,
            }) => {
                let parsed = std::str::from_utf8(bytes)
                    .ok()
                    .and_then(|text| text.parse::<u64>().ok())
                    .ok_or_else(|| {
                        KvError::command(&self.address, "incr", "value is not an integer")
                    })?;
                Some((parsed, *expires_at))
            }
            Some(_) => return Err(self.wrong_type("incr")),
        };

        let (next, expires_at) = match current {
            Some((value, expires_at)) => (value + 1, expires_at),
            None => (1, Some(now + ttl)),
        };
        slots.insert(
            key.to_string(),
            Slot {
                value: Value::Bytes(next.to_string().into_bytes()),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        self.ensure_available()?;
        let now = Instant::now();
        let slots = rw_read(&self.slots, &self.address, "scan_prefix");
        let mut keys: Vec<String> = slots
            .iter()
            .filter(|(key, slot)| key.starts_with(prefix) && slot.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let node = MemoryNode::new("memory");
        node.set_ex("k", b"v", Duration::from_secs(5))
            .await
            .expect("set");

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(node.get("k").await.expect("get"), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(node.get("k").await.expect("get"), None);
        assert_eq!(node.ttl("k").await.expect("ttl"), KeyTtl::Missing);
    }

    #[tokio::test]
    async fn sets_start_persistent_until_expired() {
        let node = MemoryNode::new("memory");
        node.sadd("tag", "a").await.expect("sadd");
        node.sadd("tag", "b").await.expect("sadd");
        assert_eq!(node.ttl("tag").await.expect("ttl"), KeyTtl::Persistent);

        node.expire("tag", Duration::from_secs(30))
            .await
            .expect("expire");
        assert!(matches!(
            node.ttl("tag").await.expect("ttl"),
            KeyTtl::Expires(_)
        ));
        assert_eq!(
            node.smembers("tag").await.expect("smembers"),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[tokio::test]
    async fn wrong_type_is_a_command_error() {
        let node = MemoryNode::new("memory");
        node.sadd("tag", "a").await.expect("sadd");
        let err = node.get("tag").await.expect_err("wrong type");
        assert!(matches!(err, KvError::Command { op: "get", .. }));
    }

    #[tokio::test]
    async fn counters_keep_their_first_expiry() {
        let node = MemoryNode::new("memory");
        assert_eq!(node.incr("hits", Duration::from_secs(60)).await.expect("incr"), 1);
        assert_eq!(node.incr("hits", Duration::from_secs(1)).await.expect("incr"), 2);
        match node.ttl("hits").await.expect("ttl") {
            KeyTtl::Expires(left) => assert!(left > Duration::from_secs(30)),
            other => panic!("unexpected ttl {other:?}"),
        }
    }

    #[tokio::test]
    async fn unavailable_node_rejects_everything() {
        let node = MemoryNode::new("memory");
        node.set_available(false);
        assert!(node.ping().await.is_err());
        assert!(node.connect().await.is_err());
        assert!(node.get("k").await.is_err());
        node.set_available(true);
        assert!(node.ping().await.is_ok());
    }

    #[tokio::test]
    async fn scan_prefix_filters_namespace() {
        let node = MemoryNode::new("memory");
        let ttl = Duration::from_secs(60);
        node.set_ex("page:a", b"1", ttl).await.expect("set");
        node.set_ex("page:b", b"1", ttl).await.expect("set");
        node.set_ex("other:c", b"1", ttl).await.expect("set");

        assert_eq!(
            node.scan_prefix("page:").await.expect("scan"),
            vec!["page:a".to_string(), "page:b".to_string()]
        );
    }
}
