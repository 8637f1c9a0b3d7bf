//! Keyed cache of idle keep-alive links.
//!
//! A [`Link`] is owned by exactly one session at a time, or sits idle here.
//! Every release site decides explicitly between [`Disposition::Reuse`]
//! (back to the idle set) and [`Disposition::Destroy`] (transport closed).
//! The map is the only state shared between sessions; its mutex is the only
//! critical section.

mod key;

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::PoolConfig;
use crate::transport::Transport;

pub use key::PoolKey;

/// What to do with a link whose exchange has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Reuse,
    Destroy,
}

/// An open transport plus the key it was opened under.
pub struct Link {
    id: u64,
    key: PoolKey,
    transport: Box<dyn Transport>,
    reused: bool,
}

impl Link {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True when this link came out of the idle set rather than a fresh connect.
    pub fn was_reused(&self) -> bool {
        self.reused
    }

    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.transport.read(buf)
    }

    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.transport.write_all(buf)
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("reused", &self.reused)
            .finish()
    }
}

struct IdleLink {
    link: Link,
    idle_since: Instant,
}

pub struct ConnectionPool {
    idle: Mutex<HashMap<PoolKey, Vec<IdleLink>>>,
    next_id: AtomicU64,
    enabled: bool,
    max_idle_per_key: usize,
    idle_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(cfg: &PoolConfig) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            enabled: cfg.enabled,
            max_idle_per_key: cfg.max_idle_per_key,
            idle_timeout: Duration::from_secs(cfg.idle_timeout_secs),
        }
    }

    /// Take an idle link for `key`, closing any that sat idle too long.
    pub fn acquire(&self, key: &PoolKey) -> Option<Link> {
        if !self.enabled {
            return None;
        }
        let mut stale = Vec::new();
        let found = {
            let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
            let mut found = None;
            if let Some(list) = idle.get_mut(key) {
                while let Some(entry) = list.pop() {
                    if entry.idle_since.elapsed() > self.idle_timeout {
                        stale.push(entry.link);
                        continue;
                    }
                    found = Some(entry.link);
                    break;
                }
                if list.is_empty() {
                    idle.remove(key);
                }
            }
            found
        };
        for link in stale {
            tracing::debug!(id = link.id, key = %link.key, "closing stale idle link");
            self.discard(link);
        }
        found.map(|mut link| {
            tracing::debug!(id = link.id, key = %link.key, "reusing idle link");
            link.reused = true;
            link
        })
    }

    /// Wrap a freshly connected transport so it can later be pooled.
    pub fn adopt(&self, key: PoolKey, transport: Box<dyn Transport>) -> Link {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Link {
            id,
            key,
            transport,
            reused: false,
        }
    }

    /// Return a link to the idle set. It will be handed to the next
    /// `acquire` with a matching key.
    pub fn release(&self, link: Link) {
        if !self.enabled {
            self.discard(link);
            return;
        }
        let overflow = {
            let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
            let list = idle.entry(link.key.clone()).or_default();
            if list.len() >= self.max_idle_per_key {
                Some(link)
            } else {
                tracing::debug!(id = link.id, key = %link.key, "link returned to pool");
                list.push(IdleLink {
                    link,
                    idle_since: Instant::now(),
                });
                None
            }
        };
        if let Some(link) = overflow {
            self.discard(link);
        }
    }

    /// Close the transport; the link never returns to the pool.
    pub fn discard(&self, mut link: Link) {
        tracing::debug!(id = link.id, key = %link.key, "link destroyed");
        link.transport.shutdown();
    }

    /// Release or discard according to `disposition`.
    pub fn finish(&self, link: Link, disposition: Disposition) {
        match disposition {
            Disposition::Reuse => self.release(link),
            Disposition::Destroy => self.discard(link),
        }
    }

    /// Number of idle links held for `key`.
    pub fn idle_count(&self, key: &PoolKey) -> usize {
        let idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        idle.get(key).map_or(0, Vec::len)
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        let idle = self.idle.get_mut().unwrap_or_else(|e| e.into_inner());
        for (_, list) in idle.drain() {
            for mut entry in list {
                entry.link.transport.shutdown();
            }
        }
    }
}
