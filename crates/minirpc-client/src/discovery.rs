//! Service discovery.
//!
//! [`MultiDiscovery`] selects over a manually maintained address list;
//! [`RegistryDiscovery`] keeps that list fresh from a minirpc registry with
//! a TTL-bounded cache. A failed refresh keeps the stale list: stale is
//! preferred to empty.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use minirpc_core::{Result, RpcError};

/// How a single address is picked from the current list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    /// Uniformly random over the current list.
    Random,
    /// Monotonic index modulo the list length. The index deliberately
    /// persists across updates, so a shrinking list may briefly skew the
    /// next selection.
    RoundRobin,
}

/// A source of server addresses for the fan-out client.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Re-reads the list from its backing source, if any.
    async fn refresh(&self) -> Result<()>;
    /// Replaces the list.
    async fn update(&self, servers: Vec<String>) -> Result<()>;
    /// Picks one address by mode.
    async fn get(&self, mode: SelectMode) -> Result<String>;
    /// Returns the whole list.
    async fn get_all(&self) -> Result<Vec<String>>;
}

/// Discovery over a static, manually updated list.
pub struct MultiDiscovery {
    servers: RwLock<Vec<String>>,
    index: AtomicUsize,
}

impl MultiDiscovery {
    pub fn new(servers: Vec<String>) -> Self {
        MultiDiscovery {
            servers: RwLock::new(servers),
            index: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Discovery for MultiDiscovery {
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    async fn update(&self, servers: Vec<String>) -> Result<()> {
        *self.servers.write().await = servers;
        Ok(())
    }

    async fn get(&self, mode: SelectMode) -> Result<String> {
        let servers = self.servers.read().await;
        if servers.is_empty() {
            return Err(RpcError::NoAvailableServer);
        }
        let picked = match mode {
            SelectMode::Random => &servers[rand::random::<usize>() % servers.len()],
            SelectMode::RoundRobin => {
                let index = self.index.fetch_add(1, Ordering::Relaxed);
                &servers[index % servers.len()]
            }
        };
        Ok(picked.clone())
    }

    async fn get_all(&self) -> Result<Vec<String>> {
        Ok(self.servers.read().await.clone())
    }
}

/// Default TTL for the registry-backed server-list cache.
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Discovery backed by a minirpc registry.
///
/// `registry` is the full endpoint URL, e.g.
/// `http://127.0.0.1:9999/_minirpc_/registry`.
pub struct RegistryDiscovery {
    multi: MultiDiscovery,
    registry: String,
    ttl: Duration,
    last_update: Mutex<Option<Instant>>,
}

impl RegistryDiscovery {
    pub fn new(registry: impl Into<String>, ttl: Duration) -> Self {
        let ttl = if ttl.is_zero() {
            DEFAULT_UPDATE_TIMEOUT
        } else {
            ttl
        };
        RegistryDiscovery {
            multi: MultiDiscovery::new(Vec::new()),
            registry: registry.into(),
            ttl,
            last_update: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Discovery for RegistryDiscovery {
    async fn refresh(&self) -> Result<()> {
        let mut last_update = self.last_update.lock().await;
        if let Some(at) = *last_update {
            if at.elapsed() < self.ttl {
                return Ok(());
            }
        }

        info!(registry = %self.registry, "refreshing server list from registry");
        match minirpc_registry::fetch_servers(&self.registry).await {
            Ok(servers) => {
                self.multi.update(servers).await?;
                *last_update = Some(Instant::now());
            }
            Err(err) => {
                warn!("registry refresh failed, keeping cached list: {err}");
            }
        }
        Ok(())
    }

    async fn update(&self, servers: Vec<String>) -> Result<()> {
        self.multi.update(servers).await?;
        *self.last_update.lock().await = Some(Instant::now());
        Ok(())
    }

    async fn get(&self, mode: SelectMode) -> Result<String> {
        self.refresh().await?;
        self.multi.get(mode).await
    }

    async fn get_all(&self) -> Result<Vec<String>> {
        self.refresh().await?;
        self.multi.get_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three() -> Vec<String> {
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    }

    #[tokio::test]
    async fn test_round_robin_cycles() {
        let discovery = MultiDiscovery::new(three());
        let mut picked = Vec::new();
        for _ in 0..6 {
            picked.push(discovery.get(SelectMode::RoundRobin).await.unwrap());
        }
        assert_eq!(picked, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_random_picks_from_list() {
        let discovery = MultiDiscovery::new(three());
        for _ in 0..20 {
            let picked = discovery.get(SelectMode::Random).await.unwrap();
            assert!(three().contains(&picked));
        }
    }

    #[tokio::test]
    async fn test_empty_list_errors() {
        let discovery = MultiDiscovery::new(Vec::new());
        let err = discovery.get(SelectMode::Random).await.unwrap_err();
        assert!(matches!(err, RpcError::NoAvailableServer));
    }

    #[tokio::test]
    async fn test_round_robin_index_persists_across_update() {
        let discovery = MultiDiscovery::new(three());
        discovery.get(SelectMode::RoundRobin).await.unwrap(); // consumes "a"

        discovery
            .update(vec!["x".to_string(), "y".to_string()])
            .await
            .unwrap();
        // index is now 1, so the next pick is "y", not "x"
        assert_eq!(discovery.get(SelectMode::RoundRobin).await.unwrap(), "y");
    }

    #[tokio::test]
    async fn test_get_all_returns_copy() {
        let discovery = MultiDiscovery::new(three());
        let all = discovery.get_all().await.unwrap();
        assert_eq!(all, three());
    }

    #[tokio::test]
    async fn test_registry_discovery_update_marks_fresh() {
        let discovery = RegistryDiscovery::new("http://127.0.0.1:1/none", Duration::from_secs(60));
        discovery.update(three()).await.unwrap();

        // inside the TTL no fetch happens, so get() serves the cached list
        // even though the registry URL is unreachable
        let all = discovery.get_all().await.unwrap();
        assert_eq!(all, three());
    }

    #[tokio::test]
    async fn test_registry_refresh_failure_keeps_stale_list() {
        let discovery = RegistryDiscovery::new("http://127.0.0.1:1/none", Duration::from_millis(1));
        discovery.update(three()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        // TTL expired and the registry is unreachable: stale list survives
        let all = discovery.get_all().await.unwrap();
        assert_eq!(all, three());
    }
}
