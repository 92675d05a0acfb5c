//! Server-side heartbeating.

use std::time::Duration;

use hyper::Method;
use tokio::task::JoinHandle;
use tracing::{error, info};

use minirpc_core::{Result, RpcError};

use crate::http_client::roundtrip;
use crate::registry::{DEFAULT_TIMEOUT, SERVER_HEADER};

/// Sends one heartbeat POST for `addr` to the registry URL.
pub async fn send_heartbeat(registry_url: &str, addr: &str) -> Result<()> {
    let response = roundtrip(registry_url, Method::POST, Some((SERVER_HEADER, addr))).await?;
    if !response.status().is_success() {
        return Err(RpcError::Transport(format!(
            "registry returned status {}",
            response.status()
        )));
    }
    Ok(())
}

/// Registers `addr` immediately and keeps it alive with periodic heartbeats.
///
/// `period` defaults to the registry TTL minus one second, leaving enough
/// slack for one round trip before the entry would expire. The task stops on
/// the first failed heartbeat.
pub fn heartbeat(
    registry_url: impl Into<String>,
    addr: impl Into<String>,
    period: Option<Duration>,
) -> JoinHandle<()> {
    let registry_url = registry_url.into();
    let addr = addr.into();
    let period = period.unwrap_or(DEFAULT_TIMEOUT - Duration::from_secs(1));

    tokio::spawn(async move {
        info!(%addr, registry = %registry_url, "starting heartbeat");
        if let Err(err) = send_heartbeat(&registry_url, &addr).await {
            error!("heartbeat failed: {err}");
            return;
        }

        let mut ticker = tokio::time::interval(period);
        ticker.tick().await; // the first tick fires immediately
        loop {
            ticker.tick().await;
            if let Err(err) = send_heartbeat(&registry_url, &addr).await {
                error!("heartbeat failed, stopping: {err}");
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_heartbeat_unreachable() {
        assert!(send_heartbeat("http://127.0.0.1:1/none", "tcp://a:1")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_heartbeat_task_stops_on_failure() {
        let handle = heartbeat("http://127.0.0.1:1/none", "tcp://a:1", None);
        // the immediate registration fails, so the task finishes on its own
        handle.await.unwrap();
    }
}
