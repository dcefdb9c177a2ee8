//! Reachability check deciding upload-now vs enqueue.

use serde::{Deserialize, Serialize};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

pub trait ConnectivityProbe: Send + Sync {
    /// True if the network looks reachable. Never fails; errors mean false.
    fn is_connected(&self) -> bool;
}

impl<F> ConnectivityProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_connected(&self) -> bool {
        self()
    }
}

/// Probe target settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// `host:port` to connect to
    pub address: String,
    /// Connect timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            // Public DNS; reachable from nearly any connected network
            address: "8.8.8.8:53".to_string(),
            timeout_ms: 3_000,
        }
    }
}

/// Opens (and immediately drops) a TCP connection to a well-known address.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(
            config.address.clone(),
            Duration::from_millis(config.timeout_ms.max(1)),
        )
    }
}

impl ConnectivityProbe for TcpProbe {
    fn is_connected(&self) -> bool {
        let addrs = match self.address.to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!("Probe could not resolve {}: {e}", self.address);
                return false;
            }
        };

        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(_) => return true,
                Err(e) => debug!("Probe connect to {addr} failed: {e}"),
            }
        }
        false
    }
}
