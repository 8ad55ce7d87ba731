use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

/// Whether something is serving on the gateway port.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn is_running(&self) -> bool;
}

/// A successful TCP connect within the timeout counts as running.
pub struct TcpProbe {
    addr: SocketAddr,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }
}

#[async_trait]
impl HealthProbe for TcpProbe {
    async fn is_running(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::debug!(addr = %self.addr, error = %e, "Gateway probe refused");
                false
            }
            Err(_) => {
                tracing::debug!(addr = %self.addr, "Gateway probe timed out");
                false
            }
        }
    }
}
