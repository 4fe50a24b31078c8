//! Forwarding HTTP proxy
//!
//! Accepts client connections and either forwards plaintext HTTP requests
//! to their target or opens opaque CONNECT tunnels, with an exact-match
//! hostname blocklist and per-connection transfer metrics summarized at
//! connection end.

pub mod blocklist;
pub mod config;
pub mod connection_error;
pub mod constants;
pub mod headers;
pub mod logging;
pub mod metrics;
pub mod network;
pub mod request;
pub mod session;
pub mod streaming;

pub use blocklist::Blocklist;
pub use config::{Config, ListenerConfig, create_default_config, load_config};
pub use connection_error::ProxyError;
pub use headers::HeaderMap;
pub use metrics::{ConnectionMetrics, ProxyMetrics, TransferCounters};
pub use network::{TargetConnector, TcpConnector};
pub use request::{RequestLine, TargetAddr};
pub use session::ClientSession;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::info;

/// The proxy: shared state handed to every connection task.
///
/// Everything here is either immutable after construction (blocklist,
/// connector) or updated lock-free (process metrics); connection tasks
/// never contend with each other.
pub struct ForwardProxy {
    blocklist: Blocklist,
    connector: Arc<dyn TargetConnector>,
    metrics: ProxyMetrics,
}

impl ForwardProxy {
    /// Build a proxy from configuration with the standard TCP dialer.
    pub fn new(config: &Config) -> Self {
        Self::with_connector(
            config,
            Arc::new(TcpConnector::new(config.connect_timeout())),
        )
    }

    /// Build a proxy with a custom dialer (tests use stubs).
    pub fn with_connector(config: &Config, connector: Arc<dyn TargetConnector>) -> Self {
        Self {
            blocklist: Blocklist::new(config.blocked_hosts.iter().cloned()),
            connector,
            metrics: ProxyMetrics::new(),
        }
    }

    /// Process-wide metrics handle.
    #[must_use]
    pub fn metrics(&self) -> &ProxyMetrics {
        &self.metrics
    }

    /// The active blocklist.
    #[must_use]
    pub fn blocklist(&self) -> &Blocklist {
        &self.blocklist
    }

    /// Handle one accepted client connection to completion.
    ///
    /// Every failure is confined to this connection: it is logged at the
    /// severity the error calls for, the metrics summary is still
    /// emitted, and the sockets close on return.
    pub async fn handle_client(&self, stream: TcpStream, addr: SocketAddr) {
        self.metrics.connection_opened();
        let mut connection = ConnectionMetrics::new(addr);
        info!(
            request_id = %connection.request_id,
            client = %addr,
            "New connection"
        );

        let session = ClientSession::new(&self.blocklist, self.connector.as_ref());
        if let Err(e) = session.run(stream, &mut connection).await {
            let request_id = connection.request_id;
            match e.log_level() {
                tracing::Level::DEBUG => tracing::debug!(request_id = %request_id, "{}", e),
                tracing::Level::INFO => tracing::info!(request_id = %request_id, "{}", e),
                tracing::Level::WARN => tracing::warn!(request_id = %request_id, "{}", e),
                _ => tracing::error!(request_id = %request_id, "{}", e),
            }
        }

        connection.finalize();
        connection.log_summary();
        self.metrics.connection_closed(&connection.counters());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_from_default_config() {
        let config = create_default_config();
        let proxy = ForwardProxy::new(&config);
        assert!(proxy.blocklist().is_blocked("www.youtube.com"));
        assert!(!proxy.blocklist().is_blocked("example.com"));
        assert_eq!(proxy.metrics().snapshot().total_connections, 0);
    }

    #[test]
    fn test_proxy_with_empty_blocklist() {
        let config = Config {
            blocked_hosts: Vec::new(),
            ..Config::default()
        };
        let proxy = ForwardProxy::new(&config);
        assert!(proxy.blocklist().is_empty());
    }
}
