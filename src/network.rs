//! Outbound connection establishment and socket tuning
//!
//! The dialer is a trait so the dispatcher can be exercised in tests with
//! a stub that must never be reached (e.g. for blocked destinations).

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::connection_error::ProxyError;
use crate::constants::socket::{TUNNEL_RECV_BUFFER, TUNNEL_SEND_BUFFER};

/// Dials outbound TCP connections to request targets.
#[async_trait]
pub trait TargetConnector: Send + Sync {
    /// Open a TCP connection to `host:port`, resolving the hostname.
    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, ProxyError>;
}

/// Plain TCP dialer with an optional connect timeout.
///
/// The timeout bounds only the dial; established relays are never
/// timed out.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl TargetConnector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, ProxyError> {
        let dial = TcpStream::connect((host, port));
        let result = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, dial).await.map_err(|_| {
                ProxyError::ConnectTimeout {
                    host: host.to_string(),
                    port,
                }
            })?,
            None => dial.await,
        };
        result.map_err(|source| ProxyError::Connect {
            host: host.to_string(),
            port,
            source,
        })
    }
}

/// Socket tuning for CONNECT tunnels.
pub struct SocketTuner;

impl SocketTuner {
    /// Disable Nagle and widen the kernel buffers on a tunnel socket.
    /// Tunnels carry interactive TLS traffic in both directions, so
    /// write latency matters more than packet coalescing.
    pub fn tune_for_tunnel(stream: &TcpStream) -> Result<(), io::Error> {
        use socket2::SockRef;

        let sock = SockRef::from(stream);
        sock.set_nodelay(true)?;
        sock.set_recv_buffer_size(TUNNEL_RECV_BUFFER)?;
        sock.set_send_buffer_size(TUNNEL_SEND_BUFFER)?;
        Ok(())
    }

    /// Tune both legs of a tunnel. Failures are logged, never fatal.
    pub fn apply_to_pair(client_stream: &TcpStream, remote_stream: &TcpStream) {
        if let Err(e) = Self::tune_for_tunnel(client_stream) {
            debug!("Failed to tune client socket: {}", e);
        }
        if let Err(e) = Self::tune_for_tunnel(remote_stream) {
            debug!("Failed to tune remote socket: {}", e);
        }
    }
}
