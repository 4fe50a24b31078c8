//! Connection error types for the proxy
//!
//! Every error here is confined to the connection that raised it; the
//! accept loop only ever logs them. The taxonomy distinguishes client
//! misbehavior (malformed requests) from outbound failures so each can be
//! logged at an appropriate severity.

use thiserror::Error;

/// Errors terminating a single proxied connection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProxyError {
    /// Request line had fewer than two tokens, or the target was unparsable
    #[error("malformed request line: {line:?}")]
    Parse { line: String },

    /// Client closed the connection before the header-terminating blank line
    #[error("connection closed before end of headers")]
    ProtocolViolation,

    /// CONNECT target matched the blocklist; the client got a 403
    #[error("tunnel destination '{host}' is blocklisted")]
    BlockedDestination { host: String },

    /// Outbound TCP connect failed (refused, unreachable, DNS failure)
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    /// Outbound TCP connect did not complete within the configured timeout
    #[error("connect to {host}:{port} timed out")]
    ConnectTimeout { host: String, port: u16 },

    /// I/O failure on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// Check whether this is a client disconnection (broken pipe / reset).
    #[must_use]
    pub fn is_client_disconnect(&self) -> bool {
        matches!(
            self,
            Self::Io(e) if matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
            )
        )
    }

    /// Check whether this is an outbound connectivity failure.
    #[must_use]
    pub const fn is_connect_failure(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectTimeout { .. })
    }

    /// Get the appropriate log level for this error.
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        match self {
            // Client disconnects and malformed requests are routine noise
            Self::Io(e) if matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
            ) =>
            {
                tracing::Level::DEBUG
            }
            Self::Parse { .. } | Self::ProtocolViolation => tracing::Level::DEBUG,
            // A blocked destination is expected policy enforcement
            Self::BlockedDestination { .. } => tracing::Level::INFO,
            // Outbound failures might be transient
            Self::Connect { .. } | Self::ConnectTimeout { .. } => tracing::Level::WARN,
            Self::Io(_) => tracing::Level::WARN,
        }
    }
}
