//! Constants used throughout the proxy
//!
//! This module centralizes magic numbers and protocol byte literals
//! to improve maintainability and reduce duplication.

use std::time::Duration;

/// Buffer size constants
pub mod buffer {
    /// Chunk size for relay reads in both directions (16KB)
    ///
    /// Every relay loop reads at most this many bytes per iteration.
    /// Large enough to drain a typical TLS record in one read, small
    /// enough to keep per-connection memory modest.
    pub const RELAY_CHUNK: usize = 16 * 1024;

    /// BufReader capacity for request-line and header parsing (8KB)
    ///
    /// Request lines and header blocks are small; anything buffered
    /// beyond the blank line is drained into the relay before handoff.
    pub const READER_CAPACITY: usize = 8 * 1024;

    /// Verify the header reader never buffers more than one relay chunk,
    /// so the pre-relay drain is a single write
    const _READER_FITS_CHUNK: () = assert!(
        READER_CAPACITY <= RELAY_CHUNK,
        "READER_CAPACITY must not exceed RELAY_CHUNK"
    );
}

/// Timeout constants
pub mod timeout {
    use super::Duration;

    /// Default timeout for outbound TCP connects
    ///
    /// Bounds only the dial, never an established relay. Overridable
    /// (or disabled) via `connect_timeout_secs` in the config.
    pub const CONNECT: Duration = Duration::from_secs(10);
}

/// Canned proxy-generated responses
///
/// These are the only status lines the proxy itself ever writes.
/// Byte literals so the hot path never formats strings.
pub mod response {
    /// Sent to the client after the tunnel target was dialed successfully
    pub const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

    /// Sent to the client when the tunnel target is blocklisted
    pub const FORBIDDEN: &[u8] = b"HTTP/1.1 403 Forbidden\r\n\r\n";
}

/// Default target ports
pub mod port {
    /// Default port for plain-HTTP targets without an explicit port
    pub const DEFAULT_HTTP: u16 = 80;

    /// Default port for CONNECT targets without an explicit port
    pub const DEFAULT_TLS: u16 = 443;
}

/// Socket tuning constants for CONNECT tunnels
pub mod socket {
    /// TCP receive buffer size applied to tunnel sockets (256KB)
    pub const TUNNEL_RECV_BUFFER: usize = 256 * 1024;

    /// TCP send buffer size applied to tunnel sockets (256KB)
    pub const TUNNEL_SEND_BUFFER: usize = 256 * 1024;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_chunk_size() {
        assert_eq!(buffer::RELAY_CHUNK, 16384);
        // Page-aligned for clean buffer allocation
        assert_eq!(buffer::RELAY_CHUNK % 4096, 0);
    }

    #[test]
    fn test_reader_fits_relay_chunk() {
        assert!(buffer::READER_CAPACITY <= buffer::RELAY_CHUNK);
    }

    #[test]
    fn test_canned_responses_are_byte_exact() {
        assert_eq!(
            response::CONNECTION_ESTABLISHED,
            b"HTTP/1.1 200 Connection Established\r\n\r\n"
        );
        assert_eq!(response::FORBIDDEN, b"HTTP/1.1 403 Forbidden\r\n\r\n");
    }

    #[test]
    fn test_canned_responses_end_with_blank_line() {
        assert!(response::CONNECTION_ESTABLISHED.ends_with(b"\r\n\r\n"));
        assert!(response::FORBIDDEN.ends_with(b"\r\n\r\n"));
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(port::DEFAULT_HTTP, 80);
        assert_eq!(port::DEFAULT_TLS, 443);
    }

    #[test]
    fn test_connect_timeout_nonzero() {
        assert!(timeout::CONNECT.as_secs() > 0);
    }

    #[test]
    fn test_tunnel_socket_buffers_symmetric() {
        assert_eq!(socket::TUNNEL_RECV_BUFFER, socket::TUNNEL_SEND_BUFFER);
        assert!(socket::TUNNEL_RECV_BUFFER >= buffer::RELAY_CHUNK);
    }
}
