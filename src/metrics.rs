//! Per-connection and process-wide metrics
//!
//! `ConnectionMetrics` is owned by the task handling one connection. The
//! two transfer counters are the only state touched by more than one task
//! at a time (the two directions of a tunnel), so they live behind an
//! `Arc<TransferCounters>` with lock-free atomic updates scoped to that
//! single connection. Everything else is written once before relay
//! begins and read back for the end-of-connection summary.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::headers::HeaderMap;
use crate::request::{RequestLine, TargetAddr};

/// Global atomic counter for request IDs.
/// Relaxed ordering is sufficient since only uniqueness matters.
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Generate a new unique request ID.
    pub fn new() -> Self {
        Self(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Transfer direction of a relay task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientToServer => write!(f, "client->server"),
            Self::ServerToClient => write!(f, "server->client"),
        }
    }
}

/// Byte counters shared by the two relay directions of one connection.
///
/// Monotonically non-decreasing; atomic increments guarantee no lost
/// updates under concurrent recording. Never shared across connections.
#[derive(Debug, Default)]
pub struct TransferCounters {
    client_bytes: AtomicU64,
    server_bytes: AtomicU64,
}

impl TransferCounters {
    /// Record bytes moved in the given direction.
    #[inline]
    pub fn record(&self, direction: Direction, bytes: u64) {
        match direction {
            Direction::ClientToServer => {
                self.client_bytes.fetch_add(bytes, Ordering::Relaxed);
            }
            Direction::ServerToClient => {
                self.server_bytes.fetch_add(bytes, Ordering::Relaxed);
            }
        }
    }

    /// Total bytes the client sent toward the server.
    #[must_use]
    pub fn client_bytes(&self) -> u64 {
        self.client_bytes.load(Ordering::Relaxed)
    }

    /// Total bytes the server sent toward the client.
    #[must_use]
    pub fn server_bytes(&self) -> u64 {
        self.server_bytes.load(Ordering::Relaxed)
    }
}

/// Diagnostic record for a single accepted connection.
#[derive(Debug)]
pub struct ConnectionMetrics {
    pub request_id: RequestId,
    started: Instant,
    ended: Option<Instant>,
    pub client_addr: SocketAddr,
    pub method: Option<String>,
    pub path: Option<String>,
    pub protocol: Option<String>,
    pub target: Option<TargetAddr>,
    pub headers: HeaderMap,
    pub user_agent: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
    counters: Arc<TransferCounters>,
}

impl ConnectionMetrics {
    /// Create metrics at accept time, before any I/O on the connection.
    pub fn new(client_addr: SocketAddr) -> Self {
        Self {
            request_id: RequestId::new(),
            started: Instant::now(),
            ended: None,
            client_addr,
            method: None,
            path: None,
            protocol: None,
            target: None,
            headers: HeaderMap::default(),
            user_agent: None,
            content_type: None,
            content_length: None,
            counters: Arc::new(TransferCounters::default()),
        }
    }

    /// Handle to the shared byte counters for relay tasks.
    #[must_use]
    pub fn counters(&self) -> Arc<TransferCounters> {
        Arc::clone(&self.counters)
    }

    /// Record the parsed request line.
    pub fn record_request_line(&mut self, line: &RequestLine) {
        self.method = Some(line.method.clone());
        self.path = Some(line.target.clone());
        self.protocol = Some(line.version.clone());
    }

    /// Record the parsed headers and the diagnostic fields lifted from them.
    pub fn record_headers(&mut self, headers: HeaderMap) {
        self.user_agent = headers.get("user-agent").map(str::to_string);
        self.content_type = headers.get("content-type").map(str::to_string);
        self.content_length = headers.get("content-length").map(str::to_string);
        self.headers = headers;
    }

    /// Record the resolved outbound destination.
    pub fn record_target(&mut self, target: TargetAddr) {
        self.target = Some(target);
    }

    /// Mark the connection finished and return its duration.
    ///
    /// Called exactly once, after relay completes and before the sockets
    /// close. A second call is a logic error and keeps the first end time.
    pub fn finalize(&mut self) -> Duration {
        debug_assert!(self.ended.is_none(), "finalize called twice");
        let end = *self.ended.get_or_insert_with(Instant::now);
        end.duration_since(self.started)
    }

    /// Duration so far, or the final duration once finalized.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.ended
            .unwrap_or_else(Instant::now)
            .duration_since(self.started)
    }

    /// Emit the end-of-connection summary with every recorded field.
    pub fn log_summary(&self) {
        let target = self
            .target
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        tracing::info!(
            request_id = %self.request_id,
            duration_ms = self.duration().as_millis() as u64,
            client_ip = %self.client_addr.ip(),
            client_port = self.client_addr.port(),
            client_bytes = self.counters.client_bytes(),
            server_bytes = self.counters.server_bytes(),
            target = %target,
            method = self.method.as_deref().unwrap_or("-"),
            path = self.path.as_deref().unwrap_or("-"),
            protocol = self.protocol.as_deref().unwrap_or("-"),
            content_type = self.content_type.as_deref().unwrap_or("-"),
            content_length = self.content_length.as_deref().unwrap_or("-"),
            user_agent = self.user_agent.as_deref().unwrap_or("-"),
            header_count = self.headers.len(),
            "Connection summary"
        );
    }
}

/// Process-wide counters, updated lock-free from every connection task.
#[derive(Debug, Clone, Default)]
pub struct ProxyMetrics {
    inner: Arc<ProxyMetricsInner>,
}

#[derive(Debug)]
struct ProxyMetricsInner {
    total_connections: AtomicU64,
    active_connections: AtomicUsize,
    client_bytes: AtomicU64,
    server_bytes: AtomicU64,
    start_time: Instant,
}

impl Default for ProxyMetricsInner {
    fn default() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicUsize::new(0),
            client_bytes: AtomicU64::new(0),
            server_bytes: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

/// Point-in-time view of process-wide metrics.
#[derive(Debug, Clone)]
pub struct ProxySnapshot {
    pub total_connections: u64,
    pub active_connections: usize,
    pub client_bytes: u64,
    pub server_bytes: u64,
    pub uptime: Duration,
}

impl ProxyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new accepted connection.
    #[inline]
    pub fn connection_opened(&self) {
        self.inner.total_connections.fetch_add(1, Ordering::Relaxed);
        self.inner
            .active_connections
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished connection and fold its byte counts into the totals.
    #[inline]
    pub fn connection_closed(&self, counters: &TransferCounters) {
        self.inner
            .active_connections
            .fetch_sub(1, Ordering::Relaxed);
        self.inner
            .client_bytes
            .fetch_add(counters.client_bytes(), Ordering::Relaxed);
        self.inner
            .server_bytes
            .fetch_add(counters.server_bytes(), Ordering::Relaxed);
    }

    /// Get a snapshot of current totals.
    #[must_use]
    pub fn snapshot(&self) -> ProxySnapshot {
        ProxySnapshot {
            total_connections: self.inner.total_connections.load(Ordering::Relaxed),
            active_connections: self.inner.active_connections.load(Ordering::Relaxed),
            client_bytes: self.inner.client_bytes.load(Ordering::Relaxed),
            server_bytes: self.inner.server_bytes.load(Ordering::Relaxed),
            uptime: self.inner.start_time.elapsed(),
        }
    }
}

impl ProxySnapshot {
    /// Format uptime as a human-readable string.
    #[must_use]
    pub fn format_uptime(&self) -> String {
        let secs = self.uptime.as_secs();
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 45678)
    }

    #[test]
    fn test_request_id_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_request_id_display() {
        let id = RequestId::new();
        assert!(id.to_string().starts_with("req-"));
    }

    #[test]
    fn test_counters_track_directions_independently() {
        let counters = TransferCounters::default();
        counters.record(Direction::ClientToServer, 100);
        counters.record(Direction::ServerToClient, 50);
        counters.record(Direction::ClientToServer, 1);
        assert_eq!(counters.client_bytes(), 101);
        assert_eq!(counters.server_bytes(), 50);
    }

    #[test]
    fn test_counters_no_lost_updates_under_concurrency() {
        // k concurrent writers per direction, each contributing a known
        // total; the sums must match exactly.
        let counters = Arc::new(TransferCounters::default());
        let writers = 8u64;
        let increments = 1000u64;

        let handles: Vec<_> = (0..writers * 2)
            .map(|i| {
                let counters = Arc::clone(&counters);
                let direction = if i % 2 == 0 {
                    Direction::ClientToServer
                } else {
                    Direction::ServerToClient
                };
                std::thread::spawn(move || {
                    for _ in 0..increments {
                        counters.record(direction, 3);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counters.client_bytes(), writers * increments * 3);
        assert_eq!(counters.server_bytes(), writers * increments * 3);
    }

    #[test]
    fn test_metrics_created_before_io() {
        let metrics = ConnectionMetrics::new(test_addr());
        assert!(metrics.method.is_none());
        assert!(metrics.target.is_none());
        assert_eq!(metrics.counters().client_bytes(), 0);
    }

    #[test]
    fn test_record_request_line_and_headers() {
        let mut metrics = ConnectionMetrics::new(test_addr());
        let line = RequestLine::parse("GET http://example.com/ HTTP/1.1").unwrap();
        metrics.record_request_line(&line);
        metrics.record_headers(HeaderMap::parse([
            "User-Agent: curl/8.0",
            "Content-Type: text/plain",
            "Content-Length: 12",
        ]));

        assert_eq!(metrics.method.as_deref(), Some("GET"));
        assert_eq!(metrics.path.as_deref(), Some("http://example.com/"));
        assert_eq!(metrics.protocol.as_deref(), Some("HTTP/1.1"));
        assert_eq!(metrics.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(metrics.content_type.as_deref(), Some("text/plain"));
        assert_eq!(metrics.content_length.as_deref(), Some("12"));
    }

    #[test]
    fn test_finalize_freezes_duration() {
        let mut metrics = ConnectionMetrics::new(test_addr());
        let duration = metrics.finalize();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(metrics.duration(), duration);
    }

    #[test]
    fn test_shared_counters_feed_owned_metrics() {
        let metrics = ConnectionMetrics::new(test_addr());
        let counters = metrics.counters();
        counters.record(Direction::ClientToServer, 7);
        assert_eq!(metrics.counters().client_bytes(), 7);
    }

    #[test]
    fn test_proxy_metrics_connection_tracking() {
        let proxy_metrics = ProxyMetrics::new();
        proxy_metrics.connection_opened();
        proxy_metrics.connection_opened();

        let snapshot = proxy_metrics.snapshot();
        assert_eq!(snapshot.total_connections, 2);
        assert_eq!(snapshot.active_connections, 2);

        let counters = TransferCounters::default();
        counters.record(Direction::ClientToServer, 10);
        counters.record(Direction::ServerToClient, 20);
        proxy_metrics.connection_closed(&counters);

        let snapshot = proxy_metrics.snapshot();
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.total_connections, 2);
        assert_eq!(snapshot.client_bytes, 10);
        assert_eq!(snapshot.server_bytes, 20);
    }

    #[test]
    fn test_format_uptime() {
        let snapshot = ProxySnapshot {
            total_connections: 0,
            active_connections: 0,
            client_bytes: 0,
            server_bytes: 0,
            uptime: Duration::from_secs(3665),
        };
        assert_eq!(snapshot.format_uptime(), "1h 1m 5s");

        let snapshot = ProxySnapshot {
            uptime: Duration::from_secs(42),
            ..snapshot
        };
        assert_eq!(snapshot.format_uptime(), "42s");
    }
}
