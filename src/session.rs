//! Client session management
//!
//! A session owns one accepted connection from request parsing through
//! relay handoff: read the request line and headers, decide plain-HTTP
//! forward vs CONNECT tunnel, apply the blocklist, dial the target and
//! hand both sockets to the relay engine.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info};

use crate::blocklist::Blocklist;
use crate::connection_error::ProxyError;
use crate::constants::{buffer, response};
use crate::headers::HeaderMap;
use crate::metrics::{ConnectionMetrics, Direction};
use crate::network::{SocketTuner, TargetConnector};
use crate::request::{RequestLine, TargetAddr};
use crate::streaming::StreamHandler;

/// Dispatcher for a single accepted client connection.
pub struct ClientSession<'a> {
    blocklist: &'a Blocklist,
    connector: &'a dyn TargetConnector,
}

impl<'a> ClientSession<'a> {
    pub fn new(blocklist: &'a Blocklist, connector: &'a dyn TargetConnector) -> Self {
        Self {
            blocklist,
            connector,
        }
    }

    /// Drive the connection to completion.
    ///
    /// Returns `Ok(())` for clean endings, including a client that closed
    /// without sending anything. Errors abandon the connection; the
    /// caller logs them and closes the sockets.
    pub async fn run(
        &self,
        client_stream: TcpStream,
        metrics: &mut ConnectionMetrics,
    ) -> Result<(), ProxyError> {
        let (read_half, write_half) = client_stream.into_split();
        let mut reader = BufReader::with_capacity(buffer::READER_CAPACITY, read_half);

        let mut first_line = String::new();
        if reader.read_line(&mut first_line).await? == 0 {
            debug!(request_id = %metrics.request_id, "Client closed before sending a request");
            return Ok(());
        }
        info!(
            request_id = %metrics.request_id,
            client = %metrics.client_addr,
            "Received request: {}",
            first_line.trim_end()
        );

        let request = RequestLine::parse(&first_line)?;
        metrics.record_request_line(&request);

        let raw_headers = self.read_headers(&mut reader, metrics).await?;
        metrics.record_headers(HeaderMap::parse(&raw_headers));

        if request.is_connect() {
            self.run_tunnel(reader, write_half, &request, metrics).await
        } else {
            self.run_plain(reader, write_half, &request, &first_line, &raw_headers, metrics)
                .await
        }
    }

    /// Read raw header lines until the blank line that ends the block.
    /// EOF before that blank line is a protocol violation.
    async fn read_headers(
        &self,
        reader: &mut BufReader<OwnedReadHalf>,
        metrics: &ConnectionMetrics,
    ) -> Result<Vec<String>, ProxyError> {
        let mut raw_headers = Vec::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Err(ProxyError::ProtocolViolation);
            }
            let stripped = line.trim_end_matches(['\r', '\n']);
            if stripped.is_empty() {
                return Ok(raw_headers);
            }
            debug!(request_id = %metrics.request_id, "Header: {}", stripped);
            raw_headers.push(stripped.to_string());
        }
    }

    /// CONNECT path: blocklist check, dial, canned response, opaque
    /// dual-task tunnel.
    async fn run_tunnel(
        &self,
        reader: BufReader<OwnedReadHalf>,
        mut write_half: OwnedWriteHalf,
        request: &RequestLine,
        metrics: &mut ConnectionMetrics,
    ) -> Result<(), ProxyError> {
        let target = TargetAddr::from_connect(&request.target)?;
        metrics.record_target(target.clone());

        if self.blocklist.is_blocked(&target.host) {
            info!(
                request_id = %metrics.request_id,
                target = %target,
                "Blocked tunnel destination"
            );
            write_half.write_all(response::FORBIDDEN).await?;
            return Err(ProxyError::BlockedDestination { host: target.host });
        }

        info!(request_id = %metrics.request_id, target = %target, "Initiating tunnel");
        let mut remote_stream = self.connector.connect(&target.host, target.port).await?;
        write_half.write_all(response::CONNECTION_ESTABLISHED).await?;
        info!(request_id = %metrics.request_id, target = %target, "Established tunnel");

        // Bytes the header reader buffered past the blank line (e.g. an
        // eagerly sent TLS hello) must reach the remote before the tunnel
        // tasks take over the raw halves.
        let leftover = reader.buffer().to_vec();
        let read_half = reader.into_inner();
        if !leftover.is_empty() {
            remote_stream.write_all(&leftover).await?;
            metrics
                .counters()
                .record(Direction::ClientToServer, leftover.len() as u64);
        }

        let client_stream = read_half
            .reunite(write_half)
            .map_err(|e| ProxyError::Io(std::io::Error::other(e)))?;
        SocketTuner::apply_to_pair(&client_stream, &remote_stream);

        StreamHandler::relay_tunnel(
            metrics.request_id,
            client_stream,
            remote_stream,
            metrics.counters(),
        )
        .await;
        Ok(())
    }

    /// Plain-HTTP path: dial, replay the request head verbatim, then a
    /// single-task relay until either side closes.
    async fn run_plain(
        &self,
        reader: BufReader<OwnedReadHalf>,
        write_half: OwnedWriteHalf,
        request: &RequestLine,
        first_line: &str,
        raw_headers: &[String],
        metrics: &mut ConnectionMetrics,
    ) -> Result<(), ProxyError> {
        let target = TargetAddr::from_uri(&request.target)?;
        metrics.record_target(target.clone());

        let mut remote_stream = self.connector.connect(&target.host, target.port).await?;
        info!(
            request_id = %metrics.request_id,
            target = %target,
            "Established HTTP connection"
        );

        // Request line as received, each header line re-terminated with
        // CRLF, then the blank line. Values are never modified.
        let mut head = Vec::with_capacity(
            first_line.len() + raw_headers.iter().map(|h| h.len() + 2).sum::<usize>() + 2,
        );
        head.extend_from_slice(first_line.as_bytes());
        for header in raw_headers {
            head.extend_from_slice(header.as_bytes());
            head.extend_from_slice(b"\r\n");
        }
        head.extend_from_slice(b"\r\n");
        remote_stream.write_all(&head).await?;

        let counters = metrics.counters();
        StreamHandler::relay_multiplexed(
            metrics.request_id,
            reader,
            write_half,
            &mut remote_stream,
            &counters,
        )
        .await?;
        Ok(())
    }
}
