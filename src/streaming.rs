//! Bidirectional byte relay engine
//!
//! Two operating modes, both moving raw bytes in `RELAY_CHUNK` reads and
//! recording every successful read in the connection's shared counters:
//!
//! - *Single-task mode* for plain-HTTP relays: one `select!` loop over
//!   both sockets. A zero-length read on either side ends the whole
//!   relay and the connection closes.
//! - *Dual-task mode* for CONNECT tunnels: one spawned task per
//!   direction so simultaneous full-duplex traffic never starves either
//!   side. Both tasks are joined before the caller tears the sockets
//!   down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, trace};

use crate::constants::buffer::RELAY_CHUNK;
use crate::metrics::{Direction, RequestId, TransferCounters};

/// Outcome of one non-blocking read attempt on a tunnel leg.
///
/// Control flow as data: a would-block condition is an ordinary outcome
/// that means "wait for readiness and retry", never an error.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Bytes were read into the buffer
    Data(usize),
    /// The socket was not ready after all; wait and retry
    WouldBlock,
    /// Graceful end of stream, the peer sent no more bytes and won't
    Closed,
}

/// Relay engine for established proxy connections.
pub struct StreamHandler;

impl StreamHandler {
    /// Single-task relay between a client and a remote server.
    ///
    /// The client read side arrives as the dispatcher's `BufReader` so
    /// request bytes buffered beyond the header block are relayed instead
    /// of lost. Ends when either side reaches end of stream or a hard
    /// I/O error occurs; read errors end the relay quietly, write errors
    /// propagate.
    pub async fn relay_multiplexed(
        request_id: RequestId,
        mut client_reader: BufReader<OwnedReadHalf>,
        mut client_write: OwnedWriteHalf,
        remote_stream: &mut TcpStream,
        counters: &TransferCounters,
    ) -> std::io::Result<()> {
        let (mut remote_read, mut remote_write) = remote_stream.split();
        let mut client_buf = vec![0u8; RELAY_CHUNK];
        let mut remote_buf = vec![0u8; RELAY_CHUNK];

        loop {
            tokio::select! {
                result = client_reader.read(&mut client_buf) => match result {
                    Ok(0) => {
                        trace!(request_id = %request_id, "Client reached end of stream");
                        break;
                    }
                    Ok(n) => {
                        counters.record(Direction::ClientToServer, n as u64);
                        trace!(request_id = %request_id, bytes = n, "Client -> Server");
                        remote_write.write_all(&client_buf[..n]).await?;
                    }
                    Err(e) => {
                        debug!(request_id = %request_id, "Error reading from client: {}", e);
                        break;
                    }
                },
                result = remote_read.read(&mut remote_buf) => match result {
                    Ok(0) => {
                        trace!(request_id = %request_id, "Remote reached end of stream");
                        break;
                    }
                    Ok(n) => {
                        counters.record(Direction::ServerToClient, n as u64);
                        trace!(request_id = %request_id, bytes = n, "Server -> Client");
                        client_write.write_all(&remote_buf[..n]).await?;
                    }
                    Err(e) => {
                        debug!(request_id = %request_id, "Error reading from remote: {}", e);
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    /// Dual-task relay for an opaque CONNECT tunnel.
    ///
    /// Spawns one task per direction over owned split halves and joins
    /// both before returning; the caller closes the sockets afterwards.
    /// A direction that ends half-closes its write side so the receiving
    /// peer sees EOF; a direction that fails hard raises a shared stop
    /// flag for its sibling.
    pub async fn relay_tunnel(
        request_id: RequestId,
        client_stream: TcpStream,
        remote_stream: TcpStream,
        counters: Arc<TransferCounters>,
    ) {
        let (client_read, client_write) = client_stream.into_split();
        let (remote_read, remote_write) = remote_stream.into_split();
        let stop = Arc::new(AtomicBool::new(false));

        let uplink = tokio::spawn(Self::relay_direction(
            request_id,
            client_read,
            remote_write,
            Direction::ClientToServer,
            Arc::clone(&counters),
            Arc::clone(&stop),
        ));
        let downlink = tokio::spawn(Self::relay_direction(
            request_id,
            remote_read,
            client_write,
            Direction::ServerToClient,
            counters,
            stop,
        ));

        // Join failures would mean a panicked relay task; nothing to
        // salvage for this connection beyond proceeding to teardown.
        let (up, down) = tokio::join!(uplink, downlink);
        if let Err(e) = up {
            debug!(request_id = %request_id, "Uplink task failed: {}", e);
        }
        if let Err(e) = down {
            debug!(request_id = %request_id, "Downlink task failed: {}", e);
        }
    }

    /// One direction of a tunnel: readiness wait, non-blocking read,
    /// forward, repeat.
    ///
    /// A graceful end of stream ends only this direction; the sibling may
    /// still be mid-transfer the other way. A hard I/O failure raises the
    /// shared stop flag, since the connection is beyond use for both
    /// directions; the sibling notices at its next iteration.
    async fn relay_direction(
        request_id: RequestId,
        read_half: OwnedReadHalf,
        mut write_half: OwnedWriteHalf,
        direction: Direction,
        counters: Arc<TransferCounters>,
        stop: Arc<AtomicBool>,
    ) {
        let mut buf = vec![0u8; RELAY_CHUNK];
        let mut failed = false;

        loop {
            if stop.load(Ordering::Acquire) {
                trace!(request_id = %request_id, %direction, "Sibling direction failed, stopping");
                break;
            }
            if let Err(e) = read_half.readable().await {
                debug!(request_id = %request_id, %direction, "Readiness wait failed: {}", e);
                failed = true;
                break;
            }
            match Self::try_read_chunk(&read_half, &mut buf) {
                Ok(ReadOutcome::WouldBlock) => continue,
                Ok(ReadOutcome::Closed) => {
                    trace!(request_id = %request_id, %direction, "End of stream");
                    break;
                }
                Ok(ReadOutcome::Data(n)) => {
                    counters.record(direction, n as u64);
                    trace!(request_id = %request_id, %direction, bytes = n, "Relayed chunk");
                    if let Err(e) = write_half.write_all(&buf[..n]).await {
                        debug!(request_id = %request_id, %direction, "Write failed: {}", e);
                        failed = true;
                        break;
                    }
                }
                Err(e) => {
                    debug!(request_id = %request_id, %direction, "Read failed: {}", e);
                    failed = true;
                    break;
                }
            }
        }

        if failed {
            stop.store(true, Ordering::Release);
        }
        // Half-close so the peer behind the write side sees EOF; on a
        // graceful end the sibling direction keeps running until it ends
        // on its own.
        let _ = write_half.shutdown().await;
    }

    /// Classify one `try_read` attempt into a [`ReadOutcome`].
    fn try_read_chunk(read_half: &OwnedReadHalf, buf: &mut [u8]) -> std::io::Result<ReadOutcome> {
        match read_half.try_read(buf) {
            Ok(0) => Ok(ReadOutcome::Closed),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
            Err(e) => Err(e),
        }
    }
}
