//! Relay engine
//!
//! Full-duplex byte forwarding between the client connection and the remote
//! connection. Two tasks copy in opposite directions; whichever finishes
//! first (EOF or error) wakes the other so both sides shut down, and the
//! call only returns once both tasks have stopped. Closing is idempotent:
//! a shutdown on an already-closed stream is ignored.

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Notify;
use tracing::trace;

/// Copy buffer size per direction
pub const RELAY_BUF_SIZE: usize = 8 * 1024;

/// Bytes moved by a finished relay, for the closing log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub client_to_remote: u64,
    pub remote_to_client: u64,
}

/// Relay bytes between two open connections until either side closes.
///
/// Consumes both streams; they are fully closed by the time this returns.
/// Read and write errors end the relay but are not surfaced: the only
/// recovery is closing both ends, which happens on every exit anyway.
pub async fn relay<C, R>(client: C, remote: R) -> RelayStats
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    R: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (remote_read, remote_write) = tokio::io::split(remote);

    let stop = Arc::new(Notify::new());
    let up = tokio::spawn(pump(client_read, remote_write, Arc::clone(&stop)));
    let down = tokio::spawn(pump(remote_read, client_write, stop));

    let (up, down) = tokio::join!(up, down);
    RelayStats {
        client_to_remote: up.unwrap_or(0),
        remote_to_client: down.unwrap_or(0),
    }
}

/// One relay direction: read chunks from `src`, write+flush them to `dst`.
///
/// Stops on EOF, any I/O error, or when the opposite direction signals
/// `stop`. Always shuts down its write side before returning and signals
/// `stop` so the opposite direction stops too.
async fn pump<A, B>(mut src: ReadHalf<A>, mut dst: WriteHalf<B>, stop: Arc<Notify>) -> u64
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let mut buf = [0u8; RELAY_BUF_SIZE];
    let mut total = 0u64;

    loop {
        tokio::select! {
            _ = stop.notified() => break,
            result = src.read(&mut buf) => match result {
                Ok(0) => break,
                Ok(n) => {
                    if dst.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                    if dst.flush().await.is_err() {
                        break;
                    }
                    total += n as u64;
                }
                Err(e) => {
                    trace!("relay read error: {}", e);
                    break;
                }
            },
        }
    }

    // Double shutdown when the peer already closed is harmless
    let _ = dst.shutdown().await;
    stop.notify_one();
    total
}
