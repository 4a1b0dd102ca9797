//! The bidirectional stream-channel task (§4.2, §6 port 1740).
//!
//! Grounded on the teacher's `ds/conn.rs::tcp_conn` for the
//! connect/backoff/reconnect-forever shape, replacing its raw
//! `tokio::io::AsyncWriteExt` framing with `tokio_util::codec::Framed` over
//! [`crate::codec::message::DsStreamCodec`] so partial reads are handled by
//! the codec instead of by hand.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use crate::codec::DsStreamCodec;

use super::{backoff::Backoff, EngineHandle, STREAM_CONNECT_TIMEOUT, STREAM_PORT, STREAM_READ_TIMEOUT};

/// Connects to `host:1740` and relays messages until `shutdown` fires,
/// reconnecting with its own backoff sequence on any disconnect. Runs
/// independently of the datagram loops: a torn-down stream channel does not
/// by itself change [`super::ConnectionState`] (§4.2 — only datagram
/// liveness drives that transition).
pub async fn run(host: String, engine: Arc<dyn EngineHandle>, shutdown: CancellationToken) {
    let mut backoff = Backoff::new();

    while !shutdown.is_cancelled() {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            result = connect_and_serve(&host, &engine, &shutdown) => {
                match result {
                    Ok(()) => backoff.reset(), // serve() only returns Ok on a clean shutdown
                    Err(err) => {
                        tracing::debug!(%err, "stream channel disconnected, backing off");
                        let delay = backoff.next_delay();
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }
}

async fn connect_and_serve(
    host: &str,
    engine: &Arc<dyn EngineHandle>,
    shutdown: &CancellationToken,
) -> std::io::Result<()> {
    let addr = format!("{host}:{STREAM_PORT}");
    let stream = tokio::time::timeout(STREAM_CONNECT_TIMEOUT, TcpStream::connect(&addr))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "stream connect timed out"))??;
    tracing::info!(%addr, "stream channel connected");

    let mut framed = Framed::new(stream, DsStreamCodec);
    let mut last_version = 0u64;

    {
        let (version, messages) = engine.stream_snapshot();
        for message in messages {
            framed.send(message).await.map_err(as_io_error)?;
        }
        last_version = version;
    }

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            outgoing = wait_for_change(engine, &mut last_version) => {
                for message in outgoing {
                    framed.send(message).await.map_err(as_io_error)?;
                }
            }
            incoming = tokio::time::timeout(STREAM_READ_TIMEOUT, framed.next()) => {
                match incoming {
                    Ok(Some(Ok(message))) => engine.apply_tcp_message(message),
                    Ok(Some(Err(err))) => return Err(as_io_error(err)),
                    Ok(None) => return Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "stream closed by peer")),
                    Err(_elapsed) => return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "stream read timed out")),
                }
            }
        }
    }
}

/// Polls for a version bump in the engine's stream-relevant state (game data,
/// match info, joystick descriptors) without busy-looping, since the engine
/// handle has no push notification for this.
async fn wait_for_change(engine: &Arc<dyn EngineHandle>, last_version: &mut u64) -> Vec<crate::codec::OutboundStreamMessage> {
    loop {
        let (version, messages) = engine.stream_snapshot();
        if version != *last_version {
            *last_version = version;
            return messages;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

fn as_io_error(err: crate::error::OpenStationError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string())
}
