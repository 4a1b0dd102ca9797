//! The fixed-rate send loop and the receive loop (§4.2).
//!
//! Grounded on `ds/conn.rs::udp_conn`'s two-tasks-over-one-socket-pair shape
//! (a `tokio::time::interval`-driven sender plus a `select!`-driven
//! receiver), generalized to: (a) read a torn-read-free snapshot through
//! [`super::EngineHandle`] instead of a shared `RwLock<DsState>`, (b) track
//! trip time and lost packets, which the teacher doesn't do at all.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::codec::{decode_inbound_datagram, encode_outbound_datagram, DateStamp, OutboundTag};

use super::{ConnectionState, EngineHandle, OutboundSnapshot, RECEIVE_TIMEOUT, SEND_PERIOD};

const TRIP_TIME_ALPHA: f64 = 0.2;
/// Bound on the outstanding-send log so a peer that never replies can't grow
/// it without limit; trip-time measurement simply misses a sample when this
/// is exceeded, which is harmless.
const SENT_LOG_CAPACITY: usize = 512;

/// Tracks send timestamps by sequence number so the receive loop can match
/// an inbound sequence back to when it was sent (§4.2, trip time).
#[derive(Default)]
pub struct SentLog {
    entries: HashMap<u16, Instant>,
}

impl SentLog {
    pub fn new() -> SentLog {
        SentLog { entries: HashMap::new() }
    }

    pub fn record(&mut self, sequence: u16, at: Instant) {
        if self.entries.len() >= SENT_LOG_CAPACITY {
            self.entries.clear();
        }
        self.entries.insert(sequence, at);
    }

    pub fn take(&mut self, sequence: u16) -> Option<Instant> {
        self.entries.remove(&sequence)
    }
}

fn build_tags(snapshot: &OutboundSnapshot) -> Vec<OutboundTag> {
    let mut tags = snapshot.joystick_tags.clone();
    if snapshot.send_date_tag {
        tags.push(OutboundTag::DateTime(DateStamp::now()));
        tags.push(OutboundTag::Timezone(current_timezone_name()));
    }
    tags
}

fn current_timezone_name() -> String {
    // No teacher or pack precedent exposes the host timezone name; UTC is the
    // only value this crate can derive without depending on `chrono-tz` for
    // a feature the spec otherwise leaves unspecified.
    "UTC".to_string()
}

/// Emits one outbound datagram every [`SEND_PERIOD`] on `socket` (already
/// connected to the resolved controller address).
pub async fn send_loop(
    socket: Arc<UdpSocket>,
    engine: Arc<dyn EngineHandle>,
    sent_log: Arc<Mutex<SentLog>>,
    shutdown: CancellationToken,
) {
    let mut sequence: u16 = 0;
    // `Burst` keeps long-term rate exact by never sleeping extra to "catch
    // up" from a late tick — the next tick fires at the next period boundary
    // from the original start, not from when the late one completed (§4.2).
    let mut interval = tokio::time::interval(SEND_PERIOD);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let mut snapshot = engine.take_outbound_snapshot();
                snapshot.control.set_enabled(false);
                send_one(&socket, &mut sequence, &snapshot, &sent_log).await;
                break;
            }
            _ = interval.tick() => {
                let snapshot = engine.take_outbound_snapshot();
                send_one(&socket, &mut sequence, &snapshot, &sent_log).await;
            }
        }
    }
}

async fn send_one(socket: &UdpSocket, sequence: &mut u16, snapshot: &OutboundSnapshot, sent_log: &Mutex<SentLog>) {
    let tags = build_tags(snapshot);
    let bytes = encode_outbound_datagram(*sequence, snapshot.control, snapshot.request, snapshot.alliance, &tags);
    match socket.send(&bytes).await {
        Ok(_) => sent_log.lock().unwrap().record(*sequence, Instant::now()),
        Err(err) => tracing::debug!(%err, "outbound datagram send failed"),
    }
    *sequence = sequence.wrapping_add(1);
}

/// Parks on `socket` with a [`RECEIVE_TIMEOUT`] timeout, decoding and
/// applying each inbound datagram and tracking liveness (§4.2).
pub async fn receive_loop(
    socket: Arc<UdpSocket>,
    engine: Arc<dyn EngineHandle>,
    sent_log: Arc<Mutex<SentLog>>,
    shutdown: CancellationToken,
) {
    let mut buf = vec![0u8; 4096];
    let mut last_sequence: Option<u16> = None;
    let mut trip_ewma: Option<f64> = None;
    let mut connected = false;
    let mut last_inbound: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            result = tokio::time::timeout(RECEIVE_TIMEOUT, socket.recv(&mut buf)) => {
                match result {
                    Ok(Ok(n)) => handle_packet(
                        &buf[..n],
                        &engine,
                        &sent_log,
                        &mut last_sequence,
                        &mut trip_ewma,
                        &mut connected,
                        &mut last_inbound,
                    ),
                    Ok(Err(err)) => tracing::debug!(%err, "datagram recv error"),
                    Err(_elapsed) => {} // 100ms with nothing; liveness check below still runs
                }
            }
        }

        if connected {
            if let Some(seen) = last_inbound {
                if seen.elapsed() >= super::LIVENESS_TIMEOUT {
                    connected = false;
                    engine.set_connection_state(ConnectionState::Disconnected);
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_packet(
    bytes: &[u8],
    engine: &Arc<dyn EngineHandle>,
    sent_log: &Mutex<SentLog>,
    last_sequence: &mut Option<u16>,
    trip_ewma: &mut Option<f64>,
    connected: &mut bool,
    last_inbound: &mut Option<Instant>,
) {
    let datagram = match decode_inbound_datagram(bytes) {
        Ok(datagram) => datagram,
        Err(err) => {
            tracing::debug!(?err, "dropped malformed inbound datagram");
            return;
        }
    };
    let now = Instant::now();

    if let Some(previous) = *last_sequence {
        let gap = datagram.sequence.wrapping_sub(previous).wrapping_sub(1);
        // A gap near u16::MAX means the sequence went backwards (a stale or
        // reordered packet), not a loss; only forward gaps count.
        if gap != 0 && gap < u16::MAX / 2 {
            engine.report_lost_packets(gap as u32);
        }
    }
    *last_sequence = Some(datagram.sequence);

    if let Some(sent_at) = sent_log.lock().unwrap().take(datagram.sequence) {
        let trip = now.duration_since(sent_at).as_secs_f64();
        let updated = match *trip_ewma {
            Some(prev) => TRIP_TIME_ALPHA * trip + (1.0 - TRIP_TIME_ALPHA) * prev,
            None => trip,
        };
        *trip_ewma = Some(updated);
        engine.report_trip_time(Duration::from_secs_f64(updated.max(0.0)));
    }

    if datagram.request_date {
        engine.request_date_tag();
    }

    if !*connected {
        *connected = true;
        engine.set_connection_state(ConnectionState::Connected);
    }
    if !datagram.status.code_initializing {
        engine.set_connection_state(ConnectionState::CodeRunning);
    }

    *last_inbound = Some(now);
    engine.apply_inbound(datagram);
}
