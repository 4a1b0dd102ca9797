//! Connection state machine, address resolution, and the two socket tasks
//! (§4.2). Decomposition follows the teacher's `ds/conn.rs` + `ds/conn/backoff.rs`
//! split, generalized into `backoff` / `resolve` / `datagram` / `stream`
//! submodules so each concern is independently testable.

pub mod backoff;
pub mod datagram;
pub mod resolve;
pub mod stream;

use std::time::Duration;

use serde::Serialize;

use crate::codec::{Alliance, ControlFlags, InboundDatagram, JoystickDescriptor, RequestFlags};

/// DS→robot control datagram port (§6).
pub const CONTROL_PORT: u16 = 1110;
/// Robot→DS telemetry datagram port, bound on the DS side (§6).
pub const TELEMETRY_PORT: u16 = 1150;
/// Bidirectional stream port (§6).
pub const STREAM_PORT: u16 = 1740;

/// Inbound-liveness timeout: no datagram for this long forces Disconnected (§4.2, §5).
pub const LIVENESS_TIMEOUT: Duration = Duration::from_millis(1000);
/// Per-resolution-attempt timeout (§5).
pub const RESOLUTION_TIMEOUT: Duration = Duration::from_millis(2000);
/// Stream connect timeout (§5).
pub const STREAM_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);
/// Stream read timeout — generous, since stream traffic is bursty (§5).
pub const STREAM_READ_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Send loop period (50 Hz, §4.2).
pub const SEND_PERIOD: Duration = Duration::from_millis(20);
/// Receive loop's per-recv timeout (§4.2).
pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/// The connection's observable lifecycle (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Resolving,
    Connected,
    CodeRunning,
}

/// A consistent, atomically-read snapshot of everything the send loop needs
/// to build one outbound datagram (§4.2 send loop step 1).
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundSnapshot {
    pub control: ControlFlags,
    pub request: RequestFlags,
    pub alliance: Alliance,
    pub joystick_tags: Vec<crate::codec::OutboundTag>,
    /// One-shot: set once the receive loop has observed the inbound
    /// request-date flag; consumed (and cleared) by the same read that
    /// produces this snapshot.
    pub send_date_tag: bool,
}

/// The seam between the connection tasks and whatever owns the rest of the
/// engine's state (the coordinator, in production; a test double in unit
/// tests). Kept as a trait so `connection` has no compile-time dependency on
/// `coordinator`, mirroring `input::JoystickSink`.
pub trait EngineHandle: Send + Sync {
    /// Reads a torn-read-free snapshot of control state and clears one-shot
    /// request/date-tag bits as part of the same read (§4.2 step 1, §4.6
    /// request latching).
    fn take_outbound_snapshot(&self) -> OutboundSnapshot;

    /// Applies a freshly decoded inbound datagram to the published state.
    fn apply_inbound(&self, datagram: InboundDatagram);

    /// Called whenever the connection's liveness-derived state changes.
    fn set_connection_state(&self, state: ConnectionState);

    fn report_trip_time(&self, trip: Duration);
    fn report_lost_packets(&self, gap: u32);

    /// Called by the receive loop when an inbound datagram sets the
    /// request-date flag (§4.2): the next `take_outbound_snapshot` must
    /// report `send_date_tag = true` exactly once.
    fn request_date_tag(&self);

    fn apply_tcp_message(&self, message: crate::codec::TcpMessage);

    /// The current game-data/match-info/joystick-descriptor state, plus a
    /// version counter incremented whenever any of it changes. The stream
    /// task compares versions across polls rather than diffing message lists
    /// itself, and treats every version bump as a full resync (so a fresh
    /// connection, which starts tracking from version 0, always gets the
    /// complete current state).
    fn stream_snapshot(&self) -> (u64, Vec<crate::codec::OutboundStreamMessage>);
}

/// Builds the three `JoystickDescriptor` stream messages for the currently
/// connected slots, used once per stream (re)connect.
pub fn joystick_descriptors(slots: &[crate::input::slots::JoystickSlot]) -> Vec<JoystickDescriptor> {
    slots
        .iter()
        .filter(|s| s.connected)
        .map(|s| JoystickDescriptor {
            slot: s.slot as u8,
            name: s.human_name.clone(),
            axis_count: s.axis_count,
            button_count: s.button_count,
            hat_count: s.hat_count,
        })
        .collect()
}
