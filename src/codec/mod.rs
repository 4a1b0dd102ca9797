//! Wire encoding for both channels: the UDP control/telemetry datagrams and
//! the TCP stream's length-tagged frames.
//!
//! Submodule split follows the teacher's `proto/{tcp,udp}` split, but
//! generalized: `control`/`telemetry`/`joystick`/`tags` hold the value types
//! and tagged-section codecs shared by both directions, while `outbound` and
//! `inbound` assemble them into whole datagrams.

pub mod control;
pub mod inbound;
pub mod joystick;
pub mod message;
pub mod outbound;
pub mod tags;
pub mod telemetry;

pub use control::{Alliance, AllianceColor, ControlFlags, Mode, RequestFlags, StatusFlags};
pub use inbound::{decode_inbound_datagram, InboundDatagram};
pub use joystick::JoystickData;
pub use message::{
    DsStreamCodec, ErrorReport, JoystickDescriptor, MatchInfo, MatchType, OutboundStreamMessage,
    TcpMessage, VersionInfo,
};
pub use outbound::{encode_outbound_datagram, OutboundDatagram};
pub use tags::{DateStamp, OutboundTag};
pub use telemetry::{BatteryVoltage, CanMetrics, CpuUtilization, PdpCurrents, TelemetryData};

/// The comm version byte both directions agree on (§4).
pub const COMM_VERSION: u8 = 0x01;
