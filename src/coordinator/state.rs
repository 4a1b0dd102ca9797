//! [`RobotState`]: the flattened, serializable snapshot published once per
//! 20ms quantum (§3, §4.6, §10.5).
//!
//! Grounded on `raje2v-DriveStation::protocol/types.rs`'s `RobotState`
//! (flat struct combining connection status, diagnostic data, and power
//! data into one value the frontend subscribes to), generalized to also
//! carry the practice-sequencer fields this spec adds.

use serde::Serialize;

use crate::codec::{Alliance, ControlFlags, StatusFlags, TelemetryData};
use crate::connection::ConnectionState;
use crate::input::slots::JoystickSlot;
use crate::practice::Phase;

/// A complete, point-in-time view of the engine, published to external
/// consumers over a coalescing watch channel (§4.6, §5).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotState {
    pub connection: ConnectionState,
    pub control: ControlFlags,
    pub status: StatusFlags,
    pub battery_voltage: f32,
    /// Duplicated from `status.brownout` at the top level since a UI
    /// collaborator shouldn't have to know the status byte's shape to show
    /// the one bit it cares about most (§10.5).
    pub brownout: bool,
    pub code_running: bool,
    pub telemetry: TelemetryData,
    pub joysticks: Vec<JoystickSlot>,
    pub practice_phase: Phase,
    pub practice_elapsed_secs: f32,
    pub practice_remaining_secs: Option<f32>,
    pub trip_time_ms: f32,
    pub lost_packets: u32,
    pub team_number: u16,
    pub alliance: Alliance,
    /// Monotonic publication counter (§5: "monotonic by a publication
    /// counter"). Consumers that miss intermediate values can detect the gap.
    pub sequence: u64,
}

impl Default for RobotState {
    fn default() -> Self {
        RobotState {
            connection: ConnectionState::Disconnected,
            control: ControlFlags::default(),
            status: StatusFlags::default(),
            battery_voltage: 0.0,
            brownout: false,
            code_running: false,
            telemetry: TelemetryData::default(),
            joysticks: Vec::new(),
            practice_phase: Phase::Idle,
            practice_elapsed_secs: 0.0,
            practice_remaining_secs: None,
            trip_time_ms: 0.0,
            lost_packets: 0,
            team_number: 0,
            alliance: Alliance::default(),
            sequence: 0,
        }
    }
}
