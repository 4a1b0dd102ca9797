//! The inbound telemetry datagram (§4.1): controller → station, received as
//! fast as the controller emits it (typically 50 Hz, not guaranteed).
//!
//! Grounded on `proto/udp/inbound.rs`'s `UdpResponsePacket::decode` and
//! `inbound/types.rs`'s tag dispatch, but with the `gen_stub_tags!`-stubbed
//! tags (PDP, CPU, RAM, disk, CAN) decoded for real per §10.5, plus a real
//! decoder for the `0x01` joystick-outputs/rumble tag the teacher didn't
//! implement at all.

use crate::error::DecodeError;

use super::control::StatusFlags;
use super::telemetry::{CanMetrics, CpuUtilization, PdpCurrents, TelemetryData};
use super::COMM_VERSION;

const JOYSTICK_OUTPUTS_TAG: u8 = 0x01;
const DISK_FREE_TAG: u8 = 0x04;
const CPU_TAG: u8 = 0x05;
const RAM_TAG: u8 = 0x06;
const PDP_TAG: u8 = 0x08;
const CAN_METRICS_TAG: u8 = 0x0E;

/// Rumble/output command for one joystick slot (inbound tag `0x01`).
///
/// The teacher crate never decoded this tag (it was one of the
/// `gen_stub_tags!` stand-ins); this layout — slot, a 32-bit output bitfield,
/// and two 16-bit rumble magnitudes — follows the vendor's own outbound
/// joystick-output convention and is the shape `input::slots` expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoystickOutputs {
    pub slot: u8,
    pub outputs: u32,
    pub left_rumble: u16,
    pub right_rumble: u16,
}

impl JoystickOutputs {
    const WIRE_LEN: usize = 1 + 4 + 2 + 2;

    fn decode(buf: &[u8]) -> Result<JoystickOutputs, DecodeError> {
        if buf.len() < Self::WIRE_LEN {
            return Err(DecodeError::Truncated { expected: Self::WIRE_LEN, got: buf.len() });
        }
        Ok(JoystickOutputs {
            slot: buf[0],
            outputs: u32::from_be_bytes(buf[1..5].try_into().unwrap()),
            left_rumble: u16::from_be_bytes(buf[5..7].try_into().unwrap()),
            right_rumble: u16::from_be_bytes(buf[7..9].try_into().unwrap()),
        })
    }
}

/// A fully-decoded inbound telemetry datagram.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundDatagram {
    pub sequence: u16,
    pub status: StatusFlags,
    pub trace: u8,
    pub battery_voltage: f32,
    pub request_date: bool,
    pub telemetry: TelemetryData,
    pub joystick_outputs: Vec<JoystickOutputs>,
}

/// Minimum length of the fixed header before any tagged sections: sequence(2)
/// + comm version(1) + status(1) + trace(1) + voltage(2) + request-date(1).
const HEADER_LEN: usize = 2 + 1 + 1 + 1 + 2 + 1;

pub fn decode_inbound_datagram(buf: &[u8]) -> Result<InboundDatagram, DecodeError> {
    if buf.len() < HEADER_LEN {
        return Err(DecodeError::Truncated { expected: HEADER_LEN, got: buf.len() });
    }

    let sequence = u16::from_be_bytes([buf[0], buf[1]]);
    let comm_version = buf[2];
    if comm_version != COMM_VERSION {
        return Err(DecodeError::UnknownCommVersion(comm_version));
    }
    let status = StatusFlags::from_byte(buf[3]);
    let trace = buf[4];
    let battery_voltage = super::telemetry::BatteryVoltage::from_bytes(buf[5], buf[6]).0;
    let request_date = buf[7] != 0;

    let mut telemetry = TelemetryData::default();
    let mut joystick_outputs = Vec::new();

    let mut cursor = HEADER_LEN;
    while cursor < buf.len() {
        let length = *buf
            .get(cursor)
            .ok_or(DecodeError::Truncated { expected: cursor + 1, got: buf.len() })? as usize;
        if length == 0 {
            return Err(DecodeError::InvalidTagLength(0));
        }
        let section_end = cursor + 1 + length;
        let section = buf
            .get(cursor + 1..section_end)
            .ok_or(DecodeError::Truncated { expected: section_end, got: buf.len() })?;
        let tag = section[0];
        let payload = &section[1..];

        match tag {
            JOYSTICK_OUTPUTS_TAG => joystick_outputs.push(JoystickOutputs::decode(payload)?),
            DISK_FREE_TAG => {
                if payload.len() < 4 {
                    return Err(DecodeError::Truncated { expected: 4, got: payload.len() });
                }
                telemetry.disk_bytes_free = u32::from_be_bytes(payload[0..4].try_into().unwrap());
            }
            CPU_TAG => telemetry.cpu_utilization = CpuUtilization::decode(payload)?,
            RAM_TAG => {
                if payload.len() < 4 {
                    return Err(DecodeError::Truncated { expected: 4, got: payload.len() });
                }
                telemetry.ram_bytes_used = u32::from_be_bytes(payload[0..4].try_into().unwrap());
            }
            PDP_TAG => telemetry.pdp_currents = Some(PdpCurrents::decode(payload)?),
            CAN_METRICS_TAG => telemetry.can = CanMetrics::decode(payload)?,
            _ => {} // forward-compatible: ignore tags this version doesn't recognize
        }

        cursor = section_end;
    }

    Ok(InboundDatagram { sequence, status, trace, battery_voltage, request_date, telemetry, joystick_outputs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::control::Mode;

    fn section(tag: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![(1 + payload.len()) as u8, tag];
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn decodes_fixed_header_with_no_tags() {
        let mut buf = vec![0x00, 0x2A, COMM_VERSION, 0b0000_0110, 0x00, 12, 87, 0x00];
        buf.extend(Vec::<u8>::new());
        let decoded = decode_inbound_datagram(&buf).unwrap();
        assert_eq!(decoded.sequence, 0x2A);
        assert!(decoded.status.enabled);
        assert_eq!(decoded.status.mode, Mode::Autonomous);
        assert!((decoded.battery_voltage - (12.0 + 87.0 / 256.0)).abs() < 1e-6);
        assert!(!decoded.request_date);
        assert!(decoded.joystick_outputs.is_empty());
    }

    #[test]
    fn rejects_mismatched_comm_version() {
        let buf = [0x00, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            decode_inbound_datagram(&buf),
            Err(DecodeError::UnknownCommVersion(0x02))
        ));
    }

    #[test]
    fn request_date_flag_is_observed() {
        let buf = [0x00, 0x01, COMM_VERSION, 0x00, 0x00, 0x00, 0x00, 0x01];
        assert!(decode_inbound_datagram(&buf).unwrap().request_date);
    }

    #[test]
    fn decodes_disk_ram_and_can_tags_together() {
        let mut buf = vec![0x00, 0x01, COMM_VERSION, 0x00, 0x00, 0x00, 0x00, 0x00];
        buf.extend(section(DISK_FREE_TAG, &500_000u32.to_be_bytes()));
        buf.extend(section(RAM_TAG, &1_000_000u32.to_be_bytes()));
        let can = CanMetrics { utilization_pct: 5.0, bus_off_count: 1, tx_full_count: 2, rx_error_count: 0, tx_error_count: 0 };
        buf.extend(section(CAN_METRICS_TAG, &can.encode()));

        let decoded = decode_inbound_datagram(&buf).unwrap();
        assert_eq!(decoded.telemetry.disk_bytes_free, 500_000);
        assert_eq!(decoded.telemetry.ram_bytes_used, 1_000_000);
        assert_eq!(decoded.telemetry.can, can);
    }

    #[test]
    fn decodes_joystick_outputs_tag() {
        let mut buf = vec![0x00, 0x01, COMM_VERSION, 0x00, 0x00, 0x00, 0x00, 0x00];
        let mut payload = vec![0u8]; // slot 0
        payload.extend_from_slice(&0xFFu32.to_be_bytes());
        payload.extend_from_slice(&1000u16.to_be_bytes());
        payload.extend_from_slice(&2000u16.to_be_bytes());
        buf.extend(section(JOYSTICK_OUTPUTS_TAG, &payload));

        let decoded = decode_inbound_datagram(&buf).unwrap();
        assert_eq!(
            decoded.joystick_outputs,
            vec![JoystickOutputs { slot: 0, outputs: 0xFF, left_rumble: 1000, right_rumble: 2000 }]
        );
    }

    #[test]
    fn unknown_tag_is_skipped_without_error() {
        let mut buf = vec![0x00, 0x01, COMM_VERSION, 0x00, 0x00, 0x00, 0x00, 0x00];
        buf.extend(section(0x99, &[1, 2, 3]));
        buf.extend(section(RAM_TAG, &42u32.to_be_bytes()));
        let decoded = decode_inbound_datagram(&buf).unwrap();
        assert_eq!(decoded.telemetry.ram_bytes_used, 42);
    }
}
