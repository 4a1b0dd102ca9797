//! Inbound telemetry value types: battery voltage and the telemetry tag payloads.
//!
//! Grounded on `proto/udp/inbound/types.rs`'s `gen_stub_tags!` macro, which the
//! teacher crate uses to "chomp" (skip) these sections without decoding them.
//! This spec requires the decoded values to reach [`crate::coordinator::RobotState`],
//! so each stub becomes a real decoder instead.

use serde::Serialize;

use crate::error::DecodeError;

/// Battery voltage, transported as `(integer_part: u8, fractional_256ths: u8)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryVoltage(pub f32);

impl BatteryVoltage {
    pub fn to_bytes(self) -> [u8; 2] {
        let whole = self.0.trunc().clamp(0.0, 255.0) as u8;
        let frac = ((self.0.fract().max(0.0)) * 256.0).round().clamp(0.0, 255.0) as u8;
        [whole, frac]
    }

    pub fn from_bytes(whole: u8, frac: u8) -> BatteryVoltage {
        BatteryVoltage(whole as f32 + frac as f32 / 256.0)
    }
}

/// CAN bus utilization and error counters (inbound tag `0x0E`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CanMetrics {
    pub utilization_pct: f32,
    pub bus_off_count: u32,
    pub tx_full_count: u32,
    pub rx_error_count: u8,
    pub tx_error_count: u8,
}

impl CanMetrics {
    pub(crate) const WIRE_LEN: usize = 4 + 4 + 4 + 1 + 1;

    pub(crate) fn decode(buf: &[u8]) -> Result<CanMetrics, DecodeError> {
        if buf.len() < Self::WIRE_LEN {
            return Err(DecodeError::Truncated { expected: Self::WIRE_LEN, got: buf.len() });
        }
        Ok(CanMetrics {
            utilization_pct: f32::from_be_bytes(buf[0..4].try_into().unwrap()),
            bus_off_count: u32::from_be_bytes(buf[4..8].try_into().unwrap()),
            tx_full_count: u32::from_be_bytes(buf[8..12].try_into().unwrap()),
            rx_error_count: buf[12],
            tx_error_count: buf[13],
        })
    }

    pub(crate) fn encode(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::WIRE_LEN);
        out.extend_from_slice(&self.utilization_pct.to_be_bytes());
        out.extend_from_slice(&self.bus_off_count.to_be_bytes());
        out.extend_from_slice(&self.tx_full_count.to_be_bytes());
        out.push(self.rx_error_count);
        out.push(self.tx_error_count);
        out
    }
}

/// Power Distribution Panel per-channel current (16 channels, 10 bits each,
/// packed little-endian-bit-order into 21 bytes — the dominant vendor layout
/// for this tag per SPEC_FULL §10).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdpCurrents(pub [u16; 16]);

impl PdpCurrents {
    pub(crate) const WIRE_LEN: usize = 21;

    pub(crate) fn decode(buf: &[u8]) -> Result<PdpCurrents, DecodeError> {
        if buf.len() < Self::WIRE_LEN {
            return Err(DecodeError::Truncated { expected: Self::WIRE_LEN, got: buf.len() });
        }
        let mut bit_offset = 0usize;
        let mut channels = [0u16; 16];
        for slot in channels.iter_mut() {
            let byte_idx = bit_offset / 8;
            let bit_in_byte = bit_offset % 8;
            let lo = buf[byte_idx] as u16;
            let hi = *buf.get(byte_idx + 1).unwrap_or(&0) as u16;
            let combined = lo | (hi << 8);
            *slot = (combined >> bit_in_byte) & 0x3FF;
            bit_offset += 10;
        }
        Ok(PdpCurrents(channels))
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::WIRE_LEN];
        let mut bit_offset = 0usize;
        for &value in &self.0 {
            let value = value & 0x3FF;
            let byte_idx = bit_offset / 8;
            let bit_in_byte = bit_offset % 8;
            let shifted = (value as u32) << bit_in_byte;
            out[byte_idx] |= shifted as u8;
            if byte_idx + 1 < out.len() {
                out[byte_idx + 1] |= (shifted >> 8) as u8;
            }
            if byte_idx + 2 < out.len() {
                out[byte_idx + 2] |= (shifted >> 16) as u8;
            }
            bit_offset += 10;
        }
        out
    }
}

/// Per-core CPU utilization, `[count: u8][f32_be * count]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CpuUtilization(pub Vec<f32>);

impl CpuUtilization {
    pub(crate) fn decode(buf: &[u8]) -> Result<CpuUtilization, DecodeError> {
        let count = *buf.first().ok_or(DecodeError::Truncated { expected: 1, got: 0 })? as usize;
        let needed = 1 + count * 4;
        if buf.len() < needed {
            return Err(DecodeError::Truncated { expected: needed, got: buf.len() });
        }
        let cores = buf[1..needed]
            .chunks_exact(4)
            .map(|c| f32::from_be_bytes(c.try_into().unwrap()))
            .collect();
        Ok(CpuUtilization(cores))
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.0.len() * 4);
        out.push(self.0.len() as u8);
        for core in &self.0 {
            out.extend_from_slice(&core.to_be_bytes());
        }
        out
    }
}

/// Aggregate telemetry decoded from inbound tagged sections. Fields default to
/// the last-known value between updates (tags arrive independently and are
/// sparse across datagrams).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TelemetryData {
    pub can: CanMetrics,
    pub pdp_currents: Option<PdpCurrents>,
    pub cpu_utilization: CpuUtilization,
    pub ram_bytes_used: u32,
    pub disk_bytes_free: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voltage_round_trips_within_one_256th() {
        for milli in (0..16_000).step_by(37) {
            let v = milli as f32 / 1000.0;
            let [whole, frac] = BatteryVoltage(v).to_bytes();
            let decoded = BatteryVoltage::from_bytes(whole, frac).0;
            assert!((decoded - v).abs() < 1.0 / 256.0, "v={v} decoded={decoded}");
        }
    }

    #[test]
    fn can_metrics_round_trip() {
        let metrics = CanMetrics {
            utilization_pct: 12.5,
            bus_off_count: 3,
            tx_full_count: 7,
            rx_error_count: 1,
            tx_error_count: 2,
        };
        let encoded = metrics.encode();
        assert_eq!(CanMetrics::decode(&encoded).unwrap(), metrics);
    }

    #[test]
    fn pdp_currents_round_trip() {
        let mut values = [0u16; 16];
        for (i, v) in values.iter_mut().enumerate() {
            *v = (i as u16 * 61) & 0x3FF;
        }
        let currents = PdpCurrents(values);
        let encoded = currents.encode();
        assert_eq!(encoded.len(), PdpCurrents::WIRE_LEN);
        assert_eq!(PdpCurrents::decode(&encoded).unwrap(), currents);
    }

    #[test]
    fn cpu_utilization_round_trip() {
        let cpu = CpuUtilization(vec![0.1, 0.2, 0.95]);
        let encoded = cpu.encode();
        assert_eq!(CpuUtilization::decode(&encoded).unwrap(), cpu);
    }

    #[test]
    fn cpu_utilization_rejects_truncated() {
        assert!(CpuUtilization::decode(&[2, 0, 0]).is_err());
    }
}
