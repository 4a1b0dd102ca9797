//! Outbound tagged sections for the control datagram: `[length: u8][tag: u8][payload]`.
//!
//! Grounded on `proto/udp/outbound/types/tags.rs`'s `Tag` trait and its four
//! implementors, carried over with the same tag IDs and payload layouts.

use chrono::{DateTime as ChronoDateTime, Datelike, Timelike, Utc};

use super::joystick::JoystickData;

/// A tagged section appended to the outbound control datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundTag {
    /// `0x0C`, emitted once per connected joystick slot, in slot order.
    Joystick(JoystickData),
    /// `0x0F`, emitted once after the first successful round-trip, or whenever
    /// the robot has asked for the date via the inbound request-date flag.
    DateTime(DateStamp),
    /// `0x10`, emitted alongside `DateTime`.
    Timezone(String),
    /// `0x07`, the remaining seconds in the current practice phase.
    Countdown(f32),
}

impl OutboundTag {
    fn id(&self) -> u8 {
        match self {
            OutboundTag::Joystick(_) => 0x0C,
            OutboundTag::DateTime(_) => 0x0F,
            OutboundTag::Timezone(_) => 0x10,
            OutboundTag::Countdown(_) => 0x07,
        }
    }

    fn payload(&self) -> Vec<u8> {
        match self {
            OutboundTag::Joystick(data) => data.encode(),
            OutboundTag::DateTime(stamp) => stamp.encode(),
            OutboundTag::Timezone(tz) => tz.as_bytes().to_vec(),
            OutboundTag::Countdown(seconds) => seconds.to_be_bytes().to_vec(),
        }
    }

    /// Builds the full `[length][tag][payload]` section. `length` covers the
    /// tag byte and the payload, not itself.
    pub(crate) fn construct(&self) -> Vec<u8> {
        let payload = self.payload();
        let length = 1 + payload.len();
        assert!(length <= u8::MAX as usize, "tag payload too large for a u8 length field");

        let mut out = Vec::with_capacity(1 + length);
        out.push(length as u8);
        out.push(self.id());
        out.extend(payload);
        out
    }
}

/// The date/time fields of the `0x0F` tag: microseconds, second, minute, hour,
/// day, month, two-digit year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateStamp {
    pub micros: u32,
    pub second: u8,
    pub minute: u8,
    pub hour: u8,
    pub day: u8,
    pub month: u8,
    pub year: u8,
}

impl DateStamp {
    /// Captures the current UTC instant in the tag's wire layout.
    pub fn now() -> DateStamp {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(dt: ChronoDateTime<Utc>) -> DateStamp {
        DateStamp {
            micros: dt.timestamp_subsec_micros(),
            second: dt.second() as u8,
            minute: dt.minute() as u8,
            hour: dt.hour() as u8,
            day: dt.day() as u8,
            month: dt.month0() as u8,
            year: (dt.year() - 1900) as u8,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(9);
        out.extend_from_slice(&self.micros.to_be_bytes());
        out.push(self.second);
        out.push(self.minute);
        out.push(self.hour);
        out.push(self.day);
        out.push(self.month);
        out.push(self.year);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_tag_layout() {
        let tag = OutboundTag::Countdown(2.0);
        assert_eq!(tag.construct(), vec![0x05, 0x07, 0x40, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn timezone_tag_layout() {
        let tag = OutboundTag::Timezone("UTC".to_string());
        assert_eq!(tag.construct(), vec![0x04, 0x10, 0x55, 0x54, 0x43]);
    }

    #[test]
    fn datetime_tag_layout() {
        let stamp = DateStamp {
            micros: 123_456,
            second: 30,
            minute: 55,
            hour: 17,
            day: 23,
            month: 4,
            year: 124,
        };
        let tag = OutboundTag::DateTime(stamp);
        assert_eq!(
            tag.construct(),
            vec![0x0B, 0x0F, 0x00, 0x01, 0xE2, 0x40, 0x1E, 0x37, 0x11, 0x17, 0x04, 0x7C]
        );
    }

    #[test]
    fn joystick_tag_wraps_codec_with_header() {
        let data = JoystickData { axes: vec![-1], buttons: vec![], hats: vec![] };
        let tag = OutboundTag::Joystick(data.clone());
        let constructed = tag.construct();
        assert_eq!(constructed[0] as usize, constructed.len() - 1);
        assert_eq!(constructed[1], 0x0C);
        assert_eq!(&constructed[2..], &data.encode()[..]);
    }
}
