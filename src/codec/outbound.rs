//! The outbound control datagram (§4.1): station → controller, 50 Hz.
//!
//! Layout: `[sequence: u16 BE][comm version: u8][control: u8][request: u8]
//! [alliance: u8][tagged sections...]`. Grounded on the teacher's
//! `ds/conn.rs::udp_conn` send path, which assembles the same fixed header
//! before appending its `Tag` implementors.

use bytes::{BufMut, Bytes, BytesMut};

use super::control::{Alliance, ControlFlags, RequestFlags};
use super::tags::OutboundTag;
use super::COMM_VERSION;

/// One fully-assembled outbound control datagram.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundDatagram {
    pub sequence: u16,
    pub control: ControlFlags,
    pub request: RequestFlags,
    pub alliance: Alliance,
    pub tags: Vec<OutboundTag>,
}

impl OutboundDatagram {
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(6 + self.tags.iter().map(|t| t.construct().len()).sum::<usize>());
        out.put_u16(self.sequence);
        out.put_u8(COMM_VERSION);
        out.put_u8(self.control.byte());
        out.put_u8(self.request.byte());
        out.put_u8(self.alliance.to_byte());
        for tag in &self.tags {
            out.extend_from_slice(&tag.construct());
        }
        out.freeze()
    }
}

/// Convenience wrapper for callers that don't need [`OutboundDatagram`]'s `Clone`/`PartialEq`.
pub fn encode_outbound_datagram(
    sequence: u16,
    control: ControlFlags,
    request: RequestFlags,
    alliance: Alliance,
    tags: &[OutboundTag],
) -> Bytes {
    OutboundDatagram { sequence, control, request, alliance, tags: tags.to_vec() }.encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::control::Mode;

    #[test]
    fn header_layout_matches_spec_field_order() {
        let mut control = ControlFlags::default();
        control.set_enabled(true);
        control.set_mode(Mode::Teleop);

        let datagram = OutboundDatagram {
            sequence: 0x0102,
            control,
            request: RequestFlags::empty(),
            alliance: Alliance::red(1),
            tags: vec![],
        };

        let bytes = datagram.encode();
        assert_eq!(
            &bytes[..],
            &[0x01, 0x02, COMM_VERSION, control.byte(), 0x00, Alliance::red(1).to_byte()]
        );
    }

    #[test]
    fn tagged_sections_are_appended_in_order() {
        let datagram = OutboundDatagram {
            sequence: 1,
            control: ControlFlags::default(),
            request: RequestFlags::empty(),
            alliance: Alliance::blue(2),
            tags: vec![OutboundTag::Countdown(1.0), OutboundTag::Timezone("UTC".into())],
        };
        let bytes = datagram.encode();
        let header_len = 6;
        let countdown_section = OutboundTag::Countdown(1.0).construct();
        let timezone_section = OutboundTag::Timezone("UTC".into()).construct();
        assert_eq!(&bytes[header_len..header_len + countdown_section.len()], &countdown_section[..]);
        assert_eq!(
            &bytes[header_len + countdown_section.len()..],
            &timezone_section[..]
        );
    }

    #[test]
    fn request_flags_are_one_shot_at_the_caller_level() {
        // The codec just encodes whatever it's handed; clearing after one send
        // is the connection task's responsibility (see connection::datagram).
        let datagram = OutboundDatagram {
            sequence: 1,
            control: ControlFlags::default(),
            request: RequestFlags::RESTART_USER_CODE,
            alliance: Alliance::red(1),
            tags: vec![],
        };
        assert_eq!(datagram.encode()[4], RequestFlags::RESTART_USER_CODE.bits());
    }
}
