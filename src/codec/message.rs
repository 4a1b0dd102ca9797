//! Stream-channel (TCP) framing: `[size: u16 BE][tag: u8][payload: size-1 bytes]`.
//!
//! The teacher crate's `proto/tcp/outbound.rs` establishes the
//! length-prefix-plus-tag framing and the `OutgoingTcpTag` trait this module
//! generalizes; decoding the *inbound* direction (stdout, version, error
//! reports) is new, grounded on `raje2v-DriveStation::logging.rs`'s byte-level
//! parse of the same channel (there read ad hoc per-connection; here as a
//! reusable `tokio_util::codec::Decoder`).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{DecodeError, OpenStationError};

/// A decoded frame from the controller's stream channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TcpMessage {
    Stdout(String),
    Message(String),
    Error(ErrorReport),
    VersionInfo(VersionInfo),
}

/// Inbound tag `0x0B`: a structured error or warning report.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    pub timestamp: f64,
    pub sequence: u16,
    pub code: i32,
    pub is_error: bool,
    pub details: String,
    pub location: String,
    pub call_stack: String,
}

/// Inbound tag `0x0A`: controller identity and firmware version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionInfo {
    pub device_type: u8,
    pub device_id: String,
    pub name: String,
    pub version: String,
}

/// Outbound stream messages the engine may send to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundStreamMessage {
    /// The ≤3-byte game-specific message used during autonomous.
    GameData(String),
    MatchInfo(MatchInfo),
    JoystickDescriptor(JoystickDescriptor),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    None = 0,
    Practice = 1,
    Qualifications = 2,
    Eliminations = 3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchInfo {
    pub competition: String,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoystickDescriptor {
    pub slot: u8,
    pub name: String,
    pub axis_count: u8,
    pub button_count: u8,
    pub hat_count: u8,
}

fn read_prefixed_string(buf: &[u8]) -> Result<(String, &[u8]), DecodeError> {
    if buf.len() < 2 {
        return Err(DecodeError::Truncated { expected: 2, got: buf.len() });
    }
    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    let rest = &buf[2..];
    if rest.len() < len {
        return Err(DecodeError::StringTooLong);
    }
    let s = String::from_utf8(rest[..len].to_vec()).map_err(|_| DecodeError::InvalidString)?;
    Ok((s, &rest[len..]))
}

fn put_prefixed_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// A length-delimited, tag-dispatched codec for the stream channel.
///
/// `Decoder::decode` only consumes a frame once the whole `[size][tag][payload]`
/// sequence is buffered, so partial reads (one byte at a time, one TCP segment
/// at a time, ...) never leak a partial frame or misparse a following one.
#[derive(Debug, Default, Clone, Copy)]
pub struct DsStreamCodec;

const MESSAGE_TAG: u8 = 0x00;
const VERSION_TAG: u8 = 0x0A;
const ERROR_TAG: u8 = 0x0B;
const STDOUT_TAG: u8 = 0x0C;

const MATCH_INFO_TAG: u8 = 0x07;
const GAME_DATA_TAG: u8 = 0x0E;
const JOYSTICK_DESCRIPTOR_TAG: u8 = 0x02;

impl Decoder for DsStreamCodec {
    type Item = TcpMessage;
    type Error = OpenStationError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 2 {
            return Ok(None);
        }
        let size = u16::from_be_bytes([src[0], src[1]]) as usize;
        let total = 2 + size;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        frame.advance(2); // size field
        let tag = frame.get_u8();
        let payload = &frame[..];

        let message = match tag {
            STDOUT_TAG => TcpMessage::Stdout(decode_utf8(payload)?),
            MESSAGE_TAG => TcpMessage::Message(decode_utf8(payload)?),
            ERROR_TAG => TcpMessage::Error(decode_error_report(payload)?),
            VERSION_TAG => TcpMessage::VersionInfo(decode_version_info(payload)?),
            _ => return self.decode(src), // unknown tag: already consumed, try the next frame
        };
        Ok(Some(message))
    }
}

fn decode_utf8(buf: &[u8]) -> Result<String, DecodeError> {
    String::from_utf8(buf.to_vec()).map_err(|_| DecodeError::InvalidString)
}

fn decode_error_report(buf: &[u8]) -> Result<ErrorReport, DecodeError> {
    const HEAD: usize = 8 + 2 + 4 + 2;
    if buf.len() < HEAD {
        return Err(DecodeError::Truncated { expected: HEAD, got: buf.len() });
    }
    let timestamp = f64::from_be_bytes(buf[0..8].try_into().unwrap());
    let sequence = u16::from_be_bytes(buf[8..10].try_into().unwrap());
    let code = i32::from_be_bytes(buf[10..14].try_into().unwrap());
    let flags = u16::from_be_bytes(buf[14..16].try_into().unwrap());
    let is_error = flags & 0x1 != 0;

    let rest = &buf[16..];
    let (details, rest) = read_prefixed_string(rest)?;
    let (location, rest) = read_prefixed_string(rest)?;
    let (call_stack, _rest) = read_prefixed_string(rest)?;

    Ok(ErrorReport { timestamp, sequence, code, is_error, details, location, call_stack })
}

fn decode_version_info(buf: &[u8]) -> Result<VersionInfo, DecodeError> {
    let device_type = *buf.first().ok_or(DecodeError::Truncated { expected: 1, got: 0 })?;
    let rest = &buf[1..];
    let (device_id, rest) = read_prefixed_string(rest)?;
    let (name, rest) = read_prefixed_string(rest)?;
    let (version, _rest) = read_prefixed_string(rest)?;
    Ok(VersionInfo { device_type, device_id, name, version })
}

impl Encoder<OutboundStreamMessage> for DsStreamCodec {
    type Error = OpenStationError;

    fn encode(&mut self, item: OutboundStreamMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (tag, payload) = match item {
            OutboundStreamMessage::GameData(gsm) => (GAME_DATA_TAG, gsm.into_bytes()),
            OutboundStreamMessage::MatchInfo(info) => {
                let mut payload = Vec::with_capacity(2 + info.competition.len());
                payload.push(info.competition.len() as u8);
                payload.extend_from_slice(info.competition.as_bytes());
                payload.push(info.match_type as u8);
                (MATCH_INFO_TAG, payload)
            }
            OutboundStreamMessage::JoystickDescriptor(desc) => {
                let mut payload = Vec::new();
                payload.push(desc.slot);
                put_prefixed_string(&mut payload, &desc.name);
                payload.push(desc.axis_count);
                payload.push(desc.button_count);
                payload.push(desc.hat_count);
                (JOYSTICK_DESCRIPTOR_TAG, payload)
            }
        };

        let frame_len = 1 + payload.len();
        assert!(frame_len <= u16::MAX as usize, "stream frame payload too large");
        dst.reserve(2 + frame_len);
        dst.put_u16(frame_len as u16);
        dst.put_u8(tag);
        dst.put_slice(&payload);
        Ok(())
    }
}

/// Convenience: encode a single [`OutboundStreamMessage`] without a `Framed` wrapper.
pub fn encode_stream_message(message: OutboundStreamMessage) -> Bytes {
    let mut buf = BytesMut::new();
    // `DsStreamCodec::encode` cannot fail outside the assert above.
    DsStreamCodec.encode(message, &mut buf).expect("encode is infallible for well-formed input");
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_one_byte_at_a_time(bytes: &[u8]) -> Vec<TcpMessage> {
        let mut codec = DsStreamCodec;
        let mut buf = BytesMut::new();
        let mut out = Vec::new();
        for &byte in bytes {
            buf.put_u8(byte);
            while let Some(msg) = codec.decode(&mut buf).unwrap() {
                out.push(msg);
            }
        }
        out
    }

    #[test]
    fn stdout_frame_with_partial_reads_does_not_leak_trailing_byte() {
        let frame = [0x00, 0x06, STDOUT_TAG, b'h', b'i', b'!', b'\n'];
        let mut bytes = frame.to_vec();
        bytes.push(b'x'); // trailing byte belonging to the next, incomplete frame
        let messages = feed_one_byte_at_a_time(&bytes);
        assert_eq!(messages, vec![TcpMessage::Stdout("hi!\n".to_string())]);
    }

    #[test]
    fn error_report_round_trips_through_hand_built_frame() {
        let report = ErrorReport {
            timestamp: 12345.678,
            sequence: 42,
            code: -1,
            is_error: true,
            details: "NullPointerException".to_string(),
            location: "Robot.java:55".to_string(),
            call_stack: "at Robot.teleopPeriodic".to_string(),
        };

        let mut payload = Vec::new();
        payload.extend_from_slice(&report.timestamp.to_be_bytes());
        payload.extend_from_slice(&report.sequence.to_be_bytes());
        payload.extend_from_slice(&report.code.to_be_bytes());
        payload.extend_from_slice(&1u16.to_be_bytes());
        put_prefixed_string(&mut payload, &report.details);
        put_prefixed_string(&mut payload, &report.location);
        put_prefixed_string(&mut payload, &report.call_stack);

        let mut frame = Vec::new();
        frame.extend_from_slice(&((1 + payload.len()) as u16).to_be_bytes());
        frame.push(ERROR_TAG);
        frame.extend_from_slice(&payload);

        let mut buf = BytesMut::from(&frame[..]);
        let decoded = DsStreamCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, TcpMessage::Error(report));
    }

    #[test]
    fn unknown_tag_is_skipped_not_fatal() {
        let mut buf = BytesMut::new();
        // An unrecognized tag (0xFF) followed by a valid stdout frame.
        buf.put_u16(2);
        buf.put_u8(0xFF);
        buf.put_u8(0x00);
        buf.put_u16(1 + 2);
        buf.put_u8(STDOUT_TAG);
        buf.put_slice(b"ok");

        let message = DsStreamCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(message, TcpMessage::Stdout("ok".to_string()));
    }

    #[test]
    fn game_data_encodes_with_expected_tag() {
        let bytes = encode_stream_message(OutboundStreamMessage::GameData("RBL".to_string()));
        assert_eq!(&bytes[..], &[0x00, 0x04, GAME_DATA_TAG, b'R', b'B', b'L']);
    }
}
