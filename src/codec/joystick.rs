//! Joystick value model and its wire encoding (outbound tag `0x0C`).
//!
//! Grounded on `proto/udp/outbound/types/tags.rs`'s `Joysticks` tag, generalized
//! from a bare triple of vecs to a named [`JoystickData`] and corrected to match
//! the button-packing byte order proven by the teacher's own
//! `verify_joysticks_format` test (LSB-first, NOT byte-reversed — see
//! `crate::util::pack_bits`'s doc comment for why the older `to_u8_vec` helper
//! this was ported from packed in the wrong order).

use serde::Serialize;

use crate::error::DecodeError;
use crate::util::{pack_bits, unpack_bits};

pub const MAX_AXES: usize = 12;
pub const MAX_BUTTONS: usize = 32;
pub const MAX_HATS: usize = 2;

/// One joystick's worth of input data to send to the controller.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct JoystickData {
    /// Signed axis values, −128..127.
    pub axes: Vec<i8>,
    pub buttons: Vec<bool>,
    /// Degrees clockwise from north, or −1 if released.
    pub hats: Vec<i16>,
}

impl JoystickData {
    /// Saturating-casts a host float axis in `-1.0..=1.0` to the wire's `i8` range,
    /// with `-1.0` mapping to `-128` (§4.3).
    pub fn normalize_axis(value: f32) -> i8 {
        (value.clamp(-1.0, 1.0) * 128.0).clamp(-128.0, 127.0) as i8
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let axes: Vec<i8> = self.axes.iter().copied().take(MAX_AXES).collect();
        let buttons: Vec<bool> = self.buttons.iter().copied().take(MAX_BUTTONS).collect();
        let hats: Vec<i16> = self.hats.iter().copied().take(MAX_HATS).collect();

        let button_bytes = pack_bits(&buttons);
        let mut out = Vec::with_capacity(1 + axes.len() + 1 + button_bytes.len() + 1 + hats.len() * 2);

        out.push(axes.len() as u8);
        out.extend(axes.iter().map(|&a| a as u8));

        out.push(buttons.len() as u8);
        out.extend_from_slice(&button_bytes);

        out.push(hats.len() as u8);
        for hat in hats {
            out.extend_from_slice(&hat.to_be_bytes());
        }

        out
    }

    pub(crate) fn decode(buf: &[u8]) -> Result<JoystickData, DecodeError> {
        let mut cursor = 0usize;
        let axis_count = *read_u8(buf, &mut cursor)? as usize;
        let axes = read_slice(buf, &mut cursor, axis_count)?
            .iter()
            .map(|&b| b as i8)
            .collect();

        let button_count = *read_u8(buf, &mut cursor)? as usize;
        let button_bytes = button_count.div_ceil(8);
        let button_slice = read_slice(buf, &mut cursor, button_bytes)?;
        let buttons = unpack_bits(button_slice, button_count);

        let hat_count = *read_u8(buf, &mut cursor)? as usize;
        let mut hats = Vec::with_capacity(hat_count);
        for _ in 0..hat_count {
            let pair = read_slice(buf, &mut cursor, 2)?;
            hats.push(i16::from_be_bytes([pair[0], pair[1]]));
        }

        Ok(JoystickData { axes, buttons, hats })
    }
}

fn read_u8<'a>(buf: &'a [u8], cursor: &mut usize) -> Result<&'a u8, DecodeError> {
    let byte = buf
        .get(*cursor)
        .ok_or(DecodeError::Truncated { expected: *cursor + 1, got: buf.len() })?;
    *cursor += 1;
    Ok(byte)
}

fn read_slice<'a>(buf: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8], DecodeError> {
    let end = *cursor + len;
    let slice = buf
        .get(*cursor..end)
        .ok_or(DecodeError::Truncated { expected: end, got: buf.len() })?;
    *cursor = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joystick_round_trips() {
        let data = JoystickData {
            axes: vec![-128, 0, 127],
            buttons: vec![true, false, true, false, false, false, false, false, true],
            hats: vec![0, 315],
        };
        let encoded = data.encode();
        assert_eq!(JoystickData::decode(&encoded).unwrap(), data);
    }

    #[test]
    fn matches_teacher_fixture_byte_layout() {
        // Mirrors proto/udp/outbound/types/tags.rs::verify_joysticks_format, minus
        // the tag/length header (which lives in codec::outbound now).
        let data = JoystickData {
            axes: vec![-128, 0, 127],
            buttons: vec![true, false, true, false, false, false, false, false, true],
            hats: vec![0, 18000],
        };
        let encoded = data.encode();
        assert_eq!(
            encoded,
            vec![0x03, 0x80, 0x00, 0x7F, 0x09, 0x05, 0x01, 0x02, 0x00, 0x00, 0x46, 0x50]
        );
    }

    #[test]
    fn axis_normalization_saturates() {
        assert_eq!(JoystickData::normalize_axis(-1.0), -128);
        assert_eq!(JoystickData::normalize_axis(1.0), 127);
        assert_eq!(JoystickData::normalize_axis(0.0), 0);
    }

    #[test]
    fn decode_rejects_truncated_buffer() {
        assert!(JoystickData::decode(&[3, 1, 2]).is_err());
    }
}
