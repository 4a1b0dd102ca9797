//! Outbound control-side value types: [`Mode`], [`Alliance`], [`ControlFlags`], [`RequestFlags`].
//!
//! Grounded on `proto/udp/outbound/types.rs` in the teacher crate, generalized from a
//! single-byte-wrapper `Alliance` to a `(Color, Station)` pair per §3, and from bare
//! `Control`/`Request` bitflags to flags that also track the estop-latch invariant.

use bitflags::bitflags;
use serde::Serialize;

use crate::error::DecodeError;

/// Robot operating mode. Encodes to a 2-bit field (bits 0–1 of the control/status byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Mode {
    #[default]
    Teleop,
    Test,
    Autonomous,
}

impl Mode {
    #[inline]
    pub const fn bits(self) -> u8 {
        match self {
            Mode::Teleop => 0b00,
            Mode::Test => 0b01,
            Mode::Autonomous => 0b10,
        }
    }

    /// Decodes the low 2 bits of a control or status byte. `0b11` is reserved and
    /// decodes as `Teleop`, matching the roboRIO's own tolerant behavior.
    #[inline]
    pub const fn from_bits(byte: u8) -> Mode {
        match byte & 0b11 {
            0b10 => Mode::Autonomous,
            0b01 => Mode::Test,
            _ => Mode::Teleop,
        }
    }
}

/// Alliance color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AllianceColor {
    Red,
    Blue,
}

/// Alliance color and station number (1..=3), encoded to one byte per §3:
/// `(color == Blue ? 3 : 0) + (station - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Alliance {
    pub color: AllianceColor,
    pub station: u8,
}

impl Alliance {
    /// Creates a red-alliance `Alliance` for `station` (1..=3).
    ///
    /// # Panics
    /// Panics if `station` is not in `1..=3`. Use [`Alliance::new`] at a system
    /// boundary where the station comes from outside the process.
    pub const fn red(station: u8) -> Alliance {
        assert!(station >= 1 && station <= 3);
        Alliance { color: AllianceColor::Red, station }
    }

    /// Creates a blue-alliance `Alliance` for `station` (1..=3).
    ///
    /// # Panics
    /// Panics if `station` is not in `1..=3`.
    pub const fn blue(station: u8) -> Alliance {
        assert!(station >= 1 && station <= 3);
        Alliance { color: AllianceColor::Blue, station }
    }

    /// Fallible constructor for command-surface input (§6 `set_alliance`).
    pub fn new(color: AllianceColor, station: u8) -> crate::Result<Alliance> {
        if !(1..=3).contains(&station) {
            return Err(crate::error::OpenStationError::InvalidAllianceStation(station));
        }
        Ok(Alliance { color, station })
    }

    pub const fn to_byte(self) -> u8 {
        let base = match self.color {
            AllianceColor::Red => 0,
            AllianceColor::Blue => 3,
        };
        base + (self.station - 1)
    }

    pub const fn from_byte(byte: u8) -> Result<Alliance, DecodeError> {
        match byte {
            0..=2 => Ok(Alliance { color: AllianceColor::Red, station: byte + 1 }),
            3..=5 => Ok(Alliance { color: AllianceColor::Blue, station: byte - 3 + 1 }),
            other => Err(DecodeError::InvalidAlliance(other)),
        }
    }
}

impl Default for Alliance {
    fn default() -> Self {
        Alliance::red(1)
    }
}

bitflags! {
    /// Outbound control byte. Bit 7 estop, bit 3 fms, bit 2 enabled, bits 1–0 mode.
    ///
    /// The mode bits are carried separately as [`Mode`] rather than as bitflags
    /// constants, since a 2-bit field with three valid values is not well modeled
    /// by independent flag bits; [`ControlFlags::byte`] folds them in at encode time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlBits: u8 {
        const ESTOP         = 0b1000_0000;
        const FMS_CONNECTED = 0b0000_1000;
        const ENABLED       = 0b0000_0100;
    }
}

/// The full set of outbound control state: estop latch, FMS presence, enable, and mode.
///
/// Invariant (§3): once `estop` is set, [`ControlFlags::set_enabled`] and
/// [`ControlFlags::set_mode`] no longer have any effect on the encoded `enabled`
/// bit; only [`ControlFlags::reset_estop`] clears the latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ControlFlags {
    estop: bool,
    enabled: bool,
    mode: Mode,
    /// Always false: a real fleet-control integration is out of scope (SPEC_FULL §9 open question).
    fms_connected: bool,
}

impl ControlFlags {
    pub fn estop(&mut self) {
        self.estop = true;
        self.enabled = false;
    }

    /// Clears the estop latch. The only operation in the engine that may do so.
    pub fn reset_estop(&mut self) {
        self.estop = false;
    }

    pub fn estopped(&self) -> bool {
        self.estop
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if !self.estop {
            self.enabled = enabled;
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled && !self.estop
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn byte(&self) -> u8 {
        let mut bits = ControlBits::empty();
        if self.estop {
            bits |= ControlBits::ESTOP;
        }
        if self.fms_connected {
            bits |= ControlBits::FMS_CONNECTED;
        }
        if self.enabled() {
            bits |= ControlBits::ENABLED;
        }
        bits.bits() | self.mode.bits()
    }

    pub fn from_byte(byte: u8) -> ControlFlags {
        let bits = ControlBits::from_bits_truncate(byte);
        ControlFlags {
            estop: bits.contains(ControlBits::ESTOP),
            enabled: bits.contains(ControlBits::ENABLED),
            mode: Mode::from_bits(byte),
            fms_connected: bits.contains(ControlBits::FMS_CONNECTED),
        }
    }
}

bitflags! {
    /// One-shot outbound request bits (bit 3 reboot, bit 2 restart). Cleared by
    /// the send loop immediately after one emission (§4.2 step 4).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RequestFlags: u8 {
        const REBOOT_CONTROLLER = 0b0000_1000;
        const RESTART_USER_CODE = 0b0000_0100;
    }
}

impl RequestFlags {
    pub fn byte(self) -> u8 {
        self.bits()
    }
}

/// Received status byte. Bit 7 estop, bit 4 code-init, bit 3 brownout, bit 2
/// enabled, bits 1–0 mode.
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusBits: u8 {
        const ESTOP            = 0b1000_0000;
        const CODE_INITIALIZING = 0b0001_0000;
        const BROWNOUT          = 0b0000_1000;
        const ENABLED           = 0b0000_0100;
    }
}

/// Decoded inbound status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusFlags {
    pub estop: bool,
    pub code_initializing: bool,
    pub brownout: bool,
    pub enabled: bool,
    pub mode: Mode,
}

impl StatusFlags {
    pub fn from_byte(byte: u8) -> StatusFlags {
        let bits = StatusBits::from_bits_truncate(byte);
        StatusFlags {
            estop: bits.contains(StatusBits::ESTOP),
            code_initializing: bits.contains(StatusBits::CODE_INITIALIZING),
            brownout: bits.contains(StatusBits::BROWNOUT),
            enabled: bits.contains(StatusBits::ENABLED),
            mode: Mode::from_bits(byte),
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut bits = StatusBits::empty();
        if self.estop {
            bits |= StatusBits::ESTOP;
        }
        if self.code_initializing {
            bits |= StatusBits::CODE_INITIALIZING;
        }
        if self.brownout {
            bits |= StatusBits::BROWNOUT;
        }
        if self.enabled {
            bits |= StatusBits::ENABLED;
        }
        bits.bits() | self.mode.bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_bit_encoding() {
        assert_eq!(Mode::Teleop.bits(), 0b00);
        assert_eq!(Mode::Test.bits(), 0b01);
        assert_eq!(Mode::Autonomous.bits(), 0b10);
        assert_eq!(Mode::from_bits(0b00), Mode::Teleop);
        assert_eq!(Mode::from_bits(0b01), Mode::Test);
        assert_eq!(Mode::from_bits(0b10), Mode::Autonomous);
    }

    #[test]
    fn alliance_encoding_table() {
        assert_eq!(Alliance::red(1).to_byte(), 0);
        assert_eq!(Alliance::red(2).to_byte(), 1);
        assert_eq!(Alliance::red(3).to_byte(), 2);
        assert_eq!(Alliance::blue(1).to_byte(), 3);
        assert_eq!(Alliance::blue(2).to_byte(), 4);
        assert_eq!(Alliance::blue(3).to_byte(), 5);
    }

    #[test]
    fn alliance_decode_round_trips() {
        for byte in 0..=5u8 {
            let alliance = Alliance::from_byte(byte).unwrap();
            assert_eq!(alliance.to_byte(), byte);
        }
    }

    #[test]
    fn alliance_decode_rejects_out_of_range() {
        for byte in 6..=255u8 {
            assert!(Alliance::from_byte(byte).is_err());
        }
    }

    #[test]
    fn estop_latch_forces_enabled_false_and_survives_disable_calls() {
        let mut flags = ControlFlags::default();
        flags.set_enabled(true);
        assert!(flags.enabled());

        flags.estop();
        assert!(flags.estopped());
        assert!(!flags.enabled());

        // Nothing but an explicit reset clears the latch.
        flags.set_enabled(true);
        assert!(!flags.enabled());
        flags.set_mode(Mode::Autonomous);
        assert!(!flags.enabled());

        flags.reset_estop();
        flags.set_enabled(true);
        assert!(flags.enabled());
    }

    #[test]
    fn control_flags_byte_layout() {
        let mut flags = ControlFlags::default();
        flags.set_enabled(true);
        flags.set_mode(Mode::Autonomous);
        assert_eq!(flags.byte(), 0b0000_0110);

        flags.estop();
        assert_eq!(flags.byte(), 0b1000_0010);
    }

    #[test]
    fn status_flags_round_trip() {
        let status = StatusFlags {
            estop: true,
            code_initializing: false,
            brownout: true,
            enabled: false,
            mode: Mode::Test,
        };
        let decoded = StatusFlags::from_byte(status.to_byte());
        assert_eq!(decoded, status);
    }
}
