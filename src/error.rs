//! Crate-wide error taxonomy (see SPEC_FULL.md §10.1).

use thiserror::Error;

/// Errors produced while decoding a datagram, frame, or tagged section.
///
/// Decode errors are never fatal: callers log and drop the offending packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer too short: expected at least {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("unsupported comm version byte {0:#04x}")]
    UnknownCommVersion(u8),

    #[error("alliance byte {0} does not map to a station (valid range 0..=5)")]
    InvalidAlliance(u8),

    #[error("string payload is not valid UTF-8")]
    InvalidString,

    #[error("length-prefixed string exceeds the frame's remaining bytes")]
    StringTooLong,

    #[error("tag payload length {0} is invalid for this tag")]
    InvalidTagLength(usize),
}

/// The crate's public error type.
#[derive(Error, Debug)]
pub enum OpenStationError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("game data must be at most 3 bytes, got {0}")]
    InvalidGameData(usize),

    #[error("team number {0} is out of range (0..=9999)")]
    InvalidTeamNumber(u32),

    #[error("alliance station {0} is out of range (1..=3)")]
    InvalidAllianceStation(u8),

    #[error("joystick slot {0} is out of range (0..=5)")]
    InvalidSlot(usize),
}

pub type Result<T, E = OpenStationError> = std::result::Result<T, E>;
