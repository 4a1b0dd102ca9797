//! `open-station`: a protocol and control engine for an FRC-style robot
//! driver station.
//!
//! This crate owns the wire protocol, connection lifecycle, joystick input,
//! practice-match sequencing, and hotkey dispatch for talking to a roboRIO-
//! style controller. It does not provide a UI: embedders construct a
//! [`coordinator::Coordinator`], drive it with [`coordinator::Coordinator::run`],
//! and subscribe to [`coordinator::RobotState`] snapshots via
//! [`coordinator::Coordinator::subscribe`].
//!
//! The crate never installs a `tracing` subscriber itself; embedders wire one
//! up the way any binary using this library would.

pub mod codec;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod hotkey;
pub mod input;
pub mod practice;
pub(crate) mod util;

pub use coordinator::{Coordinator, RobotState};
pub use error::{OpenStationError, Result};
