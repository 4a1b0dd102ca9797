//! Gamepad enumeration and polling (§4.3).
//!
//! Grounded on `raje2v-DriveStation::gamepad/manager.rs`'s `GamepadManager`:
//! same `gilrs` polling loop and axis/button/dpad mapping tables, generalized
//! from a name-keyed lock table to the UUID-keyed [`slots::SlotTable`] and
//! moved off a `parking_lot::RwLock<Vec<JoystickState>>` onto the
//! [`JoystickSink`] seam so this module doesn't need to know how the
//! coordinator stores its state.

pub mod slots;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gilrs::{Axis, Button, EventType, Gilrs};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::codec::JoystickData;

const POLL_PERIOD: Duration = Duration::from_millis(5);

/// Where polled joystick events are delivered. Implemented by the coordinator;
/// kept as a trait so this module can be tested without one.
pub trait JoystickSink: Send + Sync {
    fn device_connected(&self, uuid: Uuid, name: &str, axis_count: u8, button_count: u8, hat_count: u8);
    fn device_disconnected(&self, uuid: Uuid);
    fn update_data(&self, uuid: Uuid, data: JoystickData);
}

/// Maps a `gilrs` axis to the wire position (left-X=0 … right-Y=5, §4.3).
pub fn axis_index(axis: Axis) -> Option<usize> {
    match axis {
        Axis::LeftStickX => Some(0),
        Axis::LeftStickY => Some(1),
        Axis::LeftZ => Some(2),
        Axis::RightZ => Some(3),
        Axis::RightStickX => Some(4),
        Axis::RightStickY => Some(5),
        _ => None,
    }
}

/// Maps a `gilrs` button to the wire position (south=0 … right-stick=9, §4.3).
pub fn button_index(button: Button) -> Option<usize> {
    match button {
        Button::South => Some(0),
        Button::East => Some(1),
        Button::West => Some(2),
        Button::North => Some(3),
        Button::LeftTrigger => Some(4),
        Button::RightTrigger => Some(5),
        Button::Select => Some(6),
        Button::Start => Some(7),
        Button::LeftThumb => Some(8),
        Button::RightThumb => Some(9),
        _ => None,
    }
}

/// Derives a single hat value from the four D-pad directions (§4.3).
pub fn dpad_to_hat(up: bool, right: bool, down: bool, left: bool) -> i16 {
    match (up, right, down, left) {
        (true, false, false, false) => 0,
        (true, true, false, false) => 45,
        (false, true, false, false) => 90,
        (false, true, true, false) => 135,
        (false, false, true, false) => 180,
        (false, false, true, true) => 225,
        (false, false, false, true) => 270,
        (true, false, false, true) => 315,
        _ => -1,
    }
}

struct TrackedDevice {
    uuid: Uuid,
    axes: Vec<i8>,
    buttons: Vec<bool>,
    dpad: (bool, bool, bool, bool),
}

/// Derives a stable identity for a physical device from its reported name.
///
/// `gilrs` does not expose a persistent hardware identifier across
/// reconnects, so identity is derived deterministically from the name via
/// UUIDv5 — two distinct controllers sharing an identical vendor name will
/// collide, a known limitation recorded in the grounding ledger.
fn device_uuid(name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Owns the `gilrs` context and per-device tracking state. Polling is
/// synchronous (`gilrs` has no async API), so [`run`] drives it from a
/// dedicated OS thread rather than a tokio task, mirroring how the teacher's
/// equivalent gamepad manager is driven from `lib.rs`.
pub struct Poller {
    gilrs: Gilrs,
    devices: HashMap<gilrs::GamepadId, TrackedDevice>,
}

impl Poller {
    pub fn new() -> Result<Poller, gilrs::Error> {
        Ok(Poller { gilrs: Gilrs::new()?, devices: HashMap::new() })
    }

    /// Drains pending `gilrs` events and pushes updates into `sink`. Returns
    /// the number of devices whose axis/button/hat state changed.
    pub fn poll_once(&mut self, sink: &dyn JoystickSink) -> usize {
        let mut changed = 0usize;
        while let Some(event) = self.gilrs.next_event() {
            let gilrs::Event { id, event, .. } = event;
            match event {
                EventType::Connected => {
                    let gamepad = self.gilrs.gamepad(id);
                    let name = gamepad.name().to_string();
                    let uuid = device_uuid(&name);
                    self.devices.insert(
                        id,
                        TrackedDevice { uuid, axes: vec![0; 6], buttons: vec![false; 10], dpad: (false, false, false, false) },
                    );
                    sink.device_connected(uuid, &name, 6, 10, 1);
                    changed += 1;
                }
                EventType::Disconnected => {
                    if let Some(device) = self.devices.remove(&id) {
                        sink.device_disconnected(device.uuid);
                        changed += 1;
                    }
                }
                EventType::AxisChanged(axis, value, _) => {
                    if let (Some(idx), Some(device)) = (axis_index(axis), self.devices.get_mut(&id)) {
                        if idx < device.axes.len() {
                            device.axes[idx] = JoystickData::normalize_axis(value);
                            push_data(device, sink);
                            changed += 1;
                        }
                    }
                }
                EventType::ButtonChanged(button, value, _) => {
                    if let Some(device) = self.devices.get_mut(&id) {
                        let pressed = value > 0.5;
                        match button {
                            Button::DPadUp => device.dpad.0 = pressed,
                            Button::DPadRight => device.dpad.1 = pressed,
                            Button::DPadDown => device.dpad.2 = pressed,
                            Button::DPadLeft => device.dpad.3 = pressed,
                            other => {
                                if let Some(idx) = button_index(other) {
                                    if idx < device.buttons.len() {
                                        device.buttons[idx] = pressed;
                                    }
                                }
                            }
                        }
                        push_data(device, sink);
                        changed += 1;
                    }
                }
                _ => {}
            }
        }
        changed
    }

    /// Re-enumerates already-connected devices at startup (`gilrs::Gilrs::new`
    /// does not emit synthetic `Connected` events for devices plugged in
    /// before the process started).
    pub fn enumerate(&mut self, sink: &dyn JoystickSink) {
        let existing: Vec<(gilrs::GamepadId, String)> = self
            .gilrs
            .gamepads()
            .filter(|(_, g)| g.is_connected())
            .map(|(id, g)| (id, g.name().to_string()))
            .collect();
        for (id, name) in existing {
            let uuid = device_uuid(&name);
            self.devices.insert(
                id,
                TrackedDevice { uuid, axes: vec![0; 6], buttons: vec![false; 10], dpad: (false, false, false, false) },
            );
            sink.device_connected(uuid, &name, 6, 10, 1);
        }
    }
}

fn push_data(device: &TrackedDevice, sink: &dyn JoystickSink) {
    let hat = dpad_to_hat(device.dpad.0, device.dpad.1, device.dpad.2, device.dpad.3);
    sink.update_data(
        device.uuid,
        JoystickData { axes: device.axes.clone(), buttons: device.buttons.clone(), hats: vec![hat] },
    );
}

/// Shared flag through which `rescan_joysticks()` asks the poller thread to
/// re-enumerate already-connected devices (gilrs's own event stream only
/// reports edge transitions, so a forced re-announce needs a side channel).
pub type RescanFlag = Arc<AtomicBool>;

pub fn rescan_flag() -> RescanFlag {
    Arc::new(AtomicBool::new(false))
}

/// Runs the 5 ms polling loop on the calling (dedicated) thread until
/// `shutdown` is cancelled. Intended to be spawned via
/// [`std::thread::spawn`], matching the teacher's treatment of `gilrs` as a
/// blocking, thread-owned resource.
pub fn run(mut poller: Poller, sink: Arc<dyn JoystickSink>, rescan: RescanFlag, shutdown: CancellationToken) {
    poller.enumerate(sink.as_ref());
    while !shutdown.is_cancelled() {
        poller.poll_once(sink.as_ref());
        if rescan.swap(false, Ordering::Relaxed) {
            poller.enumerate(sink.as_ref());
        }
        std::thread::sleep(POLL_PERIOD);
    }
}
