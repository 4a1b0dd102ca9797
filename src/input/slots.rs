//! The six-slot joystick table with UUID-based locking (§3 `JoystickSlot`, §4.3).
//!
//! Generalized from `raje2v-DriveStation::gamepad/manager.rs`'s
//! `GamepadManager` slot bookkeeping (`first_available_slot`,
//! `find_locked_slot`, `move_to_slot`), which keys locks by device name; this
//! spec requires a stable UUID identity instead, so devices are identified by
//! a [`uuid::Uuid`] derived once per physical device rather than by name.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::codec::JoystickData;
use crate::error::OpenStationError;

pub const SLOT_COUNT: usize = 6;

/// One of the six ordered input-device positions (§3).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoystickSlot {
    pub slot: usize,
    pub uuid: Uuid,
    pub human_name: String,
    pub locked: bool,
    pub connected: bool,
    pub axis_count: u8,
    pub button_count: u8,
    pub hat_count: u8,
    pub data: JoystickData,
}

/// Owns the slot table. At most one slot per UUID; a locked UUID always
/// returns to its reserved slot, displacing whoever else currently holds it.
#[derive(Debug, Clone)]
pub struct SlotTable {
    slots: [Option<JoystickSlot>; SLOT_COUNT],
    locks: HashMap<Uuid, usize>,
}

impl SlotTable {
    pub fn new() -> SlotTable {
        SlotTable { slots: std::array::from_fn(|_| None), locks: HashMap::new() }
    }

    /// Seeds the lock table from persisted configuration (§6 `joystick_locks`).
    pub fn with_locks(locks: HashMap<Uuid, usize>) -> SlotTable {
        let mut table = SlotTable::new();
        table.locks = locks;
        table
    }

    fn find_by_uuid(&self, uuid: Uuid) -> Option<usize> {
        self.slots.iter().position(|s| s.as_ref().is_some_and(|s| s.uuid == uuid))
    }

    fn first_free_slot(&self) -> Option<usize> {
        (0..SLOT_COUNT).find(|&i| self.slots[i].is_none())
    }

    /// A device has appeared (or re-enumerated with the same UUID). Returns
    /// the slot it now occupies, or `None` if all six slots are full.
    pub fn device_connected(
        &mut self,
        uuid: Uuid,
        human_name: &str,
        axis_count: u8,
        button_count: u8,
        hat_count: u8,
    ) -> Option<usize> {
        if let Some(existing) = self.find_by_uuid(uuid) {
            let slot = self.slots[existing].as_mut().unwrap();
            slot.connected = true;
            slot.human_name = human_name.to_string();
            slot.axis_count = axis_count;
            slot.button_count = button_count;
            slot.hat_count = hat_count;
            return Some(existing);
        }

        let target = if let Some(&locked_slot) = self.locks.get(&uuid) {
            if let Some(occupant) = self.slots[locked_slot].take() {
                // Displace whoever held the locked slot to the next free one.
                if let Some(free) = self.first_free_slot() {
                    let mut occupant = occupant;
                    occupant.slot = free;
                    self.slots[free] = Some(occupant);
                }
                // If no free slot exists, the displaced device is dropped from
                // the table; it reappears once a slot frees up.
            }
            locked_slot
        } else {
            self.first_free_slot()?
        };

        self.slots[target] = Some(JoystickSlot {
            slot: target,
            uuid,
            human_name: human_name.to_string(),
            locked: self.locks.contains_key(&uuid),
            connected: true,
            axis_count,
            button_count,
            hat_count,
            data: JoystickData::default(),
        });
        Some(target)
    }

    /// A device has disappeared. Returns `true` if the disconnect should be
    /// treated as an operator-disable intent: the slot was supplying non-zero
    /// input and the robot is currently enabled (§4.3 disconnect safety).
    pub fn device_disconnected(&mut self, uuid: Uuid, enabled: bool) -> bool {
        let Some(idx) = self.find_by_uuid(uuid) else { return false };
        let had_nonzero_input = {
            let data = &self.slots[idx].as_ref().unwrap().data;
            data.axes.iter().any(|&a| a != 0) || data.buttons.iter().any(|&b| b) || data.hats.iter().any(|&h| h != -1)
        };

        if self.locks.contains_key(&uuid) {
            // Stays reserved: not-connected but still named.
            self.slots[idx].as_mut().unwrap().connected = false;
        } else {
            self.slots[idx] = None;
        }

        had_nonzero_input && enabled
    }

    pub fn update_data(&mut self, uuid: Uuid, data: JoystickData) {
        if let Some(idx) = self.find_by_uuid(uuid) {
            self.slots[idx].as_mut().unwrap().data = data;
        }
    }

    pub fn lock(&mut self, uuid: Uuid, slot: usize) -> crate::Result<()> {
        if slot >= SLOT_COUNT {
            return Err(OpenStationError::InvalidSlot(slot));
        }
        self.locks.insert(uuid, slot);
        if let Some(idx) = self.find_by_uuid(uuid) {
            self.slots[idx].as_mut().unwrap().locked = true;
        }
        Ok(())
    }

    pub fn unlock(&mut self, uuid: Uuid) {
        self.locks.remove(&uuid);
        if let Some(idx) = self.find_by_uuid(uuid) {
            let slot = self.slots[idx].as_mut().unwrap();
            slot.locked = false;
            if !slot.connected {
                self.slots[idx] = None;
            }
        }
    }

    /// Wholesale replacement of the slot table from a provided UUID ordering
    /// (§4.3 manual reorder). Devices not present in `order` are dropped from
    /// the table; their lock entries, if any, are untouched.
    pub fn reorder(&mut self, order: &[Uuid]) {
        let mut by_uuid: HashMap<Uuid, JoystickSlot> =
            self.slots.iter_mut().filter_map(|s| s.take()).map(|s| (s.uuid, s)).collect();

        let mut next = std::array::from_fn(|_| None);
        for (i, uuid) in order.iter().take(SLOT_COUNT).enumerate() {
            if let Some(mut slot) = by_uuid.remove(uuid) {
                slot.slot = i;
                next[i] = Some(slot);
            }
        }
        self.slots = next;
    }

    pub fn locked_slots(&self) -> HashMap<Uuid, usize> {
        self.locks.clone()
    }

    pub fn get(&self, slot: usize) -> Option<&JoystickSlot> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    /// Connected slots in slot order, for the outbound joystick tags (§4.1).
    pub fn connected_in_order(&self) -> impl Iterator<Item = &JoystickSlot> {
        self.slots.iter().filter_map(|s| s.as_ref()).filter(|s| s.connected)
    }

    pub fn snapshot(&self) -> Vec<JoystickSlot> {
        self.slots.iter().filter_map(|s| s.clone()).collect()
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        SlotTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(byte: u8) -> Uuid {
        Uuid::from_bytes([byte; 16])
    }

    #[test]
    fn first_appearance_takes_lowest_free_slot() {
        let mut table = SlotTable::new();
        assert_eq!(table.device_connected(uuid(1), "pad-a", 6, 10, 1), Some(0));
        assert_eq!(table.device_connected(uuid(2), "pad-b", 6, 10, 1), Some(1));
    }

    #[test]
    fn locked_device_reclaims_its_slot_and_displaces_occupant() {
        let mut locks = HashMap::new();
        locks.insert(uuid(0xAB), 3);
        let mut table = SlotTable::with_locks(locks);

        // xyz (unlocked) happens to occupy slot 3 first.
        table.device_connected(uuid(1), "xyz", 6, 10, 1);
        table.device_connected(uuid(2), "pad", 6, 10, 1);
        table.device_connected(uuid(3), "pad", 6, 10, 1);
        table.device_connected(uuid(4), "xyz-into-3", 6, 10, 1);
        assert_eq!(table.get(3).unwrap().uuid, uuid(4));

        // abc (locked to slot 3) appears: bumps the slot-3 occupant elsewhere.
        let slot = table.device_connected(uuid(0xAB), "abc", 6, 10, 1);
        assert_eq!(slot, Some(3));
        assert_eq!(table.get(3).unwrap().uuid, uuid(0xAB));
        assert!(table.get(3).unwrap().locked);

        let displaced = table.snapshot().into_iter().find(|s| s.uuid == uuid(4)).unwrap();
        assert_ne!(displaced.slot, 3);
    }

    #[test]
    fn locked_disconnected_slot_stays_reserved() {
        let mut table = SlotTable::new();
        table.device_connected(uuid(1), "abc", 6, 10, 1);
        table.lock(uuid(1), 0).unwrap();
        assert!(table.device_disconnected(uuid(1), false));

        let slot = table.get(0).unwrap();
        assert!(!slot.connected);
        assert!(slot.locked);
        assert_eq!(slot.human_name, "abc");

        // The reserved slot is unavailable to a new device.
        assert_eq!(table.device_connected(uuid(2), "other", 6, 10, 1), Some(1));
    }

    #[test]
    fn unlocked_disconnect_frees_the_slot_without_shifting_others() {
        let mut table = SlotTable::new();
        table.device_connected(uuid(1), "a", 6, 10, 1);
        table.device_connected(uuid(2), "b", 6, 10, 1);
        table.device_connected(uuid(3), "c", 6, 10, 1);

        table.device_disconnected(uuid(2), false);
        assert!(table.get(1).is_none());
        assert_eq!(table.get(2).unwrap().uuid, uuid(3));
    }

    #[test]
    fn disconnect_with_nonzero_input_while_enabled_signals_disable() {
        let mut table = SlotTable::new();
        table.device_connected(uuid(1), "a", 6, 10, 1);
        table.update_data(
            uuid(1),
            JoystickData { axes: vec![5], buttons: vec![], hats: vec![] },
        );
        assert!(table.device_disconnected(uuid(1), true));
    }

    #[test]
    fn disconnect_with_zero_input_does_not_signal_disable() {
        let mut table = SlotTable::new();
        table.device_connected(uuid(1), "a", 6, 10, 1);
        assert!(!table.device_disconnected(uuid(1), true));
    }

    #[test]
    fn reorder_replaces_the_table_wholesale() {
        let mut table = SlotTable::new();
        table.device_connected(uuid(1), "a", 6, 10, 1);
        table.device_connected(uuid(2), "b", 6, 10, 1);
        table.reorder(&[uuid(2), uuid(1)]);
        assert_eq!(table.get(0).unwrap().uuid, uuid(2));
        assert_eq!(table.get(1).unwrap().uuid, uuid(1));
    }
}
