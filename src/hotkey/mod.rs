//! Process-global hotkey dispatch (§4.5): debouncing and chord detection are
//! pure and tested here; the platform-specific OS hook lives in
//! [`backend`].
//!
//! No teacher precedent (`drakeerv-ds-rs` has no hotkey layer); grounded on
//! this spec's own §9 design note ("platform hotkey backends... each pushes
//! into the same action channel") and, for the debounce/priority-channel
//! shape, on this codebase's `connection` module's own use of a dedicated
//! tokio `mpsc` per concern.

pub mod backend;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

const DEBOUNCE: Duration = Duration::from_millis(50);

/// A platform-independent key identity. [`backend`] maps the OS hook's key
/// type onto this enum; everything else here never sees a platform type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Space,
    Enter,
    Backspace,
    F1,
    LeftBracket,
    RightBracket,
    Backslash,
    Other,
}

/// A recognized hotkey action (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    EStop,
    Disable,
    /// Rejected downstream by the coordinator if not connected, no code
    /// running, or already estopped (§4.5).
    Enable,
    AStop,
    RescanJoysticks,
}

const CHORD: [Key; 3] = [Key::LeftBracket, Key::RightBracket, Key::Backslash];

/// Pure debounce + chord-detection state machine. One `key_down`/`key_up`
/// call per OS key event; [`Dispatcher::key_down`] returns the action to
/// dispatch, if any.
#[derive(Debug, Default)]
pub struct Dispatcher {
    held: HashSet<Key>,
    last_fired: Option<(Key, Instant)>,
}

impl Dispatcher {
    pub fn new() -> Dispatcher {
        Dispatcher { held: HashSet::new(), last_fired: None }
    }

    pub fn key_up(&mut self, key: Key) {
        self.held.remove(&key);
    }

    /// Processes a key-down event at `now`, returning the action it triggers,
    /// if it isn't suppressed by the 50ms debounce window.
    pub fn key_down(&mut self, key: Key, now: Instant) -> Option<Action> {
        self.held.insert(key);

        if CHORD.iter().all(|k| self.held.contains(k)) {
            return self.fire(Key::Other, now, Action::Enable); // chord fires as its own debounce bucket
        }

        let action = match key {
            Key::Space => Action::EStop,
            Key::Enter => Action::Disable,
            Key::Backspace => Action::AStop,
            Key::F1 => Action::RescanJoysticks,
            _ => return None,
        };
        self.fire(key, now, action)
    }

    fn fire(&mut self, bucket: Key, now: Instant, action: Action) -> Option<Action> {
        if let Some((last_key, last_time)) = self.last_fired {
            if last_key == bucket && now.duration_since(last_time) < DEBOUNCE {
                return None;
            }
        }
        self.last_fired = Some((bucket, now));
        Some(action)
    }
}

/// Sending half of the action channel. EStop is pushed onto a dedicated
/// unbounded channel so it can never be starved behind queued non-EStop
/// actions (§4.5: "EStop is delivered ahead of any other queued action").
#[derive(Clone)]
pub struct ActionSender {
    estop: mpsc::UnboundedSender<()>,
    actions: mpsc::UnboundedSender<Action>,
}

impl ActionSender {
    pub fn send(&self, action: Action) {
        match action {
            Action::EStop => {
                let _ = self.estop.send(());
            }
            other => {
                let _ = self.actions.send(other);
            }
        }
    }
}

/// Receiving half, consumed by the coordinator.
pub struct ActionReceiver {
    estop: mpsc::UnboundedReceiver<()>,
    actions: mpsc::UnboundedReceiver<Action>,
}

impl ActionReceiver {
    /// Waits for the next action, always preferring a pending EStop over any
    /// other queued action.
    pub async fn recv(&mut self) -> Option<Action> {
        tokio::select! {
            biased;
            estop = self.estop.recv() => estop.map(|()| Action::EStop),
            action = self.actions.recv() => action,
        }
    }
}

pub fn channel() -> (ActionSender, ActionReceiver) {
    let (estop_tx, estop_rx) = mpsc::unbounded_channel();
    let (actions_tx, actions_rx) = mpsc::unbounded_channel();
    (
        ActionSender { estop: estop_tx, actions: actions_tx },
        ActionReceiver { estop: estop_rx, actions: actions_rx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_fires_estop() {
        let mut d = Dispatcher::new();
        assert_eq!(d.key_down(Key::Space, Instant::now()), Some(Action::EStop));
    }

    #[test]
    fn repeated_key_within_debounce_window_is_suppressed() {
        let mut d = Dispatcher::new();
        let t0 = Instant::now();
        assert_eq!(d.key_down(Key::Enter, t0), Some(Action::Disable));
        assert_eq!(d.key_down(Key::Enter, t0 + Duration::from_millis(10)), None);
        assert_eq!(d.key_down(Key::Enter, t0 + Duration::from_millis(60)), Some(Action::Disable));
    }

    #[test]
    fn chord_requires_all_three_keys_held_simultaneously() {
        let mut d = Dispatcher::new();
        let t0 = Instant::now();
        assert_eq!(d.key_down(Key::LeftBracket, t0), None);
        assert_eq!(d.key_down(Key::RightBracket, t0), None);
        assert_eq!(d.key_down(Key::Backslash, t0), Some(Action::Enable));
    }

    #[test]
    fn different_keys_have_independent_debounce_buckets() {
        let mut d = Dispatcher::new();
        let t0 = Instant::now();
        assert_eq!(d.key_down(Key::Space, t0), Some(Action::EStop));
        assert_eq!(d.key_down(Key::Enter, t0), Some(Action::Disable));
    }

    #[tokio::test]
    async fn estop_is_received_ahead_of_a_pending_non_estop_action() {
        let (tx, mut rx) = channel();
        tx.send(Action::Disable);
        tx.send(Action::EStop);
        assert_eq!(rx.recv().await, Some(Action::EStop));
        assert_eq!(rx.recv().await, Some(Action::Disable));
    }
}
