//! Platform OS hook backend, using `rdev`'s process-global keyboard listener.
//!
//! `rdev::listen` blocks the calling thread for the life of the hook and
//! delivers events even when the application has no window focus, which is
//! exactly the capability §4.5 requires; it has no async integration, so
//! [`spawn`] runs it on a dedicated OS thread (the same treatment
//! `input::run` gives `gilrs`) and forwards through [`super::ActionSender`].

use rdev::{listen, Event, EventType, Key as RdevKey};

use super::{ActionSender, Dispatcher, Key};

fn map_key(key: RdevKey) -> Key {
    match key {
        RdevKey::Space => Key::Space,
        RdevKey::Return => Key::Enter,
        RdevKey::Backspace => Key::Backspace,
        RdevKey::F1 => Key::F1,
        RdevKey::LeftBracket => Key::LeftBracket,
        RdevKey::RightBracket => Key::RightBracket,
        RdevKey::BackSlash => Key::Backslash,
        _ => Key::Other,
    }
}

/// Spawns the OS hook on a dedicated thread. Returns immediately; the thread
/// runs until the process exits (`rdev::listen` has no clean shutdown hook on
/// most platforms, so this is not wired to the engine's cancellation token —
/// an accepted gap, see DESIGN.md).
pub fn spawn(sender: ActionSender) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut dispatcher = Dispatcher::new();
        let callback = move |event: Event| {
            let key = match event.event_type {
                EventType::KeyPress(key) => Some((map_key(key), true)),
                EventType::KeyRelease(key) => Some((map_key(key), false)),
                _ => None,
            };
            let Some((key, pressed)) = key else { return };
            if pressed {
                if let Some(action) = dispatcher.key_down(key, std::time::Instant::now()) {
                    sender.send(action);
                }
            } else {
                dispatcher.key_up(key);
            }
        };

        if let Err(err) = listen(callback) {
            tracing::error!(?err, "hotkey OS hook failed to start");
        }
    })
}
