//! Event recorder driven by low-level hooks
//!
//! The hook handler does the least possible work on the OS dispatch
//! thread: stamp the payload and push it onto an unbounded channel.
//! Translation into `InputEvent`s happens on the owning thread in
//! [`EventRecorder::drain`].

use crate::sanitize::{close_open_keys, tracked_keys};
use chrono::{DateTime, Utc};
pub use crossbeam_channel::{Receiver, Sender};
use crossbeam_channel::unbounded;
use replayer_core::{
    vk, HookHandle, HookHandler, HookKind, HookManager, InputEvent, RawInput, RecordedLog, Result,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Hotkey that starts/stops recording; released at stop if left down
    pub record_toggle_key: u32,
    /// Skip events the OS flags as synthesized. Off by default: remote
    /// desktop and on-screen keyboards deliver injected input too.
    pub ignore_injected: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            record_toggle_key: vk::F9,
            ignore_injected: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    /// Start from an empty log
    Fresh,
    /// Keep extending the current log
    Append,
}

/// Hook handler. Runs on the OS dispatch thread: timestamp and forward, nothing else.
pub struct CaptureHandler {
    tx: Sender<(DateTime<Utc>, RawInput)>,
}

impl HookHandler for CaptureHandler {
    fn on_input(&self, raw: RawInput) {
        // Receiver gone means recording already stopped
        let _ = self.tx.send((Utc::now(), raw));
    }
}

/// One recording in progress. Owns the log until [`stop`](Self::stop).
pub struct EventRecorder {
    log: RecordedLog,
    config: RecorderConfig,
    rx: Receiver<(DateTime<Utc>, RawInput)>,
    handles: Vec<HookHandle>,
    skipped: usize,
}

impl EventRecorder {
    /// Install both hooks and start capturing into `log`.
    ///
    /// If either hook fails to install, any hook already installed is
    /// removed again before the error is returned.
    pub fn start(hooks: &HookManager, log: RecordedLog, config: RecorderConfig) -> Result<Self> {
        let (tx, rx) = unbounded();
        let handler: Arc<dyn HookHandler> = Arc::new(CaptureHandler { tx });

        let mut handles = Vec::with_capacity(2);
        for kind in [HookKind::Keyboard, HookKind::Mouse] {
            match hooks.install(kind, handler.clone()) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    for handle in handles {
                        hooks.remove(handle);
                    }
                    return Err(e);
                }
            }
        }

        info!(
            "Recording '{}' ({} existing events)",
            log.name,
            log.events.len()
        );
        Ok(Self {
            log,
            config,
            rx,
            handles,
            skipped: 0,
        })
    }

    /// Translate one raw payload and append it. Returns whether an event was appended.
    pub fn append_event(&mut self, raw: RawInput, at: DateTime<Utc>) -> bool {
        if self.config.ignore_injected && raw.is_injected() {
            self.skipped += 1;
            return false;
        }
        match InputEvent::from_raw(raw, at) {
            Some(event) => {
                self.log.events.push(event);
                true
            }
            None => false,
        }
    }

    /// Move captured payloads into the log. Returns the number of events appended.
    pub fn drain(&mut self) -> usize {
        let mut appended = 0;
        while let Ok((at, raw)) = self.rx.try_recv() {
            if self.append_event(raw, at) {
                appended += 1;
            }
        }
        appended
    }

    pub fn log(&self) -> &RecordedLog {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.events.is_empty()
    }

    /// Remove the hooks, take whatever is still queued, and close open modifiers.
    pub fn stop(mut self, hooks: &HookManager) -> RecordedLog {
        for handle in self.handles.drain(..) {
            hooks.remove(handle);
        }
        self.drain();

        let tracked = tracked_keys(self.config.record_toggle_key);
        let released = close_open_keys(&mut self.log.events, &tracked, Utc::now());
        if released > 0 {
            debug!("Appended {} synthetic key release(s)", released);
        }
        if self.skipped > 0 {
            debug!("Skipped {} injected event(s)", self.skipped);
        }

        info!(
            "Recording '{}' stopped with {} events",
            self.log.name,
            self.log.events.len()
        );
        self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHooks;
    use replayer_core::{EventKind, ErrorCode, KeyTransition, MouseMessage};

    fn mouse(message: MouseMessage, x: i32, y: i32) -> RawInput {
        RawInput::Mouse {
            message,
            x,
            y,
            injected: false,
        }
    }

    fn key(vk: u32, transition: KeyTransition) -> RawInput {
        RawInput::Key {
            vk,
            transition,
            extended: false,
            injected: false,
        }
    }

    #[test]
    fn captures_through_hooks() {
        let fake = Arc::new(FakeHooks::default());
        let hooks = HookManager::new(fake.clone());
        let mut recorder =
            EventRecorder::start(&hooks, RecordedLog::default(), RecorderConfig::default()).unwrap();

        fake.emit(mouse(MouseMessage::Move, 5, 6));
        fake.emit(mouse(MouseMessage::LeftDown, 5, 6));
        fake.emit(mouse(MouseMessage::LeftUp, 5, 6));
        fake.emit(mouse(MouseMessage::Other, 5, 6));
        fake.emit(key(vk::A, KeyTransition::Down));
        fake.emit(key(vk::A, KeyTransition::Up));

        assert_eq!(recorder.drain(), 4);
        let log = recorder.stop(&hooks);

        let kinds: Vec<_> = log.events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::MouseMove,
                EventKind::MouseLeftClick,
                EventKind::KeyPress,
                EventKind::KeyRelease,
            ]
        );
        assert!(!hooks.is_installed(HookKind::Keyboard));
        assert!(!hooks.is_installed(HookKind::Mouse));
    }

    #[test]
    fn every_move_is_kept() {
        let fake = Arc::new(FakeHooks::default());
        let hooks = HookManager::new(fake.clone());
        let recorder =
            EventRecorder::start(&hooks, RecordedLog::default(), RecorderConfig::default()).unwrap();

        for _ in 0..500 {
            fake.emit(mouse(MouseMessage::Move, 1, 1));
        }
        assert_eq!(recorder.stop(&hooks).events.len(), 500);
    }

    #[test]
    fn stop_releases_held_ctrl() {
        let fake = Arc::new(FakeHooks::default());
        let hooks = HookManager::new(fake.clone());
        let recorder =
            EventRecorder::start(&hooks, RecordedLog::default(), RecorderConfig::default()).unwrap();

        fake.emit(mouse(MouseMessage::Move, 0, 0));
        fake.emit(key(vk::LCONTROL, KeyTransition::Down));

        let log = recorder.stop(&hooks);
        assert_eq!(log.events.len(), 3);
        let tail = log.events.last().unwrap();
        assert_eq!(tail.kind, EventKind::KeyRelease);
        assert_eq!(tail.virtual_key_code, 162);
    }

    #[test]
    fn injected_input_is_recorded_by_default() {
        let fake = Arc::new(FakeHooks::default());
        let hooks = HookManager::new(fake.clone());
        let recorder =
            EventRecorder::start(&hooks, RecordedLog::default(), RecorderConfig::default()).unwrap();

        for x in 0..3 {
            fake.emit(RawInput::Mouse {
                message: MouseMessage::Move,
                x,
                y: x,
                injected: true,
            });
        }
        fake.emit(RawInput::Key {
            vk: vk::A,
            transition: KeyTransition::Down,
            extended: false,
            injected: true,
        });

        let log = recorder.stop(&hooks);
        let kinds: Vec<_> = log.events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::MouseMove,
                EventKind::MouseMove,
                EventKind::MouseMove,
                EventKind::KeyPress,
            ]
        );
    }

    #[test]
    fn injected_input_is_skipped_when_configured() {
        let injected = RawInput::Key {
            vk: vk::A,
            transition: KeyTransition::Down,
            extended: false,
            injected: true,
        };
        let config = RecorderConfig {
            ignore_injected: true,
            ..Default::default()
        };

        let fake = Arc::new(FakeHooks::default());
        let hooks = HookManager::new(fake.clone());
        let mut recorder = EventRecorder::start(&hooks, RecordedLog::default(), config).unwrap();
        assert!(!recorder.append_event(injected, Utc::now()));
        assert!(recorder.append_event(key(vk::A, KeyTransition::Down), Utc::now()));
        let log = recorder.stop(&hooks);
        assert_eq!(log.events.len(), 1);
    }

    #[test]
    fn appends_to_existing_log() {
        let fake = Arc::new(FakeHooks::default());
        let hooks = HookManager::new(fake.clone());
        let mut existing = RecordedLog::new("login");
        existing.events.push(InputEvent::mouse_move(1, 1, Utc::now()));

        let recorder = EventRecorder::start(&hooks, existing, RecorderConfig::default()).unwrap();
        fake.emit(mouse(MouseMessage::RightDown, 2, 2));
        let log = recorder.stop(&hooks);

        assert_eq!(log.name, "login");
        assert_eq!(log.events.len(), 2);
        assert_eq!(log.events[1].kind, EventKind::MouseRightClick);
    }

    #[test]
    fn failed_install_rolls_back() {
        let fake = Arc::new(FakeHooks::rejecting(HookKind::Mouse));
        let hooks = HookManager::new(fake.clone());

        let err = EventRecorder::start(&hooks, RecordedLog::default(), RecorderConfig::default())
            .err()
            .unwrap();

        assert_eq!(err.code, ErrorCode::HookInstallFailed);
        assert!(!hooks.is_installed(HookKind::Keyboard));
        assert!(!fake.is_active(HookKind::Keyboard));
    }
}
