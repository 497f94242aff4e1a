//! Test doubles for hooks, injection, process notifications and windows

use crate::monitor::{ProcessEvent, ProcessSource};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use replayer_core::{
    ButtonState, Error, HookBackend, HookError, HookHandler, HookKind, InputSink, MouseButton,
    RawInput, Result, WindowInspector, WindowState,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Hook backend that hands payloads straight to the installed handler
#[derive(Default)]
pub struct FakeHooks {
    handlers: Mutex<HashMap<HookKind, Arc<dyn HookHandler>>>,
    reject: Option<HookKind>,
}

impl FakeHooks {
    pub fn rejecting(kind: HookKind) -> Self {
        Self {
            reject: Some(kind),
            ..Default::default()
        }
    }

    /// Deliver `raw` as the OS would. Dropped if no hook of that kind is installed.
    pub fn emit(&self, raw: RawInput) {
        let kind = match raw {
            RawInput::Mouse { .. } => HookKind::Mouse,
            RawInput::Key { .. } => HookKind::Keyboard,
        };
        let handler = self.handlers.lock().get(&kind).cloned();
        if let Some(handler) = handler {
            handler.on_input(raw);
        }
    }

    pub fn is_active(&self, kind: HookKind) -> bool {
        self.handlers.lock().contains_key(&kind)
    }
}

impl HookBackend for FakeHooks {
    fn install(
        &self,
        kind: HookKind,
        handler: Arc<dyn HookHandler>,
    ) -> std::result::Result<(), HookError> {
        if self.reject == Some(kind) {
            return Err(HookError::Rejected("access denied".into()));
        }
        self.handlers.lock().insert(kind, handler);
        Ok(())
    }

    fn uninstall(&self, kind: HookKind) {
        self.handlers.lock().remove(&kind);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move(i32, i32),
    Button(MouseButton, ButtonState),
    Key(u32, ButtonState, bool),
}

/// Input sink that remembers every action and when it happened
#[derive(Default)]
pub struct RecordingSink {
    actions: Mutex<Vec<(Instant, Action)>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn actions(&self) -> Vec<(Instant, Action)> {
        self.actions.lock().clone()
    }

    fn push(&self, action: Action) -> Result<()> {
        if self.fail {
            return Err(Error::injection_failed("test", "sink rejects everything"));
        }
        self.actions.lock().push((Instant::now(), action));
        Ok(())
    }
}

impl InputSink for RecordingSink {
    fn set_cursor_position(&self, x: i32, y: i32) -> Result<()> {
        self.push(Action::Move(x, y))
    }

    fn mouse_button(&self, button: MouseButton, state: ButtonState) -> Result<()> {
        self.push(Action::Button(button, state))
    }

    fn key(&self, vk: u32, state: ButtonState, extended: bool) -> Result<()> {
        self.push(Action::Key(vk, state, extended))
    }
}

/// Process source fed by the test through [`ChannelSource::sender`]
pub struct ChannelSource {
    tx: Sender<ProcessEvent>,
    rx: Mutex<Option<Receiver<ProcessEvent>>>,
}

impl ChannelSource {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    pub fn sender(&self) -> Sender<ProcessEvent> {
        self.tx.clone()
    }
}

impl ProcessSource for ChannelSource {
    fn subscribe(&self) -> Result<Receiver<ProcessEvent>> {
        self.rx
            .lock()
            .take()
            .ok_or_else(|| Error::subscription_failed("already subscribed"))
    }
}

/// Process source whose subscription always fails
pub struct DeniedSource;

impl ProcessSource for DeniedSource {
    fn subscribe(&self) -> Result<Receiver<ProcessEvent>> {
        Err(Error::subscription_failed("access denied"))
    }
}

/// Window inspector whose answers the test sets per pid
#[derive(Default)]
pub struct FakeWindows {
    states: Mutex<HashMap<u32, WindowState>>,
}

impl FakeWindows {
    pub fn set(&self, pid: u32, state: WindowState) {
        self.states.lock().insert(pid, state);
    }
}

impl WindowInspector for FakeWindows {
    fn window_state(&self, pid: u32) -> WindowState {
        self.states
            .lock()
            .get(&pid)
            .copied()
            .unwrap_or(WindowState::None)
    }
}
