//! macOS platform implementation
//!
//! Not supported yet: hooks fail to install and injection reports
//! `NotImplemented`.

use crate::hook::{HookBackend, HookError, HookHandler, HookKind};
use crate::input::{ButtonState, InputSink, MouseButton};
use crate::window::{NoWindows, WindowInspector};
use crate::{Error, Result};
use std::sync::Arc;

pub fn hook_backend() -> Arc<dyn HookBackend> {
    Arc::new(MacHooks)
}

pub fn window_inspector() -> Arc<dyn WindowInspector> {
    Arc::new(NoWindows)
}

pub fn input_sink() -> Arc<dyn InputSink> {
    Arc::new(MacInput)
}

pub struct MacHooks;

impl HookBackend for MacHooks {
    fn install(
        &self,
        _kind: HookKind,
        _handler: Arc<dyn HookHandler>,
    ) -> std::result::Result<(), HookError> {
        Err(HookError::Unsupported)
    }

    fn uninstall(&self, _kind: HookKind) {}
}

pub struct MacInput;

impl InputSink for MacInput {
    fn set_cursor_position(&self, _x: i32, _y: i32) -> Result<()> {
        Err(Error::not_implemented("Cursor positioning"))
    }

    fn mouse_button(&self, _button: MouseButton, _state: ButtonState) -> Result<()> {
        Err(Error::not_implemented("Mouse injection"))
    }

    fn key(&self, _vk: u32, _state: ButtonState, _extended: bool) -> Result<()> {
        Err(Error::not_implemented("Keyboard injection"))
    }
}
