//! Windows platform implementation
//!
//! Low-level hooks for capture, SetCursorPos/SendInput for replay,
//! EnumWindows for window visibility.

mod hook;
mod input;
mod window;

pub use hook::WindowsHooks;
pub use input::WindowsInput;
pub use window::WindowsInspector;

use crate::hook::HookBackend;
use crate::input::InputSink;
use crate::window::WindowInspector;
use std::sync::Arc;

pub fn hook_backend() -> Arc<dyn HookBackend> {
    Arc::new(WindowsHooks::new())
}

pub fn input_sink() -> Arc<dyn InputSink> {
    Arc::new(WindowsInput)
}

pub fn window_inspector() -> Arc<dyn WindowInspector> {
    Arc::new(WindowsInspector)
}
