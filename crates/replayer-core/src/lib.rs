//! replayer-core - OS boundary for input capture and replay
//!
//! Event model, low-level hook management, synthetic input injection and
//! window visibility.
//! Everything above this crate is platform independent.
//!
//! ## Platform Support
//!
//! - **Windows**: Full support via low-level hooks and SendInput
//! - **Linux**: Coming soon (libevdev / uinput)
//! - **macOS**: Coming soon (CGEventTap)

pub mod error;
pub mod events;
pub mod hook;
pub mod input;
pub mod platform;
pub mod window;

pub use error::{Error, ErrorCode, Result};
pub use events::{EventKind, InputEvent, KeyTransition, MouseMessage, RawInput, RecordedLog};
pub use hook::{HookBackend, HookError, HookHandle, HookHandler, HookKind, HookManager};
pub use input::{vk, ButtonState, InputSink, MouseButton};
pub use window::{NoWindows, WindowInspector, WindowState};

pub mod prelude {
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::events::{EventKind, InputEvent, RawInput, RecordedLog};
    pub use crate::hook::{HookKind, HookManager};
    pub use crate::input::{InputSink, MouseButton};
}

/// Input sink for the current platform
pub fn platform_input() -> std::sync::Arc<dyn InputSink> {
    platform::current::input_sink()
}

/// Window visibility inspector for the current platform
pub fn platform_window_inspector() -> std::sync::Arc<dyn WindowInspector> {
    platform::current::window_inspector()
}
