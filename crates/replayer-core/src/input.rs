//! Keyboard and mouse input injection

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Down,
    Up,
}

/// Synthesizes OS-level input.
///
/// Implementations must be callable from the replay thread, so they are
/// `Send + Sync`. Every method maps to one OS call.
pub trait InputSink: Send + Sync {
    /// Move the cursor to absolute screen coordinates
    fn set_cursor_position(&self, x: i32, y: i32) -> Result<()>;

    fn mouse_button(&self, button: MouseButton, state: ButtonState) -> Result<()>;

    /// Send a virtual key transition. `extended` marks keys from the
    /// extended block (right Ctrl, arrows, numpad Enter...).
    fn key(&self, vk: u32, state: ButtonState, extended: bool) -> Result<()>;

    /// Press and release a mouse button at the current position
    fn click(&self, button: MouseButton) -> Result<()> {
        self.mouse_button(button, ButtonState::Down)?;
        self.mouse_button(button, ButtonState::Up)
    }
}

/// Common virtual key codes
pub mod vk {
    pub const SHIFT: u32 = 0x10;
    pub const CONTROL: u32 = 0x11;
    pub const ALT: u32 = 0x12;
    pub const ESCAPE: u32 = 0x1B;
    pub const SPACE: u32 = 0x20;
    pub const LEFT: u32 = 0x25;
    pub const UP: u32 = 0x26;
    pub const RIGHT: u32 = 0x27;
    pub const DOWN: u32 = 0x28;

    pub const A: u32 = 0x41;
    pub const R: u32 = 0x52;

    pub const F9: u32 = 0x78;
    pub const F10: u32 = 0x79;

    pub const LSHIFT: u32 = 0xA0;
    pub const RSHIFT: u32 = 0xA1;
    pub const LCONTROL: u32 = 0xA2;
    pub const RCONTROL: u32 = 0xA3;
}
