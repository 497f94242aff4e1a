//! Windows input injection
//!
//! Uses SetCursorPos for positioning and SendInput for buttons and keys.

use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::SetCursorPos;

use crate::input::{ButtonState, InputSink, MouseButton};
use crate::{Error, Result};

pub struct WindowsInput;

impl InputSink for WindowsInput {
    fn set_cursor_position(&self, x: i32, y: i32) -> Result<()> {
        unsafe {
            SetCursorPos(x, y).map_err(|e| Error::injection_failed("SetCursorPos", e))?;
        }
        Ok(())
    }

    fn mouse_button(&self, button: MouseButton, state: ButtonState) -> Result<()> {
        let flags = match (button, state) {
            (MouseButton::Left, ButtonState::Down) => MOUSEEVENTF_LEFTDOWN,
            (MouseButton::Left, ButtonState::Up) => MOUSEEVENTF_LEFTUP,
            (MouseButton::Right, ButtonState::Down) => MOUSEEVENTF_RIGHTDOWN,
            (MouseButton::Right, ButtonState::Up) => MOUSEEVENTF_RIGHTUP,
        };
        send_inputs(&[make_mouse_input(flags)])
    }

    fn key(&self, vk: u32, state: ButtonState, extended: bool) -> Result<()> {
        send_inputs(&[make_key_input(vk, state, extended)])
    }

    fn click(&self, button: MouseButton) -> Result<()> {
        let (down, up) = match button {
            MouseButton::Left => (MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP),
            MouseButton::Right => (MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP),
        };
        send_inputs(&[make_mouse_input(down), make_mouse_input(up)])
    }
}

fn make_mouse_input(flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn make_key_input(vk: u32, state: ButtonState, extended: bool) -> INPUT {
    let mut flags = KEYBD_EVENT_FLAGS(0);
    if state == ButtonState::Up {
        flags |= KEYEVENTF_KEYUP;
    }
    if extended {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(vk as u16),
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send_inputs(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };

    if sent as usize != inputs.len() {
        return Err(Error::injection_failed(
            "SendInput",
            format!("sent {} of {} inputs", sent, inputs.len()),
        ));
    }

    Ok(())
}
