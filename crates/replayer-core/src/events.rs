//! Event types for recorded input
//!
//! `InputEvent` is the canonical record stored in a log and consumed by
//! replay. `RawInput` is what a low-level hook hands us before translation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded log - an ordered list of events plus a display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedLog {
    pub name: String,
    pub events: Vec<InputEvent>,
}

impl RecordedLog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl Default for RecordedLog {
    fn default() -> Self {
        Self::new("recording")
    }
}

/// Kind of a recorded event. Serialized by variant name; unknown names fail to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    MouseMove,
    MouseLeftClick,
    MouseRightClick,
    KeyPress,
    KeyRelease,
}

impl EventKind {
    pub fn is_mouse(self) -> bool {
        matches!(
            self,
            EventKind::MouseMove | EventKind::MouseLeftClick | EventKind::MouseRightClick
        )
    }

    pub fn is_key(self) -> bool {
        !self.is_mouse()
    }
}

/// Single captured event - flat record matching the persisted field contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputEvent {
    /// Capture time
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Screen coordinates, mouse events only
    pub position_x: i32,
    pub position_y: i32,
    /// Virtual key code, key events only
    pub virtual_key_code: u32,
    pub is_extended_key: bool,
}

impl InputEvent {
    fn mouse(kind: EventKind, x: i32, y: i32, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            kind,
            position_x: x,
            position_y: y,
            virtual_key_code: 0,
            is_extended_key: false,
        }
    }

    fn key(kind: EventKind, vk: u32, extended: bool, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            kind,
            position_x: 0,
            position_y: 0,
            virtual_key_code: vk,
            is_extended_key: extended,
        }
    }

    pub fn mouse_move(x: i32, y: i32, at: DateTime<Utc>) -> Self {
        Self::mouse(EventKind::MouseMove, x, y, at)
    }

    pub fn left_click(x: i32, y: i32, at: DateTime<Utc>) -> Self {
        Self::mouse(EventKind::MouseLeftClick, x, y, at)
    }

    pub fn right_click(x: i32, y: i32, at: DateTime<Utc>) -> Self {
        Self::mouse(EventKind::MouseRightClick, x, y, at)
    }

    pub fn key_press(vk: u32, extended: bool, at: DateTime<Utc>) -> Self {
        Self::key(EventKind::KeyPress, vk, extended, at)
    }

    pub fn key_release(vk: u32, extended: bool, at: DateTime<Utc>) -> Self {
        Self::key(EventKind::KeyRelease, vk, extended, at)
    }

    /// Translate a raw hook payload. Returns `None` for payloads that are
    /// not recorded (button releases, wheel, x-buttons).
    pub fn from_raw(raw: RawInput, at: DateTime<Utc>) -> Option<Self> {
        match raw {
            RawInput::Mouse { message, x, y, .. } => match message {
                MouseMessage::Move => Some(Self::mouse_move(x, y, at)),
                MouseMessage::LeftDown => Some(Self::left_click(x, y, at)),
                MouseMessage::RightDown => Some(Self::right_click(x, y, at)),
                MouseMessage::LeftUp | MouseMessage::RightUp | MouseMessage::Other => None,
            },
            RawInput::Key {
                vk,
                transition,
                extended,
                ..
            } => Some(match transition {
                KeyTransition::Down => Self::key_press(vk, extended, at),
                KeyTransition::Up => Self::key_release(vk, extended, at),
            }),
        }
    }
}

/// Mouse message reported by the mouse hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseMessage {
    Move,
    LeftDown,
    LeftUp,
    RightDown,
    RightUp,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Down,
    Up,
}

/// Raw hook payload. `Copy` and heap-free so it can be built inside a hook callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    Mouse {
        message: MouseMessage,
        x: i32,
        y: i32,
        injected: bool,
    },
    Key {
        vk: u32,
        transition: KeyTransition,
        extended: bool,
        injected: bool,
    },
}

impl RawInput {
    /// Whether the OS flagged the event as synthesized by software
    pub fn is_injected(&self) -> bool {
        match *self {
            RawInput::Mouse { injected, .. } | RawInput::Key { injected, .. } => injected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_match_persisted_contract() {
        let e = InputEvent::key_press(162, false, Utc::now());
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "KeyPress");
        assert_eq!(json["virtualKeyCode"], 162);
        assert_eq!(json["isExtendedKey"], false);
        assert!(json.get("positionX").is_some());
        assert!(json.get("positionY").is_some());
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let line = r#"{"timestamp":"2024-01-01T00:00:00Z","type":"MouseWheel","positionX":0,"positionY":0,"virtualKeyCode":0,"isExtendedKey":false}"#;
        assert!(serde_json::from_str::<InputEvent>(line).is_err());
    }

    #[test]
    fn translates_buttons_down_only() {
        let at = Utc::now();
        let down = RawInput::Mouse { message: MouseMessage::RightDown, x: 4, y: 5, injected: false };
        let up = RawInput::Mouse { message: MouseMessage::RightUp, x: 4, y: 5, injected: false };
        assert_eq!(
            InputEvent::from_raw(down, at),
            Some(InputEvent::right_click(4, 5, at))
        );
        assert_eq!(InputEvent::from_raw(up, at), None);
    }

    #[test]
    fn translates_key_transitions() {
        let at = Utc::now();
        let raw = RawInput::Key { vk: 0xA3, transition: KeyTransition::Up, extended: true, injected: false };
        let e = InputEvent::from_raw(raw, at).unwrap();
        assert_eq!(e.kind, EventKind::KeyRelease);
        assert_eq!(e.virtual_key_code, 0xA3);
        assert!(e.is_extended_key);
    }
}
