//! End-of-recording cleanup
//!
//! The hotkey that stops a recording is itself recorded, usually with a
//! modifier still held. Replaying that log would leave the modifier pressed
//! for everything that follows, so any tracked key still down at the end of
//! the log gets a synthetic release appended.

use chrono::{DateTime, Utc};
use replayer_core::{vk, EventKind, InputEvent};

/// Ctrl and Shift, generic and sided
pub const MODIFIER_KEYS: [u32; 6] = [
    vk::CONTROL,
    vk::LCONTROL,
    vk::RCONTROL,
    vk::SHIFT,
    vk::LSHIFT,
    vk::RSHIFT,
];

/// Modifier keys plus the record-toggle key
pub fn tracked_keys(record_toggle_key: u32) -> Vec<u32> {
    let mut keys = MODIFIER_KEYS.to_vec();
    if !keys.contains(&record_toggle_key) {
        keys.push(record_toggle_key);
    }
    keys
}

/// Append a `KeyRelease` for every tracked key left pressed.
///
/// Single pass over `events`. Releases are appended in `tracked` order and
/// reuse the extended flag of the press that opened them. Returns the number
/// of events appended.
pub fn close_open_keys(events: &mut Vec<InputEvent>, tracked: &[u32], now: DateTime<Utc>) -> usize {
    // (code, Some(extended) while pressed)
    let mut open: Vec<(u32, Option<bool>)> = tracked.iter().map(|&code| (code, None)).collect();

    for event in events.iter() {
        if !event.kind.is_key() {
            continue;
        }
        let Some(entry) = open.iter_mut().find(|(code, _)| *code == event.virtual_key_code) else {
            continue;
        };
        entry.1 = match event.kind {
            EventKind::KeyPress => Some(event.is_extended_key),
            _ => None,
        };
    }

    let before = events.len();
    for (code, state) in open {
        if let Some(extended) = state {
            events.push(InputEvent::key_release(code, extended, now));
        }
    }
    events.len() - before
}

/// Codes from `tracked` that are pressed without a later release
pub fn open_keys(events: &[InputEvent], tracked: &[u32]) -> Vec<u32> {
    let mut open = Vec::new();
    for &code in tracked {
        let last = events
            .iter()
            .rev()
            .find(|e| e.kind.is_key() && e.virtual_key_code == code);
        if matches!(last, Some(e) if e.kind == EventKind::KeyPress) {
            open.push(code);
        }
    }
    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tracked() -> Vec<u32> {
        tracked_keys(vk::F9)
    }

    #[test]
    fn releases_ctrl_left_down() {
        let t0 = Utc::now();
        let mut events = vec![
            InputEvent::mouse_move(0, 0, t0),
            InputEvent::key_press(162, false, t0 + Duration::milliseconds(10)),
        ];

        let added = close_open_keys(&mut events, &tracked(), Utc::now());

        assert_eq!(added, 1);
        assert_eq!(events.len(), 3);
        let tail = events.last().unwrap();
        assert_eq!(tail.kind, EventKind::KeyRelease);
        assert_eq!(tail.virtual_key_code, 162);
    }

    #[test]
    fn balanced_log_is_untouched() {
        let t = Utc::now();
        let mut events = vec![
            InputEvent::key_press(vk::LSHIFT, false, t),
            InputEvent::key_press(vk::A, false, t),
            InputEvent::key_release(vk::A, false, t),
            InputEvent::key_release(vk::LSHIFT, false, t),
        ];
        let original = events.clone();

        assert_eq!(close_open_keys(&mut events, &tracked(), t), 0);
        assert_eq!(events, original);
    }

    #[test]
    fn untracked_keys_are_left_alone() {
        let t = Utc::now();
        let mut events = vec![InputEvent::key_press(vk::A, false, t)];
        assert_eq!(close_open_keys(&mut events, &tracked(), t), 0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn releases_toggle_key_and_keeps_extended_flag() {
        let t = Utc::now();
        let mut events = vec![
            InputEvent::key_press(vk::RCONTROL, true, t),
            InputEvent::key_press(vk::F9, false, t),
        ];

        assert_eq!(close_open_keys(&mut events, &tracked(), t), 2);
        assert_eq!(events[2].virtual_key_code, vk::RCONTROL);
        assert!(events[2].is_extended_key);
        assert_eq!(events[3].virtual_key_code, vk::F9);
        assert!(open_keys(&events, &tracked()).is_empty());
    }

    #[test]
    fn repeated_presses_need_one_release() {
        let t = Utc::now();
        let mut events = vec![
            InputEvent::key_press(vk::LCONTROL, false, t),
            InputEvent::key_press(vk::LCONTROL, false, t),
            InputEvent::key_press(vk::LCONTROL, false, t),
        ];
        assert_eq!(close_open_keys(&mut events, &tracked(), t), 1);
    }

    #[test]
    fn no_tracked_key_open_after_any_sequence() {
        let keys = tracked();
        let mut pool = keys.clone();
        pool.push(vk::A);
        let t = Utc::now();

        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..200 {
            let mut events = Vec::new();
            for _ in 0..40 {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let code = pool[(seed >> 33) as usize % pool.len()];
                let event = match (seed >> 20) % 3 {
                    0 => InputEvent::key_press(code, false, t),
                    1 => InputEvent::key_release(code, false, t),
                    _ => InputEvent::mouse_move((seed % 100) as i32, 0, t),
                };
                events.push(event);
            }
            close_open_keys(&mut events, &keys, t);
            assert!(open_keys(&events, &keys).is_empty());
        }
    }
}
