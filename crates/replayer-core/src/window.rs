//! Top-level window visibility, used to tell when a new process has
//! finished putting up its window

/// What a process currently shows on the desktop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// No top-level window, or the platform cannot tell
    None,
    /// A window exists but is not visible yet
    Hidden,
    Visible,
}

pub trait WindowInspector: Send + Sync {
    fn window_state(&self, pid: u32) -> WindowState;
}

/// Inspector that never sees a window
pub struct NoWindows;

impl WindowInspector for NoWindows {
    fn window_state(&self, _pid: u32) -> WindowState {
        WindowState::None
    }
}
