//! Window visibility through `EnumWindows`

use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowThreadProcessId, IsWindowVisible,
};

use crate::window::{WindowInspector, WindowState};

pub struct WindowsInspector;

struct Search {
    pid: u32,
    state: WindowState,
}

unsafe extern "system" fn visit(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let search = &mut *(lparam.0 as *mut Search);
    let mut owner = 0u32;
    GetWindowThreadProcessId(hwnd, Some(&mut owner as *mut u32));
    if owner != search.pid {
        return BOOL::from(true);
    }
    if IsWindowVisible(hwnd).as_bool() {
        search.state = WindowState::Visible;
        // Stop enumerating
        return BOOL::from(false);
    }
    search.state = WindowState::Hidden;
    BOOL::from(true)
}

impl WindowInspector for WindowsInspector {
    fn window_state(&self, pid: u32) -> WindowState {
        let mut search = Search {
            pid,
            state: WindowState::None,
        };
        // Reports an error when the callback stops early
        let _ = unsafe { EnumWindows(Some(visit), LPARAM(&mut search as *mut Search as isize)) };
        search.state
    }
}
