//! Windows low-level hooks
//!
//! Each hook kind gets a dedicated thread that registers the hook, pumps
//! messages with `GetMessageW` (low-level hooks are delivered through the
//! installing thread's message loop) and unhooks once `WM_QUIT` arrives.
//!
//! The `extern "system"` procedures are trampolines: they read the handler
//! slot without blocking, build a `RawInput` on the stack, forward it and
//! always chain with `CallNextHookEx`.

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{const_rwlock, Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK, HOOKPROC, KBDLLHOOKSTRUCT,
    MSG, MSLLHOOKSTRUCT, PM_NOREMOVE, WH_KEYBOARD_LL, WH_MOUSE_LL, WINDOWS_HOOK_ID,
    WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE, WM_QUIT, WM_RBUTTONDOWN,
    WM_RBUTTONUP, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

use crate::events::{KeyTransition, MouseMessage, RawInput};
use crate::hook::{HookBackend, HookError, HookHandler, HookKind};

/// LLKHF_EXTENDED
const KEY_EXTENDED_FLAG: u32 = 0x01;
/// LLKHF_INJECTED
const KEY_INJECTED_FLAG: u32 = 0x10;
/// LLMHF_INJECTED
const MOUSE_INJECTED_FLAG: u32 = 0x01;

const INSTALL_TIMEOUT: Duration = Duration::from_secs(5);

type Slot = RwLock<Option<Arc<dyn HookHandler>>>;

static KEYBOARD_HANDLER: Slot = const_rwlock(None);
static MOUSE_HANDLER: Slot = const_rwlock(None);

fn slot(kind: HookKind) -> &'static Slot {
    match kind {
        HookKind::Keyboard => &KEYBOARD_HANDLER,
        HookKind::Mouse => &MOUSE_HANDLER,
    }
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        // A writer only holds the lock while (un)installing; skip rather than wait.
        if let Some(guard) = KEYBOARD_HANDLER.try_read() {
            if let Some(handler) = guard.as_ref() {
                let kbd = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
                let transition = match wparam.0 as u32 {
                    WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyTransition::Down),
                    WM_KEYUP | WM_SYSKEYUP => Some(KeyTransition::Up),
                    _ => None,
                };
                if let Some(transition) = transition {
                    handler.on_input(RawInput::Key {
                        vk: kbd.vkCode,
                        transition,
                        extended: kbd.flags.0 & KEY_EXTENDED_FLAG != 0,
                        injected: kbd.flags.0 & KEY_INJECTED_FLAG != 0,
                    });
                }
            }
        }
    }

    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}

unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        if let Some(guard) = MOUSE_HANDLER.try_read() {
            if let Some(handler) = guard.as_ref() {
                let data = &*(lparam.0 as *const MSLLHOOKSTRUCT);
                let message = match wparam.0 as u32 {
                    WM_MOUSEMOVE => MouseMessage::Move,
                    WM_LBUTTONDOWN => MouseMessage::LeftDown,
                    WM_LBUTTONUP => MouseMessage::LeftUp,
                    WM_RBUTTONDOWN => MouseMessage::RightDown,
                    WM_RBUTTONUP => MouseMessage::RightUp,
                    _ => MouseMessage::Other,
                };
                handler.on_input(RawInput::Mouse {
                    message,
                    x: data.pt.x,
                    y: data.pt.y,
                    injected: data.flags & MOUSE_INJECTED_FLAG != 0,
                });
            }
        }
    }

    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}

struct HookThread {
    thread_id: u32,
    join: JoinHandle<()>,
}

/// Hook backend using `SetWindowsHookExW(WH_KEYBOARD_LL | WH_MOUSE_LL)`
pub struct WindowsHooks {
    threads: Mutex<HashMap<HookKind, HookThread>>,
}

impl WindowsHooks {
    pub fn new() -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for WindowsHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl HookBackend for WindowsHooks {
    fn install(
        &self,
        kind: HookKind,
        handler: Arc<dyn HookHandler>,
    ) -> Result<(), HookError> {
        let mut threads = self.threads.lock();
        if threads.contains_key(&kind) {
            return Err(HookError::AlreadyInstalled(kind));
        }

        *slot(kind).write() = Some(handler);

        // Rendezvous: a hook thread that reports after the installer gave
        // up sees the send fail and unhooks itself
        let (ready_tx, ready_rx) = bounded::<Result<u32, HookError>>(0);
        let spawned = thread::Builder::new()
            .name(format!("{}-hook", kind))
            .spawn(move || run_hook_thread(kind, ready_tx));
        let join = match spawned {
            Ok(join) => join,
            Err(e) => {
                *slot(kind).write() = None;
                return Err(HookError::Thread(e.to_string()));
            }
        };

        match await_ready(ready_rx, INSTALL_TIMEOUT) {
            Ok(thread_id) => {
                threads.insert(kind, HookThread { thread_id, join });
                Ok(())
            }
            Err(e @ HookError::Timeout(_)) => {
                *slot(kind).write() = None;
                warn!("{} hook did not report within {:?}", kind, INSTALL_TIMEOUT);
                Err(e)
            }
            Err(e) => {
                *slot(kind).write() = None;
                let _ = join.join();
                Err(e)
            }
        }
    }

    fn uninstall(&self, kind: HookKind) {
        let Some(hook) = self.threads.lock().remove(&kind) else {
            return;
        };

        let posted = unsafe { PostThreadMessageW(hook.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
        match posted {
            Ok(()) => {
                if hook.join.join().is_err() {
                    warn!("{} hook thread panicked", kind);
                }
            }
            Err(e) => warn!("Failed to stop {} hook thread: {:?}", kind, e),
        }

        *slot(kind).write() = None;
    }
}

/// Wait for the hook thread's report. Consumes the receiver so a late
/// report cannot be delivered.
fn await_ready(
    ready: Receiver<Result<u32, HookError>>,
    timeout: Duration,
) -> Result<u32, HookError> {
    match ready.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(HookError::Timeout(timeout)),
    }
}

/// Hand the install result to the installer. `false` means nobody is
/// waiting any more.
fn report(ready: &Sender<Result<u32, HookError>>, result: Result<u32, HookError>) -> bool {
    ready.send(result).is_ok()
}

fn run_hook_thread(kind: HookKind, ready: Sender<Result<u32, HookError>>) {
    let (id, proc): (WINDOWS_HOOK_ID, HOOKPROC) = match kind {
        HookKind::Keyboard => (WH_KEYBOARD_LL, Some(keyboard_proc)),
        HookKind::Mouse => (WH_MOUSE_LL, Some(mouse_proc)),
    };

    let mut msg = MSG::default();
    unsafe {
        // Create the message queue before anyone can post WM_QUIT to us
        let _ = PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_NOREMOVE);
    }

    let hook = match unsafe { SetWindowsHookExW(id, proc, HINSTANCE::default(), 0) } {
        Ok(hook) => hook,
        Err(e) => {
            report(&ready, Err(HookError::Rejected(e.to_string())));
            return;
        }
    };

    if !report(&ready, Ok(unsafe { GetCurrentThreadId() })) {
        // Installer timed out; nothing will ever post WM_QUIT here
        let _ = unsafe { UnhookWindowsHookEx(hook) };
        warn!("{} hook installed after the installer gave up, removed", kind);
        return;
    }
    debug!("{} hook message loop running", kind);

    unsafe {
        // 0 means WM_QUIT, -1 means error
        while GetMessageW(&mut msg, HWND::default(), 0, 0).0 > 0 {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
        let _ = UnhookWindowsHookEx(hook);
    }
    debug!("{} hook message loop exited", kind);
}
