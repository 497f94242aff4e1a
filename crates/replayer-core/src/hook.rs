//! Low-level hook management
//!
//! A [`HookManager`] installs and removes system-wide keyboard and mouse
//! hooks through a platform [`HookBackend`]. Every installed hook forwards
//! raw payloads to a [`HookHandler`] on the OS dispatch thread.
//!
//! Handlers run inside the OS input chain: while `on_input` executes, input
//! delivery for every application on the system is held up. They must not
//! block, sleep, allocate on the hot path, or perform I/O.

use crate::events::RawInput;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Keyboard,
    Mouse,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::Keyboard => f.write_str("keyboard"),
            HookKind::Mouse => f.write_str("mouse"),
        }
    }
}

/// Identifies one installation of a hook. Stale handles are ignored by `remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookHandle {
    pub kind: HookKind,
    generation: u64,
}

/// Receives raw payloads on the OS dispatch thread
pub trait HookHandler: Send + Sync {
    fn on_input(&self, raw: RawInput);
}

#[derive(Debug, ThisError)]
pub enum HookError {
    #[error("{0} hook is already installed")]
    AlreadyInstalled(HookKind),
    #[error("OS rejected hook registration: {0}")]
    Rejected(String),
    #[error("hook thread did not report back within {0:?}")]
    Timeout(Duration),
    #[error("hook thread could not be started: {0}")]
    Thread(String),
    #[error("low-level hooks are not supported on this platform")]
    Unsupported,
}

impl HookError {
    pub fn into_error(self, kind: HookKind) -> Error {
        Error::hook_install_failed(&kind.to_string(), self)
    }
}

/// Platform side of hook installation
pub trait HookBackend: Send + Sync {
    fn install(
        &self,
        kind: HookKind,
        handler: Arc<dyn HookHandler>,
    ) -> std::result::Result<(), HookError>;

    /// Remove the hook of `kind`. Called only for kinds that are installed.
    fn uninstall(&self, kind: HookKind);
}

#[derive(Default)]
struct Slots {
    keyboard: Option<u64>,
    mouse: Option<u64>,
    next_generation: u64,
}

impl Slots {
    fn get_mut(&mut self, kind: HookKind) -> &mut Option<u64> {
        match kind {
            HookKind::Keyboard => &mut self.keyboard,
            HookKind::Mouse => &mut self.mouse,
        }
    }
}

pub struct HookManager {
    backend: Arc<dyn HookBackend>,
    slots: Mutex<Slots>,
}

impl HookManager {
    pub fn new(backend: Arc<dyn HookBackend>) -> Self {
        Self {
            backend,
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Manager backed by the current platform's hooks
    pub fn platform() -> Self {
        Self::new(crate::platform::current::hook_backend())
    }

    pub fn install(&self, kind: HookKind, handler: Arc<dyn HookHandler>) -> Result<HookHandle> {
        let mut slots = self.slots.lock();
        if slots.get_mut(kind).is_some() {
            return Err(HookError::AlreadyInstalled(kind).into_error(kind));
        }

        self.backend
            .install(kind, handler)
            .map_err(|e| e.into_error(kind))?;

        slots.next_generation += 1;
        let generation = slots.next_generation;
        *slots.get_mut(kind) = Some(generation);
        info!("{} hook installed", kind);

        Ok(HookHandle { kind, generation })
    }

    /// Remove a hook. Removing a hook that is not installed is a no-op.
    pub fn remove(&self, handle: HookHandle) {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(handle.kind);
        if *slot != Some(handle.generation) {
            debug!("{} hook already removed", handle.kind);
            return;
        }
        *slot = None;
        self.backend.uninstall(handle.kind);
        info!("{} hook removed", handle.kind);
    }

    pub fn remove_all(&self) {
        let mut slots = self.slots.lock();
        for kind in [HookKind::Keyboard, HookKind::Mouse] {
            if slots.get_mut(kind).take().is_some() {
                self.backend.uninstall(kind);
                info!("{} hook removed", kind);
            }
        }
    }

    pub fn is_installed(&self, kind: HookKind) -> bool {
        self.slots.lock().get_mut(kind).is_some()
    }
}

impl Drop for HookManager {
    fn drop(&mut self) {
        self.remove_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{KeyTransition, RawInput};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingBackend {
        installs: AtomicUsize,
        uninstalls: AtomicUsize,
        reject: bool,
    }

    impl HookBackend for CountingBackend {
        fn install(
            &self,
            _kind: HookKind,
            handler: Arc<dyn HookHandler>,
        ) -> std::result::Result<(), HookError> {
            if self.reject {
                return Err(HookError::Rejected("access denied".into()));
            }
            self.installs.fetch_add(1, Ordering::SeqCst);
            handler.on_input(RawInput::Key {
                vk: 0x41,
                transition: KeyTransition::Down,
                extended: false,
                injected: false,
            });
            Ok(())
        }

        fn uninstall(&self, _kind: HookKind) {
            self.uninstalls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl HookHandler for Counter {
        fn on_input(&self, _raw: RawInput) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn remove_is_idempotent() {
        let backend = Arc::new(CountingBackend::default());
        let manager = HookManager::new(backend.clone());
        let handler = Arc::new(Counter::default());

        let handle = manager.install(HookKind::Keyboard, handler.clone()).unwrap();
        assert!(manager.is_installed(HookKind::Keyboard));
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);

        manager.remove(handle);
        manager.remove(handle);
        manager.remove_all();
        assert_eq!(backend.uninstalls.load(Ordering::SeqCst), 1);
        assert!(!manager.is_installed(HookKind::Keyboard));
    }

    #[test]
    fn stale_handle_does_not_remove_newer_install() {
        let backend = Arc::new(CountingBackend::default());
        let manager = HookManager::new(backend.clone());
        let handler = Arc::new(Counter::default());

        let old = manager.install(HookKind::Mouse, handler.clone()).unwrap();
        manager.remove(old);
        let _new = manager.install(HookKind::Mouse, handler).unwrap();
        manager.remove(old);
        assert!(manager.is_installed(HookKind::Mouse));
    }

    #[test]
    fn double_install_fails() {
        let manager = HookManager::new(Arc::new(CountingBackend::default()));
        let handler = Arc::new(Counter::default());
        manager.install(HookKind::Keyboard, handler.clone()).unwrap();
        let err = manager.install(HookKind::Keyboard, handler).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::HookInstallFailed);
    }

    #[test]
    fn rejected_install_leaves_nothing_installed() {
        let backend = Arc::new(CountingBackend {
            reject: true,
            ..Default::default()
        });
        let manager = HookManager::new(backend.clone());
        let err = manager
            .install(HookKind::Mouse, Arc::new(Counter::default()))
            .unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::HookInstallFailed);
        assert!(err.message.contains("mouse"));
        assert!(!manager.is_installed(HookKind::Mouse));
        drop(manager);
        assert_eq!(backend.uninstalls.load(Ordering::SeqCst), 0);
    }
}
