//! Process readiness monitor
//!
//! Watches for newly started processes and reports, for a short settle
//! window after each one, that the desktop is still busy. Callers poll
//! this before issuing input that could land on a window which has not
//! finished appearing.
//!
//! A process counts as loaded once its top-level window is visible, or
//! once it exits. Each observation stores its own timestamp and is
//! compared against the clock on read, so there is no clearing timer to
//! race with readers.

use crate::replay::ReadinessGate;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use replayer_core::{Error, Result, WindowInspector, WindowState};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info, warn};

pub const DEFAULT_SETTLE_WINDOW: Duration = Duration::from_millis(2000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

const SETTLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Started {
        pid: u32,
        name: String,
        start_time: DateTime<Utc>,
    },
    Exited {
        pid: u32,
    },
}

/// Stream of process notifications
pub trait ProcessSource: Send + Sync {
    fn subscribe(&self) -> Result<Receiver<ProcessEvent>>;

    /// Stop producing notifications. Called once when the monitor stops.
    fn unsubscribe(&self) {}
}

/// Polls the OS process table and reports the difference between polls
pub struct SysinfoSource {
    interval: Duration,
    stop: Arc<AtomicBool>,
}

impl SysinfoSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ProcessSource for SysinfoSource {
    fn subscribe(&self) -> Result<Receiver<ProcessEvent>> {
        let (tx, rx) = unbounded();
        let stop = self.stop.clone();
        let interval = self.interval;

        thread::Builder::new()
            .name("process-poll".into())
            .spawn(move || poll_processes(tx, stop, interval))
            .map_err(Error::subscription_failed)?;

        Ok(rx)
    }

    fn unsubscribe(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn poll_processes(tx: Sender<ProcessEvent>, stop: Arc<AtomicBool>, interval: Duration) {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    // Processes already running at subscribe time are not news
    let mut known: HashSet<u32> = system.processes().keys().map(|pid| pid.as_u32()).collect();
    debug!("Process poll baseline: {} processes", known.len());

    while !stop.load(Ordering::SeqCst) {
        thread::sleep(interval);
        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut current = HashSet::with_capacity(known.len());
        for (pid, process) in system.processes() {
            let pid = pid.as_u32();
            current.insert(pid);
            if known.contains(&pid) {
                continue;
            }
            let start_time = i64::try_from(process.start_time())
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .unwrap_or_else(Utc::now);
            let event = ProcessEvent::Started {
                pid,
                name: process.name().to_string_lossy().to_string(),
                start_time,
            };
            if tx.send(event).is_err() {
                return;
            }
        }

        for pid in known.difference(&current) {
            if tx.send(ProcessEvent::Exited { pid: *pid }).is_err() {
                return;
            }
        }
        known = current;
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How long a new process counts as starting
    pub settle_window: Duration,
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            settle_window: DEFAULT_SETTLE_WINDOW,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// A process seen recently
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub name: String,
    pub start_time: DateTime<Utc>,
    /// Set once the process shows a visible window, or is gone
    pub loaded: bool,
    pub observed_at: Instant,
}

impl ProcessSnapshot {
    fn is_live(&self, settle: Duration, now: Instant) -> bool {
        self.observed_at + settle > now
    }
}

struct Shared {
    snapshots: Mutex<Vec<ProcessSnapshot>>,
    settle: Duration,
    windows: Arc<dyn WindowInspector>,
}

impl Shared {
    fn observe(&self, event: ProcessEvent) {
        let now = Instant::now();
        let mut snapshots = self.snapshots.lock();
        snapshots.retain(|s| s.is_live(self.settle, now));

        match event {
            ProcessEvent::Started {
                pid,
                name,
                start_time,
            } => {
                debug!("New process {} ({})", name, pid);
                snapshots.push(ProcessSnapshot {
                    pid,
                    name,
                    start_time,
                    loaded: false,
                    observed_at: now,
                });
            }
            ProcessEvent::Exited { pid } => {
                for snapshot in snapshots.iter_mut().filter(|s| s.pid == pid) {
                    snapshot.loaded = true;
                }
            }
        }
    }

    /// Mark unloaded snapshots whose window has become visible. The inspector
    /// runs without the lock held.
    fn refresh_windows(&self) {
        let pending: Vec<u32> = {
            let now = Instant::now();
            let mut snapshots = self.snapshots.lock();
            snapshots.retain(|s| s.is_live(self.settle, now));
            snapshots.iter().filter(|s| !s.loaded).map(|s| s.pid).collect()
        };
        let visible: Vec<u32> = pending
            .into_iter()
            .filter(|pid| self.windows.window_state(*pid) == WindowState::Visible)
            .collect();
        if visible.is_empty() {
            return;
        }

        let mut snapshots = self.snapshots.lock();
        for snapshot in snapshots.iter_mut() {
            if !snapshot.loaded && visible.contains(&snapshot.pid) {
                debug!("{} ({}) is visible", snapshot.name, snapshot.pid);
                snapshot.loaded = true;
            }
        }
    }

    fn live(&self) -> Vec<ProcessSnapshot> {
        self.refresh_windows();
        let now = Instant::now();
        let mut snapshots = self.snapshots.lock();
        snapshots.retain(|s| s.is_live(self.settle, now));
        snapshots.clone()
    }

    fn starting(&self) -> bool {
        self.refresh_windows();
        let now = Instant::now();
        let mut snapshots = self.snapshots.lock();
        snapshots.retain(|s| s.is_live(self.settle, now));
        snapshots.iter().any(|s| !s.loaded)
    }
}

struct Worker {
    stop_tx: Sender<()>,
    handle: thread::JoinHandle<()>,
}

pub struct ProcessMonitor {
    shared: Arc<Shared>,
    source: Arc<dyn ProcessSource>,
    worker: Mutex<Option<Worker>>,
}

impl ProcessMonitor {
    /// Subscribe to `source` and start tracking, without window checks.
    ///
    /// A failed subscription is logged and leaves a monitor that always
    /// reports "not starting".
    pub fn start(source: Arc<dyn ProcessSource>, config: MonitorConfig) -> Self {
        Self::with_windows(source, Arc::new(replayer_core::NoWindows), config)
    }

    /// Like [`start`](Self::start), also treating a process as loaded
    /// once `windows` reports a visible window for it
    pub fn with_windows(
        source: Arc<dyn ProcessSource>,
        windows: Arc<dyn WindowInspector>,
        config: MonitorConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            snapshots: Mutex::new(Vec::new()),
            settle: config.settle_window,
            windows,
        });

        let worker = match source.subscribe() {
            Ok(events) => spawn_worker(shared.clone(), events),
            Err(e) => {
                warn!("Process monitor disabled: {}", e);
                None
            }
        };

        Self {
            shared,
            source,
            worker: Mutex::new(worker),
        }
    }

    /// Monitor polling the OS process table and checking window visibility
    pub fn platform(config: MonitorConfig) -> Self {
        let source = Arc::new(SysinfoSource::new(config.poll_interval));
        Self::with_windows(source, replayer_core::platform_window_inspector(), config)
    }

    /// Whether notifications are being received
    pub fn is_active(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// True while some process seen within the settle window is not yet loaded
    pub fn is_new_process_starting(&self) -> bool {
        self.shared.starting()
    }

    pub fn recent_processes(&self) -> Vec<ProcessSnapshot> {
        self.shared.live()
    }

    /// Block until nothing is starting. Returns `false` if `timeout` passed first.
    pub fn wait_until_settled(&self, timeout: Duration) -> bool {
        let started = Instant::now();
        loop {
            if !self.is_new_process_starting() {
                return true;
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return false;
            }
            thread::sleep(SETTLE_POLL.min(timeout - elapsed));
        }
    }

    pub fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        self.source.unsubscribe();
        let _ = worker.stop_tx.send(());
        let _ = worker.handle.join();
        info!("Process monitor stopped");
    }
}

fn spawn_worker(shared: Arc<Shared>, events: Receiver<ProcessEvent>) -> Option<Worker> {
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let spawned = thread::Builder::new()
        .name("process-monitor".into())
        .spawn(move || loop {
            select! {
                recv(events) -> event => match event {
                    Ok(event) => shared.observe(event),
                    Err(_) => break,
                },
                recv(stop_rx) -> _ => break,
            }
        });

    match spawned {
        Ok(handle) => {
            info!("Process monitor started");
            Some(Worker { stop_tx, handle })
        }
        Err(e) => {
            warn!("Process monitor disabled: {}", Error::subscription_failed(e));
            None
        }
    }
}

impl ReadinessGate for ProcessMonitor {
    fn is_busy(&self) -> bool {
        self.is_new_process_starting()
    }
}

impl Drop for ProcessMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
