//! Recording/replay session
//!
//! The entry points a trigger layer (hotkeys, buttons, a CLI) drives. The
//! session is in exactly one of three states and recording and replay can
//! never overlap: the state is a single tagged value, not a pair of flags.

use crate::config::ReplayerConfig;
use crate::monitor::ProcessMonitor;
use crate::recorder::{EventRecorder, RecordMode, RecorderConfig};
use crate::replay::{ReplayConfig, ReplayControl, ReplayStats, Replayer};
use crate::speed::SpeedController;
use replayer_core::{Error, HookManager, InputSink, RecordedLog, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Replaying,
}

impl SessionState {
    fn describe(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Replaying => "replaying",
        }
    }
}

struct ActiveReplay {
    control: Arc<ReplayControl>,
    handle: JoinHandle<Result<ReplayStats>>,
}

enum Mode {
    Idle,
    Recording(EventRecorder),
    Replaying(ActiveReplay),
}

pub struct Session {
    hooks: HookManager,
    sink: Arc<dyn InputSink>,
    mode: Mode,
    /// Final log. Shared read-only with the replay thread.
    log: Arc<RecordedLog>,
    speed: SpeedController,
    repeat: Arc<AtomicBool>,
    recorder_config: RecorderConfig,
    grace_period: Duration,
    monitor: Option<Arc<ProcessMonitor>>,
    gate_on_processes: bool,
    readiness_timeout: Duration,
    last_replay: Option<Result<ReplayStats>>,
}

impl Session {
    pub fn new(hooks: HookManager, sink: Arc<dyn InputSink>) -> Self {
        let defaults = ReplayerConfig::default();
        Self {
            hooks,
            sink,
            mode: Mode::Idle,
            log: Arc::new(RecordedLog::default()),
            speed: SpeedController::with_default(defaults.speed_ms),
            repeat: Arc::new(AtomicBool::new(false)),
            recorder_config: defaults.recorder(),
            grace_period: defaults.replay().grace_period,
            monitor: None,
            gate_on_processes: false,
            readiness_timeout: defaults.readiness_timeout(),
            last_replay: None,
        }
    }

    /// Session using the current platform's hooks and input injection
    pub fn platform() -> Self {
        Self::new(HookManager::platform(), replayer_core::platform_input())
    }

    pub fn with_config(mut self, config: &ReplayerConfig) -> Self {
        self.speed = SpeedController::with_default(config.speed_ms);
        self.recorder_config = config.recorder();
        self.grace_period = config.replay().grace_period;
        self.readiness_timeout = config.readiness_timeout();
        self
    }

    /// Attach a process monitor. With `gate` set, replay holds each action
    /// while a new process is starting.
    pub fn with_monitor(mut self, monitor: Arc<ProcessMonitor>, gate: bool) -> Self {
        self.monitor = Some(monitor);
        self.gate_on_processes = gate;
        self
    }

    pub fn state(&self) -> SessionState {
        match &self.mode {
            Mode::Idle => SessionState::Idle,
            Mode::Recording(_) => SessionState::Recording,
            Mode::Replaying(active) if active.handle.is_finished() => SessionState::Idle,
            Mode::Replaying(_) => SessionState::Replaying,
        }
    }

    /// Current log. While recording this is the log being captured into.
    pub fn log(&self) -> &RecordedLog {
        match &self.mode {
            Mode::Recording(recorder) => recorder.log(),
            _ => self.log.as_ref(),
        }
    }

    /// Replace the log with one loaded from elsewhere. Only legal while idle.
    pub fn load_log(&mut self, log: RecordedLog) -> Result<()> {
        self.reap();
        let state = self.state();
        if state != SessionState::Idle {
            return Err(Error::mode_conflict("load a log", state.describe()));
        }
        info!("Loaded log '{}' with {} events", log.name, log.events.len());
        self.log = Arc::new(log);
        Ok(())
    }

    pub fn start_recording(&mut self, mode: RecordMode) -> Result<()> {
        self.reap();
        match self.state() {
            SessionState::Replaying => {
                return Err(Error::mode_conflict("start recording", "replaying"))
            }
            SessionState::Recording => return Err(Error::invalid_state("Already recording")),
            SessionState::Idle => {}
        }

        // The current log stays untouched until the hooks are in
        let log = match mode {
            RecordMode::Fresh => RecordedLog::new(self.log.name.clone()),
            RecordMode::Append => (*self.log).clone(),
        };
        let recorder = EventRecorder::start(&self.hooks, log, self.recorder_config.clone())?;
        self.mode = Mode::Recording(recorder);
        Ok(())
    }

    /// Pull captured input into the log. Returns the number of new events.
    pub fn drain(&mut self) -> usize {
        match &mut self.mode {
            Mode::Recording(recorder) => recorder.drain(),
            _ => 0,
        }
    }

    /// Stop capturing and finalize the log
    pub fn stop_recording(&mut self) -> Result<&RecordedLog> {
        match std::mem::replace(&mut self.mode, Mode::Idle) {
            Mode::Recording(recorder) => {
                self.log = Arc::new(recorder.stop(&self.hooks));
                Ok(self.log.as_ref())
            }
            other => {
                self.mode = other;
                Err(Error::invalid_state("Not recording"))
            }
        }
    }

    /// Start replaying the current log on a background thread
    pub fn start_replay(&mut self) -> Result<()> {
        self.reap();
        match self.state() {
            SessionState::Recording => {
                return Err(Error::mode_conflict("start replay", "recording"))
            }
            SessionState::Replaying => return Err(Error::invalid_state("Already replaying")),
            SessionState::Idle => {}
        }
        if self.log.events.is_empty() {
            return Err(Error::nothing_to_replay());
        }

        let mut replayer = Replayer::new(self.sink.clone()).config(ReplayConfig {
            delay: self.speed.effective_delay(),
            grace_period: self.grace_period,
        });
        if let (true, Some(monitor)) = (self.gate_on_processes, &self.monitor) {
            replayer = replayer.gate(monitor.clone(), self.readiness_timeout);
        }

        let control = Arc::new(ReplayControl::new(self.repeat.clone()));
        let log = self.log.clone();
        let thread_control = control.clone();
        let handle = thread::Builder::new()
            .name("replay".into())
            .spawn(move || {
                let result = replayer.play(&log.events, &thread_control);
                if let Err(e) = &result {
                    error!("Replay aborted: {}", e);
                }
                result
            })?;

        self.last_replay = None;
        self.mode = Mode::Replaying(ActiveReplay { control, handle });
        Ok(())
    }

    /// Ask a running replay to stop. Returns whether a replay was running.
    pub fn cancel_replay(&mut self) -> bool {
        match &self.mode {
            Mode::Replaying(active) if !active.handle.is_finished() => {
                active.control.cancel();
                info!("Replay cancel requested");
                true
            }
            _ => false,
        }
    }

    /// Block until the running replay ends and return its result.
    ///
    /// When idle, returns the result of the last finished replay, if any.
    pub fn wait_for_replay(&mut self) -> Option<Result<ReplayStats>> {
        if let Mode::Replaying(_) = self.mode {
            if let Mode::Replaying(active) = std::mem::replace(&mut self.mode, Mode::Idle) {
                self.last_replay = Some(join_replay(active));
            }
        }
        self.last_replay.take()
    }

    /// Flip repeat mode. Takes effect at the next event boundary of a running replay.
    pub fn toggle_repeat(&mut self) -> bool {
        let enabled = !self.repeat.load(Ordering::SeqCst);
        self.repeat.store(enabled, Ordering::SeqCst);
        info!("Repeat {}", if enabled { "on" } else { "off" });
        enabled
    }

    pub fn repeat_enabled(&self) -> bool {
        self.repeat.load(Ordering::SeqCst)
    }

    pub fn set_speed_from_control(&mut self, value: f64) -> u64 {
        self.speed.set_from_control(value)
    }

    pub fn set_speed_from_text(&mut self, text: &str) -> Result<u64> {
        self.speed.set_from_text(text)
    }

    pub fn speed(&self) -> &SpeedController {
        &self.speed
    }

    /// False when no monitor is attached
    pub fn is_new_process_starting(&self) -> bool {
        self.monitor
            .as_ref()
            .is_some_and(|m| m.is_new_process_starting())
    }

    /// Collect a replay thread that has already finished
    fn reap(&mut self) {
        let finished = matches!(&self.mode, Mode::Replaying(a) if a.handle.is_finished());
        if !finished {
            return;
        }
        if let Mode::Replaying(active) = std::mem::replace(&mut self.mode, Mode::Idle) {
            self.last_replay = Some(join_replay(active));
        }
    }
}

fn join_replay(active: ActiveReplay) -> Result<ReplayStats> {
    match active.handle.join() {
        Ok(result) => result,
        Err(_) => Err(Error::invalid_state("Replay thread panicked")),
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.mode, Mode::Idle) {
            Mode::Replaying(active) => {
                active.control.cancel();
                let _ = join_replay(active);
            }
            Mode::Recording(recorder) => {
                warn!("Session dropped while recording, discarding capture");
                recorder.stop(&self.hooks);
            }
            Mode::Idle => {}
        }
    }
}
