//! Paced replay of a recorded log
//!
//! Every discrete action (click, key transition) is preceded by one wait of
//! the configured delay. Runs of pointer moves are replayed back to back and
//! the wait is taken once at the boundary where the run ends, standing in
//! for the wait of the action that follows. Recorded timestamps are not used
//! for pacing.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use replayer_core::{ButtonState, Error, EventKind, InputEvent, InputSink, MouseButton, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::speed::DEFAULT_DELAY_MS;

/// Settle time after the last action of a pass
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(2000);

const GATE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Wait before each discrete action
    pub delay: Duration,
    pub grace_period: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

/// Shared between the replay thread and whoever may cancel it
pub struct ReplayControl {
    cancelled: AtomicBool,
    repeat: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl ReplayControl {
    pub fn new(repeat: Arc<AtomicBool>) -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            cancelled: AtomicBool::new(false),
            repeat,
            wake_tx,
            wake_rx,
        }
    }

    /// Control with its own repeat flag, initially off
    pub fn standalone() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation. Honored at the next event boundary; a wait in
    /// progress is cut short.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.wake_tx.try_send(());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn repeat_enabled(&self) -> bool {
        self.repeat.load(Ordering::SeqCst)
    }

    pub fn set_repeat(&self, enabled: bool) {
        self.repeat.store(enabled, Ordering::SeqCst);
    }

    /// Sleep for `duration` unless cancelled first. Returns `false` when cancelled.
    pub fn pause(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }

        // No deadline means the delay is too large to represent: wait for cancel
        let deadline = Instant::now().checked_add(duration);
        loop {
            let woke = match deadline {
                Some(deadline) => self.wake_rx.recv_deadline(deadline),
                None => self
                    .wake_rx
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };
            match woke {
                Ok(()) if self.is_cancelled() => return false,
                Ok(()) => continue,
                Err(_) => return !self.is_cancelled(),
            }
        }
    }
}

/// Something that can tell whether the desktop is still settling
pub trait ReadinessGate: Send + Sync {
    fn is_busy(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Completed,
    Cancelled,
    /// Repeat was switched off while looping
    RepeatStopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    pub passes: usize,
    pub moves: usize,
    pub clicks: usize,
    pub keys: usize,
    /// Total inter-event wait requested, grace periods excluded
    pub paced: Duration,
    pub outcome: ReplayOutcome,
}

impl Default for ReplayStats {
    fn default() -> Self {
        Self {
            passes: 0,
            moves: 0,
            clicks: 0,
            keys: 0,
            paced: Duration::ZERO,
            outcome: ReplayOutcome::Completed,
        }
    }
}

enum PassEnd {
    Finished,
    Cancelled,
    RepeatStopped,
}

/// Replay recorded logs through an [`InputSink`]
pub struct Replayer {
    sink: Arc<dyn InputSink>,
    config: ReplayConfig,
    gate: Option<(Arc<dyn ReadinessGate>, Duration)>,
}

impl Replayer {
    pub fn new(sink: Arc<dyn InputSink>) -> Self {
        Self {
            sink,
            config: ReplayConfig::default(),
            gate: None,
        }
    }

    pub fn config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.config.grace_period = grace_period;
        self
    }

    /// Hold each discrete action while `gate` reports busy, for at most `timeout`
    pub fn gate(mut self, gate: Arc<dyn ReadinessGate>, timeout: Duration) -> Self {
        self.gate = Some((gate, timeout));
        self
    }

    /// Replay `events`, looping while repeat is enabled.
    ///
    /// Blocks the calling thread; run it off any hook dispatch thread.
    pub fn play(&self, events: &[InputEvent], control: &ReplayControl) -> Result<ReplayStats> {
        if events.is_empty() {
            return Err(Error::nothing_to_replay());
        }

        let mut stats = ReplayStats::default();
        info!(
            "Replaying {} events, delay {}ms",
            events.len(),
            self.config.delay.as_millis()
        );

        loop {
            stats.passes += 1;
            let repeating = stats.passes > 1;

            match self.play_pass(events, control, repeating, &mut stats)? {
                PassEnd::Finished => {}
                PassEnd::Cancelled => {
                    stats.outcome = ReplayOutcome::Cancelled;
                    break;
                }
                PassEnd::RepeatStopped => {
                    stats.outcome = ReplayOutcome::RepeatStopped;
                    break;
                }
            }

            if !control.pause(self.config.grace_period) {
                stats.outcome = ReplayOutcome::Cancelled;
                break;
            }

            if !control.repeat_enabled() {
                if repeating {
                    stats.outcome = ReplayOutcome::RepeatStopped;
                }
                break;
            }
            debug!("Repeat enabled, starting pass {}", stats.passes + 1);
        }

        info!(
            "Replay finished: {:?} after {} pass(es), {} moves, {} clicks, {} keys",
            stats.outcome, stats.passes, stats.moves, stats.clicks, stats.keys
        );
        Ok(stats)
    }

    fn play_pass(
        &self,
        events: &[InputEvent],
        control: &ReplayControl,
        repeating: bool,
        stats: &mut ReplayStats,
    ) -> Result<PassEnd> {
        for (i, event) in events.iter().enumerate() {
            if control.is_cancelled() {
                return Ok(PassEnd::Cancelled);
            }
            if repeating && !control.repeat_enabled() {
                return Ok(PassEnd::RepeatStopped);
            }

            match event.kind {
                EventKind::MouseMove => {
                    self.sink
                        .set_cursor_position(event.position_x, event.position_y)?;
                    stats.moves += 1;

                    let run_ends = matches!(events.get(i + 1), Some(next) if next.kind != EventKind::MouseMove);
                    if run_ends && !self.wait(control, stats) {
                        return Ok(PassEnd::Cancelled);
                    }
                }
                EventKind::MouseLeftClick | EventKind::MouseRightClick => {
                    if !self.before_action(events, i, control, stats) {
                        return Ok(PassEnd::Cancelled);
                    }
                    let button = if event.kind == EventKind::MouseLeftClick {
                        MouseButton::Left
                    } else {
                        MouseButton::Right
                    };
                    self.sink
                        .set_cursor_position(event.position_x, event.position_y)?;
                    self.sink.click(button)?;
                    stats.clicks += 1;
                }
                EventKind::KeyPress | EventKind::KeyRelease => {
                    if !self.before_action(events, i, control, stats) {
                        return Ok(PassEnd::Cancelled);
                    }
                    let state = if event.kind == EventKind::KeyPress {
                        ButtonState::Down
                    } else {
                        ButtonState::Up
                    };
                    self.sink
                        .key(event.virtual_key_code, state, event.is_extended_key)?;
                    stats.keys += 1;
                }
            }
        }

        Ok(PassEnd::Finished)
    }

    /// Pace and gate the discrete action at `i`. A preceding move run
    /// already waited on its behalf.
    fn before_action(
        &self,
        events: &[InputEvent],
        i: usize,
        control: &ReplayControl,
        stats: &mut ReplayStats,
    ) -> bool {
        let after_moves = i > 0 && events[i - 1].kind == EventKind::MouseMove;
        if !after_moves && !self.wait(control, stats) {
            return false;
        }
        self.await_readiness(control)
    }

    fn wait(&self, control: &ReplayControl, stats: &mut ReplayStats) -> bool {
        stats.paced += self.config.delay;
        control.pause(self.config.delay)
    }

    fn await_readiness(&self, control: &ReplayControl) -> bool {
        let Some((gate, timeout)) = &self.gate else {
            return true;
        };

        let started = Instant::now();
        while gate.is_busy() {
            let elapsed = started.elapsed();
            if elapsed >= *timeout {
                warn!("Still waiting for new processes after {:?}, continuing", timeout);
                break;
            }
            if !control.pause(GATE_POLL.min(*timeout - elapsed)) {
                return false;
            }
        }
        true
    }
}
