//! replayer-recorder - record, sanitize and replay system-wide input
//!
//! Builds on the hooks and injection in `replayer-core`:
//!
//! - [`EventRecorder`] captures keyboard and mouse input into a [`RecordedLog`]
//! - [`sanitize`] closes modifier keys left down when recording stops
//! - [`Replayer`] plays a log back with constant pacing and optional repeat
//! - [`ProcessMonitor`] reports when new processes are still starting
//! - [`Session`] ties them together behind a single state machine
//!
//! [`RecordedLog`]: replayer_core::RecordedLog

pub mod config;
pub mod monitor;
pub mod recorder;
pub mod replay;
pub mod sanitize;
pub mod session;
pub mod speed;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::{data_dir, ReplayerConfig};
pub use monitor::{
    MonitorConfig, ProcessEvent, ProcessMonitor, ProcessSnapshot, ProcessSource, SysinfoSource,
};
pub use recorder::{CaptureHandler, EventRecorder, RecordMode, RecorderConfig};
pub use replay::{
    ReadinessGate, ReplayConfig, ReplayControl, ReplayOutcome, ReplayStats, Replayer,
};
pub use session::{Session, SessionState};
pub use speed::{SpeedController, SpeedSource};
pub use storage::LogStorage;

pub mod prelude {
    pub use crate::config::ReplayerConfig;
    pub use crate::monitor::ProcessMonitor;
    pub use crate::recorder::RecordMode;
    pub use crate::replay::{ReplayOutcome, ReplayStats};
    pub use crate::session::{Session, SessionState};
    pub use crate::storage::LogStorage;
}
