//! # replayer
//!
//! Record what you do with the keyboard and mouse, then do it again.
//!
//! ## Features
//!
//! - **Recording**: system-wide low-level hooks, every event kept
//! - **Sanitizing**: modifiers held at stop time are released in the log
//! - **Replay**: constant pacing, repeat looping, prompt cancellation
//! - **Readiness**: optional wait while newly started processes settle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use replayer::prelude::*;
//!
//! let mut session = Session::platform();
//! session.start_recording(RecordMode::Fresh)?;
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! session.stop_recording()?;
//!
//! session.set_speed_from_text("50")?;
//! session.start_replay()?;
//! if let Some(stats) = session.wait_for_replay() {
//!     println!("{:?}", stats?);
//! }
//! # Ok::<(), replayer::Error>(())
//! ```

// Re-export core types
pub use replayer_core::*;

// Re-export the engine
pub use replayer_recorder as recorder;

pub use replayer_recorder::{
    data_dir, LogStorage, ProcessMonitor, RecordMode, ReplayOutcome, ReplayStats, ReplayerConfig,
    Session, SessionState,
};

/// Prelude - import everything you need
pub mod prelude {
    pub use replayer_core::prelude::*;
    pub use replayer_recorder::prelude::*;
}
