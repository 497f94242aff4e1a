//! ir - input replayer CLI
//!
//! Record system-wide keyboard and mouse input to a log, then replay it.
//!
//! Supported: Windows

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use replayer::prelude::*;
use replayer::data_dir;

#[derive(Parser)]
#[command(name = "ir")]
#[command(about = "Input replayer - record and replay keyboard and mouse input")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record keyboard and mouse input until Ctrl+C
    Record {
        #[arg(short, long)]
        name: Option<String>,
        /// Extend an existing log instead of starting a new one
        #[arg(long)]
        append: Option<String>,
    },
    /// Replay a recorded log
    Replay {
        file: String,
        /// Delay before each action, in whole milliseconds
        #[arg(short, long)]
        speed: Option<String>,
        /// Loop until Ctrl+C
        #[arg(long)]
        repeat: bool,
        /// Hold actions while newly started processes settle
        #[arg(long)]
        wait_for_processes: bool,
    },
    /// List saved logs
    List,
    /// Show log info
    Show {
        file: String,
        #[arg(long)]
        all: bool,
    },
    /// Delete a log
    Delete { file: String },
    /// Watch for starting processes
    Watch {
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<()> = match cli.command {
        Commands::Record { name, append } => record(name, append),
        Commands::Replay {
            file,
            speed,
            repeat,
            wait_for_processes,
        } => replay(&file, speed.as_deref(), repeat, wait_for_processes),
        Commands::List => list(),
        Commands::Show { file, all } => show(&file, all),
        Commands::Delete { file } => delete(&file),
        Commands::Watch { seconds } => watch(seconds),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if let Some(err) = e.downcast_ref::<Error>() {
            for hint in &err.suggestions {
                eprintln!("  hint: {}", hint);
            }
        }
        std::process::exit(1);
    }
}

fn setup() -> Result<(ReplayerConfig, LogStorage)> {
    let dir = data_dir()?;
    let config = ReplayerConfig::load(&dir)?;
    let storage = LogStorage::with_dir(&dir)?;
    debug!("Data directory: {}", dir.display());
    Ok((config, storage))
}

/// Flag cleared by Ctrl+C
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}

// ── Recording ───────────────────────────────────────────────────────────────

fn record(name: Option<String>, append: Option<String>) -> Result<()> {
    let (config, storage) = setup()?;
    let mut session = Session::platform().with_config(&config);

    let mode = match &append {
        Some(file) => {
            session.load_log(storage.load(file)?)?;
            RecordMode::Append
        }
        None => RecordMode::Fresh,
    };

    let running = interrupt_flag()?;
    session.start_recording(mode)?;
    println!(
        "Recording{} (Ctrl+C to stop)",
        if append.is_some() { " (append)" } else { "" }
    );

    while running.load(Ordering::SeqCst) {
        if session.drain() > 0 {
            print!("\r{} events", session.log().len());
            io::stdout().flush()?;
        }
        thread::sleep(Duration::from_millis(50));
    }

    let mut log = session.stop_recording()?.clone();
    if let Some(name) = name {
        log.name = name;
    }
    println!("\n{} events recorded", log.len());

    let path = match &append {
        Some(file) => {
            let path = storage.resolve(file);
            storage.save_to(&log, &path)?;
            path
        }
        None => storage.save(&log)?,
    };
    println!("Saved: {}", path.display());
    Ok(())
}

// ── Replay ──────────────────────────────────────────────────────────────────

fn replay(file: &str, speed: Option<&str>, repeat: bool, wait_for_processes: bool) -> Result<()> {
    let (config, storage) = setup()?;
    let log = storage.load(file)?;

    let mut session = Session::platform().with_config(&config);
    if wait_for_processes {
        let monitor = Arc::new(ProcessMonitor::platform(config.monitor()));
        session = session.with_monitor(monitor, true);
    }
    if let Some(text) = speed {
        session.set_speed_from_text(text)?;
    }
    if repeat {
        session.toggle_repeat();
    }
    session.load_log(log)?;

    let log = session.log();
    println!(
        "Replaying {} ({} events), {}ms between actions{}",
        log.name,
        log.len(),
        session.speed().delay_ms(),
        if repeat { ", repeating" } else { "" }
    );
    println!("Starting in 2 seconds... (Ctrl+C to stop)");

    let running = interrupt_flag()?;
    thread::sleep(Duration::from_secs(2));
    if !running.load(Ordering::SeqCst) {
        println!("Cancelled");
        return Ok(());
    }

    session.start_replay()?;
    while session.state() == SessionState::Replaying {
        if !running.load(Ordering::SeqCst) {
            session.cancel_replay();
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    match session.wait_for_replay() {
        Some(Ok(stats)) => {
            let status = match stats.outcome {
                ReplayOutcome::Completed => "Done",
                ReplayOutcome::Cancelled => "Cancelled",
                ReplayOutcome::RepeatStopped => "Stopped repeating",
            };
            println!(
                "{}! {} pass(es), {} moves, {} clicks, {} keys",
                status, stats.passes, stats.moves, stats.clicks, stats.keys
            );
            Ok(())
        }
        Some(Err(e)) => Err(e.into()),
        None => Ok(()),
    }
}

// ── Storage ─────────────────────────────────────────────────────────────────

fn list() -> Result<()> {
    let (_, storage) = setup()?;
    let files = storage.list()?;
    if files.is_empty() {
        println!("No logs saved in {}", storage.path().display());
    } else {
        for f in files {
            println!("{}", f);
        }
    }
    Ok(())
}

fn show(file: &str, all: bool) -> Result<()> {
    let (_, storage) = setup()?;
    let log = storage.load(file)?;
    println!("Name: {}", log.name);
    println!("Events: {}", log.len());

    let (mut moves, mut left, mut right, mut presses, mut releases) = (0, 0, 0, 0, 0);
    for e in &log.events {
        match e.kind {
            EventKind::MouseMove => moves += 1,
            EventKind::MouseLeftClick => left += 1,
            EventKind::MouseRightClick => right += 1,
            EventKind::KeyPress => presses += 1,
            EventKind::KeyRelease => releases += 1,
        }
    }
    println!(
        "\nSummary: {} moves, {} left clicks, {} right clicks, {} key presses, {} key releases",
        moves, left, right, presses, releases
    );
    if let (Some(first), Some(last)) = (log.events.first(), log.events.last()) {
        println!("Span: {}", last.timestamp - first.timestamp);
    }

    if all {
        for (i, e) in log.events.iter().enumerate() {
            println!("{}: {}", i, serde_json::to_string(e)?);
        }
    }
    Ok(())
}

fn delete(file: &str) -> Result<()> {
    let (_, storage) = setup()?;
    storage.delete(file)?;
    println!("Deleted: {}", file);
    Ok(())
}

// ── Process monitor ─────────────────────────────────────────────────────────

fn watch(seconds: Option<u64>) -> Result<()> {
    let (config, _) = setup()?;
    let monitor = ProcessMonitor::platform(config.monitor());
    if !monitor.is_active() {
        println!("Process notifications unavailable, new processes will not be detected");
    }

    let running = interrupt_flag()?;
    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    println!("Watching for new processes (Ctrl+C to stop)");

    let mut seen = HashSet::new();
    let mut busy = false;
    while running.load(Ordering::SeqCst) && deadline.map_or(true, |d| Instant::now() < d) {
        for p in monitor.recent_processes() {
            if seen.insert((p.pid, p.start_time)) {
                println!("+ {} ({}) started {}", p.name, p.pid, p.start_time.format("%H:%M:%S"));
            }
        }
        let starting = monitor.is_new_process_starting();
        if starting != busy {
            busy = starting;
            println!("{}", if busy { "settling..." } else { "ready" });
        }
        thread::sleep(Duration::from_millis(100));
    }

    monitor.stop();
    Ok(())
}
