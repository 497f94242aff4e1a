//! Log storage - JSON lines, one event per line

use replayer_core::{Error, InputEvent, RecordedLog, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// First line of every log file
#[derive(Debug, Serialize, Deserialize)]
struct LogHeader {
    name: String,
    events: usize,
}

/// Serialize a log: metadata line, then one record per event
pub fn encode(log: &RecordedLog) -> Result<String> {
    let mut out = serde_json::to_string(&LogHeader {
        name: log.name.clone(),
        events: log.events.len(),
    })?;
    out.push('\n');
    for e in &log.events {
        out.push_str(&serde_json::to_string(e)?);
        out.push('\n');
    }
    Ok(out)
}

/// Parse a log. Any malformed record, including an unknown `type`, rejects the whole input.
pub fn decode(text: &str) -> Result<RecordedLog> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

    let (_, header_line) = lines
        .by_ref()
        .find(|(_, l)| !l.trim().is_empty())
        .ok_or_else(|| Error::structural(1, "missing metadata line"))?;
    let header: LogHeader =
        serde_json::from_str(header_line).map_err(|e| Error::structural(1, e))?;

    let mut events = Vec::with_capacity(header.events);
    for (n, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let e: InputEvent = serde_json::from_str(line).map_err(|e| Error::structural(n, e))?;
        events.push(e);
    }

    if events.len() != header.events {
        return Err(Error::structural(
            1,
            format!(
                "metadata declares {} events, found {}",
                header.events,
                events.len()
            ),
        ));
    }

    Ok(RecordedLog {
        name: header.name,
        events,
    })
}

pub struct LogStorage {
    dir: PathBuf,
}

impl LogStorage {
    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Save as `<name>_<timestamp>.jsonl`
    pub fn save(&self, log: &RecordedLog) -> Result<PathBuf> {
        let ts = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("{}_{}.jsonl", sanitize(&log.name), ts);
        let path = self.dir.join(&filename);
        self.save_to(log, &path)?;
        Ok(path)
    }

    /// Overwrite `path` with `log`
    pub fn save_to(&self, log: &RecordedLog, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        w.write_all(encode(log)?.as_bytes())?;
        w.flush()?;
        debug!("Saved {} events to {}", log.events.len(), path.display());
        Ok(())
    }

    /// Load by file name in the storage directory, or by path
    pub fn load(&self, file: &str) -> Result<RecordedLog> {
        let path = self.resolve(file);
        let text = fs::read_to_string(&path).map_err(|e| {
            Error::from(e).with_suggestions(vec![format!(
                "Run `ir list` to see logs in {}",
                self.dir.display()
            )])
        })?;
        decode(&text)
    }

    /// All `.jsonl` files in the storage directory, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(s) = name.to_str() {
                if s.ends_with(".jsonl") {
                    files.push(s.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn delete(&self, file: &str) -> Result<()> {
        fs::remove_file(self.resolve(file))?;
        Ok(())
    }

    /// A bare file name refers to the storage directory; anything else is a path
    pub fn resolve(&self, file: &str) -> PathBuf {
        let given = Path::new(file);
        if given.components().count() > 1 || given.is_absolute() {
            given.to_path_buf()
        } else {
            self.dir.join(given)
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use replayer_core::{vk, ErrorCode};

    fn sample() -> RecordedLog {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut log = RecordedLog::new("open \"notes\"");
        log.events = vec![
            InputEvent::mouse_move(-5, 1080, t),
            InputEvent::left_click(10, 20, t),
            InputEvent::right_click(30, 40, t),
            InputEvent::key_press(vk::RCONTROL, true, t),
            InputEvent::key_release(vk::RCONTROL, true, t),
        ];
        log
    }

    #[test]
    fn round_trip_preserves_everything() {
        let log = sample();
        assert_eq!(decode(&encode(&log).unwrap()).unwrap(), log);
    }

    #[test]
    fn header_then_one_line_per_event() {
        let text = encode(&sample()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        let header: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(header["events"], 5);
        assert!(lines[2].contains(r#""type":"MouseLeftClick""#));
    }

    #[test]
    fn unknown_type_rejects_whole_log() {
        let text = encode(&sample())
            .unwrap()
            .replace("MouseRightClick", "MouseMiddleClick");
        let err = decode(&text).unwrap_err();
        assert_eq!(err.code, ErrorCode::StructuralError);
        assert!(err.message.contains("line 4"), "{}", err.message);
    }

    #[test]
    fn truncated_log_is_rejected() {
        let text = encode(&sample()).unwrap();
        let cut: String = text.lines().take(3).map(|l| format!("{l}\n")).collect();
        assert_eq!(decode(&cut).unwrap_err().code, ErrorCode::StructuralError);
        assert_eq!(decode("").unwrap_err().code, ErrorCode::StructuralError);
    }

    #[test]
    fn storage_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LogStorage::with_dir(dir.path().join("logs")).unwrap();

        let path = storage.save(&sample()).unwrap();
        let file = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(file.starts_with("open__notes__"));

        assert_eq!(storage.list().unwrap(), vec![file.clone()]);
        assert_eq!(storage.load(&file).unwrap(), sample());
        assert_eq!(storage.load(path.to_str().unwrap()).unwrap(), sample());

        storage.delete(&file).unwrap();
        assert!(storage.list().unwrap().is_empty());
        assert_eq!(storage.load(&file).unwrap_err().code, ErrorCode::Io);
    }
}
