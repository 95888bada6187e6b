//! Append-only JSONL operation log

use crate::{Level, Observer, TracingObserver};
use chrono::{DateTime, Utc};
use error::Result;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One line of the JSONL log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub session_id: String,
    pub tool: String,
    pub data: serde_json::Value,
}

/// Writes every entry to `<dir>/codescout-YYYY-MM-DD.jsonl` and mirrors it to `tracing`
#[derive(Debug)]
pub struct JsonlObserver {
    file: Mutex<File>,
    path: PathBuf,
    session_id: String,
    console: TracingObserver,
}

impl JsonlObserver {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let path = dir.join(format!("codescout-{}.jsonl", Utc::now().format("%Y-%m-%d")));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut session_id = uuid::Uuid::new_v4().simple().to_string();
        session_id.truncate(8);

        Ok(Self {
            file: Mutex::new(file),
            path,
            session_id,
            console: TracingObserver,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn append(&self, entry: &LogEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| error::ScoutError::cache("log file lock poisoned"))?;
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}

impl Observer for JsonlObserver {
    fn log(&self, level: Level, tool: &str, message: &str, data: serde_json::Value) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            session_id: self.session_id.clone(),
            tool: tool.to_string(),
            data,
        };

        if let Err(e) = self.append(&entry) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write log entry");
        }

        self.console.log(level, tool, message, entry.data);
    }
}
