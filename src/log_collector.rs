//! Robust, decoupled logging pipeline for build runs.
//!
//! A single background thread owns every log file handle; callers never
//! block on disk. Two kinds of output flow through it:
//!
//! ```text
//! log::info!/warn!/error!          raw toolchain output lines
//!        |                                  |
//!   [BuildLog] (log::Log impl)     [BuildLog::tool_line]
//!        | (crossbeam channel - guaranteed delivery)
//!        v
//!   [writer thread]
//!        |-- session log:  <cwd>/logs/build_<ts>.log   (everything)
//!        `-- stage logs:   <proj_dir>/logs/<stage>.log (verbatim tool output)
//! ```
//!
//! Facade records are echoed to stderr at the call site of `log()`; raw
//! toolchain lines are echoed by the stage executor as it reads them, so the
//! writer thread only ever touches disk.

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{Log, Metadata, Record};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Internal log line or special marker
enum LogMessage {
    /// Timestamped line for the session log
    Line(LogLine),
    /// Verbatim toolchain output line, appended to `file` and the session log
    ToolLine { file: PathBuf, text: String },
    /// Flush marker with channel sender to signal completion
    Flush(std::sync::mpsc::Sender<()>),
}

/// A log line with metadata
#[derive(Clone, Debug)]
pub struct LogLine {
    /// The actual log message
    pub message: String,
    /// Timestamp of when the log was created
    pub timestamp: String,
}

impl LogLine {
    pub fn new(message: String) -> Self {
        LogLine {
            message,
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }
}

/// Get the global logs path relative to the current working directory: ./logs
pub fn get_global_logs_path() -> Result<PathBuf, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Failed to get current working directory: {}", e))?;
    Ok(cwd.join("logs"))
}

/// Per-stage log file path inside a build workspace.
pub fn stage_log_path(out_dir: &Path, stage_name: &str) -> PathBuf {
    out_dir.join("logs").join(format!("{}.log", stage_name))
}

/// Session logger with a background disk writer.
pub struct BuildLog {
    /// Channel sender for log lines - crossbeam unbounded, safe from any
    /// runtime or thread
    tx: Sender<LogMessage>,
    /// Path of the session log file
    session_path: PathBuf,
}

impl BuildLog {
    /// Create a new BuildLog writing its session file under `log_dir`.
    ///
    /// Spawns the background writer thread. Stage log files are created
    /// lazily when the first line for them arrives; each is truncated on
    /// first open so a re-run overwrites the previous run's log.
    pub fn new(log_dir: PathBuf) -> Result<Self, String> {
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| format!("Failed to create logs directory: {}", e))?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let session_path = log_dir.join(format!("build_{}.log", timestamp));
        let session_file = File::create(&session_path)
            .map_err(|e| format!("Failed to create session log: {}", e))?;

        let (tx, rx) = unbounded::<LogMessage>();

        // Background thread, not a tokio task: blocking recv() is safe here
        // and keeps every write off the async runtime.
        std::thread::spawn(move || {
            let mut session = session_file;
            let mut stage_handles: HashMap<PathBuf, File> = HashMap::new();

            while let Ok(msg) = rx.recv() {
                match msg {
                    LogMessage::Line(line) => {
                        let formatted = format!("[{}] {}\n", line.timestamp, line.message);
                        let _ = session.write_all(formatted.as_bytes());
                        let _ = session.flush();
                    }
                    LogMessage::ToolLine { file, text } => {
                        if !stage_handles.contains_key(&file) {
                            if let Some(parent) = file.parent() {
                                let _ = std::fs::create_dir_all(parent);
                            }
                            // First line for this stage truncates the file.
                            match File::create(&file) {
                                Ok(handle) => {
                                    stage_handles.insert(file.clone(), handle);
                                }
                                Err(e) => {
                                    eprintln!(
                                        "[Log] Failed to create stage log '{}': {}",
                                        file.display(),
                                        e
                                    );
                                }
                            }
                        }
                        if let Some(handle) = stage_handles.get_mut(&file) {
                            let _ = handle.write_all(text.as_bytes());
                            let _ = handle.write_all(b"\n");
                        }
                        let stamped = format!(
                            "[{}] {}\n",
                            Local::now().format("%H:%M:%S%.3f"),
                            text
                        );
                        let _ = session.write_all(stamped.as_bytes());
                    }
                    LogMessage::Flush(done) => {
                        let _ = session.flush();
                        for handle in stage_handles.values_mut() {
                            let _ = handle.flush();
                        }
                        let _ = done.send(());
                    }
                }
            }
        });

        Ok(BuildLog { tx, session_path })
    }

    /// Path of the session log file.
    pub fn session_log_path(&self) -> &Path {
        &self.session_path
    }

    /// Send a log line (non-blocking, cannot fail - unbounded channel).
    pub fn log_str(&self, message: impl Into<String>) {
        let _ = self.tx.send(LogMessage::Line(LogLine::new(message.into())));
    }

    /// Append a verbatim toolchain output line to a stage log file.
    pub fn tool_line(&self, stage_log: &Path, text: impl Into<String>) {
        let _ = self.tx.send(LogMessage::ToolLine {
            file: stage_log.to_path_buf(),
            text: text.into(),
        });
    }

    /// Wait for all pending lines to be durably written.
    ///
    /// Sends a flush marker down the channel and waits for the writer thread
    /// to process it. Call before exiting so the final lines reach disk.
    pub async fn wait_for_empty(&self) -> Result<(), String> {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        self.tx
            .send(LogMessage::Flush(tx))
            .map_err(|e| format!("Failed to send flush marker: {}", e))?;
        rx.recv()
            .map_err(|e| format!("Flush signal interrupted: {}", e))?;
        Ok(())
    }
}

impl Clone for BuildLog {
    fn clone(&self) -> Self {
        BuildLog {
            tx: self.tx.clone(),
            session_path: self.session_path.clone(),
        }
    }
}

/// Implementation of the `log` crate's Log trait.
/// Wires log::info!(), log::warn!(), log::error!() into the session log and
/// echoes them to stderr.
impl Log for BuildLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!("[{}] {}", record.level(), record.args());
            eprintln!("{}", message);
            self.log_str(message);
        }
    }

    fn flush(&self) {
        // Writer thread flushes after every session line.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_log_creates_session_file() {
        let dir = TempDir::new().unwrap();
        let log = BuildLog::new(dir.path().join("logs")).unwrap();
        assert!(log.session_log_path().exists());
    }

    #[tokio::test]
    async fn test_lines_reach_session_log() {
        let dir = TempDir::new().unwrap();
        let log = BuildLog::new(dir.path().join("logs")).unwrap();

        for i in 0..100 {
            log.log_str(format!("line {}", i));
        }
        log.wait_for_empty().await.unwrap();

        let content = fs::read_to_string(log.session_log_path()).unwrap();
        assert!(content.contains("line 0"));
        assert!(content.contains("line 99"));
    }

    #[tokio::test]
    async fn test_tool_lines_reach_stage_file() {
        let dir = TempDir::new().unwrap();
        let log = BuildLog::new(dir.path().join("logs")).unwrap();
        let stage_log = stage_log_path(dir.path(), "synthesis");

        log.tool_line(&stage_log, "Starting synth_design");
        log.tool_line(&stage_log, "synth_1 finished");
        log.wait_for_empty().await.unwrap();

        let content = fs::read_to_string(&stage_log).unwrap();
        assert!(content.contains("Starting synth_design"));
        assert!(content.contains("synth_1 finished"));
        // Session log carries a stamped copy too.
        let session = fs::read_to_string(log.session_log_path()).unwrap();
        assert!(session.contains("synth_1 finished"));
    }
}
