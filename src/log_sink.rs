use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use eframe::egui::Context;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// first line of a fresh log file
pub const LOG_FILE_HEADER: &str = "log file created";

/// Where every status and error line ends up.
///
/// Each line is appended to the log file (opened and closed per write, the file is
/// truncated once when the sink is created) and mirrored into an in memory buffer
/// that the log window renders. Cloning is cheap, every component gets its own handle.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    lines: Mutex<Vec<String>>,
    // set once the gui is up so new lines wake the log window
    ctx: OnceLock<Context>,
}

impl LogSink {
    /// truncates (or creates) the log file at `path`
    ///
    /// # Errors
    /// if the log file can't be written
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, format!("{LOG_FILE_HEADER}\n"))?;
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                lines: Mutex::new(Vec::new()),
                ctx: OnceLock::new(),
            }),
        })
    }

    /// registers this sink as the backend of the `log` facade
    ///
    /// # Errors
    /// if another logger was installed already
    pub fn install(&self) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(self.clone()))?;
        log::set_max_level(LevelFilter::Info);
        Ok(())
    }

    pub fn attach_context(&self, ctx: &Context) {
        if self.inner.ctx.set(ctx.clone()).is_ok() {
            // lines may have been logged before the window existed
            ctx.request_repaint();
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.write(Level::Info, &message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.write(Level::Warn, &message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.write(Level::Error, &message);
    }

    pub fn write(&self, level: Level, message: &dyn fmt::Display) {
        let line = format!(
            "[{} {level:<5}] {message}",
            chrono::Local::now().format("%H:%M:%S")
        );
        // held across both writes so the window and the file agree on the order
        let mut lines = self
            .inner
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.append_to_file(&line);
        lines.push(line);
        drop(lines);
        if let Some(ctx) = self.inner.ctx.get() {
            ctx.request_repaint();
        }
    }

    /// runs `f` over every line logged so far, in arrival order
    pub fn with_lines<R>(&self, f: impl FnOnce(&[String]) -> R) -> R {
        let lines = self
            .inner
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(lines.as_slice())
    }

    fn append_to_file(&self, line: &str) {
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(e) = written {
            // nowhere else to report this
            eprintln!(
                "failed to write to log file {}: {e}",
                self.inner.path.display()
            );
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

impl Log for LogSink {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        // our own records from info up, dependencies only when something is wrong
        metadata.level() <= Level::Warn
            || (metadata.target().starts_with(env!("CARGO_CRATE_NAME"))
                && metadata.level() <= Level::Info)
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.write(record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_file_on_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app_log.txt");
        fs::write(&path, "stale\nlines\n").unwrap();

        let sink = LogSink::create(&path).unwrap();
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "log file created\n");
    }

    #[test]
    fn mirrors_lines_to_file_and_window_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::create(dir.path().join("logs").join("app_log.txt")).unwrap();

        sink.info("first");
        sink.error(format_args!("second {}", 2));
        sink.clone().warn("third");

        let window = sink.with_lines(<[String]>::to_vec);
        assert_eq!(window.len(), 3);
        assert!(window[0].ends_with("] first"));
        assert!(window[1].contains("ERROR"));
        assert!(window[1].ends_with("] second 2"));
        assert!(window[2].ends_with("] third"));

        let file = fs::read_to_string(sink.path()).unwrap();
        let file_lines: Vec<_> = file.lines().collect();
        assert_eq!(file_lines[0], LOG_FILE_HEADER);
        assert_eq!(&file_lines[1..], window.as_slice());
    }

    #[test]
    fn concurrent_writers_keep_one_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::create(dir.path().join("app_log.txt")).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        sink.info(format!("thread {t} line {i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let window = sink.with_lines(<[String]>::to_vec);
        assert_eq!(window.len(), 100);
        let file = fs::read_to_string(sink.path()).unwrap();
        let file_lines: Vec<_> = file.lines().skip(1).collect();
        // same lines in the same interleaving
        assert_eq!(file_lines, window);
    }

    #[test]
    fn filters_foreign_debug_records() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::create(dir.path().join("app_log.txt")).unwrap();

        let ours = Metadata::builder()
            .level(Level::Info)
            .target(concat!(env!("CARGO_CRATE_NAME"), "::player"))
            .build();
        let foreign_info = Metadata::builder()
            .level(Level::Info)
            .target("wgpu_core::device")
            .build();
        let foreign_warn = Metadata::builder()
            .level(Level::Warn)
            .target("winit")
            .build();
        assert!(sink.enabled(&ours));
        assert!(!sink.enabled(&foreign_info));
        assert!(sink.enabled(&foreign_warn));
    }
}
