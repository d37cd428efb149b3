//! Logging initialization
//!
//! The whole crate logs through the `log` facade; this wires up `env_logger`
//! once for the process. With a log file configured every line goes to both
//! stdout and the file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Once;

pub use log::{debug, error, info, trace, warn};

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter in `env_logger` syntax, e.g. "info" or "iris_engine=debug"
    pub filter: Option<String>,
    /// ANSI coloring behavior
    pub write_style: env_logger::WriteStyle,
    /// File that receives a copy of every log line
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            write_style: env_logger::WriteStyle::Auto,
            log_file: None,
        }
    }
}

impl LoggingConfig {
    /// Logging configuration with an explicit filter
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..Self::default()
        }
    }

    /// Also append every line to `path`
    pub fn with_log_file(mut self, path: Option<&Path>) -> Self {
        self.log_file = path.map(Path::to_path_buf);
        self
    }
}

/// Writer that copies every byte to two sinks
///
/// The console goes first so a failing file never hides output.
pub struct TeeWriter<A, B> {
    console: A,
    file: B,
}

impl<A: Write, B: Write> TeeWriter<A, B> {
    /// Tee `console` and `file`
    pub fn new(console: A, file: B) -> Self {
        Self { console, file }
    }

    /// Both sinks, console first
    pub fn into_inner(self) -> (A, B) {
        (self.console, self.file)
    }
}

impl<A: Write, B: Write> Write for TeeWriter<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.console.write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.console.flush()?;
        self.file.flush()
    }
}

/// Open `path` for appending, creating it and its parent directory as needed
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

static INIT: Once = Once::new();

/// Initialize the global logger
///
/// Filter precedence: explicit config, then `RUST_LOG`, then `info`.
/// Subsequent calls are ignored. A log file that cannot be opened leaves
/// logging on the console and is reported once the logger is up.
pub fn init(config: &LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }

        if let Some(filter) = &config.filter {
            builder.parse_filters(filter);
        }

        builder.write_style(config.write_style);

        let file_error = match config.log_file.as_deref().map(|path| (path, open_log_file(path))) {
            Some((_, Ok(file))) => {
                builder.target(env_logger::Target::Pipe(Box::new(TeeWriter::new(io::stdout(), file))));
                None
            }
            Some((path, Err(e))) => Some(format!("Could not open log file {}: {e}", path.display())),
            None => None,
        };

        if builder.try_init().is_err() {
            // Another logger was installed by the host application.
            return;
        }

        if let Some(message) = file_error {
            log::warn!("{message}");
        }
        log::debug!("logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tee_writes_both_sinks() {
        let mut tee = TeeWriter::new(Vec::new(), Vec::new());
        writeln!(tee, "[INFO] frame {}", 3).unwrap();
        tee.flush().unwrap();

        let (console, file) = tee.into_inner();
        assert_eq!(console, b"[INFO] frame 3\n");
        assert_eq!(console, file);
    }

    #[test]
    fn test_log_file_appends() {
        let dir = std::env::temp_dir().join(format!("iris_log_test_{}", std::process::id()));
        let path = dir.join("Iris.log");

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_config_log_file() {
        let config = LoggingConfig::with_filter("debug").with_log_file(Some(Path::new("Iris.log")));
        assert_eq!(config.log_file.as_deref(), Some(Path::new("Iris.log")));
        assert!(LoggingConfig::default().log_file.is_none());
    }
}
