//
// sink.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::ffi::CString;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;

/// Environment variable routing dumps to the system logger.
pub const USE_SYSLOG_ENV_VAR: &str = "STRAND_USE_SYSLOG";

/// Environment variable routing dumps to a log file.
pub const USE_LOG_FILE_ENV_VAR: &str = "STRAND_USE_LOG_FILE";

/// Environment variable overriding the log file path. Only consulted
/// when `STRAND_USE_LOG_FILE` is set.
pub const LOG_FILE_ENV_VAR: &str = "STRAND_LOG_FILE";

/// Where file dumps go when no override is given.
pub const DEFAULT_LOG_PATH: &str = "/tmp/strand.log";

/// Where formatted dump text is written.
///
/// Exactly one sink is active per process. It is selected once during
/// `initialize()` and is not reconfigurable afterwards.
///
/// Prefer `Console` or `File` for stack dumps. The system logger is
/// line-oriented (as per the relevant RFC) and newline escapes are
/// removed, so a multi-line trace arrives on a single line interspersed
/// with other system messages. `Syslog` is provided for completeness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    Console,
    File(PathBuf),
    Syslog,
}

impl Sink {
    /// Resolve the sink from the environment.
    ///
    /// `STRAND_USE_SYSLOG` takes precedence over `STRAND_USE_LOG_FILE`;
    /// with neither set, dumps go to stdout. A flag is enabled by the
    /// variable being present, regardless of its value.
    pub fn from_env() -> Self {
        if std::env::var_os(USE_SYSLOG_ENV_VAR).is_some() {
            return Sink::Syslog;
        }

        if std::env::var_os(USE_LOG_FILE_ENV_VAR).is_some() {
            let path = std::env::var_os(LOG_FILE_ENV_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH));
            return Sink::File(path);
        }

        Sink::Console
    }

    /// Write one formatted block to the destination.
    ///
    /// File writes are a fully independent open/append/flush/close cycle
    /// per call; no handle is held across dumps. Syslog delivery is
    /// best-effort, at most once.
    pub(crate) fn write(&self, text: &str) -> anyhow::Result<()> {
        match self {
            Sink::Console => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
                Ok(())
            },
            Sink::File(path) => {
                let mut file = OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(path)
                    .with_context(|| format!("Can't open log file {}", path.display()))?;
                file.write_all(text.as_bytes())?;
                file.flush()?;
                Ok(())
            },
            Sink::Syslog => {
                // The text is passed as a `%s` argument, never as the
                // format string
                let message = CString::new(text.replace('\0', " "))
                    .context("Can't convert dump text for syslog")?;
                unsafe {
                    libc::syslog(
                        libc::LOG_DEBUG,
                        "%s\0".as_ptr() as *const libc::c_char,
                        message.as_ptr(),
                    );
                }
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_writes_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strand.log");
        let sink = Sink::File(path.clone());

        sink.write("first\n").unwrap();
        sink.write("second\n").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "first\nsecond\n");
    }

    #[test]
    fn test_file_write_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("created.log");

        Sink::File(path.clone()).write("").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_file_write_fails_on_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("strand.log");

        assert!(Sink::File(path).write("text\n").is_err());
    }
}
