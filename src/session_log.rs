extern crate alloc;
extern crate chrono;
use crate::errors::OpsError;
use alloc::sync::Arc;
use chrono::Local;
use core::fmt;
use std::fs::{
    File,
    OpenOptions,
};
use std::io::{
    BufWriter,
    Write,
};
use std::path::Path;
use std::sync::Mutex;

/// Which way the bytes of a session log record travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Bytes read from the device.
    Read,
    /// Bytes written to the device.
    Write,
}

impl fmt::Display for Direction {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Read => f.write_str("<<"),
            Self::Write => f.write_str(">>"),
        }
    }
}

/// `SessionLog` is an append only, timestamped record of every byte read from and written to
/// devices. Clones share the same file so any number of sessions (on any number of threads) can
/// log to one sink; each record is written as a single line under the lock.
#[derive(Clone)]
pub struct SessionLog {
    sink: Arc<Mutex<BufWriter<File>>>,
}

impl SessionLog {
    /// Opens (creating if needed) the file at `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::Transport` if the file cannot be opened.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, OpsError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .map_err(|err| OpsError::Transport {
                details: format!(
                    "failed opening session log '{}', error: {err}",
                    path.as_ref().display()
                ),
            })?;

        Ok(Self {
            sink: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    /// Appends one record. Control characters are escaped so every record stays on one line.
    /// Failures to write are logged and otherwise ignored; the session log never alters control
    /// flow.
    pub fn record(
        &self,
        label: &str,
        direction: Direction,
        b: &[u8],
    ) {
        if b.is_empty() {
            return;
        }

        let line = format!(
            "{} [{label}] {direction} {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            String::from_utf8_lossy(b).escape_debug()
        );

        let Ok(mut sink) = self.sink.lock() else {
            log::warn!("session log lock poisoned, dropping record for '{label}'");

            return;
        };

        if let Err(err) = sink.write_all(line.as_bytes()) {
            log::warn!("failed writing session log record for '{label}', error: {err}");
        }
    }

    /// Flushes buffered records to the file.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::Transport` if the flush fails.
    pub fn flush(&self) -> Result<(), OpsError> {
        let Ok(mut sink) = self.sink.lock() else {
            return Err(OpsError::Transport {
                details: String::from("session log lock poisoned"),
            });
        };

        sink.flush().map_err(|err| OpsError::Transport {
            details: format!("failed flushing session log, error: {err}"),
        })
    }
}

impl fmt::Debug for SessionLog {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SessionLog").finish_non_exhaustive()
    }
}
