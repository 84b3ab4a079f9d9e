extern crate nix;
use crate::errors::OpsError;
use crate::transport::base::{
    remaining,
    Endpoint,
    ReadOutcome,
    Transport,
    TransportArgs,
};
use crate::util::pty::PtyChild;
use log::debug;
use nix::errno::Errno;
use nix::libc::EIO;
use nix::poll::{
    poll,
    PollFd,
    PollFlags,
};
use nix::sys::wait::WaitStatus;
use std::fs::File;
use std::io::{
    BufWriter,
    ErrorKind,
    Read,
    Write,
};
use std::os::fd::RawFd;
use std::os::unix::io::AsRawFd;
use std::process::Command;
use std::time::Instant;

/// The binary used for docker container endpoints.
pub const DEFAULT_CONTAINER_OPEN_BIN: &str = "docker";

/// The binary used for telnet endpoints.
pub const DEFAULT_TELNET_OPEN_BIN: &str = "telnet";

/// The "system" transport -- spawns a child process (`docker exec`, `telnet`, or anything else) in
/// a pty and exchanges bytes with it.
pub struct System {
    endpoint: Endpoint,
    args: TransportArgs,
    process: Option<PtyChild>,
    file_handle: RawFd,
    reader: Option<File>,
    writer: Option<BufWriter<File>>,
}

impl System {
    /// Returns a new `System` instance.
    #[must_use]
    pub const fn new(
        endpoint: Endpoint,
        args: TransportArgs,
    ) -> Self {
        Self {
            endpoint,
            args,
            process: None,
            file_handle: -1,
            reader: None,
            writer: None,
        }
    }

    fn build_open_command(&self) -> Result<Command, OpsError> {
        let (open_bin, open_args) = match &self.endpoint {
            Endpoint::Command { program, args } => (program.clone(), args.clone()),
            Endpoint::Container { name, shell } => (
                String::from(DEFAULT_CONTAINER_OPEN_BIN),
                vec![
                    String::from("exec"),
                    String::from("-ti"),
                    name.clone(),
                    shell.clone(),
                ],
            ),
            Endpoint::Telnet { host, port } => (
                String::from(DEFAULT_TELNET_OPEN_BIN),
                vec![host.clone(), format!("{port}")],
            ),
            Endpoint::Socket { .. } => {
                return Err(OpsError::ConnectFailed {
                    details: format!(
                        "endpoint '{}' is a socket endpoint, system transport cannot open it",
                        self.endpoint
                    ),
                })
            }
        };

        debug!(
            "opening system transport with bin '{}' and args '{:?}'",
            open_bin, open_args
        );

        let mut open_cmd = Command::new(open_bin);
        open_cmd.args(open_args);

        Ok(open_cmd)
    }

    fn setup_reader_writer(&mut self) -> Result<(), OpsError> {
        let open_cmd = self.build_open_command()?;

        let process = PtyChild::spawn(open_cmd).map_err(|err| OpsError::ConnectFailed {
            details: format!("encountered error spawning pty process, error: {err}"),
        })?;

        let file = process
            .master()
            .try_clone()
            .map_err(|err| OpsError::ConnectFailed {
                details: format!("failed cloning pty file handle for reader object, error: {err}"),
            })?;

        let writer_clone = file.try_clone().map_err(|err| OpsError::ConnectFailed {
            details: format!("failed cloning pty file handle for writer object, error: {err}"),
        })?;

        self.process = Some(process);
        self.writer = Option::from(BufWriter::new(writer_clone));
        self.file_handle = file.as_raw_fd();
        self.reader = Option::from(file);

        Ok(())
    }
}

/// Milliseconds left until `deadline`, rounded up so that poll never wakes before it.
fn poll_timeout_ms(deadline: Instant) -> i32 {
    let left = remaining(deadline);
    let mut ms = left.as_millis();

    if left.subsec_nanos() % 1_000_000 != 0 {
        ms += 1;
    }

    i32::try_from(ms).unwrap_or(i32::MAX)
}

impl Transport for System {
    fn open(&mut self) -> Result<(), OpsError> {
        if self.process.is_some() {
            debug!("system transport already open, closing before re-opening");

            self.close()?;
        }

        self.setup_reader_writer()
    }

    fn close(&mut self) -> Result<(), OpsError> {
        self.reader = None;
        self.writer = None;
        self.file_handle = -1;

        let Some(mut process) = self.process.take() else {
            return Ok(());
        };

        match process.terminate() {
            Ok(_) => Ok(()),
            Err(err) => Err(OpsError::Transport {
                details: format!("failed closing pty process, error: {err}"),
            }),
        }
    }

    fn alive(&mut self) -> bool {
        self.process.as_mut().map_or(false, |process| {
            process.status().map_or(false, |status| {
                matches!(status, WaitStatus::Continued(_) | WaitStatus::StillAlive)
            })
        })
    }

    /// Poll the pty until data shows up or the deadline passes. A zero length read or `EIO` on
    /// the pty master means the child side is gone.
    #[allow(clippy::indexing_slicing)]
    fn read_available(
        &mut self,
        deadline: Instant,
    ) -> Result<ReadOutcome, OpsError> {
        let read_size = self.args.read_size as usize;

        let Some(reader) = self.reader.as_mut() else {
            return Err(OpsError::Transport {
                details: String::from("attempting to read from transport with no process!"),
            });
        };

        loop {
            let fd = PollFd::new(self.file_handle, PollFlags::POLLIN);

            match poll(&mut [fd], poll_timeout_ms(deadline)) {
                Ok(0) => {
                    if remaining(deadline).is_zero() {
                        return Ok(ReadOutcome::timed_out());
                    }

                    continue;
                }
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(err) => {
                    return Err(OpsError::Transport {
                        details: format!("error while polling fd, error: {err}"),
                    })
                }
            }

            let mut b = vec![0_u8; read_size];

            match reader.read(b.as_mut_slice()) {
                Ok(0) => return Ok(ReadOutcome::eof()),
                Ok(read_n) => return Ok(ReadOutcome::data(b[0..read_n].to_owned())),
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if remaining(deadline).is_zero() {
                        return Ok(ReadOutcome::timed_out());
                    }
                }
                Err(err) if err.raw_os_error() == Some(EIO) => return Ok(ReadOutcome::eof()),
                Err(err) => {
                    return Err(OpsError::Transport {
                        details: format!("error when reading after polling fd, error: {err}"),
                    })
                }
            }
        }
    }

    fn write(
        &mut self,
        b: &[u8],
    ) -> Result<(), OpsError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(OpsError::WriteFailed {
                details: String::from("attempting to write to transport with no process!"),
            });
        };

        writer
            .write_all(b)
            .and_then(|()| writer.flush())
            .map_err(|err| OpsError::WriteFailed {
                details: format!("failed writing to transport, error: {err}"),
            })
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn cat_transport() -> System {
        System::new(
            Endpoint::Command {
                program: String::from("cat"),
                args: vec![],
            },
            TransportArgs::default(),
        )
    }

    #[test]
    fn test_socket_endpoint_rejected() {
        let mut transport = System::new(
            Endpoint::Socket {
                host: String::from("localhost"),
                port: 23,
            },
            TransportArgs::default(),
        );

        assert!(matches!(
            transport.open(),
            Err(OpsError::ConnectFailed { .. })
        ));
    }

    #[test]
    fn test_read_respects_deadline() {
        let mut transport = cat_transport();
        transport.open().unwrap();

        let start = Instant::now();
        let outcome = transport
            .read_available(start + Duration::from_millis(200))
            .unwrap();

        assert!(outcome.timed_out);
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(start.elapsed() < Duration::from_secs(2));

        transport.close().unwrap();
        transport.close().unwrap();
    }

    #[test]
    fn test_small_read_size_sees_whole_burst() {
        let mut transport = System::new(
            Endpoint::Command {
                program: String::from("sh"),
                args: vec![
                    String::from("-c"),
                    String::from("printf 'abcdefghijklmnop'; sleep 5"),
                ],
            },
            TransportArgs {
                read_size: 4,
                ..TransportArgs::default()
            },
        );
        transport.open().unwrap();

        let deadline = Instant::now() + Duration::from_secs(3);
        let mut seen = vec![];

        while !String::from_utf8_lossy(&seen).contains("abcdefghijklmnop") {
            let outcome = transport.read_available(deadline).unwrap();
            assert!(
                !outcome.timed_out,
                "timed out holding '{}'",
                String::from_utf8_lossy(&seen)
            );
            assert!(outcome.bytes.len() <= 4);
            seen.extend(outcome.bytes);
        }

        transport.close().unwrap();
    }

    #[test]
    fn test_poll_timeout_rounds_up() {
        let deadline = Instant::now() + Duration::from_micros(1500);

        assert!(poll_timeout_ms(deadline) >= 1);
        assert_eq!(poll_timeout_ms(Instant::now()), 0);
    }

    #[test]
    fn test_write_then_read() {
        let mut transport = cat_transport();
        transport.open().unwrap();
        transport.write(b"hello\n").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = vec![];

        while !String::from_utf8_lossy(&seen).contains("hello") {
            let outcome = transport.read_available(deadline).unwrap();
            assert!(!outcome.timed_out && !outcome.eof);
            seen.extend(outcome.bytes);
        }

        transport.close().unwrap();
    }
}
