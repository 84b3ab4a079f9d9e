use crate::errors::OpsError;
use crate::transport::base::{
    remaining,
    Endpoint,
    ReadOutcome,
    Transport,
    TransportArgs,
};
use core::time::Duration;
use log::debug;
use std::io::{
    ErrorKind,
    Read,
    Write,
};
use std::net::{
    Shutdown,
    TcpStream,
    ToSocketAddrs,
};
use std::time::Instant;

/// Smallest read timeout handed to the socket; a zero timeout means "block forever" to std.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// The "socket" transport -- a plain tcp byte stream. No telnet option negotiation is done, the
/// bytes are passed through as is.
pub struct Socket {
    endpoint: Endpoint,
    args: TransportArgs,
    stream: Option<TcpStream>,
}

impl Socket {
    /// Returns a new `Socket` instance.
    #[must_use]
    pub const fn new(
        endpoint: Endpoint,
        args: TransportArgs,
    ) -> Self {
        Self {
            endpoint,
            args,
            stream: None,
        }
    }
}

impl Transport for Socket {
    fn open(&mut self) -> Result<(), OpsError> {
        let Endpoint::Socket { host, port } = &self.endpoint else {
            return Err(OpsError::ConnectFailed {
                details: format!(
                    "endpoint '{}' is not a socket endpoint, socket transport cannot open it",
                    self.endpoint
                ),
            });
        };

        let addrs = (host.as_str(), *port)
            .to_socket_addrs()
            .map_err(|err| OpsError::ConnectFailed {
                details: format!("failed resolving '{host}:{port}', error: {err}"),
            })?;

        let mut last_err = None;

        for addr in addrs {
            debug!("opening socket transport to {addr}");

            match TcpStream::connect_timeout(&addr, self.args.timeout_socket) {
                Ok(stream) => {
                    stream
                        .set_nodelay(true)
                        .map_err(|err| OpsError::ConnectFailed {
                            details: format!("failed setting nodelay on socket, error: {err}"),
                        })?;

                    self.stream = Some(stream);

                    return Ok(());
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(OpsError::ConnectFailed {
            details: last_err.map_or_else(
                || format!("'{host}:{port}' resolved to no addresses"),
                |err| format!("failed connecting to '{host}:{port}', error: {err}"),
            ),
        })
    }

    fn close(&mut self) -> Result<(), OpsError> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };

        match stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(OpsError::Transport {
                details: format!("failed shutting down socket, error: {err}"),
            }),
        }
    }

    fn alive(&mut self) -> bool {
        self.stream.is_some()
    }

    #[allow(clippy::indexing_slicing)]
    fn read_available(
        &mut self,
        deadline: Instant,
    ) -> Result<ReadOutcome, OpsError> {
        let read_size = self.args.read_size as usize;

        let Some(stream) = self.stream.as_mut() else {
            return Err(OpsError::Transport {
                details: String::from("attempting to read from a closed socket transport"),
            });
        };

        stream
            .set_read_timeout(Some(remaining(deadline).max(MIN_READ_TIMEOUT)))
            .map_err(|err| OpsError::Transport {
                details: format!("failed setting socket read timeout, error: {err}"),
            })?;

        let mut b = vec![0_u8; read_size];

        match stream.read(b.as_mut_slice()) {
            Ok(0) => Ok(ReadOutcome::eof()),
            Ok(read_n) => Ok(ReadOutcome::data(b[0..read_n].to_owned())),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(ReadOutcome::timed_out())
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(ReadOutcome::default()),
            Err(err) if err.kind() == ErrorKind::ConnectionReset => Ok(ReadOutcome::eof()),
            Err(err) => Err(OpsError::Transport {
                details: format!("error reading from socket, error: {err}"),
            }),
        }
    }

    fn write(
        &mut self,
        b: &[u8],
    ) -> Result<(), OpsError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(OpsError::WriteFailed {
                details: String::from("attempting to write to a closed socket transport"),
            });
        };

        stream
            .write_all(b)
            .and_then(|()| stream.flush())
            .map_err(|err| OpsError::WriteFailed {
                details: format!("failed writing to socket, error: {err}"),
            })
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}
