use crate::errors::OpsError;
use crate::transport::socket::Socket;
use crate::transport::system::System;
use core::fmt;
use core::time::Duration;
use std::time::Instant;

/// The default time (in seconds) to use for the timeout socket parameter.
pub const DEFAULT_TIMEOUT_SOCKET_SECONDS: u64 = 30;

/// The default transport read size -- 8,192 bytes.
pub const DEFAULT_READ_SIZE: u16 = 8_192;

/// The default shell spawned inside a container endpoint.
pub const DEFAULT_CONTAINER_SHELL: &str = "/bin/bash";

/// `Endpoint` describes how to reach a device. It is supplied by the caller (topology code) and is
/// never mutated by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Spawn an arbitrary program in a pty and talk to it.
    Command {
        /// The program to execute.
        program: String,
        /// Arguments passed to the program.
        args: Vec<String>,
    },
    /// Exec a shell inside a running container (`docker exec -ti <name> <shell>`).
    Container {
        /// The container name.
        name: String,
        /// The shell to exec, usually "/bin/bash".
        shell: String,
    },
    /// Spawn the system `telnet` binary against a console server or device.
    Telnet {
        /// The host to connect to.
        host: String,
        /// The port to connect to.
        port: u16,
    },
    /// A raw tcp byte stream, no protocol negotiation of any kind.
    Socket {
        /// The host to connect to.
        host: String,
        /// The port to connect to.
        port: u16,
    },
}

impl Endpoint {
    /// Returns a container endpoint using the default shell.
    #[must_use]
    pub fn container(name: &str) -> Self {
        Self::Container {
            name: name.to_owned(),
            shell: String::from(DEFAULT_CONTAINER_SHELL),
        }
    }

    /// Returns a telnet endpoint.
    #[must_use]
    pub fn telnet(
        host: &str,
        port: u16,
    ) -> Self {
        Self::Telnet {
            host: host.to_owned(),
            port,
        }
    }

    /// Returns a short label for the endpoint, used in logs and command results.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Command { program, .. } => program.clone(),
            Self::Container { name, .. } => name.clone(),
            Self::Telnet { host, port } | Self::Socket { host, port } => format!("{host}:{port}"),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Command { program, args } => write!(f, "{program} {}", args.join(" ")),
            Self::Container { name, shell } => write!(f, "docker exec -ti {name} {shell}"),
            Self::Telnet { host, port } => write!(f, "telnet {host} {port}"),
            Self::Socket { host, port } => write!(f, "tcp://{host}:{port}"),
        }
    }
}

/// The outcome of a single bounded read of a transport.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Whatever bytes were available before the deadline.
    pub bytes: Vec<u8>,
    /// The peer closed the stream; no more bytes will ever arrive.
    pub eof: bool,
    /// The deadline passed with nothing to read.
    pub timed_out: bool,
}

impl ReadOutcome {
    /// Returns an outcome carrying `bytes`.
    #[must_use]
    pub const fn data(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            eof: false,
            timed_out: false,
        }
    }

    /// Returns an outcome signalling end of stream.
    #[must_use]
    pub const fn eof() -> Self {
        Self {
            bytes: vec![],
            eof: true,
            timed_out: false,
        }
    }

    /// Returns an outcome signalling the deadline passed with no data.
    #[must_use]
    pub const fn timed_out() -> Self {
        Self {
            bytes: vec![],
            eof: false,
            timed_out: true,
        }
    }
}

/// Transport is the trait all opsexpect transports must implement in order to be consumed by a
/// channel and ultimately by sessions. A transport is a raw duplex byte channel to exactly one
/// endpoint and exclusively owns the underlying process or socket.
pub trait Transport {
    /// Open the underlying transport. Must not block indefinitely.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::ConnectFailed` if the endpoint cannot be reached or spawned.
    fn open(&mut self) -> Result<(), OpsError>;
    /// Close the underlying transport. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an `OpsError` if releasing the OS resources fails.
    fn close(&mut self) -> Result<(), OpsError>;
    /// Indicates if the transport is "alive".
    fn alive(&mut self) -> bool;
    /// Read whatever is available, waiting at most until `deadline`. Implementations *must never*
    /// block past the deadline; a deadline already in the past means a non blocking read.
    ///
    /// # Errors
    ///
    /// Returns an `OpsError` if the read fails for reasons other than the peer closing.
    fn read_available(
        &mut self,
        deadline: Instant,
    ) -> Result<ReadOutcome, OpsError>;
    /// Write to the underlying transport.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::WriteFailed` when the peer has closed.
    fn write(
        &mut self,
        b: &[u8],
    ) -> Result<(), OpsError>;
    /// Returns the endpoint of the transport.
    fn endpoint(&self) -> &Endpoint;
}

/// A struct holding generic arguments that apply to all transport flavors.
#[derive(Debug, Clone)]
pub struct TransportArgs {
    /// The timeout duration for initial connection -- see specific transports for exact
    /// implementation.
    pub timeout_socket: Duration,
    /// The read size for each read of the transport (can leave this to the default!).
    pub read_size: u16,
}

impl Default for TransportArgs {
    fn default() -> Self {
        Self {
            timeout_socket: Duration::from_secs(DEFAULT_TIMEOUT_SOCKET_SECONDS),
            read_size: DEFAULT_READ_SIZE,
        }
    }
}

/// Returns the transport implementation suited to `endpoint` -- a `Socket` for socket endpoints,
/// the pty backed `System` transport for everything else.
#[must_use]
pub fn new_transport(
    endpoint: Endpoint,
    args: TransportArgs,
) -> Box<dyn Transport + Send> {
    match endpoint {
        Endpoint::Socket { .. } => Box::new(Socket::new(endpoint, args)),
        Endpoint::Command { .. } | Endpoint::Container { .. } | Endpoint::Telnet { .. } => {
            Box::new(System::new(endpoint, args))
        }
    }
}

/// Returns the time left until `deadline`, zero if it already passed.
#[must_use]
pub fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_labels() {
        assert_eq!(Endpoint::container("sw1").label(), "sw1");
        assert_eq!(Endpoint::telnet("10.0.0.1", 2001).label(), "10.0.0.1:2001");
        assert_eq!(
            Endpoint::container("sw1").to_string(),
            "docker exec -ti sw1 /bin/bash"
        );
    }

    #[test]
    fn test_remaining_saturates() {
        let past = Instant::now();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(remaining(past), Duration::ZERO);
    }
}
