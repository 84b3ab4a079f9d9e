use crate::classifier::ErrorCategory;
use crate::driver::Context;

/// `OpsError` is the error type for all opsexpect operations.
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    /// The transport could not be opened (spawn failure, refused or timed out connection).
    #[error("connect failed: {details}")]
    ConnectFailed {
        /// A string holding details about the error.
        details: String,
    },

    /// The login handshake did not reach a shell prompt.
    #[error("login failed: {details}")]
    LoginFailed {
        /// A string holding details about the error.
        details: String,
    },

    /// A deadline elapsed before any expected pattern was seen.
    #[error("timed out: {details}")]
    Timeout {
        /// A string holding details about the error.
        details: String,
    },

    /// The remote side closed the stream before any expected pattern was seen.
    #[error("end of stream: {details}")]
    EndOfStream {
        /// A string holding details about the error.
        details: String,
    },

    /// A pattern table was empty or contained a pattern that can match the empty string.
    #[error("invalid pattern table: {details}")]
    InvalidPatternTable {
        /// A string holding details about the error.
        details: String,
    },

    /// Writing to the transport failed, typically because the peer has gone away.
    #[error("write failed: {details}")]
    WriteFailed {
        /// A string holding details about the error.
        details: String,
    },

    /// A command completed but its output or exit status reported a failure.
    #[error("remote command failed with exit status {exit_status} ({category:?})")]
    RemoteCommandError {
        /// The classified failure, if any signature was recognized.
        category: Option<ErrorCategory>,
        /// The exit status recorded for the command.
        exit_status: i32,
    },

    /// The remote side printed a crash signature; the device state can no longer be trusted.
    #[error("remote crash while running '{command}': {details}")]
    RemoteCrash {
        /// The command that was being executed.
        command: String,
        /// The output line holding the crash signature.
        details: String,
    },

    /// A step of a context transition did not land in the expected context.
    #[error("failed moving from context {from} to {to}: {details}")]
    ContextTransition {
        /// The context the step started from.
        from: Context,
        /// The context the step was meant to reach.
        to: Context,
        /// A string holding details about the error.
        details: String,
    },

    /// The platform does not declare the requested context.
    #[error("context {context} is not supported by platform '{platform}'")]
    UnsupportedContext {
        /// The requested context.
        context: Context,
        /// The platform type of the session.
        platform: String,
    },

    /// A platform definition could not be loaded or compiled.
    #[error("platform error: {details}")]
    Platform {
        /// A string holding details about the error.
        details: String,
    },

    /// Any other transport level failure (polling, reading, closing).
    #[error("transport error: {details}")]
    Transport {
        /// A string holding details about the error.
        details: String,
    },
}

impl OpsError {
    /// Indicates if a failed `open` may be recovered by resetting the transport and retrying the
    /// login handshake.
    #[must_use]
    pub const fn is_login_retryable(&self) -> bool {
        matches!(self, Self::LoginFailed { .. } | Self::Timeout { .. })
    }
}
