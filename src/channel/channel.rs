use super::Args;
use crate::errors::OpsError;
use crate::session_log::SessionLog;
use crate::transport::base::{
    Endpoint,
    Transport,
};
use log::{
    debug,
    info,
};

/// The opsexpect `Channel` object -- the channel "wraps" the transport object, keeps the buffer of
/// bytes read but not yet consumed by a match, and handles sending to and reading from the
/// transport.
pub struct Channel {
    /// The arguments that the channel was created with.
    pub args: Args,
    pub(super) transport: Box<dyn Transport + Send>,
    pub(super) buffer: Vec<u8>,
    pub(super) eof: bool,
    pub(super) session_log: Option<SessionLog>,
    pub(super) label: String,
}

impl Channel {
    /// Returns a new instance of `Channel` wrapping the given transport.
    #[must_use]
    pub fn new(
        args: Args,
        transport: Box<dyn Transport + Send>,
    ) -> Self {
        let label = transport.endpoint().label();

        Self {
            args,
            transport,
            buffer: vec![],
            eof: false,
            session_log: None,
            label,
        }
    }

    /// Mirror every read and write of this channel into `session_log`.
    pub fn set_session_log(
        &mut self,
        session_log: SessionLog,
    ) {
        self.session_log = Some(session_log);
    }

    /// Returns the session log of the channel, if set.
    #[must_use]
    pub const fn session_log(&self) -> Option<&SessionLog> {
        self.session_log.as_ref()
    }

    /// Returns the endpoint of the underlying transport.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        self.transport.endpoint()
    }

    /// Returns the short endpoint label used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Open the underlying transport, starting from an empty buffer.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::ConnectFailed` if the transport cannot be opened.
    pub fn open(&mut self) -> Result<(), OpsError> {
        info!("channel opening to '{}'", self.label);

        self.buffer.clear();
        self.eof = false;

        self.transport.open()
    }

    /// Close the underlying transport; closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an `OpsError` if the transport fails to release its resources.
    pub fn close(&mut self) -> Result<(), OpsError> {
        info!("channel closing to '{}'", self.label);

        self.buffer.clear();
        self.eof = true;

        self.transport.close()
    }

    /// Close then re-open the underlying transport, forgetting everything buffered.
    ///
    /// # Errors
    ///
    /// Returns an `OpsError` if closing or opening fails.
    pub fn reset(&mut self) -> Result<(), OpsError> {
        debug!("resetting channel to '{}'", self.label);

        self.close()?;
        self.open()
    }

    /// Indicates if the underlying transport is alive and the stream has not ended.
    pub fn alive(&mut self) -> bool {
        !self.eof && self.transport.alive()
    }
}
