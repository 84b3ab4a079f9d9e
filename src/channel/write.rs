use super::Channel;
use crate::errors::OpsError;
use crate::session_log::Direction;
use log::trace;

impl Channel {
    /// Write `b` bytes to the device -- typically you should use `write_and_return` instead.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::WriteFailed` if the peer has gone away.
    pub fn write(
        &mut self,
        b: &[u8],
    ) -> Result<(), OpsError> {
        trace!("channel write {:?}", String::from_utf8_lossy(b));

        if let Some(session_log) = &self.session_log {
            session_log.record(&self.label, Direction::Write, b);
        }

        self.transport.write(b)
    }

    /// Writes a return -- the return character by default is "\r", but can be configured.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::WriteFailed` if the peer has gone away.
    pub fn write_return(&mut self) -> Result<(), OpsError> {
        let return_char = self.args.return_char.clone();

        self.write(return_char.as_bytes())
    }

    /// Write `b` bytes to the device followed by a return, as a single write.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::WriteFailed` if the peer has gone away.
    pub fn write_and_return(
        &mut self,
        b: &[u8],
    ) -> Result<(), OpsError> {
        let mut line = b.to_vec();
        line.extend(self.args.return_char.as_bytes());

        self.write(&line)
    }
}
