use super::constants::{
    ANSI_ESCAPE_BYTE,
    ERROR_TAIL_LENGTH,
    MAX_DRAIN_READS,
};
use super::util::strip_ansi;
use super::{
    Channel,
    PatternTable,
};
use crate::errors::OpsError;
use crate::session_log::Direction;
use crate::transport::base::{
    remaining,
    ReadOutcome,
};
use core::time::Duration;
use log::{
    debug,
    trace,
};
use std::time::Instant;

/// `MatchResult` is the outcome of one `expect` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Index of the winning entry in the table.
    pub matched_index: usize,
    /// Everything in the buffer before the match. For the eof and timeout sentinels this is the
    /// whole unconsumed buffer.
    pub text_before: String,
    /// The text consumed by the match itself; empty for sentinels.
    pub text_after: String,
}

impl Channel {
    fn read_into_buffer(
        &mut self,
        deadline: Instant,
    ) -> Result<ReadOutcome, OpsError> {
        let outcome = self.transport.read_available(deadline)?;

        if !outcome.bytes.is_empty() {
            trace!("channel read {:?}", String::from_utf8_lossy(&outcome.bytes));

            if let Some(session_log) = &self.session_log {
                session_log.record(&self.label, Direction::Read, &outcome.bytes);
            }

            self.buffer.extend(&outcome.bytes);

            if self.args.strip_ansi && self.buffer.contains(&ANSI_ESCAPE_BYTE) {
                self.buffer = strip_ansi(&self.buffer);
            }
        }

        if outcome.eof {
            debug!("channel to '{}' reached end of stream", self.label);

            self.eof = true;
        }

        Ok(outcome)
    }

    fn buffer_tail(&self) -> String {
        let from = self.buffer.len().saturating_sub(ERROR_TAIL_LENGTH);

        String::from_utf8_lossy(self.buffer.get(from..).unwrap_or_default()).into_owned()
    }

    fn take_buffer(&mut self) -> String {
        String::from_utf8_lossy(&core::mem::take(&mut self.buffer)).into_owned()
    }

    fn sentinel_or(
        &mut self,
        index: Option<usize>,
        err: OpsError,
    ) -> Result<MatchResult, OpsError> {
        let Some(matched_index) = index else {
            return Err(err);
        };

        Ok(MatchResult {
            matched_index,
            text_before: self.take_buffer(),
            text_after: String::new(),
        })
    }

    /// Read from the transport until an entry of `table` matches the buffer, the stream ends, or
    /// `deadline` passes.
    ///
    /// The buffer carries over between calls: whatever followed the previous match is searched
    /// first. Of all entries matching, the one matching earliest in the buffer wins, ties go to the
    /// entry earliest in the table. Everything up to the end of the match is consumed.
    ///
    /// When the stream ends or the deadline passes and `table` holds the matching sentinel entry,
    /// that entry is returned as the match with the unconsumed buffer as `text_before`.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::EndOfStream` or `OpsError::Timeout` when that condition occurs and the
    /// table has no sentinel for it; any transport read error is passed through.
    pub fn expect(
        &mut self,
        table: &PatternTable,
        deadline: Instant,
    ) -> Result<MatchResult, OpsError> {
        let mut read_once = false;

        loop {
            if let Some((matched_index, start, end)) = table.find_earliest(&self.buffer) {
                let text_before =
                    String::from_utf8_lossy(self.buffer.get(..start).unwrap_or_default())
                        .into_owned();
                let text_after =
                    String::from_utf8_lossy(self.buffer.get(start..end).unwrap_or_default())
                        .into_owned();

                self.buffer.drain(..end);

                debug!(
                    "matched pattern '{}' (index {matched_index}) on '{}'",
                    table.get(matched_index).map_or("", |entry| entry.id.as_str()),
                    self.label
                );

                return Ok(MatchResult {
                    matched_index,
                    text_before,
                    text_after,
                });
            }

            if self.eof {
                let err = OpsError::EndOfStream {
                    details: format!(
                        "stream to '{}' ended, unmatched output: '{}'",
                        self.label,
                        self.buffer_tail()
                    ),
                };

                return self.sentinel_or(table.eof_index(), err);
            }

            if read_once && remaining(deadline).is_zero() {
                let err = OpsError::Timeout {
                    details: format!(
                        "no pattern matched on '{}' before the deadline, unmatched output: '{}'",
                        self.label,
                        self.buffer_tail()
                    ),
                };

                return self.sentinel_or(table.timeout_index(), err);
            }

            read_once = true;

            self.read_into_buffer(deadline)?;
        }
    }

    /// Discard anything buffered or immediately readable, without waiting. Returns the discarded
    /// bytes.
    ///
    /// # Errors
    ///
    /// Returns an `OpsError` if reading the transport fails.
    pub fn drain(&mut self) -> Result<Vec<u8>, OpsError> {
        let mut drained = core::mem::take(&mut self.buffer);

        for _ in 0..MAX_DRAIN_READS {
            if self.eof {
                break;
            }

            let outcome = self.read_into_buffer(Instant::now())?;

            drained.extend(core::mem::take(&mut self.buffer));

            if outcome.bytes.is_empty() {
                break;
            }
        }

        if !drained.is_empty() {
            debug!(
                "drained {} stray bytes from '{}'",
                drained.len(),
                self.label
            );
        }

        Ok(drained)
    }

    /// A bounded `expect` used to swallow trailing banner text; `table` should hold the end of
    /// prompt entry plus both sentinels.
    ///
    /// # Errors
    ///
    /// Returns an `OpsError` if the expect itself errors.
    pub fn flush(
        &mut self,
        table: &PatternTable,
        window: Duration,
    ) -> Result<MatchResult, OpsError> {
        let result = self.expect(table, Instant::now() + window)?;

        trace!(
            "flushed '{}{}' from '{}'",
            result.text_before,
            result.text_after,
            self.label
        );

        Ok(result)
    }
}
