extern crate alloc;
use crate::errors::OpsError;
use crate::transport::base::{
    remaining,
    Endpoint,
    ReadOutcome,
    Transport,
};
use alloc::collections::vec_deque::VecDeque;
use alloc::sync::Arc;
use log::trace;
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

/// A single canned reply of a `Script`.
#[derive(Debug, Clone)]
pub struct Reply {
    /// The written line that triggers this reply, `None` means any line.
    pub line: Option<String>,
    /// The output queued once the line is seen.
    pub output: String,
    /// Close the stream after `output` has been read.
    pub then_eof: bool,
}

/// `Script` describes what a simulated device does during one connection: the output shown right
/// after the transport opens, then an ordered list of replies, each consumed by the next
/// complete line written that matches it.
#[derive(Debug, Clone, Default)]
pub struct Script {
    initial: String,
    replies: VecDeque<Reply>,
    eof_on_open: bool,
}

#[allow(clippy::return_self_not_must_use)]
#[allow(clippy::must_use_candidate)]
impl Script {
    /// Returns an empty script -- a device that never says anything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Output emitted as soon as the transport opens.
    pub fn output(
        mut self,
        s: &str,
    ) -> Self {
        self.initial.push_str(s);

        self
    }

    /// Close the stream once the opening output has been read.
    pub fn eof(mut self) -> Self {
        self.eof_on_open = true;

        self
    }

    /// When the line `line` is written, emit `output`.
    pub fn reply(
        mut self,
        line: &str,
        output: &str,
    ) -> Self {
        self.replies.push_back(Reply {
            line: Some(line.to_owned()),
            output: output.to_owned(),
            then_eof: false,
        });

        self
    }

    /// When anything is written next, emit `output`. This also fires on writes that do not end a
    /// line, like the single space answering a pager.
    pub fn reply_any(
        mut self,
        output: &str,
    ) -> Self {
        self.replies.push_back(Reply {
            line: None,
            output: output.to_owned(),
            then_eof: false,
        });

        self
    }

    /// When the line `line` is written, emit `output` and then close the stream.
    pub fn reply_then_eof(
        mut self,
        line: &str,
        output: &str,
    ) -> Self {
        self.replies.push_back(Reply {
            line: Some(line.to_owned()),
            output: output.to_owned(),
            then_eof: true,
        });

        self
    }
}

/// A handle on the lines written to a `Scripted` transport, usable after the transport itself
/// has been moved into a session.
#[derive(Debug, Clone, Default)]
pub struct WriteLog(Arc<Mutex<Vec<String>>>);

impl WriteLog {
    /// Returns every complete line written so far, in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().map(|lines| lines.clone()).unwrap_or_default()
    }

    /// Returns only the non empty lines -- the commands, leaving out bare returns.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| !line.is_empty())
            .collect()
    }

    fn push(
        &self,
        line: String,
    ) {
        if let Ok(mut lines) = self.0.lock() {
            lines.push(line);
        }
    }
}

/// An in memory transport replaying `Script`s, one per `open`. Output is handed out in chunks of
/// at most `chunk_size` bytes so that partial reads are exercised.
pub struct Scripted {
    endpoint: Endpoint,
    scripts: VecDeque<Script>,
    replies: VecDeque<Reply>,
    pending: VecDeque<u8>,
    eof_after_pending: bool,
    line_buf: Vec<u8>,
    last_byte_was_cr: bool,
    chunk_size: usize,
    open: bool,
    written: WriteLog,
}

impl Scripted {
    /// Returns a transport that plays `script` on the first open.
    #[must_use]
    pub fn new(script: Script) -> Self {
        Self::with_scripts(vec![script])
    }

    /// Returns a transport that plays the given scripts on successive opens; opening more times
    /// than there are scripts fails with `ConnectFailed`.
    #[must_use]
    pub fn with_scripts(scripts: Vec<Script>) -> Self {
        Self {
            endpoint: Endpoint::Command {
                program: String::from("scripted"),
                args: vec![],
            },
            scripts: scripts.into(),
            replies: VecDeque::new(),
            pending: VecDeque::new(),
            eof_after_pending: false,
            line_buf: vec![],
            last_byte_was_cr: false,
            chunk_size: usize::MAX,
            open: false,
            written: WriteLog::default(),
        }
    }

    /// Sets the maximum number of bytes returned by one read.
    #[must_use]
    pub fn chunk_size(
        mut self,
        n: usize,
    ) -> Self {
        self.chunk_size = n.max(1);

        self
    }

    /// Returns a handle on the written lines.
    #[must_use]
    pub fn write_log(&self) -> WriteLog {
        self.written.clone()
    }

    fn line_written(
        &mut self,
        line: String,
    ) {
        trace!("scripted transport got line '{line}'");

        let matched = self
            .replies
            .front()
            .map_or(false, |reply| reply.line.as_ref().map_or(true, |l| *l == line));

        self.written.push(line);

        if !matched {
            return;
        }

        if let Some(reply) = self.replies.pop_front() {
            self.pending.extend(reply.output.as_bytes());

            if reply.then_eof {
                self.eof_after_pending = true;
            }
        }
    }
}

impl Transport for Scripted {
    fn open(&mut self) -> Result<(), OpsError> {
        let Some(script) = self.scripts.pop_front() else {
            return Err(OpsError::ConnectFailed {
                details: String::from("scripted transport has no script left to play"),
            });
        };

        self.pending = script.initial.into_bytes().into();
        self.replies = script.replies;
        self.eof_after_pending = script.eof_on_open;
        self.line_buf.clear();
        self.last_byte_was_cr = false;
        self.open = true;

        Ok(())
    }

    fn close(&mut self) -> Result<(), OpsError> {
        self.open = false;
        self.pending.clear();

        Ok(())
    }

    fn alive(&mut self) -> bool {
        self.open && !(self.eof_after_pending && self.pending.is_empty())
    }

    fn read_available(
        &mut self,
        deadline: Instant,
    ) -> Result<ReadOutcome, OpsError> {
        if !self.open {
            return Ok(ReadOutcome::eof());
        }

        if !self.pending.is_empty() {
            let n = self.chunk_size.min(self.pending.len());

            return Ok(ReadOutcome::data(self.pending.drain(..n).collect()));
        }

        if self.eof_after_pending {
            return Ok(ReadOutcome::eof());
        }

        // nothing can show up until the caller writes again, so just wait out the deadline
        thread::sleep(remaining(deadline));

        Ok(ReadOutcome::timed_out())
    }

    fn write(
        &mut self,
        b: &[u8],
    ) -> Result<(), OpsError> {
        if !self.open || (self.eof_after_pending && self.pending.is_empty()) {
            return Err(OpsError::WriteFailed {
                details: String::from("scripted transport is closed"),
            });
        }

        let mut line_ended = false;

        for byte in b {
            match byte {
                b'\n' if self.last_byte_was_cr => {}
                b'\r' | b'\n' => {
                    let line = String::from_utf8_lossy(&self.line_buf).into_owned();
                    self.line_buf.clear();
                    self.line_written(line);
                    line_ended = true;
                }
                _ => self.line_buf.push(*byte),
            }

            self.last_byte_was_cr = *byte == b'\r';
        }

        let wants_keystroke = self
            .replies
            .front()
            .map_or(false, |reply| reply.line.is_none());

        // keystrokes never reach the line buffer of a pager, they are consumed as is
        if !line_ended && wants_keystroke && !self.line_buf.is_empty() {
            let keys = String::from_utf8_lossy(&self.line_buf).into_owned();
            self.line_buf.clear();
            self.line_written(keys);
        }

        Ok(())
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    #[test]
    fn test_replies_follow_written_lines() {
        let mut transport = Scripted::new(
            Script::new()
                .output("login: ")
                .reply("root", "root@dut:~# "),
        )
        .chunk_size(3);
        let log = transport.write_log();

        transport.open().unwrap();

        let deadline = Instant::now() + Duration::from_millis(50);
        assert_eq!(transport.read_available(deadline).unwrap().bytes, b"log");
        assert_eq!(transport.read_available(deadline).unwrap().bytes, b"in:");
        assert_eq!(transport.read_available(deadline).unwrap().bytes, b" ");
        assert!(transport.read_available(deadline).unwrap().timed_out);

        transport.write(b"admin\r\n").unwrap();
        assert!(transport
            .read_available(Instant::now())
            .unwrap()
            .timed_out);

        assert_eq!(log.lines(), vec![String::from("admin")]);
    }

    #[test]
    fn test_eof_and_reopen() {
        let mut transport = Scripted::with_scripts(vec![
            Script::new().output("bye").eof(),
            Script::new().output("again"),
        ]);

        transport.open().unwrap();
        assert_eq!(
            transport.read_available(Instant::now()).unwrap().bytes,
            b"bye"
        );
        assert!(transport.read_available(Instant::now()).unwrap().eof);
        assert!(transport.write(b"x\r").is_err());

        transport.close().unwrap();
        transport.open().unwrap();
        assert_eq!(
            transport.read_available(Instant::now()).unwrap().bytes,
            b"again"
        );

        transport.close().unwrap();
        assert!(transport.open().is_err());
    }
}
