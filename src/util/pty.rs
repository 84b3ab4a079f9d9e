use log::warn;
use nix::errno::Errno;
use nix::libc::STDIN_FILENO;
use nix::pty::{
    forkpty,
    Winsize,
};
use nix::sys::signal::{
    self,
    Signal,
};
use nix::sys::termios::{
    self,
    LocalFlags,
    SetArg,
    Termios,
};
use nix::sys::wait::{
    waitpid,
    WaitPidFlag,
    WaitStatus,
};
use nix::unistd::{
    ForkResult,
    Pid,
};
use nix::libc::_exit;
use std::fs::File;
use std::os::unix::io::FromRawFd;
use std::os::unix::process::CommandExt;
use std::process::Command;
use std::thread;
use std::time::{
    Duration,
    Instant,
};

/// How long `terminate` keeps sending SIGTERM before switching to SIGKILL.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(2);

const TERMINATE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exit code of a child whose program could not be executed, as shells report it.
const EXEC_FAILED_STATUS: i32 = 127;

/// `PtyChild` is a program running on the slave side of a fresh pty, with echo turned off. The
/// child is terminated when the `PtyChild` is dropped.
pub struct PtyChild {
    master: File,
    pid: Pid,
    kill_timeout: Duration,
}

impl PtyChild {
    /// Fork `command` onto a new pty.
    ///
    /// # Errors
    ///
    /// Returns the `nix::Error` of the failed `forkpty`.
    pub fn spawn(mut command: Command) -> nix::Result<Self> {
        // SAFETY: the child only adjusts its own terminal and then execs or exits.
        let forked = unsafe { forkpty(None::<&Winsize>, None::<&Termios>)? };

        match forked.fork_result {
            ForkResult::Child => {
                if let Ok(mut attrs) = termios::tcgetattr(STDIN_FILENO) {
                    attrs.local_flags &= !LocalFlags::ECHO;
                    let _ = termios::tcsetattr(STDIN_FILENO, SetArg::TCSANOW, &attrs);
                }

                let _err = command.exec();

                // SAFETY: _exit only terminates the forked child.
                unsafe { _exit(EXEC_FAILED_STATUS) }
            }
            ForkResult::Parent { child } => {
                // SAFETY: forkpty hands the master descriptor to the parent and nobody else.
                let master = unsafe { File::from_raw_fd(forked.master) };

                Ok(Self {
                    master,
                    pid: child,
                    kill_timeout: DEFAULT_KILL_TIMEOUT,
                })
            }
        }
    }

    /// The master side of the pty.
    pub const fn master(&self) -> &File {
        &self.master
    }

    /// Non blocking status of the child; `None` once it has been reaped.
    #[must_use]
    pub fn status(&self) -> Option<WaitStatus> {
        waitpid(self.pid, Some(WaitPidFlag::WNOHANG)).ok()
    }

    /// Stop the child and reap it, blocking until it is gone. SIGTERM is repeated until
    /// `kill_timeout` passes, after that SIGKILL is sent instead.
    ///
    /// # Errors
    ///
    /// Returns the `nix::Error` of a failed signal or wait.
    pub fn terminate(&mut self) -> nix::Result<WaitStatus> {
        let start = Instant::now();
        let mut sig = Signal::SIGTERM;

        loop {
            match signal::kill(self.pid, sig) {
                Ok(()) => {}
                Err(Errno::ESRCH) => return Ok(WaitStatus::Exited(self.pid, 0)),
                Err(err) => return Err(err),
            }

            match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => {}
                Ok(status) => return Ok(status),
                Err(Errno::ECHILD) => return Ok(WaitStatus::Exited(self.pid, 0)),
                Err(err) => return Err(err),
            }

            if start.elapsed() > self.kill_timeout {
                sig = Signal::SIGKILL;
            }

            thread::sleep(TERMINATE_POLL_INTERVAL);
        }
    }
}

impl Drop for PtyChild {
    fn drop(&mut self) {
        if self.status() == Some(WaitStatus::StillAlive) {
            if let Err(err) = self.terminate() {
                warn!("failed stopping pty child {} on drop, error: {err}", self.pid);
            }
        }
    }
}
