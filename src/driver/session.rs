use crate::channel::Channel;
use crate::driver::{
    Builder,
    Context,
};
use crate::errors::OpsError;
use crate::platform::Platform;
use crate::transport::base::Endpoint;
use core::time::Duration;
use log::{
    info,
    warn,
};

/// The username/password pair used for unattended login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The user(name) sent at login prompts.
    pub username: String,
    /// The password sent at password prompts.
    pub password: String,
}

impl Credentials {
    /// Returns a new `Credentials` instance.
    #[must_use]
    pub fn new(
        username: &str,
        password: &str,
    ) -> Self {
        Self {
            username: username.to_owned(),
            password: password.to_owned(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("root", "")
    }
}

/// Settings of a `Session`, filled in by the `Builder`.
#[derive(Debug, Clone)]
pub struct Args {
    /// The default deadline of a single command.
    pub timeout_ops: Duration,
    /// The deadline of the whole login handshake.
    pub timeout_login: Duration,
    /// How long to wait for trailing banner text after login.
    pub timeout_flush: Duration,
    /// The context sessions settle in after login.
    pub default_context: Context,
    /// Answer confirmation prompts affirmatively unless a command says otherwise.
    pub confirm: bool,
    /// Classify command output unless a command says otherwise.
    pub error_check: bool,
    /// Check `$?` after commands finishing at a root prompt unless a command says otherwise.
    pub exit_status_check: bool,
}

/// `Session` is a live, logged in connection to one device. It owns its channel (and so its
/// transport) exclusively and tracks the shell context the device is in. Every operation takes
/// `&mut self`, commands on one session are therefore strictly serialized.
pub struct Session {
    /// The settings the session was built with.
    pub args: Args,
    pub(crate) channel: Channel,
    pub(crate) platform: Platform,
    pub(crate) credentials: Credentials,
    pub(super) current_context: Option<Context>,
    host: String,
}

impl Session {
    pub(crate) fn new(
        args: Args,
        channel: Channel,
        platform: Platform,
        credentials: Credentials,
        host: String,
    ) -> Self {
        Self {
            args,
            channel,
            platform,
            credentials,
            current_context: None,
            host,
        }
    }

    /// Builds and opens a session to `endpoint` with all other settings left to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::ConnectFailed`, `OpsError::LoginFailed` or `OpsError::Timeout` if the
    /// device cannot be reached or logged into (after one retry), or any error raised while
    /// entering the platform default context.
    pub fn connect(
        endpoint: Endpoint,
        credentials: Credentials,
        platform: Platform,
    ) -> Result<Self, OpsError> {
        let mut session = Builder::new(endpoint)
            .credentials(credentials)
            .platform(platform)
            .build()?;

        session.open()?;

        Ok(session)
    }

    /// Open the transport, log in, swallow any trailing banner and settle in the default context.
    /// A login that fails or times out is retried exactly once on a fresh transport.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::ConnectFailed` if the transport cannot be opened or the device reports a
    /// connection failure, `OpsError::LoginFailed` / `OpsError::Timeout` if the retried login
    /// still fails, or any error raised while entering the default context.
    pub fn open(&mut self) -> Result<(), OpsError> {
        info!("opening session to '{}'", self.host);

        self.current_context = None;
        self.channel.open()?;

        match self.login() {
            Ok(()) => {}
            Err(err) if err.is_login_retryable() => {
                warn!(
                    "login to '{}' failed, resetting transport and retrying once, error: {err}",
                    self.host
                );

                self.channel.reset()?;
                self.login()?;
            }
            Err(err) => return Err(err),
        }

        self.channel
            .flush(self.platform.flush_table(), self.args.timeout_flush)?;

        if self.args.default_context != self.platform.root_context() {
            self.restore_default_context()?;
        }

        info!(
            "session to '{}' ready in context {}",
            self.host,
            self.current_context.map_or_else(|| String::from("?"), |c| c.to_string())
        );

        Ok(())
    }

    /// Close the transport and flush the session log; closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an `OpsError` if the transport or the session log fail to close.
    pub fn close(&mut self) -> Result<(), OpsError> {
        info!("closing session to '{}'", self.host);

        self.current_context = None;
        self.channel.close()?;

        if let Some(session_log) = self.channel.session_log() {
            session_log.flush()?;
        }

        Ok(())
    }

    /// Returns the context the device was last confirmed to be in, `None` when not logged in.
    #[must_use]
    pub const fn current_context(&self) -> Option<Context> {
        self.current_context
    }

    /// Returns the platform of the session.
    #[must_use]
    pub const fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Returns the host label of the session.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Indicates if the session is logged in and its transport is alive.
    pub fn alive(&mut self) -> bool {
        self.current_context.is_some() && self.channel.alive()
    }
}
