use crate::channel::constants::{
    DEFAULT_TIMEOUT_FLUSH,
    DEFAULT_TIMEOUT_LOGIN,
};
use crate::channel::{
    Args as ChannelArgs,
    Channel,
};
use crate::driver::session::{
    Args,
    Credentials,
    Session,
};
use crate::driver::Context;
use crate::errors::OpsError;
use crate::platform::Platform;
use crate::session_log::SessionLog;
use crate::transport::base::{
    new_transport,
    Endpoint,
    Transport,
    TransportArgs,
};
use core::time::Duration;

/// The platform used when none is given.
pub const DEFAULT_PLATFORM: &str = "openswitch";

/// `Builder` holds the settings/defaults used to build a `Session`. Anything left unset falls
/// back to the platform defaults.
pub struct Builder {
    endpoint: Endpoint,
    credentials: Credentials,
    platform: Option<Platform>,
    platform_name: Option<String>,
    timeout_ops: Option<Duration>,
    timeout_login: Duration,
    timeout_flush: Duration,
    default_context: Option<Context>,
    confirm: bool,
    error_check: bool,
    exit_status_check: Option<bool>,
    channel_args: ChannelArgs,
    transport_args: TransportArgs,
    transport: Option<Box<dyn Transport + Send>>,
    session_log: Option<SessionLog>,
}

#[allow(clippy::missing_const_for_fn)]
#[allow(clippy::return_self_not_must_use)]
#[allow(clippy::must_use_candidate)]
impl Builder {
    /// Return a new instance of `Builder` for `endpoint` with sane defaults set.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            credentials: Credentials::default(),
            platform: None,
            platform_name: None,
            timeout_ops: None,
            timeout_login: DEFAULT_TIMEOUT_LOGIN,
            timeout_flush: DEFAULT_TIMEOUT_FLUSH,
            default_context: None,
            confirm: true,
            error_check: true,
            exit_status_check: None,
            channel_args: ChannelArgs::default(),
            transport_args: TransportArgs::default(),
            transport: None,
            session_log: None,
        }
    }

    /// Sets the credentials used to log in.
    pub fn credentials(
        mut self,
        credentials: Credentials,
    ) -> Self {
        self.credentials = credentials;

        self
    }

    /// Sets the user(name) to use for login.
    pub fn username(
        mut self,
        s: &str,
    ) -> Self {
        self.credentials.username = s.to_owned();

        self
    }

    /// Sets the password to use for login.
    pub fn password(
        mut self,
        s: &str,
    ) -> Self {
        self.credentials.password = s.to_owned();

        self
    }

    /// Sets an already loaded platform, this wins over `platform_name`.
    pub fn platform(
        mut self,
        platform: Platform,
    ) -> Self {
        self.platform = Some(platform);

        self
    }

    /// Sets the name of a bundled platform, ex: "`linux_host`". An unknown name is reported by
    /// `build`.
    pub fn platform_name(
        mut self,
        s: &str,
    ) -> Self {
        self.platform_name = Some(s.to_owned());

        self
    }

    /// Sets the default per command timeout, overriding the platform value.
    pub fn timeout_ops(
        mut self,
        d: Duration,
    ) -> Self {
        self.timeout_ops = Some(d);

        self
    }

    /// Sets the deadline of the whole login handshake.
    pub fn timeout_login(
        mut self,
        d: Duration,
    ) -> Self {
        self.timeout_login = d;

        self
    }

    /// Sets how long to wait for trailing banner text after login.
    pub fn timeout_flush(
        mut self,
        d: Duration,
    ) -> Self {
        self.timeout_flush = d;

        self
    }

    /// Sets the `timeout_socket` parameter of the transport.
    pub fn timeout_socket(
        mut self,
        d: Duration,
    ) -> Self {
        self.transport_args.timeout_socket = d;

        self
    }

    /// Sets the read size of the underlying transport.
    pub fn read_size(
        mut self,
        i: u16,
    ) -> Self {
        self.transport_args.read_size = i;

        self
    }

    /// Sets the `return_char` of the channel object.
    pub fn return_char(
        mut self,
        s: &str,
    ) -> Self {
        self.channel_args.return_char = s.to_owned();

        self
    }

    /// Enable or disable stripping ansi escapes from device output.
    pub fn strip_ansi(
        mut self,
        b: bool,
    ) -> Self {
        self.channel_args.strip_ansi = b;

        self
    }

    /// Sets the context sessions settle in after login, overriding the platform value.
    pub fn default_context(
        mut self,
        context: Context,
    ) -> Self {
        self.default_context = Some(context);

        self
    }

    /// Answer confirmation prompts affirmatively (the default) or not.
    pub fn confirm(
        mut self,
        b: bool,
    ) -> Self {
        self.confirm = b;

        self
    }

    /// Enable or disable classifying command output.
    pub fn error_check(
        mut self,
        b: bool,
    ) -> Self {
        self.error_check = b;

        self
    }

    /// Enable or disable checking `$?` after commands, overriding the platform value.
    pub fn exit_status_check(
        mut self,
        b: bool,
    ) -> Self {
        self.exit_status_check = Some(b);

        self
    }

    /// Mirror all session traffic into `session_log`.
    pub fn session_log(
        mut self,
        session_log: SessionLog,
    ) -> Self {
        self.session_log = Some(session_log);

        self
    }

    /// Use `transport` instead of the one the endpoint would get.
    pub fn transport(
        mut self,
        transport: Box<dyn Transport + Send>,
    ) -> Self {
        self.transport = Some(transport);

        self
    }

    /// Build "builds" and returns a (not yet opened) `Session` object.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::Platform` if the platform cannot be loaded, or
    /// `OpsError::UnsupportedContext` if the default context is not one the platform declares.
    pub fn build(self) -> Result<Session, OpsError> {
        let platform = match (self.platform, self.platform_name) {
            (Some(platform), _) => platform,
            (None, Some(name)) => Platform::new(&name)?,
            (None, None) => Platform::new(DEFAULT_PLATFORM)?,
        };

        let default_context = self
            .default_context
            .unwrap_or_else(|| platform.default_context());

        if !platform.supports(default_context) {
            return Err(OpsError::UnsupportedContext {
                context: default_context,
                platform: platform.platform_type().to_owned(),
            });
        }

        let args = Args {
            timeout_ops: self.timeout_ops.unwrap_or_else(|| platform.timeout_ops()),
            timeout_login: self.timeout_login,
            timeout_flush: self.timeout_flush,
            default_context,
            confirm: self.confirm,
            error_check: self.error_check,
            exit_status_check: self
                .exit_status_check
                .unwrap_or_else(|| platform.exit_status_check()),
        };

        let host = self.endpoint.label();

        let transport = match self.transport {
            Some(transport) => transport,
            None => new_transport(self.endpoint, self.transport_args),
        };

        let mut channel = Channel::new(self.channel_args, transport);

        if let Some(session_log) = self.session_log {
            channel.set_session_log(session_log);
        }

        Ok(Session::new(
            args,
            channel,
            platform,
            self.credentials,
            host,
        ))
    }
}
