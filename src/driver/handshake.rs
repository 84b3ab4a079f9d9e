use super::Session;
use crate::channel::constants::{
    PASSWORD_SEEN_MAX,
    RECOVERY_SEEN_MAX,
    USER_SEEN_MAX,
};
use crate::channel::Category;
use crate::errors::OpsError;
use log::{
    debug,
    info,
    warn,
};
use std::time::Instant;

/// How many times each login prompt was answered so far.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct LoginCounts {
    pub(super) user_seen: u8,
    pub(super) password_seen: u8,
    pub(super) recoveries: u8,
}

impl Session {
    /// Provoke a prompt with a bare return and run the handshake until the root context prompt.
    pub(super) fn login(&mut self) -> Result<(), OpsError> {
        debug!("starting login handshake on '{}'", self.host());

        let deadline = Instant::now() + self.args.timeout_login;

        self.channel.write_return()?;

        self.handshake(deadline, LoginCounts::default())
    }

    /// Answer login prompts until the root context prompt shows up. Prompts of other contexts are
    /// backed out of with their exit command; confirmations, pagination and auto responses are
    /// answered along the way.
    pub(super) fn handshake(
        &mut self,
        deadline: Instant,
        mut counts: LoginCounts,
    ) -> Result<(), OpsError> {
        let root = self.platform.root_context();

        loop {
            let result = self
                .channel
                .expect(self.platform.session_table(), deadline)?;

            let Some(category) = self
                .platform
                .session_table()
                .category(result.matched_index)
                .cloned()
            else {
                continue;
            };

            match category {
                Category::Login => {
                    counts.user_seen += 1;

                    if counts.user_seen > USER_SEEN_MAX {
                        return Err(OpsError::LoginFailed {
                            details: format!(
                                "login prompt seen more than {USER_SEEN_MAX} times on '{}'",
                                self.host()
                            ),
                        });
                    }

                    debug!("login prompt seen, sending username");

                    let username = self.credentials.username.clone();
                    self.channel.write_and_return(username.as_bytes())?;
                }
                Category::Password => {
                    counts.password_seen += 1;

                    if counts.password_seen > PASSWORD_SEEN_MAX {
                        return Err(OpsError::LoginFailed {
                            details: format!(
                                "password prompt seen more than {PASSWORD_SEEN_MAX} times on '{}'",
                                self.host()
                            ),
                        });
                    }

                    debug!("password prompt seen, sending password");

                    let password = self.credentials.password.clone();
                    self.channel.write_and_return(password.as_bytes())?;
                }
                Category::LoginIncorrect => {
                    warn!("'{}' rejected the credentials", self.host());
                }
                Category::Prompt(context) if context == root => {
                    info!("logged in to '{}', at {root} prompt", self.host());

                    self.confirm_context(root);

                    return Ok(());
                }
                Category::Prompt(context) => {
                    counts.recoveries += 1;

                    if counts.recoveries > RECOVERY_SEEN_MAX {
                        return Err(OpsError::LoginFailed {
                            details: format!(
                                "could not back out of context {context} to {root} on '{}'",
                                self.host()
                            ),
                        });
                    }

                    let exit = self
                        .platform
                        .context(context)
                        .map(|definition| definition.exit.clone())
                        .unwrap_or_default();

                    warn!(
                        "found {context} prompt during login on '{}', sending '{exit}'",
                        self.host()
                    );

                    self.channel.write_and_return(exit.as_bytes())?;
                }
                Category::Confirm(kind) => {
                    debug!("confirmation prompt seen during login, answering");

                    self.channel.write_and_return(kind.answer(true).as_bytes())?;
                }
                Category::Pagination => {
                    let response = self.platform.pagination_response().to_owned();
                    self.channel.write(response.as_bytes())?;
                }
                Category::AutoRespond(response) => {
                    warn!(
                        "auto responding '{response}' to '{}' on '{}'",
                        result.text_after.trim(),
                        self.host()
                    );

                    self.channel.write_and_return(response.as_bytes())?;
                }
                Category::ConnectionFailure => {
                    return Err(OpsError::ConnectFailed {
                        details: format!(
                            "'{}' reported '{}'",
                            self.host(),
                            result.text_after.trim()
                        ),
                    });
                }
                Category::EndOfPrompt => {}
                Category::Eof => {
                    return Err(OpsError::LoginFailed {
                        details: format!(
                            "stream to '{}' ended during login, last output: '{}'",
                            self.host(),
                            result.text_before.trim()
                        ),
                    });
                }
                Category::Timeout => {
                    return Err(OpsError::Timeout {
                        details: format!(
                            "no shell prompt from '{}' during login, last output: '{}'",
                            self.host(),
                            result.text_before.trim()
                        ),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::driver::{
        Builder,
        Context,
        Credentials,
    };
    use crate::errors::OpsError;
    use crate::transport::base::Endpoint;
    use crate::transport::scripted::{
        Script,
        Scripted,
    };
    use core::time::Duration;

    fn builder(transport: Scripted) -> Builder {
        Builder::new(Endpoint::container("dut01"))
            .transport(Box::new(transport))
            .timeout_login(Duration::from_millis(300))
            .timeout_flush(Duration::from_millis(20))
    }

    #[test]
    fn test_login_reaches_linux() {
        let _ = env_logger::builder().is_test(true).try_init();

        let transport =
            Scripted::new(Script::new().reply("", "login: ").reply("root", "root@dut:~# "));
        let log = transport.write_log();

        let mut session = builder(transport).build().unwrap();
        session.open().unwrap();

        assert_eq!(session.current_context(), Some(Context::Linux));
        assert_eq!(log.commands(), vec![String::from("root")]);
    }

    #[test]
    fn test_login_with_password() {
        let transport = Scripted::new(
            Script::new()
                .output("Ubuntu 16.04\r\nlogin: ")
                .reply("", "")
                .reply("admin", "Password: ")
                .reply("secret", "Last login: never\r\n[root@host1 ~]# "),
        );
        let log = transport.write_log();

        let mut session = builder(transport)
            .platform_name("linux_host")
            .credentials(Credentials::new("admin", "secret"))
            .build()
            .unwrap();
        session.open().unwrap();

        assert_eq!(session.current_context(), Some(Context::Linux));
        assert_eq!(
            log.commands(),
            vec![String::from("admin"), String::from("secret")]
        );
    }

    #[test]
    fn test_login_backs_out_of_vtysh() {
        let transport = Scripted::new(
            Script::new()
                .reply("", "switch(config)# ")
                .reply("end", "switch# ")
                .reply("exit", "root@dut:~# "),
        );
        let log = transport.write_log();

        let mut session = builder(transport).build().unwrap();
        session.open().unwrap();

        assert_eq!(session.current_context(), Some(Context::Linux));
        assert_eq!(
            log.commands(),
            vec![String::from("end"), String::from("exit")]
        );
    }

    #[test]
    fn test_login_answers_onie_and_confirmations() {
        let transport = Scripted::new(
            Script::new()
                .reply("", "ONIE:/ # ")
                .reply("reboot", "Are you sure you want to continue connecting (yes/no)? ")
                .reply("yes", "login: ")
                .reply("root", "root@dut:~# "),
        );
        let log = transport.write_log();

        let mut session = builder(transport).build().unwrap();
        session.open().unwrap();

        assert_eq!(
            log.commands(),
            vec![
                String::from("reboot"),
                String::from("yes"),
                String::from("root")
            ]
        );
    }

    #[test]
    fn test_repeated_login_prompts_fail_after_retry() {
        let looping = || {
            Script::new()
                .reply("", "login: ")
                .reply("root", "Login incorrect\r\nlogin: ")
                .reply("root", "Login incorrect\r\nlogin: ")
        };
        let transport = Scripted::with_scripts(vec![looping(), looping()]);
        let log = transport.write_log();

        let mut session = builder(transport).build().unwrap();

        assert!(matches!(
            session.open(),
            Err(OpsError::LoginFailed { .. })
        ));
        assert_eq!(session.current_context(), None);
        assert_eq!(log.commands().len(), 4);
    }

    #[test]
    fn test_login_retried_once_after_timeout() {
        let transport = Scripted::with_scripts(vec![
            Script::new().output("booting..."),
            Script::new().reply("", "login: ").reply("root", "root@dut:~# "),
        ]);

        let mut session = builder(transport).build().unwrap();
        session.open().unwrap();

        assert_eq!(session.current_context(), Some(Context::Linux));
    }

    #[test]
    fn test_login_timeout_after_retry_is_fatal() {
        let transport = Scripted::with_scripts(vec![
            Script::new().output("booting..."),
            Script::new().output("still booting..."),
        ]);

        let mut session = builder(transport).build().unwrap();

        assert!(matches!(session.open(), Err(OpsError::Timeout { .. })));
    }

    #[test]
    fn test_connection_failure_is_not_retried() {
        let transport = Scripted::new(
            Script::new().output("telnet: Unable to connect to remote host: Connection refused"),
        );

        let mut session = builder(transport).build().unwrap();

        assert!(matches!(
            session.open(),
            Err(OpsError::ConnectFailed { .. })
        ));
    }
}
