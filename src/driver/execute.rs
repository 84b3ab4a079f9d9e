use super::handshake::LoginCounts;
use super::{
    Context,
    Session,
};
use crate::channel::constants::PASSWORD_SEEN_MAX;
use crate::channel::Category;
use crate::classifier::{
    classify,
    crash_signature,
    ErrorCategory,
};
use crate::errors::OpsError;
use crate::response::{
    CommandResult,
    MultiResult,
};
use core::time::Duration;
use log::{
    debug,
    error,
    info,
    warn,
};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::time::Instant;

/// The command used to read the exit status of the previous shell command.
const EXIT_STATUS_COMMAND: &str = "echo $?";

/// `Options` holds per command overrides of the session settings; `None` means "use the session
/// setting".
#[derive(Debug, Default, Clone)]
pub struct Options {
    /// Deadline of the command, measured from when it is sent.
    pub timeout: Option<Duration>,
    /// Classify the command output.
    pub error_check: Option<bool>,
    /// Answer confirmation prompts affirmatively.
    pub confirm: Option<bool>,
    /// Check `$?` when the command finishes at a root context prompt.
    pub exit_status_check: Option<bool>,
}

impl Options {
    /// Returns options overriding only the timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }
}

/// What happened while waiting for one command to finish.
#[derive(Debug, Default)]
struct Exchange {
    raw_output: String,
    context: Option<Context>,
    failure: Option<ErrorCategory>,
}

/// # Panics
///
///  Returns (once), the compiled pattern of an `echo $?` output line. This should realistically
///  never panic.
#[allow(clippy::expect_used)]
fn exit_status_pattern() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*([0-9]+)\s*$").expect("failed compiling pattern, this is a bug")
    })
}

/// Normalizes line endings, drops the echoed command line and trims surrounding blank lines.
fn process_output(
    command: &str,
    raw_output: &str,
) -> String {
    let normalized = raw_output.replace("\r\n", "\n").replace('\r', "");

    let mut lines: Vec<&str> = normalized.lines().collect();

    while lines.first().map_or(false, |line| line.trim().is_empty()) {
        lines.remove(0);
    }

    let command = command.trim();

    if !command.is_empty() && lines.first().map_or(false, |line| line.trim_end().ends_with(command))
    {
        lines.remove(0);
    }

    while lines.first().map_or(false, |line| line.trim().is_empty()) {
        lines.remove(0);
    }

    while lines.last().map_or(false, |line| line.trim().is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

impl Session {
    /// Execute `command` with the session default options.
    ///
    /// # Errors
    ///
    /// See `execute_with_options`.
    pub fn execute(
        &mut self,
        command: &str,
    ) -> Result<CommandResult, OpsError> {
        self.execute_with_options(command, &Options::default())
    }

    /// Execute `command` and wait for it to finish at a shell prompt.
    ///
    /// Pagination markers are answered and left out of the output, confirmation prompts are
    /// answered and end the command, a dropped session is logged back into once and the command
    /// resent once. A timeout, end of stream or connection failure banner does not raise: the
    /// result carries exit status 1 and the matching `ErrorCategory`. Otherwise the output is
    /// classified (unless disabled) and, at a root context prompt, `$?` may be checked.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::RemoteCrash` when the output holds a crash signature, whatever the
    /// options; any transport level error is passed through.
    pub fn execute_with_options(
        &mut self,
        command: &str,
        options: &Options,
    ) -> Result<CommandResult, OpsError> {
        if self.current_context.is_none() {
            return Err(OpsError::Transport {
                details: format!(
                    "session to '{}' is not open, cannot execute '{command}'",
                    self.host()
                ),
            });
        }

        let timeout = options.timeout.unwrap_or(self.args.timeout_ops);
        let error_check = options.error_check.unwrap_or(self.args.error_check);
        let confirm = options.confirm.unwrap_or(self.args.confirm);
        let exit_status_check = options
            .exit_status_check
            .unwrap_or(self.args.exit_status_check);

        info!("executing '{command}' on '{}'", self.host());

        let mut result = CommandResult::new(command, self.host());

        let exchange = self.exchange(command, timeout, confirm)?;
        let output = process_output(command, &exchange.raw_output);

        if let Some(context) = exchange.context {
            self.confirm_context(context);
        }

        if let Some(line) = crash_signature(&exchange.raw_output) {
            error!(
                "'{}' crashed while running '{command}': {line}",
                self.host()
            );

            return Err(OpsError::RemoteCrash {
                command: command.to_owned(),
                details: line,
            });
        }

        result.context = exchange.context;

        if let Some(failure) = exchange.failure {
            result.fail(failure);
        } else {
            if error_check {
                let classification = classify(&output);

                if let Some(category) = classification.category {
                    debug!(
                        "'{command}' output matched error signature '{category}' on line '{}'",
                        classification.line.as_deref().unwrap_or_default()
                    );

                    result.fail(category);
                }
            }

            if !result.failed()
                && exit_status_check
                && exchange.context == Some(self.platform.root_context())
            {
                let exit_status = self.remote_exit_status(timeout)?;

                if exit_status != 0 {
                    result.exit_status = exit_status;
                    result.error_category = Some(ErrorCategory::RemoteExitStatus);
                }
            }
        }

        result.record(exchange.raw_output, output);

        if result.failed() {
            warn!(
                "'{command}' on '{}' failed with exit status {}",
                self.host(),
                result.exit_status
            );
        }

        Ok(result)
    }

    /// Execute each of `commands` in order, stopping at the first failure if `stop_on_failed`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by `execute_with_options`.
    pub fn execute_many(
        &mut self,
        commands: &[&str],
        options: &Options,
        stop_on_failed: bool,
    ) -> Result<MultiResult, OpsError> {
        let mut multi_result = MultiResult::new(self.host());

        for command in commands {
            let result = self.execute_with_options(command, options)?;
            let failed = result.failed();

            multi_result.record_result(result);

            if failed && stop_on_failed {
                debug!("'{command}' failed, skipping the remaining commands");

                break;
            }
        }

        Ok(multi_result)
    }

    /// Enter `context`, execute `command` there, then return to the context the session was in.
    ///
    /// # Errors
    ///
    /// Returns any error raised by the context transitions or by `execute_with_options`.
    pub fn execute_in_context(
        &mut self,
        context: Context,
        command: &str,
        options: &Options,
    ) -> Result<CommandResult, OpsError> {
        let previous = self.current_context;

        self.ensure_context(context)?;

        let result = self.execute_with_options(command, options)?;

        if let Some(previous) = previous {
            self.ensure_context(previous)?;
        }

        Ok(result)
    }

    /// Reads `$?` of the previous command; a failure to read it counts as exit status 1.
    fn remote_exit_status(
        &mut self,
        timeout: Duration,
    ) -> Result<i32, OpsError> {
        let exchange = self.exchange(EXIT_STATUS_COMMAND, timeout, true)?;

        if let Some(context) = exchange.context {
            self.confirm_context(context);
        }

        if let Some(failure) = exchange.failure {
            warn!("could not read exit status on '{}': {failure}", self.host());

            return Ok(failure.code());
        }

        let output = process_output(EXIT_STATUS_COMMAND, &exchange.raw_output);

        let Some(status) = exit_status_pattern()
            .captures_iter(&output)
            .last()
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i32>().ok())
        else {
            warn!(
                "could not parse exit status from '{output}' on '{}'",
                self.host()
            );

            return Ok(1);
        };

        Ok(status)
    }

    /// Drain, send `command`, and run the session table until a terminal condition. Every
    /// `text_before` fragment is kept; pagination markers themselves never are.
    fn exchange(
        &mut self,
        command: &str,
        timeout: Duration,
        confirm: bool,
    ) -> Result<Exchange, OpsError> {
        let mut exchange = Exchange::default();
        let mut relogged_in = false;
        let mut password_seen = 0;

        self.channel.drain()?;

        if let Err(err) = self.channel.write_and_return(command.as_bytes()) {
            warn!("failed sending '{command}' to '{}': {err}", self.host());

            exchange.failure = Some(ErrorCategory::EndOfStream);

            return Ok(exchange);
        }

        let mut deadline = Instant::now() + timeout;

        loop {
            let matched = self
                .channel
                .expect(self.platform.session_table(), deadline)?;

            exchange.raw_output.push_str(&matched.text_before);

            let Some(category) = self
                .platform
                .session_table()
                .category(matched.matched_index)
                .cloned()
            else {
                continue;
            };

            let sent = match category {
                Category::Prompt(context) => {
                    exchange.context = Some(context);

                    return Ok(exchange);
                }
                Category::Pagination => {
                    debug!("pagination marker seen, asking for the next page");

                    let response = self.platform.pagination_response().to_owned();
                    self.channel.write(response.as_bytes())
                }
                Category::Confirm(kind) => {
                    let answer = kind.answer(confirm);

                    debug!("confirmation prompt seen, answering '{answer}'");

                    exchange.raw_output.push_str(&matched.text_after);

                    if let Err(err) = self.channel.write_and_return(answer.as_bytes()) {
                        warn!("failed answering confirmation: {err}");

                        exchange.failure = Some(ErrorCategory::EndOfStream);

                        return Ok(exchange);
                    }

                    // whatever the answer triggers must not leak into the next command
                    self.channel
                        .flush(self.platform.flush_table(), self.args.timeout_flush)?;

                    return Ok(exchange);
                }
                Category::Login => {
                    if relogged_in {
                        error!(
                            "'{}' dropped to a login prompt again while running '{command}'",
                            self.host()
                        );

                        exchange.failure = Some(ErrorCategory::LoginFailed);

                        return Ok(exchange);
                    }

                    relogged_in = true;

                    warn!(
                        "'{}' dropped to a login prompt while running '{command}', logging in \
                        and resending",
                        self.host()
                    );

                    match self.relogin() {
                        Ok(()) => {}
                        Err(err) => {
                            warn!("re-login to '{}' failed: {err}", self.host());

                            exchange.failure = Some(ErrorCategory::LoginFailed);

                            return Ok(exchange);
                        }
                    }

                    exchange.raw_output.clear();
                    deadline = Instant::now() + timeout;

                    self.channel.write_and_return(command.as_bytes())
                }
                Category::Password => {
                    password_seen += 1;

                    if password_seen > PASSWORD_SEEN_MAX {
                        exchange.failure = Some(ErrorCategory::LoginFailed);

                        return Ok(exchange);
                    }

                    let password = self.credentials.password.clone();
                    self.channel.write_and_return(password.as_bytes())
                }
                Category::AutoRespond(response) => {
                    self.channel.write_and_return(response.as_bytes())
                }
                Category::LoginIncorrect | Category::EndOfPrompt => Ok(()),
                Category::ConnectionFailure => {
                    exchange.raw_output.push_str(&matched.text_after);
                    exchange.failure = Some(ErrorCategory::ConnectionLost);

                    return Ok(exchange);
                }
                Category::Eof => {
                    exchange.failure = Some(ErrorCategory::EndOfStream);

                    return Ok(exchange);
                }
                Category::Timeout => {
                    exchange.failure = Some(ErrorCategory::Timeout);

                    return Ok(exchange);
                }
            };

            if let Err(err) = sent {
                warn!("failed writing to '{}': {err}", self.host());

                exchange.failure = Some(ErrorCategory::EndOfStream);

                return Ok(exchange);
            }
        }
    }

    /// Answer a login prompt that showed up mid command and run the handshake back to the root
    /// context prompt.
    fn relogin(&mut self) -> Result<(), OpsError> {
        let deadline = Instant::now() + self.args.timeout_login;

        let username = self.credentials.username.clone();
        self.channel.write_and_return(username.as_bytes())?;

        self.handshake(
            deadline,
            LoginCounts {
                user_seen: 1,
                ..LoginCounts::default()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{
        Builder,
        Session,
    };
    use crate::transport::base::Endpoint;
    use crate::transport::scripted::{
        Script,
        Scripted,
        WriteLog,
    };

    const LINUX_PROMPT: &str = "\r\nroot@dut:~# ";
    const SHELL_PROMPT: &str = "\r\nswitch# ";
    const CONFIG_PROMPT: &str = "\r\nswitch(config)# ";

    fn logged_in() -> Script {
        Script::new().reply("", "login: ").reply("root", "root@dut:~# ")
    }

    fn session_with(
        script: Script,
        platform: &str,
    ) -> (Session, WriteLog) {
        let transport = Scripted::new(script);
        let log = transport.write_log();

        let mut session = Builder::new(Endpoint::container("dut01"))
            .transport(Box::new(transport))
            .platform_name(platform)
            .timeout_login(Duration::from_millis(300))
            .timeout_flush(Duration::from_millis(20))
            .build()
            .unwrap();
        session.open().unwrap();

        (session, log)
    }

    fn session(script: Script) -> (Session, WriteLog) {
        session_with(script, "openswitch")
    }

    #[test]
    fn test_process_output() {
        assert_eq!(
            process_output("show vlan", "show vlan\r\n\r\nVLAN 1\r\nVLAN 10\r\n"),
            "VLAN 1\nVLAN 10"
        );
        assert_eq!(process_output("true", "true\r\n"), "");
        assert_eq!(process_output("", "\r\nhello\r\n"), "hello");
    }

    #[test]
    fn test_execute_captures_output_and_context() {
        let (mut session, _) = session(logged_in().reply(
            "uname -a",
            &format!("uname -a\r\nLinux dut 4.4.0\r\n{LINUX_PROMPT}"),
        ));

        let result = session.execute("uname -a").unwrap();

        assert_eq!(result.exit_status, 0);
        assert_eq!(result.output, "Linux dut 4.4.0");
        assert_eq!(result.context, Some(Context::Linux));
        assert_eq!(result.error_category, None);
    }

    #[test]
    fn test_unknown_command_is_classified() {
        let (mut session, log) = session(
            logged_in()
                .reply("vtysh", &format!("vtysh{SHELL_PROMPT}"))
                .reply("vlan 10", &format!("vlan 10\r\n% Unknown command.{SHELL_PROMPT}")),
        );
        session.ensure_context(Context::ShellMode).unwrap();

        let result = session
            .execute_with_options("vlan 10", &Options::with_timeout(Duration::from_secs(5)))
            .unwrap();

        assert_ne!(result.exit_status, 0);
        assert_eq!(result.error_category, Some(ErrorCategory::UnknownCommand));
        assert_eq!(result.output, "% Unknown command.");
        assert!(result.clone().into_result().is_err());
        assert_eq!(
            log.commands(),
            vec!["root", "vtysh", "vlan 10"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_error_check_can_be_disabled() {
        let (mut session, _) = session(
            logged_in().reply("ls /nope", "ls: cannot access: Permission denied\r\nroot@dut:~# "),
        );

        let options = Options {
            error_check: Some(false),
            ..Options::default()
        };
        let result = session.execute_with_options("ls /nope", &options).unwrap();

        assert_eq!(result.exit_status, 0);
        assert_eq!(result.error_category, None);
    }

    #[test]
    fn test_timeout_is_a_failed_result() {
        let (mut session, _) = session(logged_in().reply("sleep 100", "sleep 100\r\n"));

        let start = Instant::now();
        let result = session
            .execute_with_options("sleep 100", &Options::with_timeout(Duration::from_secs(2)))
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(result.exit_status, 1);
        assert_eq!(result.error_category, Some(ErrorCategory::Timeout));
        assert_eq!(result.context, None);
        assert_eq!(session.current_context(), Some(Context::Linux));
    }

    #[test]
    fn test_end_of_stream_is_a_failed_result() {
        let (mut session, _) = session(logged_in().reply_then_eof("reboot", "reboot\r\nbye\r\n"));

        let result = session.execute("reboot").unwrap();

        assert_eq!(result.exit_status, 1);
        assert_eq!(result.error_category, Some(ErrorCategory::EndOfStream));
        assert_eq!(result.output, "bye");

        // the next command cannot even be written
        let result = session.execute("true").unwrap();

        assert_eq!(result.error_category, Some(ErrorCategory::EndOfStream));
    }

    #[test]
    fn test_pagination_is_drained() {
        let pages = 3;
        let mut output = String::from("show running-config\r\n");

        for page in 0..pages {
            output.push_str(&format!("line {page}\r\n--More--"));
        }

        let mut script = logged_in()
            .reply("vtysh", &format!("vtysh{SHELL_PROMPT}"))
            .reply("show running-config", &output);

        for _ in 0..pages - 1 {
            script = script.reply_any("");
        }

        let (mut session, log) = session(script.reply_any(&format!("end{SHELL_PROMPT}")));
        session.ensure_context(Context::ShellMode).unwrap();

        let result = session.execute("show running-config").unwrap();

        assert_eq!(result.exit_status, 0);
        assert_eq!(result.output, "line 0\nline 1\nline 2\nend");
        assert!(!result.raw_output.contains("--More--"));
        assert_eq!(
            log.lines().iter().filter(|l| l.as_str() == " ").count(),
            pages
        );
    }

    #[test]
    fn test_confirmation_answered_and_terminates() {
        let (mut session, log) = session(
            logged_in()
                .reply("vtysh", &format!("vtysh{SHELL_PROMPT}"))
                .reply(
                    "erase startup-config",
                    "erase startup-config\r\nDo you want to continue [y/n]? ",
                ),
        );
        session.ensure_context(Context::ShellMode).unwrap();

        let result = session.execute("erase startup-config").unwrap();

        assert_eq!(result.exit_status, 0);
        assert_eq!(result.context, None);
        assert_eq!(log.commands().last().map(String::as_str), Some("y"));

        let options = Options {
            confirm: Some(false),
            ..Options::default()
        };
        let (mut session, log) = session_with(
            logged_in().reply("rm -i f", "rm: remove regular file 'f'? (yes/no)? "),
            "linux_host",
        );
        let result = session.execute_with_options("rm -i f", &options).unwrap();

        assert_eq!(result.exit_status, 0);
        assert_eq!(log.commands().last().map(String::as_str), Some("no"));
    }

    #[test]
    fn test_output_after_confirmation_stays_with_it() {
        let (mut session, log) = session(
            logged_in()
                .reply("vtysh", &format!("vtysh{SHELL_PROMPT}"))
                .reply(
                    "erase startup-config",
                    "erase startup-config\r\nDo you want to continue [y/n]? ",
                )
                .reply("y", &format!("y\r\nErasing startup config...{SHELL_PROMPT}"))
                .reply("show version", &format!("show version\r\nOpenSwitch 0.4{SHELL_PROMPT}")),
        );
        session.ensure_context(Context::ShellMode).unwrap();

        session.execute("erase startup-config").unwrap();
        let result = session.execute("show version").unwrap();

        assert_eq!(result.output, "OpenSwitch 0.4");
        assert_eq!(result.context, Some(Context::ShellMode));
        assert_eq!(
            log.commands(),
            vec!["root", "vtysh", "erase startup-config", "y", "show version"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_login_drop_relogs_and_resends_once() {
        let (mut session, log) = session(
            logged_in()
                .reply("ls", "ls\r\n\r\nlogin: ")
                .reply("root", "root@dut:~# ")
                .reply("ls", &format!("ls\r\nfile{LINUX_PROMPT}")),
        );

        let result = session.execute("ls").unwrap();

        assert_eq!(result.exit_status, 0);
        assert_eq!(result.output, "file");
        assert_eq!(
            log.commands(),
            vec!["root", "ls", "root", "ls"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_second_login_drop_fails() {
        let (mut session, _) = session(
            logged_in()
                .reply("ls", "ls\r\nlogin: ")
                .reply("root", "root@dut:~# ")
                .reply("ls", "ls\r\nlogin: "),
        );

        let result = session.execute("ls").unwrap();

        assert_eq!(result.error_category, Some(ErrorCategory::LoginFailed));
        assert_eq!(result.exit_status, 1);
    }

    #[test]
    fn test_crash_raises() {
        let (mut session, _) = session(
            logged_in()
                .reply("vtysh", &format!("vtysh{SHELL_PROMPT}"))
                .reply(
                    "show ip bgp",
                    &format!("show ip bgp\r\nSegmentation fault{LINUX_PROMPT}"),
                ),
        );
        session.ensure_context(Context::ShellMode).unwrap();

        let options = Options {
            error_check: Some(false),
            ..Options::default()
        };

        assert!(matches!(
            session.execute_with_options("show ip bgp", &options),
            Err(OpsError::RemoteCrash { .. })
        ));
        assert_eq!(session.current_context(), Some(Context::Linux));
    }

    #[test]
    fn test_host_exit_status_check() {
        let (mut session, log) = session_with(
            logged_in()
                .reply("false", "false\r\nroot@dut:~# ")
                .reply("echo $?", "echo $?\r\n1\r\nroot@dut:~# ")
                .reply("true", "true\r\nroot@dut:~# ")
                .reply("echo $?", "echo $?\r\n0\r\nroot@dut:~# "),
            "linux_host",
        );

        let result = session.execute("false").unwrap();

        assert_eq!(result.exit_status, 1);
        assert_eq!(
            result.error_category,
            Some(ErrorCategory::RemoteExitStatus)
        );

        let result = session.execute("true").unwrap();

        assert_eq!(result.exit_status, 0);
        assert_eq!(
            log.commands(),
            vec!["root", "false", "echo $?", "true", "echo $?"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_execute_many_stops_on_failure() {
        let (mut session, log) = session(
            logged_in()
                .reply("vtysh", &format!("vtysh{SHELL_PROMPT}"))
                .reply("configure terminal", &format!("configure terminal{CONFIG_PROMPT}"))
                .reply("vlan 10", "vlan 10\r\nswitch(config-vlan)# ")
                .reply("bogus", &format!("bogus\r\n% Unknown command.{CONFIG_PROMPT}")),
        );
        session.ensure_context(Context::ShellConfigMode).unwrap();

        let multi = session
            .execute_many(&["vlan 10", "bogus", "never sent"], &Options::default(), true)
            .unwrap();

        assert!(multi.failed);
        assert_eq!(multi.results.len(), 2);
        assert!(!log.commands().contains(&String::from("never sent")));
    }

    #[test]
    fn test_execute_in_context_returns() {
        let (mut session, log) = session(
            logged_in()
                .reply("vtysh", &format!("vtysh{SHELL_PROMPT}"))
                .reply("show version", &format!("show version\r\nOpenSwitch 0.4{SHELL_PROMPT}"))
                .reply("exit", &format!("exit{LINUX_PROMPT}")),
        );

        let result = session
            .execute_in_context(Context::ShellMode, "show version", &Options::default())
            .unwrap();

        assert_eq!(result.output, "OpenSwitch 0.4");
        assert_eq!(session.current_context(), Some(Context::Linux));
        assert_eq!(
            log.commands(),
            vec!["root", "vtysh", "show version", "exit"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }
}
