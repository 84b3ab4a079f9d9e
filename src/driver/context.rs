use super::execute::Options;
use super::Session;
use crate::errors::OpsError;
use core::fmt;
use log::{
    debug,
    info,
};
use serde::{
    Deserialize,
    Serialize,
};

/// `Context` is the shell (command grammar) active on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Context {
    /// The plain linux shell.
    Linux,
    /// The vty shell.
    ShellMode,
    /// The configuration mode of the vty shell, including its sub contexts.
    ShellConfigMode,
}

impl fmt::Display for Context {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Linux => f.write_str("linux"),
            Self::ShellMode => f.write_str("shell-mode"),
            Self::ShellConfigMode => f.write_str("shell-config-mode"),
        }
    }
}

impl Session {
    /// The one place `current_context` changes: called with the context of a prompt actually
    /// observed on the device.
    pub(super) fn confirm_context(
        &mut self,
        context: Context,
    ) {
        if self.current_context != Some(context) {
            debug!(
                "'{}' context now {context} (was {})",
                self.host(),
                self.current_context
                    .map_or_else(|| String::from("unknown"), |c| c.to_string())
            );
        }

        self.current_context = Some(context);
    }

    fn open_context(&self) -> Result<Context, OpsError> {
        self.current_context.ok_or_else(|| OpsError::Transport {
            details: format!("session to '{}' is not open", self.host()),
        })
    }

    /// Move the session one step, from `from` to the adjacent context `to`. The step counts only
    /// if the transition command finishes cleanly at a prompt of `to`.
    fn step_context(
        &mut self,
        from: Context,
        to: Context,
    ) -> Result<(), OpsError> {
        let Some(command) = self
            .platform
            .transition_command(from, to)
            .map(ToOwned::to_owned)
        else {
            return Err(OpsError::ContextTransition {
                from,
                to,
                details: String::from("contexts are not adjacent"),
            });
        };

        debug!("moving '{}' from {from} to {to} with '{command}'", self.host());

        let options = Options {
            exit_status_check: Some(false),
            ..Options::default()
        };

        let result = self.execute_with_options(&command, &options)?;

        if result.exit_status == 0 && result.context == Some(to) {
            return Ok(());
        }

        Err(OpsError::ContextTransition {
            from,
            to,
            details: format!(
                "'{command}' finished with exit status {} at {} prompt, output: '{}'",
                result.exit_status,
                result
                    .context
                    .map_or_else(|| String::from("no"), |c| c.to_string()),
                result.output
            ),
        })
    }

    /// Get the session into `target` along the shortest path of single steps. Already being in
    /// `target` is a no-op. The first failing step aborts the rest of the path, `current_context`
    /// then reflects the last prompt actually seen.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::UnsupportedContext` if the platform has no `target`,
    /// `OpsError::ContextTransition` if a step does not land where expected, or any error raised
    /// while executing a step.
    pub fn ensure_context(
        &mut self,
        target: Context,
    ) -> Result<(), OpsError> {
        if !self.platform.supports(target) {
            return Err(OpsError::UnsupportedContext {
                context: target,
                platform: self.platform.platform_type().to_owned(),
            });
        }

        let current = self.open_context()?;

        if current == target {
            debug!("'{}' already in context {target}", self.host());

            return Ok(());
        }

        let Some(path) = self.platform.path(current, target) else {
            return Err(OpsError::UnsupportedContext {
                context: target,
                platform: self.platform.platform_type().to_owned(),
            });
        };

        info!("moving '{}' from context {current} to {target}", self.host());

        for step in path.windows(2) {
            if let [from, to] = step {
                self.step_context(*from, *to)?;
            }
        }

        Ok(())
    }

    /// Take the session one step towards the root context; a no-op at the root.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::ContextTransition` if the step does not land in the parent context, or
    /// any error raised while executing it.
    pub fn leave_context(&mut self) -> Result<(), OpsError> {
        let current = self.open_context()?;

        let Some(parent) = self.platform.parent(current) else {
            debug!("'{}' already at root context {current}", self.host());

            return Ok(());
        };

        self.step_context(current, parent)
    }

    /// Get the session back into its default context.
    ///
    /// # Errors
    ///
    /// See `ensure_context`.
    pub fn restore_default_context(&mut self) -> Result<(), OpsError> {
        self.ensure_context(self.args.default_context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Builder;
    use crate::transport::base::Endpoint;
    use crate::transport::scripted::{
        Script,
        Scripted,
        WriteLog,
    };
    use core::time::Duration;

    const LINUX_PROMPT: &str = "\r\nroot@dut:~# ";
    const SHELL_PROMPT: &str = "\r\nswitch# ";
    const CONFIG_PROMPT: &str = "\r\nswitch(config)# ";

    /// A switch that answers the given transition commands, in order, with the prompt they lead to.
    fn switch_script(commands: &[&str]) -> Script {
        let mut script = Script::new().reply("", "login: ").reply("root", "root@dut:~# ");

        for command in commands {
            let prompt = match *command {
                "vtysh" | "end" => SHELL_PROMPT,
                "configure terminal" => CONFIG_PROMPT,
                _ => LINUX_PROMPT,
            };

            script = script.reply(command, &format!("{command}{prompt}"));
        }

        script
    }

    fn session(script: Script) -> (Session, WriteLog) {
        let transport = Scripted::new(script);
        let log = transport.write_log();

        let mut session = Builder::new(Endpoint::container("dut01"))
            .transport(Box::new(transport))
            .timeout_login(Duration::from_millis(300))
            .timeout_flush(Duration::from_millis(20))
            .timeout_ops(Duration::from_millis(500))
            .build()
            .unwrap();
        session.open().unwrap();

        (session, log)
    }

    fn commands_after_login(log: &WriteLog) -> Vec<String> {
        log.commands().into_iter().skip(1).collect()
    }

    #[test]
    fn test_context_serde_names() {
        assert_eq!(
            serde_yaml::from_str::<Context>("shell-config-mode").unwrap(),
            Context::ShellConfigMode
        );
        assert_eq!(Context::ShellMode.to_string(), "shell-mode");
    }

    #[test]
    fn test_linux_to_config_is_two_commands() {
        let (mut session, log) = session(switch_script(&["vtysh", "configure terminal"]));

        session.ensure_context(Context::ShellConfigMode).unwrap();

        assert_eq!(session.current_context(), Some(Context::ShellConfigMode));
        assert_eq!(
            commands_after_login(&log),
            vec![String::from("vtysh"), String::from("configure terminal")]
        );
    }

    #[test]
    fn test_ensure_context_is_idempotent() {
        let paths: [(Context, &[&str]); 3] = [
            (Context::Linux, &[]),
            (Context::ShellMode, &["vtysh"]),
            (Context::ShellConfigMode, &["vtysh", "configure terminal"]),
        ];

        for (target, commands) in paths {
            let (mut session, log) = session(switch_script(commands));

            session.ensure_context(target).unwrap();
            let after_first = log.commands().len();

            session.ensure_context(target).unwrap();

            assert_eq!(log.commands().len(), after_first, "target {target}");
            assert_eq!(session.current_context(), Some(target));
        }
    }

    #[test]
    fn test_round_trip_from_every_context() {
        for start in [Context::Linux, Context::ShellMode, Context::ShellConfigMode] {
            let (mut session, log) =
                session(switch_script(&["vtysh", "configure terminal", "end", "exit"]));

            session.ensure_context(start).unwrap();
            session.ensure_context(Context::ShellConfigMode).unwrap();
            session.ensure_context(Context::Linux).unwrap();

            assert_eq!(
                session.current_context(),
                Some(Context::Linux),
                "start {start}"
            );
            assert_eq!(commands_after_login(&log).len(), 4, "start {start}");
        }
    }

    #[test]
    fn test_leave_context_steps_towards_root() {
        let (mut session, log) =
            session(switch_script(&["vtysh", "configure terminal", "end", "exit"]));

        session.ensure_context(Context::ShellConfigMode).unwrap();

        session.leave_context().unwrap();
        assert_eq!(session.current_context(), Some(Context::ShellMode));

        session.leave_context().unwrap();
        assert_eq!(session.current_context(), Some(Context::Linux));

        session.leave_context().unwrap();
        assert_eq!(session.current_context(), Some(Context::Linux));
        assert_eq!(commands_after_login(&log).len(), 4);
    }

    #[test]
    fn test_failed_step_keeps_last_confirmed_context() {
        let script = Script::new()
            .reply("", "login: ")
            .reply("root", "root@dut:~# ")
            .reply("vtysh", &format!("vtysh{SHELL_PROMPT}"))
            .reply(
                "configure terminal",
                &format!("configure terminal\r\n% Unknown command.{SHELL_PROMPT}"),
            );
        let (mut session, _) = session(script);

        let result = session.ensure_context(Context::ShellConfigMode);

        assert!(matches!(
            result,
            Err(OpsError::ContextTransition {
                from: Context::ShellMode,
                to: Context::ShellConfigMode,
                ..
            })
        ));
        assert_eq!(session.current_context(), Some(Context::ShellMode));
    }

    #[test]
    fn test_timed_out_step_does_not_advance() {
        let script = Script::new()
            .reply("", "login: ")
            .reply("root", "root@dut:~# ")
            .reply("vtysh", "vtysh\r\n");
        let (mut session, _) = session(script);

        assert!(matches!(
            session.ensure_context(Context::ShellMode),
            Err(OpsError::ContextTransition { .. })
        ));
        assert_eq!(session.current_context(), Some(Context::Linux));
    }

    #[test]
    fn test_unsupported_context() {
        let transport = Scripted::new(
            Script::new()
                .reply("", "login: ")
                .reply("root", "[root@h1 ~]# "),
        );

        let mut session = Builder::new(Endpoint::container("h1"))
            .transport(Box::new(transport))
            .platform_name("linux_host")
            .timeout_flush(Duration::from_millis(20))
            .build()
            .unwrap();
        session.open().unwrap();

        assert!(matches!(
            session.ensure_context(Context::ShellMode),
            Err(OpsError::UnsupportedContext {
                context: Context::ShellMode,
                ..
            })
        ));
    }

    #[test]
    fn test_default_context_entered_on_open() {
        let transport = Scripted::new(switch_script(&["vtysh"]));
        let log = transport.write_log();

        let mut session = Builder::new(Endpoint::container("dut01"))
            .transport(Box::new(transport))
            .default_context(Context::ShellMode)
            .timeout_flush(Duration::from_millis(20))
            .build()
            .unwrap();
        session.open().unwrap();

        assert_eq!(session.current_context(), Some(Context::ShellMode));
        assert_eq!(commands_after_login(&log), vec![String::from("vtysh")]);
    }
}
