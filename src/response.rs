extern crate chrono;
use crate::classifier::ErrorCategory;
use crate::driver::Context;
use crate::errors::OpsError;
use chrono::offset::Utc;
use chrono::{
    Duration,
    NaiveDateTime,
};

/// `CommandResult` is returned from every command execution -- including ones that failed
/// structurally (timeout, end of stream), which carry an exit status of 1 rather than an error.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// The host the command ran on.
    pub host: String,
    /// The command line sent.
    pub input: String,
    /// 0 when the command completed and no failure was detected.
    pub exit_status: i32,
    /// The command output, echo and prompt removed.
    pub output: String,
    /// Everything read while waiting for the command, pagination markers excluded.
    pub raw_output: String,
    /// Why the command failed, if it did.
    pub error_category: Option<ErrorCategory>,
    /// The context of the prompt the command finished at; `None` when no prompt was seen.
    pub context: Option<Context>,
    /// Starting time of the command.
    pub start_time: NaiveDateTime,
    /// Ending time of the command.
    pub end_time: NaiveDateTime,
    /// Total time the command took.
    pub elapsed_time: Duration,
}

impl CommandResult {
    /// Initializes a new `CommandResult` object.
    #[must_use]
    pub fn new(
        input: &str,
        host: &str,
    ) -> Self {
        Self {
            host: host.to_owned(),
            input: input.to_owned(),
            exit_status: 0,
            output: String::new(),
            raw_output: String::new(),
            error_category: None,
            context: None,
            start_time: Utc::now().naive_utc(),
            end_time: Utc::now().naive_utc(),
            elapsed_time: Duration::zero(),
        }
    }

    /// Record the output of the command and stamp the end time.
    pub fn record(
        &mut self,
        raw_output: String,
        output: String,
    ) {
        self.end_time = Utc::now().naive_utc();

        self.elapsed_time = self.end_time - self.start_time;

        self.raw_output = raw_output;
        self.output = output;
    }

    /// Mark the command failed with `category`, taking the category code as exit status.
    pub fn fail(
        &mut self,
        category: ErrorCategory,
    ) {
        self.exit_status = category.code();
        self.error_category = Some(category);
    }

    /// Indicates if the command failed.
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.exit_status != 0
    }

    /// Converts a failed result into `OpsError::RemoteCommandError`.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::RemoteCommandError` if the exit status is non zero.
    pub fn into_result(self) -> Result<Self, OpsError> {
        if self.failed() {
            return Err(OpsError::RemoteCommandError {
                category: self.error_category,
                exit_status: self.exit_status,
            });
        }

        Ok(self)
    }
}

/// `MultiResult` holds the individual `CommandResult` objects of a plural operation like
/// `execute_many`.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone)]
pub struct MultiResult {
    /// The host the commands ran on.
    pub host: String,
    /// Starting time of the operation.
    pub start_time: NaiveDateTime,
    /// Ending time of the operation.
    pub end_time: NaiveDateTime,
    /// Total time the operation took.
    pub elapsed_time: Duration,
    /// The individual results, in execution order.
    pub results: Vec<CommandResult>,
    /// Indicates if any of the results failed.
    pub failed: bool,
}

impl MultiResult {
    /// Initializes a new `MultiResult` object.
    #[must_use]
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_owned(),
            start_time: Utc::now().naive_utc(),
            end_time: Utc::now().naive_utc(),
            elapsed_time: Duration::zero(),
            results: vec![],
            failed: false,
        }
    }

    /// Appends a result.
    pub fn record_result(
        &mut self,
        result: CommandResult,
    ) {
        self.end_time = Utc::now().naive_utc();

        self.elapsed_time = self.end_time - self.start_time;

        if result.failed() {
            self.failed = true;
        }

        self.results.push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        let mut result = CommandResult::new("vlan 10", "sw1");
        assert!(result.clone().into_result().is_ok());

        result.fail(ErrorCategory::UnknownCommand);

        assert!(matches!(
            result.into_result(),
            Err(OpsError::RemoteCommandError {
                category: Some(ErrorCategory::UnknownCommand),
                exit_status: 3
            })
        ));
    }

    #[test]
    fn test_multi_result_tracks_failures() {
        let mut multi = MultiResult::new("sw1");
        multi.record_result(CommandResult::new("show version", "sw1"));
        assert!(!multi.failed);

        let mut failed = CommandResult::new("bogus", "sw1");
        failed.fail(ErrorCategory::Timeout);
        multi.record_result(failed);

        assert!(multi.failed);
        assert_eq!(multi.results.len(), 2);
    }
}
