use core::fmt;
use once_cell::sync::OnceCell;
use regex::{
    Regex,
    RegexBuilder,
};

/// `ErrorCategory` names why a command failed -- either a signature recognized in the command
/// output, or a structural condition observed while waiting for the command to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// "command not found" from a shell.
    CommandNotFound,
    /// "Unknown command" from the vty shell.
    UnknownCommand,
    /// "Command incomplete" from the vty shell.
    CommandIncomplete,
    /// A LAG operation referenced a port that does not exist.
    LagPortMissing,
    /// "no matched command" from the vty shell.
    NoMatchedCommand,
    /// "Permission denied".
    PermissionDenied,
    /// A user being added already exists.
    UserExists,
    /// The two passwords entered did not match.
    PasswordMismatch,
    /// A user being modified or removed does not exist.
    UnknownUser,
    /// The last user of the system cannot be deleted.
    LastUser,
    /// A user cannot be removed while a process runs under it.
    UserInUse,
    /// The LAG already holds its maximum number of member interfaces.
    LagMemberLimit,
    /// The remote process crashed; this is always fatal.
    SegmentationFault,
    /// No terminal pattern showed up before the deadline.
    Timeout,
    /// The stream closed before a terminal pattern showed up.
    EndOfStream,
    /// The device printed a connection failure banner.
    ConnectionLost,
    /// The session dropped back to a login prompt and could not log back in.
    LoginFailed,
    /// The shell reported a non zero `$?` for the command.
    RemoteExitStatus,
}

impl ErrorCategory {
    /// Returns the numeric code of the category; these are the exit status values recorded on a
    /// `CommandResult`. Structural failures all map to 1.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::CommandNotFound => 2,
            Self::UnknownCommand => 3,
            Self::CommandIncomplete => 4,
            Self::LagPortMissing => 5,
            Self::NoMatchedCommand => 6,
            Self::PermissionDenied => 7,
            Self::UserExists => 8,
            Self::PasswordMismatch => 9,
            Self::UnknownUser => 10,
            Self::LastUser => 11,
            Self::UserInUse => 12,
            Self::LagMemberLimit => 13,
            Self::SegmentationFault => 14,
            Self::Timeout
            | Self::EndOfStream
            | Self::ConnectionLost
            | Self::LoginFailed
            | Self::RemoteExitStatus => 1,
        }
    }

    /// Indicates if the category means the device can no longer be trusted.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::SegmentationFault)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Self::CommandNotFound => "command not found",
            Self::UnknownCommand => "unknown command",
            Self::CommandIncomplete => "command incomplete",
            Self::LagPortMissing => "lag port doesn't exist",
            Self::NoMatchedCommand => "no matched command",
            Self::PermissionDenied => "permission denied",
            Self::UserExists => "user already exists",
            Self::PasswordMismatch => "passwords do not match",
            Self::UnknownUser => "unknown user",
            Self::LastUser => "cannot delete the last user",
            Self::UserInUse => "user is in use",
            Self::LagMemberLimit => "lag member limit reached",
            Self::SegmentationFault => "segmentation fault",
            Self::Timeout => "timeout",
            Self::EndOfStream => "end of stream",
            Self::ConnectionLost => "connection lost",
            Self::LoginFailed => "login failed",
            Self::RemoteExitStatus => "non zero exit status",
        };

        f.write_str(s)
    }
}

/// The outcome of classifying some command output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    /// 0 when no signature was found, otherwise the code of `category`.
    pub exit_status: i32,
    /// The first signature (in table order) found in the output.
    pub category: Option<ErrorCategory>,
    /// The output line the signature was found on.
    pub line: Option<String>,
}

impl Classification {
    /// Indicates if no failure signature was found.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.category.is_none()
    }
}

/// Returns (once) the ordered signature table. The crash signature sits first so that it can never
/// be shadowed by a more benign signature printed alongside it.
///
/// # Panics
///
/// Panics if a built in signature fails to compile, which would be a bug.
#[allow(clippy::expect_used)]
fn signatures() -> &'static [(ErrorCategory, Regex)] {
    static SIGNATURES: OnceCell<Vec<(ErrorCategory, Regex)>> = OnceCell::new();

    SIGNATURES.get_or_init(|| {
        [
            (ErrorCategory::SegmentationFault, r"segmentation\s+fault"),
            (ErrorCategory::CommandNotFound, r"command\s+not\s+found"),
            (ErrorCategory::UnknownCommand, r"unknown\s+command"),
            (ErrorCategory::CommandIncomplete, r"command\s+incomplete"),
            (ErrorCategory::LagPortMissing, r"lag\s+port\s+doesn't\s+exist"),
            (ErrorCategory::NoMatchedCommand, r"no\s+matched\s+command"),
            (ErrorCategory::PermissionDenied, r"permission\s+denied"),
            (ErrorCategory::UserExists, r"user\s+[a-z0-9_]+\s+already\s+exists"),
            (ErrorCategory::PasswordMismatch, r"passwords\s+do\s+not\s+match"),
            (ErrorCategory::UnknownUser, r"unknown\s+user:"),
            (ErrorCategory::LastUser, r"cannot\s+delete\s+the\s+last\s+user"),
            (
                ErrorCategory::UserInUse,
                r"user\s+[a-z0-9_]+\s+is\s+currently\s+used\s+by\s+process",
            ),
            (
                ErrorCategory::LagMemberLimit,
                r"cannot\s+add\s+more\s+interfaces\s+to\s+lag",
            ),
        ]
        .into_iter()
        .map(|(category, pattern)| {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("failed compiling error signature, this is a bug");

            (category, re)
        })
        .collect()
    })
}

/// Classifies `output` by scanning it line by line for the known failure signatures. The first
/// signature in table order that appears on any line wins; no signature means success.
#[must_use]
pub fn classify(output: &str) -> Classification {
    for (category, re) in signatures() {
        if let Some(line) = output.lines().find(|line| re.is_match(line)) {
            return Classification {
                exit_status: category.code(),
                category: Some(*category),
                line: Some(line.trim().to_owned()),
            };
        }
    }

    Classification::default()
}

/// Returns the line holding a crash signature, if `output` has one.
#[must_use]
pub fn crash_signature(output: &str) -> Option<String> {
    let classification = classify(output);

    match classification.category {
        Some(category) if category.is_fatal() => classification.line,
        _ => None,
    }
}
