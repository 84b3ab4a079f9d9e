use core::time::Duration;

/// The default return character. Consoles and the vty shell expect a bare carriage return, some
/// hosts may want "\n" or "\r\n" instead.
pub const DEFAULT_RETURN_CHAR: &str = "\r";

/// Default `timeout_ops` value -- the deadline for a single command.
pub const DEFAULT_TIMEOUT_OPS: Duration = Duration::from_secs(30);

/// Default `timeout_login` value -- the deadline for the whole login handshake.
pub const DEFAULT_TIMEOUT_LOGIN: Duration = Duration::from_secs(30);

/// Default `timeout_flush` value -- how long to wait for trailing banner text after login.
pub const DEFAULT_TIMEOUT_FLUSH: Duration = Duration::from_millis(500);

/// The ansi escape byte.
pub const ANSI_ESCAPE_BYTE: u8 = 0x1b;

/// The most non blocking reads a single drain performs before giving up on a chatty device.
pub const MAX_DRAIN_READS: usize = 64;

/// The most bytes of the buffer tail quoted in timeout and end of stream errors.
pub const ERROR_TAIL_LENGTH: usize = 256;

/// The default answer to a pagination marker, a single space asks for the next page.
pub const DEFAULT_PAGINATION_RESPONSE: &str = " ";

/// Constant to indicate what the "max seen" username prompts is.
pub const USER_SEEN_MAX: u8 = 2;

/// Constant to indicate what the "max seen" password prompts is.
pub const PASSWORD_SEEN_MAX: u8 = 2;

/// Constant to indicate how many non root prompts the handshake backs out of before giving up.
pub const RECOVERY_SEEN_MAX: u8 = 4;
