use super::constants::DEFAULT_RETURN_CHAR;

/// A struct to hold args/settings for a `Channel` object.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone)]
pub struct Args {
    /// Return character used to... send returns.
    pub return_char: String,
    /// Remove ansi escape sequences from everything read before matching.
    pub strip_ansi: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            return_char: DEFAULT_RETURN_CHAR.to_owned(),
            strip_ansi: true,
        }
    }
}
