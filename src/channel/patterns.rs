use once_cell::sync::OnceCell;
use regex::bytes::Regex;

/// # Panics
///
///  Returns (once), the compiled generic end of prompt pattern used to flush banners after login.
///  This should realistically never panic.
#[allow(clippy::expect_used)]
pub fn end_of_prompt_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"[#$>]\s*$").expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

/// # Panics
///
///  Returns (once), the compiled ansi matching pattern. This should realistically never panic.
#[allow(clippy::expect_used)]
pub fn ansi_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07]*\x07|\x1b[()][A-Za-z0-9]|\x1b[=>78]")
            .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}
