mod args;
#[allow(clippy::module_inception)]
mod channel;
pub(crate) mod constants;
mod expect;
mod patterns;
mod table;
mod util;
mod write;

pub use args::Args;
pub use channel::Channel;
pub use expect::MatchResult;
pub use patterns::end_of_prompt_pattern;
pub use table::{
    Category,
    ConfirmKind,
    Matcher,
    PatternEntry,
    PatternTable,
};
