use crate::driver::Context;
use crate::errors::OpsError;
use regex::bytes::Regex;

/// Inputs every regex entry is probed against; a pattern finding a zero length match in any of
/// them could match without consuming anything and is rejected.
const EMPTY_MATCH_PROBES: [&[u8]; 6] = [b"", b"\n", b"\r\n", b" ", b"x", b"#"];

/// The flavor of a confirmation prompt, which decides the spelling of the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmKind {
    /// A "(yes/no)" style prompt.
    YesNo,
    /// A "[y/n]" style prompt.
    YN,
}

impl ConfirmKind {
    /// Returns the answer to send for this kind of prompt.
    #[must_use]
    pub const fn answer(
        self,
        affirmative: bool,
    ) -> &'static str {
        match (self, affirmative) {
            (Self::YesNo, true) => "yes",
            (Self::YesNo, false) => "no",
            (Self::YN, true) => "y",
            (Self::YN, false) => "n",
        }
    }
}

/// What a matched entry means to the session; sessions dispatch on this rather than on the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    /// A login (username) prompt.
    Login,
    /// A password prompt.
    Password,
    /// The device rejected the credentials.
    LoginIncorrect,
    /// A shell prompt belonging to the given context.
    Prompt(Context),
    /// A pagination ("--More--") marker.
    Pagination,
    /// A confirmation prompt.
    Confirm(ConfirmKind),
    /// A prompt that is answered with the given line and otherwise ignored.
    AutoRespond(String),
    /// A banner saying the connection to the device failed or was closed.
    ConnectionFailure,
    /// Anything that looks like the end of a prompt.
    EndOfPrompt,
    /// The stream ended.
    Eof,
    /// The deadline passed.
    Timeout,
}

/// How an entry matches -- a regular expression over the buffer, or a condition of the stream.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// A regular expression searched for in the buffer.
    Regex(Regex),
    /// Matches when the stream has ended and nothing else matched the tail.
    Eof,
    /// Matches when the deadline passes.
    Timeout,
}

/// A single entry of a `PatternTable`.
#[derive(Debug, Clone)]
pub struct PatternEntry {
    /// A name for the entry, used in logs.
    pub id: String,
    /// How the entry matches.
    pub matcher: Matcher,
    /// What a match means.
    pub category: Category,
}

impl PatternEntry {
    /// Returns a regex backed entry.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::InvalidPatternTable` if `pattern` does not compile.
    pub fn regex(
        id: &str,
        pattern: &str,
        category: Category,
    ) -> Result<Self, OpsError> {
        let re = Regex::new(pattern).map_err(|err| OpsError::InvalidPatternTable {
            details: format!("pattern '{id}' ('{pattern}') does not compile, error: {err}"),
        })?;

        Ok(Self {
            id: id.to_owned(),
            matcher: Matcher::Regex(re),
            category,
        })
    }

    /// Returns the end of stream sentinel entry.
    #[must_use]
    pub fn eof() -> Self {
        Self {
            id: String::from("eof"),
            matcher: Matcher::Eof,
            category: Category::Eof,
        }
    }

    /// Returns the deadline sentinel entry.
    #[must_use]
    pub fn timeout() -> Self {
        Self {
            id: String::from("timeout"),
            matcher: Matcher::Timeout,
            category: Category::Timeout,
        }
    }
}

/// `PatternTable` is an ordered, validated set of `PatternEntry`. Order matters: of all entries
/// matching the buffer the one matching earliest wins, entries matching at the same position are
/// resolved in table order.
#[derive(Debug, Clone)]
pub struct PatternTable {
    entries: Vec<PatternEntry>,
}

impl PatternTable {
    /// Returns a new table holding `entries`.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::InvalidPatternTable` if `entries` is empty or any regex entry can match
    /// the empty string.
    pub fn new(entries: Vec<PatternEntry>) -> Result<Self, OpsError> {
        if entries.is_empty() {
            return Err(OpsError::InvalidPatternTable {
                details: String::from("pattern table has no entries"),
            });
        }

        for entry in &entries {
            let Matcher::Regex(re) = &entry.matcher else {
                continue;
            };

            let matches_empty = EMPTY_MATCH_PROBES
                .iter()
                .any(|probe| re.find_iter(probe).any(|m| m.start() == m.end()));

            if matches_empty {
                return Err(OpsError::InvalidPatternTable {
                    details: format!(
                        "pattern '{}' ('{}') can match the empty string",
                        entry.id,
                        re.as_str()
                    ),
                });
            }
        }

        Ok(Self { entries })
    }

    /// Returns the entries of the table, in order.
    #[must_use]
    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    /// Returns the entry at `index`.
    #[must_use]
    pub fn get(
        &self,
        index: usize,
    ) -> Option<&PatternEntry> {
        self.entries.get(index)
    }

    /// Returns the category of the entry at `index`.
    #[must_use]
    pub fn category(
        &self,
        index: usize,
    ) -> Option<&Category> {
        self.entries.get(index).map(|entry| &entry.category)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false, tables are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the index of the end of stream sentinel, if the table has one.
    #[must_use]
    pub fn eof_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| matches!(entry.matcher, Matcher::Eof))
    }

    /// Returns the index of the deadline sentinel, if the table has one.
    #[must_use]
    pub fn timeout_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| matches!(entry.matcher, Matcher::Timeout))
    }

    /// Searches `buf` with every regex entry and returns `(index, start, end)` of the winning
    /// match: the smallest start position, ties going to the lowest index.
    #[must_use]
    pub fn find_earliest(
        &self,
        buf: &[u8],
    ) -> Option<(usize, usize, usize)> {
        let mut best: Option<(usize, usize, usize)> = None;

        for (index, entry) in self.entries.iter().enumerate() {
            let Matcher::Regex(re) = &entry.matcher else {
                continue;
            };

            let Some(m) = re.find(buf) else {
                continue;
            };

            if best.map_or(true, |(_, start, _)| m.start() < start) {
                best = Some((index, m.start(), m.end()));
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table(patterns: &[&str]) -> PatternTable {
        PatternTable::new(
            patterns
                .iter()
                .map(|p| PatternEntry::regex(p, p, Category::EndOfPrompt).unwrap())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(matches!(
            PatternTable::new(vec![]),
            Err(OpsError::InvalidPatternTable { .. })
        ));
    }

    #[test]
    fn test_empty_matching_patterns_rejected() {
        for pattern in ["", "$", "^", r"\s*$", "a*", r"(?m)^", r"\b", "x?"] {
            let result = PatternTable::new(vec![PatternEntry::regex(
                "p",
                pattern,
                Category::EndOfPrompt,
            )
            .unwrap()]);

            assert!(
                matches!(result, Err(OpsError::InvalidPatternTable { .. })),
                "pattern '{pattern}' should have been rejected"
            );
        }
    }

    #[test]
    fn test_sentinels_are_valid_entries() {
        let table = PatternTable::new(vec![PatternEntry::eof(), PatternEntry::timeout()]).unwrap();

        assert_eq!(table.eof_index(), Some(0));
        assert_eq!(table.timeout_index(), Some(1));
        assert_eq!(table.find_earliest(b"anything"), None);
    }

    #[test]
    fn test_bad_regex_rejected() {
        assert!(matches!(
            PatternEntry::regex("bad", "(", Category::EndOfPrompt),
            Err(OpsError::InvalidPatternTable { .. })
        ));
    }

    #[test]
    fn test_earliest_position_wins() {
        let t = table(&["world", "hello"]);

        assert_eq!(t.find_earliest(b"hello world"), Some((1, 0, 5)));
    }

    #[test]
    fn test_tie_goes_to_table_order() {
        let t = table(&[r"switch\(config\)#", r"switch\S*#", "#"]);

        assert_eq!(t.find_earliest(b"switch(config)# "), Some((0, 0, 15)));

        let t = table(&[r"switch\S*#", r"switch\(config\)#"]);

        assert_eq!(t.find_earliest(b"switch(config)# "), Some((0, 0, 15)));
    }

    fn earliest_literal(
        patterns: &[String],
        haystack: &str,
    ) -> Option<(usize, usize, usize)> {
        patterns
            .iter()
            .enumerate()
            .filter_map(|(index, p)| haystack.find(p.as_str()).map(|start| (index, start, p.len())))
            .min_by_key(|(index, start, _)| (*start, *index))
            .map(|(index, start, len)| (index, start, start + len))
    }

    proptest! {
        #[test]
        fn test_earliest_start_then_lowest_index(
            patterns in prop::collection::vec("[a-c]{1,3}", 1..6),
            haystack in "[a-c ]{0,16}",
        ) {
            let borrowed: Vec<&str> = patterns.iter().map(String::as_str).collect();
            let t = table(&borrowed);

            prop_assert_eq!(
                t.find_earliest(haystack.as_bytes()),
                earliest_literal(&patterns, &haystack)
            );
        }
    }
}
