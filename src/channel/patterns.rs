//! Pattern matching utilities for expect and prompt detection.

use memchr::memmem;
use regex::bytes::Regex;

/// A match located in the unconsumed output region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    /// Index of the winning pattern in the caller's list.
    pub index: usize,
    /// Byte offset where the match starts.
    pub start: usize,
    /// Byte offset where the match ends.
    pub end: usize,
}

/// Find the earliest regex match across an ordered pattern list.
///
/// The pattern matching earliest in the stream wins; ties are broken by
/// list order, so callers can put higher-priority patterns first.
pub fn earliest_match(patterns: &[Regex], haystack: &[u8]) -> Option<Located> {
    let mut best: Option<Located> = None;
    for (index, pattern) in patterns.iter().enumerate() {
        if let Some(m) = pattern.find(haystack) {
            let candidate = Located {
                index,
                start: m.start(),
                end: m.end(),
            };
            if best.is_none_or(|b| candidate.start < b.start) {
                best = Some(candidate);
            }
        }
    }
    best
}

/// Find the earliest literal substring match across an ordered needle list.
///
/// The literal-text variant of [`earliest_match`]; no pattern syntax.
pub fn earliest_literal(needles: &[&str], haystack: &[u8]) -> Option<Located> {
    let mut best: Option<Located> = None;
    for (index, needle) in needles.iter().enumerate() {
        if let Some(start) = memmem::find(haystack, needle.as_bytes()) {
            let candidate = Located {
                index,
                start,
                end: start + needle.len(),
            };
            if best.is_none_or(|b| candidate.start < b.start) {
                best = Some(candidate);
            }
        }
    }
    best
}

/// Compile a prompt pattern string into a regex.
///
/// If the pattern carries no end anchor, one is added so a prompt only
/// matches at the tail of the accumulated output.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') || pattern.ends_with("\\s*$") {
        pattern.to_string()
    } else {
        format!("{}\\s*$", pattern)
    };

    Regex::new(&pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_earliest_match_prefers_stream_order() {
        let patterns = vec![
            Regex::new(r"assword:").unwrap(),
            Regex::new(r"yes/no").unwrap(),
        ];
        // "yes/no" appears first in the stream even though it is listed second.
        let found = earliest_match(&patterns, b"continue (yes/no)? password:").unwrap();
        assert_eq!(found.index, 1);
    }

    #[test]
    fn test_earliest_match_ties_break_by_list_order() {
        let patterns = vec![Regex::new(r"ab").unwrap(), Regex::new(r"abc").unwrap()];
        let found = earliest_match(&patterns, b"xxabc").unwrap();
        assert_eq!(found.index, 0);
        assert_eq!(found.start, 2);
    }

    #[test]
    fn test_earliest_literal() {
        let found = earliest_literal(&["world", "hello"], b"hello world").unwrap();
        assert_eq!(found.index, 1);
        assert_eq!((found.start, found.end), (0, 5));
        assert!(earliest_literal(&["absent"], b"hello world").is_none());
    }

    #[test]
    fn test_literal_is_not_pattern_syntax() {
        // Regex metacharacters match themselves in the literal variant.
        let found = earliest_literal(&["a.c"], b"abc a.c").unwrap();
        assert_eq!(found.start, 4);
    }

    #[test]
    fn test_compile_prompt_pattern() {
        // Pattern without anchor gets one added
        let pattern = compile_prompt_pattern(r"router#").unwrap();
        assert!(pattern.is_match(b"router# "));
        assert!(!pattern.is_match(b"router# then more output"));

        // Pattern with anchor stays as-is
        let pattern = compile_prompt_pattern(r"router#$").unwrap();
        assert!(pattern.is_match(b"router#"));
    }
}
