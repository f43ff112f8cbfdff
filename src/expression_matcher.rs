//! Streaming multi-pattern matcher over symbols (§4.2).
//!
//! `ExpressionMatcher` is the suffix-ambiguity-free alternative to scanning
//! with a regex alternation: it is fed one symbol at a time (characters for
//! [`StringExpressionMatcher`], or an arbitrary `Eq + Clone` symbol type)
//! and reports which pattern, if any, just completed.

use crate::error::CodeParserImplError;

/// A streaming matcher over a fixed set of `key -> pattern` entries. All
/// patterns must be non-empty, unique, and suffix-free with respect to one
/// another — no pattern may be a trailing subsequence of another, which is
/// what guarantees at most one completion per symbol.
pub struct ExpressionMatcher<K, Sym> {
    patterns: Vec<(K, Vec<Sym>)>,
    progress: Vec<Vec<usize>>,
}

impl<K: Clone, Sym: PartialEq + Clone> ExpressionMatcher<K, Sym> {
    pub fn new(patterns: Vec<(K, Vec<Sym>)>) -> Result<Self, CodeParserImplError> {
        for (_, pattern) in &patterns {
            if pattern.is_empty() {
                return Err(CodeParserImplError::new(
                    "ExpressionMatcher::new",
                    "patterns must be non-empty",
                ));
            }
        }
        for i in 0..patterns.len() {
            for j in 0..patterns.len() {
                if i == j {
                    continue;
                }
                let (a, b) = (&patterns[i].1, &patterns[j].1);
                if a.len() == b.len() && a == b {
                    return Err(CodeParserImplError::new(
                        "ExpressionMatcher::new",
                        "patterns must be unique",
                    ));
                }
                if a.len() < b.len() && &b[b.len() - a.len()..] == a.as_slice() {
                    return Err(CodeParserImplError::new(
                        "ExpressionMatcher::new",
                        "no pattern may be a suffix of another",
                    ));
                }
            }
        }
        let progress = patterns.iter().map(|_| Vec::new()).collect();
        Ok(Self { patterns, progress })
    }

    /// Consume one symbol. Returns `Some(key)` the instant a pattern
    /// completes. At most one key can complete per symbol when
    /// construction's suffix-freedom invariant holds; if two somehow do,
    /// that is a contract violation and is reported as an error rather than
    /// silently picking one.
    pub fn next(&mut self, sym: Sym) -> Result<Option<K>, CodeParserImplError> {
        let mut completed: Option<K> = None;
        for i in 0..self.patterns.len() {
            let pattern = &self.patterns[i].1;
            let mut active = std::mem::take(&mut self.progress[i]);
            active.push(0);
            let mut next_active = Vec::with_capacity(active.len());
            for p in active {
                if pattern[p] == sym {
                    let advanced = p + 1;
                    if advanced == pattern.len() {
                        if completed.is_some() {
                            return Err(CodeParserImplError::new(
                                "ExpressionMatcher::next",
                                "more than one pattern completed on the same symbol",
                            ));
                        }
                        completed = Some(self.patterns[i].0.clone());
                    } else {
                        next_active.push(advanced);
                    }
                }
            }
            self.progress[i] = next_active;
        }
        Ok(completed)
    }

    pub fn reset(&mut self) {
        for p in &mut self.progress {
            p.clear();
        }
    }

    pub fn max_expression_length(&self) -> usize {
        self.patterns.iter().map(|(_, p)| p.len()).max().unwrap_or(0)
    }
}

/// The common case: patterns are strings, matched character by character.
pub type StringExpressionMatcher<K> = ExpressionMatcher<K, char>;

pub fn string_patterns<K>(pairs: Vec<(K, &str)>) -> Vec<(K, Vec<char>)> {
    pairs.into_iter().map(|(k, s)| (k, s.chars().collect())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Key {
        CommentStart,
        MultilineStart,
        MultilineEnd,
    }

    fn ts_matcher() -> StringExpressionMatcher<Key> {
        ExpressionMatcher::new(string_patterns(vec![
            (Key::CommentStart, "//"),
            (Key::MultilineStart, "/*"),
            (Key::MultilineEnd, "*/"),
        ]))
        .unwrap()
    }

    #[test]
    fn suffix_ambiguous_patterns_rejected_at_construction() {
        let result = ExpressionMatcher::new(string_patterns(vec![("a", "bar"), ("b", "foobar")]));
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_patterns_rejected() {
        let result = ExpressionMatcher::new(string_patterns(vec![("a", "x"), ("b", "x")]));
        assert!(result.is_err());
    }

    #[test]
    fn empty_pattern_rejected() {
        let result = ExpressionMatcher::<&str, char>::new(string_patterns(vec![("a", "")]));
        assert!(result.is_err());
    }

    #[test]
    fn streams_one_completion_per_occurrence() {
        let mut m = ts_matcher();
        let mut hits = Vec::new();
        for ch in "a//b/*c*/".chars() {
            if let Some(k) = m.next(ch).unwrap() {
                hits.push(k);
            }
        }
        assert_eq!(hits, vec![Key::CommentStart, Key::MultilineStart, Key::MultilineEnd]);
    }

    #[test]
    fn reset_clears_in_flight_progress() {
        let mut m = ts_matcher();
        m.next('/').unwrap();
        m.reset();
        assert_eq!(m.next('*').unwrap(), None);
    }
}
