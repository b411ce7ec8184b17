//! Pattern matching for LIKE and ILIKE conditions.
//!
//! Provides the single implementation used by filter predicates, join-free
//! subquery filters and anything else that evaluates a LIKE condition, so
//! every path agrees on the same semantics.
//!
//! # LIKE patterns
//!
//! - `%` matches zero or more characters
//! - `_` matches exactly one character
//! - `\` escapes the next character, which is then matched literally
//!
//! A pattern that ends with a lone `\` is rejected at compile time.
//! Matching operates on Unicode scalar values. ILIKE lowercases both the
//! pattern and the value before matching.

use crate::error::{Error, Result};
use alloc::vec::Vec;

// =========================================================================
// Compiled pattern
// =========================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyOne,
    AnyMany,
}

/// A compiled LIKE / ILIKE pattern.
///
/// ```
/// use ripple_core::pattern_match::LikePattern;
/// let p = LikePattern::compile("h%o", false).unwrap();
/// assert!(p.matches("hello"));
/// let p = LikePattern::compile("H_LLO", true).unwrap();
/// assert!(p.matches("hello"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LikePattern {
    tokens: Vec<Token>,
    case_insensitive: bool,
}

impl LikePattern {
    /// Compiles `pattern`. Set `case_insensitive` for ILIKE.
    pub fn compile(pattern: &str, case_insensitive: bool) -> Result<Self> {
        let mut tokens = Vec::with_capacity(pattern.len());
        let mut chars = pattern.chars();
        while let Some(ch) = chars.next() {
            let token = match ch {
                '%' => {
                    // Collapse runs of % so matching stays linear in them.
                    if tokens.last() == Some(&Token::AnyMany) {
                        continue;
                    }
                    Token::AnyMany
                }
                '_' => Token::AnyOne,
                '\\' => match chars.next() {
                    Some(escaped) => Token::Literal(fold(escaped, case_insensitive)),
                    None => {
                        return Err(Error::invalid_pattern(
                            "LIKE pattern must not end with escape character",
                        ))
                    }
                },
                other => Token::Literal(fold(other, case_insensitive)),
            };
            tokens.push(token);
        }
        Ok(Self {
            tokens,
            case_insensitive,
        })
    }

    /// Returns true if the whole of `value` matches.
    pub fn matches(&self, value: &str) -> bool {
        let v: Vec<char> = value
            .chars()
            .map(|c| fold(c, self.case_insensitive))
            .collect();
        match_tokens(&v, &self.tokens)
    }
}

fn fold(ch: char, case_insensitive: bool) -> char {
    if case_insensitive {
        // Multi-char lowercase expansions keep their first scalar.
        ch.to_lowercase().next().unwrap_or(ch)
    } else {
        ch
    }
}

/// Iterative matcher with single-star backtracking.
fn match_tokens(v: &[char], p: &[Token]) -> bool {
    let (mut vi, mut pi) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while vi < v.len() {
        match p.get(pi) {
            Some(Token::AnyMany) => {
                star = Some((pi, vi));
                pi += 1;
            }
            Some(Token::AnyOne) => {
                vi += 1;
                pi += 1;
            }
            Some(Token::Literal(c)) if *c == v[vi] => {
                vi += 1;
                pi += 1;
            }
            _ => match star {
                Some((sp, sv)) => {
                    pi = sp + 1;
                    vi = sv + 1;
                    star = Some((sp, sv + 1));
                }
                None => return false,
            },
        }
    }

    p[pi..].iter().all(|t| *t == Token::AnyMany)
}

// =========================================================================
// Convenience
// =========================================================================

/// One-shot case-sensitive LIKE. Returns false for malformed patterns.
///
/// ```
/// use ripple_core::pattern_match::like;
/// assert!(like("hello", "h%o"));
/// assert!(like("hello", "_ello"));
/// assert!(!like("hello", "world"));
/// ```
pub fn like(value: &str, pattern: &str) -> bool {
    LikePattern::compile(pattern, false)
        .map(|p| p.matches(value))
        .unwrap_or(false)
}

/// One-shot ILIKE. Returns false for malformed patterns.
pub fn ilike(value: &str, pattern: &str) -> bool {
    LikePattern::compile(pattern, true)
        .map(|p| p.matches(value))
        .unwrap_or(false)
}
