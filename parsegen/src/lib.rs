//! Runtime support for generated LL(k) parsers.
//!
//! Generated rule methods live in an `impl` block of a type implementing
//! `LLParser`. They read lookahead with `la`, consume input with `skip` and
//! `match_set`, and run syntactic predicates through `try_recognize`.

use anyhow::anyhow;

mod position;
mod span;
mod state;

pub use position::Position;
pub use span::Span;
pub use state::State;

pub type Result<T> = anyhow::Result<T>;

/// Lookahead value at the end of input.
pub const EOF: i32 = -1;

/// Whether `la` falls in one of the inclusive `ranges`.
pub fn in_set(ranges: &[(i32, i32)], la: i32) -> bool {
    ranges.iter().any(|&(lo, hi)| lo <= la && la <= hi)
}

fn describe_char(c: i32) -> String {
    match std::char::from_u32(c as u32) {
        _ if c == EOF => "end of input".to_string(),
        Some(ch) if !ch.is_control() => format!("{:?}", ch),
        _ => format!("{:#x}", c),
    }
}

/// Renders a set of ranges the way grammars write them.
pub fn describe_set(ranges: &[(i32, i32)]) -> String {
    let parts: Vec<String> = ranges
        .iter()
        .map(|&(lo, hi)| {
            if lo == hi {
                describe_char(lo)
            } else {
                format!("{}..{}", describe_char(lo), describe_char(hi))
            }
        })
        .collect();
    parts.join("|")
}

pub trait LLParser {
    /// Terminal `offset` positions ahead, or `EOF`.
    fn la(&self, offset: usize) -> i32;

    /// Consume one terminal.
    fn advance(&mut self);

    /// Current position, suitable for `restore`.
    fn index(&self) -> usize;

    fn restore(&mut self, index: usize);

    /// Human readable position used in error messages.
    fn location(&self) -> String {
        format!("index {}", self.index())
    }

    /// Consume one terminal unconditionally, returning it.
    fn skip(&mut self) -> i32 {
        let la = self.la(0);
        self.advance();
        la
    }

    /// Consume one terminal in `ranges`, or fail without consuming.
    fn match_set(&mut self, ranges: &[(i32, i32)]) -> Result<i32> {
        let la = self.la(0);
        if in_set(ranges, la) {
            self.advance();
            Ok(la)
        } else {
            Err(self.error_unexpected(ranges))
        }
    }

    /// Recognizer form of `match_set`.
    fn try_match_set(&mut self, ranges: &[(i32, i32)]) -> bool {
        if in_set(ranges, self.la(0)) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Error for an and-predicate that does not hold.
    fn check_failed(&self, expectation: &str) -> anyhow::Error {
        anyhow!("{}: check failed: {}", self.location(), expectation)
    }

    /// Runs a recognizer and rewinds the input afterwards.
    fn try_recognize<F>(&mut self, f: F) -> bool
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> bool,
    {
        let start = self.index();
        let matched = f(self);
        self.restore(start);
        matched
    }

    /// Error for a lookahead outside `expected`.
    fn error_unexpected(&self, expected: &[(i32, i32)]) -> anyhow::Error {
        anyhow!(
            "{}: unexpected {}, expected {}",
            self.location(),
            describe_char(self.la(0)),
            describe_set(expected)
        )
    }
}
