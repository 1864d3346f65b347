use anyhow::anyhow;

use crate::position::Position;

/// A region over a string.
#[derive(Debug, Clone, Copy)]
pub struct Span<'a> {
    pub s: &'a str,
    pub start: usize,
    pub end: usize,
}

impl<'a> Span<'a> {
    pub fn from_positions(start: &Position<'a>, end: &Position<'a>) -> Result<Self, anyhow::Error> {
        if start.input != end.input {
            Err(anyhow!(
                "positions on different strings: '{}', '{}'",
                start.input,
                end.input
            ))
        } else if start.idx > end.idx {
            Err(anyhow!(
                "start idx after end idx, start: {}, end: {}",
                start.idx,
                end.idx
            ))
        } else {
            Ok(Self {
                s: start.input,
                start: start.idx,
                end: end.idx,
            })
        }
    }

    pub fn as_str(&self) -> &'a str {
        &self.s[self.start..self.end]
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl<'a> PartialEq for Span<'a> {
    fn eq(&self, other: &Span<'a>) -> bool {
        self.as_str() == other.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_from_positions() {
        let input = "hello world";
        let start = Position::new(input, 6).unwrap();
        let end = Position::new(input, 11).unwrap();
        let span = Span::from_positions(&start, &end).unwrap();
        assert_eq!(span.as_str(), "world");
        assert!(!span.is_empty());
        assert!(Span::from_positions(&end, &start).is_err());
    }

    #[test]
    fn span_different_inputs() {
        let a = Position::new("abc", 0).unwrap();
        let b = Position::new("xyz", 1).unwrap();
        assert!(Span::from_positions(&a, &b).is_err());
    }
}
