use anyhow::anyhow;

use crate::EOF;

/// Keep track of a position within a str, moving one code point at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct Position<'a> {
    pub input: &'a str,
    pub idx: usize,
}

impl<'a> Position<'a> {
    /// Create a new cursor, ensuring that `start` is within bounds and on a
    /// char boundary.
    pub fn new(input: &'a str, start: usize) -> Result<Self, anyhow::Error> {
        if start <= input.len() && input.is_char_boundary(start) {
            Ok(Position { input, idx: start })
        } else {
            Err(anyhow!(
                "start is not a valid position, start: {}, len: {}, input: {}",
                start,
                input.len(),
                input
            ))
        }
    }

    /// Code point `offset` chars ahead, or `EOF` past the end.
    pub fn peek(&self, offset: usize) -> i32 {
        match self.input[self.idx..].chars().nth(offset) {
            Some(c) => c as i32,
            None => EOF,
        }
    }

    /// Move past the current char. Returns false at the end of input.
    pub fn advance(&mut self) -> bool {
        match self.input[self.idx..].chars().next() {
            Some(c) => {
                self.idx += c.len_utf8();
                true
            }
            None => false,
        }
    }

    pub fn at_end(&self) -> bool {
        self.idx >= self.input.len()
    }

    /// One-based line and column of the cursor.
    pub fn line_col(&self) -> (usize, usize) {
        let before = &self.input[..self.idx];
        let line = before.matches('\n').count() + 1;
        let col = match before.rfind('\n') {
            Some(nl) => before[nl + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        (line, col)
    }
}
