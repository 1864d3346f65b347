use crate::position::Position;
use crate::span::Span;
use crate::LLParser;

/// Parser state over a string, read one code point at a time.
#[derive(Debug, Clone)]
pub struct State<'a> {
    cursor: Position<'a>,
}

impl<'a> State<'a> {
    pub fn new(input: &'a str) -> Result<Self, anyhow::Error> {
        let cursor = Position::new(input, 0)?;
        Ok(State { cursor })
    }

    pub fn input(&self) -> &'a str {
        self.cursor.input
    }

    pub fn at_end(&self) -> bool {
        self.cursor.at_end()
    }

    /// Text consumed since `start`, an earlier `index()`.
    pub fn text_since(&self, start: usize) -> Result<Span<'a>, anyhow::Error> {
        let start = Position::new(self.cursor.input, start)?;
        Span::from_positions(&start, &self.cursor)
    }
}

impl<'a> LLParser for State<'a> {
    fn la(&self, offset: usize) -> i32 {
        self.cursor.peek(offset)
    }

    fn advance(&mut self) {
        self.cursor.advance();
    }

    fn index(&self) -> usize {
        self.cursor.idx
    }

    fn restore(&mut self, index: usize) {
        if let Ok(pos) = Position::new(self.cursor.input, index) {
            self.cursor = pos;
        }
    }

    fn location(&self) -> String {
        let (line, col) = self.cursor.line_col();
        format!("{}:{}", line, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EOF;

    #[test]
    fn state_match_set() {
        let mut state = State::new("a1").unwrap();
        let letter = [('a' as i32, 'z' as i32)];
        let digit = [('0' as i32, '9' as i32)];
        assert_eq!(state.match_set(&letter).unwrap(), 'a' as i32);
        assert!(state.match_set(&letter).is_err());
        assert_eq!(state.index(), 1);
        assert!(state.try_match_set(&digit));
        assert_eq!(state.la(0), EOF);
        assert!(state.at_end());
    }

    #[test]
    fn state_error_message() {
        let mut state = State::new("ab\nx").unwrap();
        for _ in 0..3 {
            state.skip();
        }
        let err = state.match_set(&[('0' as i32, '9' as i32)]).unwrap_err();
        assert_eq!(err.to_string(), "2:1: unexpected 'x', expected '0'..'9'");
    }

    #[test]
    fn state_try_recognize_restores() {
        let mut state = State::new("abc").unwrap();
        let matched = state.try_recognize(|s| {
            s.skip();
            s.try_match_set(&[('b' as i32, 'b' as i32)])
        });
        assert!(matched);
        assert_eq!(state.index(), 0);
    }

    #[test]
    fn state_text_since() {
        let mut state = State::new("hello world").unwrap();
        let start = state.index();
        for _ in 0..5 {
            state.skip();
        }
        assert_eq!(state.text_since(start).unwrap().as_str(), "hello");
    }
}
