//! Parsers written the way the generator emits them, run against real input.
//!
//! Foo = (('a'|'A') 'A')* 'a'..'z' 'a'..'z';
//! Start = &('x' 'y') 'x' 'a'..'z';

use parsegen::{LLParser, Result, State};

struct FooParser<'a> {
    state: State<'a>,
}

impl<'a> FooParser<'a> {
    fn new(input: &'a str) -> Result<Self> {
        Ok(FooParser {
            state: State::new(input)?,
        })
    }
}

impl<'a> LLParser for FooParser<'a> {
    fn la(&self, offset: usize) -> i32 {
        self.state.la(offset)
    }

    fn advance(&mut self) {
        self.state.advance()
    }

    fn index(&self) -> usize {
        self.state.index()
    }

    fn restore(&mut self, index: usize) {
        self.state.restore(index)
    }

    fn location(&self) -> String {
        self.state.location()
    }
}

impl<'a> FooParser<'a> {
    #[allow(
        non_snake_case,
        unused_mut,
        unused_parens,
        unused_assignments,
        unused_labels,
        unused_variables,
        unreachable_code
    )]
    pub fn Foo(&mut self) -> parsegen::Result<()> {
        let mut la0: i32;
        let mut la1: i32;
        'stop: loop {
            'match1: {
                la0 = self.la(0);
                if la0 == 'a' as i32 {
                    la1 = self.la(1);
                    if la1 == 'A' as i32 {
                        break 'match1;
                    } else {
                        break 'stop;
                    }
                } else if la0 == 'A' as i32 {
                    break 'match1;
                } else {
                    break 'stop;
                }
            }
            la0 = self.la(0);
            if la0 == 'a' as i32 {
                self.skip();
            } else {
                self.match_set(&[('A' as i32, 'A' as i32)])?;
            }
            self.match_set(&[('A' as i32, 'A' as i32)])?;
        }
        self.match_set(&[('a' as i32, 'z' as i32)])?;
        self.match_set(&[('a' as i32, 'z' as i32)])?;
        Ok(())
    }

    #[allow(
        non_snake_case,
        unused_mut,
        unused_parens,
        unused_assignments,
        unused_labels,
        unused_variables,
        unreachable_code
    )]
    pub fn Start(&mut self) -> parsegen::Result<()> {
        if !(self.try_recognize(|p| p.scan_Start_test1())) {
            return Err(self.check_failed("x y"));
        }
        self.match_set(&[('x' as i32, 'x' as i32)])?;
        self.match_set(&[('a' as i32, 'z' as i32)])?;
        Ok(())
    }

    #[allow(
        non_snake_case,
        unused_mut,
        unused_parens,
        unused_assignments,
        unused_labels,
        unused_variables,
        unreachable_code
    )]
    fn scan_Start_test1(&mut self) -> bool {
        if !self.try_match_set(&[('x' as i32, 'x' as i32)]) {
            return false;
        }
        if !self.try_match_set(&[('y' as i32, 'y' as i32)]) {
            return false;
        }
        true
    }
}

fn parse_foo(input: &str) -> Result<usize> {
    let mut p = FooParser::new(input)?;
    p.Foo()?;
    Ok(p.index())
}

#[test]
fn foo_accepts() {
    assert_eq!(parse_foo("ab").unwrap(), 2);
    assert_eq!(parse_foo("aAAAxy").unwrap(), 6);
    assert_eq!(parse_foo("AAaAzz").unwrap(), 6);
    // Trailing input is left for the caller.
    assert_eq!(parse_foo("aAqq!").unwrap(), 4);
}

#[test]
fn foo_rejects() {
    let err = parse_foo("aAq").unwrap_err();
    assert_eq!(
        err.to_string(),
        "1:4: unexpected end of input, expected 'a'..'z'"
    );
    let err = parse_foo("AB").unwrap_err();
    assert_eq!(err.to_string(), "1:2: unexpected 'B', expected 'A'");
}

#[test]
fn syntactic_predicate_rewinds() {
    let mut p = FooParser::new("xy").unwrap();
    p.Start().unwrap();
    assert_eq!(p.index(), 2);

    let mut p = FooParser::new("xz").unwrap();
    let err = p.Start().unwrap_err();
    assert_eq!(err.to_string(), "1:1: check failed: x y");
    assert_eq!(p.index(), 0);
}
