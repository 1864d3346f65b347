use std::fmt::{self, Debug, Display, Formatter};

use proc_macro2::{Literal, TokenStream};
use quote::quote;

use crate::set::TerminalSet;

/// Lookahead value reported at the end of input.
pub const EOF: i32 = -1;

/// Largest code point a `CharSet` can hold.
pub const MAX_CHAR: i32 = 0x10FFFF;

/// A set of code points stored as sorted, non-adjacent inclusive ranges. The
/// universe is `EOF..=MAX_CHAR`.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct CharSet {
    ranges: Vec<(i32, i32)>,
}

impl CharSet {
    pub fn new() -> Self {
        CharSet { ranges: Vec::new() }
    }

    pub fn from_ranges<I>(ranges: I) -> Self
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        CharSet {
            ranges: normalize(ranges.into_iter().collect()),
        }
    }

    pub fn of(c: char) -> Self {
        Self::from_ranges(vec![(c as i32, c as i32)])
    }

    pub fn range(lo: char, hi: char) -> Self {
        Self::from_ranges(vec![(lo as i32, hi as i32)])
    }

    /// A set holding every character of `s`.
    pub fn chars(s: &str) -> Self {
        Self::from_ranges(s.chars().map(|c| (c as i32, c as i32)))
    }

    pub fn ranges(&self) -> &[(i32, i32)] {
        &self.ranges
    }

    pub fn contains(&self, c: i32) -> bool {
        self.ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi)
    }

    pub fn complement(&self) -> Self {
        Self::everything().subtract(self)
    }

    /// Rough number of comparisons needed to test the set directly.
    fn test_cost(&self) -> usize {
        self.ranges
            .iter()
            .map(|&(lo, hi)| if lo == hi || lo == EOF || hi == MAX_CHAR { 1 } else { 2 })
            .sum()
    }

    fn cheapest_test_cost(&self) -> usize {
        self.test_cost().min(self.complement().test_cost())
    }
}

fn normalize(mut ranges: Vec<(i32, i32)>) -> Vec<(i32, i32)> {
    ranges.retain(|&(lo, hi)| lo <= hi && hi >= EOF && lo <= MAX_CHAR);
    ranges.sort();
    let mut merged: Vec<(i32, i32)> = Vec::with_capacity(ranges.len());
    for (lo, hi) in ranges {
        let lo = lo.max(EOF);
        let hi = hi.min(MAX_CHAR);
        match merged.last_mut() {
            Some(last) if lo <= last.1 + 1 => last.1 = last.1.max(hi),
            _ => merged.push((lo, hi)),
        }
    }
    merged
}

/// Renders a code point as it should appear in generated comparisons.
pub fn char_literal(c: i32) -> TokenStream {
    match std::char::from_u32(c as u32) {
        Some(ch) if c >= 0x20 && c < 0x7f => {
            let lit = Literal::character(ch);
            quote! { #lit as i32 }
        }
        _ => {
            let lit = Literal::i32_unsuffixed(c);
            quote! { #lit }
        }
    }
}

fn range_tests(ranges: &[(i32, i32)], la: &TokenStream) -> TokenStream {
    let tests = ranges.iter().map(|&(lo, hi)| {
        let lo_lit = char_literal(lo);
        let hi_lit = char_literal(hi);
        if lo == hi {
            quote! { #la == #lo_lit }
        } else if lo == EOF {
            quote! { #la <= #hi_lit }
        } else if hi == MAX_CHAR {
            quote! { #la >= #lo_lit }
        } else {
            quote! { #la >= #lo_lit && #la <= #hi_lit }
        }
    });
    quote! { #( #tests )||* }
}

impl TerminalSet for CharSet {
    fn empty() -> Self {
        CharSet::new()
    }

    fn everything() -> Self {
        CharSet {
            ranges: vec![(EOF, MAX_CHAR)],
        }
    }

    fn eof() -> Self {
        CharSet {
            ranges: vec![(EOF, EOF)],
        }
    }

    fn union(&self, other: &Self) -> Self {
        let mut ranges = self.ranges.clone();
        ranges.extend_from_slice(&other.ranges);
        CharSet {
            ranges: normalize(ranges),
        }
    }

    fn subtract(&self, other: &Self) -> Self {
        let mut out = Vec::new();
        for &(lo, hi) in &self.ranges {
            let mut lo = lo;
            for &(olo, ohi) in &other.ranges {
                if ohi < lo {
                    continue;
                }
                if olo > hi {
                    break;
                }
                if olo > lo {
                    out.push((lo, olo - 1));
                }
                lo = ohi + 1;
                if lo > hi {
                    break;
                }
            }
            if lo <= hi {
                out.push((lo, hi));
            }
        }
        CharSet { ranges: out }
    }

    fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    fn contains_everything(&self) -> bool {
        self.ranges == [(EOF, MAX_CHAR)]
    }

    fn optimize(&self, covered: &Self) -> Self {
        let widened = self.union(covered);
        if widened.cheapest_test_cost() < self.cheapest_test_cost() {
            widened
        } else {
            self.clone()
        }
    }

    fn generate_test(&self, la: &TokenStream) -> TokenStream {
        if self.is_empty() {
            return quote! { false };
        }
        if self.contains_everything() {
            return quote! { true };
        }
        let complement = self.complement();
        if complement.test_cost() < self.test_cost() {
            let inner = range_tests(&complement.ranges, la);
            quote! { !(#inner) }
        } else {
            range_tests(&self.ranges, la)
        }
    }
}

fn fmt_char(f: &mut Formatter, c: i32) -> fmt::Result {
    match std::char::from_u32(c as u32) {
        _ if c == EOF => write!(f, "EOF"),
        Some(ch) if c >= 0x20 && c < 0x7f => write!(f, "{:?}", ch),
        _ => write!(f, "{}", c),
    }
}

impl Display for CharSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.contains_everything() {
            return write!(f, "_");
        }
        if self.is_empty() {
            return write!(f, "()");
        }
        for (i, &(lo, hi)) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            fmt_char(f, lo)?;
            if lo != hi {
                write!(f, "..")?;
                fmt_char(f, hi)?;
            }
        }
        Ok(())
    }
}

impl Debug for CharSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "CharSet({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ranges_are_merged() {
        let set = CharSet::from_ranges(vec![(5, 7), (1, 3), (4, 4), (10, 12)]);
        assert_eq!(set.ranges(), &[(1, 7), (10, 12)]);
    }

    #[test]
    fn subtract_splits_ranges() {
        let az = CharSet::range('a', 'z');
        let got = az.subtract(&CharSet::chars("cx"));
        assert_eq!(
            got.ranges(),
            &[
                ('a' as i32, 'b' as i32),
                ('d' as i32, 'w' as i32),
                ('y' as i32, 'z' as i32)
            ]
        );
        assert!(az.subtract(&CharSet::everything()).is_empty());
    }

    #[test]
    fn complement_round_trips() {
        let set = CharSet::chars("aZ");
        assert!(set.union(&set.complement()).contains_everything());
        assert_eq!(set.complement().complement(), set);
    }

    #[test]
    fn intersection() {
        let a = CharSet::range('a', 'm');
        let b = CharSet::range('k', 'z');
        assert_eq!(a.intersection(&b), CharSet::range('k', 'm'));
    }

    #[test]
    fn single_char_test() {
        let la = quote! { la0 };
        let got = CharSet::of('a').generate_test(&la);
        assert_eq!(got.to_string(), quote! { la0 == 'a' as i32 }.to_string());
    }

    #[test]
    fn inverted_test_when_cheaper() {
        let la = quote! { la0 };
        let got = CharSet::of('\n').complement().generate_test(&la);
        assert_eq!(got.to_string(), quote! { !(la0 == 10) }.to_string());
    }

    #[test]
    fn optimize_uses_coverage() {
        // Everything outside 'a'..'z' was already handled, so the remaining
        // set can be tested as "anything but EOF".
        let covered = CharSet::everything()
            .subtract(&CharSet::range('a', 'z'))
            .subtract(&CharSet::eof());
        let set = CharSet::range('a', 'z');
        assert_eq!(set.optimize(&covered), set.union(&covered));
        assert_eq!(set.optimize(&CharSet::new()), set);
    }

    #[test]
    fn display() {
        let set = CharSet::range('a', 'z').union(&CharSet::of('_'));
        assert_eq!(set.to_string(), "'_'|'a'..'z'");
        assert_eq!(CharSet::eof().to_string(), "EOF");
    }
}
