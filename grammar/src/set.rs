use std::fmt::{Debug, Display};

use proc_macro2::TokenStream;

/// The operations the generator needs from a set of terminals. The analysis
/// never looks inside a set; it only combines sets and asks for tests.
pub trait TerminalSet: Clone + Debug + Display + PartialEq {
    fn empty() -> Self;

    /// Every terminal, including end-of-input.
    fn everything() -> Self;

    /// The set holding only end-of-input.
    fn eof() -> Self;

    fn union(&self, other: &Self) -> Self;

    fn subtract(&self, other: &Self) -> Self;

    fn intersection(&self, other: &Self) -> Self {
        self.subtract(&self.subtract(other))
    }

    fn is_empty(&self) -> bool;

    fn contains_everything(&self) -> bool;

    fn is_subset_of(&self, other: &Self) -> bool {
        self.subtract(other).is_empty()
    }

    /// Returns a set that is equivalent to `self` for inputs outside
    /// `covered`, but may be cheaper to test.
    fn optimize(&self, covered: &Self) -> Self;

    /// Builds a boolean expression testing whether `la` is in the set.
    fn generate_test(&self, la: &TokenStream) -> TokenStream;
}
