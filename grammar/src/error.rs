use std::error;
use std::fmt::{self, Display};

use crate::PredId;

pub type Result<T> = std::result::Result<T, Error>;

/// Structural problems found in a grammar before any analysis is attempted.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    DuplicateRule(String),
    UnknownRule { rule: String, referenced: String },
    EmptyAlts { rule: String, pred: PredId },
    /// The same node is reachable from two places. Trees must not be aliased.
    SharedPred { rule: String, pred: PredId },
    DefaultArmOutOfRange { rule: String, pred: PredId, arm: usize },
    InvalidType(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::DuplicateRule(ref name) => write!(f, "rule '{}' is defined twice", name),
            Error::UnknownRule {
                ref rule,
                ref referenced,
            } => write!(f, "rule '{}' references unknown rule '{}'", rule, referenced),
            Error::EmptyAlts { ref rule, pred } => {
                write!(f, "alternative set {} in rule '{}' has no arms", pred, rule)
            }
            Error::SharedPred { ref rule, pred } => write!(
                f,
                "node {} in rule '{}' is reachable from more than one parent",
                pred, rule
            ),
            Error::DefaultArmOutOfRange {
                ref rule,
                pred,
                arm,
            } => write!(
                f,
                "default arm {} of {} in rule '{}' does not exist",
                arm, pred, rule
            ),
            Error::InvalidType(ref s) => write!(f, "invalid type: {}", s),
        }
    }
}

impl error::Error for Error {}

impl From<syn::Error> for Error {
    fn from(e: syn::Error) -> Error {
        Error::InvalidType(e.to_string())
    }
}
