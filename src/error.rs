use std::error;
use std::fmt::{self, Display};

use grammar::{Alt, PredId};

pub type Result<T> = std::result::Result<T, GenError>;

/// Problems that stop generation of a rule, or of the whole grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum GenError {
    Grammar(grammar::Error),
    EmptyAlts { rule: String, pred: PredId },
    /// A prediction tree leads somewhere its `Alts` cannot go.
    ArmOutOfRange { rule: String, pred: PredId, alt: Alt },
    MissingPrediction { rule: String, pred: PredId },
    /// Rule calls nested too deeply while computing lookahead, which
    /// indicates left recursion.
    RecursionLimit { rule: String, limit: usize },
    UnknownRule { rule: String, referenced: String },
    MissingRecognizer(String),
    InvalidOption(String),
}

impl Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            GenError::Grammar(ref e) => write!(f, "Invalid grammar: {}", e),
            GenError::EmptyAlts { ref rule, pred } => {
                write!(f, "Alternative set {} in rule '{}' has no arms", pred, rule)
            }
            GenError::ArmOutOfRange {
                ref rule,
                pred,
                alt,
            } => write!(
                f,
                "Prediction for {} in rule '{}' leads to invalid branch '{}'",
                pred, rule, alt
            ),
            GenError::MissingPrediction { ref rule, pred } => write!(
                f,
                "Alternative set {} in rule '{}' was never analyzed",
                pred, rule
            ),
            GenError::RecursionLimit { ref rule, limit } => write!(
                f,
                "Rule '{}' nests more than {} rule calls without consuming input (left recursion?)",
                rule, limit
            ),
            GenError::UnknownRule {
                ref rule,
                ref referenced,
            } => write!(f, "Rule '{}' references unknown rule '{}'", rule, referenced),
            GenError::MissingRecognizer(ref rule) => {
                write!(f, "Rule '{}' has no recognizer form", rule)
            }
            GenError::InvalidOption(ref s) => write!(f, "Invalid option: {}", s),
        }
    }
}

impl error::Error for GenError {}

impl From<grammar::Error> for GenError {
    fn from(e: grammar::Error) -> GenError {
        GenError::Grammar(e)
    }
}

impl From<syn::Error> for GenError {
    fn from(e: syn::Error) -> GenError {
        GenError::InvalidOption(format!("syn error: {}", e))
    }
}
