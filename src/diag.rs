//! Warnings and errors meant for the grammar author.

use std::fmt::{self, Display};

use grammar::{Grammar, PredId, TerminalSet};
use log::{error, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// The grammar node a message is about.
#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    pub rule: String,
    pub pred: Option<PredId>,
    /// Source text of the node, when the grammar recorded it.
    pub basis: Option<String>,
}

impl Location {
    pub fn rule(rule: &str) -> Self {
        Location {
            rule: rule.to_owned(),
            pred: None,
            basis: None,
        }
    }

    pub fn pred<S: TerminalSet>(grammar: &Grammar<S>, rule: &str, pred: PredId) -> Self {
        Location {
            rule: rule.to_owned(),
            pred: Some(pred),
            basis: grammar.pred(pred).basis.as_ref().map(|b| b.to_string()),
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.rule)?;
        if let Some(pred) = self.pred {
            write!(f, "{}", pred)?;
        }
        if let Some(ref basis) = self.basis {
            write!(f, " ({})", basis)?;
        }
        Ok(())
    }
}

pub trait MessageSink {
    fn report(&mut self, severity: Severity, location: &Location, message: &str);
}

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub severity: Severity,
    pub location: Location,
    pub message: String,
}

impl Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.severity, self.message)
    }
}

/// Collects every message reported to it.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    messages: Vec<Message>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn errors(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|m| m.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|m| m.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

impl MessageSink for Diagnostics {
    fn report(&mut self, severity: Severity, location: &Location, message: &str) {
        self.messages.push(Message {
            severity,
            location: location.clone(),
            message: message.to_owned(),
        });
    }
}

/// Forwards messages to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl MessageSink for LogSink {
    fn report(&mut self, severity: Severity, location: &Location, message: &str) {
        match severity {
            Severity::Warning => warn!("{}: {}", location, message),
            Severity::Error => error!("{}: {}", location, message),
        }
    }
}
