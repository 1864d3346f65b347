//! Decision structure attached to every `Alts` after analysis.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};

use crate::pred::PredId;

/// Where a prediction ends up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Alt {
    Arm(usize),
    /// Leave the loop.
    Exit,
    /// No arm matches.
    Error,
}

impl Display for Alt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Alt::Arm(i) => write!(f, "{}", i + 1),
            Alt::Exit => write!(f, "exit"),
            Alt::Error => write!(f, "error"),
        }
    }
}

/// An and-predicate met while computing lookahead, with the offset at which
/// it has to be evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AndRef {
    pub pred: PredId,
    pub offset: usize,
}

/// All of these must hold.
pub type AndPredSet = BTreeSet<AndRef>;

#[derive(Clone, Debug, PartialEq)]
pub struct PredictionTree<S> {
    /// Lookahead offset examined by this level.
    pub lookahead: usize,
    /// Branches are told apart with and-predicates instead of terminal sets.
    pub is_assertion_level: bool,
    pub children: Vec<PredictionBranch<S>>,
    /// Union of the sets of every branch except an error branch.
    pub total_coverage: S,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PredictionBranch<S> {
    /// Terminals selecting this branch (lookahead levels).
    pub set: S,
    /// Any one of these sets selects the branch (assertion levels). An empty
    /// list is the unconditional fallback.
    pub and_preds: Vec<AndPredSet>,
    /// Union of the sets of the branches before this one.
    pub covered: S,
    pub sub: BranchTarget<S>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BranchTarget<S> {
    Tree(Box<PredictionTree<S>>),
    Alt(Alt),
}

impl<S> PredictionBranch<S> {
    pub fn is_error_branch(&self) -> bool {
        match self.sub {
            BranchTarget::Alt(Alt::Error) => true,
            _ => false,
        }
    }
}

impl<S> PredictionTree<S> {
    /// Whether the level reads a lookahead variable.
    pub fn uses_la(&self) -> bool {
        !self.is_assertion_level
    }

    /// Counts how many leaves lead to each alternative.
    pub fn count_times_used(&self, counts: &mut BTreeMap<Alt, usize>) {
        for branch in &self.children {
            match branch.sub {
                BranchTarget::Tree(ref tree) => tree.count_times_used(counts),
                BranchTarget::Alt(alt) => *counts.entry(alt).or_insert(0) += 1,
            }
        }
    }

    pub fn times_used(&self) -> BTreeMap<Alt, usize> {
        let mut counts = BTreeMap::new();
        self.count_times_used(&mut counts);
        counts
    }

    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|branch| match branch.sub {
                BranchTarget::Tree(ref tree) => tree.depth(),
                BranchTarget::Alt(_) => 0,
            })
            .max()
            .unwrap_or(0)
    }

    /// Every lookahead offset some level of the tree reads.
    pub fn offsets_used(&self) -> BTreeSet<usize> {
        let mut offsets = BTreeSet::new();
        self.collect_offsets(&mut offsets);
        offsets
    }

    fn collect_offsets(&self, offsets: &mut BTreeSet<usize>) {
        if self.uses_la() && self.children.len() > 1 {
            offsets.insert(self.lookahead);
        }
        for branch in &self.children {
            if let BranchTarget::Tree(ref tree) = branch.sub {
                tree.collect_offsets(offsets);
            }
        }
    }

    /// Returns the first leaf that does not fit an `Alts` with `arms` arms.
    pub fn find_invalid_alt(&self, arms: usize, has_exit: bool) -> Option<Alt> {
        self.children.iter().find_map(|branch| match branch.sub {
            BranchTarget::Tree(ref tree) => tree.find_invalid_alt(arms, has_exit),
            BranchTarget::Alt(Alt::Arm(i)) if i >= arms => Some(Alt::Arm(i)),
            BranchTarget::Alt(Alt::Exit) if !has_exit => Some(Alt::Exit),
            BranchTarget::Alt(_) => None,
        })
    }
}

impl<S: Display> PredictionTree<S> {
    fn fmt_indented(&self, f: &mut fmt::Formatter, depth: usize) -> fmt::Result {
        for branch in &self.children {
            write!(f, "{:width$}", "", width = depth * 2)?;
            if self.is_assertion_level {
                if branch.and_preds.is_empty() {
                    write!(f, "else")?;
                } else {
                    let sets: Vec<String> = branch
                        .and_preds
                        .iter()
                        .map(|set| {
                            let preds: Vec<String> =
                                set.iter().map(|a| a.pred.to_string()).collect();
                            preds.join("&&")
                        })
                        .collect();
                    write!(f, "&[{}]", sets.join("||"))?;
                }
            } else {
                write!(f, "la{} {}", self.lookahead, branch.set)?;
            }
            match branch.sub {
                BranchTarget::Alt(alt) => writeln!(f, " => {}", alt)?,
                BranchTarget::Tree(ref tree) => {
                    writeln!(f, " =>")?;
                    tree.fmt_indented(f, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

impl<S: Display> Display for PredictionTree<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
