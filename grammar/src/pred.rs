use std::fmt::{self, Display};

use proc_macro2::{Ident, TokenStream};
use quote::quote;

use crate::prediction::PredictionTree;

/// Index of a predicate in its grammar's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredId(pub u32);

impl PredId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for PredId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMode {
    None,
    /// `(...)*`
    Star,
    /// `(...)?`
    Opt,
}

/// One node of a rule body, plus the annotations every node can carry.
#[derive(Clone, Debug)]
pub struct Pred<S> {
    pub kind: PredKind<S>,
    /// Variable the user attached with `label:pred`.
    pub label: Option<Ident>,
    /// The label collects every match (`label+:pred`).
    pub is_list: bool,
    /// Set by the value saver once a variable exists for this node.
    pub result_saver: Option<ResultSaver>,
    pub pre_action: Option<TokenStream>,
    pub post_action: Option<TokenStream>,
    /// The grammar syntax this node came from. Code blocks may refer to the
    /// node with `$basis`.
    pub basis: Option<TokenStream>,
}

#[derive(Clone, Debug)]
pub enum PredKind<S> {
    Seq(Vec<PredId>),
    Alts(Alts<S>),
    Gate(Gate),
    And(AndPred),
    RuleRef(RuleRef),
    Terminal(TerminalPred<S>),
}

#[derive(Clone, Debug)]
pub struct Alts<S> {
    pub arms: Vec<PredId>,
    pub mode: LoopMode,
    /// Arm chosen for input no arm claims. `None` means the exit branch for
    /// loops and the last arm otherwise.
    pub default_arm: Option<usize>,
    /// Input no arm claims is an error instead of going to the default.
    pub error_branch: bool,
    /// Explicit greediness. `None` resolves loop ambiguity greedily and warns.
    pub greedy: Option<bool>,
    /// Filled in by prediction analysis.
    pub prediction: Option<PredictionTree<S>>,
}

impl<S> Alts<S> {
    pub fn new(arms: Vec<PredId>, mode: LoopMode) -> Self {
        Alts {
            arms,
            mode,
            default_arm: None,
            error_branch: false,
            greedy: None,
            prediction: None,
        }
    }
}

/// `predict => match`: prediction looks at `predict`, parsing runs `matches`.
#[derive(Clone, Copy, Debug)]
pub struct Gate {
    pub predict: PredId,
    pub matches: PredId,
}

/// A zero-width check.
#[derive(Clone, Debug)]
pub struct AndPred {
    /// `&!` rather than `&`.
    pub negate: bool,
    pub kind: AndKind,
    /// Whether prediction already proved the check.
    pub prematched: Option<bool>,
}

#[derive(Clone, Debug)]
pub enum AndKind {
    /// `&{ expr }`, which may use `$LA` and `$LI`.
    Code(TokenStream),
    /// `&( pred )`, checked by calling a recognizer. `rule` names the
    /// recognizer rule synthesized for it.
    Syntactic { pred: PredId, rule: Option<String> },
}

#[derive(Clone, Debug)]
pub struct RuleRef {
    pub rule: String,
}

#[derive(Clone, Debug)]
pub struct TerminalPred<S> {
    pub set: S,
    pub prematched: Option<bool>,
}

/// Stores a match result into a generated variable.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultSaver {
    pub var: Ident,
    /// Push onto a list instead of assigning.
    pub append: bool,
}

impl ResultSaver {
    pub fn new(var: Ident, append: bool) -> Self {
        ResultSaver { var, append }
    }

    /// Wraps a match expression into a statement saving its value.
    pub fn apply(&self, expr: TokenStream) -> TokenStream {
        let var = &self.var;
        if self.append {
            quote! { #var.push(#expr); }
        } else {
            quote! { #var = #expr; }
        }
    }
}

impl<S> Pred<S> {
    pub fn new(kind: PredKind<S>) -> Self {
        Pred {
            kind,
            label: None,
            is_list: false,
            result_saver: None,
            pre_action: None,
            post_action: None,
            basis: None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            PredKind::Seq(_) => "sequence",
            PredKind::Alts(_) => "alternatives",
            PredKind::Gate(_) => "gate",
            PredKind::And(_) => "and-predicate",
            PredKind::RuleRef(_) => "rule reference",
            PredKind::Terminal(_) => "terminal",
        }
    }

    pub fn as_alts(&self) -> Option<&Alts<S>> {
        match self.kind {
            PredKind::Alts(ref alts) => Some(alts),
            _ => None,
        }
    }

    pub fn as_alts_mut(&mut self) -> Option<&mut Alts<S>> {
        match self.kind {
            PredKind::Alts(ref mut alts) => Some(alts),
            _ => None,
        }
    }

    /// Nodes directly below this one, in order. The syntactic payload of an
    /// and-predicate is included.
    pub fn children(&self) -> Vec<PredId> {
        match self.kind {
            PredKind::Seq(ref items) => items.clone(),
            PredKind::Alts(ref alts) => alts.arms.clone(),
            PredKind::Gate(gate) => vec![gate.predict, gate.matches],
            PredKind::And(AndPred {
                kind: AndKind::Syntactic { pred, .. },
                ..
            }) => vec![pred],
            _ => Vec::new(),
        }
    }
}

/// Concatenates two optional code blocks.
pub fn merge_actions(
    first: Option<TokenStream>,
    second: Option<TokenStream>,
) -> Option<TokenStream> {
    match (first, second) {
        (Some(a), Some(b)) => Some(quote! { #a #b }),
        (a, None) => a,
        (None, b) => b,
    }
}
