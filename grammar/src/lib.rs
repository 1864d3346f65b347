//! Grammar IR for an LL(k) parser generator.
//!
//! A `Grammar` owns an arena of predicates and a set of named rules. Each rule
//! exclusively owns the predicate tree under its body; trees refer to other
//! rules by name only.

use std::collections::HashMap;
use std::fmt::{self, Display};

use indexmap::IndexMap;
use proc_macro2::{Ident, Span, TokenStream};

mod charset;
mod error;
mod pred;
pub mod prediction;
mod rule;
mod set;

pub use charset::{char_literal, CharSet, EOF, MAX_CHAR};
pub use error::{Error, Result};
pub use pred::{
    merge_actions, AndKind, AndPred, Alts, Gate, LoopMode, Pred, PredId, PredKind, ResultSaver,
    RuleRef, TerminalPred,
};
pub use prediction::{Alt, AndPredSet, AndRef, BranchTarget, PredictionBranch, PredictionTree};
pub use rule::Rule;
pub use set::TerminalSet;

/// A set of rules and the predicates they are built from.
#[derive(Clone, Debug)]
pub struct Grammar<S> {
    preds: Vec<Pred<S>>,
    rules: IndexMap<String, Rule>,
}

impl<S: TerminalSet> Default for Grammar<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TerminalSet> Grammar<S> {
    pub fn new() -> Self {
        Grammar {
            preds: Vec::new(),
            rules: IndexMap::new(),
        }
    }

    pub fn pred(&self, id: PredId) -> &Pred<S> {
        &self.preds[id.index()]
    }

    pub fn pred_mut(&mut self, id: PredId) -> &mut Pred<S> {
        &mut self.preds[id.index()]
    }

    pub fn add_pred(&mut self, pred: Pred<S>) -> PredId {
        let id = PredId(self.preds.len() as u32);
        self.preds.push(pred);
        id
    }

    fn add_kind(&mut self, kind: PredKind<S>) -> PredId {
        self.add_pred(Pred::new(kind))
    }

    pub fn terminal(&mut self, set: S) -> PredId {
        self.add_kind(PredKind::Terminal(TerminalPred {
            set,
            prematched: None,
        }))
    }

    pub fn seq<I: IntoIterator<Item = PredId>>(&mut self, items: I) -> PredId {
        self.add_kind(PredKind::Seq(items.into_iter().collect()))
    }

    pub fn alts<I: IntoIterator<Item = PredId>>(&mut self, arms: I) -> PredId {
        let arms = arms.into_iter().collect();
        self.add_kind(PredKind::Alts(Alts::new(arms, LoopMode::None)))
    }

    /// `inner*`. A bare alternative set becomes the loop itself.
    pub fn star(&mut self, inner: PredId) -> PredId {
        self.loop_of(inner, LoopMode::Star)
    }

    /// `inner?`
    pub fn opt(&mut self, inner: PredId) -> PredId {
        self.loop_of(inner, LoopMode::Opt)
    }

    /// `inner+`, expanded to `inner inner*`.
    pub fn plus(&mut self, inner: PredId) -> PredId {
        let again = self.deep_clone(inner);
        let rest = self.star(again);
        self.seq(vec![inner, rest])
    }

    fn loop_of(&mut self, inner: PredId, mode: LoopMode) -> PredId {
        let pred = &mut self.preds[inner.index()];
        let bare = pred.label.is_none() && pred.pre_action.is_none() && pred.post_action.is_none();
        match pred.kind {
            PredKind::Alts(ref mut alts) if bare && alts.mode == LoopMode::None => {
                alts.mode = mode;
                inner
            }
            _ => self.add_kind(PredKind::Alts(Alts::new(vec![inner], mode))),
        }
    }

    pub fn gate(&mut self, predict: PredId, matches: PredId) -> PredId {
        self.add_kind(PredKind::Gate(Gate { predict, matches }))
    }

    /// `&{ code }`
    pub fn and_code(&mut self, code: TokenStream) -> PredId {
        self.and_kind(AndKind::Code(code), false)
    }

    /// `&!{ code }`
    pub fn not_code(&mut self, code: TokenStream) -> PredId {
        self.and_kind(AndKind::Code(code), true)
    }

    /// `&( pred )`
    pub fn and_pred(&mut self, pred: PredId) -> PredId {
        self.and_kind(AndKind::Syntactic { pred, rule: None }, false)
    }

    /// `&!( pred )`
    pub fn not_pred(&mut self, pred: PredId) -> PredId {
        self.and_kind(AndKind::Syntactic { pred, rule: None }, true)
    }

    fn and_kind(&mut self, kind: AndKind, negate: bool) -> PredId {
        self.add_kind(PredKind::And(AndPred {
            negate,
            kind,
            prematched: None,
        }))
    }

    pub fn call(&mut self, rule: &str) -> PredId {
        self.add_kind(PredKind::RuleRef(RuleRef {
            rule: rule.to_owned(),
        }))
    }

    /// `name:pred`
    pub fn label(&mut self, id: PredId, name: &str) -> PredId {
        let pred = self.pred_mut(id);
        pred.label = Some(Ident::new(name, Span::call_site()));
        pred.is_list = false;
        id
    }

    /// `name+:pred`
    pub fn list_label(&mut self, id: PredId, name: &str) -> PredId {
        self.label(id, name);
        self.pred_mut(id).is_list = true;
        id
    }

    pub fn pre_action(&mut self, id: PredId, code: TokenStream) -> PredId {
        let pred = self.pred_mut(id);
        pred.pre_action = merge_actions(pred.pre_action.take(), Some(code));
        id
    }

    pub fn post_action(&mut self, id: PredId, code: TokenStream) -> PredId {
        let pred = self.pred_mut(id);
        pred.post_action = merge_actions(pred.post_action.take(), Some(code));
        id
    }

    pub fn basis(&mut self, id: PredId, basis: TokenStream) -> PredId {
        self.pred_mut(id).basis = Some(basis);
        id
    }

    /// Marks `arm` as the default arm of an alternative set.
    pub fn default_arm(&mut self, id: PredId, arm: usize) -> PredId {
        if let Some(alts) = self.pred_mut(id).as_alts_mut() {
            alts.default_arm = Some(arm);
        }
        id
    }

    /// Input no arm claims becomes an error.
    pub fn error_branch(&mut self, id: PredId) -> PredId {
        if let Some(alts) = self.pred_mut(id).as_alts_mut() {
            alts.error_branch = true;
        }
        id
    }

    pub fn greedy(&mut self, id: PredId, greedy: bool) -> PredId {
        if let Some(alts) = self.pred_mut(id).as_alts_mut() {
            alts.greedy = Some(greedy);
        }
        id
    }

    /// Copies the tree under `id` into fresh nodes.
    pub fn deep_clone(&mut self, id: PredId) -> PredId {
        let mut pred = self.pred(id).clone();
        pred.kind = match pred.kind {
            PredKind::Seq(items) => {
                PredKind::Seq(items.into_iter().map(|c| self.deep_clone(c)).collect())
            }
            PredKind::Alts(mut alts) => {
                alts.arms = alts.arms.into_iter().map(|c| self.deep_clone(c)).collect();
                alts.prediction = None;
                PredKind::Alts(alts)
            }
            PredKind::Gate(gate) => PredKind::Gate(Gate {
                predict: self.deep_clone(gate.predict),
                matches: self.deep_clone(gate.matches),
            }),
            PredKind::And(AndPred {
                negate,
                kind: AndKind::Syntactic { pred, rule },
                prematched,
            }) => PredKind::And(AndPred {
                negate,
                kind: AndKind::Syntactic {
                    pred: self.deep_clone(pred),
                    rule,
                },
                prematched,
            }),
            other => other,
        };
        self.add_pred(pred)
    }

    pub fn add_rule(&mut self, rule: Rule) -> Result<()> {
        if self.rules.contains_key(&rule.name) {
            return Err(Error::DuplicateRule(rule.name));
        }
        self.rules.insert(rule.name.clone(), rule);
        Ok(())
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn rule_mut(&mut self, name: &str) -> Option<&mut Rule> {
        self.rules.get_mut(name)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    pub fn rule_names(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    /// Every node of the tree under `root`, parents before children.
    pub fn walk(&self, root: PredId) -> Vec<PredId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children = self.pred(id).children();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Like `walk`, but skips the prediction side of gates and the payload of
    /// syntactic predicates. These nodes are never matched by the rule itself.
    pub fn walk_matched(&self, root: PredId) -> Vec<PredId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            match self.pred(id).kind {
                PredKind::Seq(ref items) => stack.extend(items.iter().rev()),
                PredKind::Alts(ref alts) => stack.extend(alts.arms.iter().rev()),
                PredKind::Gate(gate) => stack.push(gate.matches),
                _ => {}
            }
        }
        out
    }

    /// Checks the shape invariants every later pass relies on.
    pub fn validate(&self) -> Result<()> {
        let mut owners: HashMap<PredId, &str> = HashMap::new();
        for rule in self.rules.values() {
            for id in self.walk(rule.body) {
                if owners.insert(id, &rule.name).is_some() {
                    return Err(Error::SharedPred {
                        rule: rule.name.clone(),
                        pred: id,
                    });
                }
                match self.pred(id).kind {
                    PredKind::Alts(ref alts) => {
                        if alts.arms.is_empty() {
                            return Err(Error::EmptyAlts {
                                rule: rule.name.clone(),
                                pred: id,
                            });
                        }
                        match alts.default_arm {
                            Some(arm) if arm >= alts.arms.len() => {
                                return Err(Error::DefaultArmOutOfRange {
                                    rule: rule.name.clone(),
                                    pred: id,
                                    arm,
                                })
                            }
                            _ => {}
                        }
                    }
                    PredKind::RuleRef(ref rref) if !self.rules.contains_key(&rref.rule) => {
                        return Err(Error::UnknownRule {
                            rule: rule.name.clone(),
                            referenced: rref.rule.clone(),
                        })
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Renders the tree under `id` in grammar notation.
    pub fn pred_to_string(&self, id: PredId) -> String {
        let mut s = String::new();
        self.write_pred(&mut s, id);
        s
    }

    fn write_pred(&self, s: &mut String, id: PredId) {
        let pred = self.pred(id);
        if let Some(ref label) = pred.label {
            s.push_str(&label.to_string());
            s.push_str(if pred.is_list { "+:" } else { ":" });
        }
        match pred.kind {
            PredKind::Seq(ref items) => {
                for (i, &item) in items.iter().enumerate() {
                    if i > 0 {
                        s.push(' ');
                    }
                    self.write_pred(s, item);
                }
            }
            PredKind::Alts(ref alts) => {
                s.push('(');
                for (i, &arm) in alts.arms.iter().enumerate() {
                    if i > 0 {
                        s.push('|');
                    }
                    self.write_pred(s, arm);
                }
                s.push(')');
                match alts.mode {
                    LoopMode::None => {}
                    LoopMode::Star => s.push('*'),
                    LoopMode::Opt => s.push('?'),
                }
            }
            PredKind::Gate(gate) => {
                self.write_pred(s, gate.predict);
                s.push_str(" => ");
                self.write_pred(s, gate.matches);
            }
            PredKind::And(ref and) => {
                s.push_str(if and.negate { "&!" } else { "&" });
                match and.kind {
                    AndKind::Code(ref code) => {
                        s.push('{');
                        s.push_str(&code.to_string());
                        s.push('}');
                    }
                    AndKind::Syntactic { pred, .. } => {
                        s.push('(');
                        self.write_pred(s, pred);
                        s.push(')');
                    }
                }
            }
            PredKind::RuleRef(ref rref) => s.push_str(&rref.rule),
            PredKind::Terminal(ref term) => s.push_str(&term.set.to_string()),
        }
    }
}

impl<S: TerminalSet> Display for Grammar<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for rule in self.rules.values() {
            writeln!(f, "{} = {} ;", rule.name, self.pred_to_string(rule.body))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn foo() -> Grammar<CharSet> {
        let mut g = Grammar::new();
        let a = g.terminal(CharSet::of('a'));
        let upper_a = g.terminal(CharSet::of('A'));
        let inner = g.alts(vec![a, upper_a]);
        let second = g.terminal(CharSet::of('A'));
        let body = g.seq(vec![inner, second]);
        let looped = g.star(body);
        let az1 = g.terminal(CharSet::range('a', 'z'));
        let az2 = g.terminal(CharSet::range('a', 'z'));
        let root = g.seq(vec![looped, az1, az2]);
        g.add_rule(Rule::new("Foo", root)).unwrap();
        g
    }

    #[test]
    fn display_grammar() {
        assert_eq!(
            foo().to_string(),
            "Foo = (('a'|'A') 'A')* 'a'..'z' 'a'..'z' ;\n"
        );
    }

    #[test]
    fn star_reuses_bare_alts() {
        let mut g: Grammar<CharSet> = Grammar::new();
        let a = g.terminal(CharSet::of('a'));
        let b = g.terminal(CharSet::of('b'));
        let alts = g.alts(vec![a, b]);
        let looped = g.star(alts);
        assert_eq!(looped, alts);
        assert_eq!(g.pred(alts).as_alts().unwrap().mode, LoopMode::Star);
    }

    #[test]
    fn plus_copies_its_operand() {
        let mut g: Grammar<CharSet> = Grammar::new();
        let digit = g.terminal(CharSet::range('0', '9'));
        let digits = g.plus(digit);
        g.add_rule(Rule::new("Digits", digits).token()).unwrap();
        assert_eq!(g.pred_to_string(digits), "'0'..'9' ('0'..'9')*");
        assert!(g.validate().is_ok());
    }

    #[test]
    fn walk_matched_skips_predicted_side() {
        let mut g: Grammar<CharSet> = Grammar::new();
        let predict = g.terminal(CharSet::of('p'));
        let matches = g.terminal(CharSet::of('m'));
        let gate = g.gate(predict, matches);
        let inner = g.terminal(CharSet::of('s'));
        let check = g.and_pred(inner);
        let root = g.seq(vec![check, gate]);
        assert_eq!(g.walk(root), vec![root, check, inner, gate, predict, matches]);
        assert_eq!(g.walk_matched(root), vec![root, check, gate, matches]);
    }

    #[test]
    fn validate_rejects_shared_nodes() {
        let mut g: Grammar<CharSet> = Grammar::new();
        let a = g.terminal(CharSet::of('a'));
        let root = g.seq(vec![a, a]);
        g.add_rule(Rule::new("Twice", root)).unwrap();
        assert_eq!(
            g.validate(),
            Err(Error::SharedPred {
                rule: "Twice".to_owned(),
                pred: a
            })
        );
    }

    #[test]
    fn validate_rejects_unknown_rules_and_empty_alts() {
        let mut g: Grammar<CharSet> = Grammar::new();
        let call = g.call("Missing");
        g.add_rule(Rule::new("Caller", call)).unwrap();
        assert_eq!(
            g.validate(),
            Err(Error::UnknownRule {
                rule: "Caller".to_owned(),
                referenced: "Missing".to_owned()
            })
        );

        let mut g: Grammar<CharSet> = Grammar::new();
        let empty = g.alts(Vec::new());
        g.add_rule(Rule::new("Empty", empty)).unwrap();
        assert_eq!(
            g.validate(),
            Err(Error::EmptyAlts {
                rule: "Empty".to_owned(),
                pred: empty
            })
        );
    }

    #[test]
    fn duplicate_rules_are_rejected() {
        let mut g: Grammar<CharSet> = Grammar::new();
        let a = g.terminal(CharSet::of('a'));
        let b = g.terminal(CharSet::of('b'));
        g.add_rule(Rule::new("A", a)).unwrap();
        assert_eq!(
            g.add_rule(Rule::new("A", b)),
            Err(Error::DuplicateRule("A".to_owned()))
        );
    }
}
