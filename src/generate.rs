//! Code generation visitor.
//!
//! Lowers one rule into a method body, either the parsing form or the
//! boolean recognizer form. Each alternative set becomes a decision on its
//! prediction tree followed by the code of the arm it picks.

use std::collections::{BTreeMap, BTreeSet};

use grammar::{
    Alt, AndKind, AndPred, AndPredSet, Alts, BranchTarget, Grammar, LoopMode, PredId, PredKind,
    PredictionTree, ResultSaver, Rule, TerminalPred, TerminalSet,
};
use log::{debug, trace};
use proc_macro2::{Literal, TokenStream};
use quote::quote;

use crate::diag::{Location, MessageSink, Severity};
use crate::error::{GenError, Result};
use crate::helper::CodeGenHelper;
use crate::stmt::{self, Stmt};
use crate::subst::{self, Subst, LOOKAHEAD_INDEX, LOOKAHEAD_VALUE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopType {
    None,
    Star,
    /// Runs once; `break` leaves it.
    Do,
}

struct LoopCtx {
    loop_type: LoopType,
    label: Option<String>,
}

/// Label counters of one method.
#[derive(Debug, Default)]
struct Labels {
    stops: usize,
    gotos: usize,
}

impl Labels {
    fn next_stop(&mut self) -> String {
        self.stops += 1;
        if self.stops == 1 {
            "stop".to_owned()
        } else {
            format!("stop{}", self.stops)
        }
    }

    /// Tells apart the shared code labels of different alternative sets.
    fn next_goto_suffix(&mut self) -> String {
        let n = self.gotos;
        self.gotos += 1;
        match n {
            0 => String::new(),
            1..=25 => ((b'a' + n as u8) as char).to_string(),
            _ => format!("_{}", n),
        }
    }
}

struct RuleGenerator<'a, S, H> {
    grammar: &'a Grammar<S>,
    rule: &'a Rule,
    helper: &'a mut H,
    sink: &'a mut dyn MessageSink,
    recognizer_mode: bool,
    /// Warnings are reported by the first form generated for a rule only.
    report: bool,
    la_vars_needed: BTreeSet<usize>,
    labels: Labels,
}

/// Generates the parse method of `rule`, or its recognizer.
pub fn generate_rule<S, H>(
    grammar: &Grammar<S>,
    rule: &Rule,
    helper: &mut H,
    sink: &mut dyn MessageSink,
    recognizer_mode: bool,
) -> Result<TokenStream>
where
    S: TerminalSet,
    H: CodeGenHelper<S>,
{
    helper.begin_rule(rule, recognizer_mode);
    let mut gen = RuleGenerator {
        grammar,
        rule,
        helper,
        sink,
        recognizer_mode,
        report: !recognizer_mode || rule.recognizer_only,
        la_vars_needed: BTreeSet::new(),
        labels: Labels::default(),
    };
    let body = gen.visit(rule.body)?;

    let la_type = gen.helper.lookahead_variable_type();
    let mut stmts: Vec<Stmt> = gen
        .la_vars_needed
        .iter()
        .map(|&offset| {
            let var = la_var(offset);
            Stmt::Code(quote! { let mut #var: #la_type; })
        })
        .collect();
    stmts.extend(body);
    debug!(
        "generated {} for rule {} (lookahead {:?})",
        if recognizer_mode { "recognizer" } else { "parser" },
        rule.name,
        gen.la_vars_needed
    );
    Ok(gen
        .helper
        .create_rule_method(rule, stmt::render(&stmts), recognizer_mode))
}

fn la_var(offset: usize) -> TokenStream {
    let var = subst::ident(&format!("la{}", offset));
    quote! { #var }
}

impl<'a, S, H> RuleGenerator<'a, S, H>
where
    S: TerminalSet,
    H: CodeGenHelper<S>,
{
    fn warn(&mut self, id: PredId, message: &str) {
        if self.report {
            let location = Location::pred(self.grammar, &self.rule.name, id);
            self.sink.report(Severity::Warning, &location, message);
        }
    }

    fn visit(&mut self, id: PredId) -> Result<Vec<Stmt>> {
        let grammar = self.grammar;
        let pred = grammar.pred(id);
        let mut out = Vec::new();
        if !self.recognizer_mode {
            if let Some(ref pre) = pred.pre_action {
                out.push(Stmt::Code(pre.clone()));
            }
        }
        match pred.kind {
            PredKind::Seq(ref items) => {
                for &item in items {
                    out.extend(self.visit(item)?);
                }
            }
            PredKind::Alts(ref alts) => out.extend(self.visit_alts(id, alts)?),
            PredKind::Gate(gate) => out.extend(self.visit(gate.matches)?),
            PredKind::And(ref and) => {
                if and.prematched != Some(true) {
                    let code = self.and_pred_code(id, and, 0)?;
                    out.push(Stmt::Code(self.helper.generate_and_pred_check(and, code, false)));
                }
            }
            PredKind::RuleRef(ref rref) => {
                out.push(Stmt::Code(self.rule_call(&rref.rule, pred.result_saver.as_ref())?))
            }
            PredKind::Terminal(ref term) => {
                out.push(Stmt::Code(self.terminal(term, pred.result_saver.as_ref())))
            }
        }
        if !self.recognizer_mode {
            if let Some(ref post) = pred.post_action {
                out.push(Stmt::Code(post.clone()));
            }
        }
        Ok(out)
    }

    fn rule_call(&mut self, name: &str, saver: Option<&ResultSaver>) -> Result<TokenStream> {
        let callee = self.grammar.rule(name).ok_or_else(|| GenError::UnknownRule {
            rule: self.rule.name.clone(),
            referenced: name.to_owned(),
        })?;
        if self.recognizer_mode {
            let scan = callee
                .recognizer_name
                .as_ref()
                .ok_or_else(|| GenError::MissingRecognizer(name.to_owned()))?;
            let call = self.helper.recognizer_call(scan);
            return Ok(quote! {
                if !#call {
                    return false;
                }
            });
        }
        let expr = self.helper.call_rule(callee);
        Ok(match saver {
            Some(saver) => saver.apply(expr),
            None => quote! { #expr; },
        })
    }

    fn terminal(&mut self, term: &TerminalPred<S>, saver: Option<&ResultSaver>) -> TokenStream {
        if self.recognizer_mode {
            return self.helper.generate_match(&term.set, false, true);
        }
        let save = saver.is_some();
        let expr = if term.set.contains_everything() || term.prematched == Some(true) {
            self.helper.generate_skip(save)
        } else {
            self.helper.generate_match(&term.set, save, false)
        };
        match saver {
            Some(saver) => saver.apply(expr),
            None => quote! { #expr; },
        }
    }

    /// The boolean expression of an and-predicate evaluated `offset` terminals
    /// ahead.
    fn and_pred_code(&mut self, id: PredId, and: &AndPred, offset: usize) -> Result<TokenStream> {
        match and.kind {
            AndKind::Code(ref code) => {
                let helper = &*self.helper;
                Ok(subst::replace(code, &mut |s: &Subst| match s.ident() {
                    Some(i) if i == LOOKAHEAD_VALUE => Some(helper.current_lookahead(offset)),
                    Some(i) if i == LOOKAHEAD_INDEX => {
                        let li = Literal::usize_unsuffixed(offset);
                        Some(quote! { #li })
                    }
                    _ => None,
                }))
            }
            AndKind::Syntactic {
                rule: Some(ref rule),
                ..
            } => {
                let scan = self
                    .grammar
                    .rule(rule)
                    .and_then(|r| r.recognizer_name.clone())
                    .ok_or_else(|| GenError::MissingRecognizer(rule.clone()))?;
                Ok(self.helper.syntactic_check(&scan))
            }
            AndKind::Syntactic { rule: None, .. } => Err(GenError::MissingRecognizer(format!(
                "{}{}",
                self.rule.name, id
            ))),
        }
    }

    fn report_unreachable(&mut self, id: PredId, alts: &Alts<S>, times: &BTreeMap<Alt, usize>) {
        let unreachable: Vec<String> = (0..alts.arms.len())
            .filter(|&i| !times.contains_key(&Alt::Arm(i)))
            .map(|i| (i + 1).to_string())
            .collect();
        match unreachable.len() {
            0 => {}
            1 => self.warn(id, &format!("Branch {} is unreachable.", unreachable[0])),
            _ => self.warn(
                id,
                &format!("Branches {} are unreachable.", unreachable.join(", ")),
            ),
        }
        if alts.mode != LoopMode::None && !times.contains_key(&Alt::Exit) {
            self.warn(id, "Infinite loop. The exit branch is unreachable.");
        }
    }

    fn visit_alts(&mut self, id: PredId, alts: &Alts<S>) -> Result<Vec<Stmt>> {
        let tree = alts.prediction.as_ref().ok_or_else(|| GenError::MissingPrediction {
            rule: self.rule.name.clone(),
            pred: id,
        })?;
        if let Some(alt) = tree.find_invalid_alt(alts.arms.len(), alts.mode != LoopMode::None) {
            return Err(GenError::ArmOutOfRange {
                rule: self.rule.name.clone(),
                pred: id,
                alt,
            });
        }
        let times = tree.times_used();
        self.report_unreachable(id, alts, &times);

        // Unreachable arms emit nothing, so they must not declare lookahead
        // variables or set tables either.
        let mut arm_code = Vec::with_capacity(alts.arms.len());
        for (i, &arm) in alts.arms.iter().enumerate() {
            if times.contains_key(&Alt::Arm(i)) {
                arm_code.push(self.visit(arm)?);
            } else {
                arm_code.push(Vec::new());
            }
        }
        let separated: Vec<bool> = arm_code
            .iter()
            .enumerate()
            .map(|(i, code)| {
                times.get(&Alt::Arm(i)).cloned().unwrap_or(0) > 1
                    && !stmt::simple_enough_to_repeat(code)
            })
            .collect();
        let separate_count = separated.iter().filter(|&&s| s).count();

        let mut lp = LoopCtx {
            loop_type: match alts.mode {
                LoopMode::Star => LoopType::Star,
                LoopMode::Opt if alts.default_arm.is_some() => LoopType::Do,
                _ => LoopType::None,
            },
            label: None,
        };
        if lp.loop_type == LoopType::Star && separate_count > 0 {
            lp.label = Some(self.labels.next_stop());
        }
        let suffix = if separate_count > 0 {
            self.labels.next_goto_suffix()
        } else {
            String::new()
        };
        let match_label = |i: usize| format!("match{}{}", i + 1, suffix);

        let leaves: Vec<Vec<Stmt>> = arm_code
            .iter()
            .enumerate()
            .map(|(i, code)| {
                if separated[i] {
                    vec![Stmt::Break(Some(match_label(i)))]
                } else {
                    code.clone()
                }
            })
            .collect();
        let mut code = self.gen_tree(tree, &mut lp, &leaves)?;

        // Prediction code that cannot fall through needs no jump over the
        // first shared block.
        let fallthrough_exit = times.contains_key(&Alt::Exit) && lp.loop_type != LoopType::Star;
        let drop_first = separate_count == alts.arms.len() && !fallthrough_exit;
        let skips = if drop_first {
            separate_count.saturating_sub(1)
        } else {
            separate_count
        };
        if lp.loop_type == LoopType::None && skips > 0 {
            lp.loop_type = LoopType::Do;
        }
        let stop = if lp.loop_type == LoopType::Do {
            Some(self.labels.next_stop())
        } else {
            None
        };
        let skip = match lp.loop_type {
            LoopType::Star => Stmt::Continue(lp.label.clone()),
            _ => Stmt::Break(stop.clone()),
        };
        trace!(
            "{}{}: {} shared arms, {} skips, loop {:?} {:?}",
            self.rule.name,
            id,
            separate_count,
            skips,
            lp.loop_type,
            lp.label.as_ref().or_else(|| stop.as_ref())
        );

        let mut first = true;
        for (i, arm) in arm_code.into_iter().enumerate() {
            if !separated[i] {
                continue;
            }
            let mut body = code;
            if !(first && drop_first) {
                body.push(skip.clone());
            }
            first = false;
            code = vec![Stmt::Labeled {
                label: match_label(i),
                body,
            }];
            code.extend(arm);
        }

        Ok(match (lp.loop_type, stop) {
            (LoopType::Star, _) => vec![Stmt::Loop {
                label: lp.label,
                body: code,
            }],
            (LoopType::Do, Some(stop)) => vec![Stmt::Labeled {
                label: stop,
                body: code,
            }],
            _ => code,
        })
    }

    fn gen_branch(
        &mut self,
        target: &BranchTarget<S>,
        tree: &PredictionTree<S>,
        la: &TokenStream,
        lp: &mut LoopCtx,
        leaves: &[Vec<Stmt>],
    ) -> Result<Vec<Stmt>> {
        Ok(match *target {
            BranchTarget::Tree(ref sub) => self.gen_tree(sub, lp, leaves)?,
            BranchTarget::Alt(Alt::Arm(i)) => leaves[i].clone(),
            BranchTarget::Alt(Alt::Exit) => match lp.loop_type {
                LoopType::Star => vec![Stmt::Break(lp.label.clone())],
                _ => Vec::new(),
            },
            BranchTarget::Alt(Alt::Error) => {
                vec![Stmt::Code(self.helper.error_branch(&tree.total_coverage, la))]
            }
        })
    }

    fn gen_tree(
        &mut self,
        tree: &PredictionTree<S>,
        lp: &mut LoopCtx,
        leaves: &[Vec<Stmt>],
    ) -> Result<Vec<Stmt>> {
        let offset = tree.lookahead;
        let current = self.helper.current_lookahead(offset);
        let n = tree.children.len();
        match tree.children.as_slice() {
            [] => return Ok(Vec::new()),
            [only] => return self.gen_branch(&only.sub, tree, &current, lp, leaves),
            _ => {}
        }

        let la = la_var(offset);
        let mut cases = BTreeSet::new();
        let mut branch_sets = Vec::with_capacity(n);
        let mut use_switch = false;
        let mut read_la = false;
        if tree.uses_la() {
            let mut covered = S::empty();
            for branch in &tree.children {
                branch_sets.push(branch.set.subtract(&covered));
                covered = covered.union(&branch.set);
            }
            let has_error_branch = tree.children.iter().any(|b| b.is_error_branch());
            use_switch = self
                .helper
                .should_generate_switch(&branch_sets, &mut cases, has_error_branch);
            if !use_switch {
                cases.clear();
            }
            if use_switch && lp.loop_type == LoopType::Star && lp.label.is_none() {
                lp.label = Some(self.labels.next_stop());
            }
            let used_test = (0..n - 1).any(|i| !cases.contains(&i));
            read_la = used_test || has_error_branch;
        }
        let la_expr = if read_la { la.clone() } else { current.clone() };

        let mut codes = Vec::with_capacity(n);
        for branch in &tree.children {
            codes.push(self.gen_branch(&branch.sub, tree, &la_expr, lp, leaves)?);
        }

        let mut chain = codes[n - 1].clone();
        for i in (0..n - 1).rev() {
            if cases.contains(&i) {
                continue;
            }
            let branch = &tree.children[i];
            let test = if tree.is_assertion_level {
                self.assertion_test(&branch.and_preds)?
            } else {
                branch.set.optimize(&branch.covered).generate_test(&la)
            };
            chain = vec![Stmt::If {
                test,
                then: codes[i].clone(),
                otherwise: chain,
            }];
        }

        let mut out = Vec::new();
        if read_la {
            out.push(Stmt::Code(quote! { #la = #current; }));
            self.la_vars_needed.insert(offset);
        }
        if use_switch {
            let branch_code: Vec<TokenStream> = codes.iter().map(|c| stmt::render(c)).collect();
            let fallback = stmt::render(&chain);
            out.push(Stmt::Code(self.helper.generate_switch(
                &branch_sets,
                &cases,
                &branch_code,
                fallback,
                &la_expr,
            )));
        } else {
            out.extend(chain);
        }
        Ok(out)
    }

    /// Any of the sets holds when all of its predicates do.
    fn assertion_test(&mut self, and_preds: &[AndPredSet]) -> Result<TokenStream> {
        let grammar = self.grammar;
        let mut alternatives = Vec::with_capacity(and_preds.len());
        for set in and_preds {
            let mut checks = Vec::with_capacity(set.len());
            for and_ref in set {
                let and = match grammar.pred(and_ref.pred).kind {
                    PredKind::And(ref and) => and,
                    _ => continue,
                };
                let code = self.and_pred_code(and_ref.pred, and, and_ref.offset)?;
                checks.push(self.helper.generate_and_pred_check(and, code, true));
            }
            alternatives.push(if checks.is_empty() {
                quote! { true }
            } else {
                quote! { #( #checks )&&* }
            });
        }
        Ok(match alternatives.len() {
            0 => quote! { true },
            1 => alternatives.remove(0),
            _ => quote! { #( (#alternatives) )||* },
        })
    }
}
