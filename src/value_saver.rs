//! Creates the variables that code blocks refer to with `$name`.
//!
//! A rule's code can name a label (`$x` for `x:'a'`), a rule it calls
//! (`$Expr`) or any terminal it matches (`$'*'`, `$(Tok::Id)`). Each such
//! node gets a result saver storing its value into a variable declared at the
//! start of the rule, and the references are rewritten to the variable.

use std::collections::{BTreeMap, HashMap, HashSet};

use grammar::{merge_actions, AndKind, Grammar, PredId, PredKind, ResultSaver, TerminalSet};
use log::{debug, trace};
use proc_macro2::TokenStream;
use quote::quote;
use syn::Type;

use crate::diag::{Location, MessageSink, Severity};
use crate::error::{GenError, Result};
use crate::options::Options;
use crate::subst::{self, Subst};

/// A reference that is neither a label nor a rule, with the number of
/// nodes it matched.
struct OtherRef {
    var: Option<String>,
    matches: usize,
}

struct Declaration {
    ty: String,
    code: TokenStream,
}

struct ValueSaver<'a, S> {
    grammar: &'a mut Grammar<S>,
    rule: &'a str,
    options: &'a Options,
    sink: &'a mut dyn MessageSink,
    rule_names: HashSet<String>,
    labels: HashSet<String>,
    rules_referenced: HashSet<String>,
    other_refs: HashMap<String, OtherRef>,
    declarations: BTreeMap<String, Declaration>,
}

/// Code blocks of a node that may contain substitutions.
fn code_blocks<S: TerminalSet>(grammar: &Grammar<S>, id: PredId) -> Vec<TokenStream> {
    let pred = grammar.pred(id);
    let mut blocks: Vec<TokenStream> = pred
        .pre_action
        .iter()
        .chain(pred.post_action.iter())
        .cloned()
        .collect();
    if let PredKind::And(ref and) = pred.kind {
        if let AndKind::Code(ref code) = and.kind {
            blocks.push(code.clone());
        }
    }
    blocks
}

impl<'a, S: TerminalSet> ValueSaver<'a, S> {
    fn error(&mut self, id: PredId, message: &str) {
        let location = Location::pred(self.grammar, self.rule, id);
        self.sink.report(Severity::Error, &location, message);
    }

    /// Pushes labels on alternative sets down to their arms, and drops labels
    /// that cannot hold a value.
    fn move_labels(&mut self, body: PredId) {
        for id in self.grammar.walk_matched(body) {
            let label = match self.grammar.pred(id).label {
                Some(ref label) => label.clone(),
                None => continue,
            };
            let pred = self.grammar.pred(id);
            let is_list = pred.is_list;
            let kind = pred.kind_name();
            let holds_value = match pred.kind {
                PredKind::RuleRef(_) | PredKind::Terminal(_) => true,
                _ => false,
            };
            if holds_value {
                continue;
            }
            match pred.as_alts().map(|alts| alts.arms.clone()) {
                Some(arms) => {
                    for arm in arms {
                        let pred = self.grammar.pred_mut(arm);
                        pred.label = Some(label.clone());
                        pred.is_list = is_list;
                    }
                }
                None => self.error(
                    id,
                    &format!("Label '{}' cannot be attached to a {}.", label, kind),
                ),
            }
            self.grammar.pred_mut(id).label = None;
        }
    }

    fn gather(&mut self, matched: &[PredId]) {
        for &id in matched {
            if let Some(ref label) = self.grammar.pred(id).label {
                self.labels.insert(label.to_string());
            }
        }
        for &id in matched {
            for code in code_blocks(self.grammar, id) {
                for subst in subst::find(&code) {
                    if subst.is_pseudo() {
                        continue;
                    }
                    let key = subst.key();
                    if self.labels.contains(&key) {
                        continue;
                    }
                    if subst.ident().is_some() && self.rule_names.contains(&key) {
                        self.rules_referenced.insert(key);
                        continue;
                    }
                    self.other_refs.entry(key).or_insert(OtherRef {
                        var: subst.var_name(),
                        matches: 0,
                    });
                }
            }
        }
        trace!(
            "{}: labels {:?}, rules {:?}, other references {}",
            self.rule,
            self.labels,
            self.rules_referenced,
            self.other_refs.len()
        );
    }

    fn type_of_rule(&self, rule: &str) -> Option<Type> {
        match self.grammar.rule(rule) {
            Some(r) => Some(r.return_type.clone().unwrap_or_else(|| syn::parse_quote!(()))),
            None => None,
        }
    }

    fn synthesize(&mut self, matched: &[PredId]) {
        for &id in matched {
            let pred = self.grammar.pred(id);
            let label = pred.label.as_ref().map(|l| l.to_string());
            let is_list = pred.is_list;
            let (var, ty) = match pred.kind {
                PredKind::RuleRef(ref rref) => {
                    let var = match label {
                        Some(label) => label,
                        None if self.rules_referenced.contains(&rref.rule) => {
                            format!("got_{}", rref.rule)
                        }
                        None => continue,
                    };
                    (var, self.type_of_rule(&rref.rule))
                }
                PredKind::Terminal(_) => {
                    let var = match label {
                        Some(label) => label,
                        None => {
                            let key = match pred.basis {
                                Some(ref basis) => subst::normalize(basis),
                                None => continue,
                            };
                            match self.other_refs.get_mut(&key) {
                                Some(other) => match other.var {
                                    Some(ref var) => {
                                        other.matches += 1;
                                        var.clone()
                                    }
                                    None => continue,
                                },
                                None => continue,
                            }
                        }
                    };
                    (var, self.options.terminal_type.clone())
                }
                _ => continue,
            };
            self.create_variable(id, &var, ty, is_list);
        }
    }

    fn create_variable(&mut self, id: PredId, name: &str, ty: Option<Type>, is_list: bool) {
        if self.grammar.pred(id).result_saver.is_some() {
            return;
        }
        let ty: Type = match ty {
            Some(ty) => ty,
            None => {
                self.error(
                    id,
                    "The type of this expression is unknown (did you set the terminal_type option?)",
                );
                syn::parse_quote!(_)
            }
        };
        let var = subst::ident(name);
        let list = &self.options.list_type;
        let (ty, init) = if is_list {
            (quote! { #list<#ty> }, quote! { #list::new() })
        } else if quote!(#ty).to_string() == "i32" {
            (quote! { #ty }, quote! { 0 })
        } else {
            (quote! { #ty }, quote! { ::std::default::Default::default() })
        };
        let ty_text = ty.to_string();
        match self.declarations.get(name) {
            Some(existing) if existing.ty != ty_text => {
                let message = format!(
                    "Type mismatch: Variable '{}' was generated earlier with type {}, but this predicate expects {}.",
                    name, existing.ty, ty_text
                );
                self.error(id, &message);
            }
            Some(_) => {}
            None => {
                trace!("{}: declaring {}: {}", self.rule, name, ty_text);
                self.declarations.insert(
                    name.to_owned(),
                    Declaration {
                        ty: ty_text,
                        code: quote! { let mut #var: #ty = #init; },
                    },
                );
            }
        }
        self.grammar.pred_mut(id).result_saver = Some(ResultSaver::new(var, is_list));
    }

    fn resolve(&self, subst: &Subst) -> Option<TokenStream> {
        if subst.is_pseudo() {
            return None;
        }
        let key = subst.key();
        if self.labels.contains(&key) {
            let label = subst::ident(&key);
            return Some(quote! { #label });
        }
        if self.rules_referenced.contains(&key) {
            let var = subst::ident(&format!("got_{}", key));
            return Some(quote! { #var });
        }
        match self.other_refs.get(&key) {
            Some(OtherRef {
                var: Some(ref var),
                matches,
            }) if *matches > 0 => {
                let var = subst::ident(var);
                Some(quote! { #var })
            }
            _ => None,
        }
    }

    fn rewrite(&mut self, matched: &[PredId]) {
        let mut unresolved = Vec::new();
        for &id in matched {
            let mut rewrite_code = |code: &TokenStream| {
                subst::replace(code, &mut |s: &Subst| {
                    let resolved = self.resolve(s);
                    if resolved.is_none() && !s.is_pseudo() {
                        unresolved.push((id, s.key()));
                    }
                    resolved
                })
            };
            let pred = self.grammar.pred(id);
            let pre = pred.pre_action.as_ref().map(&mut rewrite_code);
            let post = pred.post_action.as_ref().map(&mut rewrite_code);
            let and = match pred.kind {
                PredKind::And(ref and) => match and.kind {
                    AndKind::Code(ref code) => Some(rewrite_code(code)),
                    _ => None,
                },
                _ => None,
            };

            let pred = self.grammar.pred_mut(id);
            pred.pre_action = pre;
            pred.post_action = post;
            if let (Some(code), PredKind::And(ref mut and)) = (and, &mut pred.kind) {
                and.kind = AndKind::Code(code);
            }
        }
        for (id, key) in unresolved {
            self.error(
                id,
                &format!(
                    "'${}' does not refer to a label, a rule or anything this rule matches.",
                    key
                ),
            );
        }
    }
}

/// Installs result savers and variable declarations for one rule, and
/// rewrites `$name` references in its code blocks.
pub fn value_save<S: TerminalSet>(
    grammar: &mut Grammar<S>,
    rule: &str,
    options: &Options,
    sink: &mut dyn MessageSink,
) -> Result<()> {
    let body = match grammar.rule(rule) {
        Some(r) => r.body,
        None => {
            return Err(GenError::UnknownRule {
                rule: rule.to_owned(),
                referenced: rule.to_owned(),
            })
        }
    };
    let rule_names = grammar.rule_names().into_iter().collect();
    let mut saver = ValueSaver {
        grammar,
        rule,
        options,
        sink,
        rule_names,
        labels: HashSet::new(),
        rules_referenced: HashSet::new(),
        other_refs: HashMap::new(),
        declarations: BTreeMap::new(),
    };
    saver.move_labels(body);
    let matched = saver.grammar.walk_matched(body);
    saver.gather(&matched);
    saver.synthesize(&matched);
    saver.rewrite(&matched);

    if !saver.declarations.is_empty() {
        debug!("{}: {} variables", rule, saver.declarations.len());
        let decls: TokenStream = saver.declarations.values().map(|d| d.code.clone()).collect();
        let pred = saver.grammar.pred_mut(body);
        pred.pre_action = merge_actions(Some(decls), pred.pre_action.take());
    }
    Ok(())
}
