//! An LL(k) parser generator.
//!
//! Rules are built with the `grammar` crate. `Generator::generate` then
//! predicts every choice with up to `k` terminals of lookahead, creates the
//! variables that actions refer to, and emits one Rust method per rule for a
//! type implementing `parsegen::LLParser`.
//!
//! ```
//! use grammar::{CharSet, Grammar, Rule};
//! use llkgen::{generate_impl, Diagnostics, Generator, Options};
//!
//! let mut g = Grammar::new();
//! let digit = g.terminal(CharSet::range('0', '9'));
//! let digits = g.plus(digit);
//! g.add_rule(Rule::new("Number", digits)).unwrap();
//!
//! let mut diags = Diagnostics::new();
//! let items = Generator::with_options(Options::default())
//!     .generate(&mut g, &mut diags)
//!     .unwrap();
//! assert!(!diags.has_errors());
//!
//! let ast: syn::DeriveInput = syn::parse_str("struct Parser<'a>(&'a str);").unwrap();
//! let code = generate_impl(&ast.ident, &ast.generics, &items).to_string();
//! assert!(code.contains("pub fn Number"));
//! ```

use std::collections::HashSet;

use grammar::{AndKind, AndPred, Grammar, PredId, PredKind, Rule, TerminalSet};
use log::{debug, error};
use proc_macro2::{Ident, TokenStream};
use quote::quote;
use syn::Generics;

pub mod analysis;
pub mod diag;
pub mod error;
pub mod generate;
pub mod helper;
pub mod options;
pub mod stmt;
pub mod subst;
pub mod value_saver;

pub use diag::{Diagnostics, Location, LogSink, Message, MessageSink, Severity};
pub use error::{GenError, Result};
pub use helper::{CodeGenHelper, RustHelper};
pub use options::Options;

use analysis::FollowSets;

/// Runs every pass over a grammar.
#[derive(Debug)]
pub struct Generator<H> {
    pub options: Options,
    helper: H,
}

impl Generator<RustHelper> {
    pub fn with_options(options: Options) -> Self {
        let helper = RustHelper::new(&options);
        Generator { options, helper }
    }
}

impl<H> Generator<H> {
    pub fn new(options: Options, helper: H) -> Self {
        Generator { options, helper }
    }

    pub fn helper(&self) -> &H {
        &self.helper
    }

    /// Generates the methods of every rule, followed by the items the helper
    /// asked for.
    ///
    /// Problems in one rule are reported to `sink` and the rule is skipped.
    /// Errors that concern the grammar as a whole are returned.
    pub fn generate<S>(
        &mut self,
        grammar: &mut Grammar<S>,
        sink: &mut dyn MessageSink,
    ) -> Result<Vec<TokenStream>>
    where
        S: TerminalSet,
        H: CodeGenHelper<S>,
    {
        self.options.check()?;
        grammar.validate()?;
        synthesize_recognizers(grammar)?;
        assign_recognizer_names(grammar);
        let follow = analysis::follow_sets(grammar, self.options.recursion_limit)?;

        let mut items = Vec::new();
        for name in grammar.rule_names() {
            match self.generate_rule(grammar, &name, &follow, sink) {
                Ok(methods) => items.extend(methods),
                Err(e) => {
                    error!("skipping rule {}: {}", name, e);
                    sink.report(Severity::Error, &Location::rule(&name), &e.to_string());
                }
            }
        }
        items.extend(self.helper.take_class_members());
        Ok(items)
    }

    fn generate_rule<S>(
        &mut self,
        grammar: &mut Grammar<S>,
        name: &str,
        follow: &FollowSets<S>,
        sink: &mut dyn MessageSink,
    ) -> Result<Vec<TokenStream>>
    where
        S: TerminalSet,
        H: CodeGenHelper<S>,
    {
        debug!("generating rule {}", name);
        analysis::analyze_rule(grammar, name, follow, &self.options, sink)?;
        value_saver::value_save(grammar, name, &self.options, sink)?;

        let rule = grammar.rule(name).cloned().ok_or_else(|| GenError::UnknownRule {
            rule: name.to_owned(),
            referenced: name.to_owned(),
        })?;
        let mut methods = Vec::new();
        if rule.generates_parser() {
            methods.push(generate::generate_rule(grammar, &rule, &mut self.helper, sink, false)?);
        }
        if rule.recognizer_name.is_some() {
            methods.push(generate::generate_rule(grammar, &rule, &mut self.helper, sink, true)?);
        }
        Ok(methods)
    }
}

/// Wraps generated items in an `impl` block for `name`.
pub fn generate_impl(name: &Ident, generics: &Generics, items: &[TokenStream]) -> TokenStream {
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            #( #items )*
        }
    }
}

/// Nodes a rule matches or predicts with. Payloads of syntactic predicates
/// belong to the recognizer rules made for them.
fn reachable<S: TerminalSet>(grammar: &Grammar<S>, root: PredId) -> Vec<PredId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        out.push(id);
        if let PredKind::And(_) = grammar.pred(id).kind {
            continue;
        }
        stack.extend(grammar.pred(id).children().into_iter().rev());
    }
    out
}

/// Moves the payload of every syntactic predicate into a recognizer-only
/// rule named `<rule>_test<N>`.
fn synthesize_recognizers<S: TerminalSet>(grammar: &mut Grammar<S>) -> Result<()> {
    loop {
        let mut pending = Vec::new();
        for rule in grammar.rules() {
            for id in reachable(grammar, rule.body) {
                if let PredKind::And(AndPred {
                    kind: AndKind::Syntactic { pred, rule: None },
                    ..
                }) = grammar.pred(id).kind
                {
                    pending.push((rule.name.clone(), id, pred));
                }
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        for (owner, id, payload) in pending {
            let name = (1..)
                .map(|n| format!("{}_test{}", owner, n))
                .find(|candidate| grammar.rule(candidate).is_none())
                .unwrap_or_else(|| format!("{}_test", owner));
            let body = grammar.deep_clone(payload);
            let mut rule = Rule::new(name.clone(), body)
                .with_recognizer(format!("scan_{}", name))
                .token()
                .private();
            rule.recognizer_only = true;
            grammar.add_rule(rule)?;
            debug!("syntactic predicate {}{} checked by {}", owner, id, name);

            if let PredKind::And(ref mut and) = grammar.pred_mut(id).kind {
                if let AndKind::Syntactic { ref mut rule, .. } = and.kind {
                    *rule = Some(name);
                }
            }
        }
    }
}

/// Every rule a recognizer calls needs a recognizer of its own.
fn assign_recognizer_names<S: TerminalSet>(grammar: &mut Grammar<S>) {
    let mut work: Vec<String> = grammar
        .rules()
        .filter(|r| r.recognizer_name.is_some())
        .map(|r| r.name.clone())
        .collect();
    let mut seen: HashSet<String> = work.iter().cloned().collect();
    while let Some(name) = work.pop() {
        let body = match grammar.rule(&name) {
            Some(rule) => rule.body,
            None => continue,
        };
        let callees: Vec<String> = grammar
            .walk_matched(body)
            .into_iter()
            .filter_map(|id| match grammar.pred(id).kind {
                PredKind::RuleRef(ref rref) => Some(rref.rule.clone()),
                _ => None,
            })
            .collect();
        for callee in callees {
            if !seen.insert(callee.clone()) {
                continue;
            }
            if let Some(rule) = grammar.rule_mut(&callee) {
                if rule.recognizer_name.is_none() {
                    rule.recognizer_name = Some(format!("scan_{}", callee));
                }
            }
            work.push(callee);
        }
    }
}
