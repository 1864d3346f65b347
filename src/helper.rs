//! Target-specific snippets.
//!
//! The code generation visitor decides the control flow; everything that
//! depends on how the generated parser reads input goes through a
//! `CodeGenHelper`.

use std::collections::BTreeSet;

use grammar::{char_literal, AndPred, CharSet, Rule, TerminalSet};
use proc_macro2::{Ident, Literal, Span, TokenStream};
use quote::quote;

use crate::options::Options;

pub trait CodeGenHelper<S> {
    /// Called before each method is generated.
    fn begin_rule(&mut self, rule: &Rule, recognizer_mode: bool);

    /// Wraps a finished body into a method.
    fn create_rule_method(
        &mut self,
        rule: &Rule,
        body: TokenStream,
        recognizer_mode: bool,
    ) -> TokenStream;

    /// Matches one terminal of `set`. Returns an expression producing the
    /// terminal in normal mode, and a statement in recognizer mode.
    fn generate_match(&mut self, set: &S, save_result: bool, recognizer_mode: bool) -> TokenStream;

    /// Expression consuming one terminal without checking it.
    fn generate_skip(&mut self, save_result: bool) -> TokenStream;

    /// A statement failing unless `code` holds, or with `predict` set, just
    /// the boolean test.
    fn generate_and_pred_check(
        &mut self,
        and: &AndPred,
        code: TokenStream,
        predict: bool,
    ) -> TokenStream;

    /// Chooses the branches a `match` should handle. The branch sets are
    /// disjoint; the last one is the fallback.
    fn should_generate_switch(
        &mut self,
        sets: &[S],
        cases: &mut BTreeSet<usize>,
        has_error_branch: bool,
    ) -> bool;

    fn generate_switch(
        &mut self,
        sets: &[S],
        cases: &BTreeSet<usize>,
        branch_code: &[TokenStream],
        fallback: TokenStream,
        la: &TokenStream,
    ) -> TokenStream;

    /// Statement run when no branch accepts the input.
    fn error_branch(&mut self, covered: &S, la: &TokenStream) -> TokenStream;

    fn current_lookahead(&self, offset: usize) -> TokenStream;

    fn lookahead_variable_type(&self) -> TokenStream;

    /// Expression calling a rule's parse method.
    fn call_rule(&mut self, rule: &Rule) -> TokenStream;

    /// Boolean expression calling a recognizer method.
    fn recognizer_call(&mut self, recognizer: &str) -> TokenStream;

    /// Boolean expression running a recognizer without consuming input.
    fn syntactic_check(&mut self, recognizer: &str) -> TokenStream;

    /// Items the helper needs next to the rule methods, such as set tables.
    fn take_class_members(&mut self) -> Vec<TokenStream>;
}

/// Above this many ranges a set is stored in an associated constant.
const INLINE_RANGES: usize = 4;

/// Generates code against `parsegen::LLParser` for `CharSet` grammars.
#[derive(Debug)]
pub struct RustHelper {
    recognizer_mode: bool,
    switch_threshold: usize,
    set_tables: Vec<(CharSet, Ident)>,
    members: Vec<TokenStream>,
}

fn ident(name: &str) -> Ident {
    Ident::new(name, Span::call_site())
}

fn pattern_literal(c: i32) -> TokenStream {
    if c < 0 {
        let lit = Literal::i32_unsuffixed(-c);
        quote! { -#lit }
    } else {
        let lit = Literal::i32_unsuffixed(c);
        quote! { #lit }
    }
}

/// `match` pattern for a set of code points.
fn set_pattern(set: &CharSet) -> TokenStream {
    let pats = set.ranges().iter().map(|&(lo, hi)| {
        let lo_lit = pattern_literal(lo);
        if lo == hi {
            lo_lit
        } else {
            let hi_lit = pattern_literal(hi);
            quote! { #lo_lit..=#hi_lit }
        }
    });
    quote! { #( #pats )|* }
}

impl RustHelper {
    pub fn new(options: &Options) -> Self {
        RustHelper {
            recognizer_mode: false,
            switch_threshold: options.switch_threshold,
            set_tables: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Expression of type `&[(i32, i32)]` holding `set`.
    fn set_expr(&mut self, set: &CharSet) -> TokenStream {
        if set.ranges().len() <= INLINE_RANGES {
            return range_list(set);
        }
        if let Some((_, name)) = self.set_tables.iter().find(|(s, _)| s == set) {
            return quote! { Self::#name };
        }
        let name = ident(&format!("SET{}", self.set_tables.len()));
        let ranges = range_list(set);
        self.members.push(quote! {
            const #name: &'static [(i32, i32)] = #ranges;
        });
        self.set_tables.push((set.clone(), name.clone()));
        quote! { Self::#name }
    }
}

fn range_list(set: &CharSet) -> TokenStream {
    let ranges = set.ranges().iter().map(|&(lo, hi)| {
        let lo = char_literal(lo);
        let hi = char_literal(hi);
        quote! { (#lo, #hi) }
    });
    quote! { &[ #( #ranges ),* ] }
}

impl CodeGenHelper<CharSet> for RustHelper {
    fn begin_rule(&mut self, _rule: &Rule, recognizer_mode: bool) {
        self.recognizer_mode = recognizer_mode;
    }

    fn create_rule_method(
        &mut self,
        rule: &Rule,
        body: TokenStream,
        recognizer_mode: bool,
    ) -> TokenStream {
        let vis = if rule.is_private {
            quote! {}
        } else {
            quote! { pub }
        };
        let allow = quote! {
            #[allow(
                non_snake_case,
                unused_mut,
                unused_parens,
                unused_assignments,
                unused_labels,
                unused_variables,
                unreachable_code
            )]
        };
        if recognizer_mode {
            let name = ident(rule.recognizer_name.as_ref().unwrap_or(&rule.name));
            return quote! {
                #allow
                #vis fn #name(&mut self) -> bool {
                    #body
                    true
                }
            };
        }
        let name = ident(&rule.name);
        let ret = match rule.return_type {
            Some(ref ty) => quote! { #ty },
            None => quote! { () },
        };
        let result = match (&rule.result, &rule.return_type) {
            (Some(result), _) => result.clone(),
            (None, Some(_)) => quote! { ::std::default::Default::default() },
            (None, None) => quote! { () },
        };
        quote! {
            #allow
            #vis fn #name(&mut self) -> parsegen::Result<#ret> {
                #body
                Ok(#result)
            }
        }
    }

    fn generate_match(
        &mut self,
        set: &CharSet,
        _save_result: bool,
        recognizer_mode: bool,
    ) -> TokenStream {
        let set = self.set_expr(set);
        if recognizer_mode {
            quote! {
                if !self.try_match_set(#set) {
                    return false;
                }
            }
        } else {
            quote! { self.match_set(#set)? }
        }
    }

    fn generate_skip(&mut self, _save_result: bool) -> TokenStream {
        quote! { self.skip() }
    }

    fn generate_and_pred_check(
        &mut self,
        and: &AndPred,
        code: TokenStream,
        predict: bool,
    ) -> TokenStream {
        let test = if and.negate {
            quote! { !(#code) }
        } else {
            quote! { (#code) }
        };
        if predict {
            return test;
        }
        if self.recognizer_mode {
            quote! {
                if !#test {
                    return false;
                }
            }
        } else {
            let expectation = Literal::string(&test.to_string());
            quote! {
                if !#test {
                    return Err(self.check_failed(#expectation));
                }
            }
        }
    }

    fn should_generate_switch(
        &mut self,
        sets: &[CharSet],
        cases: &mut BTreeSet<usize>,
        _has_error_branch: bool,
    ) -> bool {
        // The last branch stays in the `_` arm.
        for (i, set) in sets.iter().enumerate().take(sets.len().saturating_sub(1)) {
            if !set.is_empty() && set.ranges().len() <= INLINE_RANGES {
                cases.insert(i);
            }
        }
        cases.len() >= self.switch_threshold
    }

    fn generate_switch(
        &mut self,
        sets: &[CharSet],
        cases: &BTreeSet<usize>,
        branch_code: &[TokenStream],
        fallback: TokenStream,
        la: &TokenStream,
    ) -> TokenStream {
        let arms = cases.iter().map(|&i| {
            let pat = set_pattern(&sets[i]);
            let code = &branch_code[i];
            quote! { #pat => { #code } }
        });
        quote! {
            match #la {
                #( #arms )*
                _ => { #fallback }
            }
        }
    }

    fn error_branch(&mut self, covered: &CharSet, _la: &TokenStream) -> TokenStream {
        if self.recognizer_mode {
            return quote! { return false; };
        }
        let expected = self.set_expr(covered);
        quote! { return Err(self.error_unexpected(#expected)); }
    }

    fn current_lookahead(&self, offset: usize) -> TokenStream {
        let offset = Literal::usize_unsuffixed(offset);
        quote! { self.la(#offset) }
    }

    fn lookahead_variable_type(&self) -> TokenStream {
        quote! { i32 }
    }

    fn call_rule(&mut self, rule: &Rule) -> TokenStream {
        let name = ident(&rule.name);
        quote! { self.#name()? }
    }

    fn recognizer_call(&mut self, recognizer: &str) -> TokenStream {
        let name = ident(recognizer);
        quote! { self.#name() }
    }

    fn syntactic_check(&mut self, recognizer: &str) -> TokenStream {
        let name = ident(recognizer);
        quote! { self.try_recognize(|p| p.#name()) }
    }

    fn take_class_members(&mut self) -> Vec<TokenStream> {
        // Tables are numbered per batch of members.
        self.set_tables.clear();
        self.members.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammar::{AndKind, PredId};
    use pretty_assertions::assert_eq;

    fn helper() -> RustHelper {
        RustHelper::new(&Options::default())
    }

    #[test]
    fn match_inline_set() {
        let mut h = helper();
        let got = h.generate_match(&CharSet::range('a', 'z'), false, false);
        let expected = quote! { self.match_set(&[('a' as i32, 'z' as i32)])? };
        assert_eq!(got.to_string(), expected.to_string());

        let got = h.generate_match(&CharSet::of('x'), false, true);
        let expected = quote! {
            if !self.try_match_set(&[('x' as i32, 'x' as i32)]) {
                return false;
            }
        };
        assert_eq!(got.to_string(), expected.to_string());
    }

    #[test]
    fn large_sets_become_constants() {
        let mut h = helper();
        let set = CharSet::chars("acegik");
        let first = h.generate_match(&set, false, false);
        let second = h.generate_match(&set, false, false);
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(
            first.to_string(),
            quote! { self.match_set(Self::SET0)? }.to_string()
        );
        let members = h.take_class_members();
        assert_eq!(members.len(), 1);
        assert!(h.take_class_members().is_empty());
    }

    #[test]
    fn set_tables_restart_after_members_are_taken() {
        let mut h = helper();
        let set = CharSet::chars("acegik");
        h.generate_match(&set, false, false);
        assert_eq!(h.take_class_members().len(), 1);

        let again = h.generate_match(&set, false, false);
        assert_eq!(
            again.to_string(),
            quote! { self.match_set(Self::SET0)? }.to_string()
        );
        let members = h.take_class_members();
        assert_eq!(members.len(), 1);
        assert!(members[0].to_string().contains("const SET0"));
    }

    #[test]
    fn and_pred_checks() {
        let mut h = helper();
        let and = AndPred {
            negate: true,
            kind: AndKind::Code(quote! { x }),
            prematched: None,
        };
        let got = h.generate_and_pred_check(&and, quote! { x }, true);
        assert_eq!(got.to_string(), quote! { !(x) }.to_string());

        let got = h.generate_and_pred_check(&and, quote! { x }, false);
        assert_eq!(
            got.to_string(),
            quote! { if !!(x) { return Err(self.check_failed("! (x)")); } }.to_string()
        );

        h.begin_rule(&Rule::new("R", PredId(0)), true);
        let got = h.generate_and_pred_check(&and, quote! { x }, false);
        assert_eq!(
            got.to_string(),
            quote! { if !!(x) { return false; } }.to_string()
        );
    }

    #[test]
    fn switch_patterns() {
        let mut h = RustHelper::new(&Options {
            switch_threshold: 2,
            ..Options::default()
        });
        let sets = vec![
            CharSet::range('a', 'c'),
            CharSet::of('x').union(&CharSet::eof()),
            CharSet::of('!'),
        ];
        let mut cases = BTreeSet::new();
        assert!(h.should_generate_switch(&sets, &mut cases, false));
        assert_eq!(cases.iter().cloned().collect::<Vec<_>>(), vec![0, 1]);
        let code = vec![quote! { a(); }, quote! { b(); }, quote! { c(); }];
        let got = h.generate_switch(&sets, &cases, &code, quote! { c(); }, &quote! { la0 });
        let expected = quote! {
            match la0 {
                97..=99 => { a(); }
                -1 | 120 => { b(); }
                _ => { c(); }
            }
        };
        assert_eq!(got.to_string(), expected.to_string());
    }

    #[test]
    fn rule_methods() {
        let mut h = helper();
        let rule = Rule::new("Digits", PredId(0)).returns(syn::parse_quote!(String));
        let got = h.create_rule_method(&rule, quote! { body(); }, false);
        let expected = quote! {
            #[allow(
                non_snake_case,
                unused_mut,
                unused_parens,
                unused_assignments,
                unused_labels,
                unused_variables,
                unreachable_code
            )]
            pub fn Digits(&mut self) -> parsegen::Result<String> {
                body();
                Ok(::std::default::Default::default())
            }
        };
        assert_eq!(got.to_string(), expected.to_string());

        let rule = Rule::new("Digits", PredId(0)).with_recognizer("scan_Digits").private();
        let got = h.create_rule_method(&rule, quote! { body(); }, true);
        let expected = quote! {
            #[allow(
                non_snake_case,
                unused_mut,
                unused_parens,
                unused_assignments,
                unused_labels,
                unused_variables,
                unreachable_code
            )]
            fn scan_Digits(&mut self) -> bool {
                body();
                true
            }
        };
        assert_eq!(got.to_string(), expected.to_string());
    }
}
