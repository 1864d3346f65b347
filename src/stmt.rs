//! Statement trees for generated code.
//!
//! Control flow produced by the generator stays inspectable until the rule
//! method is finished, then renders to tokens. Rust has no `goto`: a jump to
//! shared code is a `break` out of a labeled block ending right before it.

use proc_macro2::{Span, TokenStream, TokenTree};
use quote::{quote, ToTokens};
use syn::Lifetime;

#[derive(Clone, Debug)]
pub enum Stmt {
    /// One or more complete statements.
    Code(TokenStream),
    If {
        test: TokenStream,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    Loop {
        label: Option<String>,
        body: Vec<Stmt>,
    },
    Labeled {
        label: String,
        body: Vec<Stmt>,
    },
    Break(Option<String>),
    Continue(Option<String>),
}

fn lifetime(label: &str) -> Lifetime {
    Lifetime::new(&format!("'{}", label), Span::call_site())
}

/// Renders a statement list.
pub fn render(stmts: &[Stmt]) -> TokenStream {
    let mut tokens = TokenStream::new();
    for stmt in stmts {
        stmt.to_tokens(&mut tokens);
    }
    tokens
}

/// Code that can be copied to several places instead of being shared.
pub fn simple_enough_to_repeat(stmts: &[Stmt]) -> bool {
    match stmts {
        [] => true,
        [Stmt::Code(code)] => statement_count(code) <= 1 && !is_compound(code),
        [Stmt::Break(_)] | [Stmt::Continue(_)] => true,
        _ => false,
    }
}

/// Statements that carry their own nested blocks.
fn is_compound(code: &TokenStream) -> bool {
    match code.clone().into_iter().next() {
        Some(TokenTree::Ident(ref ident)) => ident == "if" || ident == "match" || ident == "loop",
        Some(TokenTree::Group(_)) => true,
        _ => false,
    }
}

fn statement_count(code: &TokenStream) -> usize {
    let mut count = 0;
    let mut pending = false;
    for tree in code.clone() {
        match tree {
            TokenTree::Punct(ref p) if p.as_char() == ';' => {
                count += 1;
                pending = false;
            }
            _ => pending = true,
        }
    }
    if pending {
        count + 1
    } else {
        count
    }
}

impl ToTokens for Stmt {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        match *self {
            Stmt::Code(ref code) => tokens.extend(code.clone()),
            Stmt::If {
                ref test,
                ref then,
                ref otherwise,
            } => {
                let then = render(then);
                tokens.extend(quote! { if #test { #then } });
                match otherwise.as_slice() {
                    [] => {}
                    [nested @ Stmt::If { .. }] => {
                        tokens.extend(quote! { else });
                        nested.to_tokens(tokens);
                    }
                    _ => {
                        let otherwise = render(otherwise);
                        tokens.extend(quote! { else { #otherwise } });
                    }
                }
            }
            Stmt::Loop {
                ref label,
                ref body,
            } => {
                let body = render(body);
                match *label {
                    Some(ref label) => {
                        let label = lifetime(label);
                        tokens.extend(quote! { #label: loop { #body } });
                    }
                    None => tokens.extend(quote! { loop { #body } }),
                }
            }
            Stmt::Labeled {
                ref label,
                ref body,
            } => {
                let label = lifetime(label);
                let body = render(body);
                tokens.extend(quote! { #label: { #body } });
            }
            Stmt::Break(ref label) => {
                let label = label.as_ref().map(|l| lifetime(l));
                tokens.extend(quote! { break #label; });
            }
            Stmt::Continue(ref label) => {
                let label = label.as_ref().map(|l| lifetime(l));
                tokens.extend(quote! { continue #label; });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn code(ts: TokenStream) -> Stmt {
        Stmt::Code(ts)
    }

    #[test]
    fn else_if_chain() {
        let chain = Stmt::If {
            test: quote! { la0 == 1 },
            then: vec![code(quote! { a(); })],
            otherwise: vec![Stmt::If {
                test: quote! { la0 == 2 },
                then: vec![code(quote! { b(); })],
                otherwise: vec![Stmt::Break(None)],
            }],
        };
        let expected = quote! {
            if la0 == 1 { a(); } else if la0 == 2 { b(); } else { break; }
        };
        assert_eq!(render(&[chain]).to_string(), expected.to_string());
    }

    #[test]
    fn labeled_jumps() {
        let stmts = vec![Stmt::Loop {
            label: Some("stop".to_owned()),
            body: vec![
                Stmt::Labeled {
                    label: "match1".to_owned(),
                    body: vec![
                        Stmt::Break(Some("match1".to_owned())),
                        Stmt::Break(Some("stop".to_owned())),
                    ],
                },
                code(quote! { x(); }),
                Stmt::Continue(Some("stop".to_owned())),
            ],
        }];
        let expected = quote! {
            'stop: loop {
                'match1: { break 'match1; break 'stop; }
                x();
                continue 'stop;
            }
        };
        assert_eq!(render(&stmts).to_string(), expected.to_string());
    }

    #[test]
    fn repeatable_code() {
        assert!(simple_enough_to_repeat(&[code(quote! { self.skip(); })]));
        assert!(simple_enough_to_repeat(&[Stmt::Break(None)]));
        assert!(!simple_enough_to_repeat(&[code(quote! { a(); b(); })]));
        assert!(!simple_enough_to_repeat(&[
            code(quote! { a(); }),
            code(quote! { b(); })
        ]));
        assert!(!simple_enough_to_repeat(&[Stmt::Loop {
            label: None,
            body: vec![],
        }]));
        assert!(!simple_enough_to_repeat(&[Stmt::If {
            test: quote! { la0 == 1 },
            then: vec![code(quote! { a(); })],
            otherwise: vec![],
        }]));
        // Recognizer matches are `if` statements too.
        assert!(!simple_enough_to_repeat(&[code(quote! {
            if !self.try_match_set(&[(1, 1)]) {
                return false;
            }
        })]));
    }
}
