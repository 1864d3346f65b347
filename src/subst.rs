//! `$name` substitutions inside code blocks.
//!
//! Three forms are recognized: `$ident`, `$literal` and `$( tokens )`. The
//! pseudo-substitutions `$LA` and `$LI` stand for the current lookahead value
//! and offset and are resolved during code generation.

use proc_macro2::{Delimiter, Group, Ident, Literal, Span, TokenStream, TokenTree};

pub const LOOKAHEAD_VALUE: &str = "LA";
pub const LOOKAHEAD_INDEX: &str = "LI";

#[derive(Clone, Debug)]
pub enum Subst {
    Ident(Ident),
    Literal(Literal),
    /// `$( tokens )`
    Expr(TokenStream),
}

impl Subst {
    /// Structural key. Two substitutions with the same key refer to the same
    /// thing, whatever spacing or spans they were written with.
    pub fn key(&self) -> String {
        match *self {
            Subst::Ident(ref ident) => ident.to_string(),
            Subst::Literal(ref lit) => lit.to_string(),
            Subst::Expr(ref tokens) => normalize(tokens),
        }
    }

    pub fn ident(&self) -> Option<&Ident> {
        match *self {
            Subst::Ident(ref ident) => Some(ident),
            _ => None,
        }
    }

    pub fn is_pseudo(&self) -> bool {
        match self.ident() {
            Some(ident) => ident == LOOKAHEAD_VALUE || ident == LOOKAHEAD_INDEX,
            None => false,
        }
    }

    /// Variable name for a reference that is neither a rule nor a label.
    pub fn var_name(&self) -> Option<String> {
        match *self {
            Subst::Ident(_) if self.is_pseudo() => None,
            Subst::Ident(ref ident) => Some(format!("tok_{}", ident)),
            Subst::Literal(ref lit) => Some(literal_var_name(lit)),
            Subst::Expr(ref tokens) => expr_var_name(tokens),
        }
    }
}

/// Canonical text of a token stream, used to compare a `$( ... )` reference
/// with the basis of a node.
pub fn normalize(tokens: &TokenStream) -> String {
    let trees: Vec<TokenTree> = tokens.clone().into_iter().collect();
    match trees.as_slice() {
        [TokenTree::Group(g)] if g.delimiter() == Delimiter::None => normalize(&g.stream()),
        _ => tokens.to_string(),
    }
}

fn literal_var_name(lit: &Literal) -> String {
    let tokens: TokenStream = TokenTree::Literal(lit.clone()).into();
    match syn::parse2::<syn::Lit>(tokens) {
        Ok(syn::Lit::Char(c)) => format!("ch_{}", sanitize(&c.value().to_string())),
        Ok(syn::Lit::Str(s)) => format!("lit_{}", sanitize(&s.value())),
        Ok(syn::Lit::Int(i)) => format!("lit_{}", sanitize(i.base10_digits())),
        _ => format!("lit_{}", sanitize(&lit.to_string())),
    }
}

/// Names `a.b` and `A::B` after their last component.
fn expr_var_name(tokens: &TokenStream) -> Option<String> {
    let trees: Vec<TokenTree> = tokens.clone().into_iter().collect();
    match trees.as_slice() {
        [] => None,
        [TokenTree::Ident(ident)] => Some(format!("tok_{}", ident)),
        [TokenTree::Literal(lit)] => Some(literal_var_name(lit)),
        [TokenTree::Group(g)] if g.delimiter() == Delimiter::None => expr_var_name(&g.stream()),
        [.., TokenTree::Punct(p), TokenTree::Ident(last)]
            if p.as_char() == '.' || p.as_char() == ':' =>
        {
            let path_like = trees.iter().all(|t| match t {
                TokenTree::Ident(_) => true,
                TokenTree::Punct(p) => p.as_char() == '.' || p.as_char() == ':',
                _ => false,
            });
            if path_like {
                Some(format!("tok__{}", last))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Maps characters that cannot appear in an identifier to `x` and their hex
/// code.
pub fn sanitize(s: &str) -> String {
    let mut out = String::new();
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push_str(&format!("x{:x}", c as u32));
        }
    }
    out
}

/// Every substitution in `code`, including ones nested in groups.
pub fn find(code: &TokenStream) -> Vec<Subst> {
    let mut found = Vec::new();
    collect(code, &mut found);
    found
}

fn collect(code: &TokenStream, found: &mut Vec<Subst>) {
    let trees: Vec<TokenTree> = code.clone().into_iter().collect();
    let mut i = 0;
    while i < trees.len() {
        if let Some(subst) = subst_at(&trees, i) {
            found.push(subst);
            i += 2;
            continue;
        }
        if let TokenTree::Group(ref g) = trees[i] {
            collect(&g.stream(), found);
        }
        i += 1;
    }
}

fn subst_at(trees: &[TokenTree], i: usize) -> Option<Subst> {
    match (&trees[i], trees.get(i + 1)) {
        (TokenTree::Punct(p), Some(next)) if p.as_char() == '$' => match next {
            TokenTree::Ident(ident) => Some(Subst::Ident(ident.clone())),
            TokenTree::Literal(lit) => Some(Subst::Literal(lit.clone())),
            TokenTree::Group(g) if g.delimiter() == Delimiter::Parenthesis => {
                Some(Subst::Expr(g.stream()))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Rewrites each substitution for which `f` returns replacement tokens. The
/// others are left as written.
pub fn replace<F>(code: &TokenStream, f: &mut F) -> TokenStream
where
    F: FnMut(&Subst) -> Option<TokenStream>,
{
    let trees: Vec<TokenTree> = code.clone().into_iter().collect();
    let mut out = TokenStream::new();
    let mut i = 0;
    while i < trees.len() {
        if let Some(subst) = subst_at(&trees, i) {
            match f(&subst) {
                Some(replacement) => out.extend(replacement),
                None => {
                    out.extend(Some(trees[i].clone()));
                    out.extend(Some(trees[i + 1].clone()));
                }
            }
            i += 2;
            continue;
        }
        match trees[i] {
            TokenTree::Group(ref g) => {
                let mut group = Group::new(g.delimiter(), replace(&g.stream(), f));
                group.set_span(g.span());
                out.extend(Some(TokenTree::Group(group)));
            }
            ref other => out.extend(Some(other.clone())),
        }
        i += 1;
    }
    out
}

pub fn ident(name: &str) -> Ident {
    Ident::new(name, Span::call_site())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quote::quote;

    #[test]
    fn finds_every_form() {
        let code = quote! { foo($x, $'*', $(Tok::Id)); if $LA > 0 { bar($("s")) } };
        let keys: Vec<String> = find(&code).iter().map(|s| s.key()).collect();
        assert_eq!(keys, vec!["x", "'*'", "Tok :: Id", "LA", "\"s\""]);
    }

    #[test]
    fn var_names() {
        let code = quote! { $x $'*' $(Tok::Id) $(a.b) $"if" $LI $(1 + 2) };
        let names: Vec<Option<String>> = find(&code).iter().map(|s| s.var_name()).collect();
        assert_eq!(
            names,
            vec![
                Some("tok_x".to_owned()),
                Some("ch_x2a".to_owned()),
                Some("tok__Id".to_owned()),
                Some("tok__b".to_owned()),
                Some("lit_if".to_owned()),
                None,
                None,
            ]
        );
    }

    #[test]
    fn replace_keeps_unresolved() {
        let code = quote! { f($x, { $y }, $LA) };
        let got = replace(&code, &mut |s: &Subst| match s.ident() {
            Some(i) if i == "x" => Some(quote! { got_x }),
            Some(i) if i == "y" => Some(quote! { y }),
            _ => None,
        });
        assert_eq!(got.to_string(), quote! { f(got_x, { y }, $LA) }.to_string());
    }

    #[test]
    fn sanitize_keeps_identifier_chars() {
        assert_eq!(sanitize("a_b9"), "a_b9");
        assert_eq!(sanitize("+="), "x2bx3d");
    }
}
