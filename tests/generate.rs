use grammar::{CharSet, Grammar, Rule, TerminalSet};
use llkgen::{Diagnostics, Generator, Options};
use pretty_assertions::assert_eq;
use proc_macro2::TokenStream;
use quote::quote;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn generate(g: &mut Grammar<CharSet>, options: Options) -> (Vec<TokenStream>, Diagnostics) {
    init();
    let mut diags = Diagnostics::new();
    let items = Generator::with_options(options).generate(g, &mut diags).unwrap();
    (items, diags)
}

fn k1() -> Options {
    Options {
        k: 1,
        ..Options::default()
    }
}

/// `Foo = (('a'|'A') 'A')* 'a'..'z' 'a'..'z'`
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
fn loop_with_two_tokens_of_lookahead() {
    let mut g = foo();
    let (items, diags) = generate(&mut g, Options::default());
    assert!(diags.messages().is_empty(), "{:?}", diags.messages());
    assert_eq!(items.len(), 1);

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
        pub fn Foo(&mut self) -> parsegen::Result<()> {
            let mut la0: i32;
            let mut la1: i32;
            'stop: loop {
                'match1: {
                    la0 = self.la(0);
                    if la0 == 'a' as i32 {
                        la1 = self.la(1);
                        if la1 == 'A' as i32 {
                            break 'match1;
                        } else {
                            break 'stop;
                        }
                    } else if la0 == 'A' as i32 {
                        break 'match1;
                    } else {
                        break 'stop;
                    }
                }
                la0 = self.la(0);
                if la0 == 'a' as i32 {
                    self.skip();
                } else {
                    self.match_set(&[('A' as i32, 'A' as i32)])?;
                }
                self.match_set(&[('A' as i32, 'A' as i32)])?;
            }
            self.match_set(&[('a' as i32, 'z' as i32)])?;
            self.match_set(&[('a' as i32, 'z' as i32)])?;
            Ok(())
        }
    };
    assert_eq!(items[0].to_string(), expected.to_string());
}

#[test]
fn disjoint_choice_reads_one_token() {
    let mut g = Grammar::new();
    let arms: Vec<_> = "xyz".chars().map(|c| g.terminal(CharSet::of(c))).collect();
    let alts = g.alts(arms);
    g.add_rule(Rule::new("Xyz", alts)).unwrap();

    let (items, diags) = generate(&mut g, Options::default());
    assert!(diags.messages().is_empty());
    let code = items[0].to_string();
    assert!(code.contains("la0 = self . la (0)"));
    assert!(!code.contains("la1"));
}

#[test]
fn shared_arm_is_emitted_once() {
    let mut g = Grammar::new();
    let a = g.terminal(CharSet::of('a'));
    let upper_a = g.terminal(CharSet::of('A'));
    let inner = g.alts(vec![a, upper_a]);
    let second = g.terminal(CharSet::of('A'));
    let x = g.terminal(CharSet::of('x'));
    let first_arm = g.seq(vec![inner, second, x]);
    let a2 = g.terminal(CharSet::of('a'));
    let b = g.terminal(CharSet::of('b'));
    let second_arm = g.seq(vec![a2, b]);
    let alts = g.alts(vec![first_arm, second_arm]);
    g.add_rule(Rule::new("Shared", alts)).unwrap();

    let (items, diags) = generate(&mut g, Options::default());
    assert!(diags.messages().is_empty());
    let code = items[0].to_string();
    assert_eq!(code.matches("match_set (& [('x'").count(), 1);
    assert_eq!(code.matches("break 'match1").count(), 2);
}

#[test]
fn loop_without_exit_is_reported() {
    let mut g = Grammar::new();
    let any = g.terminal(CharSet::everything());
    let looped = g.star(any);
    g.greedy(looped, true);
    g.add_rule(Rule::new("Forever", looped)).unwrap();

    let (items, diags) = generate(&mut g, k1());
    assert_eq!(items.len(), 1);
    let warnings: Vec<&str> = diags.warnings().map(|m| m.message.as_str()).collect();
    assert!(
        warnings.contains(&"Infinite loop. The exit branch is unreachable."),
        "{:?}",
        warnings
    );
    let code = items[0].to_string();
    assert!(code.contains("loop"));
    assert!(!code.contains("break"), "{}", code);
}

#[test]
fn output_is_deterministic() {
    let mut base = foo();
    let ident = base.terminal(CharSet::range('a', 'z'));
    let digit = base.terminal(CharSet::range('0', '9'));
    let alts = base.alts(vec![ident, digit]);
    let looped = base.star(alts);
    base.add_rule(Rule::new("Mixed", looped)).unwrap();

    let render = |mut g: Grammar<CharSet>| {
        let (items, _) = generate(&mut g, Options::default());
        items.iter().map(|i| i.to_string()).collect::<Vec<_>>()
    };
    let first = render(base.clone());
    assert_eq!(first.len(), 2);
    assert_eq!(first, render(base));
}

#[test]
fn generator_can_be_reused() {
    let mut base = Grammar::new();
    let odd = base.terminal(CharSet::chars("acegik"));
    base.add_rule(Rule::new("Odd", odd)).unwrap();

    init();
    let mut generator = Generator::with_options(Options::default());
    for _ in 0..2 {
        let mut g = base.clone();
        let mut diags = Diagnostics::new();
        let items = generator.generate(&mut g, &mut diags).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].to_string().contains("Self :: SET0"));
        assert!(items[1].to_string().contains("const SET0"));
    }
}

#[test]
fn unreachable_arm_leaves_no_trace() {
    let mut g = Grammar::new();
    let a1 = g.terminal(CharSet::of('a'));
    let b = g.terminal(CharSet::of('b'));
    let first = g.seq(vec![a1, b]);
    let a2 = g.terminal(CharSet::of('a'));
    let odd = g.terminal(CharSet::chars("acegik"));
    let second = g.seq(vec![a2, odd]);
    let alts = g.alts(vec![first, second]);
    g.greedy(alts, true);
    g.error_branch(alts);
    g.add_rule(Rule::new("First", alts)).unwrap();

    let (items, diags) = generate(&mut g, k1());
    let warnings: Vec<&str> = diags.warnings().map(|m| m.message.as_str()).collect();
    assert_eq!(warnings, vec!["Branch 2 is unreachable."]);
    assert_eq!(items.len(), 1);
    assert!(!items[0].to_string().contains("SET0"));
}

#[test]
fn labeled_terminal_is_saved() {
    let mut g = Grammar::new();
    let a = g.terminal(CharSet::of('A'));
    g.label(a, "x");
    let body = g.seq(vec![a]);
    g.post_action(body, quote! { self.last = $x; });
    g.add_rule(Rule::new("Start", body)).unwrap();

    let (items, diags) = generate(&mut g, k1());
    assert!(diags.messages().is_empty());
    let code = items[0].to_string();
    assert_eq!(code.matches("let mut x : i32 = 0 ;").count(), 1);
    assert!(code.contains("x = self . match_set"));
    assert!(code.contains("self . last = x ;"));
}

#[test]
fn rule_reference_is_saved_with_its_return_type() {
    let mut g = Grammar::new();
    let call = g.call("Number");
    let body = g.seq(vec![call]);
    g.post_action(body, quote! { self.total += $Number; });
    g.add_rule(Rule::new("Sum", body)).unwrap();
    let digit = g.terminal(CharSet::range('0', '9'));
    g.add_rule(
        Rule::new("Number", digit)
            .returns(syn::parse_quote!(u64))
            .private(),
    )
    .unwrap();

    let (items, diags) = generate(&mut g, k1());
    assert!(diags.messages().is_empty());
    let sum = items[0].to_string();
    let decl = "let mut got_Number : u64 = :: std :: default :: Default :: default () ;";
    assert!(sum.contains(decl));
    assert!(sum.contains("got_Number = self . Number () ? ;"));
    assert!(sum.contains("self . total += got_Number ;"));
}

#[test]
fn conflicting_types_are_one_error() {
    let mut g = Grammar::new();
    let a = g.terminal(CharSet::of('a'));
    g.label(a, "x");
    let call = g.call("Name");
    g.label(call, "x");
    let body = g.seq(vec![a, call]);
    g.add_rule(Rule::new("Mixed", body)).unwrap();
    let letter = g.terminal(CharSet::range('a', 'z'));
    g.add_rule(Rule::new("Name", letter).returns(syn::parse_quote!(String)))
        .unwrap();

    let (_, diags) = generate(&mut g, k1());
    assert_eq!(diags.errors().count(), 1);
}

#[test]
fn syntactic_predicate_gets_a_recognizer() {
    let mut g = Grammar::new();
    let x = g.terminal(CharSet::of('x'));
    let y = g.terminal(CharSet::of('y'));
    let ahead = g.seq(vec![x, y]);
    let check = g.and_pred(ahead);
    let x2 = g.terminal(CharSet::of('x'));
    let body = g.seq(vec![check, x2]);
    g.add_rule(Rule::new("Start", body)).unwrap();

    let (items, diags) = generate(&mut g, k1());
    assert!(diags.messages().is_empty(), "{:?}", diags.messages());
    let code: Vec<String> = items.iter().map(|i| i.to_string()).collect();
    assert_eq!(code.len(), 2);
    assert!(code[0].contains("pub fn Start"));
    assert!(code[0].contains("self . try_recognize (| p | p . scan_Start_test1 ())"));
    assert!(code[1].contains("fn scan_Start_test1 (& mut self) -> bool"));
    assert!(!code[1].contains("pub fn"));
}
