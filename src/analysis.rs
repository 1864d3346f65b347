//! Prediction analysis.
//!
//! For every alternative set a rule matches, work out how to pick an arm by
//! looking at up to `k` terminals ahead, falling back to and-predicates when
//! the terminals alone cannot decide.

use std::collections::{HashMap, HashSet};

use grammar::{
    Alt, AndPredSet, AndRef, Alts, BranchTarget, Grammar, LoopMode, PredId, PredKind,
    PredictionBranch, PredictionTree, TerminalSet,
};
use log::{debug, trace};

use crate::diag::{Location, MessageSink, Severity};
use crate::error::{GenError, Result};
use crate::options::Options;

/// What may follow the end of each rule.
pub type FollowSets<S> = HashMap<String, S>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Frame {
    Pred(PredId),
    /// Return from a called rule.
    RuleEnd,
}

/// One way the input can continue: what is left to match, and the
/// and-predicates passed on the way.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Config {
    stack: Vec<Frame>,
    and_preds: AndPredSet,
    /// The end of the rule was passed once already.
    past_end: bool,
}

impl Config {
    fn new(stack: Vec<Frame>) -> Self {
        Config {
            stack,
            and_preds: AndPredSet::new(),
            past_end: false,
        }
    }
}

/// Walks the nodes a rule matches, passing each one what comes after it.
/// The top of the continuation is its last element.
fn visit_continuations<S, F>(
    grammar: &Grammar<S>,
    id: PredId,
    after: &[Frame],
    f: &mut F,
) -> Result<()>
where
    S: TerminalSet,
    F: FnMut(PredId, &[Frame]) -> Result<()>,
{
    f(id, after)?;
    match grammar.pred(id).kind {
        PredKind::Seq(ref items) => {
            for (i, &item) in items.iter().enumerate() {
                let mut next = after.to_vec();
                next.extend(items[i + 1..].iter().rev().map(|&p| Frame::Pred(p)));
                visit_continuations(grammar, item, &next, f)?;
            }
        }
        PredKind::Alts(ref alts) => {
            for &arm in &alts.arms {
                let mut next = after.to_vec();
                if alts.mode == LoopMode::Star {
                    next.push(Frame::Pred(id));
                }
                visit_continuations(grammar, arm, &next, f)?;
            }
        }
        PredKind::Gate(gate) => visit_continuations(grammar, gate.matches, after, f)?,
        _ => {}
    }
    Ok(())
}

/// Computes the terminals that can come next from a configuration.
struct Lookahead<'a, S> {
    grammar: &'a Grammar<S>,
    rule: &'a str,
    /// Follow set of `rule`.
    follow: &'a S,
    recursion_limit: usize,
}

impl<'a, S: TerminalSet> Lookahead<'a, S> {
    /// Each terminal set that can be matched next at `offset`, with the
    /// configuration left after matching it.
    fn steps(&self, config: &Config, offset: usize) -> Result<Vec<(S, Config)>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut work = vec![config.clone()];
        while let Some(mut c) = work.pop() {
            if !seen.insert(c.clone()) {
                continue;
            }
            let id = match c.stack.pop() {
                None => {
                    if c.past_end {
                        out.push((S::everything(), c));
                    } else {
                        c.past_end = true;
                        out.push((self.follow.clone(), c));
                    }
                    continue;
                }
                Some(Frame::RuleEnd) => {
                    work.push(c);
                    continue;
                }
                Some(Frame::Pred(id)) => id,
            };
            match self.grammar.pred(id).kind {
                PredKind::Seq(ref items) => {
                    c.stack.extend(items.iter().rev().map(|&p| Frame::Pred(p)));
                    work.push(c);
                }
                PredKind::Alts(ref alts) => {
                    for &arm in alts.arms.iter().rev() {
                        let mut next = c.clone();
                        if alts.mode == LoopMode::Star {
                            next.stack.push(Frame::Pred(id));
                        }
                        next.stack.push(Frame::Pred(arm));
                        work.push(next);
                    }
                    if alts.mode != LoopMode::None {
                        work.push(c);
                    }
                }
                PredKind::Gate(gate) => {
                    c.stack.push(Frame::Pred(gate.predict));
                    work.push(c);
                }
                PredKind::And(_) => {
                    c.and_preds.insert(AndRef { pred: id, offset });
                    work.push(c);
                }
                PredKind::RuleRef(ref rref) => {
                    let depth = c.stack.iter().filter(|f| **f == Frame::RuleEnd).count();
                    if depth >= self.recursion_limit {
                        return Err(GenError::RecursionLimit {
                            rule: self.rule.to_owned(),
                            limit: self.recursion_limit,
                        });
                    }
                    let callee = self.grammar.rule(&rref.rule).ok_or_else(|| GenError::UnknownRule {
                        rule: self.rule.to_owned(),
                        referenced: rref.rule.clone(),
                    })?;
                    c.stack.push(Frame::RuleEnd);
                    c.stack.push(Frame::Pred(callee.body));
                    work.push(c);
                }
                PredKind::Terminal(ref term) => out.push((term.set.clone(), c)),
            }
        }
        Ok(out)
    }

    /// Union of everything that can be matched next.
    fn first(&self, config: &Config) -> Result<S> {
        Ok(self
            .steps(config, 0)?
            .into_iter()
            .fold(S::empty(), |acc, (set, _)| acc.union(&set)))
    }
}

/// Computes follow sets by iterating over call sites until nothing changes.
///
/// Token rules can be followed by anything. Public rules and rules nobody
/// calls can be followed by the end of input.
pub fn follow_sets<S: TerminalSet>(
    grammar: &Grammar<S>,
    recursion_limit: usize,
) -> Result<FollowSets<S>> {
    let mut called = HashSet::new();
    for rule in grammar.rules() {
        for id in grammar.walk_matched(rule.body) {
            if let PredKind::RuleRef(ref rref) = grammar.pred(id).kind {
                called.insert(rref.rule.clone());
            }
        }
    }

    let mut follow = FollowSets::new();
    for rule in grammar.rules() {
        let set = if rule.is_token {
            S::everything()
        } else if !rule.is_private || !called.contains(&rule.name) {
            S::eof()
        } else {
            S::empty()
        };
        follow.insert(rule.name.clone(), set);
    }

    let mut rounds = 0;
    loop {
        rounds += 1;
        let mut changed = false;
        for rule in grammar.rules() {
            let own = follow.get(&rule.name).cloned().unwrap_or_else(S::everything);
            let lookahead = Lookahead {
                grammar,
                rule: &rule.name,
                follow: &own,
                recursion_limit,
            };
            let mut additions = Vec::new();
            visit_continuations(grammar, rule.body, &[], &mut |id, after| {
                if let PredKind::RuleRef(ref rref) = grammar.pred(id).kind {
                    let first = lookahead.first(&Config::new(after.to_vec()))?;
                    additions.push((rref.rule.clone(), first));
                }
                Ok(())
            })?;
            for (callee, set) in additions {
                let entry = follow.entry(callee).or_insert_with(S::empty);
                let merged = entry.union(&set);
                if merged != *entry {
                    *entry = merged;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    debug!("follow sets settled after {} rounds", rounds);
    Ok(follow)
}

/// Terminals that lead to the same set of arms, with each arm's
/// configurations after matching them.
struct Region<S> {
    set: S,
    alts: Vec<(Alt, Vec<Config>)>,
}

fn add_config(alts: &mut Vec<(Alt, Vec<Config>)>, alt: Alt, config: &Config) {
    match alts.iter_mut().find(|(a, _)| *a == alt) {
        Some((_, configs)) => {
            if !configs.contains(config) {
                configs.push(config.clone());
            }
        }
        None => alts.push((alt, vec![config.clone()])),
    }
}

/// Splits `regions` so that `set` is a union of whole regions, and records
/// `alt` in each of them.
fn refine<S: TerminalSet>(regions: &mut Vec<Region<S>>, alt: Alt, set: &S, next: &Config) {
    let mut remaining = set.clone();
    let mut refined = Vec::with_capacity(regions.len() + 1);
    for region in regions.drain(..) {
        let inside = region.set.intersection(set);
        if inside.is_empty() {
            refined.push(region);
            continue;
        }
        remaining = remaining.subtract(&inside);
        let outside = region.set.subtract(set);
        let mut alts = region.alts.clone();
        add_config(&mut alts, alt, next);
        refined.push(Region { set: inside, alts });
        if !outside.is_empty() {
            refined.push(Region {
                set: outside,
                alts: region.alts,
            });
        }
    }
    if !remaining.is_empty() {
        refined.push(Region {
            set: remaining,
            alts: vec![(alt, vec![next.clone()])],
        });
    }
    *regions = refined;
}

/// Renders the lookahead sets leading to a decision, as in `la0 'a', la1 'b'`.
fn describe_path<S: TerminalSet>(path: &[S]) -> String {
    let input: Vec<String> = path
        .iter()
        .enumerate()
        .map(|(i, set)| format!("la{} {}", i, set))
        .collect();
    input.join(", ")
}

/// Builds the prediction tree of one alternative set.
struct TreeBuilder<'a, S> {
    lookahead: Lookahead<'a, S>,
    alts: &'a Alts<S>,
    k: usize,
    warnings: Vec<String>,
}

impl<'a, S: TerminalSet> TreeBuilder<'a, S> {
    fn default_target(&self, live: &[(Alt, Vec<Config>)], offset: usize) -> Alt {
        if self.alts.error_branch {
            return Alt::Error;
        }
        let preferred = match self.alts.default_arm {
            Some(arm) => Alt::Arm(arm),
            None if self.alts.mode != LoopMode::None => Alt::Exit,
            None => Alt::Arm(self.alts.arms.len() - 1),
        };
        if offset == 0 || live.iter().any(|(alt, _)| *alt == preferred) {
            preferred
        } else {
            live.last().map(|(alt, _)| *alt).unwrap_or(preferred)
        }
    }

    fn build(
        &mut self,
        live: Vec<(Alt, Vec<Config>)>,
        offset: usize,
        path: &mut Vec<S>,
    ) -> Result<PredictionTree<S>> {
        let mut regions: Vec<Region<S>> = Vec::new();
        for (alt, configs) in &live {
            for config in configs {
                for (set, next) in self.lookahead.steps(config, offset)? {
                    refine(&mut regions, *alt, &set, &next);
                }
            }
        }
        for region in &mut regions {
            region.alts.sort_by_key(|(alt, _)| *alt);
        }
        regions.sort_by_key(|region| region.alts[0].0);

        let mut children = Vec::with_capacity(regions.len() + 1);
        for region in regions {
            path.push(region.set.clone());
            let sub = if region.alts.len() == 1 {
                BranchTarget::Alt(region.alts[0].0)
            } else if offset + 1 < self.k {
                let mut tree = self.build(region.alts, offset + 1, path)?;
                if tree.children.len() == 1 && !tree.is_assertion_level {
                    tree.children.remove(0).sub
                } else {
                    BranchTarget::Tree(Box::new(tree))
                }
            } else {
                self.resolve(region.alts, offset, path)
            };
            path.pop();
            children.push(PredictionBranch {
                set: region.set,
                and_preds: Vec::new(),
                covered: S::empty(),
                sub,
            });
        }

        let claimed = children.iter().fold(S::empty(), |acc, b| acc.union(&b.set));
        let remainder = S::everything().subtract(&claimed);
        if !remainder.is_empty() {
            let target = self.default_target(&live, offset);
            let existing = children.iter().position(|b| match b.sub {
                BranchTarget::Alt(alt) => alt == target,
                BranchTarget::Tree(_) => false,
            });
            match existing {
                Some(pos) => {
                    let mut branch = children.remove(pos);
                    branch.set = branch.set.union(&remainder);
                    children.push(branch);
                }
                None => children.push(PredictionBranch {
                    set: remainder,
                    and_preds: Vec::new(),
                    covered: S::empty(),
                    sub: BranchTarget::Alt(target),
                }),
            }
        }

        let mut covered = S::empty();
        let mut total = S::empty();
        for branch in &mut children {
            branch.covered = covered.clone();
            covered = covered.union(&branch.set);
            if !branch.is_error_branch() {
                total = total.union(&branch.set);
            }
        }
        Ok(PredictionTree {
            lookahead: offset,
            is_assertion_level: false,
            children,
            total_coverage: total,
        })
    }

    /// Lookahead is used up and several arms remain. Arms guarded by
    /// and-predicates are tested in declaration order up to the first
    /// unguarded arm; guarded arms declared after it can never be chosen.
    fn resolve(
        &mut self,
        live: Vec<(Alt, Vec<Config>)>,
        offset: usize,
        path: &[S],
    ) -> BranchTarget<S> {
        let mut conditional: Vec<(Alt, Vec<AndPredSet>)> = Vec::new();
        let mut unconditional = Vec::new();
        let mut shadowed = Vec::new();
        for (alt, configs) in &live {
            let guarded = configs.iter().all(|c| !c.and_preds.is_empty());
            if !guarded {
                unconditional.push(*alt);
            } else if !unconditional.is_empty() {
                shadowed.push(*alt);
            } else {
                let mut sets: Vec<AndPredSet> = Vec::new();
                for config in configs {
                    if !sets.contains(&config.and_preds) {
                        sets.push(config.and_preds.clone());
                    }
                }
                conditional.push((*alt, sets));
            }
        }

        let fallback = if unconditional.is_empty() {
            Alt::Error
        } else if self.alts.greedy == Some(false) && unconditional.contains(&Alt::Exit) {
            Alt::Exit
        } else {
            match self.alts.default_arm {
                Some(arm) if unconditional.contains(&Alt::Arm(arm)) => Alt::Arm(arm),
                _ => unconditional[0],
            }
        };
        for alt in &shadowed {
            self.warnings.push(format!(
                "Branch {} is never tested for input such as «{}» because branch {} has no and-predicate.",
                alt,
                describe_path(path),
                unconditional[0]
            ));
        }
        if unconditional.len() > 1 && self.alts.greedy.is_none() {
            let alts: Vec<String> = unconditional.iter().map(|a| a.to_string()).collect();
            self.warnings.push(format!(
                "Alternatives ({}) are ambiguous for input such as «{}». Using {}.",
                alts.join(", "),
                describe_path(path),
                fallback
            ));
        }
        if conditional.is_empty() {
            return BranchTarget::Alt(fallback);
        }

        let region = path.last().cloned().unwrap_or_else(S::everything);
        let mut children: Vec<PredictionBranch<S>> = conditional
            .into_iter()
            .map(|(alt, and_preds)| PredictionBranch {
                set: region.clone(),
                and_preds,
                covered: S::empty(),
                sub: BranchTarget::Alt(alt),
            })
            .collect();
        children.push(PredictionBranch {
            set: region.clone(),
            and_preds: Vec::new(),
            covered: S::empty(),
            sub: BranchTarget::Alt(fallback),
        });
        BranchTarget::Tree(Box::new(PredictionTree {
            lookahead: offset,
            is_assertion_level: true,
            children,
            total_coverage: region,
        }))
    }
}

/// Attaches a prediction tree to every alternative set of `rule`, then marks
/// the terminals and and-predicates that prediction already checked.
pub fn analyze_rule<S: TerminalSet>(
    grammar: &mut Grammar<S>,
    rule: &str,
    follow: &FollowSets<S>,
    options: &Options,
    sink: &mut dyn MessageSink,
) -> Result<()> {
    let (body, k) = match grammar.rule(rule) {
        Some(r) => (r.body, r.k.unwrap_or(options.k).max(1)),
        None => {
            return Err(GenError::UnknownRule {
                rule: rule.to_owned(),
                referenced: rule.to_owned(),
            })
        }
    };
    let own_follow = follow.get(rule).cloned().unwrap_or_else(S::everything);

    let mut trees = Vec::new();
    {
        let g: &Grammar<S> = grammar;
        visit_continuations(g, body, &[], &mut |id, after| {
            let alts = match g.pred(id).as_alts() {
                Some(alts) => alts,
                None => return Ok(()),
            };
            if alts.arms.is_empty() {
                return Err(GenError::EmptyAlts {
                    rule: rule.to_owned(),
                    pred: id,
                });
            }
            let mut live = Vec::new();
            for (i, &arm) in alts.arms.iter().enumerate() {
                let mut stack = after.to_vec();
                if alts.mode == LoopMode::Star {
                    stack.push(Frame::Pred(id));
                }
                stack.push(Frame::Pred(arm));
                live.push((Alt::Arm(i), vec![Config::new(stack)]));
            }
            if alts.mode != LoopMode::None {
                live.push((Alt::Exit, vec![Config::new(after.to_vec())]));
            }
            let mut builder = TreeBuilder {
                lookahead: Lookahead {
                    grammar: g,
                    rule,
                    follow: &own_follow,
                    recursion_limit: options.recursion_limit,
                },
                alts,
                k,
                warnings: Vec::new(),
            };
            let tree = builder.build(live, 0, &mut Vec::new())?;
            trees.push((id, tree, builder.warnings));
            Ok(())
        })?;
    }

    for (id, tree, warnings) in trees {
        for warning in warnings {
            sink.report(Severity::Warning, &Location::pred(grammar, rule, id), &warning);
        }
        trace!("prediction for {}{}:\n{}", rule, id, tree);
        if let Some(alts) = grammar.pred_mut(id).as_alts_mut() {
            if let Some(alt) = tree.find_invalid_alt(alts.arms.len(), alts.mode != LoopMode::None) {
                return Err(GenError::ArmOutOfRange {
                    rule: rule.to_owned(),
                    pred: id,
                    alt,
                });
            }
            alts.prediction = Some(tree);
        }
    }
    mark_prematched(grammar, body);
    Ok(())
}

/// The first node an arm matches, if it is a terminal or an and-predicate.
fn leading_pred<S: TerminalSet>(grammar: &Grammar<S>, arm: PredId) -> Option<PredId> {
    let mut id = arm;
    loop {
        match grammar.pred(id).kind {
            PredKind::Seq(ref items) => id = *items.first()?,
            PredKind::Terminal(_) | PredKind::And(_) => return Some(id),
            _ => return None,
        }
    }
}

fn reaches<S>(branch: &PredictionBranch<S>, alt: Alt) -> bool {
    match branch.sub {
        BranchTarget::Alt(a) => a == alt,
        BranchTarget::Tree(ref tree) => tree.times_used().contains_key(&alt),
    }
}

/// Union of the first-level sets that lead to `alt`, when the first level
/// tests `la0` at all.
fn la0_sets_to<S: TerminalSet>(tree: &PredictionTree<S>, alt: Alt) -> Option<S> {
    if tree.is_assertion_level || tree.lookahead != 0 || tree.children.len() < 2 {
        return None;
    }
    let mut union = None;
    for branch in tree.children.iter().filter(|b| reaches(b, alt)) {
        union = Some(match union {
            None => branch.set.clone(),
            Some(u) => branch.set.union(&u),
        });
    }
    union
}

/// Whether every path to `alt` passes an assertion that tests `pred`.
fn always_asserted<S>(tree: &PredictionTree<S>, alt: Alt, pred: PredId) -> bool {
    let tested = AndRef { pred, offset: 0 };
    let mut found = false;
    for branch in tree.children.iter().filter(|b| reaches(b, alt)) {
        found = true;
        if tree.is_assertion_level
            && !branch.and_preds.is_empty()
            && branch.and_preds.iter().all(|set| set.contains(&tested))
        {
            continue;
        }
        match branch.sub {
            BranchTarget::Tree(ref sub) if always_asserted(sub, alt, pred) => continue,
            _ => return false,
        }
    }
    found
}

fn mark_prematched<S: TerminalSet>(grammar: &mut Grammar<S>, body: PredId) {
    let mut marks = Vec::new();
    for id in grammar.walk_matched(body) {
        let alts = match grammar.pred(id).as_alts() {
            Some(alts) => alts,
            None => continue,
        };
        let tree = match alts.prediction {
            Some(ref tree) => tree,
            None => continue,
        };
        for (i, &arm) in alts.arms.iter().enumerate() {
            let lead = match leading_pred(grammar, arm) {
                Some(lead) => lead,
                None => continue,
            };
            let proven = match grammar.pred(lead).kind {
                PredKind::Terminal(ref term) => match la0_sets_to(tree, Alt::Arm(i)) {
                    Some(sets) => sets.is_subset_of(&term.set),
                    None => false,
                },
                PredKind::And(_) => always_asserted(tree, Alt::Arm(i), lead),
                _ => false,
            };
            if proven {
                marks.push(lead);
            }
        }
    }
    for lead in marks {
        match grammar.pred_mut(lead).kind {
            PredKind::Terminal(ref mut term) => term.prematched = Some(true),
            PredKind::And(ref mut and) => and.prematched = Some(true),
            _ => {}
        }
    }
}
