//! Backward chaining with backtracking
//!
//! A goal is proven when it is already known, or when some rule concluding
//! it has every premise proven in turn. Candidate rules are tried in policy
//! order; the first one that succeeds wins.
//!
//! Each candidate gets its own copy of the used-rule set with itself added.
//! The premises of that candidate all see this copy, so a rule cannot be
//! reused below itself, while sibling candidates stay independent. A goal
//! that reappears on its own recursion path fails for that path only.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::{Distance, FactGraph};
use crate::heuristic::backward_fpg_score;
use crate::rule::{Atom, FactSet, Rule, RuleId, RuleSet};

/// Order in which candidate rules for a goal are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOrder {
    /// Ascending rule id.
    #[default]
    Min,
    /// Descending rule id.
    Max,
    /// Ascending backward FPG score, list order on ties.
    Fpg,
}

impl FromStr for RuleOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" => Ok(RuleOrder::Min),
            "max" => Ok(RuleOrder::Max),
            "fpg" => Ok(RuleOrder::Fpg),
            other => Err(Error::Config(format!("unknown rule order '{}'", other))),
        }
    }
}

impl fmt::Display for RuleOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuleOrder::Min => "min",
            RuleOrder::Max => "max",
            RuleOrder::Fpg => "fpg",
        })
    }
}

/// A successful derivation recorded during the search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Rule that derived the conclusion.
    pub rule_id: RuleId,
    /// Premises that were proven first.
    pub premises: Vec<Atom>,
    /// Derived atom.
    pub conclusion: Atom,
    /// Recursion depth of the goal (0 for the top goal).
    pub depth: usize,
}

/// One event of the proof search, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SearchEvent {
    /// Started proving a goal.
    Goal { goal: Atom, depth: usize },
    /// Goal already known.
    Known { goal: Atom, depth: usize },
    /// No unused rule concludes the goal.
    NoRule { goal: Atom, depth: usize },
    /// Trying a candidate rule.
    TryRule {
        goal: Atom,
        rule_id: RuleId,
        score: Option<Distance>,
        depth: usize,
    },
    /// A premise failed and the rule was abandoned.
    Backtrack {
        goal: Atom,
        rule_id: RuleId,
        premise: Atom,
        depth: usize,
    },
    /// Goal derived through a rule.
    Proven {
        goal: Atom,
        rule_id: RuleId,
        depth: usize,
    },
    /// Every candidate failed.
    Failed { goal: Atom, depth: usize },
    /// Goal already on the recursion path.
    CycleCut { goal: Atom, depth: usize },
}

impl SearchEvent {
    /// Recursion depth the event happened at.
    pub fn depth(&self) -> usize {
        match self {
            SearchEvent::Goal { depth, .. }
            | SearchEvent::Known { depth, .. }
            | SearchEvent::NoRule { depth, .. }
            | SearchEvent::TryRule { depth, .. }
            | SearchEvent::Backtrack { depth, .. }
            | SearchEvent::Proven { depth, .. }
            | SearchEvent::Failed { depth, .. }
            | SearchEvent::CycleCut { depth, .. } => *depth,
        }
    }
}

impl fmt::Display for SearchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indent = "  ".repeat(self.depth());
        match self {
            SearchEvent::Goal { goal, .. } => write!(f, "{}=> prove {}", indent, goal),
            SearchEvent::Known { goal, .. } => write!(f, "{}ok {} is known", indent, goal),
            SearchEvent::NoRule { goal, .. } => {
                write!(f, "{}x no rule concludes {}, backtrack", indent, goal)
            }
            SearchEvent::TryRule {
                rule_id, score, ..
            } => match score {
                Some(h) => write!(f, "{}- try r{} (h = {})", indent, rule_id, h),
                None => write!(f, "{}- try r{}", indent, rule_id),
            },
            SearchEvent::Backtrack {
                rule_id, premise, ..
            } => write!(f, "{}  leave r{}: {} failed", indent, rule_id, premise),
            SearchEvent::Proven { goal, rule_id, .. } => {
                write!(f, "{}ok {} derived by r{}", indent, goal, rule_id)
            }
            SearchEvent::Failed { goal, .. } => write!(f, "{}x cannot prove {}", indent, goal),
            SearchEvent::CycleCut { goal, .. } => {
                write!(f, "{}x {} is already being proven", indent, goal)
            }
        }
    }
}

/// The outcome of a backward chaining query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackwardChainResult {
    /// The goal that was queried.
    pub goal: Atom,
    /// Whether the goal was proven.
    pub proven: bool,
    /// Initial facts plus every atom proven along the way.
    pub known: FactSet,
    /// Successful derivations in completion order.
    pub proof: Vec<ProofStep>,
    /// Full search log.
    pub events: Vec<SearchEvent>,
    /// Candidate rules tried.
    pub rules_tried: usize,
    /// Candidate rules abandoned after a failed premise.
    pub backtracks: usize,
}

impl BackwardChainResult {
    fn new(goal: &str, known: FactSet) -> Self {
        Self {
            goal: goal.to_string(),
            proven: false,
            known,
            proof: Vec::new(),
            events: Vec::new(),
            rules_tried: 0,
            backtracks: 0,
        }
    }

    /// `(rule id, conclusion)` of each derivation.
    pub fn trace(&self) -> Vec<(RuleId, Atom)> {
        self.proof
            .iter()
            .map(|s| (s.rule_id, s.conclusion.clone()))
            .collect()
    }

    /// Calculates the maximum depth of the proof tree.
    pub fn depth(&self) -> usize {
        self.proof.iter().map(|s| s.depth).max().unwrap_or(0)
    }

    /// Indented explanation, one event per line.
    pub fn explain(&self) -> String {
        self.events
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Backward chaining over a borrowed rule set.
#[derive(Debug, Clone)]
pub struct BackwardChainer<'a> {
    rules: &'a RuleSet,
    order: RuleOrder,
    max_depth: usize,
}

impl<'a> BackwardChainer<'a> {
    /// Default recursion limit.
    pub const DEFAULT_MAX_DEPTH: usize = 1024;

    /// Creates a chainer trying candidates by ascending id.
    pub fn new(rules: &'a RuleSet) -> Self {
        Self {
            rules,
            order: RuleOrder::default(),
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets the candidate order.
    pub fn order(mut self, order: RuleOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets the recursion limit.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Tries to prove `goal` from `facts`.
    ///
    /// An unprovable goal is `Ok` with `proven == false`; only the depth
    /// limit produces an error.
    pub fn prove(&self, goal: &str, facts: &FactSet) -> Result<BackwardChainResult> {
        let fpg = match self.order {
            RuleOrder::Fpg => Some(FactGraph::build(self.rules)),
            _ => None,
        };
        let mut search = Search {
            fpg,
            path: HashSet::new(),
            result: BackwardChainResult::new(goal, facts.clone()),
        };

        let proven = self.prove_goal(goal, &HashSet::new(), 0, &mut search)?;
        let mut result = search.result;
        result.proven = proven;

        info!(
            "Backward chaining {} '{}': {} rules tried, {} backtracks",
            if proven { "proved" } else { "failed on" },
            goal,
            result.rules_tried,
            result.backtracks
        );
        Ok(result)
    }

    fn prove_goal(
        &self,
        goal: &str,
        used: &HashSet<RuleId>,
        depth: usize,
        search: &mut Search,
    ) -> Result<bool> {
        if depth > self.max_depth {
            return Err(Error::MaxDepthExceeded {
                depth: self.max_depth,
            });
        }
        search.log(SearchEvent::Goal {
            goal: goal.to_string(),
            depth,
        });

        if search.result.known.contains(goal) {
            search.log(SearchEvent::Known {
                goal: goal.to_string(),
                depth,
            });
            return Ok(true);
        }
        if search.path.contains(goal) {
            debug!("Cycle on '{}' at depth {}", goal, depth);
            search.log(SearchEvent::CycleCut {
                goal: goal.to_string(),
                depth,
            });
            return Ok(false);
        }

        let candidates = self.candidates(goal, used, search.fpg.as_ref());
        if candidates.is_empty() {
            search.log(SearchEvent::NoRule {
                goal: goal.to_string(),
                depth,
            });
            return Ok(false);
        }

        search.path.insert(goal.to_string());
        let outcome = self.try_candidates(goal, &candidates, used, depth, search);
        search.path.remove(goal);

        if !outcome? {
            search.log(SearchEvent::Failed {
                goal: goal.to_string(),
                depth,
            });
            return Ok(false);
        }
        Ok(true)
    }

    fn try_candidates(
        &self,
        goal: &str,
        candidates: &[(&Rule, Option<Distance>)],
        used: &HashSet<RuleId>,
        depth: usize,
        search: &mut Search,
    ) -> Result<bool> {
        for (rule, score) in candidates {
            trace!("Goal '{}': trying r{}", goal, rule.id);
            search.result.rules_tried += 1;
            search.log(SearchEvent::TryRule {
                goal: goal.to_string(),
                rule_id: rule.id,
                score: *score,
                depth,
            });

            let mut branch = used.clone();
            branch.insert(rule.id);

            let mut failed = None;
            for premise in &rule.premises {
                if !self.prove_goal(premise, &branch, depth + 1, search)? {
                    failed = Some(premise);
                    break;
                }
            }

            if let Some(premise) = failed {
                debug!("Backtrack from r{}: '{}' failed", rule.id, premise);
                search.result.backtracks += 1;
                search.log(SearchEvent::Backtrack {
                    goal: goal.to_string(),
                    rule_id: rule.id,
                    premise: premise.clone(),
                    depth,
                });
                continue;
            }

            search.result.known.insert(goal.to_string());
            search.result.proof.push(ProofStep {
                rule_id: rule.id,
                premises: rule.premises.iter().cloned().collect(),
                conclusion: goal.to_string(),
                depth,
            });
            debug!("Proved '{}' by r{}", goal, rule.id);
            search.log(SearchEvent::Proven {
                goal: goal.to_string(),
                rule_id: rule.id,
                depth,
            });
            return Ok(true);
        }
        Ok(false)
    }

    /// Unused rules concluding `goal`, in the order they will be tried.
    fn candidates(
        &self,
        goal: &str,
        used: &HashSet<RuleId>,
        fpg: Option<&FactGraph>,
    ) -> Vec<(&'a Rule, Option<Distance>)> {
        let rules: &'a RuleSet = self.rules;
        let mut candidates: Vec<(&'a Rule, Option<Distance>)> = rules
            .iter()
            .filter(|r| r.conclusion == goal && !used.contains(&r.id))
            .map(|r| (r, fpg.map(|g| backward_fpg_score(g, goal, r))))
            .collect();

        match self.order {
            RuleOrder::Min => candidates.sort_by_key(|(r, _)| r.id),
            RuleOrder::Max => candidates.sort_by_key(|(r, _)| std::cmp::Reverse(r.id)),
            // stable: equal scores keep list order
            RuleOrder::Fpg => candidates.sort_by_key(|(_, score)| *score),
        }
        candidates
    }
}

struct Search {
    fpg: Option<FactGraph>,
    path: HashSet<Atom>,
    result: BackwardChainResult,
}

impl Search {
    fn log(&mut self, event: SearchEvent) {
        self.result.events.push(event);
    }
}
