//! Forward chaining over an agenda of candidate rules
//!
//! The chainer saturates a fact set: it keeps an agenda of rules that can
//! fire, selects one per step, fires it and enqueues whatever became
//! applicable. The final fact set does not depend on the policies; only the
//! firing order (and how early a goal is met) does.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::heuristic::ScoreTable;
use crate::rule::{Atom, FactSet, Rule, RuleId, RuleSet};

/// Pop order of the agenda when no explicit selection applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgendaPolicy {
    /// FIFO: oldest pending rule first.
    #[default]
    #[serde(alias = "fifo")]
    Queue,
    /// LIFO: newest pending rule first.
    #[serde(alias = "lifo")]
    Stack,
}

impl FromStr for AgendaPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" | "fifo" => Ok(AgendaPolicy::Queue),
            "stack" | "lifo" => Ok(AgendaPolicy::Stack),
            other => Err(Error::Config(format!("unknown agenda policy '{}'", other))),
        }
    }
}

impl fmt::Display for AgendaPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AgendaPolicy::Queue => "queue",
            AgendaPolicy::Stack => "stack",
        })
    }
}

/// How the next rule is picked from the agenda.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Smallest rule id on the agenda.
    Min,
    /// Largest rule id on the agenda.
    Max,
    /// Lowest forward FPG score.
    Fpg,
    /// Fewest RPG descendants.
    Rpg,
    /// Plain pop according to the [`AgendaPolicy`].
    #[default]
    #[serde(alias = "first")]
    Agenda,
}

impl SelectionPolicy {
    /// Whether the whole agenda is scanned each step.
    pub fn scans_agenda(&self) -> bool {
        !matches!(self, SelectionPolicy::Agenda)
    }
}

impl FromStr for SelectionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" => Ok(SelectionPolicy::Min),
            "max" => Ok(SelectionPolicy::Max),
            "fpg" => Ok(SelectionPolicy::Fpg),
            "rpg" => Ok(SelectionPolicy::Rpg),
            "agenda" | "first" => Ok(SelectionPolicy::Agenda),
            other => Err(Error::Config(format!("unknown selection policy '{}'", other))),
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SelectionPolicy::Min => "min",
            SelectionPolicy::Max => "max",
            SelectionPolicy::Fpg => "fpg",
            SelectionPolicy::Rpg => "rpg",
            SelectionPolicy::Agenda => "agenda",
        })
    }
}

/// One rule firing, with the fact set as it stood afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiringStep {
    /// 1-based firing number.
    pub step: usize,
    /// Rule that fired.
    pub rule_id: RuleId,
    /// Premises of that rule.
    pub premises: Vec<Atom>,
    /// Newly derived atom.
    pub conclusion: Atom,
    /// Facts known after the firing, in derivation order.
    pub facts_after: Vec<Atom>,
}

impl fmt::Display for FiringStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {}: r{} {} -> {} | facts = {{{}}}",
            self.step,
            self.rule_id,
            self.premises.join(" ^ "),
            self.conclusion,
            self.facts_after.join(", ")
        )
    }
}

/// The outcome of a forward chaining run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardChainResult {
    /// `Some(true)` when the goal was derived or already known,
    /// `Some(false)` when it was not, `None` when no goal was given.
    pub reached_goal: Option<bool>,
    /// Final fact set: initial facts followed by derived ones.
    pub facts: FactSet,
    /// `(rule id, derived atom)` in firing order.
    pub trace: Vec<(RuleId, Atom)>,
    /// Detailed report of every firing.
    pub firings: Vec<FiringStep>,
    /// Agenda selections made, including discarded ones.
    pub steps: usize,
}

impl ForwardChainResult {
    /// Returns the number of rules fired.
    pub fn count(&self) -> usize {
        self.trace.len()
    }

    /// Rule ids in firing order.
    pub fn fired_rules(&self) -> Vec<RuleId> {
        self.trace.iter().map(|(id, _)| *id).collect()
    }

    /// Atoms derived during the run, in derivation order.
    pub fn derived(&self) -> Vec<&Atom> {
        self.trace.iter().map(|(_, atom)| atom).collect()
    }
}

/// Forward chaining over a borrowed rule set.
///
/// Holds only the rule snapshot and the policies; every call to
/// [`ForwardChainer::run`] owns its own facts and agenda.
#[derive(Debug, Clone)]
pub struct ForwardChainer<'a> {
    rules: &'a RuleSet,
    agenda: AgendaPolicy,
    selection: SelectionPolicy,
    max_steps: usize,
}

impl<'a> ForwardChainer<'a> {
    /// Default step budget.
    pub const DEFAULT_MAX_STEPS: usize = 10_000;

    /// Creates a chainer with queue agenda and agenda-order selection.
    pub fn new(rules: &'a RuleSet) -> Self {
        Self {
            rules,
            agenda: AgendaPolicy::default(),
            selection: SelectionPolicy::default(),
            max_steps: Self::DEFAULT_MAX_STEPS,
        }
    }

    /// Sets the agenda policy.
    pub fn agenda(mut self, agenda: AgendaPolicy) -> Self {
        self.agenda = agenda;
        self
    }

    /// Sets the selection policy.
    pub fn selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    /// Sets the maximum number of agenda selections.
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Runs forward chaining from `initial`.
    ///
    /// With a goal, returns as soon as the goal atom is derived. Otherwise
    /// (or when the goal is never derived) runs until the agenda is empty.
    ///
    /// Fails only with [`Error::StepBudgetExceeded`].
    pub fn run(&self, initial: &FactSet, goal: Option<&str>) -> Result<ForwardChainResult> {
        let rules = self.rules.rules();
        let scores = match self.selection {
            SelectionPolicy::Fpg => Some(ScoreTable::fpg(self.rules)),
            SelectionPolicy::Rpg => Some(ScoreTable::rpg(self.rules)),
            _ => None,
        };

        let mut result = ForwardChainResult {
            facts: initial.clone(),
            ..Default::default()
        };
        let mut agenda: VecDeque<usize> = VecDeque::new();
        enqueue_applicable(rules, &result.facts, &mut agenda);

        while !agenda.is_empty() {
            if result.steps >= self.max_steps {
                return Err(Error::StepBudgetExceeded {
                    steps: result.steps,
                });
            }
            result.steps += 1;

            let Some(slot) = self.select(rules, &agenda, scores.as_ref()) else {
                break;
            };
            let Some(pos) = agenda.remove(slot) else {
                break;
            };
            let rule = &rules[pos];
            trace!(
                "Agenda {:?}: selected r{} ({})",
                agenda_ids(rules, &agenda),
                rule.id,
                self.selection
            );

            if !rule.can_fire(&result.facts) {
                trace!("Discarded r{}", rule.id);
                continue;
            }

            result.facts.insert(rule.conclusion.clone());
            result.trace.push((rule.id, rule.conclusion.clone()));
            result.firings.push(FiringStep {
                step: result.trace.len(),
                rule_id: rule.id,
                premises: rule.premises.iter().cloned().collect(),
                conclusion: rule.conclusion.clone(),
                facts_after: result.facts.iter().cloned().collect(),
            });
            debug!("Fired {} => {}", rule, rule.conclusion);

            if goal == Some(rule.conclusion.as_str()) {
                result.reached_goal = Some(true);
                info!(
                    "Forward chaining reached goal '{}' after {} firings",
                    rule.conclusion,
                    result.count()
                );
                return Ok(result);
            }

            // rules whose conclusion just became known never stay pending
            agenda.retain(|p| rules[*p].can_fire(&result.facts));
            enqueue_applicable(rules, &result.facts, &mut agenda);
        }

        result.reached_goal = goal.map(|g| result.facts.contains(g));
        info!(
            "Forward chaining saturated: {} firings, {} facts, goal {:?}",
            result.count(),
            result.facts.len(),
            result.reached_goal
        );
        Ok(result)
    }

    /// Agenda slot of the next rule to evaluate.
    fn select(
        &self,
        rules: &[Rule],
        agenda: &VecDeque<usize>,
        scores: Option<&ScoreTable>,
    ) -> Option<usize> {
        match (self.selection, scores) {
            (SelectionPolicy::Min, _) => first_extreme(agenda, |p| rules[p].id, false),
            (SelectionPolicy::Max, _) => first_extreme(agenda, |p| rules[p].id, true),
            (SelectionPolicy::Fpg | SelectionPolicy::Rpg, Some(table)) => {
                first_extreme(agenda, |p| table.get(p), false)
            }
            _ => match self.agenda {
                AgendaPolicy::Queue => Some(0),
                AgendaPolicy::Stack => agenda.len().checked_sub(1),
            },
        }
    }
}

/// Pushes every firable rule that is not already pending, in list order.
fn enqueue_applicable(rules: &[Rule], facts: &FactSet, agenda: &mut VecDeque<usize>) {
    for (pos, rule) in rules.iter().enumerate() {
        if rule.can_fire(facts) && !agenda.contains(&pos) {
            trace!("Enqueued r{}", rule.id);
            agenda.push_back(pos);
        }
    }
}

/// Slot of the smallest (or largest) key; ties keep the earliest slot.
fn first_extreme<K, F>(agenda: &VecDeque<usize>, key: F, greatest: bool) -> Option<usize>
where
    K: Ord,
    F: Fn(usize) -> K,
{
    let mut best: Option<(usize, K)> = None;
    for (slot, &pos) in agenda.iter().enumerate() {
        let k = key(pos);
        let better = match &best {
            None => true,
            Some((_, current)) if greatest => k > *current,
            Some((_, current)) => k < *current,
        };
        if better {
            best = Some((slot, k));
        }
    }
    best.map(|(slot, _)| slot)
}

fn agenda_ids(rules: &[Rule], agenda: &VecDeque<usize>) -> Vec<RuleId> {
    agenda.iter().map(|p| rules[*p].id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Distance;
    use crate::rule::fact_set;

    fn rules(defs: &[(&[&str], &str)]) -> RuleSet {
        RuleSet::from_rules(
            defs.iter()
                .enumerate()
                .map(|(i, (p, c))| Rule::new(i as RuleId + 1, p.iter().copied(), *c).unwrap()),
        )
        .unwrap()
    }

    fn scenario() -> RuleSet {
        rules(&[(&["A", "B"], "C"), (&["C"], "D"), (&["E"], "B"), (&["D", "E"], "X")])
    }

    #[test]
    fn test_reaches_goal_with_queue_and_min() {
        let set = scenario();
        let result = ForwardChainer::new(&set)
            .agenda(AgendaPolicy::Queue)
            .selection(SelectionPolicy::Min)
            .run(&fact_set(["A", "E"]), Some("X"))
            .unwrap();

        assert_eq!(result.reached_goal, Some(true));
        for atom in ["A", "E", "B", "C", "D", "X"] {
            assert!(result.facts.contains(atom), "missing {}", atom);
        }
        assert_eq!(result.fired_rules(), vec![3, 1, 2, 4]);
    }

    #[test]
    fn test_no_goal_reports_none() {
        let set = scenario();
        let result = ForwardChainer::new(&set).run(&fact_set(["A", "E"]), None).unwrap();

        assert_eq!(result.reached_goal, None);
        assert_eq!(result.count(), 4);
    }

    #[test]
    fn test_unreachable_goal_is_false() {
        let set = scenario();
        let result = ForwardChainer::new(&set).run(&fact_set(["A"]), Some("X")).unwrap();

        assert_eq!(result.reached_goal, Some(false));
        assert!(result.trace.is_empty());
        assert_eq!(result.facts, fact_set(["A"]));
    }

    #[test]
    fn test_stops_at_goal() {
        let set = rules(&[(&["a"], "b"), (&["a"], "c")]);
        let result = ForwardChainer::new(&set).run(&fact_set(["a"]), Some("b")).unwrap();

        assert_eq!(result.reached_goal, Some(true));
        assert!(!result.facts.contains("c"));
    }

    #[test]
    fn test_max_prefers_highest_id() {
        let set = rules(&[(&["a"], "b"), (&["a"], "c"), (&["a"], "d")]);
        let result = ForwardChainer::new(&set)
            .selection(SelectionPolicy::Max)
            .run(&fact_set(["a"]), None)
            .unwrap();

        assert_eq!(result.fired_rules(), vec![3, 2, 1]);
    }

    #[test]
    fn test_stack_pops_newest() {
        let set = rules(&[(&["a"], "b"), (&["a"], "c"), (&["b"], "d")]);
        let result = ForwardChainer::new(&set)
            .agenda(AgendaPolicy::Stack)
            .run(&fact_set(["a"]), None)
            .unwrap();

        // initial agenda [1, 2]: pop 2, then 1, which enqueues 3
        assert_eq!(result.fired_rules(), vec![2, 1, 3]);
    }

    #[test]
    fn test_rpg_prefers_leaf_rules() {
        let set = rules(&[(&["a"], "b"), (&["b"], "c"), (&["a"], "z")]);
        let result = ForwardChainer::new(&set)
            .selection(SelectionPolicy::Rpg)
            .run(&fact_set(["a"]), None)
            .unwrap();

        // r3 has no descendants, r1 feeds r2
        assert_eq!(result.fired_rules(), vec![3, 1, 2]);
    }

    #[test]
    fn test_fpg_selection_takes_lowest_score() {
        let set = rules(&[(&["a"], "b"), (&["a"], "c"), (&["a"], "d")]);
        let chainer = ForwardChainer::new(&set)
            .agenda(AgendaPolicy::Stack)
            .selection(SelectionPolicy::Fpg);
        let agenda = std::collections::VecDeque::from(vec![0, 1, 2]);

        let table = ScoreTable::Fpg(vec![
            Distance::Finite(2),
            Distance::Infinite,
            Distance::Finite(1),
        ]);
        assert_eq!(chainer.select(set.rules(), &agenda, Some(&table)), Some(2));

        let table = ScoreTable::Fpg(vec![
            Distance::Finite(1),
            Distance::Infinite,
            Distance::Finite(1),
        ]);
        assert_eq!(chainer.select(set.rules(), &agenda, Some(&table)), Some(0));
    }

    #[test]
    fn test_fpg_ties_keep_earliest_slot() {
        // an applicable rule always reaches its conclusion through its own edge
        let set = rules(&[(&["a"], "b"), (&["a"], "c"), (&["b"], "d")]);
        let table = ScoreTable::fpg(&set);
        assert!((0..3).all(|pos| table.get(pos) == Distance::Finite(1)));

        let result = ForwardChainer::new(&set)
            .agenda(AgendaPolicy::Stack)
            .selection(SelectionPolicy::Fpg)
            .run(&fact_set(["a"]), None)
            .unwrap();

        // a plain stack pop would fire r2 first
        assert_eq!(result.fired_rules(), vec![1, 2, 3]);
    }

    #[test]
    fn test_known_conclusion_is_never_refired() {
        let set = rules(&[(&["a"], "b"), (&["a"], "b")]);
        let result = ForwardChainer::new(&set).run(&fact_set(["a", "b"]), None).unwrap();

        assert!(result.trace.is_empty());
        assert_eq!(result.steps, 0);
    }

    #[test]
    fn test_duplicate_conclusion_fires_once() {
        let set = rules(&[(&["a"], "b"), (&["a"], "b")]);
        let result = ForwardChainer::new(&set).run(&fact_set(["a"]), None).unwrap();

        assert_eq!(result.fired_rules(), vec![1]);
    }

    #[test]
    fn test_step_budget() {
        let set = scenario();
        let err = ForwardChainer::new(&set)
            .max_steps(1)
            .run(&fact_set(["A", "E"]), None)
            .unwrap_err();

        assert!(matches!(err, Error::StepBudgetExceeded { steps: 1 }));
    }

    #[test]
    fn test_firing_report() {
        let set = rules(&[(&["a"], "b")]);
        let result = ForwardChainer::new(&set).run(&fact_set(["a"]), None).unwrap();

        let step = &result.firings[0];
        assert_eq!(step.step, 1);
        assert_eq!(step.facts_after, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(step.to_string(), "step 1: r1 a -> b | facts = {a, b}");
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("FIFO".parse::<AgendaPolicy>().unwrap(), AgendaPolicy::Queue);
        assert_eq!("lifo".parse::<AgendaPolicy>().unwrap(), AgendaPolicy::Stack);
        assert_eq!("first".parse::<SelectionPolicy>().unwrap(), SelectionPolicy::Agenda);
        assert_eq!("rpg".parse::<SelectionPolicy>().unwrap(), SelectionPolicy::Rpg);
        assert!("random".parse::<SelectionPolicy>().is_err());
    }
}
