//! Rule-selection scores computed from the precedence graphs
//!
//! Every score is "lower is preferred". Distances use [`Distance`], so an
//! unreachable premise pushes a rule to the back rather than failing.

use crate::graph::{Distance, FactGraph, RuleGraph};
use crate::rule::{Rule, RuleSet};

/// Forward FPG score: `max { d(p, conclusion) | p in premises }`.
pub fn forward_fpg_score(fpg: &FactGraph, rule: &Rule) -> Distance {
    rule.premises
        .iter()
        .map(|p| fpg.distance(p, &rule.conclusion))
        .max()
        .unwrap_or(Distance::Infinite)
}

/// Backward FPG score: `max { d(goal, p) | p in premises }`.
///
/// The distance runs from the goal outward, the reverse of
/// [`forward_fpg_score`].
pub fn backward_fpg_score(fpg: &FactGraph, goal: &str, rule: &Rule) -> Distance {
    rule.premises
        .iter()
        .map(|p| fpg.distance(goal, p))
        .max()
        .unwrap_or(Distance::Infinite)
}

/// RPG score: number of rules transitively depending on this one.
pub fn rpg_score(rpg: &RuleGraph, rule: &Rule) -> usize {
    rpg.descendants(rule.id).len()
}

/// Per-position score table for a whole rule set.
///
/// Graphs are static during a run, so forward chaining computes the
/// scores once instead of per agenda scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreTable {
    /// Forward FPG distances, indexed by rule position.
    Fpg(Vec<Distance>),
    /// RPG descendant counts, indexed by rule position.
    Rpg(Vec<usize>),
}

impl ScoreTable {
    /// Scores every rule with the forward FPG heuristic.
    pub fn fpg(rules: &RuleSet) -> Self {
        let fpg = FactGraph::build(rules);
        ScoreTable::Fpg(rules.iter().map(|r| forward_fpg_score(&fpg, r)).collect())
    }

    /// Scores every rule with the RPG heuristic.
    pub fn rpg(rules: &RuleSet) -> Self {
        let rpg = RuleGraph::build(rules);
        ScoreTable::Rpg(rules.iter().map(|r| rpg_score(&rpg, r)).collect())
    }

    /// Score of the rule at `pos`, as a distance for uniform comparison.
    pub fn get(&self, pos: usize) -> Distance {
        match self {
            ScoreTable::Fpg(scores) => scores.get(pos).copied().unwrap_or(Distance::Infinite),
            ScoreTable::Rpg(scores) => scores
                .get(pos)
                .map_or(Distance::Infinite, |n| Distance::Finite(*n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleId;

    fn rules(defs: &[(&[&str], &str)]) -> RuleSet {
        RuleSet::from_rules(
            defs.iter()
                .enumerate()
                .map(|(i, (p, c))| Rule::new(i as RuleId + 1, p.iter().copied(), *c).unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn test_forward_score_uses_farthest_premise() {
        // a -> b, b -> c, {a, c} -> d: d(a, d) = 1 through rule 3
        let set = rules(&[(&["a"], "b"), (&["b"], "c"), (&["a", "c"], "d")]);
        let fpg = FactGraph::build(&set);

        assert_eq!(forward_fpg_score(&fpg, set.get(3).unwrap()), Distance::Finite(1));
        assert_eq!(forward_fpg_score(&fpg, set.get(1).unwrap()), Distance::Finite(1));
    }

    #[test]
    fn test_backward_score_runs_from_goal() {
        let set = rules(&[(&["a"], "b"), (&["b"], "a")]);
        let fpg = FactGraph::build(&set);

        // goal b, premise a: b -> a exists through rule 2
        assert_eq!(backward_fpg_score(&fpg, "b", set.get(1).unwrap()), Distance::Finite(1));

        let acyclic = rules(&[(&["a"], "b")]);
        let fpg = FactGraph::build(&acyclic);
        assert_eq!(
            backward_fpg_score(&fpg, "b", acyclic.get(1).unwrap()),
            Distance::Infinite
        );
    }

    #[test]
    fn test_rpg_score_counts_descendants() {
        let set = rules(&[(&["a"], "b"), (&["b"], "c"), (&["c"], "d"), (&["x"], "y")]);
        let table = ScoreTable::rpg(&set);

        assert_eq!(table.get(0), Distance::Finite(2));
        assert_eq!(table.get(2), Distance::Finite(0));
        assert_eq!(table.get(3), Distance::Finite(0));
        assert_eq!(table.get(99), Distance::Infinite);
    }
}
