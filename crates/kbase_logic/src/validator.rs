//! Rule-set validator
//!
//! Static checks over a knowledge base, run before inference:
//! - self-referencing rules that can never fire
//! - duplicate rules
//! - goals nothing can derive
//! - dependency cycles between rules
//! - premises that are neither given nor derivable

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::RuleGraph;
use crate::rule::RuleId;
use crate::store::KnowledgeBase;

/// How serious an [`Issue`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Worth knowing, harmless.
    Info,
    /// Probably a mistake in the rule set.
    Warning,
    /// Inference cannot succeed as posed.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Severity of the finding.
    pub severity: Severity,
    /// Offending rule, when the finding is about one rule.
    pub rule_id: Option<RuleId>,
    /// Human-readable description.
    pub message: String,
}

impl Issue {
    /// Creates an issue not tied to a rule.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            rule_id: None,
            message: message.into(),
        }
    }

    /// Attaches the offending rule.
    pub fn with_rule(mut self, rule_id: RuleId) -> Self {
        self.rule_id = Some(rule_id);
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule_id {
            Some(id) => write!(f, "[{}] r{}: {}", self.severity, id, self.message),
            None => write!(f, "[{}] {}", self.severity, self.message),
        }
    }
}

/// One static check over a knowledge base.
pub trait RuleCheck {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Appends findings to `issues`.
    fn check(&self, kb: &KnowledgeBase, issues: &mut Vec<Issue>);
}

/// Flags rules whose conclusion is also a premise.
pub struct SelfReference;

impl RuleCheck for SelfReference {
    fn name(&self) -> &'static str {
        "self_reference"
    }

    fn check(&self, kb: &KnowledgeBase, issues: &mut Vec<Issue>) {
        for rule in &kb.rules {
            if rule.premises.contains(&rule.conclusion) {
                issues.push(
                    Issue::new(
                        Severity::Warning,
                        format!("concludes its own premise {}, never fires", rule.conclusion),
                    )
                    .with_rule(rule.id),
                );
            }
        }
    }
}

/// Flags later rules repeating an earlier rule's premises and conclusion.
pub struct DuplicateRules;

impl RuleCheck for DuplicateRules {
    fn name(&self) -> &'static str {
        "duplicate_rules"
    }

    fn check(&self, kb: &KnowledgeBase, issues: &mut Vec<Issue>) {
        let mut seen: HashMap<(Vec<&str>, &str), RuleId> = HashMap::new();
        for rule in &kb.rules {
            let mut premises: Vec<&str> = rule.premises.iter().map(String::as_str).collect();
            premises.sort_unstable();
            let key = (premises, rule.conclusion.as_str());
            match seen.get(&key) {
                Some(first) => issues.push(
                    Issue::new(Severity::Warning, format!("duplicates r{}", first))
                        .with_rule(rule.id),
                ),
                None => {
                    seen.insert(key, rule.id);
                }
            }
        }
    }
}

/// Flags goals that are neither given nor concluded by any rule.
pub struct UnreachableGoals;

impl RuleCheck for UnreachableGoals {
    fn name(&self) -> &'static str {
        "unreachable_goals"
    }

    fn check(&self, kb: &KnowledgeBase, issues: &mut Vec<Issue>) {
        for goal in &kb.goals {
            if !kb.facts.contains(goal) && kb.rules.concluding(goal).next().is_none() {
                issues.push(Issue::new(
                    Severity::Error,
                    format!("goal {} is not a fact and no rule concludes it", goal),
                ));
            }
        }
    }
}

/// Reports rules that take part in an RPG cycle.
pub struct DependencyCycles;

impl RuleCheck for DependencyCycles {
    fn name(&self) -> &'static str {
        "dependency_cycles"
    }

    fn check(&self, kb: &KnowledgeBase, issues: &mut Vec<Issue>) {
        let rpg = RuleGraph::build(&kb.rules);
        if !rpg.has_cycle() {
            return;
        }
        for id in rpg.rule_ids() {
            let on_cycle = rpg
                .successors(id)
                .into_iter()
                .any(|next| next == id || rpg.descendants(next).contains(&id));
            if on_cycle {
                issues.push(
                    Issue::new(Severity::Warning, "part of a rule dependency cycle")
                        .with_rule(id),
                );
            }
        }
    }
}

/// Reports premises that are neither facts nor concluded by any rule.
pub struct UngroundedPremises;

impl RuleCheck for UngroundedPremises {
    fn name(&self) -> &'static str {
        "ungrounded_premises"
    }

    fn check(&self, kb: &KnowledgeBase, issues: &mut Vec<Issue>) {
        let concluded: HashSet<&str> = kb.rules.iter().map(|r| r.conclusion.as_str()).collect();
        for rule in &kb.rules {
            for premise in &rule.premises {
                if !kb.facts.contains(premise) && !concluded.contains(premise.as_str()) {
                    issues.push(
                        Issue::new(
                            Severity::Info,
                            format!("premise {} is never given nor derived", premise),
                        )
                        .with_rule(rule.id),
                    );
                }
            }
        }
    }
}

/// Runs a list of [`RuleCheck`]s.
pub struct RuleSetValidator {
    checks: Vec<Box<dyn RuleCheck>>,
}

impl RuleSetValidator {
    /// Creates a validator with every built-in check.
    pub fn new() -> Self {
        Self {
            checks: vec![
                Box::new(SelfReference),
                Box::new(DuplicateRules),
                Box::new(UnreachableGoals),
                Box::new(DependencyCycles),
                Box::new(UngroundedPremises),
            ],
        }
    }

    /// Creates a validator without checks.
    pub fn empty() -> Self {
        Self { checks: Vec::new() }
    }

    /// Adds a check.
    pub fn with_check(mut self, check: impl RuleCheck + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Runs every check in order.
    pub fn validate(&self, kb: &KnowledgeBase) -> ValidationReport {
        let mut issues = Vec::new();
        for check in &self.checks {
            let before = issues.len();
            check.check(kb, &mut issues);
            log::debug!("Check {}: {} issues", check.name(), issues.len() - before);
        }
        ValidationReport { issues }
    }
}

impl Default for RuleSetValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Findings of a validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Findings in check order.
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// `true` when there is no [`Severity::Error`] finding.
    pub fn is_valid(&self) -> bool {
        self.max_severity() < Some(Severity::Error)
    }

    /// Highest severity found.
    pub fn max_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }

    /// Findings of exactly the given severity.
    pub fn of(&self, severity: Severity) -> Vec<&Issue> {
        self.issues.iter().filter(|i| i.severity == severity).collect()
    }

    /// Findings about one rule.
    pub fn for_rule(&self, id: RuleId) -> Vec<&Issue> {
        self.issues.iter().filter(|i| i.rule_id == Some(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{fact_set, Rule, RuleSet};

    fn kb(rules: Vec<Rule>, facts: &[&str], goals: &[&str]) -> KnowledgeBase {
        KnowledgeBase::new(
            RuleSet::from_rules(rules).unwrap(),
            fact_set(facts.iter().copied()),
            fact_set(goals.iter().copied()),
        )
    }

    #[test]
    fn test_clean_rule_set() {
        let kb = kb(
            vec![
                Rule::new(1, ["a"], "b").unwrap(),
                Rule::new(2, ["b"], "c").unwrap(),
            ],
            &["a"],
            &["c"],
        );
        let report = RuleSetValidator::new().validate(&kb);

        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert!(report.is_valid());
    }

    #[test]
    fn test_self_reference_and_duplicates() {
        let kb = kb(
            vec![
                Rule::new(1, ["a", "b"], "b").unwrap(),
                Rule::new(2, ["a"], "c").unwrap(),
                Rule::new(3, ["a"], "c").unwrap(),
            ],
            &["a"],
            &[],
        );
        let report = RuleSetValidator::new().validate(&kb);

        assert!(report.for_rule(1).iter().any(|i| i.message.contains("own premise")));
        assert_eq!(report.for_rule(3)[0].message, "duplicates r2");
        assert!(report.is_valid());
    }

    #[test]
    fn test_unreachable_goal_is_an_error() {
        let kb = kb(vec![Rule::new(1, ["a"], "b").unwrap()], &["a"], &["z", "a"]);
        let report = RuleSetValidator::new().validate(&kb);

        assert!(!report.is_valid());
        assert_eq!(report.of(Severity::Error).len(), 1);
        assert_eq!(report.max_severity(), Some(Severity::Error));
    }

    #[test]
    fn test_cycle_members_reported() {
        let kb = kb(
            vec![
                Rule::new(1, ["a"], "b").unwrap(),
                Rule::new(2, ["b"], "a").unwrap(),
                Rule::new(3, ["b"], "c").unwrap(),
            ],
            &["a"],
            &[],
        );
        let report = RuleSetValidator::empty().with_check(DependencyCycles).validate(&kb);

        let ids: Vec<_> = report.issues.iter().filter_map(|i| i.rule_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_ungrounded_premise() {
        let kb = kb(vec![Rule::new(1, ["a", "q"], "b").unwrap()], &["a"], &[]);
        let report = RuleSetValidator::new().validate(&kb);

        let info = report.of(Severity::Info);
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].to_string(), "[info] r1: premise q is never given nor derived");
    }
}
