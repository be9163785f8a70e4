//! Rule engine facade
//!
//! The engine owns a rule snapshot and a configuration and nothing else:
//! every call creates its own fact set, agenda and search state, so one
//! engine can serve concurrent queries through `&self`.

use log::info;

use crate::backward::{BackwardChainResult, BackwardChainer};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::forward::{ForwardChainResult, ForwardChainer};
use crate::graph::{relevant_rules, FactGraph, RuleGraph};
use crate::proof::LogicProof;
use crate::rule::{FactSet, Rule, RuleId, RuleSet};
use crate::store::KnowledgeBase;
use crate::validator::{RuleSetValidator, ValidationReport};

/// Forward and backward chaining over one rule set.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: RuleSet,
    config: EngineConfig,
}

impl RuleEngine {
    /// Creates an engine without rules and with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine over `rules`.
    pub fn with_rules(rules: RuleSet) -> Self {
        Self {
            rules,
            config: EngineConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// The rule snapshot.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Appends a rule; fails on a duplicate id or a malformed rule.
    pub fn add_rule(&mut self, rule: Rule) -> Result<()> {
        self.rules.add(rule)
    }

    /// Runs forward chaining with the configured agenda and selection.
    pub fn forward_chain(&self, facts: &FactSet, goal: Option<&str>) -> Result<ForwardChainResult> {
        self.forward_chainer(&self.rules).run(facts, goal)
    }

    /// Runs forward chaining over the rules relevant to `goals` only.
    ///
    /// `reached_goal` reports whether every goal was derived.
    pub fn forward_chain_relevant(
        &self,
        facts: &FactSet,
        goals: &FactSet,
    ) -> Result<ForwardChainResult> {
        let scoped = self.relevant_subset(goals)?;
        let mut result = self.forward_chainer(&scoped).run(facts, None)?;
        result.reached_goal = Some(goals.iter().all(|g| result.facts.contains(g)));
        Ok(result)
    }

    /// Tries to prove `goal` with the configured candidate order.
    pub fn backward_chain(&self, goal: &str, facts: &FactSet) -> Result<BackwardChainResult> {
        BackwardChainer::new(&self.rules)
            .order(self.config.backward_order)
            .max_depth(self.config.max_depth)
            .prove(goal, facts)
    }

    /// Proves each goal independently from the same initial facts.
    pub fn backward_chain_all(
        &self,
        goals: &FactSet,
        facts: &FactSet,
    ) -> Result<Vec<BackwardChainResult>> {
        goals.iter().map(|g| self.backward_chain(g, facts)).collect()
    }

    /// Backward chaining followed by proof extraction.
    pub fn prove(&self, goal: &str, facts: &FactSet) -> Result<LogicProof> {
        let result = self.backward_chain(goal, facts)?;
        let mut proof = LogicProof::from_backward(&result, facts);
        proof
            .metadata
            .insert("order".to_string(), self.config.backward_order.to_string());
        proof.finalize();
        Ok(proof)
    }

    /// Builds the Facts Precedence Graph of the whole rule set.
    pub fn fact_graph(&self) -> FactGraph {
        FactGraph::build(&self.rules)
    }

    /// Builds the FPG restricted to the rules relevant to `goals`.
    pub fn relevant_fact_graph(&self, goals: &FactSet) -> FactGraph {
        FactGraph::build_relevant(&self.rules, goals)
    }

    /// Builds the Rules Precedence Graph.
    pub fn rule_graph(&self) -> RuleGraph {
        RuleGraph::build(&self.rules)
    }

    /// Ids of the rules that can contribute to `goals`, ascending.
    pub fn relevant_rules(&self, goals: &FactSet) -> Vec<RuleId> {
        relevant_rules(&self.rules, goals).into_iter().collect()
    }

    /// Runs the static rule-set checks against the given facts and goals.
    pub fn validate(&self, facts: &FactSet, goals: &FactSet) -> ValidationReport {
        let kb = KnowledgeBase::new(self.rules.clone(), facts.clone(), goals.clone());
        let report = RuleSetValidator::new().validate(&kb);
        info!("Validation found {} issues", report.issues.len());
        report
    }

    fn forward_chainer<'a>(&self, rules: &'a RuleSet) -> ForwardChainer<'a> {
        ForwardChainer::new(rules)
            .agenda(self.config.agenda)
            .selection(self.config.selection)
            .max_steps(self.config.max_steps)
    }

    fn relevant_subset(&self, goals: &FactSet) -> Result<RuleSet> {
        let relevant = relevant_rules(&self.rules, goals);
        RuleSet::from_rules(
            self.rules
                .iter()
                .filter(|r| relevant.contains(&r.id))
                .cloned(),
        )
    }
}

impl From<&KnowledgeBase> for RuleEngine {
    fn from(kb: &KnowledgeBase) -> Self {
        Self::with_rules(kb.rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::{AgendaPolicy, SelectionPolicy};
    use crate::rule::fact_set;
    use crate::samples::Samples;

    #[test]
    fn test_engine_creation() {
        let engine = RuleEngine::new();
        assert!(engine.rules().is_empty());
        assert_eq!(engine.config(), &EngineConfig::default());
    }

    #[test]
    fn test_config_drives_forward_chaining() {
        let kb = Samples::forward_demo();
        let engine = RuleEngine::from(&kb).with_config(EngineConfig {
            agenda: AgendaPolicy::Stack,
            selection: SelectionPolicy::Max,
            ..Default::default()
        });

        let result = engine.forward_chain(&kb.facts, Some("X")).unwrap();
        assert_eq!(result.reached_goal, Some(true));
    }

    #[test]
    fn test_relevant_scope_skips_unrelated_rules() {
        let mut engine = RuleEngine::with_rules(Samples::forward_demo().rules);
        engine.add_rule(Rule::new(5, ["A"], "noise").unwrap()).unwrap();

        let result = engine
            .forward_chain_relevant(&fact_set(["A", "E"]), &fact_set(["X"]))
            .unwrap();

        assert_eq!(result.reached_goal, Some(true));
        assert!(!result.facts.contains("noise"));
        assert_eq!(engine.relevant_rules(&fact_set(["X"])), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_prove_and_verify() {
        let kb = Samples::backward_demo();
        let engine = RuleEngine::from(&kb);
        let proof = engine.prove("f", &kb.facts).unwrap();

        assert!(proof.proven);
        assert_eq!(proof.metadata.get("order").map(String::as_str), Some("min"));
        let verdict = crate::proof::ProofVerifier::new().verify(&proof, engine.rules(), &kb.facts);
        assert!(verdict.is_valid, "{:?}", verdict.errors);
    }

    #[test]
    fn test_backward_chain_all() {
        let kb = Samples::backward_demo();
        let engine = RuleEngine::from(&kb);
        let results = engine
            .backward_chain_all(&fact_set(["f", "g"]), &kb.facts)
            .unwrap();

        assert!(results[0].proven);
        assert!(!results[1].proven);
    }

    #[test]
    fn test_validate_reports_goal() {
        let kb = Samples::triangle();
        let report = RuleEngine::from(&kb).validate(&kb.facts, &fact_set(["zzz"]));
        assert!(!report.is_valid());
    }
}
