//! Proof generation and verification
//!
//! A [`LogicProof`] is the minimal derivation of one goal, extracted from a
//! forward or backward run. It can be checked against a rule set and the
//! initial facts without re-running inference.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backward::BackwardChainResult;
use crate::error::{Error, Result};
use crate::forward::ForwardChainResult;
use crate::rule::{Atom, FactSet, RuleId, RuleSet};

/// The derivation of a goal atom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicProof {
    /// Identifier derived from the creation time.
    pub id: String,
    /// The atom this proof establishes.
    pub goal: Atom,
    /// Whether the run that produced the proof reached the goal.
    pub proven: bool,
    /// Initial facts first, then rule applications in dependency order.
    pub steps: Vec<InferenceStep>,
    /// When the proof was generated.
    pub timestamp: DateTime<Utc>,
    /// Hex digest of goal, steps and timestamp.
    pub hash: String,
    /// Free-form annotations such as the strategy used.
    pub metadata: BTreeMap<String, String>,
}

impl LogicProof {
    /// Creates an empty, unfinalized proof for `goal`.
    pub fn new(goal: impl Into<Atom>) -> Self {
        let timestamp = Utc::now();
        Self {
            id: format!(
                "proof_{:016x}",
                timestamp.timestamp_nanos_opt().unwrap_or_default()
            ),
            goal: goal.into(),
            proven: false,
            steps: Vec::new(),
            timestamp,
            hash: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Extracts the proof of a backward query.
    ///
    /// Derivations made in abandoned branches are dropped; only the steps
    /// the goal actually depends on are kept.
    pub fn from_backward(result: &BackwardChainResult, facts: &FactSet) -> Self {
        let derivations = result
            .proof
            .iter()
            .map(|s| (s.rule_id, s.premises.clone(), s.conclusion.clone(), s.depth));
        let mut proof = Self::assemble(&result.goal, result.proven, facts, derivations);
        proof.metadata.insert("mode".to_string(), "backward".to_string());
        proof.finalize();
        proof
    }

    /// Extracts the proof of `goal` from a forward run.
    pub fn from_forward(result: &ForwardChainResult, facts: &FactSet, goal: &str) -> Self {
        let derivations = result
            .firings
            .iter()
            .map(|s| (s.rule_id, s.premises.clone(), s.conclusion.clone(), s.step));
        let proven = result.facts.contains(goal);
        let mut proof = Self::assemble(goal, proven, facts, derivations);
        proof.metadata.insert("mode".to_string(), "forward".to_string());
        proof.finalize();
        proof
    }

    fn assemble(
        goal: &str,
        proven: bool,
        facts: &FactSet,
        derivations: impl DoubleEndedIterator<Item = (RuleId, Vec<Atom>, Atom, usize)>,
    ) -> Self {
        let mut proof = Self::new(goal);
        proof.proven = proven;
        if !proven {
            return proof;
        }

        // walk back from the goal, keeping the steps it depends on
        let mut needed: HashSet<Atom> = HashSet::from([goal.to_string()]);
        let mut kept = Vec::new();
        for (rule_id, premises, conclusion, depth) in derivations.rev() {
            if needed.remove(&conclusion) && !facts.contains(&conclusion) {
                needed.extend(premises.iter().cloned());
                kept.push(InferenceStep::inference(rule_id, premises, conclusion, depth));
            }
        }
        kept.reverse();

        let used_facts: Vec<&Atom> = facts
            .iter()
            .filter(|f| *f == goal || kept.iter().any(|s| s.premises.contains(*f)))
            .collect();
        for fact in used_facts {
            proof.add_step(InferenceStep::fact(fact.clone()));
        }
        for step in kept {
            proof.add_step(step);
        }
        proof
    }

    /// Appends a step, numbering it.
    pub fn add_step(&mut self, mut step: InferenceStep) {
        step.step_num = self.steps.len() + 1;
        self.steps.push(step);
    }

    /// Computes and stores the integrity hash.
    pub fn finalize(&mut self) {
        self.hash = self.compute_hash();
    }

    fn compute_hash(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.goal.hash(&mut hasher);
        self.proven.hash(&mut hasher);
        self.steps.hash(&mut hasher);
        self.timestamp.to_rfc3339().hash(&mut hasher);
        hex::encode(hasher.finish().to_be_bytes())
    }

    /// Maximum depth of any step.
    pub fn depth(&self) -> usize {
        self.steps.iter().map(|s| s.depth).max().unwrap_or(0)
    }

    /// Returns the number of steps in the proof.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if the proof contains no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Distinct rule ids applied, ascending.
    pub fn rules_used(&self) -> Vec<RuleId> {
        let mut rules: Vec<_> = self.steps.iter().filter_map(|s| s.rule_id).collect();
        rules.sort_unstable();
        rules.dedup();
        rules
    }

    /// Serializes the proof to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }

    /// Deserializes a proof from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::from)
    }
}

impl fmt::Display for LogicProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "proof of {} ({})",
            self.goal,
            if self.proven { "proven" } else { "not proven" }
        )?;
        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }
        Ok(())
    }
}

/// Kind of a proof step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepType {
    /// An initial fact.
    Fact,
    /// A rule application.
    Inference,
}

/// One step of a [`LogicProof`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InferenceStep {
    /// 1-based position in the proof.
    pub step_num: usize,
    /// Applied rule, `None` for facts.
    pub rule_id: Option<RuleId>,
    /// Kind of step.
    pub step_type: StepType,
    /// Atoms the step relies on.
    pub premises: Vec<Atom>,
    /// Atom the step establishes.
    pub conclusion: Atom,
    /// Recursion depth (backward) or firing number (forward).
    pub depth: usize,
}

impl InferenceStep {
    /// An initial fact.
    pub fn fact(atom: impl Into<Atom>) -> Self {
        Self {
            step_num: 0,
            rule_id: None,
            step_type: StepType::Fact,
            premises: Vec::new(),
            conclusion: atom.into(),
            depth: 0,
        }
    }

    /// A rule application.
    pub fn inference(rule_id: RuleId, premises: Vec<Atom>, conclusion: Atom, depth: usize) -> Self {
        Self {
            step_num: 0,
            rule_id: Some(rule_id),
            step_type: StepType::Inference,
            premises,
            conclusion,
            depth,
        }
    }
}

impl fmt::Display for InferenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule_id {
            Some(id) => write!(
                f,
                "{}. {} -> {} [r{}]",
                self.step_num,
                self.premises.join(" ^ "),
                self.conclusion,
                id
            ),
            None => write!(f, "{}. {} [fact]", self.step_num, self.conclusion),
        }
    }
}

/// Checks proofs against a rule set and the initial facts.
#[derive(Debug, Clone, Default)]
pub struct ProofVerifier {
    options: VerifyOptions,
}

impl ProofVerifier {
    /// Creates a verifier with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the verification options.
    pub fn with_options(mut self, options: VerifyOptions) -> Self {
        self.options = options;
        self
    }

    /// Verifies every step of `proof`.
    ///
    /// Facts must be initial facts. Rule steps must name an existing rule
    /// with the same premises and conclusion, and each premise must be an
    /// initial fact or the conclusion of an earlier step.
    pub fn verify(&self, proof: &LogicProof, rules: &RuleSet, facts: &FactSet) -> VerifyResult {
        let mut result = VerifyResult::new();

        if self.options.check_hash && !proof.hash.is_empty() && proof.hash != proof.compute_hash() {
            result.add_error("Proof hash mismatch - proof may have been tampered");
            return result;
        }

        let mut established: HashSet<&str> = HashSet::new();
        for step in &proof.steps {
            match (step.step_type, step.rule_id) {
                (StepType::Fact, _) => {
                    if !facts.contains(&step.conclusion) {
                        result.add_error(&format!(
                            "Step {}: {} is not an initial fact",
                            step.step_num, step.conclusion
                        ));
                    }
                }
                (StepType::Inference, None) => {
                    result.add_error(&format!("Step {}: no rule given", step.step_num));
                }
                (StepType::Inference, Some(id)) => {
                    self.verify_inference(step, id, rules, facts, &established, &mut result);
                }
            }
            established.insert(step.conclusion.as_str());
        }

        if proof.proven && !facts.contains(&proof.goal) && !established.contains(proof.goal.as_str()) {
            result.add_error(&format!("No step establishes the goal {}", proof.goal));
        }
        if self.options.max_depth.is_some_and(|max| proof.depth() > max) {
            result.add_warning("Proof is deeper than the configured limit");
        }

        result.is_valid = result.errors.is_empty();
        result
    }

    fn verify_inference(
        &self,
        step: &InferenceStep,
        id: RuleId,
        rules: &RuleSet,
        facts: &FactSet,
        established: &HashSet<&str>,
        result: &mut VerifyResult,
    ) {
        let Some(rule) = rules.get(id) else {
            result.add_error(&format!("Step {}: unknown rule r{}", step.step_num, id));
            return;
        };
        if rule.conclusion != step.conclusion {
            result.add_error(&format!(
                "Step {}: r{} concludes {}, not {}",
                step.step_num, id, rule.conclusion, step.conclusion
            ));
        }
        let claimed: HashSet<&str> = step.premises.iter().map(String::as_str).collect();
        let actual: HashSet<&str> = rule.premises.iter().map(String::as_str).collect();
        if claimed != actual {
            result.add_error(&format!(
                "Step {}: premises do not match r{}",
                step.step_num, id
            ));
        }
        for premise in &step.premises {
            if !facts.contains(premise) && !established.contains(premise.as_str()) {
                result.add_error(&format!(
                    "Step {}: premise {} is not established",
                    step.step_num, premise
                ));
            }
        }
    }
}

/// Options controlling [`ProofVerifier`].
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Compare the stored hash with a recomputed one.
    pub check_hash: bool,
    /// Warn when the proof is deeper than this.
    pub max_depth: Option<usize>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            check_hash: true,
            max_depth: None,
        }
    }
}

/// The outcome of a proof verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    /// `true` if the proof passed all checks.
    pub is_valid: bool,
    /// Problems that invalidate the proof.
    pub errors: Vec<String>,
    /// Notes that do not invalidate it.
    pub warnings: Vec<String>,
}

impl VerifyResult {
    /// Creates a valid, empty result.
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Records an error and marks the proof invalid.
    pub fn add_error(&mut self, msg: &str) {
        self.is_valid = false;
        self.errors.push(msg.to_string());
    }

    /// Records a warning.
    pub fn add_warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }
}
