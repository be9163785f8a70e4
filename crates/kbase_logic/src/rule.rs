//! Rule definitions for the inference engine
//!
//! A rule is a production `premises -> conclusion` over opaque atoms.
//! Rules live in a [`RuleSet`], an ordered list with an id lookup; list
//! order is what the engines iterate, so it decides tie-breaks.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An opaque fact token. Equality is exact, case-sensitive string match.
pub type Atom = String;

/// Identifier of a rule within a [`RuleSet`].
pub type RuleId = u32;

/// A set of atoms that remembers insertion order (GT, KL, derived facts).
pub type FactSet = IndexSet<Atom>;

/// Builds a [`FactSet`] from anything yielding string-like atoms.
pub fn fact_set<I, S>(atoms: I) -> FactSet
where
    I: IntoIterator<Item = S>,
    S: Into<Atom>,
{
    atoms.into_iter().map(Into::into).collect()
}

/// A production rule with a non-empty premise set and a single conclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Positive identifier, unique within its rule set.
    pub id: RuleId,
    /// Atoms that must all be known for the rule to fire.
    pub premises: IndexSet<Atom>,
    /// The atom the rule derives.
    pub conclusion: Atom,
}

impl Rule {
    /// Creates a validated rule.
    ///
    /// Fails with [`Error::InvalidRule`] when the id is zero, the premise set
    /// is empty, or any atom is blank.
    pub fn new<I, S>(id: RuleId, premises: I, conclusion: impl Into<Atom>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Atom>,
    {
        let rule = Self {
            id,
            premises: premises.into_iter().map(Into::into).collect(),
            conclusion: conclusion.into(),
        };
        rule.check()?;
        Ok(rule)
    }

    /// Starts a fluent builder for a rule with the given id.
    pub fn builder(id: RuleId) -> RuleBuilder {
        RuleBuilder::new(id)
    }

    /// Checks the structural invariants of the rule.
    pub fn check(&self) -> Result<()> {
        if self.id == 0 {
            return Err(Error::InvalidRule("rule ids start at 1".to_string()));
        }
        if self.premises.is_empty() {
            return Err(Error::InvalidRule(format!("r{} has no premises", self.id)));
        }
        if self.premises.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::InvalidRule(format!("r{} has a blank premise", self.id)));
        }
        if self.conclusion.trim().is_empty() {
            return Err(Error::InvalidRule(format!("r{} has no conclusion", self.id)));
        }
        Ok(())
    }

    /// Returns `true` if every premise is in `facts`.
    pub fn is_satisfied_by(&self, facts: &FactSet) -> bool {
        self.premises.iter().all(|p| facts.contains(p))
    }

    /// Returns `true` if the rule would derive something new from `facts`.
    pub fn can_fire(&self, facts: &FactSet) -> bool {
        !facts.contains(&self.conclusion) && self.is_satisfied_by(facts)
    }

    /// Short display label, e.g. `r3`.
    pub fn label(&self) -> String {
        format!("r{}", self.id)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let premises: Vec<&str> = self.premises.iter().map(String::as_str).collect();
        write!(f, "r{}: {} -> {}", self.id, premises.join(" ^ "), self.conclusion)
    }
}

/// A builder for creating `Rule`s using a fluent API.
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    id: RuleId,
    premises: IndexSet<Atom>,
    conclusion: Atom,
}

impl RuleBuilder {
    /// Creates a new `RuleBuilder` with a given ID.
    pub fn new(id: RuleId) -> Self {
        Self {
            id,
            premises: IndexSet::new(),
            conclusion: Atom::new(),
        }
    }

    /// Adds one premise.
    pub fn premise(mut self, atom: impl Into<Atom>) -> Self {
        self.premises.insert(atom.into());
        self
    }

    /// Adds several premises.
    pub fn premises<I, S>(mut self, atoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Atom>,
    {
        self.premises.extend(atoms.into_iter().map(Into::into));
        self
    }

    /// Sets the conclusion.
    pub fn conclusion(mut self, atom: impl Into<Atom>) -> Self {
        self.conclusion = atom.into();
        self
    }

    /// Validates and returns the final `Rule`.
    pub fn build(self) -> Result<Rule> {
        let rule = Rule {
            id: self.id,
            premises: self.premises,
            conclusion: self.conclusion,
        };
        rule.check()?;
        Ok(rule)
    }
}

/// An ordered collection of rules with an id lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Rule>", into = "Vec<Rule>")]
pub struct RuleSet {
    rules: Vec<Rule>,
    index: HashMap<RuleId, usize>,
}

impl RuleSet {
    /// Creates an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a rule set from rules in list order, rejecting duplicates.
    pub fn from_rules<I>(rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = Rule>,
    {
        let mut set = Self::new();
        for rule in rules {
            set.add(rule)?;
        }
        Ok(set)
    }

    /// Appends a rule at the end of the list.
    pub fn add(&mut self, rule: Rule) -> Result<()> {
        rule.check()?;
        if self.index.contains_key(&rule.id) {
            return Err(Error::DuplicateRule(rule.id));
        }
        self.index.insert(rule.id, self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    /// Replaces the rule with the same id in place, returning the old one.
    pub fn replace(&mut self, rule: Rule) -> Result<Rule> {
        rule.check()?;
        let pos = self.position(rule.id).ok_or(Error::UnknownRule(rule.id))?;
        Ok(std::mem::replace(&mut self.rules[pos], rule))
    }

    /// Removes a rule and renumbers the remaining ones 1..N.
    pub fn remove(&mut self, id: RuleId) -> Result<Rule> {
        let pos = self.position(id).ok_or(Error::UnknownRule(id))?;
        let removed = self.rules.remove(pos);
        self.renumber();
        Ok(removed)
    }

    /// Reassigns ids 1..N in list order.
    pub fn renumber(&mut self) {
        for (i, rule) in self.rules.iter_mut().enumerate() {
            rule.id = (i + 1) as RuleId;
        }
        self.reindex();
    }

    /// Returns `true` if ids are exactly 1..N in list order.
    pub fn is_sequential(&self) -> bool {
        self.rules
            .iter()
            .enumerate()
            .all(|(i, r)| r.id as usize == i + 1)
    }

    fn reindex(&mut self) {
        self.index = self
            .rules
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i))
            .collect();
    }

    /// Finds a rule by id.
    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.position(id).map(|pos| &self.rules[pos])
    }

    /// List position of a rule id.
    pub fn position(&self, id: RuleId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Iterates rules in list order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// The rules as a slice, in list order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules whose conclusion is `atom`, in list order.
    pub fn concluding<'a>(&'a self, atom: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.conclusion == atom)
    }

    /// Every atom mentioned by any rule, premises before conclusion.
    pub fn atoms(&self) -> FactSet {
        let mut atoms = FactSet::new();
        for rule in &self.rules {
            atoms.extend(rule.premises.iter().cloned());
            atoms.insert(rule.conclusion.clone());
        }
        atoms
    }

    /// The next unused id (one past the current maximum).
    pub fn next_id(&self) -> RuleId {
        self.rules.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }

    /// Count of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl TryFrom<Vec<Rule>> for RuleSet {
    type Error = Error;

    fn try_from(rules: Vec<Rule>) -> Result<Self> {
        Self::from_rules(rules)
    }
}

impl From<RuleSet> for Vec<Rule> {
    fn from(set: RuleSet) -> Self {
        set.rules
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
