//! Rule store: normalizes raw rule sources into a canonical [`RuleSet`].
//!
//! Two source shapes are understood:
//!
//! ```text
//! # text: one rule per line, optional tab-separated id
//! 1	a^b->c
//! c d -> e
//! GT = a, b
//! KL = e
//! ```
//!
//! and JSON, either an array of `{id, antecedent, consequent}` objects or an
//! object `{rules, facts|GT, goals|KL}`. Antecedents split on `^`, `∧`, `,`,
//! whitespace and brackets; a consequent is always one atom (separators inside
//! it are folded into a caret-joined token).
//!
//! Parsing is best effort: malformed rules and unrecognized lines are dropped
//! with a warning and an unreadable source yields an empty set. Callers must
//! read an empty result as "unknown", not as "proven empty". The `*_strict`
//! entry points report unreadable sources as errors instead.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rule::{Atom, FactSet, Rule, RuleId, RuleSet};

/// Separators accepted between antecedent atoms.
static ATOM_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,\^∧{}\[\]()]+").expect("valid separator regex"));

/// Atoms listed on `GT = ...` / `KL = ...` lines.
static LISTED_ATOM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("valid atom regex"));

/// On-disk representation of a rule source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// `id<TAB>premises->conclusion` lines plus `GT`/`KL` lines.
    Text,
    /// JSON object with `rules`, `facts` and `goals`.
    Json,
}

impl Format {
    /// Guesses the format from the first non-blank character.
    pub fn detect(raw: &str) -> Self {
        match raw.trim_start().chars().next() {
            Some('[') | Some('{') => Format::Json,
            _ => Format::Text,
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => Err(Error::Parse(format!("unknown format '{}'", other))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Text => f.write_str("text"),
            Format::Json => f.write_str("json"),
        }
    }
}

/// Entry points for turning raw sources into rule sets and back.
pub struct RuleStore;

impl RuleStore {
    /// Normalizes any supported source into a rule set. Never fails.
    pub fn normalize(raw: &str) -> RuleSet {
        KnowledgeBase::parse(raw).rules
    }

    /// Renders rules in the requested format.
    ///
    /// Ids are written 1..N in list order, so for any well-formed source
    /// `normalize(serialize(normalize(x))) == normalize(x)`.
    pub fn serialize(rules: &RuleSet, format: Format) -> String {
        let kb = KnowledgeBase::new(rules.clone(), FactSet::new(), FactSet::new());
        match format {
            Format::Text => kb.to_text(),
            Format::Json => {
                let rules = kb.sequential_rules();
                serde_json::to_string_pretty(&JsonRuleOut::all(&rules))
                    .unwrap_or_else(|_| "[]".to_string())
            }
        }
    }

    /// Tokenizes an antecedent string into premise atoms.
    pub fn split_premises(raw: &str) -> Vec<Atom> {
        ATOM_SEPARATORS
            .split(raw)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Folds a consequent string into a single atom.
    pub fn join_conclusion(raw: &str) -> Atom {
        Self::split_premises(raw).join("^")
    }
}

/// Rules together with the GT (initial facts) and KL (goals) of one problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    /// The normalized rules.
    pub rules: RuleSet,
    /// Initial known facts (GT).
    pub facts: FactSet,
    /// Goal facts (KL).
    pub goals: FactSet,
}

impl KnowledgeBase {
    /// Creates a knowledge base from its parts.
    pub fn new(rules: RuleSet, facts: FactSet, goals: FactSet) -> Self {
        Self {
            rules,
            facts,
            goals,
        }
    }

    /// Best-effort parse; an unreadable source yields an empty knowledge base.
    pub fn parse(raw: &str) -> Self {
        match Self::parse_strict(raw) {
            Ok(kb) => kb,
            Err(e) => {
                warn!("Unreadable rule source, treating as empty: {}", e);
                Self::default()
            }
        }
    }

    /// Parses a source, reporting unreadable input as [`Error::Parse`].
    ///
    /// Malformed rules and unrecognized lines are still skipped rather than
    /// reported; only a source with nothing readable fails.
    pub fn parse_strict(raw: &str) -> Result<Self> {
        match Format::detect(raw) {
            // `[a, b] -> c` is a text rule that merely looks like JSON
            Format::Json => parse_json(raw).or_else(|json_err| {
                debug!("Not JSON, retrying as text: {}", json_err);
                parse_text(raw).map_err(|_| json_err)
            }),
            Format::Text => parse_text(raw),
        }
    }

    /// Reads and parses a knowledge-base file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded {} bytes from {}", raw.len(), path.display());
        Self::parse_strict(&raw)
    }

    /// Writes the knowledge base to a file in the given format.
    pub fn save(&self, path: impl AsRef<Path>, format: Format) -> Result<()> {
        let body = match format {
            Format::Text => self.to_text(),
            Format::Json => self.to_json()?,
        };
        std::fs::write(path.as_ref(), body)?;
        Ok(())
    }

    /// Renders the text format. Rule ids are renumbered 1..N in list order.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for rule in self.sequential_rules().iter() {
            let premises: Vec<&str> = rule.premises.iter().map(String::as_str).collect();
            out.push_str(&format!(
                "{}\t{}->{}\n",
                rule.id,
                premises.join("^"),
                rule.conclusion
            ));
        }
        if !self.facts.is_empty() {
            out.push_str(&format!("GT = {}\n", sorted_atoms(&self.facts).join(", ")));
        }
        if !self.goals.is_empty() {
            out.push_str(&format!("KL = {}\n", sorted_atoms(&self.goals).join(", ")));
        }
        out
    }

    /// Renders the JSON object format.
    pub fn to_json(&self) -> Result<String> {
        let rules = self.sequential_rules();
        let doc = JsonDocumentOut {
            rules: JsonRuleOut::all(&rules),
            facts: sorted_atoms(&self.facts),
            goals: sorted_atoms(&self.goals),
        };
        serde_json::to_string_pretty(&doc).map_err(Error::from)
    }

    fn sequential_rules(&self) -> RuleSet {
        let mut rules = self.rules.clone();
        if !rules.is_sequential() {
            rules.renumber();
        }
        rules
    }
}

fn sorted_atoms(atoms: &FactSet) -> Vec<&str> {
    let mut sorted: Vec<&str> = atoms.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted
}

/// A rule as read from a source, before validation and id assignment.
#[derive(Debug)]
struct RawRule {
    id: Option<String>,
    premises: Vec<Atom>,
    conclusion: Atom,
}

/// Validates raw rules and assigns ids.
///
/// Source ids are kept only when every rule carries one and together they
/// are exactly 1..N; the list is then ordered by id. Otherwise ids are
/// assigned 1..N in input order.
fn assemble(raw_rules: Vec<RawRule>) -> RuleSet {
    let mut kept = Vec::with_capacity(raw_rules.len());
    for (line, raw) in raw_rules.into_iter().enumerate() {
        if raw.premises.is_empty() || raw.conclusion.is_empty() {
            warn!(
                "Skipping malformed rule #{} ({:?} -> {:?})",
                line + 1,
                raw.premises,
                raw.conclusion
            );
            continue;
        }
        kept.push(raw);
    }

    let source_ids: Option<Vec<RuleId>> = kept
        .iter()
        .map(|r| r.id.as_deref().and_then(parse_rule_id))
        .collect();
    let n = kept.len();
    let ids: Vec<RuleId> = match source_ids {
        Some(ids) if is_permutation_of_range(&ids, n) => ids,
        _ => (1..=n as RuleId).collect(),
    };

    let mut rules: Vec<Rule> = kept
        .into_iter()
        .zip(ids)
        .map(|(raw, id)| Rule {
            id,
            premises: raw.premises.into_iter().collect(),
            conclusion: raw.conclusion,
        })
        .collect();
    rules.sort_by_key(|r| r.id);

    // ids are unique and every rule passed the emptiness checks above
    RuleSet::from_rules(rules).unwrap_or_default()
}

fn parse_rule_id(raw: &str) -> Option<RuleId> {
    let digits = raw.trim().trim_start_matches(['r', 'R']);
    digits.parse::<RuleId>().ok().filter(|id| *id > 0)
}

fn is_permutation_of_range(ids: &[RuleId], n: usize) -> bool {
    let mut seen = vec![false; n];
    for &id in ids {
        let slot = id as usize;
        if slot == 0 || slot > n || seen[slot - 1] {
            return false;
        }
        seen[slot - 1] = true;
    }
    true
}

fn parse_text(raw: &str) -> Result<KnowledgeBase> {
    let mut raw_rules = Vec::new();
    let mut facts = FactSet::new();
    let mut goals = FactSet::new();
    let mut skipped = 0;

    for (n, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(arrow) = line.find("->") {
            let (head, consequent) = (&line[..arrow], &line[arrow + 2..]);
            let (id, antecedent) = match head.split_once('\t') {
                Some((id, rest)) => (Some(id.trim().to_string()), rest),
                None => (None, head),
            };
            raw_rules.push(RawRule {
                id,
                premises: RuleStore::split_premises(antecedent),
                conclusion: RuleStore::join_conclusion(consequent),
            });
            continue;
        }

        let lower = line.to_lowercase();
        let listed = line.split_once('=').map(|(_, rest)| rest);
        match listed {
            Some(rest) if lower.starts_with("gt") => facts.extend(listed_atoms(rest)),
            Some(rest) if lower.starts_with("kl") => goals.extend(listed_atoms(rest)),
            _ => {
                warn!("Skipping line {}: not a rule, GT or KL: '{}'", n + 1, line);
                skipped += 1;
            }
        }
    }

    if skipped > 0 && raw_rules.is_empty() && facts.is_empty() && goals.is_empty() {
        return Err(Error::Parse(format!(
            "no rule, GT or KL line among {} non-blank lines",
            skipped
        )));
    }
    Ok(KnowledgeBase::new(assemble(raw_rules), facts, goals))
}

fn listed_atoms(raw: &str) -> impl Iterator<Item = Atom> + '_ {
    LISTED_ATOM.find_iter(raw).map(|m| m.as_str().to_string())
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    Rules(Vec<JsonRule>),
    Full(JsonKnowledgeBase),
}

#[derive(Debug, Deserialize)]
struct JsonKnowledgeBase {
    #[serde(default)]
    rules: Vec<JsonRule>,
    #[serde(default, alias = "GT", alias = "gt")]
    facts: Vec<String>,
    #[serde(default, alias = "KL", alias = "kl")]
    goals: Vec<String>,
}

/// Rule object; unknown fields such as `min`/`max` are ignored.
#[derive(Debug, Deserialize)]
struct JsonRule {
    #[serde(default)]
    id: Option<JsonId>,
    #[serde(alias = "premises", alias = "left")]
    antecedent: AtomList,
    #[serde(alias = "conclusion", alias = "right")]
    consequent: AtomList,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonId {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AtomList {
    One(String),
    Many(Vec<String>),
}

impl AtomList {
    fn premises(&self) -> Vec<Atom> {
        match self {
            AtomList::One(s) => RuleStore::split_premises(s),
            AtomList::Many(items) => items
                .iter()
                .flat_map(|s| RuleStore::split_premises(s))
                .collect(),
        }
    }

    fn conclusion(&self) -> Atom {
        match self {
            AtomList::One(s) => RuleStore::join_conclusion(s),
            AtomList::Many(items) => RuleStore::join_conclusion(&items.join("^")),
        }
    }
}

impl From<JsonRule> for RawRule {
    fn from(rule: JsonRule) -> Self {
        let id = rule.id.map(|id| match id {
            JsonId::Number(n) => n.to_string(),
            JsonId::Text(s) => s,
        });
        Self {
            id,
            premises: rule.antecedent.premises(),
            conclusion: rule.consequent.conclusion(),
        }
    }
}

fn parse_json(raw: &str) -> Result<KnowledgeBase> {
    let doc: JsonDocument =
        serde_json::from_str(raw).map_err(|e| Error::Parse(format!("invalid JSON rules: {}", e)))?;
    let (rules, facts, goals) = match doc {
        JsonDocument::Rules(rules) => (rules, Vec::new(), Vec::new()),
        JsonDocument::Full(kb) => (kb.rules, kb.facts, kb.goals),
    };
    let raw_rules = rules.into_iter().map(RawRule::from).collect();
    Ok(KnowledgeBase::new(
        assemble(raw_rules),
        facts.into_iter().collect(),
        goals.into_iter().collect(),
    ))
}

#[derive(Serialize)]
struct JsonDocumentOut<'a> {
    rules: Vec<JsonRuleOut<'a>>,
    facts: Vec<&'a str>,
    goals: Vec<&'a str>,
}

#[derive(Serialize)]
struct JsonRuleOut<'a> {
    id: RuleId,
    antecedent: Vec<&'a str>,
    consequent: &'a str,
}

impl<'a> JsonRuleOut<'a> {
    fn all(rules: &'a RuleSet) -> Vec<Self> {
        rules
            .iter()
            .map(|r| JsonRuleOut {
                id: r.id,
                antecedent: r.premises.iter().map(String::as_str).collect(),
                consequent: &r.conclusion,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::fact_set;

    #[test]
    fn test_text_with_ids_and_gt_kl() {
        let kb = KnowledgeBase::parse("1\ta^b->c\n2\tc->d\n\nGT = a, b\nKL = d\n");

        assert_eq!(kb.rules.len(), 2);
        let r1 = kb.rules.get(1).unwrap();
        assert_eq!(r1.premises.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(r1.conclusion, "c");
        assert_eq!(kb.facts, fact_set(["a", "b"]));
        assert_eq!(kb.goals, fact_set(["d"]));
    }

    #[test]
    fn test_text_separators() {
        let rules = RuleStore::normalize("a ∧ b , c -> x\n{d e} -> y\np^^q->z\n");

        assert_eq!(rules.len(), 3);
        assert_eq!(rules.get(1).unwrap().premises.len(), 3);
        assert_eq!(rules.get(2).unwrap().premises.len(), 2);
        assert_eq!(rules.get(3).unwrap().premises.len(), 2);
    }

    #[test]
    fn test_ids_assigned_when_absent() {
        let rules = RuleStore::normalize("a->b\nb->c\n");
        assert_eq!(rules.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_ids_renumbered_after_gap() {
        let rules = RuleStore::normalize("1\ta->b\n3\tb->c\n");
        assert_eq!(rules.get(2).unwrap().conclusion, "c");
        assert!(rules.get(3).is_none());
    }

    #[test]
    fn test_out_of_order_ids_are_kept_and_sorted() {
        let rules = RuleStore::normalize("2\tb->c\n1\ta->b\n");
        assert_eq!(rules.rules()[0].id, 1);
        assert_eq!(rules.rules()[0].conclusion, "b");
    }

    #[test]
    fn test_non_numeric_ids_renumbered() {
        let rules = RuleStore::normalize("x\ta->b\ny\tb->c\n");
        assert_eq!(rules.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_malformed_rules_are_dropped() {
        let rules = RuleStore::normalize("->b\na->\nc->d\n");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.get(1).unwrap().conclusion, "d");
    }

    #[test]
    fn test_consequent_is_single_atom() {
        let rules = RuleStore::normalize("a->c, d\n");
        assert_eq!(rules.get(1).unwrap().conclusion, "c^d");
    }

    #[test]
    fn test_json_array_form() {
        let raw = r#"[
            {"id": 1, "antecedent": "a^b", "consequent": "c", "min": 0, "max": 1},
            {"id": "2", "antecedent": ["c"], "consequent": ["d", "e"]}
        ]"#;
        let rules = RuleStore::normalize(raw);

        assert_eq!(rules.len(), 2);
        assert_eq!(rules.get(1).unwrap().premises.len(), 2);
        assert_eq!(rules.get(2).unwrap().conclusion, "d^e");
    }

    #[test]
    fn test_json_object_form() {
        let raw = r#"{"rules": [{"antecedent": "a", "consequent": "b"}],
                      "GT": ["a"], "KL": ["b"]}"#;
        let kb = KnowledgeBase::parse(raw);

        assert_eq!(kb.rules.len(), 1);
        assert_eq!(kb.facts, fact_set(["a"]));
        assert_eq!(kb.goals, fact_set(["b"]));
    }

    #[test]
    fn test_unreadable_source_is_empty() {
        assert!(RuleStore::normalize("[{ not json").is_empty());
        assert!(KnowledgeBase::parse_strict("[{ not json").is_err());
        assert!(KnowledgeBase::parse_strict("just some words").is_err());
    }

    #[test]
    fn test_bracketed_first_rule_is_text() {
        let rules = RuleStore::normalize("{a b} -> y\nc->d\n");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.get(1).unwrap().premises, fact_set(["a", "b"]));

        let rules = RuleStore::normalize("[a, b] -> y\n");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.get(1).unwrap().conclusion, "y");

        let kb = KnowledgeBase::parse_strict("[a] -> b\nGT = a\n").unwrap();
        assert_eq!(kb.facts, fact_set(["a"]));
    }

    #[test]
    fn test_unrecognized_lines_are_skipped() {
        let kb = KnowledgeBase::parse("Rules:\n1\ta^b->c\n2\tc->d\nGT = a, b\n");
        assert_eq!(kb.rules.len(), 2);
        assert_eq!(kb.facts, fact_set(["a", "b"]));

        let kb = KnowledgeBase::parse_strict("Rules:\na->b\nend of file\n").unwrap();
        assert_eq!(kb.rules.len(), 1);
    }

    #[test]
    fn test_serialize_is_idempotent() {
        let source = "3\ta b->c\n1\tc->d\n2\td^e->f\n";
        let once = RuleStore::normalize(source);

        let text = RuleStore::serialize(&once, Format::Text);
        assert_eq!(RuleStore::normalize(&text), once);

        let json = RuleStore::serialize(&once, Format::Json);
        assert_eq!(RuleStore::normalize(&json), once);
    }

    #[test]
    fn test_text_serialization_renumbers() {
        let rules = RuleSet::from_rules([
            Rule::new(5, ["a"], "b").unwrap(),
            Rule::new(9, ["b"], "c").unwrap(),
        ])
        .unwrap();
        let text = RuleStore::serialize(&rules, Format::Text);
        assert_eq!(text, "1\ta->b\n2\tb->c\n");
    }

    #[test]
    fn test_knowledge_base_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let kb = KnowledgeBase::parse("a^b->c\nGT = b, a\nKL = c\n");

        kb.save(&path, Format::Json).unwrap();
        let loaded = KnowledgeBase::from_path(&path).unwrap();

        assert_eq!(loaded, kb);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert_eq!(Format::detect("  [1]"), Format::Json);
        assert_eq!(Format::detect("a->b"), Format::Text);
        assert!("yaml".parse::<Format>().is_err());
    }
}
