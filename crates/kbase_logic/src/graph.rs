//! Precedence graphs derived from a rule set
//!
//! - [`FactGraph`] (FPG): atom -> atom, one edge per premise of every rule,
//!   labelled with the rule id.
//! - [`RuleGraph`] (RPG): rule -> rule whenever the first rule's conclusion is
//!   a premise of the second, labelled with that atom.
//!
//! Both are rebuilt from scratch for each run and are read-only afterwards.
//! Distance queries never fail: an absent node or a missing path is
//! [`Distance::Infinite`].

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use petgraph::algo::{dijkstra, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rule::{Atom, FactSet, Rule, RuleId, RuleSet};

/// Unweighted shortest-path length, or `Infinite` when there is no path.
///
/// `Finite` values order before `Infinite`, so the type can be minimized or
/// maximized directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Distance {
    /// A path of this many edges exists.
    Finite(usize),
    /// No path, or one of the endpoints is not in the graph.
    Infinite,
}

impl Distance {
    /// Returns `true` for a reachable target.
    pub fn is_finite(&self) -> bool {
        matches!(self, Distance::Finite(_))
    }

    /// Number of edges, if reachable.
    pub fn steps(&self) -> Option<usize> {
        match self {
            Distance::Finite(n) => Some(*n),
            Distance::Infinite => None,
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Finite(n) => write!(f, "{}", n),
            Distance::Infinite => f.write_str("inf"),
        }
    }
}

fn path_length<N, E>(graph: &DiGraph<N, E>, start: NodeIndex, end: NodeIndex) -> Distance {
    dijkstra(graph, start, Some(end), |_| 1usize)
        .get(&end)
        .map_or(Distance::Infinite, |d| Distance::Finite(*d))
}

/// Ids of the rules that can contribute to any of `goals`.
///
/// Backward reachability fixed point: a rule is relevant when its conclusion
/// is in the frontier, and its premises then join the frontier.
pub fn relevant_rules(rules: &RuleSet, goals: &FactSet) -> BTreeSet<RuleId> {
    let mut relevant = BTreeSet::new();
    let mut frontier = goals.clone();
    let mut changed = true;

    while changed {
        changed = false;
        for rule in rules {
            if !relevant.contains(&rule.id) && frontier.contains(&rule.conclusion) {
                relevant.insert(rule.id);
                frontier.extend(rule.premises.iter().cloned());
                changed = true;
            }
        }
    }

    relevant
}

/// Facts Precedence Graph.
#[derive(Debug, Clone, Default)]
pub struct FactGraph {
    graph: DiGraph<Atom, RuleId>,
    nodes: IndexMap<Atom, NodeIndex>,
}

impl FactGraph {
    /// Builds the FPG over every rule.
    pub fn build(rules: &RuleSet) -> Self {
        Self::from_rules(rules.iter())
    }

    /// Builds the FPG over the rules relevant to `goals` only.
    pub fn build_relevant(rules: &RuleSet, goals: &FactSet) -> Self {
        let relevant = relevant_rules(rules, goals);
        Self::from_rules(rules.iter().filter(|r| relevant.contains(&r.id)))
    }

    fn from_rules<'a>(rules: impl Iterator<Item = &'a Rule>) -> Self {
        let mut fpg = Self::default();
        for rule in rules {
            let to = fpg.node(&rule.conclusion);
            for premise in &rule.premises {
                let from = fpg.node(premise);
                // several rules may justify one edge; the last one keeps the label
                fpg.graph.update_edge(from, to, rule.id);
            }
        }
        fpg
    }

    fn node(&mut self, atom: &str) -> NodeIndex {
        if let Some(idx) = self.nodes.get(atom) {
            return *idx;
        }
        let idx = self.graph.add_node(atom.to_string());
        self.nodes.insert(atom.to_string(), idx);
        idx
    }

    /// Shortest path length from `from` to `to`.
    pub fn distance(&self, from: &str, to: &str) -> Distance {
        match (self.nodes.get(from), self.nodes.get(to)) {
            (Some(&s), Some(&e)) => path_length(&self.graph, s, e),
            _ => Distance::Infinite,
        }
    }

    /// Returns `true` if the atom is a node of the graph.
    pub fn contains(&self, atom: &str) -> bool {
        self.nodes.contains_key(atom)
    }

    /// Atoms in first-seen order.
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.nodes.keys()
    }

    /// Rule id labelling the edge `from -> to`, if any.
    pub fn edge_rule(&self, from: &str, to: &str) -> Option<RuleId> {
        let (s, e) = (*self.nodes.get(from)?, *self.nodes.get(to)?);
        self.graph.find_edge(s, e).map(|edge| self.graph[edge])
    }

    /// All edges as `(premise, conclusion, rule id)`.
    pub fn edges(&self) -> Vec<(&Atom, &Atom, RuleId)> {
        self.graph
            .edge_references()
            .map(|e| (&self.graph[e.source()], &self.graph[e.target()], *e.weight()))
            .collect()
    }

    /// Number of atoms.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct premise/conclusion edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Classifies an atom against GT and KL; GT wins over KL.
    pub fn classify(atom: &str, facts: &FactSet, goals: &FactSet) -> NodeClass {
        if facts.contains(atom) {
            NodeClass::Fact
        } else if goals.contains(atom) {
            NodeClass::Goal
        } else {
            NodeClass::Derived
        }
    }

    /// Renderable snapshot with GT/KL node classes.
    pub fn view(&self, facts: &FactSet, goals: &FactSet) -> GraphView {
        let nodes = self
            .atoms()
            .map(|atom| ViewNode {
                id: atom.clone(),
                class: Self::classify(atom, facts, goals),
            })
            .collect();
        let edges = self
            .edges()
            .into_iter()
            .map(|(from, to, rule)| ViewEdge {
                source: from.clone(),
                target: to.clone(),
                label: format!("r{}", rule),
            })
            .collect();
        GraphView {
            kind: GraphKind::Facts,
            nodes,
            edges,
        }
    }
}

/// Rules Precedence Graph.
#[derive(Debug, Clone, Default)]
pub struct RuleGraph {
    graph: DiGraph<Rule, Atom>,
    nodes: IndexMap<RuleId, NodeIndex>,
}

impl RuleGraph {
    /// Builds the RPG. Every rule is a node, even without edges.
    ///
    /// Quadratic in the number of rules; rule sets are small.
    pub fn build(rules: &RuleSet) -> Self {
        let mut rpg = Self::default();
        for rule in rules {
            let idx = rpg.graph.add_node(rule.clone());
            rpg.nodes.insert(rule.id, idx);
        }
        for from in rules {
            for to in rules {
                if from.id != to.id && to.premises.contains(&from.conclusion) {
                    rpg.graph.add_edge(
                        rpg.nodes[&from.id],
                        rpg.nodes[&to.id],
                        from.conclusion.clone(),
                    );
                }
            }
        }
        rpg
    }

    /// Shortest path length between two rules.
    pub fn distance(&self, from: RuleId, to: RuleId) -> Distance {
        match (self.nodes.get(&from), self.nodes.get(&to)) {
            (Some(&s), Some(&e)) => path_length(&self.graph, s, e),
            _ => Distance::Infinite,
        }
    }

    /// Rules directly fed by `id`'s conclusion.
    pub fn successors(&self, id: RuleId) -> Vec<RuleId> {
        let Some(&idx) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut ids: Vec<RuleId> = self.graph.neighbors(idx).map(|n| self.graph[n].id).collect();
        ids.sort_unstable();
        ids
    }

    /// Rules transitively depending on `id`, excluding `id` itself.
    pub fn descendants(&self, id: RuleId) -> Vec<RuleId> {
        let Some(&start) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut dfs = Dfs::new(&self.graph, start);
        let mut ids = Vec::new();
        while let Some(node) = dfs.next(&self.graph) {
            if node != start {
                ids.push(self.graph[node].id);
            }
        }
        ids.sort_unstable();
        ids
    }

    /// Returns `true` if some rule transitively feeds itself.
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Rule ids in build order.
    pub fn rule_ids(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.nodes.keys().copied()
    }

    /// Classifies a rule of this graph against GT and KL.
    pub fn classify(&self, id: RuleId, facts: &FactSet, goals: &FactSet) -> Result<NodeClass> {
        let idx = self.nodes.get(&id).ok_or(Error::UnknownRule(id))?;
        Ok(Self::classify_rule(&self.graph[*idx], facts, goals))
    }

    /// GT-origin (premises all in GT) wins over KL-reaching (conclusion in KL).
    pub fn classify_rule(rule: &Rule, facts: &FactSet, goals: &FactSet) -> NodeClass {
        if rule.is_satisfied_by(facts) {
            NodeClass::GtOrigin
        } else if goals.contains(&rule.conclusion) {
            NodeClass::KlReaching
        } else {
            NodeClass::Intermediate
        }
    }

    /// Number of rules.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of rule-to-rule dependencies.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Renderable snapshot with GT-origin/KL-reaching classes.
    pub fn view(&self, facts: &FactSet, goals: &FactSet) -> GraphView {
        let nodes = self
            .graph
            .node_weights()
            .map(|rule| ViewNode {
                id: rule.label(),
                class: Self::classify_rule(rule, facts, goals),
            })
            .collect();
        let edges = self
            .graph
            .edge_references()
            .map(|e| ViewEdge {
                source: self.graph[e.source()].label(),
                target: self.graph[e.target()].label(),
                label: e.weight().clone(),
            })
            .collect();
        GraphView {
            kind: GraphKind::Rules,
            nodes,
            edges,
        }
    }
}

/// Which precedence graph a view was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphKind {
    /// Facts Precedence Graph.
    Facts,
    /// Rules Precedence Graph.
    Rules,
}

/// Node classification used for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// FPG atom in GT.
    Fact,
    /// FPG atom in KL.
    Goal,
    /// FPG atom that is neither.
    Derived,
    /// RPG rule whose premises are all in GT.
    GtOrigin,
    /// RPG rule concluding a KL atom.
    KlReaching,
    /// RPG rule that is neither.
    Intermediate,
}

/// A node of a [`GraphView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewNode {
    /// Atom, or rule label such as `r2`.
    pub id: String,
    /// Classification for display.
    pub class: NodeClass,
}

/// An edge of a [`GraphView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEdge {
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Rule label (FPG) or linking atom (RPG).
    pub label: String,
}

/// Node/edge lists handed to a rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphView {
    /// Graph the view was built from.
    pub kind: GraphKind,
    /// Nodes in build order.
    pub nodes: Vec<ViewNode>,
    /// Edges in build order.
    pub edges: Vec<ViewEdge>,
}

impl GraphView {
    /// Node ids with the given class.
    pub fn nodes_of(&self, class: NodeClass) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.class == class)
            .map(|n| n.id.as_str())
            .collect()
    }

    /// Serializes the view to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }

    /// Renders the view as a Graphviz digraph.
    pub fn to_dot(&self) -> String {
        let name = match self.kind {
            GraphKind::Facts => "FPG",
            GraphKind::Rules => "RPG",
        };
        let mut out = format!("digraph {} {{\n", name);
        for node in &self.nodes {
            out.push_str(&format!(
                "  \"{}\" [fillcolor=\"{}\", style=filled];\n",
                node.id,
                node.class.color()
            ));
        }
        for edge in &self.edges {
            out.push_str(&format!(
                "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
                edge.source, edge.target, edge.label
            ));
        }
        out.push_str("}\n");
        out
    }
}

impl NodeClass {
    /// Fill colour conventionally used for the class.
    pub fn color(&self) -> &'static str {
        match self {
            NodeClass::Fact => "#8da0cb",
            NodeClass::Goal => "#fc8d62",
            NodeClass::Derived => "#a6d854",
            NodeClass::GtOrigin => "#FF5722",
            NodeClass::KlReaching => "#4CAF50",
            NodeClass::Intermediate => "#2196F3",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::fact_set;

    fn rules(defs: &[(&[&str], &str)]) -> RuleSet {
        RuleSet::from_rules(
            defs.iter()
                .enumerate()
                .map(|(i, (p, c))| Rule::new(i as RuleId + 1, p.iter().copied(), *c).unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn test_fpg_distance_is_directed() {
        let fpg = FactGraph::build(&rules(&[(&["a"], "b"), (&["b"], "c")]));

        assert_eq!(fpg.distance("a", "c"), Distance::Finite(2));
        assert_eq!(fpg.distance("c", "a"), Distance::Infinite);
        assert_eq!(fpg.distance("a", "a"), Distance::Finite(0));
    }

    #[test]
    fn test_unknown_atoms_are_infinite() {
        let fpg = FactGraph::build(&rules(&[(&["a"], "b")]));
        assert_eq!(fpg.distance("a", "zzz"), Distance::Infinite);
        assert_eq!(fpg.distance("zzz", "b"), Distance::Infinite);
    }

    #[test]
    fn test_distance_ordering() {
        assert!(Distance::Finite(1_000) < Distance::Infinite);
        assert_eq!(
            [Distance::Finite(2), Distance::Infinite, Distance::Finite(1)]
                .into_iter()
                .max(),
            Some(Distance::Infinite)
        );
    }

    #[test]
    fn test_fpg_edges_carry_rule_labels() {
        let fpg = FactGraph::build(&rules(&[(&["a", "b"], "c"), (&["a"], "c")]));

        assert_eq!(fpg.node_count(), 3);
        assert_eq!(fpg.edge_count(), 2);
        // rule 2 rewrites the label of a -> c
        assert_eq!(fpg.edge_rule("a", "c"), Some(2));
        assert_eq!(fpg.edge_rule("b", "c"), Some(1));
    }

    #[test]
    fn test_rpg_edges() {
        let set = rules(&[(&["a", "b"], "c"), (&["a"], "b"), (&["c", "d"], "e"), (&["b"], "e")]);
        let rpg = RuleGraph::build(&set);

        assert_eq!(rpg.node_count(), 4);
        assert_eq!(rpg.successors(2), vec![1, 4]);
        assert_eq!(rpg.successors(1), vec![3]);
        assert_eq!(rpg.descendants(2), vec![1, 3, 4]);
        assert_eq!(rpg.distance(2, 3), Distance::Finite(2));
        assert_eq!(rpg.distance(3, 2), Distance::Infinite);
        assert!(!rpg.has_cycle());
    }

    #[test]
    fn test_rpg_cycle_detection() {
        let rpg = RuleGraph::build(&rules(&[(&["a"], "b"), (&["b"], "a")]));
        assert!(rpg.has_cycle());
        assert_eq!(rpg.descendants(1), vec![2]);
    }

    #[test]
    fn test_relevant_rules_excludes_unrelated() {
        let set = rules(&[
            (&["a"], "b"),
            (&["b"], "KL"),
            (&["x"], "y"),
            (&["b"], "z"),
        ]);
        let relevant = relevant_rules(&set, &fact_set(["KL"]));

        assert_eq!(relevant.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_relevant_fpg() {
        let set = rules(&[(&["a"], "b"), (&["x"], "y")]);
        let fpg = FactGraph::build_relevant(&set, &fact_set(["b"]));

        assert!(fpg.contains("a"));
        assert!(!fpg.contains("x"));
    }

    #[test]
    fn test_views_classify_nodes() {
        let set = rules(&[(&["a"], "b"), (&["b"], "c")]);
        let facts = fact_set(["a"]);
        let goals = fact_set(["c"]);

        let fpg = FactGraph::build(&set).view(&facts, &goals);
        assert_eq!(fpg.nodes_of(NodeClass::Fact), vec!["a"]);
        assert_eq!(fpg.nodes_of(NodeClass::Goal), vec!["c"]);
        assert_eq!(fpg.nodes_of(NodeClass::Derived), vec!["b"]);

        let rpg = RuleGraph::build(&set).view(&facts, &goals);
        assert_eq!(rpg.nodes_of(NodeClass::GtOrigin), vec!["r1"]);
        assert_eq!(rpg.nodes_of(NodeClass::KlReaching), vec!["r2"]);
        assert_eq!(rpg.edges[0].label, "b");
    }

    #[test]
    fn test_view_renders_dot() {
        let set = rules(&[(&["a"], "b")]);
        let dot = FactGraph::build(&set).view(&FactSet::new(), &FactSet::new()).to_dot();

        assert!(dot.starts_with("digraph FPG {"));
        assert!(dot.contains("\"a\" -> \"b\" [label=\"r1\"]"));
    }

    #[test]
    fn test_classify_unknown_rule() {
        let rpg = RuleGraph::build(&rules(&[(&["a"], "b")]));
        assert!(rpg.classify(7, &FactSet::new(), &FactSet::new()).is_err());
    }
}
