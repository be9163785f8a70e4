//! kbase Logic - Propositional Rule Engine
//!
//! This crate reasons over production rules `premises -> conclusion` whose
//! atoms are opaque tokens. Given initial facts (GT) and goals (KL) it can
//! saturate the facts by forward chaining, prove a goal by backward chaining
//! with backtracking, and describe the rule set through two precedence
//! graphs that also drive the rule-selection heuristics.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Rule Engine                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │                   Rule Store                          │   │
//! │  │  Text │ JSON │ Id assignment │ Knowledge bases       │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                           │                                  │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │              Dependency Graphs                        │   │
//! │  │  FPG (atoms) │ RPG (rules) │ Distance │ Relevance    │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                           │                                  │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │                   Chaining                            │   │
//! │  │  Forward (agenda) │ Backward (backtracking) │ Proofs │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                                                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use kbase_logic::{fact_set, KnowledgeBase, RuleEngine};
//!
//! let kb = KnowledgeBase::parse("A^B->C\nC->D\nE->B\nD^E->X\nGT = A, E\nKL = X");
//! let engine = RuleEngine::from(&kb);
//!
//! let forward = engine.forward_chain(&kb.facts, Some("X")).unwrap();
//! assert_eq!(forward.reached_goal, Some(true));
//!
//! let backward = engine.backward_chain("X", &fact_set(["A", "E"])).unwrap();
//! assert!(backward.proven);
//! ```

pub mod backward;
pub mod config;
pub mod engine;
pub mod error;
pub mod forward;
pub mod graph;
pub mod heuristic;
pub mod proof;
pub mod rule;
pub mod samples;
pub mod store;
pub mod validator;

// Re-exports
pub use backward::{BackwardChainResult, BackwardChainer, ProofStep, RuleOrder, SearchEvent};
pub use config::EngineConfig;
pub use engine::RuleEngine;
pub use error::{Error, Result};
pub use forward::{AgendaPolicy, FiringStep, ForwardChainResult, ForwardChainer, SelectionPolicy};
pub use graph::{relevant_rules, Distance, FactGraph, GraphView, NodeClass, RuleGraph};
pub use proof::{InferenceStep, LogicProof, ProofVerifier, VerifyResult};
pub use rule::{fact_set, Atom, FactSet, Rule, RuleId, RuleSet};
pub use samples::Samples;
pub use store::{Format, KnowledgeBase, RuleStore};
pub use validator::{Issue, RuleSetValidator, Severity, ValidationReport};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
