//! kbase CLI - command-line front end for the rule engine
//!
//! Loads a knowledge base from a file or a built-in sample, runs forward or
//! backward chaining, and prints traces, graphs and validation reports as
//! text or JSON. [`run`] writes to any `Write` so the commands can be driven
//! from tests.

pub mod error;

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};

use kbase_logic::{
    AgendaPolicy, EngineConfig, FactSet, Format, KnowledgeBase, LogicProof, RuleEngine, RuleOrder,
    Samples, SelectionPolicy, Severity,
};

pub use error::{Error, Result};

/// Propositional rule engine
#[derive(Parser, Debug)]
#[command(name = "kbase")]
#[command(version)]
#[command(about = "Forward and backward chaining over production rules", long_about = None)]
pub struct Cli {
    /// Knowledge-base file (text or JSON)
    #[arg(long, global = true, conflicts_with = "sample")]
    pub kb: Option<PathBuf>,

    /// Built-in knowledge base: forward, backward or triangle
    #[arg(long, global = true)]
    pub sample: Option<String>,

    /// Initial facts, replacing the GT of the knowledge base
    #[arg(long, global = true, value_delimiter = ',')]
    pub facts: Option<Vec<String>>,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Agenda discipline: queue or stack
    #[arg(long, global = true)]
    pub agenda: Option<AgendaPolicy>,

    /// Forward rule selection: min, max, fpg, rpg or agenda
    #[arg(long, global = true)]
    pub select: Option<SelectionPolicy>,

    /// Backward candidate order: min, max or fpg
    #[arg(long, global = true)]
    pub order: Option<RuleOrder>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands of `kbase`.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Saturate the facts by forward chaining
    Forward {
        /// Stop as soon as this atom is derived
        #[arg(long)]
        goal: Option<String>,

        /// Only use the rules relevant to the goals
        #[arg(long)]
        relevant: bool,
    },

    /// Prove goals by backward chaining
    Backward {
        /// Goal to prove; defaults to the KL of the knowledge base
        #[arg(long)]
        goal: Option<String>,

        /// Print the extracted proof instead of the search log
        #[arg(long)]
        proof: bool,
    },

    /// Print a precedence graph
    Graph {
        /// Facts (fpg) or rules (rpg) precedence graph
        #[arg(value_enum)]
        kind: GraphArg,

        /// Restrict the FPG to the rules relevant to the goals
        #[arg(long)]
        relevant: bool,

        /// Print Graphviz DOT (takes precedence over --json)
        #[arg(long)]
        dot: bool,
    },

    /// List the rules that can contribute to the goals
    Relevant {
        /// Goal atom; defaults to the KL of the knowledge base
        #[arg(long)]
        goal: Option<String>,
    },

    /// Run the static rule-set checks
    Check,

    /// Print the normalized knowledge base
    Convert {
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        to: Format,
    },
}

/// Graph selector for `kbase graph`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphArg {
    /// Facts Precedence Graph
    Fpg,
    /// Rules Precedence Graph
    Rpg,
}

/// Loads the knowledge base named on the command line.
pub fn load_kb(cli: &Cli) -> Result<KnowledgeBase> {
    let mut kb = match (&cli.kb, &cli.sample) {
        (Some(path), _) => KnowledgeBase::from_path(path)?,
        (None, Some(name)) => Samples::by_name(name).ok_or_else(|| {
            Error::Usage(format!(
                "unknown sample '{}', expected one of {}",
                name,
                Samples::NAMES.join(", ")
            ))
        })?,
        (None, None) => return Err(Error::Usage("either --kb or --sample is required".into())),
    };

    if let Some(facts) = &cli.facts {
        kb.facts = facts
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
    }
    debug!(
        "Loaded {} rules, {} facts, {} goals",
        kb.rules.len(),
        kb.facts.len(),
        kb.goals.len()
    );
    Ok(kb)
}

/// Builds the engine configuration: file, then environment, then flags.
pub fn engine_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env();

    if let Some(agenda) = cli.agenda {
        config.agenda = agenda;
    }
    if let Some(selection) = cli.select {
        config.selection = selection;
    }
    if let Some(order) = cli.order {
        config.backward_order = order;
    }
    config.validate()?;
    Ok(config)
}

/// Executes the parsed command, writing its report to `out`.
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<()> {
    let kb = load_kb(cli)?;
    let engine = RuleEngine::from(&kb).with_config(engine_config(cli)?);

    match &cli.command {
        Command::Forward { goal, relevant } => {
            forward(cli, &engine, &kb, goal.as_deref(), *relevant, out)
        }
        Command::Backward { goal, proof } => {
            backward(cli, &engine, &kb, goal.as_deref(), *proof, out)
        }
        Command::Graph {
            kind,
            relevant,
            dot,
        } => graph(cli, &engine, &kb, *kind, *relevant, *dot, out),
        Command::Relevant { goal } => list_relevant(cli, &engine, &kb, goal.as_deref(), out),
        Command::Check => check(cli, &engine, &kb, out),
        Command::Convert { to } => {
            let doc = match to {
                Format::Text => kb.to_text(),
                Format::Json => kb.to_json()?,
            };
            write!(out, "{}", doc)?;
            if !doc.ends_with('\n') {
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

fn goals_of(kb: &KnowledgeBase, goal: Option<&str>) -> FactSet {
    match goal {
        Some(g) => [g.to_string()].into_iter().collect(),
        None => kb.goals.clone(),
    }
}

fn forward(
    cli: &Cli,
    engine: &RuleEngine,
    kb: &KnowledgeBase,
    goal: Option<&str>,
    relevant: bool,
    out: &mut impl Write,
) -> Result<()> {
    let result = if relevant {
        let goals = goals_of(kb, goal);
        if goals.is_empty() {
            return Err(Error::Usage("--relevant needs a goal".into()));
        }
        engine.forward_chain_relevant(&kb.facts, &goals)?
    } else {
        engine.forward_chain(&kb.facts, goal)?
    };
    info!("Forward chaining fired {} rules", result.count());

    if cli.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
        return Ok(());
    }

    for firing in &result.firings {
        writeln!(out, "{}", firing)?;
    }
    writeln!(out, "facts = {}", braced(result.facts.iter()))?;
    let trace: Vec<String> = result
        .trace
        .iter()
        .map(|(id, atom)| format!("r{} {}", id, atom))
        .collect();
    writeln!(out, "trace = [{}]", trace.join(", "))?;
    if let Some(reached) = result.reached_goal {
        let target = goal.map(str::to_string).unwrap_or_else(|| braced(kb.goals.iter()));
        writeln!(
            out,
            "goal {}: {}",
            target,
            if reached { "reached" } else { "not reached" }
        )?;
    }
    Ok(())
}

fn backward(
    cli: &Cli,
    engine: &RuleEngine,
    kb: &KnowledgeBase,
    goal: Option<&str>,
    proof: bool,
    out: &mut impl Write,
) -> Result<()> {
    let goals = goals_of(kb, goal);
    if goals.is_empty() {
        return Err(Error::Usage("no goal given and the knowledge base has no KL".into()));
    }

    if proof {
        let proofs: Vec<LogicProof> = goals
            .iter()
            .map(|g| engine.prove(g, &kb.facts))
            .collect::<kbase_logic::Result<_>>()?;
        if cli.json {
            writeln!(out, "{}", serde_json::to_string_pretty(&proofs)?)?;
        } else {
            for p in &proofs {
                writeln!(out, "{}", p)?;
            }
        }
        return Ok(());
    }

    let results = engine.backward_chain_all(&goals, &kb.facts)?;
    if cli.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&results)?)?;
        return Ok(());
    }

    for result in &results {
        writeln!(out, "{}", result.explain())?;
        let trace: Vec<String> = result
            .trace()
            .iter()
            .map(|(id, atom)| format!("r{} {}", id, atom))
            .collect();
        writeln!(
            out,
            "goal {}: {} (rules tried {}, backtracks {})",
            result.goal,
            if result.proven { "proven" } else { "not proven" },
            result.rules_tried,
            result.backtracks
        )?;
        if result.proven {
            writeln!(out, "trace = [{}]", trace.join(", "))?;
        }
    }
    Ok(())
}

fn graph(
    cli: &Cli,
    engine: &RuleEngine,
    kb: &KnowledgeBase,
    kind: GraphArg,
    relevant: bool,
    dot: bool,
    out: &mut impl Write,
) -> Result<()> {
    let view = match kind {
        GraphArg::Fpg if relevant => engine.relevant_fact_graph(&kb.goals).view(&kb.facts, &kb.goals),
        GraphArg::Fpg => engine.fact_graph().view(&kb.facts, &kb.goals),
        GraphArg::Rpg => {
            if relevant {
                return Err(Error::Usage("--relevant applies to the fpg only".into()));
            }
            engine.rule_graph().view(&kb.facts, &kb.goals)
        }
    };

    if dot {
        write!(out, "{}", view.to_dot())?;
    } else if cli.json {
        writeln!(out, "{}", view.to_json()?)?;
    } else {
        for node in &view.nodes {
            writeln!(out, "{} [{:?}]", node.id, node.class)?;
        }
        for edge in &view.edges {
            writeln!(out, "{} -{}-> {}", edge.source, edge.label, edge.target)?;
        }
    }
    Ok(())
}

fn list_relevant(
    cli: &Cli,
    engine: &RuleEngine,
    kb: &KnowledgeBase,
    goal: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    let goals = goals_of(kb, goal);
    if goals.is_empty() {
        return Err(Error::Usage("no goal given and the knowledge base has no KL".into()));
    }
    let ids = engine.relevant_rules(&goals);

    if cli.json {
        writeln!(out, "{}", serde_json::to_string(&ids)?)?;
        return Ok(());
    }
    for id in ids {
        if let Some(rule) = engine.rules().get(id) {
            writeln!(out, "{}", rule)?;
        }
    }
    Ok(())
}

fn check(cli: &Cli, engine: &RuleEngine, kb: &KnowledgeBase, out: &mut impl Write) -> Result<()> {
    let report = engine.validate(&kb.facts, &kb.goals);

    if cli.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else if report.issues.is_empty() {
        writeln!(out, "no issues")?;
    } else {
        for issue in &report.issues {
            writeln!(out, "{}", issue)?;
        }
    }

    let errors = report.of(Severity::Error).len();
    if errors > 0 {
        return Err(Error::Invalid(errors));
    }
    Ok(())
}

fn braced<'a>(atoms: impl Iterator<Item = &'a String>) -> String {
    format!("{{{}}}", atoms.map(String::as_str).collect::<Vec<_>>().join(", "))
}
