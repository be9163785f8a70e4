//! Engine configuration
//!
//! Loaded from TOML, then overridden by `KBASE_*` environment variables.
//! Command-line flags override both at the call site.

use std::path::Path;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::backward::{BackwardChainer, RuleOrder};
use crate::error::{Error, Result};
use crate::forward::{AgendaPolicy, ForwardChainer, SelectionPolicy};

/// Environment variable overriding [`EngineConfig::agenda`].
pub const ENV_AGENDA: &str = "KBASE_AGENDA";
/// Environment variable overriding [`EngineConfig::selection`].
pub const ENV_SELECTION: &str = "KBASE_SELECTION";
/// Environment variable overriding [`EngineConfig::backward_order`].
pub const ENV_BACKWARD_ORDER: &str = "KBASE_BACKWARD_ORDER";
/// Environment variable overriding [`EngineConfig::max_steps`].
pub const ENV_MAX_STEPS: &str = "KBASE_MAX_STEPS";
/// Environment variable overriding [`EngineConfig::max_depth`].
pub const ENV_MAX_DEPTH: &str = "KBASE_MAX_DEPTH";

/// Policies and safety limits for one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Forward chaining agenda discipline.
    pub agenda: AgendaPolicy,
    /// Forward chaining rule selection.
    pub selection: SelectionPolicy,
    /// Backward chaining candidate order.
    pub backward_order: RuleOrder,
    /// Maximum agenda selections per forward run.
    pub max_steps: usize,
    /// Maximum recursion depth per backward query.
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agenda: AgendaPolicy::Queue,
            selection: SelectionPolicy::Agenda,
            backward_order: RuleOrder::Min,
            max_steps: ForwardChainer::DEFAULT_MAX_STEPS,
            max_depth: BackwardChainer::DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Parses a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Defaults overridden by the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Applies `KBASE_*` overrides. Unparsable values are logged and skipped.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_from(&lookup, ENV_AGENDA, &mut self.agenda);
        override_from(&lookup, ENV_SELECTION, &mut self.selection);
        override_from(&lookup, ENV_BACKWARD_ORDER, &mut self.backward_order);
        override_from(&lookup, ENV_MAX_STEPS, &mut self.max_steps);
        override_from(&lookup, ENV_MAX_DEPTH, &mut self.max_depth);
    }

    /// Rejects zero limits.
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(Error::Config("max_steps must be positive".to_string()));
        }
        if self.max_depth == 0 {
            return Err(Error::Config("max_depth must be positive".to_string()));
        }
        Ok(())
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

fn override_from<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(e) => warn!("Ignoring {}={:?}: {}", key, raw, e),
    }
}
