//! Ambient run configuration (spec.md §2.1 addition): step budget, strategy
//! choice, PRNG seed. This is *not* a DSL for the system-under-test's
//! behavior — it configures our own exploration run, the same way
//! `ccos::config::types::AgentConfig` configures the orchestrator rather
//! than the plans it runs. `#[serde(default)]` fields throughout, nested
//! sub-configs, loadable from TOML — mirroring that module's shape.

use crate::strategy::{BreadthFirst, CoverageGuided, DepthFirst, Random, Strategy, Weighted};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse agent config: {0}")]
    Parse(#[from] toml::de::Error),
}

fn default_max_steps() -> usize {
    100
}

/// Top-level configuration for an [`crate::agent::Agent`] run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Hard cap on the number of actions executed in one `explore()` call
    /// (spec.md §4.9 step 2, P6).
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub strategy: StrategyConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            strategy: StrategyConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

/// Which built-in [`Strategy`] to instantiate, and its parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    BreadthFirst,
    DepthFirst,
    Random {
        #[serde(default)]
        seed: u64,
    },
    Weighted {
        #[serde(default)]
        seed: u64,
        #[serde(default)]
        weights: BTreeMap<String, f64>,
    },
    CoverageGuided,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::BreadthFirst
    }
}

impl StrategyConfig {
    /// Instantiate the strategy this config describes. BFS is the only
    /// built-in that guarantees P8 (full determinism across runs with a
    /// fixed initial frontier) without also pinning a PRNG seed.
    pub fn build(&self) -> Box<dyn Strategy> {
        match self {
            StrategyConfig::BreadthFirst => Box::new(BreadthFirst::default()),
            StrategyConfig::DepthFirst => Box::new(DepthFirst::default()),
            StrategyConfig::Random { seed } => Box::new(Random::new(*seed)),
            StrategyConfig::Weighted { seed, weights } => Box::new(Weighted::new(weights.clone(), *seed)),
            StrategyConfig::CoverageGuided => Box::new(CoverageGuided::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_breadth_first_with_100_steps() {
        let config = AgentConfig::default();
        assert_eq!(config.max_steps, 100);
        assert_eq!(config.strategy, StrategyConfig::BreadthFirst);
    }

    #[test]
    fn parses_from_toml() {
        let toml = r#"
            max_steps = 30

            [strategy]
            kind = "random"
            seed = 7
        "#;
        let config = AgentConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.max_steps, 30);
        assert_eq!(config.strategy, StrategyConfig::Random { seed: 7 });
    }

    #[test]
    fn missing_strategy_falls_back_to_default() {
        let config = AgentConfig::from_toml_str("max_steps = 10").unwrap();
        assert_eq!(config.strategy, StrategyConfig::BreadthFirst);
    }
}
