//! Run parameters, loaded from and saved to JSON. Field names stay camelCase
//! on disk so existing configuration files keep working.

use crate::error::{CanopyError, Result};
use crate::tree::GenMethod;
use crate::SelectMethod;
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub population_size: usize,
    pub max_generations: usize,
    pub max_runs: usize,
    pub prob_crossover: f64,
    pub prob_mutation: f64,
    pub prob_reproduction: f64,
    pub min_depth: usize,
    pub max_depth: usize,
    pub gen_method: GenMethod,
    pub select_method: SelectMethod,
    pub tournament_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            population_size: 1000,
            max_generations: 100,
            max_runs: 10,
            prob_crossover: 0.8,
            prob_mutation: 0.1,
            prob_reproduction: 0.1,
            min_depth: 2,
            max_depth: 10,
            gen_method: GenMethod::Grow,
            select_method: SelectMethod::Tournament,
            tournament_size: 10,
        }
    }
}

impl Config {
    /// Load and validate a configuration from a JSON file. Anything that is
    /// not a mapping of the expected parameters is a load error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(CanopyError::Config(
                "populationSize must be at least 1".to_string(),
            ));
        }
        if self.min_depth == 0 {
            return Err(CanopyError::Config(
                "minDepth must be at least 1".to_string(),
            ));
        }
        if self.max_depth < self.min_depth {
            return Err(CanopyError::Config(
                "maxDepth must not be smaller than minDepth".to_string(),
            ));
        }
        if self.prob_crossover < 0.0 || self.prob_mutation < 0.0 || self.prob_reproduction < 0.0 {
            return Err(CanopyError::Config(
                "operator probabilities must be non-negative".to_string(),
            ));
        }
        if self.prob_crossover + self.prob_mutation + self.prob_reproduction <= 0.0 {
            return Err(CanopyError::Config(
                "at least one operator probability must be positive".to_string(),
            ));
        }
        if self.select_method == SelectMethod::Tournament {
            if self.tournament_size < 2 {
                return Err(CanopyError::Config(
                    "tournamentSize must be at least 2".to_string(),
                ));
            }
            if self.tournament_size > self.population_size {
                return Err(CanopyError::Config(
                    "tournamentSize must not exceed populationSize".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn validate_jobs(&self, jobs: usize) -> Result<()> {
        if jobs == 0 {
            return Err(CanopyError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }
        if jobs > self.population_size {
            return Err(CanopyError::Config(
                "worker count must not exceed populationSize".to_string(),
            ));
        }
        Ok(())
    }

    /// Depth for one generation or mutation, drawn fresh per operation.
    pub(crate) fn random_depth(&self, rng: &mut Rng) -> usize {
        rng.usize(self.min_depth..=self.max_depth)
    }
}
