pub mod config;
pub mod error;
pub mod funcfit;
pub mod mux;
pub mod tree;

use crate::config::Config;
use crate::error::{CanopyError, Result};
use crate::tree::{crossover, Node, SymbolSet};
use fastrand::Rng;
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A tree paired with its fitness score. Higher fitness is better.
pub struct Individual<V> {
    pub tree: Node<V>,
    pub fitness: f64,
}

impl<V> Clone for Individual<V> {
    fn clone(&self) -> Self {
        Individual {
            tree: self.tree.clone(),
            fitness: self.fitness,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectMethod {
    #[serde(rename = "fitness")]
    Fitness,
    #[serde(rename = "tournament")]
    Tournament,
}

impl fmt::Display for SelectMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectMethod::Fitness => write!(f, "fitness"),
            SelectMethod::Tournament => write!(f, "tournament"),
        }
    }
}

fn weighted_pick<'p, V>(population: &'p [Individual<V>], total: f64, rng: &mut Rng) -> &'p Individual<V> {
    let mut remaining = rng.f64() * total;
    for individual in population {
        if remaining < individual.fitness {
            return individual;
        }
        remaining -= individual.fitness;
    }
    // floating-point slack lands on the last individual
    &population[population.len() - 1]
}

/// Select two parents from a population snapshot.
///
/// Fitness-proportionate selection draws two independent weighted samples
/// with replacement and requires a positive fitness total; tournament
/// selection draws `tournament_size` individuals uniformly with replacement
/// and returns the top two by fitness.
pub fn select_parents<'p, V>(
    population: &'p [Individual<V>],
    method: SelectMethod,
    tournament_size: usize,
    rng: &mut Rng,
) -> Result<(&'p Individual<V>, &'p Individual<V>)> {
    if population.is_empty() {
        return Err(CanopyError::Config(
            "cannot select parents from an empty population".to_string(),
        ));
    }
    match method {
        SelectMethod::Fitness => {
            let total: f64 = population.iter().map(|i| i.fitness).sum();
            if total <= 0.0 {
                return Err(CanopyError::ZeroTotalFitness);
            }
            Ok((
                weighted_pick(population, total, rng),
                weighted_pick(population, total, rng),
            ))
        }
        SelectMethod::Tournament => {
            if tournament_size < 2 {
                return Err(CanopyError::Config(
                    "tournamentSize must be at least 2".to_string(),
                ));
            }
            let mut entrants: Vec<&Individual<V>> = (0..tournament_size)
                .map(|_| &population[rng.usize(..population.len())])
                .collect();
            entrants.sort_by(|a, b| b.fitness.partial_cmp(&a.fitness).unwrap_or(Ordering::Equal));
            Ok((entrants[0], entrants[1]))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Crossover,
    Mutation,
    Reproduction,
}

// proportional choice over the three configured weights; the weight sum is
// validated to be positive before any run starts
fn pick_operator(config: &Config, rng: &mut Rng) -> Operator {
    let total = config.prob_crossover + config.prob_mutation + config.prob_reproduction;
    let roll = rng.f64() * total;
    if roll < config.prob_crossover {
        Operator::Crossover
    } else if roll < config.prob_crossover + config.prob_mutation {
        Operator::Mutation
    } else {
        Operator::Reproduction
    }
}

/// Cooperative cancellation handle for `Kernel::run_cancellable`. Observed
/// at run granularity: the cancelled run records an absent result, and the
/// flag is consumed so queued runs still execute.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::SeqCst)
    }

    fn take(&self) -> bool {
        self.cancelled.swap(false, AtomicOrdering::SeqCst)
    }
}

/// Caller-supplied fitness evaluator. Invoked concurrently by shard workers,
/// so it must be reentrant; the engine provides no locking around it. Mapping
/// degenerate values (NaN, overflow) to a bounded worst score is the
/// caller's responsibility.
pub type FitnessFn<V> = Arc<dyn Fn(&Node<V>) -> Result<f64> + Send + Sync>;

/// The GP engine: a symbol registry, a configuration and a fitness
/// evaluator, with a generational evolution loop fanned out over parallel
/// shard workers.
pub struct Kernel<V> {
    config: Config,
    symbols: SymbolSet<V>,
    fitness: Option<FitnessFn<V>>,
}

impl<V: Clone + Send + Sync + 'static> Default for Kernel<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync + 'static> Kernel<V> {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Kernel {
            config,
            symbols: SymbolSet::new(),
            fitness: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn load_config<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.config = Config::from_file(path)?;
        Ok(())
    }

    pub fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.config.to_file(path)
    }

    pub fn add_function<F>(&mut self, name: &str, arity: usize, behavior: F) -> Result<()>
    where
        F: Fn(&[V]) -> V + Send + Sync + 'static,
    {
        self.symbols.add_function(name, arity, behavior)
    }

    pub fn add_terminal<F>(&mut self, name: &str, behavior: F)
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        self.symbols.add_terminal(name, behavior);
    }

    pub fn add_argument(&mut self, name: &str, index: usize) {
        self.symbols.add_argument(name, index);
    }

    pub fn set_fitness<F>(&mut self, fitness: F)
    where
        F: Fn(&Node<V>) -> Result<f64> + Send + Sync + 'static,
    {
        self.fitness = Some(Arc::new(fitness));
    }

    /// Run the full GP process with a time-derived seed and `jobs` parallel
    /// shard workers per generation. Returns one result per run, in run
    /// order: the best tree of the final population, or `None` for a
    /// cancelled run.
    pub fn run(&self, jobs: usize) -> Result<Vec<Option<Node<V>>>> {
        self.run_cancellable(jobs, get_seed_value(), &CancelToken::new())
    }

    pub fn run_seeded(&self, jobs: usize, seed: u64) -> Result<Vec<Option<Node<V>>>> {
        self.run_cancellable(jobs, seed, &CancelToken::new())
    }

    pub fn run_cancellable(
        &self,
        jobs: usize,
        seed: u64,
        cancel: &CancelToken,
    ) -> Result<Vec<Option<Node<V>>>> {
        let fitness = match &self.fitness {
            Some(fitness) => fitness.clone(),
            None => {
                return Err(CanopyError::Config(
                    "no fitness evaluator has been set".to_string(),
                ))
            }
        };
        self.config.validate()?;
        self.config.validate_jobs(jobs)?;

        let mut rng = Rng::with_seed(seed);
        let mut results = Vec::with_capacity(self.config.max_runs);

        'runs: for run in 0..self.config.max_runs {
            if cancel.take() {
                info!("run {} cancelled before start", run);
                results.push(None);
                continue;
            }
            info!("run {} started", run);

            let mut population = Vec::with_capacity(self.config.population_size);
            for _ in 0..self.config.population_size {
                let depth = self.config.random_depth(&mut rng);
                let tree = self.symbols.generate(self.config.gen_method, depth, &mut rng)?;
                let fitness_value = fitness(&tree)?;
                population.push(Individual {
                    tree,
                    fitness: fitness_value,
                });
            }

            for generation in 0..self.config.max_generations {
                if cancel.take() {
                    info!("run {} cancelled at generation {}", run, generation);
                    results.push(None);
                    continue 'runs;
                }
                population = self.next_generation(&fitness, &population, jobs, &mut rng)?;

                let best = population.iter().map(|i| i.fitness).fold(f64::NEG_INFINITY, f64::max);
                let worst = population.iter().map(|i| i.fitness).fold(f64::INFINITY, f64::min);
                info!("run: {}, gen: {}, best: {}, worst: {}", run, generation, best, worst);
            }

            let champion = population
                .iter()
                .max_by(|a, b| a.fitness.partial_cmp(&b.fitness).unwrap_or(Ordering::Equal))
                .expect("population size is validated to be nonzero");
            results.push(Some(champion.tree.clone()));
        }

        Ok(results)
    }

    /// One fork-join wave: the snapshot is split into `jobs` shards (the
    /// first `jobs - 1` of size floor(P/jobs), the last takes the
    /// remainder), each shard is produced by an independent worker, and the
    /// outputs are concatenated in shard order.
    fn next_generation(
        &self,
        fitness: &FitnessFn<V>,
        population: &[Individual<V>],
        jobs: usize,
        rng: &mut Rng,
    ) -> Result<Vec<Individual<V>>> {
        let base = population.len() / jobs;
        let mut shards: Vec<(usize, u64)> = (0..jobs).map(|_| (base, rng.u64(..))).collect();
        shards[jobs - 1].0 = population.len() - base * (jobs - 1);

        let produced: Result<Vec<Vec<Individual<V>>>> = shards
            .into_par_iter()
            .map(|(size, shard_seed)| {
                self.produce_shard(fitness, population, size, Rng::with_seed(shard_seed))
            })
            .collect();

        let mut next = Vec::with_capacity(population.len());
        for shard in produced? {
            next.extend(shard);
        }
        Ok(next)
    }

    fn produce_shard(
        &self,
        fitness: &FitnessFn<V>,
        snapshot: &[Individual<V>],
        size: usize,
        mut rng: Rng,
    ) -> Result<Vec<Individual<V>>> {
        let mut output = Vec::with_capacity(size);
        for _ in 0..size {
            let (parent1, parent2) = select_parents(
                snapshot,
                self.config.select_method,
                self.config.tournament_size,
                &mut rng,
            )?;
            let tree = match pick_operator(&self.config, &mut rng) {
                Operator::Crossover => crossover(&parent1.tree, &parent2.tree, &mut rng),
                Operator::Mutation => {
                    let mut tree = parent1.tree.clone();
                    let depth = self.config.random_depth(&mut rng);
                    self.symbols.mutate(&mut tree, self.config.gen_method, depth, &mut rng)?;
                    tree
                }
                Operator::Reproduction => parent1.tree.clone(),
            };
            let fitness_value = fitness(&tree)?;
            output.push(Individual {
                tree,
                fitness: fitness_value,
            });
        }
        Ok(output)
    }
}

pub fn get_seed_value() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
