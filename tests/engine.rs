use canopy_lib::config::Config;
use canopy_lib::error::CanopyError;
use canopy_lib::tree::{GenMethod, Node, SymbolSet};
use canopy_lib::{select_parents, CancelToken, Individual, Kernel, SelectMethod};
use fastrand::Rng;

fn population_with_fitness(fitness_values: &[f64]) -> Vec<Individual<f64>> {
    let mut symbols: SymbolSet<f64> = SymbolSet::new();
    symbols.add_function("+", 2, |args: &[f64]| args[0] + args[1]).unwrap();
    symbols.add_terminal("1", || 1.0);

    let mut rng = Rng::with_seed(99);
    fitness_values
        .iter()
        .map(|&fitness| Individual {
            tree: symbols.generate(GenMethod::Grow, 2, &mut rng).unwrap(),
            fitness,
        })
        .collect()
}

fn demo_kernel(config: Config) -> Kernel<f64> {
    let mut kernel = Kernel::with_config(config);
    kernel
        .add_function("+", 2, |args: &[f64]| args[0] + args[1])
        .unwrap();
    kernel
        .add_function("*", 2, |args: &[f64]| args[0] * args[1])
        .unwrap();
    kernel.add_terminal("1", || 1.0);
    kernel.add_terminal("2", || 2.0);
    kernel.add_argument("x", 0);
    kernel.set_fitness(|tree: &Node<f64>| {
        let value = tree.evaluate(&[3.0])?;
        Ok(if value.is_nan() {
            0.0
        } else {
            1.0 / (1.0 + (value - 10.0).abs())
        })
    });
    kernel
}

fn small_config() -> Config {
    Config {
        population_size: 30,
        max_generations: 3,
        max_runs: 2,
        min_depth: 2,
        max_depth: 4,
        tournament_size: 4,
        ..Config::default()
    }
}

#[test]
fn tournament_selection_returns_top_two_in_order() {
    let population = population_with_fitness(&(0..20).map(f64::from).collect::<Vec<_>>());
    let mut rng = Rng::with_seed(21);

    for _ in 0..500 {
        let (first, second) =
            select_parents(&population, SelectMethod::Tournament, 5, &mut rng).unwrap();
        assert!(first.fitness >= second.fitness);
        assert!(first.fitness < 20.0 && second.fitness < 20.0);
    }
}

#[test]
fn tournament_size_below_two_is_rejected() {
    let population = population_with_fitness(&[1.0, 2.0, 3.0]);
    let mut rng = Rng::with_seed(22);

    let result = select_parents(&population, SelectMethod::Tournament, 1, &mut rng);
    assert!(matches!(result, Err(CanopyError::Config(_))));
}

#[test]
fn zero_total_fitness_is_a_selection_error() {
    let population = population_with_fitness(&[0.0, 0.0, 0.0, 0.0]);
    let mut rng = Rng::with_seed(23);

    let result = select_parents(&population, SelectMethod::Fitness, 2, &mut rng);
    assert!(matches!(result, Err(CanopyError::ZeroTotalFitness)));
}

#[test]
fn proportionate_selection_prefers_heavier_individuals() {
    // one individual carries 91% of the total fitness
    let mut fitness_values = vec![1.0; 9];
    fitness_values.push(91.0);
    let population = population_with_fitness(&fitness_values);
    let mut rng = Rng::with_seed(24);

    let mut heavy_picks = 0;
    for _ in 0..1_000 {
        let (first, _) = select_parents(&population, SelectMethod::Fitness, 2, &mut rng).unwrap();
        if first.fitness == 91.0 {
            heavy_picks += 1;
        }
    }
    assert!(heavy_picks > 800, "heavy individual picked {} times", heavy_picks);
}

#[test]
fn run_produces_one_result_per_run() {
    let kernel = demo_kernel(small_config());
    let results = kernel.run_seeded(3, 42).unwrap();

    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(result.is_some());
    }
}

#[test]
fn fitness_proportionate_run_also_completes() {
    let config = Config {
        select_method: SelectMethod::Fitness,
        ..small_config()
    };
    let kernel = demo_kernel(config);
    let results = kernel.run_seeded(2, 43).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_some()));
}

#[test]
fn reproduction_only_runs_are_valid() {
    let config = Config {
        prob_crossover: 0.0,
        prob_mutation: 0.0,
        prob_reproduction: 1.0,
        ..small_config()
    };
    let kernel = demo_kernel(config);
    let results = kernel.run_seeded(1, 44).unwrap();
    assert!(results.iter().all(|r| r.is_some()));
}

#[test]
fn cancellation_marks_only_the_current_run_absent() {
    let config = Config {
        max_runs: 3,
        ..small_config()
    };
    let kernel = demo_kernel(config);

    let token = CancelToken::new();
    token.cancel();

    let results = kernel.run_cancellable(2, 45, &token).unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_none());
    assert!(results[1].is_some());
    assert!(results[2].is_some());
}

#[test]
fn evaluator_errors_propagate_out_of_run() {
    let mut kernel: Kernel<f64> = Kernel::with_config(small_config());
    kernel
        .add_function("+", 2, |args: &[f64]| args[0] + args[1])
        .unwrap();
    kernel.add_terminal("1", || 1.0);
    kernel.set_fitness(|_tree: &Node<f64>| Err(CanopyError::Evaluator("boom".to_string())));

    let result = kernel.run_seeded(1, 46);
    assert!(matches!(result, Err(CanopyError::Evaluator(_))));
}

#[test]
fn missing_fitness_evaluator_is_a_config_error() {
    let mut kernel: Kernel<f64> = Kernel::with_config(small_config());
    kernel
        .add_function("+", 2, |args: &[f64]| args[0] + args[1])
        .unwrap();
    kernel.add_terminal("1", || 1.0);

    assert!(matches!(kernel.run_seeded(1, 47), Err(CanopyError::Config(_))));
}

#[test]
fn worker_count_must_fit_the_population() {
    let kernel = demo_kernel(small_config());

    assert!(matches!(kernel.run_seeded(0, 48), Err(CanopyError::Config(_))));
    assert!(matches!(kernel.run_seeded(31, 48), Err(CanopyError::Config(_))));
}

#[test]
fn config_validation_rejects_bad_parameters() {
    let bad_tournament = Config {
        tournament_size: 1,
        ..Config::default()
    };
    assert!(bad_tournament.validate().is_err());

    let oversized_tournament = Config {
        population_size: 5,
        tournament_size: 10,
        ..Config::default()
    };
    assert!(oversized_tournament.validate().is_err());

    let zero_depth = Config {
        min_depth: 0,
        ..Config::default()
    };
    assert!(zero_depth.validate().is_err());

    let inverted_depths = Config {
        min_depth: 5,
        max_depth: 3,
        ..Config::default()
    };
    assert!(inverted_depths.validate().is_err());

    let zero_weights = Config {
        prob_crossover: 0.0,
        prob_mutation: 0.0,
        prob_reproduction: 0.0,
        ..Config::default()
    };
    assert!(zero_weights.validate().is_err());

    let negative_weight = Config {
        prob_crossover: -0.5,
        ..Config::default()
    };
    assert!(negative_weight.validate().is_err());

    assert!(Config::default().validate().is_ok());
}

#[test]
fn config_round_trips_through_json() {
    let path = std::env::temp_dir().join("canopy_config_round_trip.json");

    let config = Config {
        population_size: 64,
        gen_method: GenMethod::Full,
        select_method: SelectMethod::Fitness,
        ..Config::default()
    };
    config.to_file(&path).unwrap();

    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded, config);

    std::fs::remove_file(&path).ok();
}

#[test]
fn malformed_config_is_a_load_error() {
    let path = std::env::temp_dir().join("canopy_config_malformed.json");
    std::fs::write(&path, "[1, 2, 3]").unwrap();

    assert!(matches!(Config::from_file(&path), Err(CanopyError::Json(_))));

    std::fs::remove_file(&path).ok();
}

#[test]
fn unknown_method_names_are_load_errors() {
    let path = std::env::temp_dir().join("canopy_config_unknown_method.json");
    std::fs::write(&path, r#"{"genMethod": "spiral"}"#).unwrap();

    assert!(matches!(Config::from_file(&path), Err(CanopyError::Json(_))));

    std::fs::remove_file(&path).ok();
}
