//! Symbolic-regression demonstration problem: evolve an arithmetic
//! expression that fits f(x) = 1 / (1 + 25x^2) over 100 samples of [-1, 1].

use crate::config::Config;
use crate::error::Result;
use crate::tree::Node;
use crate::Kernel;

const SAMPLE_COUNT: usize = 100;

fn sample_point(index: usize) -> f64 {
    (index as f64 - 50.0) / 50.0
}

fn target(x: f64) -> f64 {
    1.0 / (1.0 + 25.0 * x * x)
}

fn protected_pow(base: f64, exponent: f64) -> f64 {
    let value = base.powf(exponent);
    // NaN flows through; the fitness maps it to zero
    if value.is_infinite() {
        f64::MAX
    } else {
        value
    }
}

pub fn funcfit_kernel(config: Config) -> Result<Kernel<f64>> {
    let mut kernel = Kernel::with_config(config);

    kernel.add_function("+", 2, |args: &[f64]| args[0] + args[1])?;
    kernel.add_function("-", 2, |args: &[f64]| args[0] - args[1])?;
    kernel.add_function("*", 2, |args: &[f64]| args[0] * args[1])?;
    kernel.add_function("/", 2, |args: &[f64]| {
        if args[1] == 0.0 {
            f64::MAX
        } else {
            args[0] / args[1]
        }
    })?;
    kernel.add_function("^", 2, |args: &[f64]| protected_pow(args[0], args[1]))?;

    for value in 1..=3 {
        kernel.add_terminal(&value.to_string(), move || f64::from(value));
    }
    kernel.add_argument("x", 0);

    let targets: Vec<f64> = (0..SAMPLE_COUNT).map(|i| target(sample_point(i))).collect();
    kernel.set_fitness(move |tree: &Node<f64>| {
        let mut error_sum = 0.0;
        for (index, expected) in targets.iter().enumerate() {
            let actual = tree.evaluate(&[sample_point(index)])?;
            error_sum += (actual - expected).abs();
        }
        Ok(if error_sum.is_nan() {
            0.0
        } else {
            1.0 / (error_sum + 1.0)
        })
    });

    Ok(kernel)
}

pub fn funcfit_runs(config: Config, jobs: usize, seed: u64) -> Result<Vec<Option<Node<f64>>>> {
    funcfit_kernel(config)?.run_seeded(jobs, seed)
}
