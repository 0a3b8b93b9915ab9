use canopy_lib::config::Config;
use canopy_lib::error::{CanopyError, Result};
use canopy_lib::tree::Node;
use canopy_lib::{funcfit, get_seed_value, mux};
use clap::{App, Arg};
use std::fs;
use std::fs::File;
use std::io::prelude::*;

fn main() {
    env_logger::init();

    if let Err(error) = run() {
        eprintln!("error: {}", error);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = App::new("canopy")
        .arg(
            Arg::with_name("problem")
                .short("p")
                .long("problem")
                .value_name("problem")
                .help("Problem to run: funcfit or mux"),
        )
        .arg(
            Arg::with_name("seed")
                .short("s")
                .long("seed")
                .value_name("seed")
                .help("Seed the program with a given value"),
        )
        .arg(
            Arg::with_name("jobs")
                .short("j")
                .long("jobs")
                .value_name("jobs")
                .help("Number of parallel workers per generation"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("path")
                .help("Load run parameters from a JSON file"),
        )
        .get_matches();

    let seed = match matches.value_of("seed") {
        Some(seed_arg) => seed_arg
            .parse()
            .map_err(|_| CanopyError::Config("seed must be an unsigned integer".to_string()))?,
        None => get_seed_value(),
    };

    let jobs = match matches.value_of("jobs") {
        Some(jobs_arg) => jobs_arg
            .parse()
            .map_err(|_| CanopyError::Config("jobs must be a positive integer".to_string()))?,
        None => 4,
    };

    let config = match matches.value_of("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    println!("Using seed value {}. Jobs = {}", seed, jobs);

    match matches.value_of("problem").unwrap_or("funcfit") {
        "funcfit" => report(seed, &funcfit::funcfit_runs(config, jobs, seed)?),
        "mux" => report(seed, &mux::mux_runs(config, jobs, seed)?),
        other => Err(CanopyError::Config(format!("unknown problem '{}'", other))),
    }
}

fn report<V>(seed: u64, results: &[Option<Node<V>>]) -> Result<()> {
    fs::create_dir_all(format!("champions/{}", seed))?;

    for (run_index, result) in results.iter().enumerate() {
        match result {
            Some(tree) => {
                println!("run {}: {}", run_index, tree);

                let output_path = format!("champions/{}/run{}.txt", seed, run_index + 1);
                let mut file = File::create(&output_path)?;
                writeln!(file, "{}", tree)?;

                println!("Wrote champion for run {} to {}", run_index + 1, output_path);
            }
            None => println!("run {}: cancelled", run_index),
        }
    }

    println!("Ran with seed {}", seed);
    Ok(())
}
