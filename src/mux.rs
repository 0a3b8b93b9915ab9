//! Boolean 11-multiplexer demonstration problem: three address bits select
//! one of eight data bits; fitness is the fraction of the 2048-line truth
//! table the evolved expression reproduces.

use crate::config::Config;
use crate::error::Result;
use crate::tree::Node;
use crate::Kernel;

const DATA_BITS: usize = 8;
const ADDRESS_BITS: usize = 3;
const TABLE_SIZE: usize = 1 << (DATA_BITS + ADDRESS_BITS);

fn truth_table() -> Vec<bool> {
    (0..TABLE_SIZE)
        .map(|line| {
            let address = (line >> DATA_BITS) & 0b111;
            let data = line & 0xff;
            data & (1 << address) != 0
        })
        .collect()
}

// argument i is bit i of the table line: d0..d7 then a0..a2
fn line_arguments(line: usize) -> Vec<bool> {
    (0..DATA_BITS + ADDRESS_BITS)
        .map(|bit| line & (1 << bit) != 0)
        .collect()
}

pub fn mux_kernel(config: Config) -> Result<Kernel<bool>> {
    let mut kernel = Kernel::with_config(config);

    kernel.add_function("and", 2, |args: &[bool]| args[0] && args[1])?;
    kernel.add_function("or", 2, |args: &[bool]| args[0] || args[1])?;
    kernel.add_function("not", 1, |args: &[bool]| !args[0])?;
    kernel.add_function("if", 3, |args: &[bool]| if args[0] { args[1] } else { args[2] })?;

    for bit in 0..DATA_BITS {
        kernel.add_argument(&format!("d{}", bit), bit);
    }
    for bit in 0..ADDRESS_BITS {
        kernel.add_argument(&format!("a{}", bit), DATA_BITS + bit);
    }

    let table = truth_table();
    kernel.set_fitness(move |tree: &Node<bool>| {
        let mut matches = 0;
        for (line, expected) in table.iter().enumerate() {
            if tree.evaluate(&line_arguments(line))? == *expected {
                matches += 1;
            }
        }
        Ok(f64::from(matches) / TABLE_SIZE as f64)
    });

    Ok(kernel)
}

pub fn mux_runs(config: Config, jobs: usize, seed: u64) -> Result<Vec<Option<Node<bool>>>> {
    mux_kernel(config)?.run_seeded(jobs, seed)
}
