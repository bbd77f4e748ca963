//! Pareto Archive CLI - Run steady-state archive workloads from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rayon::prelude::*;

use pareto_archive::{
    compute::Archive,
    schema::{ArchiveConfig, Problem, RunConfig, Workload},
};

/// Outcome of one independent run.
struct ReplicateStats {
    replicate: usize,
    seed: u64,
    len: usize,
    layers: usize,
    front: usize,
    hypervolume: f64,
    mean_parent_rank: f64,
    elapsed: Duration,
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <run.json> [steps]", args[0]);
        eprintln!();
        eprintln!("Run a steady-state Pareto archive workload from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  run.json  Path to run configuration file");
        eprintln!("  steps     Override the number of insertions per replicate");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let mut config = RunConfig::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });
    if let Some(steps) = args.get(2).and_then(|s| s.parse().ok()) {
        config.steps = steps;
    }
    let base_seed = config.archive.random_seed.unwrap_or_else(rand::random);

    println!("Pareto Archive Workload");
    println!("=======================");
    println!("Workload: {:?}", config.workload.shape);
    println!("Hull policy: {:?}", config.archive.hull_policy);
    println!("Population: {}", config.population);
    println!("Steps: {}", config.steps);
    println!("Replicates: {}", config.replicates);
    println!();

    println!("Running replicates...");
    let start = Instant::now();
    let results: Vec<ReplicateStats> = (0..config.replicates)
        .into_par_iter()
        .map(|replicate| run_replicate(&config, replicate, base_seed.wrapping_add(replicate as u64)))
        .collect();
    let elapsed = start.elapsed();

    for stats in &results {
        println!(
            "  Replicate {} (seed {}): size={}, layers={}, front={}, hv={:.6}, parent rank={:.3}, {:.2}s",
            stats.replicate,
            stats.seed,
            stats.len,
            stats.layers,
            stats.front,
            stats.hypervolume,
            stats.mean_parent_rank,
            stats.elapsed.as_secs_f32()
        );
    }

    let total_steps = config.steps * config.replicates;
    let mean_hv = results.iter().map(|s| s.hypervolume).sum::<f64>() / results.len() as f64;
    println!();
    println!("Mean hypervolume: {:.6}", mean_hv);
    println!(
        "Time: {:.2}s ({:.0} insertions/s)",
        elapsed.as_secs_f32(),
        total_steps as f32 / elapsed.as_secs_f32()
    );
}

/// Insert one new point per step, evict while above the population bound
/// and draw a parent, the way a steady-state NSGA-II loop does.
fn run_replicate(config: &RunConfig, replicate: usize, seed: u64) -> ReplicateStats {
    let archive_config = ArchiveConfig {
        hull_policy: config.archive.hull_policy,
        random_seed: Some(seed),
    };
    let mut archive = Archive::with_config(archive_config).unwrap_or_else(|e| {
        eprintln!("Invalid archive config: {}", e);
        std::process::exit(1);
    });
    let mut workload = Workload::new(&config.workload);
    let mut rng = SmallRng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15);

    let start = Instant::now();
    let mut rank_sum = 0usize;
    for _ in 0..config.steps {
        if let Ok(parent) = archive.random() {
            rank_sum += parent.rank;
        }
        let decision = workload.generate(&mut rng);
        archive.add(workload.evaluate(&decision));
        if archive.len() > config.population
            && let Err(e) = archive.remove_worst_many(archive.len() - config.population)
        {
            log::warn!("replicate {replicate}: eviction failed: {e}");
        }
    }
    let elapsed = start.elapsed();

    ReplicateStats {
        replicate,
        seed,
        len: archive.len(),
        layers: archive.layer_count(),
        front: archive.non_dominated().len(),
        hypervolume: archive.hypervolume(&workload.bounds()),
        mean_parent_rank: rank_sum as f64 / config.steps as f64,
        elapsed,
    }
}

fn print_example_config() {
    let config = RunConfig::default();

    println!("Example configuration (run.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example: {}", e),
    }
}
