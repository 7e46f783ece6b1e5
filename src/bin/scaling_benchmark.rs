//! Unattended scaling benchmark runner.
//!
//! Runs the full algorithm list at every node count and prints one line per
//! completed trial. Results land in the configured JSONL run log.
//!
//! Usage:
//!   cargo run --bin scaling_benchmark --release -- [options]
//!
//! Options:
//!   --config <path>        YAML settings file
//!   --data <csv>           CSV input (overrides the config's data_path)
//!   --rows <n>             Row cap applied at ingest
//!   --store <path>         Run log path
//!   --synthetic <rows> <cols>  Generate input instead of reading a file
//!   --seed <n>             Pin the per-trial seed (default: fresh per trial)

use std::path::PathBuf;
use std::process::ExitCode;

use clusterbench::bench::{ProgressObserver, ProgressUpdate, SeriesRunner};
use clusterbench::cluster::ALL_ALGORITHMS;
use clusterbench::config::RunConfig;
use clusterbench::dataset::{read_csv, summarize, Dataset};
use clusterbench::store::JsonlStore;
use clusterbench::testing::synthetic_dataset;

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    data: Option<PathBuf>,
    rows: Option<usize>,
    store: Option<PathBuf>,
    synthetic: Option<(usize, usize)>,
    seed: Option<u64>,
}

fn parse_args() -> Args {
    let mut args = Args::default();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = Some(PathBuf::from(it.next().expect("--config path"))),
            "--data" => args.data = Some(PathBuf::from(it.next().expect("--data path"))),
            "--rows" => args.rows = Some(it.next().expect("--rows value").parse().unwrap()),
            "--store" => args.store = Some(PathBuf::from(it.next().expect("--store path"))),
            "--synthetic" => {
                let rows = it.next().expect("--synthetic rows").parse().unwrap();
                let cols = it.next().expect("--synthetic cols").parse().unwrap();
                args.synthetic = Some((rows, cols));
            }
            "--seed" => args.seed = Some(it.next().expect("--seed value").parse().unwrap()),
            "--help" => {
                eprintln!(
                    "scaling_benchmark\n\n  --config <path>  YAML settings file\n  --data <csv>  CSV input\n  --rows <n>  Row cap\n  --store <path>  Run log path\n  --synthetic <rows> <cols>  Generated input\n  --seed <n>  Pin the per-trial seed"
                );
                std::process::exit(0);
            }
            other => panic!("unknown arg: {other}"),
        }
    }

    args
}

/// Prints one line per newly completed trial.
#[derive(Default)]
struct LinePrinter {
    printed: usize,
}

impl ProgressObserver for LinePrinter {
    fn on_progress(&mut self, update: ProgressUpdate<'_>) {
        for run in &update.completed[self.printed..] {
            println!(
                "ok: {} | nodes {} | {:.4}s | speedup {:.2} | efficiency {:.1}%",
                run.algorithm, run.nodes, run.duration_seconds, run.speedup, run.efficiency_percent
            );
        }
        self.printed = update.completed.len();
    }
}

fn load_input(config: &RunConfig, args: &Args) -> Result<Dataset, String> {
    if let Some((rows, cols)) = args.synthetic {
        return Ok(synthetic_dataset(rows, cols, args.seed.unwrap_or(42)));
    }
    match &config.data_path {
        Some(path) => read_csv(path, config.sample_rows).map_err(|e| e.to_string()),
        None => {
            println!("no data source configured; generating 50000x4 synthetic rows");
            Ok(synthetic_dataset(50_000, 4, args.seed.unwrap_or(42)))
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = parse_args();

    let mut config = match &args.config {
        Some(path) => match RunConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => RunConfig::default(),
    };
    if let Some(data) = &args.data {
        config.data_path = Some(data.clone());
    }
    if let Some(rows) = args.rows {
        config.sample_rows = rows;
    }
    if let Some(store) = &args.store {
        config.store_path = store.clone();
    }

    let dataset = match load_input(&config, &args) {
        Ok(dataset) => dataset,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut store = match JsonlStore::open(&config.store_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let stats = summarize(&dataset);
    if let Err(err) = store.save_stats(&stats, dataset.n_rows() as u64) {
        eprintln!("warning: could not persist statistics snapshot: {err}");
    }
    println!(
        "loaded {} rows, {} columns; results -> {}",
        dataset.n_rows(),
        dataset.n_columns(),
        config.store_path.display()
    );

    let mut failures = 0usize;
    let mut runner = SeriesRunner::new(&mut store);
    for algorithm in ALL_ALGORITHMS {
        println!(">>> {algorithm} across nodes [1, 2, 4, 8]");
        let mut printer = LinePrinter::default();
        if let Err(err) = runner.run_dataset(&dataset, algorithm, args.seed, &mut printer) {
            eprintln!("error: {algorithm} series failed: {err}");
            failures += 1;
        }
    }

    if failures > 0 {
        eprintln!("{failures} series failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
