use std::process::{exit, Command};

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the ride-pooling workspace",
    long_about = "A unified CLI for running the demo pipeline, benchmarks,\n\
                  and CI checks in the ride-pooling workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pool the synthetic demo flights and print the result
    Run {
        /// Optional pipeline config JSON
        #[arg(long, env = "POOL_CONFIG")]
        config: Option<String>,
    },
    /// Run all pool_core tests, including the OSRM client
    Test,
    /// Run Criterion benchmarks, optionally saving or comparing a named baseline
    Bench {
        #[arg(long, conflicts_with = "baseline")]
        save_baseline: Option<String>,
        #[arg(long)]
        baseline: Option<String>,
    },
    /// Run CI checks (fmt, clippy, tests, examples, benchmarks)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Build and run the demo example
    Examples,
    /// Run benchmarks
    Bench,
    /// Run check + examples + bench
    All,
}

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

/// Run cargo and exit with its status code on failure.
fn cargo(args: &[&str]) {
    eprintln!("+ cargo {}", args.join(" "));
    let status = match Command::new("cargo").args(args).status() {
        Ok(status) => status,
        Err(err) => {
            eprintln!("could not start cargo: {err}");
            exit(1);
        }
    };
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_demo(config: Option<&str>) {
    let mut args = vec!["run", "-p", "pool_core", "--example", "flight_run"];
    if let Some(path) = config {
        args.push("--");
        args.push(path);
    }
    cargo(&args);
}

fn bench(extra: &[&str]) {
    let mut args = vec!["bench", "--package", "pool_core", "--bench", "performance"];
    if !extra.is_empty() {
        args.push("--");
        args.extend_from_slice(extra);
    }
    cargo(&args);
}

fn ci_check() {
    step("Check formatting");
    cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test pool_core");
    cargo(&["test", "-p", "pool_core"]);

    step("Test pool_core with the OSRM client");
    cargo(&["test", "-p", "pool_core", "--features", "osrm"]);
}

fn ci_examples() {
    step("Run flight_run demo");
    run_demo(None);
}

fn ci_bench() {
    step("Run benchmarks");
    bench(&[]);
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run_demo(config.as_deref()),
        Commands::Test => {
            cargo(&["test", "-p", "pool_core", "--all-features"]);
        }
        Commands::Bench {
            save_baseline,
            baseline,
        } => match (save_baseline, baseline) {
            (Some(name), _) => bench(&["--save-baseline", &name]),
            (None, Some(name)) => bench(&["--baseline", &name]),
            (None, None) => bench(&[]),
        },
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Examples => ci_examples(),
                CiJob::Bench => ci_bench(),
                CiJob::All => {
                    ci_check();
                    ci_examples();
                    ci_bench();
                }
            }
            eprintln!("\nCI job passed.");
        }
    }
}
