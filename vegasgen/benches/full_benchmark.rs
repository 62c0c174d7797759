use clap::Parser;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use vegasgen::benchmark::integrands::{self, Benchmark};
use vegasgen::config::Config;
use vegasgen::sampler::{Event, EventSampler, EventSink};
use vegasgen::vegas::Vegas;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Dimension
    #[clap(short, long, value_parser, default_value_t = 2)]
    dim: usize,
    /// Number of evaluations per iteration
    #[clap(short, long, value_parser, default_value_t = 100_000)]
    n_eval: usize,
    /// Number of iterations
    #[clap(short = 'i', long, value_parser, default_value_t = 10)]
    n_iter: usize,
    /// Number of unweighted events to generate per integrand
    #[clap(short = 'e', long, value_parser, default_value_t = 100_000)]
    n_events: u64,
    /// Output file
    #[clap(short, long, value_parser, default_value = "benchmark_results.json")]
    output: String,
    /// Passed by `cargo bench`
    #[clap(long, hide = true)]
    bench: bool,
}

#[derive(Debug, Serialize)]
struct BenchmarkResult {
    integrand: String,
    dim: usize,
    n_eval: usize,
    n_iter: usize,
    time_s: f64,
    value: f64,
    error: f64,
    chi2_dof: f64,
    analytical_result: f64,
    n_events: u64,
    generation_time_s: f64,
    efficiency: f64,
    corrections: u64,
}

/// Drops the events, only their number matters here.
struct Discard;

impl EventSink for Discard {
    fn record(&mut self, _: &Event) {}
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!(
        "Running benchmarks for dim={} n_eval={} n_iter={} n_events={}",
        args.dim, args.n_eval, args.n_iter, args.n_events
    );

    let mut results = Vec::new();
    for benchmark in integrands::all(args.dim) {
        results.push(run_one_integrand(benchmark.as_ref(), &args)?);
    }

    let json = serde_json::to_string_pretty(&results)?;
    let mut file = File::create(&args.output)?;
    file.write_all(json.as_bytes())?;
    println!("Benchmark results written to {}", args.output);
    Ok(())
}

fn run_one_integrand<B: Benchmark + ?Sized>(
    benchmark: &B,
    args: &Args,
) -> vegasgen::Result<BenchmarkResult> {
    let name = benchmark.name();
    let config = Config {
        n_iter: args.n_iter,
        n_eval: args.n_eval,
        n_warmup: args.n_eval / 2,
        seed: Some(1234),
        ..Config::default()
    };

    println!("Running {} - Vegas", name);
    let mut vegas = Vegas::new(args.dim, config)?;
    let start = Instant::now();
    let result = vegas.integrate(benchmark)?;
    let duration = start.elapsed();

    println!("Running {} - unweighted events", name);
    let start = Instant::now();
    let mut sampler = EventSampler::from_vegas(&vegas, benchmark)?;
    let mut session = sampler.bootstrap()?;
    let summary = sampler.generate(&mut session, args.n_events, &mut Discard)?;
    let generation_duration = start.elapsed();

    Ok(BenchmarkResult {
        integrand: name.to_string(),
        dim: args.dim,
        n_eval: args.n_eval,
        n_iter: args.n_iter,
        time_s: duration.as_secs_f64(),
        value: result.value,
        error: result.error,
        chi2_dof: result.chi2_dof,
        analytical_result: benchmark.analytical_result(),
        n_events: summary.events,
        generation_time_s: generation_duration.as_secs_f64(),
        efficiency: summary.efficiency(),
        corrections: summary.corrections,
    })
}
