//! Tristream command line
//!
//! Runs the triangle-count estimator over an edge-list file and writes one
//! set of result files per repeated run.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;
use tristream::{run_experiment, EstimatorConfig, Method, WorkerMode};

#[derive(Parser)]
#[command(name = "tristream", version, about = "Distributed streaming triangle count estimation")]
struct Cli {
    /// Edge-list file, one "src dst" pair per line
    input: PathBuf,

    /// Directory for result files
    #[arg(long, short, default_value = "output")]
    output: PathBuf,

    /// YAML config file; command-line options override its values
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[arg(long)]
    worker_num: Option<usize>,

    #[arg(long)]
    method: Option<Method>,

    /// Reservoir capacity per worker
    #[arg(long)]
    mem_size: Option<usize>,

    #[arg(long)]
    total_space: Option<usize>,

    #[arg(long)]
    rate: Option<f64>,

    #[arg(long)]
    tolerance: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    repeat: Option<usize>,

    /// Messages buffered per worker queue
    #[arg(long)]
    buf_len: Option<usize>,

    /// Workers drain the stream without counting
    #[arg(long)]
    empty_workers: bool,

    /// Print the final run summary as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Defaults, then the YAML file, then command-line overrides
    fn estimator_config(&self) -> anyhow::Result<EstimatorConfig> {
        let mut config = match &self.config {
            Some(path) => EstimatorConfig::from_yaml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => EstimatorConfig::default(),
        };

        if let Some(v) = self.worker_num {
            config.worker_num = v;
        }
        if let Some(v) = self.method {
            config.method = v;
        }
        if let Some(v) = self.mem_size {
            config.mem_size = v;
        }
        if let Some(v) = self.total_space {
            config.total_space = v;
        }
        if let Some(v) = self.rate {
            config.rate = v;
        }
        if let Some(v) = self.tolerance {
            config.tolerance = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.repeat {
            config.repeat = v;
        }
        if let Some(v) = self.buf_len {
            config.buf_len = v;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.estimator_config()?;
    let mode = if cli.empty_workers {
        WorkerMode::Discard
    } else {
        WorkerMode::Count
    };

    tracing::info!("Tristream v{}", tristream::version());
    tracing::info!(
        workers = config.worker_num,
        method = %config.method,
        mem_size = config.mem_size,
        rate = config.rate,
        repeat = config.repeat,
        "Estimating triangles in {}",
        cli.input.display()
    );

    let outcomes = run_experiment(&config, &cli.input, &cli.output, mode)
        .await
        .with_context(|| format!("running on {}", cli.input.display()))?;

    if let Some(last) = outcomes.last() {
        if cli.json {
            let summary = serde_json::json!({
                "runs": outcomes.len(),
                "global_cnt": outcomes.iter().map(|o| o.global_cnt).collect::<Vec<_>>(),
                "elapsed_ms": outcomes.iter().map(|o| o.elapsed_ms).collect::<Vec<_>>(),
                "router": last.router,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            let mean = outcomes.iter().map(|o| o.global_cnt).sum::<f64>() / outcomes.len() as f64;
            println!("Runs: {}", outcomes.len());
            println!("Mean global estimate: {:.3}", mean);
            println!("Results written to {}", cli.output.display());
        }
    }

    Ok(())
}
