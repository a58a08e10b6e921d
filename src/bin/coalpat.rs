//! Coalpat CLI - estimate site-pattern probabilities for a demographic
//! model by coalescent simulation.

use anyhow::{Context, Result};
use clap::Parser;
use coalpat::params::Bounds;
use coalpat::pattern::{self, BranchTab};
use coalpat::simulation::{pattern_probs, DemoModel, RunConfig};
use rand::Rng;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

/// Coalpat - site-pattern probabilities by coalescent simulation
#[derive(Parser, Debug)]
#[command(name = "coalpat")]
#[command(author, version, about = "Site-pattern probabilities by coalescent simulation", long_about = None)]
struct Cli {
    /// Population-description file
    input: PathBuf,

    /// Number of replicates
    #[arg(short = 'i', long = "reps", default_value_t = 100)]
    reps: u64,

    /// Worker threads (0 = one per core, capped at the replicate count)
    #[arg(short = 't', long, default_value_t = 0)]
    threads: usize,

    /// Tabulate singleton site patterns as well
    #[arg(long)]
    singletons: bool,

    /// Base RNG seed; worker i uses seed + i (default: random)
    #[arg(long)]
    seed: Option<u64>,

    /// Print the table as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Observed site-pattern file; also report the KL divergence
    #[arg(long)]
    observed: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let model = DemoModel::from_file(&cli.input, Bounds::default())
        .with_context(|| format!("can't read model from {}", cli.input.display()))?;
    if !model.feasible() {
        anyhow::bail!(
            "{}: model parameters are infeasible",
            cli.input.display()
        );
    }

    let cfg = RunConfig {
        nreps: cli.reps,
        nthreads: cli.threads,
        include_singletons: cli.singletons,
        base_seed: cli.seed.unwrap_or_else(|| rand::rng().random()),
    };

    let observed = match &cli.observed {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("can't open observed file {}", path.display()))?;
            Some(
                pattern::read_observed(BufReader::new(file), model.labels())
                    .with_context(|| format!("can't parse {}", path.display()))?,
            )
        }
        None => None,
    };

    let probs = pattern_probs(&model, &cfg).context("simulation failed")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.json {
        write_json(&mut out, &model, &cfg, &probs)?;
    } else {
        writeln!(out, "# coalpat: site-pattern probabilities")?;
        writeln!(out, "# input    : {}", cli.input.display())?;
        writeln!(out, "# nreps    : {}", cfg.nreps)?;
        writeln!(out, "# nthreads : {}", cfg.effective_threads())?;
        writeln!(out, "# seed     : {}", cfg.base_seed)?;
        pattern::write_table(&mut out, &probs, model.labels())?;
    }

    if let Some(observed) = observed {
        let mut obs = observed;
        obs.normalize().context("observed table is empty")?;
        let kl = BranchTab::kl_divergence(&obs, &probs)
            .context("observed pattern missing from the estimate")?;
        writeln!(out, "# KLdiverg : {kl:.7}")?;
    }
    Ok(())
}

fn write_json<W: Write>(
    out: &mut W,
    model: &DemoModel,
    cfg: &RunConfig,
    probs: &BranchTab,
) -> Result<()> {
    let table: serde_json::Map<String, serde_json::Value> =
        pattern::labeled_entries(probs, model.labels())
            .into_iter()
            .map(|(label, p)| (label, serde_json::json!(p)))
            .collect();
    let doc = serde_json::json!({
        "nreps": cfg.nreps,
        "nthreads": cfg.effective_threads(),
        "seed": cfg.base_seed,
        "prob": table,
    });
    serde_json::to_writer_pretty(&mut *out, &doc)?;
    writeln!(out)?;
    Ok(())
}
