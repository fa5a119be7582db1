use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde::Serialize;
use wl_features::graph::load_graphs;
use wl_features::{PruningStrategy, Result, SetOrMultiset, WlConfig, WlFeatures};

/// Collect WL features over a JSON graph corpus and embed every graph.
#[derive(Parser, Debug)]
#[command(name = "wl-features", version)]
struct Args {
  /// JSON array of `{ "nodes": [...], "edges": [[u, v, label], ...] }`
  #[arg(long)]
  graphs: PathBuf,

  /// Engine config file; command-line flags override it
  #[arg(long)]
  config: Option<PathBuf>,

  #[arg(long)]
  iterations: Option<usize>,

  #[arg(long)]
  pruning: Option<PruningStrategy>,

  /// Hash neighbourhoods as multisets instead of sets
  #[arg(long)]
  multiset: bool,

  /// MaxSAT solver executable
  #[arg(long)]
  solver: Option<PathBuf>,

  #[arg(long)]
  solver_timeout_ms: Option<u64>,

  #[arg(long, default_value = "embeddings.json")]
  output: PathBuf,

  #[arg(long)]
  quiet: bool,
}

#[derive(Serialize)]
struct Output {
  n_features: usize,
  embeddings: Vec<Vec<usize>>,
}

fn build_config(args: &Args) -> Result<WlConfig> {
  let mut config = match &args.config {
    Some(path) => WlConfig::from_json_file(path)?,
    None => WlConfig::default(),
  };
  if let Some(iterations) = args.iterations {
    config.iterations = iterations;
  }
  if let Some(pruning) = args.pruning {
    config.pruning = pruning;
  }
  if args.multiset {
    config.hash = SetOrMultiset::Multiset;
  }
  if let Some(solver) = &args.solver {
    config.maxsat.executable = solver.clone();
  }
  if args.solver_timeout_ms.is_some() {
    config.maxsat.timeout_ms = args.solver_timeout_ms;
  }
  config.quiet |= args.quiet;
  config.validate()?;
  Ok(config)
}

fn run(args: Args) -> Result<()> {
  let config = build_config(&args)?;
  let graphs = load_graphs(&args.graphs)?;
  info!(
    "Collecting {} graphs: {} iterations, {} pruning, {:?} hashing",
    graphs.len(),
    config.iterations,
    config.pruning,
    config.hash
  );

  let quiet = config.quiet;
  let mut wl = WlFeatures::new(config);
  wl.collect(&graphs)?;

  let pb = if quiet {
    ProgressBar::hidden()
  } else {
    ProgressBar::new(graphs.len() as u64)
  };
  if let Ok(style) = ProgressStyle::with_template("[embed] [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len}") {
    pb.set_style(style);
  }
  let mut embeddings = Vec::with_capacity(graphs.len());
  for g in &graphs {
    embeddings.push(wl.embed_dense(g)?);
    pb.inc(1);
  }
  pb.finish_with_message("Finished embedding");

  let output = Output {
    n_features: wl.n_features(),
    embeddings,
  };
  info!("Writing {} embeddings of dimension {} to {}", graphs.len(), output.n_features, args.output.display());
  let writer = BufWriter::new(File::create(&args.output)?);
  serde_json::to_writer(writer, &output)?;
  Ok(())
}

fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let args = Args::parse();
  if let Err(e) = run(args) {
    eprintln!("error: {e}");
    std::process::exit(1);
  }
}
