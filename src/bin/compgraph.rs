//! Command-line front end: runs the bundled algorithms over JSON lines files.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use compgraph::algorithms::{
    RoadSpeedColumns, inverted_index_graph, pmi_graph, road_speed_graph, word_count_graph,
};
use compgraph::{Graph, MetricsCollector, Runner, SortConfig, Sources, write_jsonl_records};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run map-reduce computation graphs over JSON lines files
#[derive(Parser)]
#[command(name = "compgraph", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RunArgs {
    /// Records each sort keeps in memory before spilling to disk
    #[arg(
        long,
        global = true,
        value_name = "RECORDS",
        default_value_t = SortConfig::default().memory_limit
    )]
    memory_limit: usize,

    /// Directory for sort spill files (defaults to the system temp directory)
    #[arg(long, global = true, value_name = "DIR")]
    spill_dir: Option<PathBuf>,

    /// Print run metrics when done
    #[arg(long, global = true)]
    metrics: bool,

    /// Save run metrics as JSON to this file
    #[arg(long, global = true, value_name = "FILE")]
    metrics_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Count word occurrences over `{text}` records
    #[command(name = "word-count")]
    WordCount {
        input: PathBuf,
        output: PathBuf,
    },

    /// Top 3 documents per word by TF-IDF over `{doc_id, text}` records
    #[command(name = "inverted-index")]
    InvertedIndex {
        input: PathBuf,
        output: PathBuf,
    },

    /// Top 10 words per document by PMI over `{doc_id, text}` records
    #[command(name = "pmi")]
    Pmi {
        input: PathBuf,
        output: PathBuf,
    },

    /// Mean road speed per weekday and hour
    #[command(name = "road-speed")]
    RoadSpeed {
        /// `{edge_id, enter_time, leave_time}` records
        travel_times: PathBuf,
        /// `{edge_id, start, end}` records with `[lon, lat]` points
        road_graph: PathBuf,
        output: PathBuf,
    },
}

fn runner(args: &RunArgs) -> Runner {
    let mut sort = SortConfig::default().with_memory_limit(args.memory_limit);
    if let Some(dir) = &args.spill_dir {
        sort = sort.with_spill_dir(dir);
    }
    let runner = Runner::new().with_sort_config(sort);
    if args.metrics || args.metrics_file.is_some() {
        runner.with_metrics(MetricsCollector::new())
    } else {
        runner
    }
}

fn execute(runner: &Runner, graph: &Graph, sources: &Sources, output: &Path) -> Result<usize> {
    let stream = runner.run(graph, sources)?;
    write_jsonl_records(output, stream)
        .with_context(|| format!("writing results to {}", output.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runner = runner(&cli.run);
    let mut sources = Sources::new();

    let (name, written) = match &cli.command {
        Commands::WordCount { input, output } => {
            sources.bind_jsonl("docs", input);
            let graph = word_count_graph("docs", "text", "count");
            ("word count", execute(&runner, &graph, &sources, output)?)
        }
        Commands::InvertedIndex { input, output } => {
            sources.bind_jsonl("docs", input);
            let graph = inverted_index_graph("docs", "doc_id", "text", "tf_idf");
            ("inverted index", execute(&runner, &graph, &sources, output)?)
        }
        Commands::Pmi { input, output } => {
            sources.bind_jsonl("docs", input);
            let graph = pmi_graph("docs", "doc_id", "text", "pmi");
            ("pmi", execute(&runner, &graph, &sources, output)?)
        }
        Commands::RoadSpeed {
            travel_times,
            road_graph,
            output,
        } => {
            sources
                .bind_jsonl("travel_times", travel_times)
                .bind_jsonl("edge_lengths", road_graph);
            let graph = road_speed_graph(
                "travel_times",
                "edge_lengths",
                &RoadSpeedColumns::default(),
            );
            ("road speed", execute(&runner, &graph, &sources, output)?)
        }
    };
    info!(records = written, "{name} finished");
    println!("{name} completed: {written} records");

    if let Some(metrics) = &runner.metrics {
        if cli.run.metrics {
            metrics.print();
        }
        if let Some(path) = &cli.run.metrics_file {
            metrics.save_to_file(path)?;
        }
    }
    Ok(())
}
