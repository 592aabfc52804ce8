#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

// ========================================================================================
//
//                          THE COMMAND-LINE FRONT END: RSIDCMP
//
// ========================================================================================
//
// Every subcommand takes the call files as positional arguments, builds the dataset
// collection once, and prints its answer to stdout. Diagnostics go through `log`.

use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::info;
use rsidcmp::config::SessionConfig;
use rsidcmp::export::{export_tables, save_json};
use rsidcmp::progress::{LoadProgress, LoadStage};
use rsidcmp::query::{search_by_chromosome_window, search_marker};
use rsidcmp::{
    DatasetCollection, IntersectionIndex, Metric, SimilarityMatrix, build_phylogeny, score,
};
use std::error::Error;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "rsidcmp",
    version,
    about = "Compare personal genotype call files across shared rsids",
    long_about = "Loads tab-separated genotype call files (rsid, chromosome, position, genotype), \
                 finds the markers shared by every file, and answers lookups, similarity \
                 and clustering questions over them."
)]
struct Cli {
    /// TOML session file with analysis and parsing defaults
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct SourceArgs {
    /// Genotype call files (plain text or .gz)
    #[arg(value_name = "CALL_FILE", required = true, num_args = 1..)]
    sources: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Marker counts, size ranking and the shared marker set
    #[command(about = "Summarize the loaded call files")]
    Summary {
        /// Similarity metric used to report the most similar pair
        #[arg(long)]
        metric: Option<String>,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Look one rsid up in every file
    #[command(about = "Report each file's call for one rsid")]
    Search {
        #[arg(long, value_name = "RSID")]
        rsid: String,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Shared markers strictly inside a chromosome window
    #[command(about = "List shared markers between two positions on a chromosome")]
    Window {
        #[arg(long)]
        chromosome: String,

        /// Exclusive lower bound
        #[arg(long)]
        min: u64,

        /// Exclusive upper bound
        #[arg(long)]
        max: u64,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Score two files against each other
    #[command(about = "Count agreeing calls between two files")]
    Compare {
        #[arg(value_name = "FIRST")]
        first: PathBuf,

        #[arg(value_name = "SECOND")]
        second: PathBuf,

        /// identity or halfidentity
        #[arg(long)]
        metric: Option<String>,
    },

    /// Greedy similarity-ordered join tree of all files
    #[command(about = "Build the similarity join tree")]
    Phylogeny {
        /// identity or halfidentity
        #[arg(long)]
        metric: Option<String>,

        /// Label each leaf with this rsid's call
        #[arg(long, value_name = "RSID")]
        marker: Option<String>,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Write every file's records as a single JSON document
    #[command(about = "Export the collection as JSON")]
    ExportJson {
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Write one SQLite table per file, skipping tables that exist
    #[command(about = "Export one database table per file")]
    ExportTables {
        #[arg(long, value_name = "PATH", default_value = "AllData.db")]
        database: PathBuf,

        #[command(flatten)]
        sources: SourceArgs,
    },
}

type CliResult = Result<(), Box<dyn Error>>;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { config, command } = cli;

    let session = match config {
        Some(path) => match SessionConfig::load(&path) {
            Ok(session) => session,
            Err(e) => {
                eprintln!("Error loading {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => SessionConfig::default(),
    };

    let result = match command {
        Some(Commands::Summary { metric, sources }) => {
            run_summary(&session, metric.as_deref(), &sources.sources)
        }
        Some(Commands::Search { rsid, sources }) => run_search(&session, &rsid, &sources.sources),
        Some(Commands::Window {
            chromosome,
            min,
            max,
            sources,
        }) => run_window(&session, &chromosome, min, max, &sources.sources),
        Some(Commands::Compare {
            first,
            second,
            metric,
        }) => run_compare(&session, metric.as_deref(), first, second),
        Some(Commands::Phylogeny {
            metric,
            marker,
            sources,
        }) => run_phylogeny(&session, metric.as_deref(), marker, &sources.sources),
        Some(Commands::ExportJson { output, sources }) => {
            run_export_json(&session, output, &sources.sources)
        }
        Some(Commands::ExportTables { database, sources }) => {
            run_export_tables(&session, database, &sources.sources)
        }
        None => {
            let printed = Cli::command().print_help();
            println!();
            printed.map_err(Into::into)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

// ========================================================================================
//                                   Loading
// ========================================================================================

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let draw_target = if std::io::stderr().is_terminal() {
            ProgressDrawTarget::stderr_with_hz(20)
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = ProgressBar::with_draw_target(None, draw_target);
        if let Ok(style) =
            ProgressStyle::with_template("> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        Self { bar }
    }
}

impl LoadProgress for BarProgress {
    fn on_stage_start(&self, stage: LoadStage, total_sources: usize) {
        if stage == LoadStage::Parsing {
            self.bar.set_length(total_sources as u64);
            self.bar.set_message(stage.to_string());
        }
    }

    fn on_source_loaded(&self, source: &str, markers: usize) {
        self.bar.inc(1);
        self.bar.set_message(format!("{source}: {markers} markers"));
    }

    fn on_stage_finish(&self, stage: LoadStage) {
        if stage == LoadStage::Parsing {
            self.bar.finish_and_clear();
        }
    }
}

fn load(session: &SessionConfig, sources: &[PathBuf]) -> Result<DatasetCollection, Box<dyn Error>> {
    let progress = BarProgress::new();
    let collection =
        DatasetCollection::build_with_progress(sources, &session.load_options(), &progress)?;
    Ok(collection)
}

fn resolve_metric(session: &SessionConfig, flag: Option<&str>) -> Metric {
    flag.map(Metric::from_name)
        .unwrap_or(session.analysis.metric)
}

// ========================================================================================
//                                  Subcommands
// ========================================================================================

fn run_summary(session: &SessionConfig, metric: Option<&str>, sources: &[PathBuf]) -> CliResult {
    let collection = load(session, sources)?;
    let index = IntersectionIndex::compute(&collection);

    println!("source\tmarkers");
    for (name, count) in collection.ranked_by_size() {
        println!("{name}\t{count}");
    }
    let (largest, largest_count) = collection.largest();
    let (smallest, smallest_count) = collection.smallest();
    println!("largest\t{largest}\t{largest_count}");
    println!("smallest\t{smallest}\t{smallest_count}");
    println!("shared_markers\t{}", index.len());

    if collection.len() >= 2 {
        let metric = resolve_metric(session, metric);
        let matrix = SimilarityMatrix::compute(&index.filtered_view(&collection), metric);
        if let Some(best) = matrix.best_pair() {
            println!(
                "most_similar\t{}\t{}\t{} ({metric})",
                best.first, best.second, best.score
            );
        }
    }
    Ok(())
}

fn run_search(session: &SessionConfig, rsid: &str, sources: &[PathBuf]) -> CliResult {
    let collection = load(session, sources)?;
    for hit in search_marker(&collection, rsid) {
        println!("{}\t{}", hit.source, hit.call);
    }
    Ok(())
}

fn run_window(
    session: &SessionConfig,
    chromosome: &str,
    min: u64,
    max: u64,
    sources: &[PathBuf],
) -> CliResult {
    let collection = load(session, sources)?;
    let index = IntersectionIndex::compute(&collection);
    let view = index.filtered_view(&collection);

    let hits = search_by_chromosome_window(&view, chromosome, min, max);
    info!(
        "{} shared markers on chromosome {chromosome} between {min} and {max}",
        hits.len()
    );
    for hit in hits {
        let calls: Vec<String> = hit
            .calls
            .iter()
            .map(|c| format!("{}={}", c.source, c.call))
            .collect();
        println!(
            "{}\t{}\t{}\t{}",
            hit.marker_id,
            hit.chromosome,
            hit.position,
            calls.join("\t")
        );
    }
    Ok(())
}

const DISTINCT_PAIR_ERROR: &str = "compare needs two distinct call files";

/// The same file given twice collapses to one source.
fn ensure_distinct_pair(collection: &DatasetCollection) -> CliResult {
    if collection.len() < 2 {
        return Err(DISTINCT_PAIR_ERROR.into());
    }
    Ok(())
}

fn run_compare(
    session: &SessionConfig,
    metric: Option<&str>,
    first: PathBuf,
    second: PathBuf,
) -> CliResult {
    let metric = resolve_metric(session, metric);
    let first_name = first.display().to_string();
    let second_name = second.display().to_string();
    let collection = load(session, &[first, second])?;
    ensure_distinct_pair(&collection)?;
    let index = IntersectionIndex::compute(&collection);
    let view = index.filtered_view(&collection);

    let (Some(a), Some(b)) = (view.get(&first_name), view.get(&second_name)) else {
        return Err(DISTINCT_PAIR_ERROR.into());
    };
    let similarity = score(a, b, metric);
    let percent = if index.is_empty() {
        0.0
    } else {
        100.0 * similarity.count as f64 / index.len() as f64
    };
    println!("shared_markers\t{}", index.len());
    println!("agreeing_markers\t{}\t{percent:.2}%\t({metric})", similarity.count);
    Ok(())
}

fn run_phylogeny(
    session: &SessionConfig,
    metric: Option<&str>,
    marker: Option<String>,
    sources: &[PathBuf],
) -> CliResult {
    let metric = resolve_metric(session, metric);
    let marker = marker.or_else(|| session.analysis.annotate_marker.clone());
    let collection = load(session, sources)?;
    let tree = build_phylogeny(&collection, None, metric, marker.as_deref())?;
    println!("{tree}");
    Ok(())
}

fn run_export_json(session: &SessionConfig, output: PathBuf, sources: &[PathBuf]) -> CliResult {
    let collection = load(session, sources)?;
    save_json(&collection, &output)?;
    Ok(())
}

fn run_export_tables(session: &SessionConfig, database: PathBuf, sources: &[PathBuf]) -> CliResult {
    let collection = load(session, sources)?;
    let summary = export_tables(&collection, &database)?;
    println!(
        "tables written: {}, skipped: {}",
        summary.written.len(),
        summary.skipped.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsidcmp::{GenotypeStore, MarkerRecord};

    fn store(name: &str) -> GenotypeStore {
        GenotypeStore::from_records(
            name,
            vec![("rs1".to_string(), MarkerRecord::new("1", 10, "AA"))],
        )
    }

    #[test]
    fn same_file_twice_is_not_a_pair() {
        let collection = DatasetCollection::from_stores(vec![store("a.txt"), store("a.txt")]).unwrap();
        let err = ensure_distinct_pair(&collection).unwrap_err();
        assert_eq!(err.to_string(), DISTINCT_PAIR_ERROR);
    }

    #[test]
    fn two_files_are_a_pair() {
        let collection = DatasetCollection::from_stores(vec![store("a.txt"), store("b.txt")]).unwrap();
        assert!(ensure_distinct_pair(&collection).is_ok());
    }
}
