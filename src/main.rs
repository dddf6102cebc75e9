//! Command-line front-end to the historical lineage of U.S. higher-education
//! institutions, based on five decades of Carnegie Classification data.
//!
//! The dataset must first be partitioned with the `prepare` subcommand, after
//! which the resulting directory can be queried directly or published on a
//! web server.

mod picker;

use anyhow::Context;
use campus_lineage::{
    config::{self, Config},
    prepare,
    progress::ProgressReport,
    Archive, LineageChain, Resolution, Result, Session, UnitId,
};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::{fmt::Write as _, num::NonZeroUsize, path::PathBuf, sync::Arc};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Explore the history of U.S. higher-education institutions
///
/// Institutions can be designated by a (caseless) prefix of their current
/// name, or by their IPEDS unit identifier.
#[derive(Parser, Debug)]
#[command(version, author)]
struct Args {
    /// Location of the partitioned dataset
    ///
    /// This can be either a local directory or an http:// or https:// URL.
    /// In both cases, it should contain an index.json file and the partition
    /// files that it refers to.
    #[arg(short, long, default_value = config::DEFAULT_SOURCE)]
    source: Box<str>,

    /// Max number of search results
    #[arg(short = 'n', long, default_value = "50")]
    max_candidates: NonZeroUsize,

    /// What should be done
    #[command(subcommand)]
    command: Command,
}
//
impl Args {
    /// Decode and validate CLI arguments
    pub fn parse_and_check() -> Result<Self> {
        // Decode CLI arguments
        let args = Args::parse();

        // Check CLI arguments for basic sanity
        match &args.command {
            Command::Search { query } | Command::Show { query, .. } => {
                anyhow::ensure!(
                    !query.trim().is_empty(),
                    "please specify an institution name or identifier"
                );
            }
            Command::Prepare {
                input, output_dir, ..
            } => {
                anyhow::ensure!(
                    input != output_dir,
                    "the partitioned dataset cannot replace the source data"
                );
            }
        }
        Ok(args)
    }

    /// Digest arguments into the archive configuration
    pub fn config(&self) -> Arc<Config> {
        let mut config = Config {
            source: self.source.clone(),
            max_candidates: self.max_candidates,
            ..Config::default()
        };
        if let Command::Prepare { partition_size, .. } = &self.command {
            config.partition_size = *partition_size;
        }
        Arc::new(config)
    }
}

/// Subcommands
#[derive(Subcommand, Debug)]
enum Command {
    /// List the institutions matching a query
    Search {
        /// Institution name prefix or identifier
        query: String,
    },

    /// Show the lineage and timeline of an institution
    Show {
        /// Institution name prefix or identifier
        query: String,

        /// Keep offering to show related institutions until asked to quit
        #[arg(short, long, default_value_t = false)]
        browse: bool,
    },

    /// Partition a flat table of yearly observations into a dataset
    ///
    /// The input is a tab-separated file without header (possibly gzipped,
    /// as signaled by a .gz extension) with one row per institution and per
    /// year. Relationship links only need to be stated on one side, the
    /// other side is filled in automatically.
    Prepare {
        /// Flat table of yearly observations
        input: PathBuf,

        /// Directory where partitions and index should be written
        output_dir: PathBuf,

        /// Number of institutions per partition
        ///
        /// Larger partitions mean fewer fetches when following long lineages,
        /// but more data to download for every fetch.
        #[arg(short, long, default_value = "6000")]
        partition_size: NonZeroUsize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    setup_logging().map_err(|e| anyhow::format_err!("{e}"))?;

    // Decode CLI arguments
    let args = Args::parse_and_check()?;
    let config = args.config();

    // Set up progress reporting
    let report = ProgressReport::new();

    // Run the requested command
    let output = match args.command {
        Command::Prepare {
            input, output_dir, ..
        } => {
            let index = prepare::prepare(config, &input, &output_dir, &report).await?;
            format!(
                "Wrote {} institutions into {} partitions\n",
                index.num_institutions(),
                index.len()
            )
        }
        Command::Search { query } => {
            let archive = open_archive(config, &report).await?;
            let candidates = archive
                .search(&query)
                .await
                .with_context(|| format!("searching for {query:?}"))?;
            let mut output = String::new();
            if candidates.is_empty() {
                writeln!(output, "No institution matches {query:?}")?;
            }
            for candidate in candidates {
                writeln!(output, "{candidate}")?;
            }
            output
        }
        Command::Show { query, browse } => {
            let archive = open_archive(config, &report).await?;
            return show(Session::new(Arc::new(archive)), &query, browse).await;
        }
    };
    print(&output).await
}

/// Open the configured dataset
async fn open_archive(config: Arc<Config>, report: &ProgressReport) -> Result<Archive> {
    let source = config.partition_source(report);
    let location = config.source.clone();
    Archive::open(config, source)
        .await
        .with_context(|| format!("opening dataset at {location}"))
}

/// Show an institution's lineage, then maybe move on to related institutions
async fn show(session: Session, query: &str, browse: bool) -> Result<()> {
    let mut unit_id = match session
        .archive()
        .resolve_name(query)
        .await
        .with_context(|| format!("searching for {query:?}"))?
    {
        Resolution::NotFound => return print(&format!("No institution matches {query:?}\n")).await,
        Resolution::Unique(candidate) => candidate.unit_id,
        Resolution::Ambiguous(candidates) => picker::pick_candidate(query, &candidates)?,
    };
    loop {
        let tagged = session.lineage(unit_id).await;
        let Some(chain) = session.accept(tagged) else {
            continue;
        };
        let chain = chain.with_context(|| format!("resolving the lineage of {unit_id}"))?;
        print(&render(&chain)?).await?;
        if !browse {
            return Ok(());
        }
        match picker::pick_related(&chain)? {
            Some(next) => unit_id = next,
            None => return Ok(()),
        }
    }
}

/// Render a lineage chain and its timeline
fn render(chain: &LineageChain) -> Result<String> {
    let name_of = |unit_id: UnitId| {
        chain
            .record(unit_id)
            .map_or("<unavailable>", |record| &*record.current_name)
    };
    let mut output = String::new();
    writeln!(output, "Lineage of {} [{}]", name_of(chain.root()), chain.root())?;
    for node in chain.nodes() {
        writeln!(output, "  {:<11} {} [{}]", node.years.to_string(), node.name, node.unit_id)?;
        for edge in &node.edges {
            let target_name = edge.target_name.as_deref().unwrap_or("<unavailable>");
            writeln!(
                output,
                "  {:<11}   {} {target_name} [{}] in {}",
                "", edge.kind, edge.target, edge.year
            )?;
        }
    }
    if !chain.warnings().is_empty() {
        writeln!(output, "Incomplete lineage:")?;
        for warning in chain.warnings() {
            writeln!(output, "  {warning}")?;
        }
    }
    if !chain.conflicts().is_empty() {
        writeln!(output, "Inconsistent relationship years:")?;
        for conflict in chain.conflicts() {
            writeln!(output, "  {conflict}")?;
        }
    }

    writeln!(output, "Timeline:")?;
    for event in &chain.timeline() {
        writeln!(
            output,
            "  {}  {} [{}]: {}",
            event.year,
            name_of(event.unit_id),
            event.unit_id,
            event.describe_changes()
        )?;
    }
    Ok(output)
}

/// Write some text to stdout
async fn print(text: &str) -> Result<()> {
    let mut stdout = BufWriter::new(tokio::io::stdout());
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

/// Set up logging
fn setup_logging() -> syslog::Result<()> {
    syslog::init(
        syslog::Facility::LOG_USER,
        if cfg!(feature = "log-trace") {
            LevelFilter::Trace
        } else if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        None,
    )
}
