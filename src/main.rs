//! Command-line front end: normalize a listing file into a dataset file.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::LevelFilter;

use asm_rebase::{
    batch::BatchNormalizer,
    format::{FileSink, OutputFormat, WriterSink},
    resolve::Dialect,
    source::ListingSource,
};

/// Rewrite branch targets of disassembled functions into instruction positions
#[derive(Debug, Parser)]
#[command(name = "asm-rebase", version, about)]
struct Args {
    /// Function listing (JSON) exported from a disassembler
    listing: PathBuf,

    /// Output file; "-" writes to stdout. Defaults to <LISTING>.rebased.<ext>
    #[arg(short, long)]
    output: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// JSON file describing the disassembler's branch and label syntax
    #[arg(long)]
    dialect: Option<PathBuf>,

    /// Branch mnemonic prefix (repeatable); replaces the dialect's prefixes
    #[arg(long = "branch-prefix", value_name = "PREFIX")]
    branch_prefixes: Vec<String>,

    /// Normalize functions in parallel
    #[arg(long)]
    parallel: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    fn dialect(&self) -> Result<Dialect> {
        let mut dialect = match &self.dialect {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Failed to open dialect {}", path.display()))?;
                serde_json::from_reader(BufReader::new(file))
                    .with_context(|| format!("Failed to parse dialect {}", path.display()))?
            }
            None => Dialect::default(),
        };

        if !self.branch_prefixes.is_empty() {
            dialect.branch_prefixes = self.branch_prefixes.clone();
        }

        Ok(dialect)
    }
}

/// `<listing>.rebased.<ext>` next to the input
fn default_output_path(listing: &Path, format: OutputFormat) -> PathBuf {
    let mut name = listing.as_os_str().to_owned();
    name.push(format!(".rebased.{}", format.extension()));
    PathBuf::from(name)
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();

    let dialect = args.dialect()?;
    log::debug!("Dialect: {}", dialect);

    let normalizer = BatchNormalizer::with_dialect(&dialect)
        .context("Invalid dialect")?
        .parallel(args.parallel);

    let source = ListingSource::from_path(&args.listing)
        .with_context(|| format!("Failed to load listing {}", args.listing.display()))?;

    let dataset = match args.output.as_deref() {
        Some("-") => {
            let mut sink = WriterSink::new(io::stdout().lock(), args.format);
            normalizer.run_into(&source, &mut sink)
        }
        Some(path) => {
            let mut sink = FileSink::new(path, args.format);
            normalizer.run_into(&source, &mut sink)
        }
        None => {
            let path = default_output_path(&args.listing, args.format);
            let mut sink = FileSink::new(&path, args.format);
            normalizer.run_into(&source, &mut sink)
        }
    }
    .context("Normalization failed")?;

    log::info!(
        "Done: {} functions, {} instructions",
        dataset.len(),
        dataset.instruction_count()
    );

    Ok(())
}
