use clap::Parser;
use log::{info, warn};
use rayon::ThreadPoolBuilder;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::num::NonZeroUsize;
use std::str::FromStr;
use triededup::collapse::{
    CollapseConfig, CollapseOutput, DedupError, OutputMode, UnknownSymbolPolicy,
};
use triededup::engine::{DedupEngine, Engine};
use triededup::output::{write_output, OutputFormat};
use triededup::reads::{load_reads, QualityMask, ReadRecord};

/// Common options shared between all commands
#[derive(Parser, Debug)]
struct CommonOpts {
    /// Path to the reads (FASTA, FASTQ, SAM, BAM or one sequence per line; optionally BGZF-compressed)
    #[clap(short = 'i', long, value_parser)]
    input: String,

    /// Symbols that may appear in reads
    #[clap(short = 's', long, value_parser, default_value = "ACGTN")]
    symbols: String,

    /// Wildcard symbols; every one after the first is treated as the first
    #[clap(short = 'm', long, value_parser, default_value = "N")]
    ambiguous: String,

    /// Reads with more wildcard symbols than this are filtered out
    #[clap(short = 'N', long, value_parser, default_value_t = 500, allow_negative_numbers = true)]
    max_missing: i64,

    /// Reads are already sorted by ascending number of wildcard symbols
    #[clap(long, action)]
    sorted: bool,

    /// Fail on reads with symbols outside --symbols instead of keeping them unmatched
    #[clap(long, action)]
    strict_symbols: bool,

    /// FASTQ/SAM/BAM bases with a lower quality are turned into the first wildcard symbol (0 = off)
    #[clap(short = 'q', long, value_parser, default_value_t = 0)]
    min_base_quality: u8,

    /// ASCII offset of FASTQ quality characters
    #[clap(long, value_parser, default_value_t = 33)]
    quality_shift: u8,

    /// Number of threads for parallel processing.
    #[clap(short = 't', long, value_parser, default_value_t = NonZeroUsize::new(4).unwrap())]
    num_threads: NonZeroUsize,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "0")]
    verbose: u8,
}

impl CommonOpts {
    fn quality_mask(&self) -> QualityMask {
        QualityMask {
            min_quality: self.min_base_quality,
            offset: self.quality_shift,
            wildcard: self.ambiguous.as_bytes().first().copied().unwrap_or(b'N'),
        }
    }

    fn collapse_config(&self, output_mode: OutputMode) -> CollapseConfig {
        CollapseConfig {
            alphabet: self.symbols.clone(),
            wildcard_symbols: self.ambiguous.clone(),
            max_ambiguous: self.max_missing,
            assume_sorted: self.sorted,
            output_mode,
            unknown_symbols: if self.strict_symbols {
                UnknownSymbolPolicy::Reject
            } else {
                UnknownSymbolPolicy::Ignore
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Trie,
    Pairwise,
    /// Exact dedup, filter and sort only
    SortUniq,
}

impl FromStr for Function {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trie" => Ok(Function::Trie),
            "pairwise" => Ok(Function::Pairwise),
            "sortuniq" => Ok(Function::SortUniq),
            _ => Err(format!(
                "Unknown function '{}'. Expected one of: trie, pairwise, sortuniq",
                s
            )),
        }
    }
}

/// Command-line tool for collapsing reads that differ only at wildcard positions.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Collapse duplicate reads and write the canonical ones
    Dedup {
        #[clap(flatten)]
        common: CommonOpts,

        /// Duplicate finder: trie, pairwise or sortuniq
        #[clap(short = 'f', long, value_parser, default_value = "trie")]
        function: Function,

        /// Output format: readID, sequence, fasta, dup2uniq or uniq2dup
        #[clap(short = 'o', long, value_parser, default_value = "readID")]
        output_format: OutputFormat,

        /// Write results to this file instead of standard output
        #[clap(short = 'O', long, value_parser)]
        output: Option<String>,

        /// Ignore leading and trailing wildcards (pairwise only)
        #[clap(long, action)]
        inner: bool,
    },
    /// Run both engines on the same reads and compare their results
    Compare {
        #[clap(flatten)]
        common: CommonOpts,

        /// Ignore leading and trailing wildcards in the pairwise engine
        #[clap(long, action)]
        inner: bool,
    },
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    match args {
        Args::Dedup {
            common,
            function,
            output_format,
            output,
            inner,
        } => {
            if function == Function::SortUniq && output_format.requires_mapping() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "sortuniq only produces a list of reads; use readID, sequence or fasta output",
                ));
            }
            let output_mode = match function {
                Function::SortUniq => OutputMode::ExactSortOnly,
                _ if output_format.requires_mapping() => OutputMode::FullMapping,
                _ => OutputMode::UniqueIndices,
            };
            let config = common.collapse_config(output_mode);
            config.validate().map_err(|e| dedup_error("Invalid options", e))?;

            let reads = initialize(&common)?;
            let sequences: Vec<Vec<u8>> = reads.iter().map(|r| r.sequence.clone()).collect();
            let engine = match function {
                Function::Pairwise => Engine::Pairwise { inner },
                _ => {
                    if inner {
                        warn!("--inner only applies to the pairwise function and is ignored");
                    }
                    Engine::Trie
                }
            };

            let result = run_engine(engine.as_dyn().as_ref(), &sequences, &config)?;

            let mut out: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(File::create(path).map_err(|e| {
                    io::Error::new(
                        e.kind(),
                        format!("Failed to create output file '{}': {}", path, e),
                    )
                })?)),
                None => Box::new(BufWriter::new(io::stdout().lock())),
            };
            let written = write_output(&mut out, &reads, &result.result, output_format)?;
            out.flush()?;
            info!(
                "Wrote {} canonical reads to {}",
                written,
                output.as_deref().unwrap_or("standard output")
            );
        }
        Args::Compare { common, inner } => {
            let config = common.collapse_config(OutputMode::FullMapping);
            config.validate().map_err(|e| dedup_error("Invalid options", e))?;

            let reads = initialize(&common)?;
            let sequences: Vec<Vec<u8>> = reads.into_iter().map(|r| r.sequence).collect();

            let engines = [Engine::Trie, Engine::Pairwise { inner }];
            let mut outputs = Vec::with_capacity(engines.len());
            for engine in engines {
                let engine = engine.as_dyn();
                let output = run_engine(engine.as_ref(), &sequences, &config)?;
                info!(
                    "{}: {} unique reads in {:.3} s",
                    engine.name(),
                    output.stats.canonical,
                    output.elapsed.as_secs_f64()
                );
                outputs.push((engine.name(), output));
            }

            println!("engine\tcanonical\tseconds");
            for (name, output) in &outputs {
                println!(
                    "{}\t{}\t{:.3}",
                    name,
                    output.stats.canonical,
                    output.elapsed.as_secs_f64()
                );
            }
            let differing = canonical_status_differences(&outputs[0].1, &outputs[1].1);
            println!("differing\t{}", differing);
        }
    }

    Ok(())
}

/// Initialize logger and thread pool, then load the reads
fn initialize(common: &CommonOpts) -> io::Result<Vec<ReadRecord>> {
    // Initialize logger based on verbosity
    env_logger::Builder::new()
        .filter_level(match common.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    // Configure thread pool
    ThreadPoolBuilder::new()
        .num_threads(common.num_threads.into())
        .build_global()
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to configure thread pool: {}", e),
            )
        })?;

    load_reads(&common.input, common.num_threads, &common.quality_mask())
}

fn dedup_error(context: &str, e: DedupError) -> io::Error {
    let kind = match e {
        DedupError::Config(_) => io::ErrorKind::InvalidInput,
        DedupError::Alphabet(_) | DedupError::UnknownSymbol { .. } => io::ErrorKind::InvalidData,
    };
    io::Error::new(kind, format!("{}: {}", context, e))
}

fn run_engine(
    engine: &dyn DedupEngine,
    sequences: &[Vec<u8>],
    config: &CollapseConfig,
) -> io::Result<CollapseOutput> {
    engine.collapse(sequences, config).map_err(|e| {
        dedup_error(
            &format!("Failed to deduplicate with the {} engine", engine.name()),
            e,
        )
    })
}

/// Number of reads that are canonical under one result but not the other
fn canonical_status_differences(a: &CollapseOutput, b: &CollapseOutput) -> usize {
    match (a.result.as_mapping(), b.result.as_mapping()) {
        (Some(a), Some(b)) => a
            .iter()
            .zip(b)
            .enumerate()
            .filter(|(i, (x, y))| (**x == Some(*i)) != (**y == Some(*i)))
            .count(),
        _ => 0,
    }
}
