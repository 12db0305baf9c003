//! # cdxtools — CDXJ / ZipNum indexing toolkit
//!
//! One binary, one subcommand per pipeline stage:
//!
//! ```text
//! cdxtools merge merged.cdxj /data/indexes/ --exclude '*-open.cdxj'
//! cdxtools filter-blocklist -i merged.cdxj -b blocklist.txt -o clean.cdxj
//! cdxtools filter-excessive-urls auto -i clean.cdxj -n 1000 -o final.cdxj
//! cdxtools addfield -i final.cdxj -f collection=AWP999 -o tagged.cdxj
//! cdxtools zipnum-encode -i tagged.cdxj -o indexes/
//! cdxtools zipnum-decode -i indexes/indexes.idx > roundtrip.cdxj
//! cdxtools search --url http://example.com/ --match-type host indexes/indexes.idx
//! ```
//!
//! Every stage accepts `-` for stdin/stdout, so the stages compose in shell
//! pipelines:
//!
//! ```text
//! cdxtools merge - dir1/ dir2/ \
//!   | cdxtools filter-blocklist -i - -b blocklist.txt \
//!   | cdxtools zipnum-encode -i - -o indexes/
//! ```
//!
//! Diagnostics go to stderr (`-v` for per-file detail, `-q` for silence);
//! data goes to stdout. Exit code 0 on success, 1 on any error.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cdxtools", version, about = "CDXJ / ZipNum web archive index tools")]
struct Cli {
    /// Verbose diagnostics on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all diagnostics (overrides --verbose).
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge sorted CDXJ files or directories into one sorted stream.
    Merge {
        /// Output file, or '-' for stdout.
        output: String,
        /// Sorted input files or directories (recursed for *.cdxj).
        #[arg(required = true)]
        paths: Vec<String>,
        /// Exclude files matching a glob pattern (repeatable).
        #[arg(long = "exclude", value_name = "PATTERN")]
        exclude: Vec<String>,
    },

    /// Drop lines matching blocklist regex patterns.
    FilterBlocklist {
        /// Input CDXJ file, or '-' for stdin.
        #[arg(short, long)]
        input: String,
        /// Blocklist file, one regex per line ('#' comments allowed).
        #[arg(short, long)]
        blocklist: String,
        /// Output file, or '-' for stdout.
        #[arg(short, long, default_value = "-")]
        output: String,
    },

    /// Suppress SURT keys with excessive capture counts.
    FilterExcessiveUrls {
        #[command(subcommand)]
        mode: ExcessiveMode,
    },

    /// Add fields to each record's JSON payload.
    Addfield {
        /// Input CDXJ file, or '-' for stdin.
        #[arg(short, long)]
        input: String,
        /// Output file, or '-' for stdout.
        #[arg(short, long, default_value = "-")]
        output: String,
        /// Constant field to add, as key=value (repeatable).
        #[arg(short = 'f', long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
        /// Named transform to apply instead of constant fields.
        #[arg(long, value_name = "NAME", conflicts_with = "fields")]
        transform: Option<String>,
        /// Fail on malformed lines instead of passing them through.
        #[arg(long)]
        strict: bool,
    },

    /// Convert sorted CDXJ into a ZipNum shard set.
    ZipnumEncode {
        /// Input CDXJ file (.gz supported), or '-' for stdin.
        #[arg(short, long)]
        input: String,
        /// Output directory for shards, index and location files.
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,
        /// Lines per index chunk.
        #[arg(short = 'c', long = "chunk-size", default_value_t = 3000)]
        chunk_size: usize,
        /// Target compressed shard size in MB.
        #[arg(short = 's', long = "shard-size", default_value_t = 100)]
        shard_size: u64,
        /// Pack everything into a single shard regardless of size.
        #[arg(long, conflicts_with = "shard_size")]
        single_shard: bool,
        /// Gzip level 1-9.
        #[arg(long = "compress-level", default_value_t = 6)]
        compress_level: u32,
        /// Parallel compression workers.
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Base name for output files (default: output directory name).
        #[arg(long)]
        base: Option<String>,
        /// Custom index filename inside the output directory.
        #[arg(long = "idx-file")]
        idx_file: Option<String>,
        /// Custom location filename inside the output directory.
        #[arg(long = "loc-file")]
        loc_file: Option<String>,
    },

    /// Convert a ZipNum shard set back to flat CDXJ.
    ZipnumDecode {
        /// Input .idx file, or '-' for an index on stdin.
        #[arg(short, long)]
        input: String,
        /// Output file, or '-' for stdout.
        #[arg(short, long, default_value = "-")]
        output: String,
        /// Base directory for shard files (default: the index's directory).
        #[arg(long = "base-dir")]
        base_dir: Option<PathBuf>,
        /// Explicit .loc file (default: auto-detect next to the index).
        #[arg(long)]
        loc: Option<PathBuf>,
        /// Parallel decompression workers.
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Skip missing or corrupt chunks with a warning.
        #[arg(long = "skip-errors")]
        skip_errors: bool,
    },

    /// Binary-search CDXJ and ZipNum indexes.
    Search {
        /// URL to search for (derived to a SURT key).
        #[arg(long, required_unless_present = "surt", conflicts_with = "surt")]
        url: Option<String>,
        /// SURT key to search for, bypassing URL derivation.
        #[arg(long)]
        surt: Option<String>,
        /// Index files, directories or glob patterns.
        #[arg(required = true)]
        files: Vec<String>,
        /// exact, prefix, host or domain.
        #[arg(long = "match-type", default_value = "exact")]
        match_type: String,
        /// Start timestamp, flexible precision (2020, 202006, ...).
        #[arg(long = "from", value_name = "TS")]
        from_ts: Option<String>,
        /// End timestamp, flexible precision.
        #[arg(long = "to", value_name = "TS")]
        to_ts: Option<String>,
        /// Field predicate, e.g. status=200 or mime~text/.* (repeatable).
        #[arg(long = "filter", value_name = "EXPR")]
        filters: Vec<String>,
        /// Maximum number of result lines.
        #[arg(long)]
        limit: Option<usize>,
        /// Re-sort results by (surt, timestamp).
        #[arg(long)]
        sort: bool,
        /// Drop consecutive duplicate (surt, timestamp) results.
        #[arg(long)]
        dedupe: bool,
        /// Exclude discovered files matching a glob pattern (repeatable).
        #[arg(long = "exclude", value_name = "PATTERN")]
        exclude: Vec<String>,
        /// Skip unreadable files and chunks with a warning.
        #[arg(long = "skip-errors")]
        skip_errors: bool,
    },
}

#[derive(Subcommand)]
enum ExcessiveMode {
    /// Report SURT keys with more than the threshold of captures.
    Find {
        /// Input CDXJ file, or '-' for stdin.
        #[arg(short, long)]
        input: String,
        /// Occurrence threshold.
        #[arg(short = 'n', long, default_value_t = filter::excessive::DEFAULT_THRESHOLD)]
        threshold: u64,
        /// Output report file, or '-' for stdout.
        #[arg(short, long, default_value = "-")]
        output: String,
    },
    /// Drop lines whose SURT is listed in a report file.
    Remove {
        /// Input CDXJ file, or '-' for stdin.
        #[arg(short, long)]
        input: String,
        /// Key list (first field per line is the SURT).
        #[arg(short = 'b', long)]
        blacklist: String,
        /// Output file, or '-' for stdout.
        #[arg(short, long, default_value = "-")]
        output: String,
    },
    /// Find and remove in one run (two passes; stdin not accepted).
    Auto {
        /// Input CDXJ file (not stdin).
        #[arg(short, long)]
        input: String,
        /// Occurrence threshold.
        #[arg(short = 'n', long, default_value_t = filter::excessive::DEFAULT_THRESHOLD)]
        threshold: u64,
        /// Output file, or '-' for stdout.
        #[arg(short, long, default_value = "-")]
        output: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics go to stderr so stdout stays a clean data channel.
fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Command) -> Result<()> {
    let cancel = cdxj::CancelToken::new();

    match command {
        Command::Merge {
            output,
            paths,
            exclude,
        } => {
            let inputs = merge::resolve_inputs(&paths, &exclude)?;
            if inputs.is_empty() {
                bail!("no files to merge after applying exclusions");
            }
            let opts = merge::MergeOptions {
                cancel,
                ..merge::MergeOptions::default()
            };
            merge::merge(inputs, &output, &opts)?;
        }

        Command::FilterBlocklist {
            input,
            blocklist,
            output,
        } => {
            let patterns = filter::blocklist::Blocklist::load(&blocklist)?;
            filter::blocklist::filter(&input, &patterns, &output, &cancel)?;
        }

        Command::FilterExcessiveUrls { mode } => run_excessive(mode, &cancel)?,

        Command::Addfield {
            input,
            output,
            fields,
            transform,
            strict,
        } => {
            let source = match (&fields[..], &transform) {
                ([], None) => bail!("addfield needs either --field or --transform"),
                (specs, None) => {
                    addfield::FieldSource::Constants(addfield::parse_field_specs(specs)?)
                }
                ([], Some(name)) => {
                    addfield::FieldSource::Transform(addfield::transforms::lookup(name)?)
                }
                // clap's conflicts_with already rejects this combination.
                (_, Some(_)) => bail!("--field and --transform are mutually exclusive"),
            };
            let opts = addfield::AddfieldOptions {
                source,
                strict,
                cancel,
            };
            addfield::addfield(&input, &output, &opts)?;
        }

        Command::ZipnumEncode {
            input,
            output,
            chunk_size,
            shard_size,
            single_shard,
            compress_level,
            workers,
            base,
            idx_file,
            loc_file,
        } => {
            let opts = zipnum::ZipnumWriterOptions {
                chunk_lines: chunk_size,
                shard_size_bytes: if single_shard {
                    u64::MAX
                } else {
                    shard_size * 1024 * 1024
                },
                compression_level: compress_level,
                workers,
                base_name: base,
                idx_name: idx_file,
                loc_name: loc_file,
                cancel,
            };
            zipnum::encode(&input, &output, &opts)?;
        }

        Command::ZipnumDecode {
            input,
            output,
            base_dir,
            loc,
            workers,
            skip_errors,
        } => {
            let opts = zipnum::ZipnumReaderOptions {
                workers,
                loc_file: loc,
                base_dir,
                skip_errors,
                cancel,
            };
            zipnum::decode(&input, &output, &opts)?;
        }

        Command::Search {
            url,
            surt,
            files,
            match_type,
            from_ts,
            to_ts,
            filters,
            limit,
            sort,
            dedupe,
            exclude,
            skip_errors,
        } => {
            let key = match (url, surt) {
                (Some(url), None) => search::surt::surt_from_url(&url)?,
                (None, Some(surt)) => surt,
                _ => bail!("exactly one of --url or --surt is required"),
            };

            let found = search::discovery::discover_files(&files, &exclude)?;
            if found.is_empty() {
                bail!("no files found matching the given patterns");
            }

            let opts = search::SearchOptions {
                match_type: match_type.parse()?,
                from_ts,
                to_ts,
                filter_exprs: filters,
                limit,
                sort,
                dedupe,
                skip_errors,
                cancel,
            };
            let results = search::search_files(&found, &key, &opts)?;

            let stdout = std::io::stdout();
            let mut out = std::io::BufWriter::new(stdout.lock());
            for line in &results {
                writeln!(out, "{line}")?;
            }
            out.flush()?;
        }
    }

    Ok(())
}

fn run_excessive(mode: ExcessiveMode, cancel: &cdxj::CancelToken) -> Result<()> {
    match mode {
        ExcessiveMode::Find {
            input,
            threshold,
            output,
        } => {
            let excessive = filter::excessive::find(&input, threshold, cancel)?;
            let mut out = cdxj::io::LineOutput::create(&output)?;
            filter::excessive::write_report(&mut out, &excessive, threshold)?;
            out.commit()?;
        }
        ExcessiveMode::Remove {
            input,
            blacklist,
            output,
        } => {
            let keys = filter::excessive::load_key_set(&blacklist)?;
            filter::excessive::remove(&input, &keys, &output, cancel)?;
        }
        ExcessiveMode::Auto {
            input,
            threshold,
            output,
        } => {
            filter::excessive::auto(&input, &output, threshold, cancel)?;
        }
    }
    Ok(())
}
