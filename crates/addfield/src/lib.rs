//! # Addfield — per-line JSON augmentation
//!
//! Enriches CDXJ records by inserting fields into each line's JSON payload.
//! Unlike the filters this stage rewrites lines, but only the payload: the
//! SURT and timestamp pass through untouched, so sort order is preserved and
//! the stage composes anywhere in a pipeline.
//!
//! Two mutually exclusive configurations:
//!
//! - **Constant fields**: a `key=value` map merged into every payload;
//!   existing keys are overwritten.
//! - **Named transform**: a statically registered
//!   `fn(surt, timestamp, &mut payload)` selected by name. This replaces the
//!   original system's runtime-loaded hook with a well-typed extension
//!   point; new transforms are added to [`transforms::REGISTRY`].
//!
//! In lenient mode (the default) malformed lines are passed through
//! unchanged and counted as skipped; strict mode fails on the first one.

pub mod transforms;

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use cdxj::io::{input_name, open_input, LineOutput};
use cdxj::{CancelToken, CdxjRecord, ParseMode};
use serde_json::{Map, Value};
use tracing::{debug, info};

pub use transforms::Transform;

/// What to do with each record's payload: merge constants or run a
/// registered transform.
pub enum FieldSource {
    Constants(Vec<(String, String)>),
    Transform(Transform),
}

/// Options for an addfield run.
pub struct AddfieldOptions {
    pub source: FieldSource,
    /// Strict mode fails on malformed lines instead of passing them through.
    pub strict: bool,
    pub cancel: CancelToken,
}

/// Processed/skipped counters reported after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddfieldStats {
    pub processed: u64,
    pub skipped: u64,
}

/// Parses repeated `key=value` arguments into a constant-field list.
///
/// # Errors
///
/// Fails on an argument without `=` or with an empty key.
pub fn parse_field_specs(specs: &[String]) -> Result<Vec<(String, String)>> {
    let mut fields = Vec::with_capacity(specs.len());
    for spec in specs {
        let Some((key, value)) = spec.split_once('=') else {
            bail!("invalid field {spec:?} (expected key=value)");
        };
        if key.is_empty() {
            bail!("invalid field {spec:?} (empty key)");
        }
        fields.push((key.to_string(), value.to_string()));
    }
    Ok(fields)
}

/// Streams `input` to `output`, augmenting each record's payload.
pub fn addfield(input: &str, output: &str, opts: &AddfieldOptions) -> Result<AddfieldStats> {
    let mut reader = open_input(input)?;
    let mut out = LineOutput::create(output)?;
    let stats = addfield_stream(&mut reader, input_name(input), &mut out, opts)?;
    out.commit()?;

    info!(
        processed = stats.processed,
        skipped = stats.skipped,
        "addfield complete"
    );
    Ok(stats)
}

/// [`addfield`] over already-open streams.
pub fn addfield_stream(
    reader: &mut dyn BufRead,
    source_name: &str,
    out: &mut dyn Write,
    opts: &AddfieldOptions,
) -> Result<AddfieldStats> {
    let mode = if opts.strict {
        ParseMode::Strict
    } else {
        ParseMode::Lenient
    };

    let mut stats = AddfieldStats::default();
    let mut line = String::new();
    let mut line_no = 0u64;

    loop {
        opts.cancel.check()?;

        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;
        let stripped = line.trim_end_matches(['\n', '\r']);

        if stripped.is_empty() {
            out.write_all(b"\n")?;
            stats.skipped += 1;
            continue;
        }

        match CdxjRecord::parse(stripped, mode, source_name, line_no) {
            Ok(mut record) => {
                apply(&opts.source, &record.surt, &record.timestamp, &mut record.json)
                    .with_context(|| format!("transform failed at {source_name}:{line_no}"))?;
                out.write_all(record.format().as_bytes())?;
                out.write_all(b"\n")?;
                stats.processed += 1;
            }
            Err(e) if !opts.strict => {
                debug!(line = line_no, error = %e, "passing malformed line through");
                out.write_all(stripped.as_bytes())?;
                out.write_all(b"\n")?;
                stats.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(stats)
}

fn apply(
    source: &FieldSource,
    surt: &str,
    timestamp: &str,
    json: &mut Map<String, Value>,
) -> Result<()> {
    match source {
        FieldSource::Constants(fields) => {
            for (key, value) in fields {
                json.insert(key.clone(), Value::String(value.clone()));
            }
            Ok(())
        }
        FieldSource::Transform(transform) => (transform.func)(surt, timestamp, json),
    }
}
