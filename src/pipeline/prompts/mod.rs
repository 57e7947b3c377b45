pub mod select;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::dataset::{ChatRow, JsonlReader, JsonlWriter, PromptRow};
use crate::telemetry::{self};
use crate::telemetry::ops::prompts::Phase as PromptsPhase;

use self::select::{filter_source, sample_rows};

#[derive(Args)]
pub struct PromptsCmd {
    /// JSONL export of a chat dataset (rows with a `messages` array)
    #[arg(long)] input: PathBuf,
    /// JSONL of {"prompt": ...}
    #[arg(long)] output: PathBuf,
    /// Keep only rows whose source tag equals this value
    #[arg(long)] source: Option<String>,
    #[arg(long, default_value = "dataset_source")] source_key: String,
    #[arg(long, default_value_t = 2000)] sample_size: usize,
    #[arg(long, default_value_t = 0)] seed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptsStats {
    pub read: usize,
    pub matched: usize,
    pub written: usize,
}

pub fn run(args: PromptsCmd) -> Result<()> {
    let log = telemetry::prompts();
    let _g = log.root_span_kv([
        ("input", args.input.display().to_string()),
        ("output", args.output.display().to_string()),
        ("source", format!("{:?}", args.source)),
        ("sample_size", args.sample_size.to_string()),
        ("seed", args.seed.to_string()),
    ]).entered();
    let t0 = Instant::now();

    let reader = JsonlReader::open(&args.input)?;
    let mut writer = JsonlWriter::create(&args.output)?;
    let stats = write_prompts(reader, &mut writer, args.source.as_deref(), &args.source_key, args.sample_size, args.seed)?;
    writer.flush()?;

    log.info(format!("Wrote {} prompts to {}", stats.written, args.output.display()));
    if stats.matched == 0 {
        log.warn(format!("no rows matched source {:?}", args.source));
    }
    if telemetry::config::json_mode() {
        log.result(&stats, t0)?;
    }
    Ok(())
}

pub fn write_prompts<R: BufRead, W: Write>(
    reader: JsonlReader<R>,
    writer: &mut JsonlWriter<W>,
    source: Option<&str>,
    source_key: &str,
    sample_size: usize,
    seed: u64,
) -> Result<PromptsStats> {
    let log = telemetry::prompts();

    let _sp = log.span(&PromptsPhase::Read).entered();
    let mut rows = Vec::new();
    for raw in reader {
        let raw = raw.context("read input row")?;
        rows.push(ChatRow::from_raw(&raw, source_key)?);
    }
    drop(_sp);
    let read = rows.len();

    let _sp = log.span(&PromptsPhase::Sample).entered();
    let rows = filter_source(rows, source);
    let matched = rows.len();
    let rows = sample_rows(rows, sample_size, seed);
    drop(_sp);
    log.debug(format!("read={} matched={} sampled={}", read, matched, rows.len()));

    let _sp = log.span(&PromptsPhase::Write).entered();
    for row in rows {
        writer.write(&PromptRow { prompt: row.prompt })?;
    }
    drop(_sp);

    Ok(PromptsStats { read, matched, written: writer.written() })
}
