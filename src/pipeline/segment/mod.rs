pub mod logic;

use std::io::{BufRead, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::dataset::{FieldNames, JsonlReader, JsonlWriter, SourceRow};
use crate::telemetry::{self};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::segment::{Phase as SegmentPhase, Segment};
use crate::template::{ChatTemplate, PromptRenderer};
use crate::tokenizer::{HfTokenizer, ModelAssets, TokenCodec};

use self::logic::segment;

#[derive(Args)]
pub struct SegmentCmd {
    /// JSONL with prompt/completion fields
    #[arg(long)] input: PathBuf,
    /// JSONL of (context, chunk) training records
    #[arg(long)] output: PathBuf,
    /// Draft model checkpoint dir or Hub repo id (tokenizer + chat template)
    #[arg(long, default_value = "meta-llama/Llama-3.2-1B-Instruct")] model: String,
    /// Tokens per chunk
    #[arg(long, default_value = "16")] stride: NonZeroUsize,
    #[arg(long, default_value = "prompt")] prompt_key: String,
    #[arg(long, default_value = "completion")] completion_key: String,
    #[arg(long, default_value = "idx")] id_key: String,
    /// Stop after this many input rows
    #[arg(long)] max_samples: Option<usize>,
    /// Append the assistant generation prompt when rendering the chat template
    #[arg(long, default_value_t = false)] add_generation_prompt: bool,
}

#[derive(Debug, Clone)]
pub struct SegmentOptions {
    pub stride: NonZeroUsize,
    pub fields: FieldNames,
    pub max_samples: Option<usize>,
    pub add_generation_prompt: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentStats {
    pub rows: usize,
    pub empty_rows: usize,
    pub records: usize,
}

pub fn run(args: SegmentCmd) -> Result<()> {
    let log = telemetry::segment();
    let _g = log.root_span_kv([
        ("input", args.input.display().to_string()),
        ("output", args.output.display().to_string()),
        ("model", args.model.clone()),
        ("stride", args.stride.to_string()),
        ("max_samples", format!("{:?}", args.max_samples)),
        ("add_generation_prompt", args.add_generation_prompt.to_string()),
    ]).entered();
    let t0 = Instant::now();

    let _sp = log.span(&SegmentPhase::LoadModel).entered();
    let assets = ModelAssets::resolve(&args.model)
        .with_context(|| format!("resolve model {}", args.model))?;
    let tok = HfTokenizer::from_file(&assets.tokenizer_json)?
        .with_space_cleanup(assets.clean_up_tokenization_spaces());
    let template = ChatTemplate::from_assets(&assets)
        .with_context(|| format!("load chat template for {}", args.model))?;
    log.debug_kv("model loaded", [
        ("vocab_size", tok.vocab_size().to_string()),
        ("chat_template", assets.chat_template().is_some().to_string()),
        ("clean_up_tokenization_spaces", assets.clean_up_tokenization_spaces().to_string()),
    ]);
    drop(_sp);

    let reader = JsonlReader::open(&args.input)?;
    let mut writer = JsonlWriter::create(&args.output)?;
    let opts = SegmentOptions {
        stride: args.stride,
        fields: FieldNames { prompt: args.prompt_key, completion: args.completion_key, id: args.id_key },
        max_samples: args.max_samples,
        add_generation_prompt: args.add_generation_prompt,
    };

    let stats = write_segments(reader, &mut writer, &tok, &template, &opts, &log)?;
    writer.flush()?;

    log.totals(stats.rows, stats.empty_rows, stats.records);
    log.info(format!("Wrote {} rows to {}", stats.records, args.output.display()));

    if telemetry::config::json_mode() {
        #[derive(Serialize)]
        struct SegmentResult<'a> { output: String, stride: usize, #[serde(flatten)] stats: &'a SegmentStats }
        log.result(&SegmentResult {
            output: args.output.display().to_string(),
            stride: opts.stride.get(),
            stats: &stats,
        }, t0)?;
    }
    Ok(())
}

/// Stream every source row through the engine into `writer`, in input order.
///
/// Records already written stay written if a later row fails.
pub fn write_segments<R, W>(
    reader: JsonlReader<R>,
    writer: &mut JsonlWriter<W>,
    codec: &dyn TokenCodec,
    renderer: &dyn PromptRenderer,
    opts: &SegmentOptions,
    log: &LogCtx<Segment>,
) -> Result<SegmentStats>
where
    R: BufRead,
    W: Write,
{
    let mut stats = SegmentStats::default();

    for raw in reader {
        let raw = raw.context("read input row")?;
        if opts.max_samples.is_some_and(|cap| raw.row_index >= cap) { break; }

        let row = SourceRow::from_raw(&raw, &opts.fields)?;
        stats.rows += 1;
        let source_id = row.source_id();
        if !row.missing.is_empty() {
            log.warn(format!("row idx={} (line {}) missing field(s) {:?}, treated as empty", source_id, raw.line, row.missing));
        }

        let _sp = log.span(&SegmentPhase::Render).entered();
        let prompt = renderer
            .render(&row.prompt_text, opts.add_generation_prompt)
            .with_context(|| format!("render prompt for idx={}", source_id))?;
        drop(_sp);

        let _sp = log.span(&SegmentPhase::Tokenize).entered();
        let ids = codec
            .encode(&row.completion_text)
            .with_context(|| format!("tokenize completion for idx={}", source_id))?;
        drop(_sp);

        if ids.is_empty() {
            stats.empty_rows += 1;
            log.row_summary(source_id, 0, 0);
            continue;
        }

        let _sp = log.span(&SegmentPhase::Write).entered();
        let mut written = 0usize;
        for rec in segment(codec, source_id, &prompt, &ids, opts.stride) {
            writer.write(&rec?)?;
            written += 1;
        }
        drop(_sp);

        stats.records += written;
        log.row_summary(source_id, ids.len(), written);
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::dataset::TrainingRecord;
    use crate::template::testing::PrefixRenderer;
    use crate::tokenizer::testing::CharCodec;

    fn opts(stride: usize) -> SegmentOptions {
        SegmentOptions {
            stride: NonZeroUsize::new(stride).unwrap(),
            fields: FieldNames::default(),
            max_samples: None,
            add_generation_prompt: false,
        }
    }

    fn run_on(input: &str, opts: &SegmentOptions) -> (Result<SegmentStats>, Vec<TrainingRecord>) {
        let mut writer = JsonlWriter::new(Vec::new());
        let res = write_segments(
            JsonlReader::new(Cursor::new(input)),
            &mut writer,
            &CharCodec,
            &PrefixRenderer("P:"),
            opts,
            &telemetry::segment(),
        );
        let out = String::from_utf8(writer.into_inner()).unwrap();
        let recs = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        (res, recs)
    }

    #[test]
    fn writes_records_in_emission_order() {
        let input = "{\"prompt\":\"\",\"completion\":\"ABCDEFGHI\"}\n";
        let (res, recs) = run_on(input, &opts(4));
        assert_eq!(res.unwrap(), SegmentStats { rows: 1, empty_rows: 0, records: 3 });
        assert_eq!(recs[2], TrainingRecord {
            source_id: 0,
            chunk_index: 2,
            context_text: "P:ABCDEFGH".into(),
            target_text: "I".into(),
        });
    }

    #[test]
    fn empty_completion_row_is_skipped_and_next_row_processed() {
        let input = "{\"prompt\":\"a\",\"completion\":\"\"}\n{\"prompt\":\"b\",\"completion\":\"xy\"}\n";
        let (res, recs) = run_on(input, &opts(16));
        assert_eq!(res.unwrap(), SegmentStats { rows: 2, empty_rows: 1, records: 1 });
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].source_id, 1);
        assert_eq!(recs[0].chunk_index, 0);
        assert_eq!(recs[0].context_text, "P:b");
        assert_eq!(recs[0].target_text, "xy");
    }

    #[test]
    fn row_without_id_uses_position() {
        let mut input = String::new();
        for i in 0..5 {
            input.push_str(&format!("{{\"idx\":{},\"prompt\":\"p\",\"completion\":\"c\"}}\n", 100 + i));
        }
        input.push('\n');
        input.push_str("{\"prompt\":\"p\",\"completion\":\"abcdef\"}\n");
        let (res, recs) = run_on(&input, &opts(2));
        assert_eq!(res.unwrap().records, 8);
        let last_row: Vec<_> = recs.iter().filter(|r| r.source_id == 5).collect();
        assert_eq!(last_row.len(), 3);
        assert_eq!(last_row.iter().map(|r| r.chunk_index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(recs[0].source_id, 100);
    }

    #[test]
    fn chunk_index_resets_per_row() {
        let input = "{\"prompt\":\"\",\"completion\":\"abc\"}\n{\"prompt\":\"\",\"completion\":\"de\"}\n";
        let (_, recs) = run_on(input, &opts(1));
        let idx: Vec<(i64, usize)> = recs.iter().map(|r| (r.source_id, r.chunk_index)).collect();
        assert_eq!(idx, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1)]);
    }

    #[test]
    fn max_samples_caps_source_rows() {
        let input = "{\"prompt\":\"\",\"completion\":\"a\"}\n{\"prompt\":\"\",\"completion\":\"b\"}\n{\"prompt\":\"\",\"completion\":\"c\"}\n";
        let mut o = opts(4);
        o.max_samples = Some(2);
        let (res, recs) = run_on(input, &o);
        assert_eq!(res.unwrap().rows, 2);
        assert_eq!(recs.iter().map(|r| r.target_text.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn generation_marker_is_passed_to_renderer() {
        let mut o = opts(8);
        o.add_generation_prompt = true;
        let (_, recs) = run_on("{\"prompt\":\"q\",\"completion\":\"ans\"}\n", &o);
        assert_eq!(recs[0].context_text, "P:q>");
    }

    #[test]
    fn malformed_line_aborts_but_keeps_earlier_output() {
        let input = "{\"prompt\":\"\",\"completion\":\"ok\"}\n{oops\n{\"prompt\":\"\",\"completion\":\"never\"}\n";
        let (res, recs) = run_on(input, &opts(16));
        let err = res.unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].target_text, "ok");
    }

    #[test]
    fn identical_runs_produce_identical_bytes() {
        let input = "{\"idx\":7,\"prompt\":\"x\",\"completion\":\"hello, wörld\"}\n{\"prompt\":\"y\",\"completion\":\"more text\"}\n";
        let render = |i: &str| {
            let mut w = JsonlWriter::new(Vec::new());
            write_segments(JsonlReader::new(Cursor::new(i)), &mut w, &CharCodec, &PrefixRenderer(""), &opts(3), &telemetry::segment()).unwrap();
            w.into_inner()
        };
        assert_eq!(render(input), render(input));
    }
}
