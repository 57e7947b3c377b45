use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::dataset::{CompletionRow, JsonlReader, JsonlWriter, PromptRow};
use crate::llm::openai::{ChatCompletionRequest, LlmClient, OpenAiClient, OpenAiClientConfig, OpenAiError};
use crate::telemetry::{self};
use crate::telemetry::ops::query::Phase as QueryPhase;

#[derive(Args)]
pub struct QueryCmd {
    /// JSONL of prompts
    #[arg(long)] input: PathBuf,
    /// JSONL of {"idx", "prompt", "completion"}
    #[arg(long)] output: PathBuf,
    /// OpenAI-compatible base URL (defaults to OPENAI_BASE_URL, then http://localhost:8000/v1)
    #[arg(long)] base_url: Option<String>,
    /// Served model id; the first model listed by the endpoint when omitted
    #[arg(long)] model: Option<String>,
    #[arg(long, default_value_t = 0.0)] temperature: f32,
    #[arg(long, default_value_t = 2048)] max_tokens: u32,
    #[arg(long, default_value = "prompt")] prompt_key: String,
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub prompt_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    pub model: String,
    pub written: usize,
}

pub async fn run(args: QueryCmd) -> Result<()> {
    let log = telemetry::query();
    let _g = log.root_span_kv([
        ("input", args.input.display().to_string()),
        ("output", args.output.display().to_string()),
        ("base_url", format!("{:?}", args.base_url)),
        ("model", format!("{:?}", args.model)),
        ("temperature", args.temperature.to_string()),
        ("max_tokens", args.max_tokens.to_string()),
    ]).entered();
    let t0 = Instant::now();

    let mut cfg = OpenAiClientConfig::from_env();
    if let Some(base) = args.base_url { cfg.base_url = base; }
    let client = OpenAiClient::new(cfg).context("build http client")?;

    let reader = JsonlReader::open(&args.input)?;
    let mut writer = JsonlWriter::create(&args.output)?;
    let opts = QueryOptions {
        model: args.model,
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        prompt_key: args.prompt_key,
    };

    let stats = write_completions(reader, &mut writer, &client, &opts).await?;

    log.info(format!("Wrote {} rows to {} (model={})", stats.written, args.output.display(), stats.model));
    if telemetry::config::json_mode() {
        log.result(&stats, t0)?;
    }
    Ok(())
}

/// Ask the target model for one completion per prompt; each row is flushed as soon as it lands.
pub async fn write_completions<R: BufRead, W: Write>(
    reader: JsonlReader<R>,
    writer: &mut JsonlWriter<W>,
    client: &dyn LlmClient,
    opts: &QueryOptions,
) -> Result<QueryStats> {
    let log = telemetry::query();

    let model = match &opts.model {
        Some(m) => m.clone(),
        None => {
            let _sp = log.span(&QueryPhase::DiscoverModel).entered();
            let models = client.list_models().await.context("list served models")?;
            let first = models.into_iter().next().ok_or(OpenAiError::NoModels)?;
            log.info(format!("using served model {}", first));
            first
        }
    };

    for raw in reader {
        let raw = raw.context("read input row")?;
        let row = PromptRow::from_raw(&raw, &opts.prompt_key)?;

        let request = ChatCompletionRequest {
            model: model.clone(),
            prompt: row.prompt.clone(),
            max_tokens: opts.max_tokens,
            temperature: opts.temperature,
        };

        let resp = {
            let _sp = log.span(&QueryPhase::Complete).entered();
            client.chat_completion(request).await
        }
        .with_context(|| format!("chat completion for row {}", raw.row_index))?;

        let _sp = log.span(&QueryPhase::Write).entered();
        writer.write(&CompletionRow {
            idx: raw.row_index as i64,
            prompt: row.prompt,
            completion: resp.content,
        })?;
        writer.flush()?;
        drop(_sp);
        log.debug(format!("row {} done", raw.row_index));
    }

    Ok(QueryStats { model, written: writer.written() })
}
