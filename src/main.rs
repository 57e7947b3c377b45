use clap::{Parser, Subcommand};
use anyhow::Result;
use dotenvy::dotenv;

mod dataset;
mod llm;
mod output;
mod pipeline;
mod telemetry;
mod template;
mod tokenizer;

#[derive(Parser)]
#[command(name = "specdraft", about = "Training data generation for speculative-decoding draft models")]
struct Cli {
    /// Emit a single JSON result envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split (prompt, completion) rows into (context, next-chunk) training records
    Segment(pipeline::segment::SegmentCmd),
    /// Subsample user prompts from a chat dataset export
    Prompts(pipeline::prompts::PromptsCmd),
    /// Collect target-model completions from an OpenAI-compatible endpoint
    Query(pipeline::query::QueryCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // initialize logging/tracing (stderr). Respect RUST_LOG and SPECDRAFT_LOG_FORMAT
    telemetry::config::init_tracing();

    match cli.command {
        Commands::Segment(args) => pipeline::segment::run(args)?,
        Commands::Prompts(args) => pipeline::prompts::run(args)?,
        Commands::Query(args) => pipeline::query::run(args).await?,
    }

    Ok(())
}
