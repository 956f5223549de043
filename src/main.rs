use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use run_report::codec::{objectify, stringify, MarshalOptions, UnmarshalOptions};
use run_report::replay::{replay, LifecycleEvent};
use run_report::{ConsoleSink, ReportBuilder};

#[derive(Parser, Debug)]
#[command(
    name = "runreport",
    version,
    about = "Replay script run event logs into structured reports"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded lifecycle event log and print the report
    Replay(ReplayArgs),
    /// Re-serialize a JSON document through the lenient codec
    Convert(ConvertArgs),
}

#[derive(Parser, Debug)]
struct ReplayArgs {
    /// Path to the event log (JSON array of tagged events)
    #[arg(long)]
    events: PathBuf,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Path to the JSON document to convert
    #[arg(long)]
    input: PathBuf,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,

    /// Keep explicit nulls instead of dropping them
    #[arg(long)]
    full: bool,

    /// Allow a bare scalar at the top level
    #[arg(long)]
    raw: bool,

    /// Keep the list wrapper root around array input
    #[arg(long)]
    force_root: bool,

    /// Keep hyphenated keys instead of folding them to camelCase
    #[arg(long)]
    keep_dashes: bool,

    /// Coerce every scalar to a string
    #[arg(long)]
    strings_only: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Replay(args) => run_replay(&args),
        Commands::Convert(args) => run_convert(&args),
    }
}

fn run_replay(args: &ReplayArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.events)
        .with_context(|| format!("read event log {}", args.events.display()))?;
    let events: Vec<LifecycleEvent> = serde_json::from_str(&text)
        .with_context(|| format!("parse event log {}", args.events.display()))?;

    let mut builder = ReportBuilder::with_next(Box::new(ConsoleSink::stdout()));
    replay(&events, &mut builder)?;
    if !builder.is_closed() {
        tracing::warn!("event log ended without closing the run");
    }
    if builder.report().has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_convert(args: &ConvertArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("read {}", args.input.display()))?;
    let value = objectify(
        &text,
        &UnmarshalOptions {
            allow_raw: args.raw,
            camel_case_dashes: !args.keep_dashes,
            strings_only: args.strings_only,
            parse_numbers: true,
        },
    )?;
    let rendered = stringify(
        &value,
        &MarshalOptions {
            pretty: args.pretty,
            explicit_nulls: args.full,
            allow_raw: args.raw,
            force_root: args.force_root,
        },
    )?;
    println!("{rendered}");
    Ok(())
}
