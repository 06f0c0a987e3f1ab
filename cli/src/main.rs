//! marketindex CLI — replay a marketplace event log into a snapshot.
//!
//! Usage:
//! ```bash
//! marketindex replay events.json --marketplace erd1qqq... --key xoxno --kind internal
//! marketindex replay events.json --marketplace erd1qqq... --config replay.json --json-logs
//! marketindex info
//! ```

mod logging;

use std::env;
use std::fs;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use marketindex_core::config::ReindexConfig;
use marketindex_core::types::{AuctionLookup, Marketplace, MarketplaceKind};
use marketindex_reindex::{ReindexBuilder, ReindexOutcome, ReindexReport};
use marketindex_storage::{
    MemoryEventStore, MemoryMarketplaces, MemoryMetadata, MemorySink, MemoryTokens, Snapshot,
};

use crate::logging::LogConfig;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "replay" => {
            if let Err(err) = cmd_replay(&args[2..]).await {
                eprintln!("error: {err:#}");
                process::exit(1);
            }
        }
        "info" => cmd_info(),
        "version" | "--version" | "-V" => {
            println!("marketindex {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("marketindex {}", env!("CARGO_PKG_VERSION"));
    println!("Rebuild NFT marketplace state from its event log\n");
    println!("USAGE:");
    println!("    marketindex <COMMAND>\n");
    println!("COMMANDS:");
    println!("    replay   Replay a JSON event log and print the snapshot");
    println!("    info     Show default configuration");
    println!("    version  Print version");
    println!("    help     Print this help\n");
    println!("REPLAY OPTIONS:");
    println!("    marketindex replay <events.json> --marketplace <address>");
    println!("        --key <key>                        Marketplace key (default: marketplace)");
    println!("        --kind internal|external|swap      Marketplace kind (default: internal)");
    println!("        --token <identifier>:<decimals>    Known payment token (repeatable)");
    println!("        --tags <identifier>=<tag,tag>      Known NFT tags (repeatable)");
    println!("        --config <config.json>             Reindex and logging configuration");
    println!("        --log-level <level>                Default log level");
    println!("        --json-logs                        Emit JSON logs on stderr");
}

fn cmd_info() {
    let config = ReindexConfig::default();
    println!("MarketIndex v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default page size: {} events/call", config.page_size);
    println!("  Default metadata batch: {} identifiers/call", config.metadata_batch_size);
    println!("  Default metadata concurrency: {} requests", config.metadata_concurrency);
    println!(
        "  Native token: {} ({} decimals)",
        config.native_token, config.native_decimals
    );
    println!("  Storage backends: memory, SQLite (feature: sqlite)");
}

// ─── replay ──────────────────────────────────────────────────────────────────

/// Contents of `--config`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
    reindex: ReindexConfig,
    logging: LogConfig,
}

#[derive(Debug)]
struct ReplayArgs {
    events: String,
    marketplace: String,
    key: String,
    kind: MarketplaceKind,
    lookup: AuctionLookup,
    tokens: Vec<(String, u32)>,
    tags: Vec<(String, Vec<String>)>,
    config: Option<String>,
    log_level: Option<String>,
    json_logs: bool,
}

impl ReplayArgs {
    fn parse(args: &[String]) -> Result<Self> {
        let mut events = None;
        let mut marketplace = None;
        let mut parsed = Self {
            events: String::new(),
            marketplace: String::new(),
            key: "marketplace".into(),
            kind: MarketplaceKind::Internal,
            lookup: AuctionLookup::ByAuctionId,
            tokens: Vec::new(),
            tags: Vec::new(),
            config: None,
            log_level: None,
            json_logs: false,
        };

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .cloned()
                    .ok_or_else(|| anyhow!("{flag} needs a value"))
            };
            match arg.as_str() {
                "--marketplace" => marketplace = Some(value("--marketplace")?),
                "--key" => parsed.key = value("--key")?,
                "--kind" => {
                    (parsed.kind, parsed.lookup) = match value("--kind")?.as_str() {
                        "internal" => (MarketplaceKind::Internal, AuctionLookup::ByAuctionId),
                        "external" => (MarketplaceKind::External, AuctionLookup::ByAuctionId),
                        "swap" => (MarketplaceKind::External, AuctionLookup::ByIdentifier),
                        other => bail!("unknown marketplace kind '{other}'"),
                    }
                }
                "--token" => parsed.tokens.push(parse_token(&value("--token")?)?),
                "--tags" => parsed.tags.push(parse_tags(&value("--tags")?)?),
                "--config" => parsed.config = Some(value("--config")?),
                "--log-level" => parsed.log_level = Some(value("--log-level")?),
                "--json-logs" => parsed.json_logs = true,
                flag if flag.starts_with("--") => bail!("unknown option {flag}"),
                path if events.is_none() => events = Some(path.to_string()),
                extra => bail!("unexpected argument '{extra}'"),
            }
        }

        parsed.events = events.ok_or_else(|| anyhow!("missing <events.json>"))?;
        parsed.marketplace = marketplace.ok_or_else(|| anyhow!("missing --marketplace"))?;
        Ok(parsed)
    }
}

fn parse_token(raw: &str) -> Result<(String, u32)> {
    let (identifier, decimals) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("--token expects <identifier>:<decimals>, got '{raw}'"))?;
    let decimals = decimals
        .parse()
        .with_context(|| format!("invalid decimals in '{raw}'"))?;
    Ok((identifier.to_string(), decimals))
}

fn parse_tags(raw: &str) -> Result<(String, Vec<String>)> {
    let (identifier, tags) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("--tags expects <identifier>=<tag,tag>, got '{raw}'"))?;
    let tags = tags
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    Ok((identifier.to_string(), tags))
}

#[derive(Serialize)]
struct ReplayOutput {
    report: ReindexReport,
    #[serde(flatten)]
    snapshot: Snapshot,
}

async fn cmd_replay(args: &[String]) -> Result<()> {
    let args = ReplayArgs::parse(args)?;

    let mut config: CliConfig = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?
        }
        None => CliConfig::default(),
    };
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    config.logging.json |= args.json_logs;
    logging::init(&config.logging);

    let raw = fs::read_to_string(&args.events)
        .with_context(|| format!("reading {}", args.events))?;
    let events = Arc::new(MemoryEventStore::from_json(&args.marketplace, &raw)?);
    tracing::info!(
        events = events.len(&args.marketplace),
        file = %args.events,
        "event log loaded"
    );

    let marketplaces = MemoryMarketplaces::new().with(
        Marketplace::new(&args.key, &args.marketplace, args.kind).with_lookup(args.lookup),
    );
    let tokens = MemoryTokens::new();
    for (identifier, decimals) in &args.tokens {
        tokens.insert(identifier.as_str(), *decimals);
    }
    let metadata = MemoryMetadata::new();
    for (identifier, tags) in &args.tags {
        metadata.insert(identifier.as_str(), tags.iter().cloned());
    }
    let sink = Arc::new(MemorySink::new());

    let reindexer = ReindexBuilder::new()
        .config(config.reindex)
        .event_store(events)
        .marketplaces(Arc::new(marketplaces))
        .tokens(Arc::new(tokens))
        .metadata(Arc::new(metadata))
        .sink(sink.clone())
        .build()?;

    let report = match reindexer.reindex(&args.marketplace).await {
        ReindexOutcome::Completed(report) => report,
        ReindexOutcome::AlreadyRunning => bail!("a reindex of {} is already running", args.marketplace),
        ReindexOutcome::Failed(err) => return Err(err.into()),
    };

    let output = ReplayOutput {
        report,
        snapshot: sink.snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
