use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use privgraph::config::{load_config, AppConfig, LoggingConfig};
use privgraph::error::{PrivacyError, PrivacyResult};
use privgraph::explorer::Explorer;
use privgraph::fetch::{FixtureDirSource, MemorySource, TransactionSource};
use privgraph::ingest::ingest_transactions;
use privgraph::model::node::{IdentityNode, Metadata};
use privgraph::model::raw::{
    RawInput, RawOutput, RawTransaction, RawTransactionPage, ScriptPubKey, SATOSHIS_PER_BTC,
};
use privgraph::query::{AddressReport, GraphReport, MovementRow};
use privgraph::store::TracingObserver;

/// privgraph: explore how much a set of Bitcoin transactions gives away
#[derive(Parser)]
#[command(name = "privgraph")]
#[command(
    about = "Heuristic Bitcoin privacy explorer. Links addresses, identities and transactions, then flags likely payments, change and coinjoins."
)]
#[command(version)]
struct Cli {
    /// Configuration file layered over privgraph.toml
    #[arg(short, long, global = true, env = "PRIVGRAPH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive REPL session
    Interactive {
        /// Pre-load the demo dataset on startup
        #[arg(long)]
        demo: bool,
    },
    /// Ingest a JSON file of transactions, run the heuristics and print the report
    Analyze {
        /// JSON array of transaction records, or an Insight `{ "txs": [...] }` page
        input: PathBuf,
        /// Known owner of an address (repeatable)
        #[arg(short, long = "identity", value_name = "NAME=ADDRESS")]
        identity: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Interactive { demo } => run_interactive(config, demo)
            .await
            .context("interactive session failed")?,
        Commands::Analyze { input, identity } => run_analyze(config, &input, &identity)
            .await
            .with_context(|| format!("failed to analyze {}", input.display()))?,
    }
    Ok(())
}

/// `RUST_LOG` wins over `logging.filter`. Logs go to stderr so reports on
/// stdout stay machine-readable.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ---------------------------------------------------------------------------
// One-shot analysis
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum AnalyzeInput {
    Records(Vec<RawTransaction>),
    Page(RawTransactionPage),
}

async fn run_analyze(config: AppConfig, input: &Path, identities: &[String]) -> PrivacyResult<()> {
    let body = tokio::fs::read_to_string(input).await?;
    let records = match serde_json::from_str::<AnalyzeInput>(&body)? {
        AnalyzeInput::Records(records) => records,
        AnalyzeInput::Page(page) => page.txs,
    };

    let source = MemorySource::from_transactions(records.iter().cloned());
    let mut explorer = Explorer::new(config, Box::new(source));
    let stats = ingest_transactions(explorer.graph_mut(), &records)?;
    info!(
        ingested = stats.ingested,
        skipped = stats.skipped,
        "analysis input loaded"
    );

    for pair in identities {
        let (name, address) = pair.split_once('=').ok_or_else(|| {
            PrivacyError::InvalidCommand(format!("expected NAME=ADDRESS, got '{}'", pair))
        })?;
        explorer.add_identity(name);
        explorer.associate(address, name, None).await?;
    }

    explorer.refresh();
    println!("{}", serde_json::to_string_pretty(&explorer.report())?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Interactive REPL
// ---------------------------------------------------------------------------

/// Shared session state for the REPL.
struct Session {
    explorer: Explorer,
}

impl Session {
    fn new(config: AppConfig, demo: bool) -> Self {
        let source: Box<dyn TransactionSource> = match (&config.fetch.fixtures_dir, demo) {
            (_, true) => Box::new(demo_source()),
            (Some(dir), false) => Box::new(FixtureDirSource::new(dir)),
            (None, false) => Box::new(MemorySource::new()),
        };
        let explorer =
            Explorer::new(config, source).with_observer(Box::new(TracingObserver));
        Self { explorer }
    }
}

async fn run_interactive(config: AppConfig, load_demo: bool) -> PrivacyResult<()> {
    let mut session = Session::new(config, load_demo);

    println!("=== privgraph Interactive REPL ===");
    println!("Heuristic Bitcoin privacy explorer.\n");

    if load_demo {
        load_demo_data(&mut session).await?;
    } else if session.explorer.config().fetch.fixtures_dir.is_none() {
        println!("No fixtures_dir configured: expansion will find no transactions.");
    }

    print_help();

    let stdin = io::stdin();
    loop {
        print!("\nprivgraph> ");
        io::stdout().flush().ok();

        let mut input = String::new();
        match stdin.read_line(&mut input) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let (cmd, args) = match input.split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd.to_lowercase(), args.trim()),
            None => (input.to_lowercase(), ""),
        };

        let result = match cmd.as_str() {
            "help" | "h" | "?" => {
                print_help();
                Ok(())
            }
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "status" | "stats" => {
                cmd_status(&session);
                Ok(())
            }
            "address" | "add" => cmd_address(&mut session, args).await,
            "identity" => cmd_identity(&mut session, args),
            "associate" | "assoc" => cmd_associate(&mut session, args).await,
            "expand" => cmd_expand(&mut session, args).await,
            "expand-all" => cmd_expand_all(&mut session).await,
            "refresh" => {
                cmd_refresh(&mut session);
                Ok(())
            }
            "report" => cmd_report(&mut session, args),
            _ => Err(PrivacyError::InvalidCommand(format!(
                "unknown command '{}'. Type 'help' for available commands.",
                cmd
            ))),
        };

        if let Err(e) = result {
            eprintln!("  Error: {}", e);
        }
    }

    Ok(())
}

fn print_help() {
    println!("  Commands:");
    println!("    address <hash>                   Track an address and fetch its transactions");
    println!("    identity <name> [description]    Add a named identity");
    println!("    associate <hash> to <name> [..]  Mark an address as owned, optional notes after the name");
    println!("    expand <hash>                    Fetch transactions for an address");
    println!("    expand-all                       Expand every address not yet expanded");
    println!("    refresh                          Re-run the heuristics");
    println!("    report [--json]                  Identity and unowned-address report");
    println!("    status                           Show graph statistics");
    println!("    help                             Show this help message");
    println!("    quit                             Exit the REPL");
}

// ---------------------------------------------------------------------------
// REPL commands
// ---------------------------------------------------------------------------

fn cmd_status(session: &Session) {
    let graph = session.explorer.graph();
    println!("  {}", graph.stats());
    let expanded = graph.addresses().filter(|a| a.metadata.expanded).count();
    println!("  Expanded addresses: {}", expanded);
}

async fn cmd_address(session: &mut Session, args: &str) -> PrivacyResult<()> {
    let hash = single_arg(args, "address <hash>")?;
    let stats = session.explorer.add_address(hash).await?;
    println!(
        "  + {} ({} new transactions, {} new addresses)",
        hash, stats.ingested, stats.addresses_created
    );
    Ok(())
}

fn cmd_identity(session: &mut Session, args: &str) -> PrivacyResult<()> {
    let mut parts = args.splitn(2, char::is_whitespace);
    let Some(name) = parts.next().filter(|name| !name.is_empty()) else {
        return Err(PrivacyError::InvalidCommand(
            "usage: identity <name> [description]".into(),
        ));
    };
    let mut node = IdentityNode::new(name);
    if let Some(extra) = parts.next().map(str::trim).filter(|extra| !extra.is_empty()) {
        node = node.with_extra(extra);
    }

    if session.explorer.add_identity_node(node) {
        println!("  + identity {}", name);
    } else {
        println!("  identity {} already exists", name);
    }
    Ok(())
}

async fn cmd_associate(session: &mut Session, args: &str) -> PrivacyResult<()> {
    let usage = || PrivacyError::InvalidCommand("usage: associate <hash> to <name> [notes]".into());
    let mut parts = args.split_whitespace();
    let (Some(address), Some("to"), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(usage());
    };
    let notes: Vec<&str> = parts.collect();
    let annotations = (!notes.is_empty()).then(|| notes.join(" "));

    match session.explorer.associate(address, name, annotations).await? {
        Some(edge) => println!("  + {}", edge),
        None => println!("  skipped: {} or {} is not in the graph", address, name),
    }
    Ok(())
}

async fn cmd_expand(session: &mut Session, args: &str) -> PrivacyResult<()> {
    let hash = single_arg(args, "expand <hash>")?;
    let stats = session.explorer.expand(hash).await?;
    println!(
        "  {} fetched: {} new, {} already known",
        hash, stats.ingested, stats.skipped
    );
    Ok(())
}

async fn cmd_expand_all(session: &mut Session) -> PrivacyResult<()> {
    let stats = session.explorer.expand_pending().await?;
    println!(
        "  {} new transactions, {} new addresses",
        stats.ingested, stats.addresses_created
    );
    Ok(())
}

fn cmd_refresh(session: &mut Session) {
    let summary = session.explorer.refresh();
    println!(
        "  large spend: {}, same address type: {}, coinjoin: {}",
        summary.large_spend, summary.same_address_type, summary.coinjoin
    );
}

fn cmd_report(session: &mut Session, args: &str) -> PrivacyResult<()> {
    session.explorer.refresh();
    let report = session.explorer.report();
    match args {
        "--json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "" => print_report(&report),
        other => {
            return Err(PrivacyError::InvalidCommand(format!(
                "unexpected report argument '{}'",
                other
            )))
        }
    }
    Ok(())
}

fn single_arg<'a>(args: &'a str, usage: &str) -> PrivacyResult<&'a str> {
    match args.split_whitespace().collect::<Vec<_>>().as_slice() {
        [one] => Ok(*one),
        _ => Err(PrivacyError::InvalidCommand(format!("usage: {}", usage))),
    }
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

fn print_report(report: &GraphReport) {
    if report.identities.is_empty() && report.unknown.is_empty() {
        println!("  Graph is empty.");
        return;
    }

    for identity in &report.identities {
        match &identity.extra {
            Some(extra) => println!("\n  == {} ({}) ==", identity.name, extra),
            None => println!("\n  == {} ==", identity.name),
        }
        if identity.known_addresses.is_empty() {
            println!("    (no known addresses)");
        }
        for address in &identity.known_addresses {
            print_address(address);
        }
    }

    if !report.unknown.is_empty() {
        println!("\n  == Unknown addresses ==");
        for address in &report.unknown {
            print_address(address);
        }
    }
}

fn print_address(address: &AddressReport) {
    let expanded = if address.expanded { "" } else { " (not expanded)" };
    match &address.annotations {
        Some(notes) => println!("    {}{}  # {}", address.hash, expanded, notes),
        None => println!("    {}{}", address.hash, expanded),
    }
    for row in &address.incoming {
        println!("      <- {}", format_row(row));
    }
    for row in &address.outgoing {
        println!("      -> {}", format_row(row));
    }
}

fn format_row(row: &MovementRow) -> String {
    let amount = row
        .satoshis
        .map(|sat| format!("{:.8} BTC", sat as f64 / SATOSHIS_PER_BTC))
        .unwrap_or_else(|| "? BTC".to_string());
    let when = row
        .date
        .map(|date| date.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown time".to_string());
    let mut line = format!(
        "{} {} (tx {}, {})",
        amount,
        row.address,
        short_txid(&row.tx),
        when
    );
    if let Some(owner) = &row.identity {
        line.push_str(&format!(" [{}]", owner));
    }
    for flag in flags(&row.metadata).into_iter().chain(flags(&row.tx_metadata)) {
        line.push_str(&format!(" <{}>", flag));
    }
    line
}

fn flags(metadata: &Metadata) -> Vec<String> {
    let strategy = &metadata.strategy;
    let mut out = Vec::new();
    if let Some(record) = &strategy.large_spend {
        out.push(format!("large spend {:.1}%", record.percentage));
    }
    if let Some(record) = &strategy.same_address_type {
        out.push(format!("likely change of {}", record.address));
    }
    if let Some(record) = &strategy.coinjoin_detection {
        out.push(format!(
            "coinjoin {} in / {} out",
            record.inputs, record.outputs
        ));
    }
    out
}

fn short_txid(txid: &str) -> &str {
    txid.get(..12).unwrap_or(txid)
}

// ---------------------------------------------------------------------------
// Demo dataset
// ---------------------------------------------------------------------------

const TRACKED: &str = "1M2cjVxx117834dEtTJxC2TWPRq6vPmZ3P";
const JOHN: &str = "17VEQ7mEKWSgSTYJMjJ2Bj8WdYQFvviKh4";
const JACK: &str = "32JFzr9TMJg7zESusnzRhvifc2C7kMfCT8";

async fn load_demo_data(session: &mut Session) -> PrivacyResult<()> {
    println!("  Loading demo addresses and identities...");
    let explorer = &mut session.explorer;
    explorer.add_address(TRACKED).await?;
    explorer.add_address(JOHN).await?;
    explorer.add_identity_node(IdentityNode::new("Jack").with_extra("exchange customer"));
    explorer.add_identity("John");
    explorer.add_address(JACK).await?;
    explorer
        .associate(JACK, "Jack", Some("exchange withdrawal address".to_string()))
        .await?;
    explorer.associate(JOHN, "John", None).await?;

    let summary = explorer.refresh();
    println!("  Done. {}", explorer.graph().stats());
    println!(
        "  Heuristics: {} large spend, {} same address type, {} coinjoin",
        summary.large_spend, summary.same_address_type, summary.coinjoin
    );
    Ok(())
}

fn demo_tx(txid: &str, time: i64, inputs: &[(&str, u64)], outputs: &[(&str, u64)]) -> RawTransaction {
    RawTransaction {
        txid: txid.to_string(),
        vin: inputs
            .iter()
            .map(|(addr, value_sat)| RawInput {
                addr: Some(addr.to_string()),
                value_sat: *value_sat,
            })
            .collect(),
        vout: outputs
            .iter()
            .map(|(addr, sat)| RawOutput {
                value: *sat as f64 / SATOSHIS_PER_BTC,
                script_pub_key: ScriptPubKey {
                    addresses: vec![addr.to_string()],
                },
            })
            .collect(),
        blockhash: format!("00000000000000000003{}", &txid[..txid.len().min(12)]),
        time,
    }
}

fn demo_source() -> MemorySource {
    let mut source = MemorySource::from_transactions([
        // Tracked address pays John, change goes to a P2SH address.
        demo_tx(
            "9f1c2e7a4b3d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f708192a3b4c5d6e7",
            1_514_764_800_000,
            &[(TRACKED, 200_000_000)],
            &[(JOHN, 190_000_000), ("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", 9_990_000)],
        ),
        // Jack splits a withdrawal between a legacy and a P2SH address.
        demo_tx(
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            1_514_851_200_000,
            &[(JACK, 50_000_000)],
            &[
                ("1BoatSLRHtKNngkdXEeobR76b53LETtpyT", 20_000_000),
                ("3P14159f73E4gFr7JterCCQh9QjiTjiZrG", 29_990_000),
            ],
        ),
        // John pays Jack.
        demo_tx(
            "b1fea52486ce0c62bb442b530a3f0132b826c74e473d1f2c220bfa78111c5082",
            1_514_937_600_000,
            &[(JOHN, 100_000_000)],
            &[(JACK, 99_990_000)],
        ),
    ]);

    let mixers: Vec<String> = (0..14)
        .map(|i| format!("1Mix{:02}qRb7cYTHpXh3Lk9wZ5nVd2sGfE", i))
        .collect();
    let mut inputs: Vec<(&str, u64)> = mixers.iter().map(|m| (m.as_str(), 10_000_000)).collect();
    inputs.push((JOHN, 10_000_000));
    let outputs: Vec<(String, u64)> = (0..15)
        .map(|i| (format!("1Out{:02}mZcP4sWv8NdQy6KtJh2XgRb", i), 9_990_000))
        .collect();
    let outputs: Vec<(&str, u64)> = outputs.iter().map(|(a, v)| (a.as_str(), *v)).collect();
    source.insert(demo_tx(
        "e3bf3d07d4b0375638d5f1db5255fe07ba2c4cb067cd81b84ee974b6585fb468",
        1_515_024_000_000,
        &inputs,
        &outputs,
    ));
    source
}
