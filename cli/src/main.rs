//! txwatch CLI — query and follow transactions from the terminal.
//!
//! Usage:
//! ```bash
//! # One-off status lookup
//! txwatch status --base https://api.example.org/v1 --hash 9f2c…
//!
//! # Follow a transaction until it reaches a terminal state
//! txwatch watch --hash 9f2c… --kind course-create
//!
//! # List known transaction kinds
//! txwatch kinds
//! ```

mod config;
mod logging;

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, Context};

use txwatch_core::{TxGateway, TxKind, TxMetadata};
use txwatch_http::HttpGateway;
use txwatch_tracker::{LogNotifier, TxObserver, TxView, WatchRegistry};

use config::{FileConfig, Overrides, Settings, BASE_URL_ENV};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "status" => cmd_status(&args[2..]).await,
        "watch" => cmd_watch(&args[2..]).await,
        "kinds" => {
            cmd_kinds();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("txwatch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("txwatch {}", env!("CARGO_PKG_VERSION"));
    println!("Follow blockchain transactions through the gateway\n");
    println!("USAGE:");
    println!("    txwatch <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    status     Fetch the current status of a transaction");
    println!("    watch      Follow a transaction until it is final");
    println!("    kinds      List transaction kinds and their endpoints");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FLAGS:");
    println!("    --hash <HASH>      Transaction hash  [required for status/watch]");
    println!("    --kind <KIND>      Transaction kind (watch only), see `txwatch kinds`");
    println!("    --base <URL>       Gateway base URL  [env: {BASE_URL_ENV}]");
    println!("    --token <TOKEN>    Bearer token for the gateway");
    println!("    --config <FILE>    JSON config file");
    println!("    --poll-ms <MS>     Poll interval when the stream is unavailable");
    println!("    --json             Print results as JSON");
    println!("    --json-logs        Emit logs as JSON lines");
    println!("    -v, --verbose      Debug logging");
}

/// Load settings and install logging.
fn setup(args: &[String]) -> anyhow::Result<Settings> {
    let file = match parse_flag(args, "--config") {
        Some(path) => FileConfig::load(&PathBuf::from(path))?,
        None => FileConfig::default(),
    };
    let poll_interval_ms = parse_flag(args, "--poll-ms")
        .map(|ms| ms.parse::<u64>().context("--poll-ms must be a number of milliseconds"))
        .transpose()?;
    let overrides = Overrides {
        base_url: parse_flag(args, "--base"),
        poll_interval_ms,
        auth_token: parse_flag(args, "--token"),
        verbose: has_flag(args, "--verbose") || has_flag(args, "-v"),
        json_logs: has_flag(args, "--json-logs"),
    };
    let settings = Settings::resolve(file, overrides, env::var(BASE_URL_ENV).ok())?;
    logging::init_tracing(&settings.log);
    tracing::debug!(
        base_url = %settings.gateway.base_url,
        poll_interval_ms = settings.watch.poll_interval_ms,
        "settings resolved"
    );
    Ok(settings)
}

async fn cmd_status(args: &[String]) -> anyhow::Result<()> {
    let hash = parse_flag(args, "--hash").ok_or_else(|| anyhow!("--hash is required"))?;
    let settings = setup(args)?;
    let gateway = HttpGateway::new(settings.gateway)?;

    match gateway.fetch_status(&hash).await? {
        Some(status) if has_flag(args, "--json") => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Some(status) => {
            println!("  Hash:        {}", status.tx_hash);
            println!("  Type:        {}", status.tx_type);
            println!("  State:       {}", status.state);
            println!("  Retries:     {}", status.retry_count);
            if let Some(at) = status.confirmed_at {
                println!("  Confirmed:   {at}");
            }
            if let Some(err) = &status.last_error {
                println!("  Last error:  {err}");
            }
            if let Some(url) = settings.watch.explorer_url(&status.tx_hash) {
                println!("  Explorer:    {url}");
            }
        }
        None => println!("Transaction {hash} is not known to the gateway"),
    }
    Ok(())
}

async fn cmd_watch(args: &[String]) -> anyhow::Result<()> {
    let hash = parse_flag(args, "--hash").ok_or_else(|| anyhow!("--hash is required"))?;
    let kind = parse_flag(args, "--kind")
        .map(|k| k.parse::<TxKind>().map_err(|e| anyhow!(e)))
        .transpose()?;
    let json = has_flag(args, "--json");
    let settings = setup(args)?;

    let gateway: Arc<dyn TxGateway> = Arc::new(HttpGateway::new(settings.gateway)?);
    let registry = WatchRegistry::new(gateway, Arc::new(LogNotifier), settings.watch);

    let mut observer = TxObserver::new(registry.clone());
    observer.attach(&hash);
    let mut views = observer.views();
    registry.watch(&hash, kind, TxMetadata::new());

    let mut last_line = String::new();
    let outcome = loop {
        let view = views.borrow_and_update().clone();
        if !json {
            if let Some(line) = progress_line(&view) {
                if line != last_line {
                    println!("{line}");
                    last_line = line;
                }
            }
        }
        if view.is_terminal {
            break Some(view);
        }
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break None;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Interrupted");
                break None;
            }
        }
    };

    drop(observer);
    registry.shutdown();

    let Some(view) = outcome else {
        return Ok(());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&view.status)?);
    } else if let Some(record) = &view.status {
        let verdict = if view.is_stalled {
            "confirmed, database sync delayed"
        } else if view.is_success {
            "succeeded"
        } else {
            "failed"
        };
        println!("Transaction {verdict} ({})", record.state);
        if let Some(err) = &record.last_error {
            println!("  Last error: {err}");
        }
        if let Some(url) = registry.config().explorer_url(&record.id) {
            println!("  Explorer:   {url}");
        }
    }
    if view.is_failed {
        process::exit(2);
    }
    Ok(())
}

fn progress_line(view: &TxView) -> Option<String> {
    let record = view.status.as_ref()?;
    let mut line = format!("[{}] {}", record.connection, record.state);
    if let Some(err) = &record.transport_error {
        line.push_str(&format!("  ({err})"));
    }
    Some(line)
}

fn cmd_kinds() {
    println!("Transaction kinds:\n");
    for kind in TxKind::ALL {
        let cfg = kind.config();
        let tracking = match (cfg.requires_onchain_confirmation, cfg.requires_db_update) {
            (true, true) => "chain + db",
            (true, false) => "chain",
            (false, true) => "db",
            (false, false) => "none",
        };
        println!("  {:<24} POST /tx/{}", kind.slug(), cfg.build_path);
        println!("  {:<24} gateway name: {}, tracking: {}", "", cfg.gateway_name, tracking);
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
