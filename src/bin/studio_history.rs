//! Command-line access to the product studio history.
//!
//! # Usage
//!
//! ```text
//! studio-history [--data-dir DIR] <command> [args]
//!
//!   list [QUERY]                 List records, newest first
//!   show ID                      Print every field of one record
//!   export FILE|-                Write an export document
//!   import FILE [--best-effort]  Restore records from an export document
//!   delete ID                    Remove one record
//!   clear                        Remove every record
//!   usage                        Print record counts and storage usage
//!   persist                      Ask for durable storage
//! ```
//!
//! Settings are read from the JSON file named by `PRODUCT_STUDIO_CONFIG`
//! (under the "product-studio" key). Logging goes to stderr and is
//! controlled with `RUST_LOG`.

use log::{debug, error};
use product_studio::capacity::CapacityProbe;
use product_studio::config::{load_config, load_config_file, StudioConfig};
use product_studio::history::{self, HistoryStore, ImportPolicy};
use product_studio::object_url::ObjectUrlRegistry;
use std::path::PathBuf;
use std::process::ExitCode;

const CONFIG_ENV: &str = "PRODUCT_STUDIO_CONFIG";

const USAGE: &str = "\
Usage: studio-history [--data-dir DIR] <command> [args]

Commands:
  list [QUERY]                 List records, newest first
  show ID                      Print every field of one record
  export FILE|-                Write an export document
  import FILE [--best-effort]  Restore records from an export document
  delete ID                    Remove one record
  clear                        Remove every record
  usage                        Print record counts and storage usage
  persist                      Ask for durable storage";

/// A parsed command line.
#[derive(Debug, PartialEq)]
enum Command {
    List(Option<String>),
    Show(String),
    Export(String),
    Import { path: String, best_effort: bool },
    Delete(String),
    Clear,
    Usage,
    Persist,
}

#[derive(Debug, PartialEq)]
struct Invocation {
    data_dir: Option<PathBuf>,
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("{}\n\n{}", message, USAGE);
            return ExitCode::from(2);
        }
    };

    let mut config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => load_config_file(PathBuf::from(path)),
        None => load_config(None),
    }
    .unwrap_or_else(|e| {
        error!("{}", e);
        StudioConfig::default()
    });
    if let Some(data_dir) = invocation.data_dir {
        config.data_dir = data_dir;
    }
    debug!("Using history store at {}", config.store_path().display());

    match run(invocation.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut data_dir = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--data-dir" => {
                let dir = iter.next().ok_or("--data-dir requires a directory")?;
                data_dir = Some(PathBuf::from(dir));
            }
            "-h" | "--help" => return Err("Product Studio history tool".to_string()),
            _ => rest.push(arg.as_str()),
        }
    }

    let (name, operands) = rest.split_first().ok_or("Missing command")?;
    let operand = |what: &str| -> Result<String, String> {
        operands
            .iter()
            .find(|o| !o.starts_with("--"))
            .map(|o| o.to_string())
            .ok_or_else(|| format!("{} requires {}", name, what))
    };

    let command = match *name {
        "list" => Command::List(operands.first().map(|q| q.to_string())),
        "show" => Command::Show(operand("a record id")?),
        "export" => Command::Export(operand("a file path or -")?),
        "import" => Command::Import {
            path: operand("a file path")?,
            best_effort: operands.contains(&"--best-effort"),
        },
        "delete" => Command::Delete(operand("a record id")?),
        "clear" => Command::Clear,
        "usage" => Command::Usage,
        "persist" => Command::Persist,
        other => return Err(format!("Unknown command '{}'", other)),
    };

    Ok(Invocation { data_dir, command })
}

async fn run(command: Command, config: &StudioConfig) -> Result<(), String> {
    let store = HistoryStore::open_with_config(config)
        .await
        .map_err(|e| e.to_string())?;

    match command {
        Command::List(query) => {
            let records = store.get_all_raw().await.map_err(|e| e.to_string())?;
            let records = match query {
                Some(query) => history::search_history(&query, &records),
                None => records,
            };
            for line in history::format_history_list(&records) {
                println!("{}", line);
            }
        }
        Command::Show(id) => {
            let mut registry = ObjectUrlRegistry::with_origin(&config.object_url_origin);
            let record = store
                .get(&id, &mut registry)
                .await
                .map_err(|e| e.to_string())?;
            print!("{}", history::format_history_details(&record));
        }
        Command::Export(path) => {
            if path == "-" {
                let text = history::export_history(&store, config.export_format_version)
                    .await
                    .map_err(|e| e.to_string())?;
                println!("{}", text);
            } else {
                let count =
                    history::export_to_file(&store, config.export_format_version, &path)
                        .await
                        .map_err(|e| e.to_string())?;
                println!("Exported {} record(s) to {}", count, path);
            }
        }
        Command::Import { path, best_effort } => {
            let policy = if best_effort {
                ImportPolicy::BestEffort
            } else {
                config.import_policy
            };
            let summary = history::import_from_file(&store, &path, policy)
                .await
                .map_err(|e| e.to_string())?;
            println!("Imported {} record(s)", summary.imported);
            for failure in &summary.failed {
                println!("  failed {}: {}", failure.id, failure.reason);
            }
            if !summary.is_complete() {
                return Err(format!("{} record(s) failed to import", summary.failed.len()));
            }
        }
        Command::Delete(id) => {
            store.delete(&id).await.map_err(|e| e.to_string())?;
            println!("Deleted {}", id);
        }
        Command::Clear => {
            store.clear().await.map_err(|e| e.to_string())?;
            println!("History cleared");
        }
        Command::Usage => {
            let records = store.get_all_raw().await.map_err(|e| e.to_string())?;
            let variants = records.iter().map(|r| r.variants.len()).sum();
            let probe = CapacityProbe::from_config(config);
            let estimate = probe.estimate().await;
            println!(
                "{}",
                history::format_history_stats(records.len(), variants, estimate.as_ref())
            );
            println!(
                "Durable: {}",
                if probe.is_durable().await { "yes" } else { "no" }
            );
        }
        Command::Persist => {
            let probe = CapacityProbe::from_config(config);
            if probe.request_durability().await {
                println!("Storage marked as durable");
            } else {
                return Err("durable storage is not available".to_string());
            }
        }
    }

    Ok(())
}
