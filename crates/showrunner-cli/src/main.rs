mod config;

use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::{fmt, EnvFilter};

use showrunner_core::engine::export_file_name;
use showrunner_core::playlist::clean_lines;
use showrunner_core::{
    build_client, canonicalize, content_token, notification_channel, Category, Engine,
    EngineStatus, FileStore, NavigationIntent, WebhookDispatcher,
};

use crate::config::AppConfig;

/// Showrunner: keep a dated episode list playing in order.
#[derive(Parser)]
#[command(name = "showrunner", version, about)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// State directory. Overrides the config file.
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Listen address (e.g. 127.0.0.1:7171). Overrides config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,
    },
    /// Show the tracked position and list counts.
    Status {
        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show or replace the category lists.
    Lists {
        #[command(subcommand)]
        action: ListsAction,
    },
    /// Write the lists to an export file.
    Export {
        /// Output file or directory. Defaults to a timestamped file in the current directory.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Replace all lists from an export file.
    Import {
        /// Export file to read.
        file: PathBuf,

        /// Page location to resolve the position against after import.
        #[arg(long)]
        location: Option<String>,
    },
    /// Print the canonical key and content token of each URL.
    Canon {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Reset to the first episode and print its URL.
    Start,
    /// Print the URL of the tracked episode.
    Resume,
}

#[derive(Subcommand)]
enum ListsAction {
    /// Print the stored lines.
    Show {
        /// Only this category (raw, sd, ppv, heat).
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,
    },
    /// Replace one category from a file, or stdin when no file is given.
    Set {
        #[arg(long, value_parser = parse_category)]
        category: Category,

        file: Option<PathBuf>,

        /// Page location to resolve the position against after the rebuild.
        #[arg(long)]
        location: Option<String>,
    },
}

fn parse_category(s: &str) -> Result<Category, String> {
    Category::parse(s).ok_or_else(|| format!("unknown category '{s}' (expected raw, sd, ppv or heat)"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let app_config = match cli.config.as_deref().map(AppConfig::load).transpose() {
        Ok(c) => c.unwrap_or_default(),
        Err(e) => {
            init_tracing("pretty", "info");
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let store_dir = cli
        .store_dir
        .clone()
        .unwrap_or_else(|| app_config.store.resolve_dir());

    let result = match cli.command {
        Commands::Serve { listen } => {
            init_tracing(&app_config.server.log_format, "info");
            if let Some(path) = &cli.config {
                tracing::info!(path = %path.display(), "Loaded config file");
            }
            run_serve(listen, &app_config, store_dir).await
        }
        Commands::Canon { urls } => {
            init_tracing(&app_config.server.log_format, "warn");
            for url in &urls {
                println!("{}", canon_line(url));
            }
            Ok(())
        }
        command => {
            init_tracing(&app_config.server.log_format, "warn");
            let mut engine = open_engine(&app_config, &store_dir);
            run_command(command, &mut engine)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn open_engine(app_config: &AppConfig, store_dir: &Path) -> Engine {
    let store = Arc::new(FileStore::new(store_dir));
    Engine::load(store, app_config.engine_config())
}

async fn run_serve(
    listen_override: Option<SocketAddr>,
    app_config: &AppConfig,
    store_dir: PathBuf,
) -> Result<(), String> {
    let listen = listen_override.unwrap_or(app_config.server.listen);

    let (notification_tx, notification_rx) = notification_channel();

    let dispatcher_handle = if app_config.webhook.is_empty() {
        tokio::spawn(async move {
            let mut rx = notification_rx;
            while rx.recv().await.is_some() {}
        })
    } else {
        let client = build_client().map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        let dispatcher =
            WebhookDispatcher::new(notification_rx, app_config.webhook.clone(), client);
        tracing::info!(count = app_config.webhook.len(), "Webhook dispatcher started");
        tokio::spawn(dispatcher.run())
    };

    let engine = open_engine(app_config, &store_dir).with_notification_tx(notification_tx);
    tracing::info!(
        store = %store_dir.display(),
        instance_id = %engine.instance_id(),
        entries = engine.master().len(),
        position = ?engine.position(),
        "Engine loaded"
    );

    let state = showrunner_api::state::AppState::new(engine);

    tracing::info!(%listen, "Starting showrunner API server");
    showrunner_api::serve_with_state(listen, state, showrunner_api::shutdown_signal())
        .await
        .map_err(|e| format!("Server failed: {e}"))?;

    match tokio::time::timeout(Duration::from_secs(5), dispatcher_handle).await {
        Ok(_) => tracing::info!("Webhook dispatcher shut down"),
        Err(_) => tracing::warn!("Webhook dispatcher did not shut down in time, aborting"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn run_command(command: Commands, engine: &mut Engine) -> Result<(), String> {
    match command {
        // no engine involved
        Commands::Serve { .. } | Commands::Canon { .. } => Ok(()),
        Commands::Status { json } => {
            let status = engine.status();
            if json {
                let text = serde_json::to_string_pretty(&status).map_err(|e| e.to_string())?;
                println!("{text}");
            } else {
                print_status(&status);
            }
            Ok(())
        }
        Commands::Lists { action } => run_lists(action, engine),
        Commands::Export { out } => {
            let now = Utc::now();
            let export = engine.export_lists_at(now);
            let path = export_path(out, &export_file_name(now));
            let text = serde_json::to_string_pretty(&export).map_err(|e| e.to_string())?;
            std::fs::write(&path, text)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            println!("{} {}", style("exported").green(), path.display());
            Ok(())
        }
        Commands::Import { file, location } => {
            let payload = std::fs::read_to_string(&file)
                .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
            let entries = engine
                .import_lists(&payload, location.as_deref())
                .map_err(|e| format!("Import rejected: {e}"))?;
            println!(
                "{} {} entries, position {}",
                style("imported").green(),
                entries,
                format_position(engine.position())
            );
            Ok(())
        }
        Commands::Start => print_intent(engine.start_from_first(None)),
        Commands::Resume => print_intent(engine.resume_from_current(None)),
    }
}

/// Canonical key, content token and the URL itself.
fn canon_line(url: &str) -> String {
    let token = content_token(url)
        .map(|t| format!("{}:{}", t.provider, t.token))
        .unwrap_or_else(|| "-".into());
    format!("{}  {}  {}", canonicalize(url), style(token).dim(), style(url).dim())
}

fn run_lists(action: ListsAction, engine: &mut Engine) -> Result<(), String> {
    match action {
        ListsAction::Show { category } => {
            let categories = match category {
                Some(c) => vec![c],
                None => Category::ALL.to_vec(),
            };
            for c in categories {
                println!("{}", style(format!("[{}]", c)).bold());
                for line in engine.lists().get(c) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        ListsAction::Set {
            category,
            file,
            location,
        } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .map_err(|e| format!("Failed to read stdin: {e}"))?;
                    buf
                }
            };
            let mut lists = engine.lists().clone();
            *lists.get_mut(category) = clean_lines(&text);
            engine.set_lists(lists, location.as_deref());
            println!(
                "{} {}: {} lines, {} entries in sequence",
                style("saved").green(),
                category,
                engine.lists().get(category).len(),
                engine.master().len()
            );
            Ok(())
        }
    }
}

fn export_path(out: Option<PathBuf>, file_name: &str) -> PathBuf {
    match out {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path,
        None => PathBuf::from(file_name),
    }
}

fn print_intent(intent: Option<NavigationIntent>) -> Result<(), String> {
    let intent = intent.ok_or("The episode sequence is empty")?;
    println!(
        "{} {} {}",
        style(format!("#{}", intent.position)).bold(),
        style(intent.category).cyan(),
        intent.target
    );
    Ok(())
}

fn print_status(status: &EngineStatus) {
    println!(
        "{} {}",
        style("showrunner").bold(),
        style(env!("CARGO_PKG_VERSION")).dim()
    );
    println!(
        "  {} {} of {}",
        style("position:").dim(),
        format_position(status.position),
        status.sequence_length
    );
    if let Some(current) = &status.current {
        println!(
            "  {} {} {} {}",
            style("current: ").dim(),
            current.date,
            style(current.category).cyan(),
            current.url
        );
    }
    if let Some(next) = &status.next {
        println!(
            "  {} {} {} {}",
            style("next:    ").dim(),
            next.date,
            style(next.category).cyan(),
            next.url
        );
    }
    for c in &status.lines {
        println!(
            "  {:<5} {:>4} lines {:>4} episodes",
            c.category, c.lines, c.episodes
        );
    }
}

fn format_position(position: Option<usize>) -> String {
    position.map_or_else(|| "-".into(), |p| p.to_string())
}

fn init_tracing(log_format: &str, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_format {
        "json" => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
