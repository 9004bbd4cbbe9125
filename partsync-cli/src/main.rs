//! PartSync CLI - sync KiCad design fields against a Part-DB instance
//! from the command line.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use partsync::config::{default_cache_path, default_config_path};
use partsync::design::{FieldStore, JsonFieldStore};
use partsync::record::MANAGED_FIELDS;
use partsync::{
    ComponentOutcome, ConflictPolicy, InventoryClient, PartDbClient, SyncConfig, SyncEngine,
    SyncReport, SyncStore,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "partsync")]
#[command(about = "Part-DB inventory synchronization for KiCad design fields", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sync pass over an exported design field file
    Sync {
        /// JSON file mapping component references to their fields
        #[arg(value_name = "FIELDS_FILE")]
        fields_file: PathBuf,

        /// Only sync these component references (default: all)
        #[arg(long, num_args = 1..)]
        components: Vec<String>,

        /// Number of components synced in parallel
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Cache freshness window in hours
        #[arg(long)]
        ttl_hours: Option<u64>,

        /// Which side wins when both changed a field
        #[arg(long, value_enum)]
        prefer: Option<Prefer>,

        /// Compute and report changes without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Part-DB API URL (overrides configuration)
        #[arg(long)]
        api_url: Option<String>,

        /// Part-DB API token (overrides configuration)
        #[arg(long)]
        token: Option<String>,

        /// Cache database directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Configuration file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check Part-DB reachability and show cache statistics
    Status {
        #[arg(long)]
        api_url: Option<String>,

        #[arg(long)]
        token: Option<String>,

        #[arg(long)]
        cache_dir: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the design fields the engine manages
    Fields {
        /// Show field descriptions
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show or update the stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the active configuration (token masked)
    Show {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Update configuration values
    Set {
        #[arg(long)]
        api_url: Option<String>,

        #[arg(long)]
        token: Option<String>,

        #[arg(long)]
        ttl_hours: Option<u64>,

        #[arg(long)]
        concurrency: Option<usize>,

        #[arg(long, value_enum)]
        prefer: Option<Prefer>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Prefer {
    /// Keep the local value, report the conflict
    Local,
    /// Take the remote value, report the conflict
    Remote,
}

impl From<Prefer> for ConflictPolicy {
    fn from(p: Prefer) -> Self {
        match p {
            Prefer::Local => ConflictPolicy::PreferLocal,
            Prefer::Remote => ConflictPolicy::PreferRemote,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON report for scripting/CI
    Json,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Commands::Sync {
            fields_file,
            components,
            jobs,
            ttl_hours,
            prefer,
            dry_run,
            format,
            api_url,
            token,
            cache_dir,
            config,
        } => {
            handle_sync(SyncArgs {
                fields_file,
                components,
                jobs,
                ttl_hours,
                prefer,
                dry_run,
                format,
                api_url,
                token,
                cache_dir,
                config,
            })
            .await
        }
        Commands::Status {
            api_url,
            token,
            cache_dir,
            config,
        } => handle_status(api_url, token, cache_dir, config).await,
        Commands::Fields { verbose } => {
            handle_fields(verbose);
            0
        }
        Commands::Config { action } => handle_config(action),
    };

    process::exit(exit_code);
}

struct SyncArgs {
    fields_file: PathBuf,
    components: Vec<String>,
    jobs: Option<usize>,
    ttl_hours: Option<u64>,
    prefer: Option<Prefer>,
    dry_run: bool,
    format: OutputFormat,
    api_url: Option<String>,
    token: Option<String>,
    cache_dir: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn load_config(
    path: Option<PathBuf>,
    api_url: Option<String>,
    token: Option<String>,
) -> Result<SyncConfig, String> {
    let path = path.or_else(default_config_path);
    let mut config = match path {
        Some(path) => SyncConfig::load(&path).map_err(|e| e.to_string())?,
        None => SyncConfig::default(),
    };
    if let Some(api_url) = api_url {
        config.api_url = api_url;
    }
    if let Some(token) = token {
        config.token = token;
    }
    Ok(config)
}

fn open_store(cache_dir: Option<PathBuf>) -> Result<SyncStore, String> {
    let path = cache_dir
        .or_else(default_cache_path)
        .ok_or_else(|| "no cache directory available; pass --cache-dir".to_string())?;
    SyncStore::open(&path).map_err(|e| e.to_string())
}

async fn handle_sync(args: SyncArgs) -> i32 {
    let config = match load_config(args.config, args.api_url, args.token) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let mut options = config.options();
    if let Some(jobs) = args.jobs {
        options.concurrency = jobs.max(1);
    }
    if let Some(hours) = args.ttl_hours {
        options.cache_ttl = std::time::Duration::from_secs(hours.saturating_mul(3600));
    }
    if let Some(prefer) = args.prefer {
        options.conflict_policy = prefer.into();
    }
    options.dry_run = args.dry_run;

    let client = match PartDbClient::new(&config.api_url, &config.token) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let store = match open_store(args.cache_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let fields = match JsonFieldStore::load(&args.fields_file) {
        Ok(fields) => fields,
        Err(e) => {
            eprintln!("Error: failed to load {}: {}", args.fields_file.display(), e);
            return 1;
        }
    };

    let components = if args.components.is_empty() {
        match fields.component_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    } else {
        args.components
    };

    let engine = SyncEngine::new(Arc::new(client), store.clone(), options);

    // Ctrl-C finishes in-flight components and skips the rest.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight components");
            signal_cancel.cancel();
        }
    });

    let report = match engine.sync_cancellable(&components, &fields, cancel).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    if let Err(e) = store.flush() {
        eprintln!("Error: {}", e);
        return 1;
    }

    match args.format {
        OutputFormat::Human => output_human(&report),
        OutputFormat::Json => output_json(&report),
    }

    if report.has_failures() {
        1
    } else {
        0
    }
}

async fn handle_status(
    api_url: Option<String>,
    token: Option<String>,
    cache_dir: Option<PathBuf>,
    config: Option<PathBuf>,
) -> i32 {
    let config = match load_config(config, api_url, token) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let reachable = match PartDbClient::new(&config.api_url, &config.token) {
        Ok(client) => client.is_available().await,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    println!("Part-DB instance: {}", config.api_url);
    println!(
        "  Reachable: {}",
        if reachable { "yes" } else { "no" }
    );

    match open_store(cache_dir).and_then(|s| s.stats().map_err(|e| e.to_string())) {
        Ok(stats) => {
            println!("Cache:");
            println!("  Cached parts:  {}", stats.cached_parts);
            println!("  Snapshots:     {}", stats.snapshots);
            println!("  Size on disk:  {} bytes", stats.size_on_disk);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    }

    if reachable {
        0
    } else {
        1
    }
}

fn handle_fields(verbose: bool) {
    println!("Managed design fields:\n");

    let descriptions = [
        ("PartDB_ID", "Stable Part-DB identifier; trusted on re-runs"),
        ("MPN", "Manufacturer part number"),
        ("Description", "Part description from the inventory"),
        ("Datasheet", "Datasheet / product page URL"),
        ("Stock", "Total amount across all part lots"),
        ("Unit_Price", "Lowest single-unit price"),
        ("Footprint", "KiCad footprint reference"),
        ("Symbol", "KiCad symbol reference"),
        ("Storage_Location", "Comma-joined storage location names"),
    ];

    for name in MANAGED_FIELDS {
        println!("  {}", name);
        if verbose {
            if let Some((_, description)) = descriptions.iter().find(|(n, _)| *n == name) {
                println!("    {}", description);
            }
        }
    }
    println!();
}

fn handle_config(action: ConfigAction) -> i32 {
    match action {
        ConfigAction::Show { config } => {
            let config = match load_config(config, None, None) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return 1;
                }
            };
            println!("api_url:         {}", config.api_url);
            println!(
                "token:           {}",
                if config.token.is_empty() {
                    "(unset)"
                } else {
                    "***"
                }
            );
            println!("cache_ttl_hours: {}", config.cache_ttl_hours);
            println!("concurrency:     {}", config.concurrency);
            println!(
                "conflict_policy: {}",
                match config.conflict_policy {
                    ConflictPolicy::PreferLocal => "local",
                    ConflictPolicy::PreferRemote => "remote",
                }
            );
            0
        }
        ConfigAction::Set {
            api_url,
            token,
            ttl_hours,
            concurrency,
            prefer,
            config,
        } => {
            let path = match config.or_else(default_config_path) {
                Some(path) => path,
                None => {
                    eprintln!("Error: no config directory available; pass --config");
                    return 1;
                }
            };
            let mut current = match SyncConfig::load(&path) {
                Ok(current) => current,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return 1;
                }
            };
            if let Some(api_url) = api_url {
                current.api_url = api_url;
            }
            if let Some(token) = token {
                current.token = token;
            }
            if let Some(ttl_hours) = ttl_hours {
                current.cache_ttl_hours = ttl_hours;
            }
            if let Some(concurrency) = concurrency {
                current.concurrency = concurrency;
            }
            if let Some(prefer) = prefer {
                current.conflict_policy = prefer.into();
            }
            match current.save(&path) {
                Ok(()) => {
                    println!("Configuration saved to {}", path.display());
                    0
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    1
                }
            }
        }
    }
}

fn output_human(report: &SyncReport) {
    println!("\nSync report");
    println!("{}", "─".repeat(60));

    for entry in &report.outcomes {
        let stale_note = if entry.stale { " [stale cache]" } else { "" };
        match &entry.outcome {
            ComponentOutcome::Applied { changes } if changes.is_empty() => {
                println!("  {:<12} up to date{}", entry.component_id, stale_note);
            }
            ComponentOutcome::Applied { changes } => {
                println!(
                    "  {:<12} {} field(s) updated{}",
                    entry.component_id,
                    changes.len(),
                    stale_note
                );
                for change in changes {
                    println!("      {} = {}", change.field, change.new);
                }
            }
            ComponentOutcome::ConflictsFound { conflicts, applied } => {
                println!(
                    "  {:<12} CONFLICTS ({} field(s), {} applied){}",
                    entry.component_id,
                    conflicts.len(),
                    applied.len(),
                    stale_note
                );
                for conflict in conflicts {
                    println!(
                        "      {}: local \"{}\" vs remote \"{}\" (kept \"{}\")",
                        conflict.field, conflict.local, conflict.remote, conflict.kept
                    );
                }
            }
            ComponentOutcome::Unresolved => {
                println!("  {:<12} unresolved", entry.component_id);
            }
            ComponentOutcome::Ambiguous { candidates } => {
                println!(
                    "  {:<12} ambiguous: candidates {}",
                    entry.component_id,
                    candidates.join(", ")
                );
            }
            ComponentOutcome::Failed { error } => {
                println!("  {:<12} FAILED: {}", entry.component_id, error);
            }
            ComponentOutcome::Skipped => {
                println!("  {:<12} skipped (cancelled)", entry.component_id);
            }
        }
    }

    println!("\n  Summary:");
    println!("    Applied:    {}", report.stats.applied);
    println!("    Up to date: {}", report.stats.unchanged);
    println!("    Conflicts:  {}", report.stats.conflicts);
    println!("    Unresolved: {}", report.stats.unresolved);
    println!("    Ambiguous:  {}", report.stats.ambiguous);
    println!("    Failed:     {}", report.stats.failed);
    println!("    Skipped:    {}", report.stats.skipped);
    if report.cancelled {
        println!("\n  Pass was cancelled before completion.");
    }
}

fn output_json(report: &SyncReport) {
    println!("{}", serde_json::to_string_pretty(report).unwrap());
}
