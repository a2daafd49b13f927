use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::info;
use lychee_sync_core::{
    app_paths, load_config, save_config, sync_tree, JsonCatalog, NominatimGeocoder, RunReport,
    SyncConfig, SyncMode, SyncOrchestrator, SystemDecoder,
};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "lychee-sync")]
#[command(about = "Synchronise a folder tree of photos and videos into a Lychee catalog")]
struct Cli {
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Sync(SyncArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    /// Write the default configuration unless a file already exists.
    Init,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("mode").args(["normal", "replace", "dropdb"])))]
struct SyncArgs {
    source: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    normal: bool,
    /// Erase an album's photos when a file is already stored in it.
    #[arg(long)]
    replace: bool,
    /// Drop every album and photo before syncing.
    #[arg(long)]
    dropdb: bool,
    #[arg(long, default_value_t = false)]
    sort_album_by_name: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

impl SyncArgs {
    fn mode(&self) -> SyncMode {
        if self.replace {
            SyncMode::Replace
        } else if self.dropdb {
            SyncMode::Delete
        } else {
            SyncMode::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Sync(args) => cmd_sync(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(config.config),
            ConfigAction::Init => cmd_config_init(config.config),
        },
    }
}

fn cmd_sync(args: SyncArgs) -> Result<()> {
    let (mut config, config_path) = load_config(args.config.as_deref())?;
    info!("using config {}", config_path.display());
    if args.sort_album_by_name {
        config.sort_album_by_name = true;
    }
    let mode = args.mode();

    let catalog_path = config.resolve_catalog_path()?;
    if let Some(dir) = catalog_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create catalog directory: {}", dir.display()))?;
    }
    let catalog = JsonCatalog::open(&catalog_path)
        .with_context(|| format!("failed to open catalog: {}", catalog_path.display()))?;
    info!("catalog: {} (mode: {:?})", catalog_path.display(), mode);

    let decoder = SystemDecoder::new(config.ffprobe_path.clone());
    let mut sync = SyncOrchestrator::new(catalog, Box::new(decoder), config.sync_options(mode))?;
    if config.geocoding.enabled {
        let geocoder = NominatimGeocoder::new(
            &config.geocoding.endpoint,
            &config.geocoding.user_agent,
            config.geocoding.timeout(),
            config.geocoding.language.clone(),
        )?;
        sync = sync.with_geocoder(Box::new(geocoder));
    }

    let report = sync_tree(sync, &args.source)?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print_table(&report),
    }
    Ok(())
}

fn config_location(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(app_paths()?.config_path),
    }
}

fn cmd_config_show(explicit: Option<PathBuf>) -> Result<()> {
    let (config, path) = load_config(explicit.as_deref())?;
    println!("config file: {}", path.display());
    println!("catalog: {}", config.resolve_catalog_path()?.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init(explicit: Option<PathBuf>) -> Result<()> {
    let path = config_location(explicit)?;
    if path.exists() {
        anyhow::bail!("config file already exists: {}", path.display());
    }
    save_config(&SyncConfig::default(), &path)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn print_table(report: &RunReport) {
    if !report.failures.is_empty() {
        println!("failed files (path | album | checksum | reason)");
        for failure in &report.failures {
            println!(
                "{} | {} | {} | {}",
                failure.path.display(),
                failure.album,
                failure.checksum.as_deref().unwrap_or("-"),
                failure.reason
            );
        }
        println!();
    }
    if !report.erased_urls.is_empty() {
        println!("erased {} stored file(s):", report.erased_urls.len());
        for url in &report.erased_urls {
            println!("  {}", url);
        }
        println!();
    }

    println!(
        "summary: {} created={} skipped={} failed={} albums_renumbered={} renumber_failures={}",
        report.summary(),
        report.created,
        report.skipped,
        report.failed,
        report.albums_renumbered,
        report.renumber_failures
    );
}
