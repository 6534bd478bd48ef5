mod cli;

use animeshelf::app::Library;
use animeshelf::enrichment::MetadataProvider;
use animeshelf::scanner::canonical_root;
use animeshelf::store::CatalogStore;
use shelf_core::config::Config;
use shelf_core::events::{EventPayload, Topic};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, DirCommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "animeshelf=debug,shelf_db=debug,shelf_core=debug".to_string()
        } else {
            "animeshelf=info,shelf_db=warn,shelf_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let mut config = Config::load_or_default(cli.config.as_deref());
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    match cli.command {
        Commands::Validate => validate_config(cli.config.as_deref(), &config),
        command => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run(command, config))
        }
    }
}

async fn run(command: Commands, config: Config) -> Result<()> {
    let library = Library::open(config)?;

    match command {
        Commands::Scan { roots, no_enrich } => scan(&library, &roots, no_enrich).await,
        Commands::Enrich { series } => {
            let cancel = cancel_on_ctrl_c();
            let ids: Vec<_> = series.into_iter().collect();
            let submitted = library.enrich(&ids, library.providers(), &cancel).await?;
            println!("Processed {submitted} series");
            Ok(())
        }
        Commands::Dir { command } => dir(&library, command),
        Commands::List => {
            for s in library.store().list_series()? {
                println!(
                    "{}  {:>4} files  {:>12} bytes  {}",
                    s.id, s.file_count, s.total_size, s.title
                );
            }
            Ok(())
        }
        Commands::Cleanup => {
            let removed = library.store().cleanup_empty_series()?;
            println!("Removed {removed} empty series");
            Ok(())
        }
        Commands::Validate => validate_config(None, library.config()),
    }
}

async fn scan(library: &Library, roots: &[PathBuf], no_enrich: bool) -> Result<()> {
    let roots = if roots.is_empty() {
        library.registered_roots()?
    } else {
        library.roots_for(roots)?
    };
    if roots.is_empty() {
        anyhow::bail!("Nothing to scan: pass --root or register a directory with `dir add`");
    }

    let bus = library.bus();
    bus.subscribe_fn(Topic::ScanProgress, |event| {
        if let EventPayload::ScanProgress {
            directory,
            current,
            total,
        } = event.payload
        {
            tracing::info!(directory = %directory.display(), current, total, "Scan progress");
        }
    });
    bus.subscribe_fn(Topic::SeriesDiscovered, |event| {
        if let EventPayload::SeriesDiscovered { title, .. } = event.payload {
            println!("New series: {title}");
        }
    });

    let provider = if no_enrich {
        None
    } else {
        let provider = library.providers();
        if !provider.is_available() {
            tracing::warn!("No metadata provider configured; skipping enrichment");
        }
        Some(provider).filter(|p| p.is_available())
    };

    let cancel = cancel_on_ctrl_c();
    let report = library.scan(&roots, provider, &cancel).await;

    for root in &report.roots {
        println!(
            "{}: {} files, {} added, {} updated, {} new series, {} pruned, {} failed",
            root.path.display(),
            root.discovered,
            root.added,
            root.updated,
            root.series_created,
            root.pruned,
            root.failed_files,
        );
    }
    for (path, reason) in &report.failed_roots {
        println!("{}: skipped ({reason})", path.display());
    }
    if report.cancelled {
        println!("Scan cancelled");
    }
    Ok(())
}

fn dir(library: &Library, command: DirCommand) -> Result<()> {
    let store = library.store();
    match command {
        DirCommand::Add { path, description } => {
            let path = canonical_root(&path);
            let dir = store.add_directory(&path.to_string_lossy(), description.as_deref())?;
            println!("{}  {}", dir.id, dir.path);
        }
        DirCommand::Remove { id } => {
            if store.remove_directory(id)? {
                println!("Removed directory {id}");
            } else {
                anyhow::bail!("No directory with id {id}");
            }
        }
        DirCommand::List => {
            for d in store.list_directories()? {
                match d.description {
                    Some(desc) => println!("{}  {}  ({desc})", d.id, d.path),
                    None => println!("{}  {}", d.id, d.path),
                }
            }
        }
    }
    Ok(())
}

/// A token cancelled by the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted; finishing in-flight work");
            token.cancel();
        }
    });
    cancel
}

fn validate_config(path: Option<&std::path::Path>, config: &Config) -> Result<()> {
    match path {
        Some(p) => println!("Validating config: {:?}", p),
        None => println!("No config file specified, using defaults"),
    }
    println!("  Roots: {}", config.library.roots.len());
    println!("  Database: {}", config.database.path.display());
    println!("  Scan workers: {}", config.scan.workers);
    println!(
        "  Enrichment: {} ({} workers)",
        if config.enrichment.enabled { "enabled" } else { "disabled" },
        config.enrichment.workers
    );

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        for w in &warnings {
            println!("⚠ {w}");
        }
    }
    Ok(())
}
