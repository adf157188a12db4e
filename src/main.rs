mod cli;

use clopetracker::{avatar, config, server};
use clopetracker_db::pool::init_pool;
use clopetracker_imaging::Normalizer;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting clopetracker server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    let db_path = config.server.db_path.to_string_lossy().into_owned();
    tracing::info!("Initializing database at {}", db_path);
    let db_pool = init_pool(&db_path)?;

    server::start_server(config, db_pool).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "clopetracker=trace,clopetracker_imaging=trace,clopetracker_db=debug,clopetracker_common=debug,tower_http=debug".to_string()
        } else {
            "clopetracker=debug,clopetracker_imaging=debug,clopetracker_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Normalize { input, output_dir } => {
            normalize_file(&input, &output_dir, cli.config.as_deref())
        }
        Commands::PruneOrphans { dry_run } => prune_orphans(cli.config.as_deref(), dry_run),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("clopetracker {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn normalize_file(input: &Path, output_dir: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read image {:?}", input))?;
    let original_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let normalizer = Normalizer::new(config.avatar.normalize_settings());
    let image = normalizer
        .normalize(&bytes, &original_name)
        .with_context(|| format!("Failed to normalize {:?}", input))?;

    std::fs::create_dir_all(output_dir)?;
    let output = output_dir.join(&image.filename);
    std::fs::write(&output, &image.bytes)
        .with_context(|| format!("Failed to write {:?}", output))?;

    println!("Input:  {} ({} bytes)", input.display(), bytes.len());
    println!(
        "Output: {} ({}x{}, {}, {} bytes)",
        output.display(),
        image.width,
        image.height,
        image.content_type,
        image.len()
    );

    Ok(())
}

fn prune_orphans(config_path: Option<&Path>, dry_run: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let db_path = config.server.db_path.to_string_lossy().into_owned();
    let db_pool = init_pool(&db_path)?;

    let ctx = server::AppContext::new(config, db_pool);
    let report = avatar::prune_orphans(
        &ctx.store,
        ctx.storage.as_ref(),
        &ctx.config.avatar.upload_dir,
        dry_run,
    )?;

    println!("Scanned: {}", report.scanned);
    println!("Referenced: {}", report.referenced);
    if dry_run {
        println!("[DRY RUN] Would remove {} orphaned files", report.removed.len());
    } else {
        println!("Removed: {}", report.removed.len());
    }
    for name in &report.removed {
        println!("  {}", name);
    }
    if !report.failed.is_empty() {
        println!("Failed: {}", report.failed.len());
        for name in &report.failed {
            println!("  {}", name);
        }
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, validating defaults");
            config::Config::default()
        }
    };
    config::validate_config(&config)?;

    println!("✓ Configuration is valid");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Database: {:?}", config.server.db_path);
    println!(
        "  Media: {:?} at {}",
        config.storage.media_root, config.storage.media_url
    );
    println!(
        "  Avatars: {}x{} in {:?}, formats {:?}",
        config.avatar.target_size,
        config.avatar.target_size,
        config.avatar.upload_dir,
        config.avatar.formats
    );

    Ok(())
}
