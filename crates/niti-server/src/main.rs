//! Niti-Nirman — welfare scheme eligibility server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use niti_core::{NitiConfig, Scheme};
use niti_server::{build_router, AppState};
use niti_store::SqliteStore;

fn resolve_data_dir() -> PathBuf {
    std::env::var("NITI_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

/// Load a JSON array of schemes into the catalog.
fn import_schemes(file: &str) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(file)?;
    let schemes: Vec<Scheme> = serde_json::from_str(&raw)?;
    let config = NitiConfig::from_env(resolve_data_dir())?;
    let store = SqliteStore::open(&config.data_paths.database)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;
    Ok(store.import_schemes(&schemes)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "import-schemes" => {
                let Some(file) = args.get(2) else {
                    eprintln!("Usage: niti import-schemes <schemes.json>");
                    std::process::exit(1);
                };
                let count = import_schemes(file)?;
                println!("Imported {} schemes from {}", count, file);
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("Niti-Nirman — welfare scheme eligibility server");
                println!();
                println!("Usage: niti [command]");
                println!();
                println!("Commands:");
                println!("  (none)                     Start the server");
                println!("  import-schemes <file>      Load a JSON scheme catalog");
                println!("  help                       Show this help message");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'niti help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = NitiConfig::from_env(&data_dir)?;
    let port = config.port;

    let state = Arc::new(
        AppState::new(config).map_err(|e| anyhow::anyhow!("Failed to start: {}", e))?,
    );
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Niti-Nirman server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
