//! # RxDesk Till Library
//!
//! The pharmacy till: configuration, local database, backend client and
//! the cashier commands, wired together and driven from a line shell.
//!
//! ## Module Organization
//! ```text
//! rxdesk_till/
//! ├── lib.rs          ◄─── You are here (startup & run)
//! ├── state/
//! │   ├── mod.rs      ◄─── State type exports, Till bundle
//! │   ├── cart.rs     ◄─── Cart, held carts, checkout guard
//! │   ├── inventory.rs◄─── Snapshot provider (backend or cache)
//! │   └── config.rs   ◄─── TOML + env configuration
//! ├── commands/       ◄─── Cashier actions
//! ├── shell.rs        ◄─── Line-oriented front end
//! └── error.rs        ◄─── API error type for commands
//! ```

pub mod commands;
pub mod error;
pub mod shell;
pub mod state;

use std::path::PathBuf;
use std::sync::Arc;

use directories::ProjectDirs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rxdesk_backend::SupabaseClient;
use rxdesk_db::{Database, DbConfig};
use state::{InventoryProvider, Till, TillConfig};

/// Runs the till.
///
/// ## Startup Sequence
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  1. Logging ──── tracing-subscriber, RUST_LOG overrides the default     │
/// │  2. Config ───── RXDESK_CONFIG or the platform config dir, then env     │
/// │  3. Database ─── SQLite cache + offline journal, migrations applied     │
/// │  4. Backend ──── HTTP client (connect timeout only, no request sent)    │
/// │  5. State ────── Till { cart, checkout, inventory, config }             │
/// │  6. Shell ────── read commands from stdin until `quit` or EOF          │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = TillConfig::load(std::env::var_os("RXDESK_CONFIG").map(PathBuf::from))?;
    info!(branch_id = %config.branch_id(), "Starting RxDesk till");

    let db_path = database_path(&config)?;
    info!(?db_path, "Database path determined");
    let db = Database::new(DbConfig::new(db_path)).await?;

    let backend = SupabaseClient::new(&config.backend, config.currency.decimals)?;
    let inventory = InventoryProvider::new(config.branch_id(), Arc::new(backend), db);

    let till = Till::new(config, inventory);
    shell::run(&till).await?;

    till.inventory.database().close().await;
    info!("Till closed");
    Ok(())
}

/// Initializes the tracing subscriber. Logs go to stderr so they never mix
/// with receipts printed on stdout.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=rxdesk_backend=trace` - Trace the backend client only
/// - Default: INFO, debug for the rxdesk crates
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rxdesk=debug,sqlx=warn"));

    // A second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Database file: `[database] path`, else the platform data directory.
///
/// ## Platform-Specific Paths
/// - **macOS**: `~/Library/Application Support/com.rxdesk.till/till.db`
/// - **Windows**: `%APPDATA%\rxdesk\till\data\till.db`
/// - **Linux**: `~/.local/share/till/till.db`
pub fn database_path(config: &TillConfig) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = &config.database.path {
        return Ok(path.clone());
    }

    let proj_dirs = ProjectDirs::from("com", "rxdesk", "till")
        .ok_or("Could not determine app data directory")?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;

    Ok(data_dir.join("till.db"))
}
