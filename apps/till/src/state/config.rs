//! # Till Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     RXDESK_BRANCH_ID=branch-1                                          │
//! │     RXDESK_BACKEND_URL=https://abcd.supabase.co                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/rxdesk/till.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.rxdesk.till/till.toml (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [pharmacy]
//! name = "Uzima Pharmacy"
//! phone = "+255 22 000 0000"
//! footer = "Get well soon"
//!
//! [branch]
//! id = "0b6f8c1e-4d7a-4a53-9d8e-1f6a2b3c4d5e"
//! name = "Kariakoo"
//! address = "Msimbazi St, Dar es Salaam"   # overrides [pharmacy] on receipts
//!
//! [currency]
//! code = "TZS"
//! decimals = 0
//!
//! [backend]
//! base_url = "https://abcd.supabase.co"
//! api_key = "public-anon-key"
//!
//! [database]
//! path = "/var/lib/rxdesk/till.db"
//!
//! [session]
//! staff_name = "Neema"
//!
//! [receipt]
//! width = 42
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use rxdesk_backend::BackendConfig;
use rxdesk_core::{BranchLetterhead, CheckoutContext, CurrencyFormat, Letterhead};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchSettings {
    /// Branch whose stock this till sells from.
    #[serde(default)]
    pub id: String,

    /// Receipt overrides for this branch.
    #[serde(flatten)]
    pub letterhead: BranchLetterhead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencySettings {
    #[serde(default = "default_currency_code")]
    pub code: String,

    #[serde(default)]
    pub decimals: u8,
}

fn default_currency_code() -> String {
    "TZS".to_string()
}

impl Default for CurrencySettings {
    fn default() -> Self {
        CurrencySettings {
            code: default_currency_code(),
            decimals: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Defaults to `till.db` in the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub staff_name: Option<String>,

    #[serde(default)]
    pub shift_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptSettings {
    /// Paper width in characters (typically 32, 42 or 48).
    #[serde(default = "default_receipt_width")]
    pub width: usize,
}

fn default_receipt_width() -> usize {
    42
}

impl Default for ReceiptSettings {
    fn default() -> Self {
        ReceiptSettings {
            width: default_receipt_width(),
        }
    }
}

// =============================================================================
// Till Config
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TillConfig {
    #[serde(default)]
    pub pharmacy: Letterhead,

    #[serde(default)]
    pub branch: BranchSettings,

    #[serde(default)]
    pub currency: CurrencySettings,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub receipt: ReceiptSettings,
}

impl TillConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (till.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading till config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.branch.id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "branch.id is required (or set RXDESK_BRANCH_ID)".into(),
            ));
        }

        if self.currency.code.trim().is_empty() {
            return Err(ConfigError::Invalid("currency.code must not be empty".into()));
        }

        if self.currency.decimals > 4 {
            return Err(ConfigError::Invalid(format!(
                "currency.decimals must be between 0 and 4, got {}",
                self.currency.decimals
            )));
        }

        self.backend
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("RXDESK_BRANCH_ID") {
            debug!(branch_id = %id, "Overriding branch from environment");
            self.branch.id = id;
        }

        if let Ok(code) = std::env::var("RXDESK_CURRENCY") {
            self.currency.code = code;
        }

        if let Ok(decimals) = std::env::var("RXDESK_CURRENCY_DECIMALS") {
            match decimals.parse::<u8>() {
                Ok(d) => self.currency.decimals = d,
                Err(_) => warn!(value = %decimals, "Ignoring invalid RXDESK_CURRENCY_DECIMALS"),
            }
        }

        if let Ok(path) = std::env::var("RXDESK_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(name) = std::env::var("RXDESK_STAFF_NAME") {
            self.session.staff_name = Some(name).filter(|n| !n.trim().is_empty());
        }

        self.backend.apply_env_overrides();
    }

    /// `till.toml` in the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "rxdesk", "till")
            .map(|dirs| dirs.config_dir().join("till.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn branch_id(&self) -> &str {
        &self.branch.id
    }

    pub fn currency_format(&self) -> CurrencyFormat {
        CurrencyFormat::new(self.currency.code.clone(), self.currency.decimals)
    }

    /// Pharmacy letterhead with this branch's overrides applied.
    pub fn letterhead(&self) -> Letterhead {
        Letterhead::resolve(&self.pharmacy, Some(&self.branch.letterhead))
    }

    /// Session context handed to the reconciliation engine.
    pub fn checkout_context(&self) -> CheckoutContext {
        let mut context =
            CheckoutContext::new(self.branch.id.clone()).with_currency(self.currency_format());
        if let Some(staff) = &self.session.staff_name {
            context = context.with_staff(staff.clone());
        }
        if let Some(shift) = &self.session.shift_id {
            context = context.with_shift(shift.clone());
        }
        context
    }
}
