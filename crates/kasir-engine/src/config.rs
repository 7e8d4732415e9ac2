//! # Engine Configuration
//!
//! Settings for the checkout engine and its outbox worker.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     KASIR_DB_PATH=/var/lib/kasir/kasir.db                               │
//! │     KASIR_MISSING_REFERENCE_POLICY=skip                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/kasir/kasir.toml (Linux)                                  │
//! │     ~/Library/Application Support/id.kasir.kasir/kasir.toml (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # kasir.toml
//! [database]
//! path = "kasir.db"
//! max_connections = 5
//!
//! [checkout]
//! missing_reference_policy = "reject"  # reject | skip
//! payment_tolerance_minor = 50         # hundredths of a rupiah
//! max_cart_lines = 100
//!
//! [inventory]
//! restore_ingredients_on_cancel = false
//!
//! [outbox]
//! poll_interval_secs = 5
//! batch_size = 100
//! max_attempts = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use kasir_core::{MissingReferencePolicy, Money, MAX_CART_LINES, PAYMENT_TOLERANCE};
use kasir_db::DbConfig;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Created on first start.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("kasir.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Checkout behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// What to do when a cart names a variant or modifier that is gone.
    #[serde(default)]
    pub missing_reference_policy: MissingReferencePolicy,

    /// How far below the total the tendered payments may fall, in
    /// hundredths. Default: 50 (half a rupiah).
    #[serde(default = "default_payment_tolerance")]
    pub payment_tolerance_minor: i64,

    #[serde(default = "default_max_cart_lines")]
    pub max_cart_lines: usize,
}

fn default_payment_tolerance() -> i64 {
    PAYMENT_TOLERANCE.minor()
}

fn default_max_cart_lines() -> usize {
    MAX_CART_LINES
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            missing_reference_policy: MissingReferencePolicy::default(),
            payment_tolerance_minor: default_payment_tolerance(),
            max_cart_lines: default_max_cart_lines(),
        }
    }
}

impl CheckoutSettings {
    pub fn payment_tolerance(&self) -> Money {
        Money::from_minor(self.payment_tolerance_minor)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventorySettings {
    /// Give recipe ingredients back when a completed sale is cancelled.
    /// Off by default: prepared food is usually not recoverable.
    #[serde(default)]
    pub restore_ingredients_on_cancel: bool,
}

/// Outbox worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxSettings {
    /// Interval between outbox poll cycles (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Number of events handled per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Attempts before an event is left as a dead letter.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_batch_size() -> u32 {
    100
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for OutboxSettings {
    fn default() -> Self {
        OutboxSettings {
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl OutboxSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub inventory: InventorySettings,

    #[serde(default)]
    pub outbox: OutboxSettings,
}

impl EngineConfig {
    /// Loads configuration: defaults, then the file, then `KASIR_*`
    /// environment overrides. The result is validated.
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn from_toml(contents: &str) -> EngineResult<Self> {
        toml::from_str(contents).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.checkout.payment_tolerance_minor < 0 {
            return Err(EngineError::Config(
                "payment_tolerance_minor must not be negative".into(),
            ));
        }

        if self.checkout.max_cart_lines == 0 {
            return Err(EngineError::Config(
                "max_cart_lines must be greater than 0".into(),
            ));
        }

        if self.outbox.batch_size == 0 {
            return Err(EngineError::Config(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.outbox.max_attempts == 0 {
            return Err(EngineError::Config(
                "max_attempts must be greater than 0".into(),
            ));
        }

        if self.outbox.poll_interval_secs == 0 {
            return Err(EngineError::Config(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Database settings as a pool configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("KASIR_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(policy) = std::env::var("KASIR_MISSING_REFERENCE_POLICY") {
            match policy.to_lowercase().as_str() {
                "reject" => self.checkout.missing_reference_policy = MissingReferencePolicy::Reject,
                "skip" => self.checkout.missing_reference_policy = MissingReferencePolicy::Skip,
                _ => warn!(policy = %policy, "Unknown missing reference policy in environment"),
            }
        }

        if let Ok(value) = std::env::var("KASIR_PAYMENT_TOLERANCE_MINOR") {
            if let Ok(v) = value.parse::<i64>() {
                self.checkout.payment_tolerance_minor = v;
            }
        }

        if let Ok(value) = std::env::var("KASIR_RESTORE_INGREDIENTS_ON_CANCEL") {
            if let Ok(v) = value.parse::<bool>() {
                self.inventory.restore_ingredients_on_cancel = v;
            }
        }

        if let Ok(value) = std::env::var("KASIR_OUTBOX_MAX_ATTEMPTS") {
            if let Ok(v) = value.parse::<u32>() {
                self.outbox.max_attempts = v;
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("id", "kasir", "kasir")
            .map(|dirs| dirs.config_dir().join("kasir.toml"))
    }
}
