//! Application configuration.

use crate::error::{AppError, AppResult};
use lotwise_executor::ExecutorConfig;
use lotwise_risk::RiskGateConfig;
use lotwise_sizing::RiskParameters;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Environment variable that names the config file.
pub const CONFIG_ENV: &str = "LOTWISE_CONFIG";

/// Config file used when neither the CLI nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix for environment overrides, e.g. `LOTWISE__EXECUTOR__MAX_BATCH_SIZE`.
const ENV_PREFIX: &str = "LOTWISE";

// ============================================================================
// Sections
// ============================================================================

/// Margin estimation used when the provider has no margin-per-lot figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginConfig {
    /// Share of contract value (percent) assumed as margin per lot.
    #[serde(default = "default_contract_value_pct")]
    pub contract_value_pct: Decimal,
}

fn default_contract_value_pct() -> Decimal {
    Decimal::from(12)
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            contract_value_pct: default_contract_value_pct(),
        }
    }
}

/// Suggestion lifetime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Time-to-live of a new suggestion. Default: 24 hours.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u32,
    /// How often the expiry sweeper runs. Default: 60 seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_ttl_hours() -> u32 {
    24
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl LifecycleConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.ttl_hours))
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Audit trail settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_audit_dir")]
    pub audit_dir: String,
    /// Records buffered before a flush.
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
}

fn default_true() -> bool {
    true
}

fn default_audit_dir() -> String {
    "data/audit".to_string()
}

fn default_max_buffer_size() -> usize {
    100
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            audit_dir: default_audit_dir(),
            max_buffer_size: default_max_buffer_size(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_filter: Option<String>,
}

/// One instrument of the paper market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperInstrument {
    pub symbol: String,
    pub price: Decimal,
    pub lot_size: u32,
    /// Broker margin per lot. Absent means margin is estimated.
    #[serde(default)]
    pub margin_per_lot: Option<Decimal>,
    /// Recent closes, oldest first.
    #[serde(default)]
    pub closes: Vec<Decimal>,
}

/// In-process market and broker simulation backing the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_paper_margin")]
    pub available_margin: Decimal,
    #[serde(default = "default_paper_volatility")]
    pub volatility_index: Decimal,
    /// Batch indexes (0-based) the paper broker rejects.
    #[serde(default)]
    pub reject_batches: Vec<usize>,
    /// Simulated placement latency.
    #[serde(default)]
    pub fill_latency_ms: u64,
    #[serde(default = "default_paper_instruments")]
    pub instruments: Vec<PaperInstrument>,
}

fn default_paper_margin() -> Decimal {
    Decimal::from(1_000_000)
}

fn default_paper_volatility() -> Decimal {
    Decimal::from(12)
}

fn default_paper_instruments() -> Vec<PaperInstrument> {
    vec![PaperInstrument {
        symbol: "NIFTY".to_string(),
        price: Decimal::from(24_150),
        lot_size: 75,
        margin_per_lot: Some(Decimal::from(120_000)),
        closes: vec![
            Decimal::from(24_020),
            Decimal::from(24_090),
            Decimal::from(24_150),
        ],
    }]
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            available_margin: default_paper_margin(),
            volatility_index: default_paper_volatility(),
            reject_batches: Vec::new(),
            fill_latency_ms: 0,
            instruments: default_paper_instruments(),
        }
    }
}

impl PaperConfig {
    pub fn instrument(&self, symbol: &str) -> Option<&PaperInstrument> {
        self.instruments.iter().find(|i| i.symbol == symbol)
    }
}

// ============================================================================
// AppConfig
// ============================================================================

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub risk: RiskGateConfig,
    /// Active sizing rule.
    #[serde(default)]
    pub sizing: RiskParameters,
    #[serde(default)]
    pub margin: MarginConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub paper: PaperConfig,
}

impl AppConfig {
    /// Pick the config path: CLI argument, then `LOTWISE_CONFIG`, then the default.
    pub fn resolve_path(cli_path: Option<String>) -> String {
        cli_path
            .or_else(|| std::env::var(CONFIG_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load `path` layered with `LOTWISE__`-prefixed environment variables.
    ///
    /// A missing file falls back to defaults (plus environment overrides).
    pub fn load(path: &str) -> AppResult<Self> {
        if !Path::new(path).exists() {
            tracing::warn!(path = %path, "Config file not found, using defaults");
        }

        config::Config::builder()
            .add_source(config::File::from(Path::new(path)).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AppError::Config(format!("Failed to load config: {e}")))
    }

    /// Load from a specific TOML file, without environment overrides.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Check every section.
    pub fn validate(&self) -> AppResult<()> {
        self.risk.validate()?;
        self.sizing.validate()?;
        self.executor.validate()?;

        let pct = self.margin.contract_value_pct;
        if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
            return Err(AppError::Config(format!(
                "margin.contract_value_pct must be in (0, 100], got {pct}"
            )));
        }
        if self.lifecycle.ttl_hours == 0 {
            return Err(AppError::Config("lifecycle.ttl_hours must be > 0".to_string()));
        }
        if self.lifecycle.sweep_interval_secs == 0 {
            return Err(AppError::Config(
                "lifecycle.sweep_interval_secs must be > 0".to_string(),
            ));
        }
        if self.persistence.enabled && self.persistence.audit_dir.trim().is_empty() {
            return Err(AppError::Config(
                "persistence.audit_dir must be set when persistence is enabled".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for inst in &self.paper.instruments {
            if !seen.insert(inst.symbol.as_str()) {
                return Err(AppError::Config(format!(
                    "paper instrument {} listed twice",
                    inst.symbol
                )));
            }
            if inst.price <= Decimal::ZERO || inst.lot_size == 0 {
                return Err(AppError::Config(format!(
                    "paper instrument {} needs a positive price and lot size",
                    inst.symbol
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotwise_executor::RetryPolicy;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.lifecycle.ttl(), chrono::Duration::hours(24));
        assert_eq!(config.executor.max_batch_size, 20);
        assert_eq!(config.executor.retry, RetryPolicy::None);
        assert!(config.persistence.enabled);
    }

    #[test]
    fn test_shipped_default_file_is_valid() {
        let config: AppConfig =
            toml::from_str(include_str!("../../../config/default.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.risk, RiskGateConfig::default());
        assert_eq!(config.sizing, RiskParameters::default());
        assert_eq!(config.paper.instruments.len(), 3);
        assert_eq!(
            config.paper.instrument("BANKNIFTY").unwrap().margin_per_lot,
            None
        );
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = AppConfig::default();
        config.sizing.hard_cap_lots = Some(40);
        config.paper.reject_batches = vec![2];

        let text = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lotwise.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[executor]
max_batch_size = 25

[lifecycle]
ttl_hours = 6
"#
        )
        .unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.executor.max_batch_size, 25);
        assert_eq!(config.executor.inter_batch_delay_ms, 1_000);
        assert_eq!(config.lifecycle.ttl_hours, 6);
        assert_eq!(config.risk, RiskGateConfig::default());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lotwise.toml");
        std::fs::write(
            &path,
            r#"
[margin]
contract_value_pct = "15"

[paper]
available_margin = "500000"
"#,
        )
        .unwrap();

        let config = AppConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.margin.contract_value_pct, dec!(15));
        assert_eq!(config.paper.available_margin, dec!(500000));
        assert_eq!(config.lifecycle, LifecycleConfig::default());
    }

    #[test]
    fn test_missing_file_from_file_errors() {
        let result = AppConfig::from_file("/nonexistent/lotwise.toml");
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_sections() {
        let mut config = AppConfig::default();
        config.executor.max_batch_size = 0;
        assert!(matches!(config.validate(), Err(AppError::Executor(_))));

        let mut config = AppConfig::default();
        config.risk.movement_warning_pct = dec!(5);
        assert!(matches!(config.validate(), Err(AppError::Risk(_))));

        let mut config = AppConfig::default();
        config.sizing.safety_fraction = dec!(1.5);
        assert!(matches!(config.validate(), Err(AppError::Sizing(_))));

        let mut config = AppConfig::default();
        config.margin.contract_value_pct = dec!(0);
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = AppConfig::default();
        config.lifecycle.ttl_hours = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = AppConfig::default();
        let dup = config.paper.instruments[0].clone();
        config.paper.instruments.push(dup);
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
