//! Configuration for signing-request assembly
//!
//! Loaded from a TOML file, with `.env` / environment overrides for the vault
//! identity and RPC endpoint.

use crate::tx_builder::{AssemblyError, AssemblyResult, TipPlacement, TipPlan, TransactionFormat};
use crate::tx_builder::payload::CHAIN_SOLANA_MAINNET;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Custodial vault and signing endpoint
    pub custody: CustodyConfig,

    #[serde(default)]
    pub rpc: RpcConfig,

    /// Alternate relay (manual push) and tip settings
    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub priority_fee: PriorityFeeConfig,

    pub open_position: Option<OpenPositionConfig>,
    pub remove_liquidity: Option<RemoveLiquidityConfig>,
    pub swap: Option<SwapConfig>,
    pub harvest: Option<HarvestConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyConfig {
    /// Vault identifier at the signing service
    #[serde(default)]
    pub vault_id: String,

    /// On-chain address of the vault; fee payer of every transaction
    #[serde(default)]
    pub vault_address: String,

    #[serde(default = "default_api_path_endpoint")]
    pub api_path_endpoint: String,

    #[serde(default = "default_chain")]
    pub chain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_url")]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay the signed transaction ourselves instead of letting the service push it
    #[serde(default)]
    pub use_alternate_relay: bool,

    /// Tip in lamports; 0 disables the tip instruction
    #[serde(default = "default_tip_lamports")]
    pub tip_lamports: u64,

    #[serde(default = "default_tip_account")]
    pub tip_account: String,

    #[serde(default)]
    pub tip_placement: TipPlacement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityFeeConfig {
    /// Percentile of recent prioritization fees (0.0 - 1.0)
    #[serde(default = "default_fee_percentile")]
    pub percentile: f64,

    #[serde(default)]
    pub floor_micro_lamports: u64,

    /// Only sample fees paid by transactions locking these accounts (e.g. the pool)
    #[serde(default)]
    pub accounts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPositionConfig {
    pub pool: String,
    /// Base-mint amount in UI units
    pub input_amount: f64,
    pub start_price: f64,
    pub end_price: f64,
    #[serde(default)]
    pub tx_version: TransactionFormat,
    #[serde(default = "default_cu_limit")]
    pub cu_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveLiquidityConfig {
    pub pool: String,
    /// Also close the position account once liquidity is withdrawn
    #[serde(default)]
    pub close_position: bool,
    #[serde(default)]
    pub tx_version: TransactionFormat,
    #[serde(default = "default_cu_limit")]
    pub cu_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    pub input_mint: String,
    pub output_mint: String,
    #[serde(default)]
    pub is_input_sol: bool,
    #[serde(default)]
    pub is_output_sol: bool,
    /// Input amount in base units
    pub amount: u64,
    /// Slippage tolerance in percent (1 = 100 bps)
    #[serde(default = "default_slippage_percent")]
    pub slippage_percent: f64,
    #[serde(default)]
    pub tx_version: TransactionFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    #[serde(default)]
    pub tx_version: TransactionFormat,
    #[serde(default = "default_cu_limit")]
    pub cu_limit: u32,
}

// Default value functions
fn default_api_path_endpoint() -> String { "/api/v1/transactions/create-and-wait".to_string() }
fn default_chain() -> String { CHAIN_SOLANA_MAINNET.to_string() }
fn default_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_tip_lamports() -> u64 { 1_000 }
fn default_tip_account() -> String { "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5".to_string() }
fn default_fee_percentile() -> f64 { 0.9 }
fn default_cu_limit() -> u32 { 600_000 }
fn default_slippage_percent() -> f64 { 1.0 }

impl Default for RpcConfig {
    fn default() -> Self {
        Self { url: default_rpc_url() }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            use_alternate_relay: false,
            tip_lamports: default_tip_lamports(),
            tip_account: default_tip_account(),
            tip_placement: TipPlacement::default(),
        }
    }
}

impl Default for PriorityFeeConfig {
    fn default() -> Self {
        Self {
            percentile: default_fee_percentile(),
            floor_micro_lamports: 0,
            accounts: Vec::new(),
        }
    }
}

pub(crate) fn parse_pubkey(field: &str, value: &str) -> AssemblyResult<Pubkey> {
    Pubkey::from_str(value.trim()).map_err(|e| {
        AssemblyError::configuration(format!("{} is not a valid address ('{}'): {}", field, value, e))
    })
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override vault identity and RPC URL from `VAULT_ID`, `VAULT_ADDRESS`, `RPC_URL`
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("VAULT_ID").filter(|v| !v.is_empty()) {
            self.custody.vault_id = v;
        }
        if let Some(v) = lookup("VAULT_ADDRESS").filter(|v| !v.is_empty()) {
            self.custody.vault_address = v;
        }
        if let Some(v) = lookup("RPC_URL").filter(|v| !v.is_empty()) {
            self.rpc.url = v;
        }
    }

    pub fn validate(&self) -> AssemblyResult<()> {
        self.custody.validate()?;
        self.relay.validate()?;

        if !(0.0..=1.0).contains(&self.priority_fee.percentile) {
            return Err(AssemblyError::configuration(
                "priority_fee.percentile must be within 0.0..=1.0",
            ));
        }
        self.priority_fee.account_pubkeys()?;
        if let Some(open) = &self.open_position {
            open.validate()?;
        }
        if let Some(remove) = &self.remove_liquidity {
            parse_pubkey("remove_liquidity.pool", &remove.pool)?;
        }
        if let Some(swap) = &self.swap {
            swap.validate()?;
        }
        Ok(())
    }
}

impl CustodyConfig {
    pub fn validate(&self) -> AssemblyResult<()> {
        if self.vault_id.trim().is_empty() {
            return Err(AssemblyError::configuration("custody.vault_id is not set"));
        }
        if self.chain.trim().is_empty() {
            return Err(AssemblyError::configuration("custody.chain is empty"));
        }
        self.vault_pubkey().map(|_| ())
    }

    pub fn vault_pubkey(&self) -> AssemblyResult<Pubkey> {
        parse_pubkey("custody.vault_address", &self.vault_address)
    }
}

impl PriorityFeeConfig {
    pub fn account_pubkeys(&self) -> AssemblyResult<Vec<Pubkey>> {
        self.accounts
            .iter()
            .map(|account| parse_pubkey("priority_fee.accounts", account))
            .collect()
    }
}

impl RelayConfig {
    pub fn validate(&self) -> AssemblyResult<()> {
        if self.use_alternate_relay && self.tip_lamports > 0 {
            parse_pubkey("relay.tip_account", &self.tip_account)?;
        }
        Ok(())
    }

    /// The tip to merge for `payer`, if the alternate relay is on and tips are enabled
    pub fn tip_plan(&self, payer: &Pubkey) -> AssemblyResult<Option<TipPlan>> {
        if !self.use_alternate_relay || self.tip_lamports == 0 {
            return Ok(None);
        }
        Ok(Some(TipPlan {
            payer: *payer,
            tip_account: parse_pubkey("relay.tip_account", &self.tip_account)?,
            lamports: self.tip_lamports,
            placement: self.tip_placement,
        }))
    }
}

impl OpenPositionConfig {
    pub fn validate(&self) -> AssemblyResult<()> {
        parse_pubkey("open_position.pool", &self.pool)?;
        if !(self.input_amount > 0.0) {
            return Err(AssemblyError::configuration(
                "open_position.input_amount must be positive",
            ));
        }
        // Tick order is normalized downstream, only the sign matters here
        if !(self.start_price > 0.0 && self.end_price > 0.0) {
            return Err(AssemblyError::configuration(
                "open_position prices must be positive",
            ));
        }
        Ok(())
    }
}

impl SwapConfig {
    pub fn validate(&self) -> AssemblyResult<()> {
        parse_pubkey("swap.input_mint", &self.input_mint)?;
        parse_pubkey("swap.output_mint", &self.output_mint)?;
        if self.amount == 0 {
            return Err(AssemblyError::configuration("swap.amount must be positive"));
        }
        if !(0.0..=100.0).contains(&self.slippage_percent) {
            return Err(AssemblyError::configuration(
                "swap.slippage_percent must be within 0..=100",
            ));
        }
        Ok(())
    }

    pub fn slippage_bps(&self) -> u16 {
        (self.slippage_percent * 100.0).round() as u16
    }
}
