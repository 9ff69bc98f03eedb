use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fs;

use crate::model::{ChainType, Network, Token};

#[derive(Debug, Deserialize, Clone)]
pub struct PanelConfig {
    /// Solana JSON-RPC endpoint used when no `networks` are listed
    pub rpc_url: String,
    /// Jupiter swap API base, e.g. https://quote-api.jup.ag/v6
    pub jupiter_api_url: String,
    /// Jupiter price endpoint, queried as `?ids=<mint>`
    pub jupiter_price_url: String,
    /// Base58 public key of the wallet to watch and swap from
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub networks: Vec<Network>,
    /// Exchange labels to report. When empty they are fetched from Jupiter
    #[serde(default)]
    pub exchanges: Vec<String>,
    /// Symbol of the token being sold
    pub input_token: String,
    /// Symbol of the token being bought
    pub output_token: String,
    /// Amount of `input_token` in UI units, e.g. "1.5"
    #[serde(default)]
    pub amount: String,
    /// Allowed slippage in basis points (1 bp = 0.01%). Defaults to 50 (0.5%)
    #[serde(default)]
    pub slippage_bps: Option<u64>,
    /// Seconds between refreshes in watch mode. Defaults to 15s
    #[serde(default)]
    pub poll_secs: Option<u64>,
    /// HTTP timeout for aggregator and RPC calls. Defaults to 15s
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl PanelConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| anyhow!(e))?;
        if cfg.slippage_bps.unwrap_or(0) > 10_000 {
            return Err(anyhow!("slippage_bps must be at most 10000"));
        }
        Ok(cfg)
    }

    pub fn slippage_percentage(&self) -> f64 {
        self.slippage_bps.unwrap_or(50) as f64 / 100.0
    }

    pub fn poll_secs(&self) -> u64 {
        self.poll_secs.unwrap_or(15).max(1)
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs.unwrap_or(15)
    }

    /// Configured networks, or a single mainnet entry built from `rpc_url`.
    pub fn networks(&self) -> Vec<Network> {
        if !self.networks.is_empty() {
            return self.networks.clone();
        }
        vec![Network {
            id: "solana-mainnet".to_string(),
            name: "Solana".to_string(),
            chain: ChainType::Solana,
            rpc_url: self.rpc_url.clone(),
        }]
    }
}
