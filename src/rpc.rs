use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;

use crate::error::{Result, SwapError};
use crate::model::{Account, Balance, FeeEstimate, FeeLevel, Network, Token, NATIVE_DECIMALS, NATIVE_MINT};
use crate::provider::WalletSource;
use crate::swap_client::{JupiterClient, PriceSource};

pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

const BASE_SIGNATURE_FEE_LAMPORTS: u64 = 5_000;
const DEFAULT_COMPUTE_UNITS: u64 = 200_000;

/// Make a Solana JSON-RPC call and return its `result`.
pub async fn rpc_call(http: &reqwest::Client, rpc_url: &str, method: &str, params: Value) -> Result<Value> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params
    });
    let json: Value = http.post(rpc_url).json(&body).send().await?.json().await?;

    if let Some(error) = json.get("error") {
        return Err(SwapError::Rpc(format!("{}: {}", method, error)));
    }
    json.get("result").cloned().ok_or(SwapError::MissingField("result"))
}

pub fn parse_pubkey(address: &str) -> Result<Pubkey> {
    Pubkey::from_str(address).map_err(|e| SwapError::InvalidAddress(format!("{}: {}", address, e)))
}

/// Low/medium/high priority fees from the 25th/50th/75th percentile of
/// recent per-slot prioritization fees (micro-lamports per CU).
pub fn estimate_fees(samples: &[u64]) -> Vec<FeeEstimate> {
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let pick = |pct: usize| -> u64 {
        if sorted.is_empty() {
            return 0;
        }
        let idx = (sorted.len() - 1) * pct / 100;
        sorted[idx]
    };
    [(FeeLevel::Low, 25), (FeeLevel::Medium, 50), (FeeLevel::High, 75)]
        .into_iter()
        .map(|(level, pct)| {
            let micro = pick(pct);
            FeeEstimate {
                level,
                micro_lamports_per_cu: micro,
                total_lamports: BASE_SIGNATURE_FEE_LAMPORTS + micro.saturating_mul(DEFAULT_COMPUTE_UNITS) / 1_000_000,
            }
        })
        .collect()
}

/// Sums jsonParsed `getTokenAccountsByOwner` results per mint, skipping
/// empty accounts.
pub fn parse_token_accounts(result: &Value, into: &mut BTreeMap<String, Balance>) {
    let Some(accounts) = result.get("value").and_then(|v| v.as_array()) else {
        return;
    };
    for acct in accounts {
        let Some(info) = acct.pointer("/account/data/parsed/info") else {
            continue;
        };
        let Some(mint) = info.get("mint").and_then(|v| v.as_str()) else {
            continue;
        };
        let amount: u64 = info
            .pointer("/tokenAmount/amount")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let decimals = info
            .pointer("/tokenAmount/decimals")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u8;
        if amount == 0 {
            continue;
        }
        into.entry(mint.to_string())
            .and_modify(|b| b.amount = b.amount.saturating_add(amount))
            .or_insert(Balance { mint: mint.to_string(), amount, decimals });
    }
}

/// Wallet data from Solana RPC plus prices from Jupiter.
pub struct SolanaSource {
    http: reqwest::Client,
    jupiter: Arc<JupiterClient>,
    networks: Vec<Network>,
    tokens: Vec<Token>,
    exchanges: Vec<String>,
    wallet_address: Option<String>,
}

impl SolanaSource {
    pub fn new(
        http: reqwest::Client,
        jupiter: Arc<JupiterClient>,
        networks: Vec<Network>,
        tokens: Vec<Token>,
        exchanges: Vec<String>,
        wallet_address: Option<String>,
    ) -> Self {
        Self { http, jupiter, networks, tokens, exchanges, wallet_address }
    }
}

#[async_trait]
impl WalletSource for SolanaSource {
    async fn networks(&self) -> Result<Vec<Network>> {
        Ok(self.networks.clone())
    }

    async fn account(&self) -> Result<Option<Account>> {
        let Some(address) = &self.wallet_address else {
            return Ok(None);
        };
        let pubkey = parse_pubkey(address)?;
        Ok(Some(Account { address: pubkey.to_string(), label: None }))
    }

    async fn tokens(&self) -> Result<Vec<Token>> {
        Ok(self.tokens.clone())
    }

    async fn exchanges(&self) -> Result<Vec<String>> {
        if !self.exchanges.is_empty() {
            return Ok(self.exchanges.clone());
        }
        self.jupiter.program_labels().await
    }

    async fn balances(&self, network: &Network, account: &Account) -> Result<Vec<Balance>> {
        let owner = parse_pubkey(&account.address)?;
        let rpc = RpcClient::new(network.rpc_url.clone());
        let lamports = rpc.get_balance(&owner).await?;

        let mut balances = BTreeMap::new();
        balances.insert(
            NATIVE_MINT.to_string(),
            Balance { mint: NATIVE_MINT.to_string(), amount: lamports, decimals: NATIVE_DECIMALS },
        );
        for program_id in [TOKEN_PROGRAM_ID, TOKEN_2022_PROGRAM_ID] {
            let params = json!([
                account.address,
                { "programId": program_id },
                { "encoding": "jsonParsed" }
            ]);
            match rpc_call(&self.http, &network.rpc_url, "getTokenAccountsByOwner", params).await {
                Ok(result) => parse_token_accounts(&result, &mut balances),
                Err(e) => log::warn!("Token accounts under {} unavailable: {}", program_id, e),
            }
        }
        Ok(balances.into_values().collect())
    }

    async fn fee_estimates(&self, network: &Network) -> Result<Vec<FeeEstimate>> {
        let rpc = RpcClient::new(network.rpc_url.clone());
        let recent = rpc.get_recent_prioritization_fees(&[]).await?;
        let samples: Vec<u64> = recent.iter().map(|f| f.prioritization_fee).collect();
        Ok(estimate_fees(&samples))
    }

    async fn spot_price(&self, mint: &str) -> Result<f64> {
        self.jupiter.get_price(mint).await
    }
}
