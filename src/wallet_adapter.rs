use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Result, SwapError};
use crate::model::SendOptions;
use crate::rpc::{parse_pubkey, rpc_call};
use crate::wallet_state::WalletStore;

/// Submits encoded transactions on behalf of `from`. Signing happens on the
/// wallet side of this seam.
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Returns the transaction signature.
    async fn send_transaction(&self, encoded_transaction: &str, from: &str, options: &SendOptions) -> Result<String>;
}

/// Relays already-signed base64 transactions through `sendTransaction` on
/// the currently selected network, or `fallback_rpc_url` when none is.
pub struct RpcWalletAdapter {
    http: reqwest::Client,
    fallback_rpc_url: String,
    store: Arc<RwLock<WalletStore>>,
}

impl RpcWalletAdapter {
    pub fn new(http: reqwest::Client, fallback_rpc_url: String, store: Arc<RwLock<WalletStore>>) -> Self {
        Self { http, fallback_rpc_url, store }
    }

    pub async fn endpoint(&self) -> String {
        self.store
            .read()
            .await
            .state()
            .selected_network
            .as_ref()
            .map(|n| n.rpc_url.clone())
            .unwrap_or_else(|| self.fallback_rpc_url.clone())
    }
}

/// Checks that `encoded` is non-empty base64 and returns its decoded size.
pub fn validate_encoded(encoded: &str) -> Result<usize> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| SwapError::Rpc(format!("transaction is not valid base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(SwapError::Rpc("empty transaction".to_string()));
    }
    Ok(bytes.len())
}

#[async_trait]
impl WalletAdapter for RpcWalletAdapter {
    async fn send_transaction(&self, encoded_transaction: &str, from: &str, options: &SendOptions) -> Result<String> {
        parse_pubkey(from)?;
        let size = validate_encoded(encoded_transaction)?;
        let rpc_url = self.endpoint().await;
        log::info!("Sending {} byte transaction from {} via {}", size, from, rpc_url);

        let mut config = serde_json::to_value(options)?;
        config["encoding"] = json!("base64");
        let result = rpc_call(
            &self.http,
            &rpc_url,
            "sendTransaction",
            json!([encoded_transaction.trim(), config]),
        )
        .await?;

        let sig = result.as_str().ok_or(SwapError::MissingField("result"))?;
        Signature::from_str(sig).map_err(|e| SwapError::Rpc(format!("bad signature {}: {}", sig, e)))?;
        Ok(sig.to_string())
    }
}
