use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{AggregatorError, Result, SwapError};
use crate::model::{Route, SwapTransactions};

/// Swap aggregator seam. `JupiterClient` is the production implementation;
/// tests substitute their own.
#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Fetch candidate routes for `amount` base units of `input_mint`.
    /// `slippage_percentage` is in percent (0.5 == 50 bps).
    async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_percentage: f64,
    ) -> Result<Vec<Route>>;

    /// Build the transactions that execute `route` for `user_public_key`.
    async fn get_transactions_payload(
        &self,
        user_public_key: &str,
        route: &Route,
        output_mint: &str,
    ) -> Result<SwapTransactions>;
}

/// USD spot price lookup.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn get_price(&self, mint: &str) -> Result<f64>;
}

/// HTTP client for the Jupiter swap and price APIs.
#[derive(Clone)]
pub struct JupiterClient {
    http: reqwest::Client,
    base_url: String,
    price_url: String,
}

impl JupiterClient {
    /// Create a new client. `base_url` points at the swap API (e.g.
    /// `https://quote-api.jup.ag/v6`), `price_url` at the price endpoint.
    pub fn new(base_url: String, price_url: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            price_url,
        })
    }

    /// Names of the liquidity venues the aggregator routes through, from
    /// `GET /program-id-to-label`.
    pub async fn program_labels(&self) -> Result<Vec<String>> {
        let url = format!("{}/program-id-to-label", self.base_url);
        let body: Value = self.http.get(&url).send().await?.error_for_status()?.json().await?;
        Ok(parse_program_labels(&body))
    }
}

pub fn parse_program_labels(body: &Value) -> Vec<String> {
    let mut labels: Vec<String> = body
        .as_object()
        .map(|m| m.values().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    labels.sort();
    labels.dedup();
    labels
}

pub fn slippage_bps(slippage_percentage: f64) -> u64 {
    if !slippage_percentage.is_finite() || slippage_percentage <= 0.0 {
        return 0;
    }
    (slippage_percentage * 100.0).round() as u64
}

/// Turns a `/quote` response into routes. Non-success bodies that carry an
/// `error` field become `SwapError::Aggregator`; anything else is reported
/// as an unexpected response.
pub fn parse_quote_response(status: u16, body: &str) -> Result<Vec<Route>> {
    if (200..300).contains(&status) {
        if let Ok(route) = serde_json::from_str::<Route>(body) {
            return Ok(vec![route]);
        }
    }
    Err(parse_error_body(status, body))
}

pub fn parse_swap_response(status: u16, body: &str) -> Result<SwapTransactions> {
    if (200..300).contains(&status) {
        if let Ok(txs) = serde_json::from_str::<SwapTransactions>(body) {
            return Ok(txs);
        }
    }
    Err(parse_error_body(status, body))
}

fn parse_error_body(status: u16, body: &str) -> SwapError {
    match serde_json::from_str::<AggregatorError>(body) {
        Ok(err) => SwapError::Aggregator(err),
        Err(_) => SwapError::UnexpectedResponse {
            status,
            body: body.chars().take(256).collect(),
        },
    }
}

/// Reads `data.<mint>.price` from a price API body. Newer API versions
/// send the price as a string, older ones as a number.
pub fn parse_price(body: &Value, mint: &str) -> Result<f64> {
    let price = body
        .get("data")
        .and_then(|d| d.get(mint))
        .and_then(|entry| entry.get("price"))
        .ok_or(SwapError::MissingField("data.price"))?;
    let price = match price {
        Value::String(s) => s.parse::<f64>().ok(),
        other => other.as_f64(),
    };
    price.ok_or(SwapError::MissingField("data.price"))
}

#[async_trait]
impl Aggregator for JupiterClient {
    async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_percentage: f64,
    ) -> Result<Vec<Route>> {
        let url = format!("{}/quote", self.base_url);
        let bps = slippage_bps(slippage_percentage);
        log::debug!("GET {url} {input_mint} -> {output_mint} amount={amount} slippageBps={bps}");
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("inputMint", input_mint.to_string()),
                ("outputMint", output_mint.to_string()),
                ("amount", amount.to_string()),
                ("slippageBps", bps.to_string()),
            ])
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        parse_quote_response(status, &body)
    }

    async fn get_transactions_payload(
        &self,
        user_public_key: &str,
        route: &Route,
        output_mint: &str,
    ) -> Result<SwapTransactions> {
        if route.output_mint != output_mint {
            return Err(SwapError::InvalidAddress(format!(
                "route ends in {} but {} was requested",
                route.output_mint, output_mint
            )));
        }
        let url = format!("{}/swap", self.base_url);
        let request = json!({
            "quoteResponse": route,
            "userPublicKey": user_public_key,
            "wrapAndUnwrapSol": true,
            "dynamicComputeUnitLimit": true,
        });
        log::debug!("POST {url} for {user_public_key}");
        let resp = self.http.post(&url).json(&request).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        parse_swap_response(status, &body)
    }
}

#[async_trait]
impl PriceSource for JupiterClient {
    async fn get_price(&self, mint: &str) -> Result<f64> {
        let body: Value = self
            .http
            .get(&self.price_url)
            .query(&[("ids", mint)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_price(&body, mint)
    }
}
