use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SwapError};
use crate::pricing::minimum_received;

/// Wrapped SOL mint, used as the native asset for fee pricing.
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";
pub const NATIVE_DECIMALS: u8 = 9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub mint: String,
    pub decimals: u8,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    Solana,
    #[serde(untagged)]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub chain: ChainType,
    pub rpc_url: String,
}

impl Network {
    pub fn is_solana(&self) -> bool {
        self.chain == ChainType::Solana
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeeLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub level: FeeLevel,
    pub micro_lamports_per_cu: u64,
    /// Base signature fee plus priority fee for the default compute budget.
    pub total_lamports: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub mint: String,
    /// Raw amount in base units.
    pub amount: u64,
    pub decimals: u8,
}

impl Balance {
    pub fn ui_amount(&self) -> f64 {
        to_ui_amount(self.amount, self.decimals)
    }
}

/// One step of a Jupiter route plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlanStep {
    pub swap_info: SwapInfo,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInfo {
    pub amm_key: String,
    #[serde(default)]
    pub label: Option<String>,
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: String,
    pub out_amount: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A quote route as returned by `GET /quote`. Unknown fields are kept in
/// `extra` because the whole object is posted back to `/swap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub input_mint: String,
    pub in_amount: String,
    pub output_mint: String,
    pub out_amount: String,
    /// Minimum output after slippage. Optional on the wire.
    #[serde(default)]
    pub other_amount_threshold: String,
    #[serde(default)]
    pub slippage_bps: u64,
    #[serde(default)]
    pub price_impact_pct: String,
    pub route_plan: Vec<RoutePlanStep>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Routing {
    Single,
    Split,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub label: String,
    pub percent: u8,
}

/// Display-ready view of one route. Replaced wholesale on every quote fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteOption {
    pub from_token: Token,
    pub to_token: Token,
    pub from_amount: f64,
    pub to_amount: f64,
    /// TO per FROM, in UI units.
    pub rate: f64,
    /// Price impact in percent.
    pub impact: f64,
    pub minimum_to_amount: f64,
    pub sources: Vec<Source>,
    pub routing: Routing,
    pub received_at: DateTime<Utc>,
}

impl QuoteOption {
    pub fn from_route(route: &Route, from_token: &Token, to_token: &Token) -> Result<Self> {
        let in_raw: u64 = route
            .in_amount
            .parse()
            .map_err(|_| SwapError::MissingField("inAmount"))?;
        let out_raw: u64 = route
            .out_amount
            .parse()
            .map_err(|_| SwapError::MissingField("outAmount"))?;

        let from_amount = to_ui_amount(in_raw, from_token.decimals);
        let to_amount = to_ui_amount(out_raw, to_token.decimals);
        let rate = if from_amount > 0.0 { to_amount / from_amount } else { 0.0 };
        // Jupiter reports the impact as a fraction ("0.0012" == 0.12%).
        let impact = route.price_impact_pct.parse::<f64>().unwrap_or(0.0) * 100.0;
        let minimum_to_amount = match route.other_amount_threshold.parse::<u64>() {
            Ok(raw) => to_ui_amount(raw, to_token.decimals),
            Err(_) => minimum_received(to_amount, route.slippage_bps),
        };

        let sources = route
            .route_plan
            .iter()
            .map(|step| Source {
                label: step
                    .swap_info
                    .label
                    .clone()
                    .unwrap_or_else(|| short_address(&step.swap_info.amm_key)),
                percent: step.percent,
            })
            .collect();
        let routing = if route.route_plan.iter().any(|s| s.percent < 100) {
            Routing::Split
        } else {
            Routing::Single
        };

        Ok(Self {
            from_token: from_token.clone(),
            to_token: to_token.clone(),
            from_amount,
            to_amount,
            rate,
            impact,
            minimum_to_amount,
            sources,
            routing,
            received_at: Utc::now(),
        })
    }
}

/// Base64 transactions returned by `POST /swap`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapTransactions {
    pub swap_transaction: String,
    #[serde(default)]
    pub setup_transaction: Option<String>,
    #[serde(default)]
    pub cleanup_transaction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub preflight_commitment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<usize>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: true,
            preflight_commitment: "confirmed".to_string(),
            max_retries: Some(2),
        }
    }
}

pub fn to_ui_amount(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

/// Parses a user-entered decimal amount into base units without going
/// through floating point. Excess fractional digits are truncated.
pub fn parse_ui_amount(amount: &str, decimals: u8) -> Result<u64> {
    let trimmed = amount.trim();
    let invalid = || SwapError::InvalidAmount(amount.to_string());
    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let scale = 10u64.checked_pow(decimals as u32).ok_or_else(invalid)?;
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let mut frac_digits: String = frac.chars().take(decimals as usize).collect();
    while frac_digits.len() < decimals as usize {
        frac_digits.push('0');
    }
    let frac: u64 = if frac_digits.is_empty() { 0 } else { frac_digits.parse().map_err(|_| invalid())? };

    let raw = whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(invalid)?;
    if raw == 0 {
        return Err(invalid());
    }
    Ok(raw)
}

pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 8 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}
