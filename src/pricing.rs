//! Comparison of a quoted exchange rate against independently observed
//! USD spot prices.
//!
//! All functions here are pure: identical inputs always produce identical
//! output and nothing is read from or written to shared state.

use serde::Serialize;

/// Delta (in percent) at or above which a quote is still shown as a success.
const WITHIN_THRESHOLD: f64 = -1.0;
/// Delta (in percent) below which a quote is flagged as an error.
const WARNING_THRESHOLD: f64 = -5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparison {
    Cheaper,
    Within,
    MoreExpensive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceDelta {
    pub reference_rate: f64,
    /// `(quoted - reference) / quoted * 100`. Positive means the quote gives
    /// more TO per FROM than the spot reference.
    pub delta: f64,
    pub comparison: Comparison,
    pub severity: Severity,
}

/// Reference rate (TO per FROM) implied by USD spot prices.
pub fn reference_rate(from_price_usd: f64, to_price_usd: f64) -> Option<f64> {
    if !from_price_usd.is_finite() || !to_price_usd.is_finite() {
        return None;
    }
    if from_price_usd <= 0.0 || to_price_usd <= 0.0 {
        return None;
    }
    Some(from_price_usd / to_price_usd)
}

pub fn rate_delta(quoted_rate: f64, reference_rate: f64) -> Option<f64> {
    if !quoted_rate.is_finite() || !reference_rate.is_finite() || quoted_rate <= 0.0 {
        return None;
    }
    Some((quoted_rate - reference_rate) / quoted_rate * 100.0)
}

pub fn classify(delta: f64) -> Comparison {
    if delta >= 0.0 {
        Comparison::Cheaper
    } else if delta >= WITHIN_THRESHOLD {
        Comparison::Within
    } else {
        Comparison::MoreExpensive
    }
}

pub fn severity(delta: f64) -> Severity {
    if delta >= WITHIN_THRESHOLD {
        Severity::Success
    } else if delta >= WARNING_THRESHOLD {
        Severity::Warning
    } else {
        Severity::Error
    }
}

/// Compares a quoted rate with the spot reference. Returns `None` when either
/// spot price is unknown or unusable, or when the quote itself has no rate.
pub fn compare(quoted_rate: f64, from_price_usd: Option<f64>, to_price_usd: Option<f64>) -> Option<PriceDelta> {
    let reference_rate = reference_rate(from_price_usd?, to_price_usd?)?;
    let delta = rate_delta(quoted_rate, reference_rate)?;
    Some(PriceDelta {
        reference_rate,
        delta,
        comparison: classify(delta),
        severity: severity(delta),
    })
}

/// Severity of a price impact given in percent.
pub fn impact_severity(impact_pct: f64) -> Severity {
    let impact = impact_pct.abs();
    if impact <= WITHIN_THRESHOLD.abs() {
        Severity::Success
    } else if impact <= WARNING_THRESHOLD.abs() {
        Severity::Warning
    } else {
        Severity::Error
    }
}

/// Lowest amount received after slippage, used when the aggregator does not
/// report a threshold of its own.
pub fn minimum_received(to_amount: f64, slippage_bps: u64) -> f64 {
    let bps = slippage_bps.min(10_000) as f64;
    to_amount * (1.0 - bps / 10_000.0)
}
