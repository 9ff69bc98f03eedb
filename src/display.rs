//! Quote details as shown under the swap form: rate, price impact, minimum
//! received, liquidity sources and network fee, plus the comparison of the
//! quoted rate against spot prices.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::locale::{fill, Locale};
use crate::model::{to_ui_amount, FeeEstimate, QuoteOption, Routing, NATIVE_DECIMALS, NATIVE_MINT};
use crate::pricing::{self, Comparison, PriceDelta, Severity};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailLine {
    pub label: String,
    pub value: String,
    pub severity: Option<Severity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteDetails {
    pub price_delta: Option<PriceDelta>,
    /// Localized sentence describing `price_delta`.
    pub comparison_text: String,
    pub network_fee_usd: Option<f64>,
    pub lines: Vec<DetailLine>,
}

impl QuoteDetails {
    pub fn build(
        option: &QuoteOption,
        spot_prices: &HashMap<String, f64>,
        fee: Option<&FeeEstimate>,
        locale: &dyn Locale,
    ) -> Self {
        let price_delta = pricing::compare(
            option.rate,
            spot_prices.get(&option.from_token.mint).copied(),
            spot_prices.get(&option.to_token.mint).copied(),
        );
        let comparison_text = comparison_text(price_delta.as_ref(), locale);

        let mut lines = vec![
            DetailLine {
                label: locale.get_locale("swapRate"),
                value: format!(
                    "1 {} = {} {}",
                    option.from_token.symbol,
                    format_amount(option.rate),
                    option.to_token.symbol
                ),
                severity: price_delta.map(|d| d.severity),
            },
            DetailLine {
                label: locale.get_locale("swapPriceImpact"),
                value: format!("{:.2}%", option.impact),
                severity: Some(pricing::impact_severity(option.impact)),
            },
            DetailLine {
                label: locale.get_locale("swapMinimumReceived"),
                value: format!("{} {}", format_amount(option.minimum_to_amount), option.to_token.symbol),
                severity: None,
            },
            DetailLine {
                label: locale.get_locale("swapLiquiditySources"),
                value: routing_text(option, locale),
                severity: None,
            },
        ];

        let network_fee_usd = fee.and_then(|f| {
            let sol = to_ui_amount(f.total_lamports, NATIVE_DECIMALS);
            spot_prices.get(NATIVE_MINT).map(|p| sol * p)
        });
        if let Some(f) = fee {
            let sol = to_ui_amount(f.total_lamports, NATIVE_DECIMALS);
            let value = match network_fee_usd {
                Some(usd) => format!("{} SOL (${:.4})", format_amount(sol), usd),
                None => format!("{} SOL", format_amount(sol)),
            };
            lines.push(DetailLine {
                label: locale.get_locale("swapNetworkFee"),
                value,
                severity: None,
            });
        }

        Self {
            price_delta,
            comparison_text,
            network_fee_usd,
            lines,
        }
    }
}

impl fmt::Display for QuoteDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{:<20} {}", line.label, line.value)?;
        }
        write!(f, "{}", self.comparison_text)
    }
}

fn comparison_text(delta: Option<&PriceDelta>, locale: &dyn Locale) -> String {
    let Some(d) = delta else {
        return locale.get_locale("swapNoMarketPrice");
    };
    let pct = format!("{:.2}", d.delta.abs());
    let key = match d.comparison {
        Comparison::Cheaper => "swapCheaper",
        Comparison::Within => "swapWithin",
        Comparison::MoreExpensive => "swapMoreExpensive",
    };
    fill(&locale.get_locale(key), &pct)
}

/// Split routes list each provider with its share; single routes list the
/// hops in order.
pub fn routing_text(option: &QuoteOption, locale: &dyn Locale) -> String {
    match option.routing {
        Routing::Split => {
            let parts: Vec<String> = option
                .sources
                .iter()
                .map(|s| format!("{} ({}%)", s.label, s.percent))
                .collect();
            format!(
                "{}: {}",
                fill(&locale.get_locale("swapSplitRouting"), &option.sources.len().to_string()),
                parts.join(" + ")
            )
        }
        Routing::Single => {
            let labels: Vec<&str> = option.sources.iter().map(|s| s.label.as_str()).collect();
            if labels.is_empty() {
                "Direct".to_string()
            } else {
                labels.join(" → ")
            }
        }
    }
}

/// Up to 6 significant fractional digits, trailing zeros trimmed.
pub fn format_amount(value: f64) -> String {
    let s = format!("{:.6}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
