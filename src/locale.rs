//! String templates for the quote details panel. Templates use `$1` as the
//! single substitution placeholder.

pub trait Locale: Send + Sync {
    /// Returns the template for `key`, or the key itself when unknown.
    fn get_locale(&self, key: &str) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EnglishLocale;

impl Locale for EnglishLocale {
    fn get_locale(&self, key: &str) -> String {
        let template = match key {
            "swapRate" => "Rate",
            "swapPriceImpact" => "Price impact",
            "swapMinimumReceived" => "Minimum received",
            "swapLiquiditySources" => "Liquidity sources",
            "swapSplitRouting" => "Split across $1 sources",
            "swapNetworkFee" => "Network fee",
            "swapCheaper" => "$1% cheaper than market price",
            "swapWithin" => "Within $1% of market price",
            "swapMoreExpensive" => "$1% more expensive than market price",
            "swapNoMarketPrice" => "Market price unavailable",
            _ => key,
        };
        template.to_string()
    }
}

pub fn fill(template: &str, arg: &str) -> String {
    template.replace("$1", arg)
}
