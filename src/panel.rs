use crate::config::PanelConfig;
use crate::display::{format_amount, QuoteDetails};
use crate::locale::EnglishLocale;
use crate::model::{Account, FeeLevel, SendOptions};
use crate::provider::{WalletProvider, WalletSource};
use crate::quote::{QuoteController, QuoteRequest, QuoteState};
use crate::rpc::{parse_pubkey, SolanaSource};
use crate::swap_client::{Aggregator, JupiterClient};
use crate::wallet_adapter::{RpcWalletAdapter, WalletAdapter};
use anyhow::{anyhow, Result};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

pub struct SwapPanel {
    cfg: PanelConfig,
    provider: WalletProvider,
    quotes: QuoteController,
    locale: EnglishLocale,
}

impl SwapPanel {
    pub fn new(cfg: PanelConfig) -> Result<Self> {
        let timeout = Duration::from_secs(cfg.request_timeout_secs());
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let jupiter = Arc::new(JupiterClient::new(
            cfg.jupiter_api_url.clone(),
            cfg.jupiter_price_url.clone(),
            timeout,
        )?);
        let source = Arc::new(SolanaSource::new(
            http.clone(),
            jupiter.clone(),
            cfg.networks(),
            cfg.tokens.clone(),
            cfg.exchanges.clone(),
            cfg.wallet_address.clone(),
        ));
        let provider = WalletProvider::new(source);
        let adapter = Arc::new(RpcWalletAdapter::new(http, cfg.rpc_url.clone(), provider.store()));
        Ok(Self::with_provider(cfg, provider, jupiter, adapter))
    }

    pub fn from_parts(
        cfg: PanelConfig,
        source: Arc<dyn WalletSource>,
        aggregator: Arc<dyn Aggregator>,
        adapter: Arc<dyn WalletAdapter>,
    ) -> Self {
        Self::with_provider(cfg, WalletProvider::new(source), aggregator, adapter)
    }

    fn with_provider(
        cfg: PanelConfig,
        provider: WalletProvider,
        aggregator: Arc<dyn Aggregator>,
        adapter: Arc<dyn WalletAdapter>,
    ) -> Self {
        Self {
            cfg,
            provider,
            quotes: QuoteController::new(aggregator, adapter, SendOptions::default()),
            locale: EnglishLocale,
        }
    }

    pub async fn mount(&self) {
        self.provider.mount().await;
        log::info!("Wallet state loaded");
    }

    /// Switches to one of the loaded networks by id and refetches its data.
    pub async fn select_network(&self, id: &str) -> Result<()> {
        let network = self
            .provider
            .snapshot()
            .await
            .networks
            .into_iter()
            .find(|n| n.id == id)
            .ok_or_else(|| anyhow!("Unknown network {}", id))?;
        log::info!("Selecting network {}", network.name);
        self.provider.select_network(network).await;
        Ok(())
    }

    pub async fn select_account(&self, address: &str) -> Result<()> {
        let pubkey = parse_pubkey(address)?;
        self.provider
            .select_account(Some(Account { address: pubkey.to_string(), label: None }))
            .await;
        Ok(())
    }

    /// Builds the quote request from the configured pair and the current
    /// wallet state.
    pub async fn quote_request(&self) -> QuoteRequest {
        let state = self.provider.snapshot().await;
        let from_token = state.token_by_symbol(&self.cfg.input_token).cloned();
        let to_token = state.token_by_symbol(&self.cfg.output_token).cloned();
        if from_token.is_none() {
            log::warn!("Unknown input token {}", self.cfg.input_token);
        }
        if to_token.is_none() {
            log::warn!("Unknown output token {}", self.cfg.output_token);
        }
        QuoteRequest {
            network: state.selected_network.clone(),
            from_token,
            to_token,
            from_amount: self.cfg.amount.clone(),
            slippage_percentage: self.cfg.slippage_percentage(),
        }
    }

    pub async fn refresh_quote(&self) -> QuoteState {
        let request = self.quote_request().await;
        self.quotes.refresh(&request).await;
        self.quotes.state().await
    }

    /// Details for the current best quote, if there is one.
    pub async fn details(&self) -> Option<QuoteDetails> {
        let quote = self.quotes.state().await;
        let option = quote.best_option()?;
        let state = self.provider.snapshot().await;
        let prices = state.spot_prices.to_map();
        Some(QuoteDetails::build(
            option,
            &prices,
            state.fee_estimate(FeeLevel::Medium),
            &self.locale,
        ))
    }

    pub async fn wallet_summary(&self) -> String {
        let state = self.provider.snapshot().await;
        let mut out = String::new();
        let network = state.selected_network.as_ref().map(|n| n.name.as_str()).unwrap_or("none");
        let account = state.account.as_ref().map(|a| a.address.as_str()).unwrap_or("none");
        let _ = writeln!(out, "Network: {}", network);
        let _ = writeln!(out, "Account: {}", account);
        if state.balances.is_empty() {
            let _ = writeln!(out, "  no balances loaded");
        }
        for token in &state.tokens {
            let balance = state.balance_of(&token.mint).map(|b| b.ui_amount()).unwrap_or(0.0);
            let price = state.spot_prices.get(&token.mint);
            match price {
                Some(p) => {
                    let _ = writeln!(
                        out,
                        "  {:<8} {:>18}  @ ${} (${:.2})",
                        token.symbol,
                        format_amount(balance),
                        format_amount(*p),
                        balance * p
                    );
                }
                None => {
                    let _ = writeln!(out, "  {:<8} {:>18}  @ n/a", token.symbol, format_amount(balance));
                }
            }
        }
        for level in [FeeLevel::Low, FeeLevel::Medium, FeeLevel::High] {
            if let Some(fee) = state.fee_estimate(level) {
                let _ = writeln!(
                    out,
                    "  fee {:?}: {} micro-lamports/CU, ~{} lamports",
                    level, fee.micro_lamports_per_cu, fee.total_lamports
                );
            }
        }
        if !state.exchanges.is_empty() {
            let _ = writeln!(out, "Exchanges: {}", state.exchanges.len());
        }
        let _ = writeln!(out, "Priced assets: {}", state.spot_prices.len());
        out
    }

    pub async fn quote_summary(&self) -> String {
        let state = self.quotes.state().await;
        if let Some(e) = state.error() {
            return format!("Quote error: {}", e);
        }
        match state {
            QuoteState::Loading => "Fetching quote…".to_string(),
            QuoteState::HasQuote { .. } => self.details().await.map(|d| d.to_string()).unwrap_or_default(),
            _ => "No quote".to_string(),
        }
    }

    /// Poll loop: refreshes wallet data and the quote every `poll_secs`.
    pub async fn run(&self) -> Result<()> {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.cfg.poll_secs()));
        loop {
            ticker.tick().await;
            self.provider.refresh().await;
            self.refresh_quote().await;
            log::info!("\n{}", self.quote_summary().await);
        }
    }

    pub async fn swap(&self) -> Vec<String> {
        let account = self.provider.snapshot().await.account;
        self.quotes.exchange(account.as_ref()).await
    }

    pub async fn shutdown(&self) {
        self.provider.unmount().await;
        log::info!("Swap panel stopped");
    }
}
