//! Keeps the [`WalletStore`] fed from a [`WalletSource`].
//!
//! Every fetch runs independently. A failure is logged and the affected data
//! simply keeps its previous (or default) value; nothing is escalated to
//! the caller.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::model::{Account, Balance, FeeEstimate, Network, Token, NATIVE_MINT};
use crate::wallet_state::{Action, WalletState, WalletStore};

#[async_trait]
pub trait WalletSource: Send + Sync {
    async fn networks(&self) -> Result<Vec<Network>>;
    async fn account(&self) -> Result<Option<Account>>;
    async fn tokens(&self) -> Result<Vec<Token>>;
    async fn exchanges(&self) -> Result<Vec<String>>;
    async fn balances(&self, network: &Network, account: &Account) -> Result<Vec<Balance>>;
    async fn fee_estimates(&self, network: &Network) -> Result<Vec<FeeEstimate>>;
    async fn spot_price(&self, mint: &str) -> Result<f64>;
}

pub struct WalletProvider {
    source: Arc<dyn WalletSource>,
    store: Arc<RwLock<WalletStore>>,
}

impl WalletProvider {
    pub fn new(source: Arc<dyn WalletSource>) -> Self {
        Self {
            source,
            store: Arc::new(RwLock::new(WalletStore::new())),
        }
    }

    pub async fn snapshot(&self) -> WalletState {
        self.store.read().await.state().clone()
    }

    /// Shared handle to the store, for collaborators that follow the selection.
    pub fn store(&self) -> Arc<RwLock<WalletStore>> {
        self.store.clone()
    }

    pub async fn dispatch(&self, action: Action) {
        self.store.write().await.dispatch(action);
    }

    /// Initial load: static data first, then everything that depends on the
    /// selected network and account.
    pub async fn mount(&self) {
        tokio::join!(
            self.load_networks(),
            self.load_account(),
            self.load_tokens(),
            self.load_exchanges(),
        );
        self.refresh().await;
    }

    pub async fn unmount(&self) {
        self.dispatch(Action::Reset).await;
    }

    /// Re-fires the network/account dependent fetches and the spot prices.
    pub async fn refresh(&self) {
        tokio::join!(self.refresh_balances(), self.refresh_fee_estimates(), self.refresh_spot_prices());
    }

    pub async fn select_network(&self, network: Network) {
        self.dispatch(Action::SelectNetwork(network)).await;
        self.refresh().await;
    }

    pub async fn select_account(&self, account: Option<Account>) {
        self.dispatch(Action::SetAccount(account)).await;
        self.refresh().await;
    }

    async fn load_networks(&self) {
        match self.source.networks().await {
            Ok(networks) => self.dispatch(Action::SetNetworks(networks)).await,
            Err(e) => log::warn!("Failed to load networks: {}", e),
        }
    }

    async fn load_account(&self) {
        match self.source.account().await {
            Ok(account) => self.dispatch(Action::SetAccount(account)).await,
            Err(e) => log::warn!("Failed to load account: {}", e),
        }
    }

    async fn load_tokens(&self) {
        match self.source.tokens().await {
            Ok(tokens) => self.dispatch(Action::SetTokens(tokens)).await,
            Err(e) => log::warn!("Failed to load token list: {}", e),
        }
    }

    async fn load_exchanges(&self) {
        match self.source.exchanges().await {
            Ok(exchanges) => self.dispatch(Action::SetExchanges(exchanges)).await,
            Err(e) => log::warn!("Failed to load supported exchanges: {}", e),
        }
    }

    async fn refresh_balances(&self) {
        let (ticket, network, account) = {
            let mut store = self.store.write().await;
            let state = store.state();
            let (Some(network), Some(account)) = (state.selected_network.clone(), state.account.clone()) else {
                return;
            };
            (store.begin_fetch(), network, account)
        };
        match self.source.balances(&network, &account).await {
            Ok(balances) => self.dispatch(Action::MergeBalances(ticket, balances)).await,
            Err(e) => log::warn!("Failed to fetch balances for {}: {}", account.address, e),
        }
    }

    async fn refresh_fee_estimates(&self) {
        let (ticket, network) = {
            let mut store = self.store.write().await;
            let Some(network) = store.state().selected_network.clone() else {
                return;
            };
            (store.begin_fetch(), network)
        };
        match self.source.fee_estimates(&network).await {
            Ok(fees) => self.dispatch(Action::MergeFeeEstimates(ticket, fees)).await,
            Err(e) => log::warn!("Failed to fetch fee estimates on {}: {}", network.name, e),
        }
    }

    /// One independent fetch per asset; each merges on its own as it resolves.
    async fn refresh_spot_prices(&self) {
        let mints = {
            let store = self.store.read().await;
            let mut mints: Vec<String> = store.state().tokens.iter().map(|t| t.mint.clone()).collect();
            if !mints.iter().any(|m| m == NATIVE_MINT) {
                mints.push(NATIVE_MINT.to_string());
            }
            mints
        };
        join_all(mints.into_iter().map(|mint| self.refresh_spot_price(mint))).await;
    }

    async fn refresh_spot_price(&self, mint: String) {
        let ticket = self.store.write().await.begin_fetch();
        match self.source.spot_price(&mint).await {
            Ok(price) => self.dispatch(Action::MergeSpotPrices(ticket, vec![(mint, price)])).await,
            Err(e) => log::warn!("Failed to fetch spot price for {}: {}", mint, e),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::SwapError;
    use crate::model::fixtures::{sol, usdc};
    use crate::model::{ChainType, FeeLevel};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub(crate) struct MockSource {
        pub prices: Mutex<HashMap<String, f64>>,
        pub fail_balances: bool,
        pub fail_networks: bool,
        pub balance_calls: AtomicUsize,
        pub price_calls: AtomicUsize,
    }

    impl MockSource {
        pub(crate) fn new() -> Self {
            Self {
                prices: Mutex::new(HashMap::from([(sol().mint, 150.0), (usdc().mint, 1.0)])),
                fail_balances: false,
                fail_networks: false,
                balance_calls: AtomicUsize::new(0),
                price_calls: AtomicUsize::new(0),
            }
        }
    }

    pub(crate) fn mainnet() -> Network {
        Network {
            id: "solana-mainnet".into(),
            name: "Solana".into(),
            chain: ChainType::Solana,
            rpc_url: "http://localhost:8899".into(),
        }
    }

    pub(crate) fn devnet() -> Network {
        Network {
            id: "solana-devnet".into(),
            name: "Devnet".into(),
            chain: ChainType::Solana,
            rpc_url: "http://devnet.localhost:8899".into(),
        }
    }

    pub(crate) fn account() -> Account {
        Account {
            address: "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM".into(),
            label: None,
        }
    }

    #[async_trait]
    impl WalletSource for MockSource {
        async fn networks(&self) -> Result<Vec<Network>> {
            if self.fail_networks {
                return Err(SwapError::Rpc("connection refused".into()));
            }
            Ok(vec![mainnet(), devnet()])
        }

        async fn account(&self) -> Result<Option<Account>> {
            Ok(Some(account()))
        }

        async fn tokens(&self) -> Result<Vec<Token>> {
            Ok(vec![sol(), usdc()])
        }

        async fn exchanges(&self) -> Result<Vec<String>> {
            Ok(vec!["Orca".into(), "Raydium".into()])
        }

        async fn balances(&self, _network: &Network, _account: &Account) -> Result<Vec<Balance>> {
            self.balance_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_balances {
                return Err(SwapError::Rpc("node is behind".into()));
            }
            Ok(vec![Balance { mint: usdc().mint, amount: 25_000_000, decimals: 6 }])
        }

        async fn fee_estimates(&self, _network: &Network) -> Result<Vec<FeeEstimate>> {
            Ok(vec![FeeEstimate { level: FeeLevel::Medium, micro_lamports_per_cu: 1_000, total_lamports: 205_000 }])
        }

        async fn spot_price(&self, mint: &str) -> Result<f64> {
            self.price_calls.fetch_add(1, Ordering::SeqCst);
            self.prices
                .lock()
                .unwrap()
                .get(mint)
                .copied()
                .ok_or_else(|| SwapError::MissingField("data.price"))
        }
    }

    #[tokio::test]
    async fn mount_populates_store() {
        let provider = WalletProvider::new(Arc::new(MockSource::new()));
        provider.mount().await;
        let state = provider.snapshot().await;
        assert_eq!(state.selected_network.as_ref().unwrap().id, "solana-mainnet");
        assert_eq!(state.account.as_ref().unwrap().address, account().address);
        assert_eq!(state.tokens.len(), 2);
        assert_eq!(state.exchanges, vec!["Orca".to_string(), "Raydium".to_string()]);
        assert_eq!(state.balance_of(&usdc().mint).unwrap().amount, 25_000_000);
        assert_eq!(state.spot_prices.get(&sol().mint), Some(&150.0));
        assert!(state.fee_estimate(FeeLevel::Medium).is_some());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_other_data_intact() {
        let mut source = MockSource::new();
        source.fail_balances = true;
        let provider = WalletProvider::new(Arc::new(source));
        provider.mount().await;
        let state = provider.snapshot().await;
        assert!(state.balances.is_empty());
        assert_eq!(state.spot_prices.len(), 2);
        assert!(state.fee_estimate(FeeLevel::Medium).is_some());
    }

    #[tokio::test]
    async fn without_network_dependent_fetches_are_skipped() {
        let mut source = MockSource::new();
        source.fail_networks = true;
        let source = Arc::new(source);
        let provider = WalletProvider::new(source.clone());
        provider.mount().await;
        let state = provider.snapshot().await;
        assert!(state.selected_network.is_none());
        assert_eq!(source.balance_calls.load(Ordering::SeqCst), 0);
        // prices do not depend on the network
        assert_eq!(state.spot_prices.len(), 2);
        assert_eq!(source.price_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_price_keeps_previous_value() {
        let source = Arc::new(MockSource::new());
        let provider = WalletProvider::new(source.clone());
        provider.mount().await;
        source.prices.lock().unwrap().remove(&usdc().mint);
        provider.refresh().await;
        let state = provider.snapshot().await;
        assert_eq!(state.spot_prices.get(&usdc().mint), Some(&1.0));
    }

    #[tokio::test]
    async fn selecting_account_refetches_balances() {
        let source = Arc::new(MockSource::new());
        let provider = WalletProvider::new(source.clone());
        provider.mount().await;
        assert_eq!(source.balance_calls.load(Ordering::SeqCst), 1);

        let other = Account { address: "11111111111111111111111111111111".into(), label: Some("cold".into()) };
        provider.select_account(Some(other)).await;
        assert_eq!(source.balance_calls.load(Ordering::SeqCst), 2);
        assert_eq!(provider.snapshot().await.account.unwrap().label.as_deref(), Some("cold"));
    }

    #[tokio::test]
    async fn selecting_network_refetches_fees() {
        let provider = WalletProvider::new(Arc::new(MockSource::new()));
        provider.mount().await;
        provider.select_network(devnet()).await;
        let state = provider.snapshot().await;
        assert_eq!(state.selected_network.as_ref().unwrap().id, "solana-devnet");
        assert!(state.fee_estimate(FeeLevel::Medium).is_some());
        assert_eq!(state.balances.len(), 1);
    }

    #[tokio::test]
    async fn unmount_resets() {
        let provider = WalletProvider::new(Arc::new(MockSource::new()));
        provider.mount().await;
        provider.unmount().await;
        let state = provider.snapshot().await;
        assert!(state.tokens.is_empty());
        assert!(state.spot_prices.is_empty());
        assert!(state.account.is_none());
    }
}
