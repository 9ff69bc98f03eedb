//! Quote state for the swap form.
//!
//! `refresh` fetches routes for the current pair and amount; `exchange`
//! turns the best route into transactions and hands them to the wallet
//! adapter. Every refresh takes a generation number so a slow response for
//! an older request never replaces the state set by a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{AggregatorError, SwapError};
use crate::model::{parse_ui_amount, Account, Network, QuoteOption, Route, SendOptions, Token};
use crate::swap_client::Aggregator;
use crate::wallet_adapter::WalletAdapter;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum QuoteState {
    #[default]
    Idle,
    Loading,
    HasQuote {
        options: Vec<QuoteOption>,
        routes: Vec<Route>,
    },
    HasError(AggregatorError),
}

impl QuoteState {
    pub fn best_option(&self) -> Option<&QuoteOption> {
        match self {
            QuoteState::HasQuote { options, .. } => options.first(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AggregatorError> {
        match self {
            QuoteState::HasError(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuoteRequest {
    pub network: Option<Network>,
    pub from_token: Option<Token>,
    pub to_token: Option<Token>,
    /// Amount of `from_token` as typed, in UI units.
    pub from_amount: String,
    pub slippage_percentage: f64,
}

pub struct QuoteController {
    aggregator: Arc<dyn Aggregator>,
    adapter: Arc<dyn WalletAdapter>,
    send_options: SendOptions,
    state: Mutex<QuoteState>,
    generation: AtomicU64,
}

impl QuoteController {
    pub fn new(aggregator: Arc<dyn Aggregator>, adapter: Arc<dyn WalletAdapter>, send_options: SendOptions) -> Self {
        Self {
            aggregator,
            adapter,
            send_options,
            state: Mutex::new(QuoteState::Idle),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn state(&self) -> QuoteState {
        self.state.lock().await.clone()
    }

    pub async fn refresh(&self, request: &QuoteRequest) {
        let Some(network) = &request.network else {
            return;
        };
        if !network.is_solana() {
            log::debug!("Skipping quote: {} is not a Solana network", network.name);
            return;
        }
        let (Some(from), Some(to)) = (&request.from_token, &request.to_token) else {
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if request.from_amount.trim().is_empty() {
            self.apply(generation, QuoteState::Idle).await;
            return;
        }

        let amount = match parse_ui_amount(&request.from_amount, from.decimals) {
            Ok(amount) => amount,
            Err(e) => {
                self.apply(
                    generation,
                    QuoteState::HasError(AggregatorError {
                        error: e.to_string(),
                        error_code: Some("INVALID_AMOUNT".to_string()),
                    }),
                )
                .await;
                return;
            }
        };

        self.apply(generation, QuoteState::Loading).await;

        let result = self
            .aggregator
            .get_quote(&from.mint, &to.mint, amount, request.slippage_percentage)
            .await;

        let next = match result {
            Ok(routes) => {
                let options: Result<Vec<QuoteOption>, SwapError> =
                    routes.iter().map(|r| QuoteOption::from_route(r, from, to)).collect();
                match options {
                    Ok(options) if !options.is_empty() => {
                        log::info!(
                            "Quote {} {} -> {} {} via {} route(s)",
                            request.from_amount.trim(),
                            from.symbol,
                            options[0].to_amount,
                            to.symbol,
                            routes.len()
                        );
                        QuoteState::HasQuote { options, routes }
                    }
                    Ok(_) => {
                        log::warn!("Aggregator returned no routes for {} -> {}", from.symbol, to.symbol);
                        QuoteState::Idle
                    }
                    Err(e) => {
                        log::error!("Malformed quote for {} -> {}: {}", from.symbol, to.symbol, e);
                        QuoteState::Idle
                    }
                }
            }
            Err(SwapError::Aggregator(e)) => {
                log::warn!("Quote rejected: {}", e);
                QuoteState::HasError(e)
            }
            Err(e) => {
                log::error!("Quote request failed: {}", e);
                QuoteState::Idle
            }
        };
        self.apply(generation, next).await;
    }

    /// Submits the best route. Does nothing without routes or an account.
    /// Payload and adapter failures are logged only; the returned list holds
    /// the signatures that were actually submitted.
    pub async fn exchange(&self, account: Option<&Account>) -> Vec<String> {
        let (route, output_mint) = {
            let state = self.state.lock().await;
            match &*state {
                QuoteState::HasQuote { options, routes } if !routes.is_empty() => {
                    let output_mint = options
                        .first()
                        .map(|o| o.to_token.mint.clone())
                        .unwrap_or_else(|| routes[0].output_mint.clone());
                    (routes[0].clone(), output_mint)
                }
                _ => {
                    log::debug!("exchange: no route selected");
                    return Vec::new();
                }
            }
        };
        let Some(account) = account else {
            log::debug!("exchange: no account selected");
            return Vec::new();
        };

        let payload = match self
            .aggregator
            .get_transactions_payload(&account.address, &route, &output_mint)
            .await
        {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to build swap transactions: {}", e);
                return Vec::new();
            }
        };

        let ordered = [
            payload.setup_transaction.as_deref(),
            Some(payload.swap_transaction.as_str()),
            payload.cleanup_transaction.as_deref(),
        ];
        let mut signatures = Vec::new();
        for tx in ordered.into_iter().flatten() {
            match self.adapter.send_transaction(tx, &account.address, &self.send_options).await {
                Ok(sig) => {
                    log::info!("Submitted swap transaction {}", sig);
                    signatures.push(sig);
                }
                Err(e) => {
                    log::error!("Wallet adapter rejected transaction: {}", e);
                    break;
                }
            }
        }
        signatures
    }

    /// Writes `next` only if no newer refresh has started. The check runs
    /// under the state lock so it cannot interleave with another write.
    async fn apply(&self, generation: u64, next: QuoteState) -> bool {
        let mut state = self.state.lock().await;
        if generation != self.generation.load(Ordering::SeqCst) {
            log::debug!("Discarding quote state from superseded refresh {}", generation);
            return false;
        }
        *state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::model::fixtures::{route, sol, usdc};
    use crate::model::{ChainType, SwapTransactions};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    enum Reply {
        Routes(Vec<Route>),
        Structured(AggregatorError),
        Transport,
    }

    struct MockAggregator {
        reply: std::sync::Mutex<Reply>,
        payload: Option<SwapTransactions>,
        quote_calls: AtomicUsize,
        payload_calls: AtomicUsize,
        /// When set, the first quote call waits for this before replying.
        gate: Option<Arc<Notify>>,
    }

    impl MockAggregator {
        fn new(reply: Reply) -> Self {
            Self {
                reply: std::sync::Mutex::new(reply),
                payload: Some(SwapTransactions {
                    swap_transaction: "AQID".into(),
                    setup_transaction: Some("BAUG".into()),
                    cleanup_transaction: None,
                }),
                quote_calls: AtomicUsize::new(0),
                payload_calls: AtomicUsize::new(0),
                gate: None,
            }
        }
    }

    #[async_trait]
    impl Aggregator for MockAggregator {
        async fn get_quote(&self, _input: &str, _output: &str, amount: u64, _slippage: f64) -> Result<Vec<Route>> {
            let call = self.quote_calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
            }
            match &*self.reply.lock().unwrap() {
                Reply::Routes(routes) => {
                    let mut routes = routes.clone();
                    for r in &mut routes {
                        r.in_amount = amount.to_string();
                    }
                    Ok(routes)
                }
                Reply::Structured(e) => Err(SwapError::Aggregator(e.clone())),
                Reply::Transport => Err(SwapError::UnexpectedResponse { status: 503, body: String::new() }),
            }
        }

        async fn get_transactions_payload(&self, _user: &str, _route: &Route, _output: &str) -> Result<SwapTransactions> {
            self.payload_calls.fetch_add(1, Ordering::SeqCst);
            self.payload.clone().ok_or(SwapError::Rpc("swap build failed".into()))
        }
    }

    struct MockAdapter {
        sent: std::sync::Mutex<Vec<String>>,
        fail: bool,
    }

    impl MockAdapter {
        fn new(fail: bool) -> Self {
            Self { sent: std::sync::Mutex::new(Vec::new()), fail }
        }
    }

    #[async_trait]
    impl WalletAdapter for MockAdapter {
        async fn send_transaction(&self, encoded: &str, _from: &str, _options: &SendOptions) -> Result<String> {
            if self.fail {
                return Err(SwapError::Rpc("user rejected the request".into()));
            }
            self.sent.lock().unwrap().push(encoded.to_string());
            Ok(format!("sig-{}", encoded))
        }
    }

    fn network(chain: ChainType) -> Network {
        Network { id: "n".into(), name: "n".into(), chain, rpc_url: "http://localhost".into() }
    }

    fn request(amount: &str) -> QuoteRequest {
        QuoteRequest {
            network: Some(network(ChainType::Solana)),
            from_token: Some(sol()),
            to_token: Some(usdc()),
            from_amount: amount.into(),
            slippage_percentage: 0.5,
        }
    }

    fn account() -> Account {
        Account { address: "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM".into(), label: None }
    }

    fn controller(agg: Arc<MockAggregator>, adapter: Arc<MockAdapter>) -> QuoteController {
        QuoteController::new(agg, adapter, SendOptions::default())
    }

    #[tokio::test]
    async fn refresh_produces_quote() {
        let agg = Arc::new(MockAggregator::new(Reply::Routes(vec![route()])));
        let ctl = controller(agg.clone(), Arc::new(MockAdapter::new(false)));
        ctl.refresh(&request("1")).await;
        let state = ctl.state().await;
        let best = state.best_option().unwrap();
        assert!((best.rate - 150.25).abs() < 1e-9);
        assert_eq!(agg.quote_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_amount_clears_without_fetching() {
        let agg = Arc::new(MockAggregator::new(Reply::Routes(vec![route()])));
        let ctl = controller(agg.clone(), Arc::new(MockAdapter::new(false)));
        ctl.refresh(&request("1")).await;
        assert!(matches!(ctl.state().await, QuoteState::HasQuote { .. }));

        ctl.refresh(&request("  ")).await;
        assert_eq!(ctl.state().await, QuoteState::Idle);
        assert_eq!(agg.quote_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_amount_clears_error() {
        let err = AggregatorError { error: "No route".into(), error_code: None };
        let agg = Arc::new(MockAggregator::new(Reply::Structured(err.clone())));
        let ctl = controller(agg.clone(), Arc::new(MockAdapter::new(false)));
        ctl.refresh(&request("1")).await;
        assert_eq!(ctl.state().await.error(), Some(&err));
        ctl.refresh(&request("")).await;
        assert_eq!(ctl.state().await, QuoteState::Idle);
    }

    #[tokio::test]
    async fn guards_skip_fetch() {
        let agg = Arc::new(MockAggregator::new(Reply::Routes(vec![route()])));
        let ctl = controller(agg.clone(), Arc::new(MockAdapter::new(false)));

        let mut evm = request("1");
        evm.network = Some(network(ChainType::Other("ethereum".into())));
        ctl.refresh(&evm).await;

        let mut no_token = request("1");
        no_token.to_token = None;
        ctl.refresh(&no_token).await;

        let mut no_network = request("1");
        no_network.network = None;
        ctl.refresh(&no_network).await;

        assert_eq!(agg.quote_calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctl.state().await, QuoteState::Idle);
    }

    #[tokio::test]
    async fn transport_failure_is_not_surfaced() {
        let agg = Arc::new(MockAggregator::new(Reply::Transport));
        let ctl = controller(agg, Arc::new(MockAdapter::new(false)));
        ctl.refresh(&request("1")).await;
        assert_eq!(ctl.state().await, QuoteState::Idle);
    }

    #[tokio::test]
    async fn invalid_amount_is_reported() {
        let agg = Arc::new(MockAggregator::new(Reply::Routes(vec![route()])));
        let ctl = controller(agg.clone(), Arc::new(MockAdapter::new(false)));
        ctl.refresh(&request("1,5")).await;
        let state = ctl.state().await;
        assert_eq!(state.error().unwrap().error_code.as_deref(), Some("INVALID_AMOUNT"));
        assert_eq!(agg.quote_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn superseded_response_is_discarded() {
        let gate = Arc::new(Notify::new());
        let mut mock = MockAggregator::new(Reply::Routes(vec![route()]));
        mock.gate = Some(gate.clone());
        let agg = Arc::new(mock);
        let ctl = Arc::new(controller(agg.clone(), Arc::new(MockAdapter::new(false))));

        let slow = {
            let ctl = ctl.clone();
            tokio::spawn(async move { ctl.refresh(&request("1")).await })
        };
        while agg.quote_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        ctl.refresh(&request("2")).await;
        let fresh = ctl.state().await.best_option().unwrap().from_amount;
        assert_eq!(fresh, 2.0);

        gate.notify_one();
        slow.await.unwrap();
        assert_eq!(ctl.state().await.best_option().unwrap().from_amount, 2.0);
    }

    #[tokio::test]
    async fn stale_generation_is_rejected_while_holding_the_lock() {
        let agg = Arc::new(MockAggregator::new(Reply::Routes(vec![route()])));
        let ctl = controller(agg, Arc::new(MockAdapter::new(false)));
        ctl.refresh(&request("1")).await;
        let current = ctl.generation.load(Ordering::SeqCst);

        // a newer refresh starts while the older one is about to write
        ctl.generation.fetch_add(1, Ordering::SeqCst);
        assert!(!ctl.apply(current, QuoteState::Idle).await);
        assert!(matches!(ctl.state().await, QuoteState::HasQuote { .. }));
        assert!(ctl.apply(current + 1, QuoteState::Loading).await);
        assert_eq!(ctl.state().await, QuoteState::Loading);
    }

    #[tokio::test]
    async fn superseded_empty_amount_does_not_clear_newer_quote() {
        let agg = Arc::new(MockAggregator::new(Reply::Routes(vec![route()])));
        let ctl = controller(agg, Arc::new(MockAdapter::new(false)));
        ctl.refresh(&request("1")).await;
        let stale = ctl.generation.load(Ordering::SeqCst) - 1;
        assert!(!ctl.apply(stale, QuoteState::Idle).await);
        assert!(ctl.state().await.best_option().is_some());
    }

    #[tokio::test]
    async fn exchange_without_routes_is_noop() {
        let agg = Arc::new(MockAggregator::new(Reply::Routes(vec![])));
        let adapter = Arc::new(MockAdapter::new(false));
        let ctl = controller(agg.clone(), adapter.clone());
        ctl.refresh(&request("1")).await;
        assert!(ctl.exchange(Some(&account())).await.is_empty());
        assert_eq!(agg.payload_calls.load(Ordering::SeqCst), 0);
        assert!(adapter.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exchange_without_account_is_noop() {
        let agg = Arc::new(MockAggregator::new(Reply::Routes(vec![route()])));
        let adapter = Arc::new(MockAdapter::new(false));
        let ctl = controller(agg.clone(), adapter.clone());
        ctl.refresh(&request("1")).await;
        assert!(ctl.exchange(None).await.is_empty());
        assert_eq!(agg.payload_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exchange_sends_setup_then_swap() {
        let agg = Arc::new(MockAggregator::new(Reply::Routes(vec![route()])));
        let adapter = Arc::new(MockAdapter::new(false));
        let ctl = controller(agg, adapter.clone());
        ctl.refresh(&request("1")).await;
        let sigs = ctl.exchange(Some(&account())).await;
        assert_eq!(sigs, vec!["sig-BAUG".to_string(), "sig-AQID".to_string()]);
        assert_eq!(*adapter.sent.lock().unwrap(), vec!["BAUG".to_string(), "AQID".to_string()]);
    }

    #[tokio::test]
    async fn adapter_errors_are_swallowed() {
        let agg = Arc::new(MockAggregator::new(Reply::Routes(vec![route()])));
        let ctl = controller(agg, Arc::new(MockAdapter::new(true)));
        ctl.refresh(&request("1")).await;
        let before = ctl.state().await;
        assert!(ctl.exchange(Some(&account())).await.is_empty());
        assert_eq!(ctl.state().await, before);
    }
}
