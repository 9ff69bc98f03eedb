//! Wallet state shared across the swap feature.
//!
//! The store is only mutated through [`WalletStore::dispatch`]. Keyed maps
//! (balances, spot prices, fee estimates) are merged per key using a
//! [`FetchTicket`] taken when the fetch *started*: a write is applied only if
//! its ticket is at least as new as the one that last wrote the key. Balances
//! and fee estimates arrive as full snapshots, so keys a newer snapshot no
//! longer lists are removed. Changing
//! the selected network or account raises a floor below which in-flight
//! results are discarded entirely.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::model::{Account, Balance, FeeEstimate, FeeLevel, Network, Token};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

#[derive(Debug, Clone)]
pub struct VersionedMap<K, V> {
    entries: HashMap<K, (FetchTicket, V)>,
}

impl<K, V> Default for VersionedMap<K, V> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<K: Eq + Hash, V> VersionedMap<K, V> {
    /// Applies every entry whose key was last written by a ticket no newer
    /// than `ticket`. Returns how many entries were applied.
    pub fn merge(&mut self, ticket: FetchTicket, entries: impl IntoIterator<Item = (K, V)>) -> usize {
        let mut applied = 0;
        for (key, value) in entries {
            match self.entries.get(&key) {
                Some((current, _)) if *current > ticket => {}
                _ => {
                    self.entries.insert(key, (ticket, value));
                    applied += 1;
                }
            }
        }
        applied
    }

    /// Applies a complete snapshot taken at `ticket`. Keys missing from the
    /// snapshot are dropped unless a newer ticket wrote them.
    pub fn replace(&mut self, ticket: FetchTicket, entries: impl IntoIterator<Item = (K, V)>) -> usize {
        self.entries.retain(|_, (current, _)| *current > ticket);
        self.merge(ticket, entries)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, (_, v))| (k, v))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Eq + Hash + Clone, V: Clone> VersionedMap<K, V> {
    pub fn to_map(&self) -> HashMap<K, V> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WalletState {
    pub tokens: Vec<Token>,
    /// Keyed by lowercased mint address.
    pub balances: VersionedMap<String, Balance>,
    /// USD price keyed by mint address.
    pub spot_prices: VersionedMap<String, f64>,
    pub fee_estimates: VersionedMap<FeeLevel, FeeEstimate>,
    pub networks: Vec<Network>,
    pub selected_network: Option<Network>,
    pub account: Option<Account>,
    pub exchanges: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WalletState {
    pub fn balance_of(&self, mint: &str) -> Option<&Balance> {
        self.balances.get(&mint.to_lowercase())
    }

    pub fn token_by_symbol(&self, symbol: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn fee_estimate(&self, level: FeeLevel) -> Option<&FeeEstimate> {
        self.fee_estimates.get(&level)
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    SetNetworks(Vec<Network>),
    SelectNetwork(Network),
    SetAccount(Option<Account>),
    SetTokens(Vec<Token>),
    SetExchanges(Vec<String>),
    MergeBalances(FetchTicket, Vec<Balance>),
    MergeSpotPrices(FetchTicket, Vec<(String, f64)>),
    MergeFeeEstimates(FetchTicket, Vec<FeeEstimate>),
    Reset,
}

#[derive(Debug, Default)]
pub struct WalletStore {
    state: WalletState,
    next_ticket: u64,
    /// Account-scoped results from fetches started before this ticket are dropped.
    floor: FetchTicket,
    /// Any result from a fetch started before the last reset is dropped.
    reset_floor: FetchTicket,
}

impl WalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WalletState {
        &self.state
    }

    /// Stamp a fetch as it starts.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.next_ticket += 1;
        FetchTicket(self.next_ticket)
    }

    pub fn dispatch(&mut self, action: Action) {
        match action {
            Action::SetNetworks(networks) => {
                let keep = self
                    .state
                    .selected_network
                    .as_ref()
                    .map(|sel| networks.iter().any(|n| n.id == sel.id))
                    .unwrap_or(false);
                if !keep {
                    if let Some(first) = networks.first().cloned() {
                        self.select_network(first);
                    }
                }
                self.state.networks = networks;
            }
            Action::SelectNetwork(network) => self.select_network(network),
            Action::SetAccount(account) => {
                if self.state.account != account {
                    self.invalidate_account_data();
                    self.state.account = account;
                }
            }
            Action::SetTokens(tokens) => self.state.tokens = tokens,
            Action::SetExchanges(exchanges) => self.state.exchanges = exchanges,
            Action::MergeBalances(ticket, balances) => {
                if self.accepts(ticket) {
                    let entries = balances.into_iter().map(|b| (b.mint.to_lowercase(), b));
                    self.state.balances.replace(ticket, entries);
                    self.touch();
                } else {
                    log::debug!("dropping balances from superseded fetch {:?}", ticket);
                }
            }
            Action::MergeSpotPrices(ticket, prices) => {
                // Spot prices do not depend on network or account.
                if ticket >= self.reset_floor {
                    self.state.spot_prices.merge(ticket, prices);
                    self.touch();
                }
            }
            Action::MergeFeeEstimates(ticket, fees) => {
                if self.accepts(ticket) {
                    self.state.fee_estimates.replace(ticket, fees.into_iter().map(|f| (f.level, f)));
                    self.touch();
                } else {
                    log::debug!("dropping fee estimates from superseded fetch {:?}", ticket);
                }
            }
            Action::Reset => {
                self.state = WalletState::default();
                self.floor = FetchTicket(self.next_ticket + 1);
                self.reset_floor = self.floor;
            }
        }
    }

    fn select_network(&mut self, network: Network) {
        if self.state.selected_network.as_ref() == Some(&network) {
            return;
        }
        self.invalidate_account_data();
        self.state.selected_network = Some(network);
    }

    fn invalidate_account_data(&mut self) {
        self.state.balances.clear();
        self.state.fee_estimates.clear();
        self.floor = FetchTicket(self.next_ticket + 1);
    }

    fn accepts(&self, ticket: FetchTicket) -> bool {
        ticket >= self.floor
    }

    fn touch(&mut self) {
        self.state.updated_at = Some(Utc::now());
    }
}
