use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::ErrorRecord;

/// Where the wallet connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// One wallet account on one chain. Exclusively owned by the session manager.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Session {
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    pub phase: SessionPhase,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.phase == SessionPhase::Connected
    }
}

/// Immutable once fetched; fetched once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
}

/// The complete, internally-consistent set of on-chain values published after
/// a successful poll tick. Replaced whole; never partially updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub token_balance: U256,
    pub stablecoin_balance: U256,
    pub ticket_price: U256,
    pub ticket_token_cost: U256,
    pub tokens_remaining: U256,
    pub tickets_remaining: U256,
    pub presale_stablecoin_balance: U256,
    /// Fixed on the first tick of the session; later ticks reuse it so the
    /// countdown never drifts from repeated re-reads.
    pub sale_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PurchaseStep {
    Approve,
    BuyTicket,
}

/// A submitted transaction whose confirmation is being awaited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTransaction {
    pub hash: H256,
    pub step: PurchaseStep,
}

/// The single source of truth consumed by the presentation layer. Mutated only
/// by the session manager, the balance poller, and the purchase orchestrator,
/// which all run on the same runtime.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AppState {
    pub session: Session,
    pub token: Option<TokenMetadata>,
    pub snapshot: Option<BalanceSnapshot>,
    pub pending_tx: Option<PendingTransaction>,
    pub transaction_error: Option<ErrorRecord>,
    pub network_error: Option<ErrorRecord>,
}

impl AppState {
    /// Clears only the transaction error, leaving the rest untouched.
    pub fn dismiss_transaction_error(&mut self) {
        self.transaction_error = None;
    }

    /// Clears only the network error, leaving the rest untouched.
    pub fn dismiss_network_error(&mut self) {
        self.network_error = None;
    }
}

pub type SharedState = Arc<RwLock<AppState>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(RwLock::new(AppState::default()))
}
