use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::error::Result;
use crate::models::{BalanceSnapshot, SharedState};

use super::onchain::ChainGateway;

/// Remaining tickets, floored. On-chain quantities can exceed the safe float
/// range, so this stays in U256 the whole way; a zero ticket cost is guarded
/// to 1.
pub fn tickets_remaining(supply: U256, ticket_token_cost: U256) -> U256 {
    supply / ticket_token_cost.max(U256::one())
}

/// Periodically refreshes a consistent snapshot of on-chain quantities into
/// the shared state. One poller exists per connected session; teardown stops
/// it before a new one starts.
pub struct BalancePoller {
    gateway: Arc<dyn ChainGateway>,
    state: SharedState,
    address: Address,
    period: Duration,
    active: AtomicBool,
    // Fixed once per session on the first successful tick.
    sale_end: Mutex<Option<DateTime<Utc>>>,
}

impl BalancePoller {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        state: SharedState,
        address: Address,
        period: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            state,
            address,
            period,
            active: AtomicBool::new(true),
            sale_end: Mutex::new(None),
        })
    }

    /// Start the poll loop: one tick immediately, then one per period. A tick
    /// that fails is logged and the loop keeps going.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poller.period);
            loop {
                ticker.tick().await;
                if !poller.active.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = poller.refresh().await {
                    tracing::warn!("Balance poll tick failed: {}", e);
                }
            }
        })
    }

    /// Effective immediately: no further reads are dispatched, and an
    /// in-flight tick's result is discarded instead of published.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// One poll tick. All reads are independent round trips; if any fails the
    /// tick aborts and the previous snapshot stays authoritative. Also called
    /// out of cycle after a confirmed transaction.
    pub async fn refresh(&self) -> Result<()> {
        if !self.active.load(Ordering::SeqCst) {
            return Ok(());
        }

        let token_balance = self.gateway.token_balance_of(self.address).await?;
        let stablecoin_balance = self.gateway.stablecoin_balance_of(self.address).await?;
        let ticket_price = self.gateway.ticket_price().await?;
        let ticket_token_cost = self.gateway.ticket_token_cost().await?;
        let tokens_remaining = self.gateway.current_supply().await?;
        let presale_stablecoin_balance = self.gateway.presale_balance().await?;

        // The sale deadline is read once and pinned to the wall clock;
        // re-reading it every tick would make the countdown drift.
        let sale_end = {
            let mut fixed = self.sale_end.lock().await;
            if fixed.is_none() {
                let left = self.gateway.left_seconds().await?;
                *fixed = Some(Utc::now() + chrono::Duration::seconds(left as i64));
            }
            *fixed
        };

        let snapshot = BalanceSnapshot {
            token_balance,
            stablecoin_balance,
            ticket_price,
            ticket_token_cost,
            tickets_remaining: tickets_remaining(tokens_remaining, ticket_token_cost),
            tokens_remaining,
            presale_stablecoin_balance,
            sale_end,
        };

        let mut state = self.state.write().await;
        // A tick that lost the race with teardown must not resurrect state
        // for a session that already ended.
        if self.active.load(Ordering::SeqCst) {
            state.snapshot = Some(snapshot);
        }
        Ok(())
    }
}
