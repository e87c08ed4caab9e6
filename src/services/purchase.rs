use ethers::types::U256;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{PendingTransaction, PurchaseStep, SharedState};

use super::balance_poller::BalancePoller;
use super::onchain::{ChainGateway, ReceiptStatus, TxHandle};

/// Drives the two-phase purchase: approve the stablecoin spend, then buy the
/// tickets. The two transactions have independent failure modes — approval can
/// revert or be declined on its own — so each step is awaited and observable
/// on its own, and the buy step only runs after the approval fully succeeded.
pub struct PurchaseOrchestrator {
    gateway: Arc<dyn ChainGateway>,
    state: SharedState,
    poller: Arc<BalancePoller>,
}

impl PurchaseOrchestrator {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        state: SharedState,
        poller: Arc<BalancePoller>,
    ) -> Self {
        Self {
            gateway,
            state,
            poller,
        }
    }

    /// Orchestration boundary: nothing escapes to the runtime. A declined
    /// wallet prompt aborts silently; every other failure becomes the
    /// dismissible transaction error.
    pub async fn purchase(&self, amount: u64) {
        match self.run(amount).await {
            Ok(()) => {}
            Err(AppError::UserRejected) => {}
            Err(err) => {
                tracing::warn!("Purchase failed: {}", err);
                self.state.write().await.transaction_error = Some(err.record());
            }
        }
    }

    pub(crate) async fn run(&self, amount: u64) -> Result<()> {
        if amount == 0 {
            return Err(AppError::BadRequest(
                "Ticket amount must be a positive integer".to_string(),
            ));
        }

        let ticket_price = {
            let mut state = self.state.write().await;
            state.transaction_error = None;
            state.snapshot.as_ref().map(|snapshot| snapshot.ticket_price)
        }
        .ok_or_else(|| AppError::BadRequest("On-chain balances are not loaded yet".to_string()))?;

        let cost = U256::from(amount)
            .checked_mul(ticket_price)
            .ok_or_else(|| AppError::BadRequest("Ticket cost overflows".to_string()))?;

        let approval = self
            .gateway
            .approve_stablecoin(self.gateway.presale_address(), cost)
            .await?;
        self.await_step(PurchaseStep::Approve, approval, "Approve USDC failed")
            .await?;
        self.refresh_balances().await;

        let purchase = self.gateway.buy_ticket(U256::from(amount)).await?;
        self.await_step(PurchaseStep::BuyTicket, purchase, "Buy Ticket failed")
            .await?;
        self.refresh_balances().await;

        Ok(())
    }

    /// Record the pending marker for a submitted transaction, await its
    /// receipt, and release the marker on every exit path — success, revert,
    /// and provider failure alike — so the UI never shows a stuck "awaiting"
    /// indicator.
    async fn await_step(&self, step: PurchaseStep, tx: TxHandle, failure: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.pending_tx = Some(PendingTransaction {
                hash: tx.hash,
                step,
            });
        }

        let waited = self.gateway.wait_for_receipt(&tx).await;

        {
            let mut state = self.state.write().await;
            state.pending_tx = None;
        }

        match waited? {
            ReceiptStatus::Success => Ok(()),
            ReceiptStatus::Reverted => Err(AppError::TransactionReverted(failure.to_string())),
        }
    }

    /// Out-of-cycle refresh after a confirmed transaction; a failure here is
    /// the next tick's problem, not the purchase's.
    async fn refresh_balances(&self) {
        if let Err(err) = self.poller.refresh().await {
            tracing::warn!("Post-transaction balance refresh failed: {}", err);
        }
    }
}
