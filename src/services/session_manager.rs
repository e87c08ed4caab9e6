use ethers::types::Address;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{AppState, Session, SessionPhase, SharedState, TokenMetadata};

use super::balance_poller::BalancePoller;
use super::network::NetworkValidator;
use super::onchain::{ChainGateway, WalletEvent, WalletEventReceiver};
use super::purchase::PurchaseOrchestrator;

struct ActivePoller {
    poller: Arc<BalancePoller>,
    task: JoinHandle<()>,
}

/// Owns the wallet session lifecycle: connect, network validation, the
/// per-session poller, and reaction to wallet account/chain events. At most
/// one poller is alive at any time.
pub struct SessionManager {
    gateway: Arc<dyn ChainGateway>,
    state: SharedState,
    validator: NetworkValidator,
    poll_period: Duration,
    active_poller: Mutex<Option<ActivePoller>>,
}

impl SessionManager {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        state: SharedState,
        validator: NetworkValidator,
        poll_period: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            state,
            validator,
            poll_period,
            active_poller: Mutex::new(None),
        })
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Prompt the wallet for an account and bring the session up. A declined
    /// prompt leaves the session disconnected without raising anything; a
    /// wrong chain surfaces as the dismissible network error.
    pub async fn connect(&self) -> Result<()> {
        self.state.write().await.session.phase = SessionPhase::Connecting;

        let address = match self.gateway.request_accounts().await {
            Ok(address) => address,
            Err(AppError::UserRejected) => {
                self.state.write().await.session.phase = SessionPhase::Disconnected;
                return Ok(());
            }
            Err(err) => {
                self.state.write().await.session.phase = SessionPhase::Disconnected;
                return Err(err);
            }
        };

        let chain_id = match self.gateway.chain_id().await {
            Ok(chain_id) => chain_id,
            Err(err) => {
                self.state.write().await.session.phase = SessionPhase::Disconnected;
                return Err(err);
            }
        };

        if !self.validator.validate(chain_id) {
            let err = AppError::NetworkMismatch {
                expected: self.validator.required_chain_id(),
                actual: chain_id,
            };
            tracing::warn!("{}", err);
            let mut state = self.state.write().await;
            state.network_error = Some(err.record());
            state.session.phase = SessionPhase::Disconnected;
            return Ok(());
        }

        self.initialize(address, chain_id).await;
        Ok(())
    }

    /// Bring up a session for a validated account: tear down whatever session
    /// existed, publish the new identity, fetch the token metadata once, and
    /// start a fresh poller.
    async fn initialize(&self, address: Address, chain_id: u64) {
        self.stop_poller().await;

        {
            let mut state = self.state.write().await;
            state.session = Session {
                address: Some(address),
                chain_id: Some(chain_id),
                phase: SessionPhase::Connected,
            };
            state.snapshot = None;
            state.pending_tx = None;
            state.transaction_error = None;
            state.network_error = None;
        }

        match self.fetch_metadata().await {
            Ok(metadata) => self.state.write().await.token = Some(metadata),
            // The session is usable without a display name.
            Err(err) => tracing::warn!("Token metadata fetch failed: {}", err),
        }

        let poller = BalancePoller::new(
            self.gateway.clone(),
            self.state.clone(),
            address,
            self.poll_period,
        );
        let task = poller.start();
        *self.active_poller.lock().await = Some(ActivePoller { poller, task });

        tracing::info!("Session connected: {:?} on chain {}", address, chain_id);
    }

    async fn fetch_metadata(&self) -> Result<TokenMetadata> {
        let name = self.gateway.token_name().await?;
        let symbol = self.gateway.token_symbol().await?;
        Ok(TokenMetadata { name, symbol })
    }

    async fn stop_poller(&self) {
        if let Some(active) = self.active_poller.lock().await.take() {
            active.poller.stop();
            active.task.abort();
        }
    }

    /// Full teardown back to the pristine disconnected state.
    pub async fn reset(&self) {
        self.stop_poller().await;
        *self.state.write().await = AppState::default();
    }

    /// Consume wallet notifications for the life of the channel.
    pub fn spawn_event_loop(self: &Arc<Self>, mut events: WalletEventReceiver) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                manager.handle_wallet_event(event).await;
            }
        })
    }

    pub async fn handle_wallet_event(&self, event: WalletEvent) {
        match event {
            // The chain did not change, so no re-validation: the session is
            // rebuilt in place for the new account. Without a connected
            // session there is no validated chain to rebuild on, so the
            // event is ignored; the account is picked up on the next
            // explicit connect.
            WalletEvent::AccountsChanged(Some(address)) => {
                let chain_id = {
                    let state = self.state.read().await;
                    state
                        .session
                        .chain_id
                        .filter(|_| state.session.is_connected())
                };
                match chain_id {
                    Some(chain_id) => self.initialize(address, chain_id).await,
                    None => {
                        tracing::debug!("Ignoring account change without a connected session")
                    }
                }
            }
            WalletEvent::AccountsChanged(None) => {
                tracing::info!("Wallet disconnected");
                self.reset().await;
            }
            WalletEvent::ChainChanged(chain_id) => {
                tracing::info!("Chain changed to {}; resetting session", chain_id);
                self.reset().await;
            }
        }
    }

    /// Run a ticket purchase against the live session. Without a connected
    /// session this records a transaction error instead of touching the chain.
    pub async fn purchase(&self, amount: u64) {
        let poller = self
            .active_poller
            .lock()
            .await
            .as_ref()
            .map(|active| Arc::clone(&active.poller));

        match poller {
            Some(poller) => {
                PurchaseOrchestrator::new(self.gateway.clone(), self.state.clone(), poller)
                    .purchase(amount)
                    .await;
            }
            None => {
                let err = AppError::BadRequest("Wallet is not connected".to_string());
                self.state.write().await.transaction_error = Some(err.record());
            }
        }
    }

    pub async fn dismiss_transaction_error(&self) {
        self.state.write().await.dismiss_transaction_error();
    }

    pub async fn dismiss_network_error(&self) {
        self.state.write().await.dismiss_network_error();
    }
}
