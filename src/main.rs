mod config;
mod constants;
mod error;
mod models;
mod services;
mod utils;

use std::sync::Arc;
use tokio::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use constants::STATUS_LOG_INTERVAL_SECS;
use models::{new_shared_state, SharedState};
use services::onchain::{wallet_event_channel, ChainGateway, EthersGateway};
use services::{NetworkValidator, SessionManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "presale_client=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    tracing::info!("Starting presale client against {}", config.rpc_url);

    let gateway: Arc<dyn ChainGateway> = Arc::new(EthersGateway::from_config(&config)?);
    let state = new_shared_state();
    let manager = SessionManager::new(
        gateway,
        state.clone(),
        NetworkValidator::new(config.chain_id),
        Duration::from_secs(config.poll_interval_secs),
    );

    // An embedding UI forwards provider account/chain notifications through
    // this channel. The sender stays alive so the loop idles on headless runs.
    let (_wallet_events, wallet_event_rx) = wallet_event_channel();
    let event_loop = manager.spawn_event_loop(wallet_event_rx);

    manager.connect().await?;

    // One-shot purchase mode for scripted runs. The purchase needs the
    // ticket price, so it waits for the first snapshot to land.
    if let Ok(amount) = std::env::var("BUY_TICKETS") {
        let amount: u64 = amount
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid BUY_TICKETS value: {}", e))?;
        if state.read().await.session.is_connected() {
            while state.read().await.snapshot.is_none() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            manager.purchase(amount).await;
        } else {
            tracing::warn!("BUY_TICKETS ignored: no connected session");
        }
    }

    let mut status = tokio::time::interval(Duration::from_secs(STATUS_LOG_INTERVAL_SECS));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
            _ = status.tick() => log_status(&state).await,
        }
    }

    manager.reset().await;
    event_loop.abort();
    Ok(())
}

async fn log_status(state: &SharedState) {
    let state = state.read().await;

    let Some(address) = state.session.address else {
        tracing::info!("Session: disconnected");
        return;
    };

    match (&state.token, &state.snapshot) {
        (Some(token), Some(snapshot)) => tracing::info!(
            "{:?}: {} {}, {} USDC, {} tickets remaining, sale ends {:?}",
            address,
            snapshot.token_balance,
            token.symbol,
            snapshot.stablecoin_balance,
            snapshot.tickets_remaining,
            snapshot.sale_end,
        ),
        _ => tracing::info!("{:?}: waiting for the first balance snapshot", address),
    }

    if let Some(pending) = &state.pending_tx {
        tracing::info!(
            "Awaiting confirmation of {:?} ({:?})",
            pending.hash,
            pending.step
        );
    }
    if let Some(err) = &state.transaction_error {
        tracing::warn!("Transaction error: {}", err.message);
    }
    if let Some(err) = &state.network_error {
        tracing::warn!("Network error: {}", err.message);
    }
}
