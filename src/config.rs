use serde::Deserialize;
use std::env;

use crate::constants::{BALANCE_POLL_INTERVAL_SECS, DEFAULT_CHAIN_ID, RECEIPT_POLL_INTERVAL_MS};
use crate::utils::parse_address;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Wallet / node
    pub rpc_url: String,
    pub chain_id: u64,
    pub wallet_private_key: String,

    // Contract addresses
    pub token_address: String,
    pub stablecoin_address: String,
    pub presale_address: String,

    // Polling
    pub poll_interval_secs: u64,
    pub receipt_poll_interval_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            rpc_url: env::var("RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()),
            chain_id: env::var("CHAIN_ID")
                .unwrap_or_else(|_| DEFAULT_CHAIN_ID.to_string())
                .parse()?,
            wallet_private_key: env::var("WALLET_PRIVATE_KEY")?,

            token_address: env::var("TOKEN_ADDRESS")?,
            stablecoin_address: env::var("STABLECOIN_ADDRESS")?,
            presale_address: env::var("PRESALE_ADDRESS")?,

            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| BALANCE_POLL_INTERVAL_SECS.to_string())
                .parse()?,
            receipt_poll_interval_ms: env::var("RECEIPT_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| RECEIPT_POLL_INTERVAL_MS.to_string())
                .parse()?,
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc_url.trim().is_empty() {
            anyhow::bail!("RPC_URL is empty");
        }
        if self.wallet_private_key.trim().is_empty() {
            anyhow::bail!("WALLET_PRIVATE_KEY is empty");
        }
        for (field, value) in [
            ("TOKEN_ADDRESS", &self.token_address),
            ("STABLECOIN_ADDRESS", &self.stablecoin_address),
            ("PRESALE_ADDRESS", &self.presale_address),
        ] {
            parse_address(field, value).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            if value.starts_with("0x0000") {
                tracing::warn!("Using placeholder {}", field);
            }
        }

        if self.poll_interval_secs == 0 {
            anyhow::bail!("POLL_INTERVAL_SECS must be > 0");
        }
        if self.receipt_poll_interval_ms == 0 {
            anyhow::bail!("RECEIPT_POLL_INTERVAL_MS must be > 0");
        }

        Ok(())
    }
}
