use async_trait::async_trait;
use ethers::contract::{abigen, ContractError};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{
    Http, JsonRpcError, Middleware, MiddlewareError, Provider, ProviderError, RpcError,
};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256, U64};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::{
    config::Config,
    error::{classify, AppError, RawProviderError, Result},
    utils::parse_address,
};

/// Account/chain notifications from the wallet boundary. Single subscriber per
/// channel, delivered on the same runtime as all other work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Option<Address>),
    ChainChanged(u64),
}

pub type WalletEventSender = mpsc::UnboundedSender<WalletEvent>;
pub type WalletEventReceiver = mpsc::UnboundedReceiver<WalletEvent>;

pub fn wallet_event_channel() -> (WalletEventSender, WalletEventReceiver) {
    mpsc::unbounded_channel()
}

/// A submitted state-changing transaction, identified by hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxHandle {
    pub hash: H256,
}

/// Outcome reported by a transaction receipt. Zero status means the
/// transaction executed and reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// The wallet/node boundary: account and chain queries plus the exact contract
/// surface of the token, stablecoin, and presale contracts. No caching — every
/// call is a fresh round trip.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    async fn request_accounts(&self) -> Result<Address>;
    async fn chain_id(&self) -> Result<u64>;

    async fn token_name(&self) -> Result<String>;
    async fn token_symbol(&self) -> Result<String>;
    async fn token_balance_of(&self, owner: Address) -> Result<U256>;

    async fn stablecoin_balance_of(&self, owner: Address) -> Result<U256>;
    async fn approve_stablecoin(&self, spender: Address, amount: U256) -> Result<TxHandle>;

    async fn ticket_price(&self) -> Result<U256>;
    async fn ticket_token_cost(&self) -> Result<U256>;
    async fn current_supply(&self) -> Result<U256>;
    async fn left_seconds(&self) -> Result<u64>;
    async fn presale_balance(&self) -> Result<U256>;
    async fn buy_ticket(&self, amount: U256) -> Result<TxHandle>;

    /// Suspends until the provider reports a receipt. No overall timeout:
    /// block time is externally controlled.
    async fn wait_for_receipt(&self, tx: &TxHandle) -> Result<ReceiptStatus>;

    fn presale_address(&self) -> Address;
}

abigen!(
    Erc20,
    r#"[
        function name() view returns (string)
        function symbol() view returns (string)
        function balanceOf(address owner) view returns (uint256)
        function approve(address spender, uint256 amount) returns (bool)
    ]"#
);

abigen!(
    Presale,
    r#"[
        function ticketPrice() view returns (uint256)
        function ticketTokenCost() view returns (uint256)
        function currentSupply() view returns (uint256)
        function leftSeconds() view returns (uint256)
        function presaleBalance() view returns (uint256)
        function buyTicket(uint256 amount) returns (bool)
    ]"#
);

type WalletClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Production gateway: typed contract bindings over a signing JSON-RPC client.
pub struct EthersGateway {
    provider: Provider<Http>,
    token: Erc20<WalletClient>,
    stablecoin: Erc20<WalletClient>,
    presale: Presale<WalletClient>,
    presale_address: Address,
    signer_address: Address,
    receipt_poll_interval: Duration,
}

impl EthersGateway {
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;

        let wallet = config
            .wallet_private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| AppError::Config(format!("Invalid wallet private key: {}", e)))?
            .with_chain_id(config.chain_id);
        let signer_address = wallet.address();

        let client = Arc::new(SignerMiddleware::new(provider.clone(), wallet));

        let token_address = parse_address("TOKEN_ADDRESS", &config.token_address)?;
        let stablecoin_address = parse_address("STABLECOIN_ADDRESS", &config.stablecoin_address)?;
        let presale_address = parse_address("PRESALE_ADDRESS", &config.presale_address)?;

        Ok(Self {
            provider,
            token: Erc20::new(token_address, client.clone()),
            stablecoin: Erc20::new(stablecoin_address, client.clone()),
            presale: Presale::new(presale_address, client),
            presale_address,
            signer_address,
            receipt_poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
        })
    }
}

#[async_trait]
impl ChainGateway for EthersGateway {
    async fn request_accounts(&self) -> Result<Address> {
        // Browser-style wallets answer eth_requestAccounts with a prompt; bare
        // JSON-RPC nodes reject the method, in which case the configured
        // signer is the account. A 4001 rejection is the user declining.
        match self
            .provider
            .request::<_, Vec<Address>>("eth_requestAccounts", ())
            .await
        {
            Ok(accounts) => Ok(accounts.into_iter().next().unwrap_or(self.signer_address)),
            Err(err) => match classify_provider_error(&err) {
                AppError::UserRejected => Err(AppError::UserRejected),
                other => {
                    tracing::debug!(
                        "eth_requestAccounts unavailable ({}); using configured signer",
                        other
                    );
                    Ok(self.signer_address)
                }
            },
        }
    }

    async fn chain_id(&self) -> Result<u64> {
        let id = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| classify_provider_error(&e))?;
        Ok(id.as_u64())
    }

    async fn token_name(&self) -> Result<String> {
        self.token.name().call().await.map_err(classify_call_error)
    }

    async fn token_symbol(&self) -> Result<String> {
        self.token
            .symbol()
            .call()
            .await
            .map_err(classify_call_error)
    }

    async fn token_balance_of(&self, owner: Address) -> Result<U256> {
        self.token
            .balance_of(owner)
            .call()
            .await
            .map_err(classify_call_error)
    }

    async fn stablecoin_balance_of(&self, owner: Address) -> Result<U256> {
        self.stablecoin
            .balance_of(owner)
            .call()
            .await
            .map_err(classify_call_error)
    }

    async fn approve_stablecoin(&self, spender: Address, amount: U256) -> Result<TxHandle> {
        let call = self.stablecoin.approve(spender, amount);
        let pending = call.send().await.map_err(classify_call_error)?;
        Ok(TxHandle {
            hash: pending.tx_hash(),
        })
    }

    async fn ticket_price(&self) -> Result<U256> {
        self.presale
            .ticket_price()
            .call()
            .await
            .map_err(classify_call_error)
    }

    async fn ticket_token_cost(&self) -> Result<U256> {
        self.presale
            .ticket_token_cost()
            .call()
            .await
            .map_err(classify_call_error)
    }

    async fn current_supply(&self) -> Result<U256> {
        self.presale
            .current_supply()
            .call()
            .await
            .map_err(classify_call_error)
    }

    async fn left_seconds(&self) -> Result<u64> {
        let left = self
            .presale
            .left_seconds()
            .call()
            .await
            .map_err(classify_call_error)?;
        // Clamp: the countdown only needs wall-clock range.
        Ok(left.min(U256::from(i64::MAX as u64)).as_u64())
    }

    async fn presale_balance(&self) -> Result<U256> {
        self.presale
            .presale_balance()
            .call()
            .await
            .map_err(classify_call_error)
    }

    async fn buy_ticket(&self, amount: U256) -> Result<TxHandle> {
        let call = self.presale.buy_ticket(amount);
        let pending = call.send().await.map_err(classify_call_error)?;
        Ok(TxHandle {
            hash: pending.tx_hash(),
        })
    }

    async fn wait_for_receipt(&self, tx: &TxHandle) -> Result<ReceiptStatus> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx.hash)
                .await
                .map_err(|e| classify_provider_error(&e))?;

            match receipt {
                Some(receipt) => {
                    return Ok(if receipt.status == Some(U64::zero()) {
                        ReceiptStatus::Reverted
                    } else {
                        ReceiptStatus::Success
                    });
                }
                None => sleep(self.receipt_poll_interval).await,
            }
        }
    }

    fn presale_address(&self) -> Address {
        self.presale_address
    }
}

fn raw_from_json_rpc(err: &JsonRpcError) -> RawProviderError {
    let data_message = err.data.as_ref().and_then(|data| {
        data.get("message")
            .and_then(|message| message.as_str())
            .map(str::to_string)
    });
    RawProviderError {
        code: Some(err.code),
        data_message,
        message: err.message.clone(),
    }
}

fn classify_provider_error(err: &ProviderError) -> AppError {
    // `ProviderError` carries both the rpc and the middleware error surface;
    // name the rpc one explicitly.
    match RpcError::as_error_response(err) {
        Some(rpc) => classify(raw_from_json_rpc(rpc)),
        None => classify(RawProviderError {
            message: err.to_string(),
            ..RawProviderError::default()
        }),
    }
}

fn classify_call_error(err: ContractError<WalletClient>) -> AppError {
    if let Some(rpc) = err.as_provider_error().and_then(RpcError::as_error_response) {
        return classify(raw_from_json_rpc(rpc));
    }
    if let Some(rpc) = err
        .as_middleware_error()
        .and_then(MiddlewareError::as_error_response)
    {
        return classify(raw_from_json_rpc(rpc));
    }
    classify(RawProviderError {
        message: err.to_string(),
        ..RawProviderError::default()
    })
}
