//! Scripted in-memory gateway for service tests. Every call is recorded by
//! name; individual reads can be made to fail and the two state-changing
//! calls can be scripted to revert or to be declined at the wallet prompt.

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{AppError, Result};

use super::onchain::{ChainGateway, ReceiptStatus, TxHandle};

type Hook = Box<dyn Fn() + Send + Sync>;

pub struct MockChain {
    pub account: Address,
    pub chain: u64,
    pub token_name: String,
    pub token_symbol: String,
    pub token_balance: U256,
    pub stablecoin_balance: U256,
    pub ticket_price: U256,
    pub ticket_token_cost: U256,
    pub current_supply: U256,
    pub left_seconds: u64,
    pub presale_stablecoin_balance: U256,
    pub presale: Address,
    accounts_rejected: AtomicBool,
    approve_rejected: AtomicBool,
    buy_rejected: AtomicBool,
    approve_reverted: AtomicBool,
    buy_reverted: AtomicBool,
    failing: Mutex<HashSet<&'static str>>,
    calls: Mutex<Vec<String>>,
    approvals: Mutex<Vec<(Address, U256)>>,
    buys: Mutex<Vec<U256>>,
    receipts: Mutex<HashMap<H256, ReceiptStatus>>,
    next_hash: AtomicU64,
    on_presale_balance: Mutex<Option<Hook>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            account: Address::from_low_u64_be(0xA11CE),
            chain: 31337,
            token_name: "My Token".to_string(),
            token_symbol: "MTK".to_string(),
            token_balance: U256::from(100u64),
            stablecoin_balance: U256::from(10_000u64),
            ticket_price: U256::from(5u64),
            ticket_token_cost: U256::from(250u64),
            current_supply: U256::from(1_000u64),
            left_seconds: 3_600,
            presale_stablecoin_balance: U256::from(400u64),
            presale: Address::from_low_u64_be(0xFEED),
            accounts_rejected: AtomicBool::new(false),
            approve_rejected: AtomicBool::new(false),
            buy_rejected: AtomicBool::new(false),
            approve_reverted: AtomicBool::new(false),
            buy_reverted: AtomicBool::new(false),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            approvals: Mutex::new(Vec::new()),
            buys: Mutex::new(Vec::new()),
            receipts: Mutex::new(HashMap::new()),
            next_hash: AtomicU64::new(0),
            on_presale_balance: Mutex::new(None),
        }
    }

    pub fn reject_accounts(&self) {
        self.accounts_rejected.store(true, Ordering::SeqCst);
    }

    pub fn reject_approve(&self) {
        self.approve_rejected.store(true, Ordering::SeqCst);
    }

    pub fn reject_buy(&self) {
        self.buy_rejected.store(true, Ordering::SeqCst);
    }

    pub fn revert_approve(&self) {
        self.approve_reverted.store(true, Ordering::SeqCst);
    }

    pub fn revert_buy(&self) {
        self.buy_reverted.store(true, Ordering::SeqCst);
    }

    /// Make the named call fail with a provider error from now on.
    pub fn fail_read(&self, name: &'static str) {
        self.failing.lock().unwrap().insert(name);
    }

    /// Forget every scripted failure, rejection, and revert.
    pub fn clear_outcomes(&self) {
        self.accounts_rejected.store(false, Ordering::SeqCst);
        self.approve_rejected.store(false, Ordering::SeqCst);
        self.buy_rejected.store(false, Ordering::SeqCst);
        self.approve_reverted.store(false, Ordering::SeqCst);
        self.buy_reverted.store(false, Ordering::SeqCst);
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.as_str() == name)
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn approvals(&self) -> Vec<(Address, U256)> {
        self.approvals.lock().unwrap().clone()
    }

    pub fn buys(&self) -> Vec<U256> {
        self.buys.lock().unwrap().clone()
    }

    /// Run a hook in the middle of a poll tick, after the presale balance
    /// read. Used to race teardown against an in-flight tick.
    pub fn set_on_presale_balance(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_presale_balance.lock().unwrap() = Some(Box::new(hook));
    }

    fn read(&self, name: &str) -> Result<()> {
        self.calls.lock().unwrap().push(name.to_string());
        if self.failing.lock().unwrap().contains(name) {
            return Err(AppError::Provider(format!("mock read failure: {}", name)));
        }
        Ok(())
    }

    fn submit(&self, status: ReceiptStatus) -> TxHandle {
        let n = self.next_hash.fetch_add(1, Ordering::SeqCst) + 1;
        let hash = H256::from_low_u64_be(n);
        self.receipts.lock().unwrap().insert(hash, status);
        TxHandle { hash }
    }
}

#[async_trait]
impl ChainGateway for MockChain {
    async fn request_accounts(&self) -> Result<Address> {
        self.read("request_accounts")?;
        if self.accounts_rejected.load(Ordering::SeqCst) {
            return Err(AppError::UserRejected);
        }
        Ok(self.account)
    }

    async fn chain_id(&self) -> Result<u64> {
        self.read("chain_id")?;
        Ok(self.chain)
    }

    async fn token_name(&self) -> Result<String> {
        self.read("token_name")?;
        Ok(self.token_name.clone())
    }

    async fn token_symbol(&self) -> Result<String> {
        self.read("token_symbol")?;
        Ok(self.token_symbol.clone())
    }

    async fn token_balance_of(&self, _owner: Address) -> Result<U256> {
        self.read("token_balance_of")?;
        Ok(self.token_balance)
    }

    async fn stablecoin_balance_of(&self, _owner: Address) -> Result<U256> {
        self.read("stablecoin_balance_of")?;
        Ok(self.stablecoin_balance)
    }

    async fn approve_stablecoin(&self, spender: Address, amount: U256) -> Result<TxHandle> {
        self.read("approve_stablecoin")?;
        if self.approve_rejected.load(Ordering::SeqCst) {
            return Err(AppError::UserRejected);
        }
        self.approvals.lock().unwrap().push((spender, amount));
        let status = if self.approve_reverted.load(Ordering::SeqCst) {
            ReceiptStatus::Reverted
        } else {
            ReceiptStatus::Success
        };
        Ok(self.submit(status))
    }

    async fn ticket_price(&self) -> Result<U256> {
        self.read("ticket_price")?;
        Ok(self.ticket_price)
    }

    async fn ticket_token_cost(&self) -> Result<U256> {
        self.read("ticket_token_cost")?;
        Ok(self.ticket_token_cost)
    }

    async fn current_supply(&self) -> Result<U256> {
        self.read("current_supply")?;
        Ok(self.current_supply)
    }

    async fn left_seconds(&self) -> Result<u64> {
        self.read("left_seconds")?;
        Ok(self.left_seconds)
    }

    async fn presale_balance(&self) -> Result<U256> {
        self.read("presale_balance")?;
        if let Some(hook) = self.on_presale_balance.lock().unwrap().as_ref() {
            hook();
        }
        Ok(self.presale_stablecoin_balance)
    }

    async fn buy_ticket(&self, amount: U256) -> Result<TxHandle> {
        self.read("buy_ticket")?;
        if self.buy_rejected.load(Ordering::SeqCst) {
            return Err(AppError::UserRejected);
        }
        self.buys.lock().unwrap().push(amount);
        let status = if self.buy_reverted.load(Ordering::SeqCst) {
            ReceiptStatus::Reverted
        } else {
            ReceiptStatus::Success
        };
        Ok(self.submit(status))
    }

    async fn wait_for_receipt(&self, tx: &TxHandle) -> Result<ReceiptStatus> {
        self.read("wait_for_receipt")?;
        Ok(self
            .receipts
            .lock()
            .unwrap()
            .get(&tx.hash)
            .copied()
            .unwrap_or(ReceiptStatus::Success))
    }

    fn presale_address(&self) -> Address {
        self.presale
    }
}
