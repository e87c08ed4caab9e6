/// Application constants

// Chain configuration. 31337 is the default hardhat/anvil chain id; override
// with CHAIN_ID for public networks.
pub const DEFAULT_CHAIN_ID: u64 = 31337;

// Provider error code reported when the user declines a wallet prompt.
pub const USER_REJECTED_CODE: i64 = 4001;

// Background service intervals
pub const BALANCE_POLL_INTERVAL_SECS: u64 = 1;
pub const RECEIPT_POLL_INTERVAL_MS: u64 = 1_500;

// Snapshot summary cadence for the headless run loop
pub const STATUS_LOG_INTERVAL_SECS: u64 = 5;
