// Utility modules

use ethers::types::Address;

use crate::error::{AppError, Result};

/// Parse a configured contract/account address, naming the offending field in
/// the error.
pub fn parse_address(field: &str, value: &str) -> Result<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| AppError::Config(format!("{} is not a valid address: {}", field, e)))
}
