/// Confirms the wallet's active chain matches the single chain this client is
/// deployed against. Session initialization must not proceed on a mismatch.
#[derive(Debug, Clone, Copy)]
pub struct NetworkValidator {
    required_chain_id: u64,
}

impl NetworkValidator {
    pub fn new(required_chain_id: u64) -> Self {
        Self { required_chain_id }
    }

    pub fn required_chain_id(&self) -> u64 {
        self.required_chain_id
    }

    pub fn validate(&self, chain_id: u64) -> bool {
        chain_id == self.required_chain_id
    }
}
