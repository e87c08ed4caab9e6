pub mod balance_poller;
pub mod network;
pub mod onchain;
pub mod purchase;
pub mod session_manager;
#[cfg(test)]
pub mod testing;

pub use network::NetworkValidator;
pub use session_manager::SessionManager;
