mod env;
mod log;
mod monitor;

pub use monitor::monitor_wallets;
