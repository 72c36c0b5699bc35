use anyhow::Result;

#[tokio::main]
pub async fn main() -> Result<()> {
    solana_notifier::monitor_wallets().await
}
