use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{
    email::Notifier,
    signature_store::{SignatureStore, StoreError},
    solana_rpc::TransactionFetcher,
};

/// What happened to a single wallet during a cycle.
#[derive(Clone, Debug, PartialEq)]
pub enum CheckOutcome {
    FetchFailed,
    NoHistory,
    Unchanged,
    Notified(String),
    /// The notification failed, the signature will be treated as new again next cycle.
    NotifyFailed(String),
    /// Notified, but the signature couldn't be persisted so it is not marked as seen.
    PersistFailed(String),
}

pub struct Reconciler<F, N, S> {
    wallets: Vec<String>,
    last_seen: HashMap<String, Option<String>>,
    fetcher: F,
    notifier: N,
    store: S,
    last_cycle: Arc<Mutex<DateTime<Utc>>>,
}

impl<F, N, S> Reconciler<F, N, S>
where
    F: TransactionFetcher + Send + Sync,
    N: Notifier + Send + Sync,
    S: SignatureStore + Send + Sync,
{
    /// Prepares the store for every wallet and loads the last seen signatures. Wallets are
    /// checked in the order given here.
    pub async fn initialize(
        wallets: Vec<String>,
        fetcher: F,
        notifier: N,
        store: S,
    ) -> Result<Self, StoreError> {
        store.initialize(&wallets).await?;

        let mut last_seen = HashMap::with_capacity(wallets.len());
        for wallet in &wallets {
            let signature = store.load(wallet).await;
            info!(
                wallet,
                last_signature = signature.as_deref().unwrap_or(""),
                "loaded last transaction"
            );
            last_seen.insert(wallet.clone(), signature);
        }

        info!("monitoring {} wallet addresses", wallets.len());

        Ok(Self {
            wallets,
            last_seen,
            fetcher,
            notifier,
            store,
            last_cycle: Arc::new(Mutex::new(Utc::now())),
        })
    }

    #[cfg(test)]
    pub fn last_seen(&self, wallet: &str) -> Option<&str> {
        self.last_seen.get(wallet).and_then(|s| s.as_deref())
    }

    /// Time the last cycle completed, shared with the health route.
    pub fn last_cycle(&self) -> Arc<Mutex<DateTime<Utc>>> {
        self.last_cycle.clone()
    }

    pub async fn run_cycle(&mut self) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::with_capacity(self.wallets.len());

        for wallet in &self.wallets {
            let last_seen = self.last_seen.get(wallet).and_then(|s| s.as_deref());
            let outcome = check_wallet(
                &self.fetcher,
                &self.notifier,
                &self.store,
                wallet,
                last_seen,
            )
            .await;

            if let CheckOutcome::Notified(signature) = &outcome {
                self.last_seen
                    .insert(wallet.clone(), Some(signature.clone()));
            }

            outcomes.push(outcome);
        }

        if let Ok(mut last_cycle) = self.last_cycle.lock() {
            *last_cycle = Utc::now();
        }

        outcomes
    }

    /// Runs a cycle on every tick until `shutdown` resolves. Shutdown is only observed between
    /// cycles, a cycle that has started always completes.
    pub async fn run(mut self, poll_interval: Duration, shutdown: impl Future<Output = ()>) {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping wallet monitor");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let outcomes = self.run_cycle().await;
            let notified = outcomes
                .iter()
                .filter(|outcome| matches!(outcome, CheckOutcome::Notified(_)))
                .count();

            debug!(
                wallets = outcomes.len(),
                notified,
                "cycle complete, sleeping for {} seconds",
                poll_interval.as_secs()
            );
        }
    }
}

async fn check_wallet(
    fetcher: &(impl TransactionFetcher + Sync),
    notifier: &(impl Notifier + Sync),
    store: &(impl SignatureStore + Sync),
    wallet: &str,
    last_seen: Option<&str>,
) -> CheckOutcome {
    info!(wallet, "checking new transactions");

    let latest = match fetcher.fetch_latest(wallet).await {
        Ok(Some(latest)) => latest,
        Ok(None) => {
            info!(wallet, "no transactions found");
            return CheckOutcome::NoHistory;
        }
        Err(err) => {
            error!(wallet, %err, "error fetching latest transaction");
            return CheckOutcome::FetchFailed;
        }
    };

    if last_seen == Some(latest.signature.as_str()) {
        info!(wallet, "no new transaction since last check");
        return CheckOutcome::Unchanged;
    }

    info!(
        wallet,
        signature = latest.signature.as_str(),
        "new transaction found"
    );

    if let Err(err) = notifier.notify(wallet, &latest).await {
        error!(
            wallet,
            signature = latest.signature.as_str(),
            %err,
            "error sending notification, will retry next cycle"
        );
        return CheckOutcome::NotifyFailed(latest.signature);
    }

    info!(wallet, "notification sent successfully");

    match store.save(wallet, &latest.signature).await {
        Ok(()) => CheckOutcome::Notified(latest.signature),
        Err(err) => {
            warn!(
                wallet,
                signature = latest.signature.as_str(),
                %err,
                "error writing last tx file, transaction stays unseen"
            );
            CheckOutcome::PersistFailed(latest.signature)
        }
    }
}
