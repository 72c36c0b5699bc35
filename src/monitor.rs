mod email;
mod env;
mod reconcile;
mod signature_store;
mod solana_rpc;

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::log;

use self::{
    email::EmailNotifier, env::get_app_config, reconcile::Reconciler,
    signature_store::FileSignatureStore, solana_rpc::SolanaRpc,
};

/// Health turns unhealthy when no cycle completed within this many poll intervals.
const MAX_MISSED_CYCLES: u32 = 3;

#[derive(Clone)]
struct HealthState {
    last_cycle: Arc<Mutex<DateTime<Utc>>>,
    max_age: Duration,
}

async fn health(State(state): State<HealthState>) -> StatusCode {
    let last_cycle = match state.last_cycle.lock() {
        Ok(last_cycle) => *last_cycle,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR,
    };

    // A negative age can't be converted and counts as fresh.
    let is_fresh = (Utc::now() - last_cycle)
        .to_std()
        .map_or(true, |age| age < state.max_age);

    if is_fresh {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn mount_health_route(port: u16, state: HealthState) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new().route("/", get(health)).with_state(state);

    info!("listening on {}", addr);

    if let Err(err) = axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
    {
        error!(%err, "health route stopped");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

pub async fn monitor_wallets() -> Result<()> {
    log::init();

    info!("starting solana wallet notifier");

    let config = get_app_config();
    let notifier = match EmailNotifier::new(&config) {
        Ok(notifier) => notifier,
        Err(err) => {
            error!("invalid smtp config: {}", err);
            std::process::exit(1);
        }
    };
    let fetcher = SolanaRpc::new(config.solana_rpc.clone());
    let store = FileSignatureStore::new(&config.state_dir);

    let reconciler =
        Reconciler::initialize(config.wallet_address.clone(), fetcher, notifier, store)
            .await
            .map_err(|err| {
                error!(%err, "failed to initialize tracking files");
                err
            })?;

    if let Some(port) = config.port {
        let state = HealthState {
            last_cycle: reconciler.last_cycle(),
            max_age: config.poll_interval_seconds * MAX_MISSED_CYCLES,
        };
        tokio::spawn(mount_health_route(port, state));
    }

    reconciler
        .run(config.poll_interval_seconds, shutdown_signal())
        .await;

    info!("solana wallet notifier stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(age: chrono::Duration) -> HealthState {
        HealthState {
            last_cycle: Arc::new(Mutex::new(Utc::now() - age)),
            max_age: Duration::from_secs(90),
        }
    }

    #[tokio::test]
    async fn test_health_is_ok_after_a_recent_cycle() {
        let status = health(State(state(chrono::Duration::seconds(10)))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_is_unavailable_after_missed_cycles() {
        let status = health(State(state(chrono::Duration::seconds(120)))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
