//! Background workers.
//!
//! An owned component with injected market clients and an explicit
//! lifecycle: [`Jobs::start`] spawns the interval loops, and the daemon's
//! shutdown broadcast stops them. Both jobs are fire-and-forget; a failed
//! pass is logged and leaves stored state unchanged.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use idopad_commission::scan;
use idopad_oracle::{refresh, ChainReader, PriceOracle};

use crate::DaemonState;

/// Handles of the spawned background loops.
pub struct Jobs {
    handles: Vec<JoinHandle<()>>,
}

impl Jobs {
    /// Spawn the price-poll and wallet-scan loops per the configuration.
    pub fn start(
        state: Arc<DaemonState>,
        oracle: Arc<dyn PriceOracle>,
        chain: Arc<dyn ChainReader>,
    ) -> Self {
        let mut handles = Vec::new();

        if state.config.jobs.price_poll_enabled {
            let state = state.clone();
            let secs = state.config.jobs.price_poll_secs.max(1);
            handles.push(tokio::spawn(async move {
                let mut shutdown = state.shutdown_tx.subscribe();
                let mut ticker = tokio::time::interval(std::time::Duration::from_secs(secs));
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            run_price_poll(&state, oracle.as_ref()).await;
                        }
                        _ = shutdown.recv() => {
                            info!("price poll loop stopping");
                            break;
                        }
                    }
                }
            }));
        }

        if state.config.jobs.wallet_scan_enabled {
            let state = state.clone();
            let secs = state.config.jobs.wallet_scan_secs.max(1);
            handles.push(tokio::spawn(async move {
                let mut shutdown = state.shutdown_tx.subscribe();
                let mut ticker = tokio::time::interval(std::time::Duration::from_secs(secs));
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            run_wallet_scan(&state, chain.as_ref()).await;
                        }
                        _ = shutdown.recv() => {
                            info!("wallet scan loop stopping");
                            break;
                        }
                    }
                }
            }));
        }

        Self { handles }
    }

    /// Wait for the loops to observe the shutdown signal.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn run_price_poll(state: &Arc<DaemonState>, oracle: &dyn PriceOracle) {
    let db = state.db.lock().await;
    match refresh::refresh_prices(&db, oracle, idopad_types::clock::now()) {
        Ok(summary) => {
            if summary.updated > 0 {
                state.event_bus.emit(
                    "PricesRefreshed",
                    serde_json::json!({
                        "updated": summary.updated,
                        "skipped": summary.skipped,
                    }),
                );
            }
        }
        Err(e) => warn!(error = %e, "price poll failed"),
    }
}

async fn run_wallet_scan(state: &Arc<DaemonState>, chain: &dyn ChainReader) {
    let mut db = state.db.lock().await;
    let result = (|| -> Result<scan::ScanSummary, anyhow::Error> {
        let tx = db.transaction()?;
        let summary = scan::scan_wallets(&tx, chain, idopad_types::clock::now())?;
        tx.commit()?;
        Ok(summary)
    })();

    match result {
        Ok(summary) => {
            if summary.wallets_filled > 0 {
                state.event_bus.emit(
                    "WalletScanCompleted",
                    serde_json::json!({
                        "wallets_filled": summary.wallets_filled,
                        "payouts": summary.payouts,
                    }),
                );
            }
        }
        Err(e) => warn!(error = %e, "wallet scan failed"),
    }
}
