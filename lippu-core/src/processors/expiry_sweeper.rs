//! ExpirySweeper processor.
//!
//! The ExpirySweeper is responsible for:
//! - Waking on a fixed interval
//! - Expiring open orders older than the configured timeout
//! - Shutting down cleanly when the server stops
//!
//! Late payment notifications for an order it expired are harmless: the
//! paid transition's guard rejects them because the order is no longer
//! open.

use crate::checkout::lifecycle::expire_stale;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{error, info};

/// Background sweep closing stale open orders.
pub struct ExpirySweeper {
    pool: PgPool,
    order_timeout: time::Duration,
    sweep_interval: std::time::Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl ExpirySweeper {
    pub fn new(
        pool: PgPool,
        order_timeout: time::Duration,
        sweep_interval: std::time::Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            pool,
            order_timeout,
            sweep_interval,
            shutdown_rx,
        }
    }

    /// Run until the shutdown signal flips.
    pub async fn run(mut self) {
        info!(
            order_timeout_minutes = self.order_timeout.whole_minutes(),
            sweep_interval_secs = self.sweep_interval.as_secs(),
            "ExpirySweeper started"
        );

        let mut interval = tokio::time::interval(self.sweep_interval);
        // The first tick fires immediately; that is fine, a sweep at
        // startup catches orders left over from before a restart.
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("ExpirySweeper received shutdown signal");
                        break;
                    }
                }

                _ = interval.tick() => {
                    match expire_stale(
                        &self.pool,
                        time::OffsetDateTime::now_utc(),
                        self.order_timeout,
                    )
                    .await
                    {
                        Ok(0) => {}
                        Ok(expired) => info!(expired, "expiry sweep closed stale orders"),
                        Err(e) => error!(error = %e, "expiry sweep failed"),
                    }
                }
            }
        }

        info!("ExpirySweeper shutdown complete");
    }
}
