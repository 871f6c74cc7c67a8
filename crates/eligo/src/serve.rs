// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `eligo serve` command implementation.
//!
//! Restores active tasks into the polling scheduler, optionally runs the
//! appointment intake loop, sweeps expired rows on a timer, and shuts
//! everything down cleanly on SIGINT or SIGTERM.

use std::time::Duration;

use eligo_config::EligoConfig;
use eligo_core::EligoError;
use eligo_storage::{AppointmentTracker, MetadataStore};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::context::{AppContext, metadata_store};
use crate::shutdown::install_signal_handler;

/// Run the tracker until a shutdown signal arrives.
pub async fn run_serve(config: EligoConfig) -> Result<(), EligoError> {
    init_tracing(&config.service.log_level);
    info!(name = %config.service.name, "starting eligo");

    let ctx = AppContext::open(&config).await?;
    let scheduler = ctx.tracker.scheduler().clone();
    if let Err(err) = scheduler.initialize().await {
        warn!(error = %err, "starting with an empty registry");
    }

    let cancel = install_signal_handler();

    let intake = if config.intake.enabled {
        let checker = ctx.checker(&config);
        let token = cancel.child_token();
        Some(tokio::spawn(async move {
            checker.run_continuous(token).await;
        }))
    } else {
        info!("appointment intake disabled");
        None
    };

    let purge = {
        let metadata = metadata_store(&config, ctx.db.clone());
        let marks = AppointmentTracker::new(ctx.db.clone());
        let period = config.metadata.purge_interval();
        let token = cancel.child_token();
        tokio::spawn(async move {
            purge_loop(metadata, marks, period, token).await;
        })
    };

    info!(
        active = scheduler.active_count(),
        intake = config.intake.enabled,
        "eligo running"
    );
    cancel.cancelled().await;

    info!("shutting down");
    if let Some(handle) = intake
        && let Err(err) = handle.await
    {
        error!(error = %err, "intake task ended abnormally");
    }
    if let Err(err) = purge.await {
        error!(error = %err, "purge task ended abnormally");
    }
    scheduler.shutdown().await;
    info!("eligo stopped");
    Ok(())
}

/// Periodically delete expired metadata and appointment marks.
async fn purge_loop(
    metadata: MetadataStore,
    marks: AppointmentTracker,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period.max(Duration::from_secs(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the first immediate tick.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match metadata.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "purged expired metadata"),
                    Err(err) => warn!(error = %err, "metadata purge failed"),
                }
                match marks.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "purged expired appointment marks"),
                    Err(err) => warn!(error = %err, "appointment mark purge failed"),
                }
            }
            _ = cancel.cancelled() => {
                info!("purge loop shutting down");
                break;
            }
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("eligo={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
