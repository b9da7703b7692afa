// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `serve` subcommand: component wiring and the engine lifecycle.
//!
//! Startup order matters: storage first (with crash recovery), then
//! connectors, then the router/processor/scheduler trio, then dispatch
//! workers, and the gateway last so no webhook is accepted before the
//! engine can process it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use handover_channel::{BusinessConnector, ChannelSender, SocialConnector, WidgetConnector};
use handover_config::HandoverConfig;
use handover_core::{AutomatedAgent, HandoffStore, HandoverError};
use handover_gateway::start_server;
use handover_manager::CommandProcessor;
use handover_router::{HandoffRouter, HttpAutomatedAgent};
use handover_store::SqliteStore;
use handover_verify::VerificationScheduler;

use crate::dispatch::{self, Dispatcher};

/// How many validated webhook deliveries may queue between the gateway and
/// the dispatch workers before the gateway sheds load with 503s.
const WEBHOOK_QUEUE_DEPTH: usize = 256;

/// Run the engine until a shutdown signal arrives.
pub async fn run_serve(config: HandoverConfig) -> Result<(), HandoverError> {
    init_tracing(&config.engine.log_level);
    info!(
        name = config.engine.name.as_str(),
        workers = config.engine.workers,
        "starting handover engine"
    );

    // Storage, plus crash recovery for state a dead process left behind.
    let store = SqliteStore::new(config.store.clone());
    store.initialize().await?;
    let store: Arc<dyn HandoffStore> = Arc::new(store);

    let cleared = store.clear_expired_locks().await?;
    if cleared > 0 {
        info!(cleared, "expired operator locks cleared at startup");
    }
    let swept = store
        .reset_stale_verifications("verification interrupted by restart")
        .await?;
    if swept > 0 {
        warn!(swept, "stale credential verifications marked failed; retrigger to verify");
    }

    // Channel connectors. The widget is first-party and always on; the
    // external providers are enabled by configuring an API base.
    let mut sender = ChannelSender::new(config.delivery.clone());
    sender.register(Arc::new(WidgetConnector::new()));
    if config.business.api_base.is_some() {
        sender.register(Arc::new(BusinessConnector::new(
            &config.business,
            &config.delivery,
        )?));
        info!("business-messaging connector registered");
    } else {
        info!("business-messaging channel disabled (no business.api_base configured)");
    }
    if config.social.api_base.is_some() {
        sender.register(Arc::new(SocialConnector::new(
            &config.social,
            &config.delivery,
        )?));
        info!("social-dm connector registered");
    } else {
        info!("social-dm channel disabled (no social.api_base configured)");
    }
    let sender = Arc::new(sender);

    let agent: Option<Arc<dyn AutomatedAgent>> = if config.routing.agent_endpoint.is_some() {
        Some(Arc::new(HttpAutomatedAgent::new(&config.routing)?))
    } else {
        warn!("no routing.agent_endpoint configured; every inbound message hands off to a human");
        None
    };

    let router = Arc::new(HandoffRouter::new(
        store.clone(),
        agent,
        config.routing.clone(),
    ));
    let processor = Arc::new(CommandProcessor::new(store.clone()));
    let scheduler = Arc::new(VerificationScheduler::new(
        store.clone(),
        sender.clone(),
        config.verification.clone(),
    ));

    let (webhook_tx, webhook_rx) = mpsc::channel(WEBHOOK_QUEUE_DEPTH);
    let cancel = install_signal_handler();

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        router,
        processor,
        sender.clone(),
    ));
    let dispatch_handle = dispatch::spawn(
        dispatcher,
        config.engine.workers,
        webhook_rx,
        cancel.clone(),
    );

    let lock_ttl = Duration::from_secs(config.engine.lock_ttl_secs);
    tokio::select! {
        result = start_server(
            &config.gateway,
            &config.business,
            &config.social,
            lock_ttl,
            store,
            sender,
            scheduler,
            webhook_tx,
        ) => {
            result?;
        }
        _ = cancel.cancelled() => {
            info!("shutdown signal received, stopping gateway");
        }
    }

    // Dropping the select arm closed the webhook channel; give the workers
    // a bounded window to drain what they already accepted.
    if tokio::time::timeout(Duration::from_secs(5), dispatch_handle)
        .await
        .is_err()
    {
        warn!("dispatch workers did not drain in time, exiting anyway");
    }
    info!("handover engine stopped");
    Ok(())
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] cancelled when either signal arrives.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("handover={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
