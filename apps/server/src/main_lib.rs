use std::sync::Arc;

use tenderdesk_core::{
    health::{ConfigLookup, EnvLookup, HealthService},
    sync::{MutationTransport, SyncQueue, SyncQueueConfig},
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{
    auth::AuthManager,
    config::Config,
    events::EventBus,
    sync_events::{SyncRequestSink, SyncWorkerDeps},
    transport::{HttpMutationTransport, OfflineTransport},
};

pub struct AppState {
    pub auth: Option<Arc<AuthManager>>,
    pub health_service: Arc<HealthService>,
    /// Where the health check looks up required keys.
    pub config_lookup: Arc<dyn ConfigLookup>,
    pub sync: Arc<SyncWorkerDeps>,
    pub sync_requests: Arc<SyncRequestSink>,
    pub event_bus: EventBus,
}

pub fn init_tracing() {
    let log_format = std::env::var("TD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    build_state_with_lookup(config, Arc::new(EnvLookup)).await
}

pub async fn build_state_with_lookup(
    config: &Config,
    config_lookup: Arc<dyn ConfigLookup>,
) -> anyhow::Result<Arc<AppState>> {
    let queue_config = SyncQueueConfig {
        max_attempts: config.sync_max_attempts,
    };
    let queue = match &config.sync_queue_path {
        Some(path) => {
            tracing::info!("Sync queue file: {}", path.display());
            SyncQueue::open(path, queue_config)?
        }
        None => {
            tracing::warn!("TD_SYNC_QUEUE_PATH not set; queued mutations are kept in memory only");
            SyncQueue::new(queue_config)
        }
    };
    let queue = Arc::new(queue);

    let transport: Arc<dyn MutationTransport> = match &config.upstream_url {
        Some(url) => {
            tracing::info!("Sync upstream: {}", url);
            Arc::new(HttpMutationTransport::new(url)?)
        }
        None => {
            tracing::warn!("TD_UPSTREAM_URL not set; sync stays offline");
            Arc::new(OfflineTransport)
        }
    };

    let event_bus = EventBus::new(256);

    let sync_requests = Arc::new(SyncRequestSink::new());
    let sync = Arc::new(SyncWorkerDeps {
        queue: queue.clone(),
        transport,
        event_bus: event_bus.clone(),
    });
    sync_requests.start_worker(sync.clone(), config.sync_debounce);

    if !queue.is_empty() {
        tracing::info!("{} mutation(s) left from a previous run", queue.len());
        sync_requests.request(crate::sync_events::SyncRequest::Manual);
    }

    let auth_manager = config
        .auth
        .as_ref()
        .map(AuthManager::new)
        .transpose()?
        .map(Arc::new);
    if auth_manager.is_none() {
        tracing::warn!("TD_JWT_SECRET not set; the API is unauthenticated");
    }

    let health_service = Arc::new(HealthService::new(config.required_keys.iter()));

    Ok(Arc::new(AppState {
        auth: auth_manager,
        health_service,
        config_lookup,
        sync,
        sync_requests,
        event_bus,
    }))
}
