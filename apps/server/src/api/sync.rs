use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_core::stream::Stream;
use serde::Serialize;
use serde_json::json;
use tenderdesk_core::sync::{NewMutation, QueuedMutation, SyncSummary};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::{
    error::{ApiError, ApiResult},
    events::{ServerEvent, MUTATION_QUEUED},
    main_lib::AppState,
    sync_events::{run_sync_pass, SyncRequest},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncStatusResponse {
    pending: Vec<QueuedMutation>,
    dead_letters: Vec<QueuedMutation>,
    is_syncing: bool,
    last_summary: Option<SyncSummary>,
}

#[derive(Serialize)]
struct RetryResponse {
    requeued: usize,
}

async fn enqueue_mutation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewMutation>,
) -> ApiResult<(StatusCode, Json<QueuedMutation>)> {
    if payload.entity.trim().is_empty() {
        return Err(ApiError::BadRequest("entity must not be empty".to_string()));
    }
    let queued = state.sync.queue.enqueue(payload)?;
    tracing::debug!(
        "Queued {:?} mutation {} on {}",
        queued.operation,
        queued.id,
        queued.entity
    );

    state.event_bus.publish(ServerEvent::with_payload(
        MUTATION_QUEUED,
        json!({ "id": queued.id, "entity": queued.entity }),
    ));
    state.sync_requests.request(SyncRequest::MutationQueued);
    Ok((StatusCode::ACCEPTED, Json(queued)))
}

async fn sync_status(State(state): State<Arc<AppState>>) -> Json<SyncStatusResponse> {
    let queue = &state.sync.queue;
    Json(SyncStatusResponse {
        pending: queue.pending(),
        dead_letters: queue.dead_letters(),
        is_syncing: queue.is_syncing(),
        last_summary: queue.last_summary(),
    })
}

/// Background-sync signal; bursts collapse into one pass.
async fn request_sync(State(state): State<Arc<AppState>>) -> StatusCode {
    state.sync_requests.request(SyncRequest::Manual);
    StatusCode::ACCEPTED
}

async fn flush_sync(State(state): State<Arc<AppState>>) -> ApiResult<Json<SyncSummary>> {
    let summary = run_sync_pass(&state.sync).await?;
    Ok(Json(summary))
}

async fn retry_dead_letters(State(state): State<Arc<AppState>>) -> ApiResult<Json<RetryResponse>> {
    let requeued = state.sync.queue.retry_dead_letters()?;
    if requeued > 0 {
        tracing::info!("Requeued {} dead-lettered mutation(s)", requeued);
        state.sync_requests.request(SyncRequest::Manual);
    }
    Ok(Json(RetryResponse { requeued }))
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = BroadcastStream::new(state.event_bus.subscribe());
    let stream = tokio_stream::StreamExt::filter_map(receiver, |event| match event {
        Ok(evt) => {
            let sse_event = SseEvent::default().event(evt.name);
            let sse_event = match evt.payload {
                Some(payload) => match sse_event.json_data(payload) {
                    Ok(ev) => ev,
                    Err(err) => {
                        tracing::error!("Failed to serialize SSE payload for {}: {}", evt.name, err);
                        return None;
                    }
                },
                None => sse_event.data("null"),
            };
            Some(Ok(sse_event))
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!("SSE client lagged, skipped {} event(s)", skipped);
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync/mutations", post(enqueue_mutation))
        .route("/sync/status", get(sync_status))
        .route("/sync/request", post(request_sync))
        .route("/sync/flush", post(flush_sync))
        .route("/sync/dead-letters/retry", post(retry_dead_letters))
        .route("/events/stream", get(stream_events))
}
