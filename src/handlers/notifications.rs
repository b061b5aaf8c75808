use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::require_session;
use crate::models::Notification;
use crate::services::auth::resolve_session;
use crate::state::AppState;

// GET /api/notifications
#[derive(Deserialize)]
pub struct NotificationsQuery {
    pub limit: Option<i64>,
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let session = require_session(&state, &headers)?;
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let db = state.db();
    Ok(Json(queries::get_notifications(&db, &session.user_id, limit)?))
}

// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = require_session(&state, &headers)?;
    let db = state.db();
    if queries::mark_notification_read(&db, &session.user_id, id)? {
        Ok(Json(serde_json::json!({"ok": true})))
    } else {
        Err(AppError::NotFound("notification not found".to_string()))
    }
}

// GET /api/notifications/events (SSE)
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
    pub last_id: Option<i64>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Auth via query param (EventSource can't set headers)
    let token = query.token.as_deref().unwrap_or("");
    let last_id = query.last_id.unwrap_or(0);

    // Subscribe before the catch-up read so nothing falls between the two
    let rx = state.notify_tx.subscribe();

    let (session, catchup_events) = {
        let db = state.db();
        let session = resolve_session(&db, &state.config, token)?;
        let events = queries::get_notifications_since(&db, &session.user_id, last_id)?;
        (session, events)
    };

    let user_id = session.user_id;
    let seen = catchup_events.last().map(|n| n.id).unwrap_or(last_id);

    let catchup_stream = tokio_stream::iter(catchup_events.into_iter().map(|n| {
        let data = serde_json::to_string(&n).unwrap_or_default();
        Ok::<_, Infallible>(Event::default().data(data).event("notification"))
    }));

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(n) if n.user_id == user_id && n.id > seen => {
            let data = serde_json::to_string(&n).unwrap_or_default();
            Some(Ok(Event::default().data(data).event("notification")))
        }
        Ok(_) => None,
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "notification stream lagged");
            None
        }
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    let combined = catchup_stream.chain(live_stream);
    let merged = StreamExt::merge(combined, keepalive_stream);

    Ok(Sse::new(merged))
}
