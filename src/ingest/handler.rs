use crate::app::AppState;
use crate::error::ApiError;
use crate::ingest::types::{MetricDocument, StatusBody};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use time::OffsetDateTime;

fn validate_fields(doc: &MetricDocument, max_fields: usize) -> Result<(), ApiError> {
    if doc.field_count() > max_fields {
        return Err(ApiError::PayloadTooLarge);
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Process is up", body = StatusBody))
)]
pub async fn health() -> (StatusCode, Json<StatusBody>) {
    (StatusCode::OK, Json(StatusBody::new("ok")))
}

#[utoipa::path(
    post,
    path = "/metrics/",
    responses(
        (status = 201, description = "Document stored", body = StatusBody),
        (status = 400, description = "Invalid JSON or too many fields", body = crate::ingest::types::ErrorBody),
        (status = 500, description = "Store failure", body = crate::ingest::types::ErrorBody)
    )
)]
pub async fn ingest(
    State(st): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<StatusBody>), ApiError> {
    let parsed = MetricDocument::parse(&body)
        .and_then(|doc| validate_fields(&doc, st.cfg.ingest.max_fields).map(|_| doc));
    let mut doc = match parsed {
        Ok(doc) => doc,
        Err(err) => {
            let reason = match err {
                ApiError::PayloadTooLarge => "too_many_fields",
                _ => "invalid_json",
            };
            st.metrics.ingest_rejected_total(reason);
            return Err(err);
        }
    };

    let now = OffsetDateTime::now_utc();
    doc.stamp(now)
        .map_err(|e| ApiError::Internal(format!("timestamp: {e}")))?;

    if let Err(e) = st.store.insert(&doc, now).await {
        st.metrics.ingest_failed_total();
        return Err(ApiError::Internal(e.to_string()));
    }

    st.metrics.ingest_accepted_total();
    tracing::debug!(fields = doc.field_count(), "metrics stored");
    Ok((StatusCode::CREATED, Json(StatusBody::new("metrics stored"))))
}

#[utoipa::path(
    get,
    path = "/metrics/latest",
    responses(
        (
            status = 200,
            description = "Most recent document, internal id omitted. `timestamp` is an RFC 3339 UTC string, not an HTTP-date"
        ),
        (status = 404, description = "Collection is empty", body = crate::ingest::types::MessageBody),
        (status = 500, description = "Store failure", body = crate::ingest::types::ErrorBody)
    )
)]
pub async fn latest(State(st): State<AppState>) -> Result<Json<MetricDocument>, ApiError> {
    match st.store.latest().await {
        Ok(Some(doc)) => {
            st.metrics.latest_queries_total("found");
            Ok(Json(doc))
        }
        Ok(None) => {
            st.metrics.latest_queries_total("empty");
            Err(ApiError::NotFound)
        }
        Err(e) => {
            st.metrics.latest_queries_total("error");
            Err(ApiError::Database(e))
        }
    }
}
