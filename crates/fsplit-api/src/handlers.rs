//! Request handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use fsplit_pipeline::{Outcome, PipelineError};

use crate::state::AppState;

/// SNS message-type header set by the relay.
const SNS_MESSAGE_TYPE: &str = "x-amz-sns-message-type";

/// Response body for the split endpoint.
#[derive(Debug, Serialize)]
pub struct SplitResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SplitResponse {
    fn message(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            frames: None,
            detail: None,
        }
    }
}

/// Split a newly uploaded video into frames.
///
/// The body is the notification envelope. Status mapping is the
/// redelivery contract: 200 acknowledges (relay stops), 503 requests
/// redelivery. Malformed notifications are acknowledged so they do not
/// redeliver forever, but logged loudly.
pub async fn split(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Subscription handshake requests never reach the pipeline.
    if header_is(&headers, SNS_MESSAGE_TYPE, "SubscriptionConfirmation") {
        return confirm_subscription(&state, &body).await;
    }

    let outcome = state.pipeline.run(&body).await;

    match &outcome {
        Outcome::Success { frames } => {
            state.no_frames_alert.record_success();
            info!("Split complete: {} frames", frames);
        }
        Outcome::Failure(PipelineError::NoFrames) => {
            if state.no_frames_alert.record_occurrence() {
                error!("Repeated zero-frame extractions; decoder or upstream defect likely");
            } else {
                warn!("Video produced no frames");
            }
        }
        Outcome::Failure(PipelineError::InvalidNotification(e)) => {
            error!("Dropping malformed notification: {}", e);
        }
        Outcome::PartialFailure {
            frames_written,
            error,
        } => {
            warn!("Partial failure after {} frames: {}", frames_written, error);
        }
        Outcome::Failure(e) => {
            warn!("Split failed: {}", e);
        }
    }

    outcome_response(outcome).into_response()
}

/// Map a pipeline outcome to transport status and body.
fn outcome_response(outcome: Outcome) -> (StatusCode, Json<SplitResponse>) {
    match outcome {
        Outcome::Success { frames } => (
            StatusCode::OK,
            Json(SplitResponse {
                message: "split complete".to_string(),
                frames: Some(frames),
                detail: None,
            }),
        ),
        Outcome::Failure(PipelineError::InvalidNotification(e)) => (
            // acknowledged so the relay stops redelivering garbage
            StatusCode::OK,
            Json(SplitResponse {
                message: "notification ignored".to_string(),
                frames: None,
                detail: Some(e.to_string()),
            }),
        ),
        Outcome::PartialFailure {
            frames_written,
            error,
        } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SplitResponse {
                message: "split incomplete, redelivery requested".to_string(),
                frames: Some(frames_written),
                detail: Some(error.to_string()),
            }),
        ),
        Outcome::Failure(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SplitResponse {
                message: "split failed, redelivery requested".to_string(),
                frames: None,
                detail: Some(e.to_string()),
            }),
        ),
    }
}

/// SNS subscription confirmation payload.
#[derive(Debug, Deserialize)]
struct SubscriptionConfirmation {
    #[serde(rename = "SubscribeURL")]
    subscribe_url: String,
}

/// Confirm an SNS subscription by visiting its SubscribeURL.
async fn confirm_subscription(state: &AppState, body: &[u8]) -> Response {
    let confirmation: SubscriptionConfirmation = match serde_json::from_slice(body) {
        Ok(c) => c,
        Err(e) => {
            warn!("Malformed subscription confirmation: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(SplitResponse::message("malformed subscription confirmation")),
            )
                .into_response();
        }
    };

    info!("Confirming subscription via {}", confirmation.subscribe_url);

    match state.http.get(&confirmation.subscribe_url).send().await {
        Ok(response) if response.status().is_success() => (
            StatusCode::OK,
            Json(SplitResponse::message("subscription confirmed")),
        )
            .into_response(),
        Ok(response) => {
            warn!("Subscription confirmation returned {}", response.status());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SplitResponse::message("subscription confirmation failed")),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Subscription confirmation request failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SplitResponse::message("subscription confirmation failed")),
            )
                .into_response()
        }
    }
}

fn header_is(headers: &HeaderMap, name: &str, value: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == value)
        .unwrap_or(false)
}

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsplit_pipeline::NotificationError;

    #[test]
    fn test_success_maps_to_ok() {
        let (status, Json(body)) = outcome_response(Outcome::Success { frames: 3 });
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.frames, Some(3));
    }

    #[test]
    fn test_invalid_notification_is_acknowledged() {
        let outcome = Outcome::Failure(PipelineError::InvalidNotification(
            NotificationError::EmptyBatch,
        ));
        let (status, Json(body)) = outcome_response(outcome);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.message, "notification ignored");
    }

    #[test]
    fn test_failures_request_redelivery() {
        let (status, _) = outcome_response(Outcome::Failure(PipelineError::NoFrames));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_partial_failure_reports_written_count() {
        let outcome = Outcome::PartialFailure {
            frames_written: 7,
            error: PipelineError::Write(fsplit_storage::StorageError::transient("503")),
        };
        let (status, Json(body)) = outcome_response(outcome);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.frames, Some(7));
    }

    #[test]
    fn test_header_is_case_handling() {
        let mut headers = HeaderMap::new();
        headers.insert(SNS_MESSAGE_TYPE, "SubscriptionConfirmation".parse().unwrap());
        assert!(header_is(&headers, SNS_MESSAGE_TYPE, "SubscriptionConfirmation"));
        assert!(!header_is(&headers, SNS_MESSAGE_TYPE, "Notification"));
    }
}
