//! Release webhook endpoint.
//!
//! Verifies the signature, records the release as pending and hands it to
//! the watcher. The response never waits for artifacts.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::source::ArtifactSource;
use crate::store::KeyedStore;
use crate::watcher::{WatchError, WatchOutcome};
use crate::webhooks::{ReleaseEvent, SIGNATURE_HEADER, SignatureError};

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::InvalidSignature(_) => StatusCode::FORBIDDEN,
            // Ask the sender to redeliver once the store is back.
            WebhookError::Watch(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            WebhookError::Watch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "success": false }))).into_response()
    }
}

/// Webhook handler.
///
/// # Response
///
/// - 200 OK `{"success": true}`: signature valid, whatever the body held
/// - 403 Forbidden `{"success": false}`: signature missing or wrong
/// - 503 Service Unavailable `{"success": false}`: store unreachable
pub async fn webhook_handler<S: KeyedStore, A: ArtifactSource>(
    State(app_state): State<AppState<S, A>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = app_state.webhook_secret().verify(&body, signature) {
        warn!(error = %e, "rejecting webhook");
        return Err(e.into());
    }

    if let Some(path) = app_state.webhook_log() {
        append_to_log(path, &body);
    }

    let event = match ReleaseEvent::parse(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "ignoring unparsable webhook body");
            return Ok(success());
        }
    };
    let Some(id) = event.release_id() else {
        debug!(action = ?event.action, "webhook without release id");
        return Ok(success());
    };

    info!(
        release_id = %id,
        action = ?event.action,
        name = ?event.release.as_ref().and_then(|r| r.name.as_deref()),
        repository = event.repository_name(),
        "release webhook"
    );

    let watcher = app_state.watcher();
    watcher.register(id).await?;
    // Also covers a redelivery after registration succeeded but the claim
    // did not. For a release that is watched or finalized this is a no-op.
    if watcher.watch(id, watcher.config().initial_delay).await? == WatchOutcome::AlreadyClaimed {
        debug!(release_id = %id, "release already watched");
    }

    Ok(success())
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

fn append_to_log(path: &Path, body: &[u8]) {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| {
            file.write_all(body)?;
            file.write_all(b"\n")
        });
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "cannot append to webhook log");
    }
}
