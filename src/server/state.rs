//! Site state endpoint for the rendering layer.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

use super::AppState;
use crate::cells::CellError;
use crate::site::SiteState;
use crate::source::ArtifactSource;
use crate::store::KeyedStore;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot read site cells: {0}")]
    Cells(#[from] CellError),
}

impl IntoResponse for StateError {
    fn into_response(self) -> Response {
        let status = match &self {
            StateError::Cells(CellError::Store(_)) => StatusCode::SERVICE_UNAVAILABLE,
            StateError::Cells(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Returns the current [`SiteState`] as JSON.
///
/// ```ignore
/// GET /api/v1/site-state HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: application/json
///
/// {
///   "latest": {"version": "6.0.5217", "date": "2024-03-02", "links": {...}},
///   "current": {"version": "6.0.5054", "date": "2024-01-13", "links": {...}},
///   "pr_summary": "<li>...</li>",
///   "pending_releases": []
/// }
/// ```
pub async fn site_state_handler<S: KeyedStore, A: ArtifactSource>(
    State(app_state): State<AppState<S, A>>,
) -> Result<Json<SiteState>, StateError> {
    let watcher = app_state.watcher();
    SiteState::load(watcher.cells(), &watcher.config().repo)
        .await
        .map(Json)
        .map_err(|e| {
            warn!(error = %e, "cannot load site state");
            StateError::from(e)
        })
}
