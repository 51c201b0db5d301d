//! Error taxonomy for search and bookmarks, plus the HTTP mapping.
//!
//! - `ProviderError` (in `providers`): one adapter failed; tolerated.
//! - `SearchError::AllSourcesFailed`: every enabled adapter failed.
//! - `ValidationError`: rejected before any network call.
//! - `PersistenceError` (in `bookmarks`): bookmark CRUD failure.
//!
//! Every non-2xx HTTP response carries `{"message": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::bookmarks::PersistenceError;
use crate::providers::ProviderError;
use crate::query::SearchGroup;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("no providers enabled for {0}")]
    NoProvidersEnabled(SearchGroup),
    #[error("unknown search group '{0}'")]
    UnknownGroup(String),
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("unknown time range '{0}' (expected all, 1month, 3months, 6months, 1year)")]
    UnknownTimeRange(String),
    #[error("unknown source filter '{0}' (expected all, multi or a provider name)")]
    UnknownFilter(String),
    #[error("unknown sort '{0}' (expected relevance or score)")]
    UnknownSort(String),
    #[error("unsupported export format '{0}' (expected csv or json)")]
    UnsupportedExportFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("all sources failed: {}", join_failures(.failures))]
    AllSourcesFailed { failures: Vec<ProviderError> },
}

fn join_failures(failures: &[ProviderError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    MethodNotAllowed(String),
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Search(SearchError::Validation(_)) | ApiError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "validation")
            }
            ApiError::Search(SearchError::AllSourcesFailed { .. }) => {
                (StatusCode::BAD_GATEWAY, "all_sources_failed")
            }
            ApiError::Persistence(PersistenceError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "persistence")
            }
            ApiError::Persistence(PersistenceError::Invalid(_)) => {
                (StatusCode::BAD_REQUEST, "persistence")
            }
            ApiError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "persistence"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::warn!(error = %self, %status, "request failed");
        }
        let body = json!({ "message": self.to_string(), "error": kind });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderTag;

    #[test]
    fn all_sources_failed_message_lists_each_provider() {
        let err = SearchError::AllSourcesFailed {
            failures: vec![
                ProviderError::Status {
                    provider: ProviderTag::Bing,
                    status: 401,
                    message: "Access denied".into(),
                },
                ProviderError::Transport {
                    provider: ProviderTag::Google,
                    message: "timed out".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("all sources failed: "));
        assert!(msg.contains("bing returned HTTP 401: Access denied"));
        assert!(msg.contains("google request failed: timed out"));
    }

    #[test]
    fn status_codes_distinguish_failure_kinds() {
        let v = ApiError::from(SearchError::from(ValidationError::EmptyQuery));
        assert_eq!(v.status_and_kind().0, StatusCode::BAD_REQUEST);

        let all = ApiError::from(SearchError::AllSourcesFailed { failures: vec![] });
        assert_eq!(all.status_and_kind().0, StatusCode::BAD_GATEWAY);

        let nf = ApiError::from(PersistenceError::NotFound("x".into()));
        assert_eq!(nf.status_and_kind().0, StatusCode::NOT_FOUND);

        let route = ApiError::NotFound("no route for /x".into());
        assert_eq!(route.status_and_kind(), (StatusCode::NOT_FOUND, "not_found"));
        let method = ApiError::MethodNotAllowed("PUT not allowed on /health".into());
        assert_eq!(method.status_and_kind().0, StatusCode::METHOD_NOT_ALLOWED);
    }
}
