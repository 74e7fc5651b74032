//! Administrative routes.
//!
//! A thin router the host mounts under its admin surface: one route to
//! rebuild the dependency index (returning how many entities were
//! indexed), one to flush a named cache partition.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use tracing::error;

use crate::cache::FragmentCache;

#[derive(Clone)]
pub struct AdminState {
    pub cache: Arc<FragmentCache>,
}

/// Build the admin router. Mount under an authenticated scope; these
/// routes do no access control of their own.
pub fn router(cache: Arc<FragmentCache>) -> Router {
    Router::new()
        .route("/cache/index", post(rebuild_index))
        .route("/cache/clear/{partition}", post(clear_partition))
        .with_state(AdminState { cache })
}

#[derive(Serialize)]
struct RebuildResponse {
    count: usize,
}

#[derive(Serialize)]
struct ClearResponse {
    success: bool,
}

async fn rebuild_index(State(state): State<AdminState>) -> Response {
    match state.cache.rebuild_index() {
        Ok(count) => Json(RebuildResponse { count }).into_response(),
        Err(err) => {
            error!(error = %err, "Index rebuild failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn clear_partition(
    State(state): State<AdminState>,
    Path(partition): Path<String>,
) -> Response {
    let success = state.cache.flush_partition(&partition);
    Json(ClearResponse { success }).into_response()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::config::CacheConfig;
    use crate::host::{EntityRecord, Host, Timestamp};

    use super::*;

    struct AdminHost;

    impl Host for AdminHost {
        fn all_entities(&self) -> Vec<EntityRecord> {
            vec![
                EntityRecord::new("a", "p/a", "article", 100),
                EntityRecord::new("b", "p/b", "note", 200),
                EntityRecord::new("c", "p/c", "note", 300),
            ]
        }
        fn site_modified(&self) -> Timestamp {
            300
        }
        fn collection_latest(&self, _name: &str) -> Option<EntityRecord> {
            None
        }
        fn collection_contains(&self, _name: &str, _entity: &EntityRecord) -> bool {
            false
        }
        fn template_path(&self, _name: &str) -> Option<PathBuf> {
            None
        }
        fn snippet_path(&self, _name: &str) -> Option<PathBuf> {
            None
        }
    }

    fn test_router() -> Router {
        let cache = Arc::new(FragmentCache::in_memory(
            CacheConfig::default(),
            Arc::new(AdminHost),
        ));
        router(cache)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn rebuild_returns_entity_count() {
        let response = test_router()
            .oneshot(
                Request::post("/cache/index")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "count": 3 }));
    }

    #[tokio::test]
    async fn clear_known_partition_succeeds() {
        let response = test_router()
            .oneshot(
                Request::post("/cache/clear/files")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "success": true }));
    }

    #[tokio::test]
    async fn clear_unknown_partition_reports_false() {
        let response = test_router()
            .oneshot(
                Request::post("/cache/clear/bogus")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "success": false }));
    }
}
