/*!
 * API DE LECTURE NETWATCH - Serveur HTTP du kernel
 *
 * RÔLE :
 * Expose le statut courant de la flotte (calculé par l'agrégateur, servi via le cache).
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, middleware optionnel de clé API
 * - Routes : /health, /system/health, /status
 * - /status renvoie le blob JSON tel quel, ou 500 text/plain avec le message d'erreur
 *
 * SÉCURITÉ :
 * - Si une clé est configurée, header x-api-key obligatoire sauf sur /health
 * - Sans clé configurée, accès libre (déploiement réseau interne)
 */

use crate::health::{HealthTracker, KernelHealth};
use crate::query::StatusService;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<StatusService>,
    pub health_tracker: HealthTracker,
    pub api_key: Option<String>,
}

async fn require_api_key(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    // Health check toujours accessible
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let Some(expected) = app.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    let ok = req.headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        warn!(path = req.uri().path(), "rejected request without valid api key");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/status", get(get_status))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

// GET /status (statut courant par hôte)
async fn get_status(State(app): State<AppState>) -> Response {
    match app.service.get_status().await {
        Ok(blob) => ([(header::CONTENT_TYPE, "application/json")], blob).into_response(),
        Err(e) => {
            error!("status query failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

// GET /system/health (état du kernel)
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{AggregationStrategy, StatusAggregator};
    use crate::cache::MemoryCache;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use netwatch_common::{ConnectionState, StatusRow};
    use netwatch_devkit::{HistoryBuilder, MemoryHistoryStore};
    use tower::ServiceExt;

    fn app_with(store: Arc<MemoryHistoryStore>, api_key: Option<&str>) -> Router {
        let strategy = AggregationStrategy::Windowed;
        let health_tracker = HealthTracker::new(strategy);
        let service = StatusService::new(
            store,
            Arc::new(MemoryCache::new()),
            StatusAggregator::new(strategy),
            health_tracker.clone(),
        );
        build_router(AppState {
            service: Arc::new(service),
            health_tracker,
            api_key: api_key.map(str::to_string),
        })
    }

    fn seeded() -> Arc<MemoryHistoryStore> {
        let rows = HistoryBuilder::new()
            .at("unit-a", 1, ConnectionState::Established)
            .at("unit-b", 2, ConnectionState::NoMaster)
            .build();
        Arc::new(MemoryHistoryStore::with_rows(rows))
    }

    async fn call(app: Router, uri: &str, key: Option<&str>) -> Response {
        let mut req = Request::builder().uri(uri);
        if let Some(key) = key {
            req = req.header("x-api-key", key);
        }
        app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
    }

    async fn body_bytes(resp: Response) -> Vec<u8> {
        resp.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_status_returns_json_rows() {
        let resp = call(app_with(seeded(), None), "/status", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");

        let rows: Vec<StatusRow> = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id_unit, "unit-a");
        assert_eq!(rows[0].status, "ESTABLISHED");
        assert_eq!(rows[0].foreign_address, "10.0.0.9:7000-master");
        assert_eq!(rows[0].date_time, "2024-01-01 00:00:01");
        assert_eq!(rows[1].status, "no master peer detected");
        assert_eq!(rows[1].foreign_address, "");
    }

    #[tokio::test]
    async fn test_status_failure_is_plain_text_500() {
        let store = seeded();
        store.fail_reads(true);
        let resp = call(app_with(store, None), "/status", None).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));
        let body = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(body.contains("history query failed"));
    }

    #[tokio::test]
    async fn test_empty_history_is_empty_array() {
        let resp = call(app_with(Arc::new(MemoryHistoryStore::new()), None), "/status", None).await;
        assert_eq!(body_bytes(resp).await, b"[]");
    }

    #[tokio::test]
    async fn test_api_key_guards_everything_but_health() {
        let app = app_with(seeded(), Some("s3cret"));

        assert_eq!(call(app.clone(), "/health", None).await.status(), StatusCode::OK);
        assert_eq!(call(app.clone(), "/status", None).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(call(app.clone(), "/status", Some("wrong")).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(call(app.clone(), "/system/health", None).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(call(app, "/status", Some("s3cret")).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_system_health_reports_cache_activity() {
        let app = app_with(seeded(), None);
        call(app.clone(), "/status", None).await;
        call(app.clone(), "/status", None).await;

        let resp = call(app, "/system/health", None).await;
        let health: KernelHealth = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(health.cache_misses, 1);
        assert_eq!(health.cache_hits, 1);
        assert_eq!(health.strategy, "windowed");
    }
}
