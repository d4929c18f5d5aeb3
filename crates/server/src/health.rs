use atlas_agent::AgentRuntime;
use atlas_core::errors::truncate_for_log;
use atlas_db::{ping, DbPool};
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    runtime: AgentRuntime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub checked_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub vector_store: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, runtime: AgentRuntime) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .with_state(HealthState { db_pool, runtime })
}

pub async fn health() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "ok", checked_at: Utc::now().to_rfc3339() })
}

pub async fn readiness(State(state): State<HealthState>) -> (StatusCode, Json<ReadinessResponse>) {
    let database = match ping(&state.db_pool).await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => degraded("database", error.to_string()),
    };
    let vector_store = match state.runtime.vector_heartbeat().await {
        Ok(()) => HealthCheck { status: "ready", detail: "vector store heartbeat succeeded".to_string() },
        Err(error) => degraded("vector_store", error.to_string()),
    };
    let ready = database.status == "ready" && vector_store.status == "ready";

    let payload = ReadinessResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        vector_store,
        checked_at: Utc::now().to_rfc3339(),
    };
    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn degraded(dependency: &'static str, error: String) -> HealthCheck {
    let error = truncate_for_log(&error, 200);
    warn!(event_name = "system.health.degraded", dependency, error = %error, "readiness check failed");
    HealthCheck { status: "degraded", detail: error }
}

#[cfg(test)]
mod tests {
    use atlas_agent::AgentRuntime;
    use atlas_core::config::AppConfig;
    use atlas_db::connect_with_settings;
    use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

    use crate::health::{health, readiness, HealthState};

    async fn heartbeat_server() -> String {
        let app = Router::new()
            .route("/api/v1/heartbeat", get(|| async { Json(serde_json::json!({ "nanosecond heartbeat": 1 })) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{address}")
    }

    async fn state(vector_base_url: String, close_pool: bool) -> HealthState {
        let db_pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        let mut config = AppConfig::default();
        config.vector.base_url = vector_base_url;
        config.vector.timeout_secs = 2;
        let runtime = AgentRuntime::from_config(&config, db_pool.clone()).expect("runtime");
        if close_pool {
            db_pool.close().await;
        }
        HealthState { db_pool, runtime }
    }

    #[tokio::test]
    async fn liveness_does_not_touch_dependencies() {
        let Json(payload) = health().await;
        assert_eq!(payload.status, "ok");
    }

    #[tokio::test]
    async fn ready_when_database_and_vector_store_answer() {
        let state = state(heartbeat_server().await, false).await;

        let (status, Json(payload)) = readiness(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.vector_store.status, "ready");
    }

    #[tokio::test]
    async fn degraded_when_dependencies_are_down() {
        let state = state("http://127.0.0.1:9".to_string(), true).await;

        let (status, Json(payload)) = readiness(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.vector_store.status, "degraded");
    }
}
