//! HTTP surface: state/consciousness publication, affect/token ingestion,
//! and on-demand decision-making, over a single `Arc<RwLock<Engine>>`.

use crate::engine::{ConsciousnessPublication, Engine, StatePublication, TokenBatch, TokenIn};
use crate::error::EngineError;
use crate::types::{AffectVector, EnvironmentState, FeedbackState, Trauma, TraumaKind, NUM_EMOTIONS};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared engine handle. A single lock covers the whole pipeline so a tick
/// never contends with itself across components.
pub type ApiState = Arc<RwLock<Engine>>;

pub fn create_router(engine: Engine) -> Router {
    let state: ApiState = Arc::new(RwLock::new(engine));

    Router::new()
        .route("/health", get(health_check))
        .route("/affect/tick", post(tick_affect))
        .route("/affect/state", get(get_state))
        .route("/affect/consciousness", get(get_consciousness))
        .route("/affect/tokens", post(ingest_tokens))
        .route("/affect/decide", post(decide))
        .route("/affect/feedback", post(set_feedback))
        .route("/affect/environment", post(set_environment))
        .route("/affect/trauma", post(set_trauma))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TickRequest {
    pub affect: [f64; NUM_EMOTIONS],
}

#[derive(Debug, Serialize)]
pub struct TickResponse {
    pub state: StatePublication,
    pub consciousness: ConsciousnessPublication,
}

async fn tick_affect(State(state): State<ApiState>, Json(request): Json<TickRequest>) -> Result<Json<TickResponse>, ApiError> {
    let mut engine = state.write().await;
    let tick = engine.tick(AffectVector::new(request.affect))?;
    Ok(Json(TickResponse {
        state: engine.publish_state(&tick),
        consciousness: engine.publish_consciousness(&tick),
    }))
}

async fn get_state(State(state): State<ApiState>) -> Result<Json<StatePublication>, ApiError> {
    let engine = state.read().await;
    let tick = engine
        .last_tick()
        .ok_or_else(|| ApiError::NotReady("no tick has run yet".to_string()))?;
    Ok(Json(engine.publish_state(tick)))
}

async fn get_consciousness(State(state): State<ApiState>) -> Result<Json<ConsciousnessPublication>, ApiError> {
    let engine = state.read().await;
    let tick = engine
        .last_tick()
        .ok_or_else(|| ApiError::NotReady("no tick has run yet".to_string()))?;
    Ok(Json(engine.publish_consciousness(tick)))
}

#[derive(Debug, Deserialize)]
pub struct TokenBatchRequest {
    pub sentence_id: String,
    pub tokens: Vec<TokenInRequest>,
    pub relations: Vec<RelationRequest>,
}

#[derive(Debug, Deserialize)]
pub struct TokenInRequest {
    pub lemma: String,
    pub pos: String,
    pub original: String,
}

#[derive(Debug, Deserialize)]
pub struct RelationRequest {
    pub source: usize,
    pub target: usize,
    pub relation_type: String,
}

async fn ingest_tokens(State(state): State<ApiState>, Json(request): Json<TokenBatchRequest>) -> Result<StatusCode, ApiError> {
    let mut engine = state.write().await;
    engine.ingest_tokens(TokenBatch {
        sentence_id: request.sentence_id,
        tokens: request
            .tokens
            .into_iter()
            .map(|t| TokenIn {
                lemma: t.lemma,
                pos: t.pos,
                original: t.original,
            })
            .collect(),
        relations: request.relations.into_iter().map(|r| (r.source, r.target, r.relation_type)).collect(),
    });
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DecideRequest {
    pub context_type: String,
}

#[derive(Debug, Serialize)]
pub struct DecideResponse {
    pub action: String,
    pub category: &'static str,
    pub confidence: f64,
    pub is_meta_action: bool,
    pub is_reflex: bool,
    pub tau_elapsed_ms: u64,
}

async fn decide(State(state): State<ApiState>, Json(request): Json<DecideRequest>) -> Json<DecideResponse> {
    let mut engine = state.write().await;
    let result = engine.decide(&request.context_type);
    Json(DecideResponse {
        action: result.action,
        category: result.category,
        confidence: result.confidence,
        is_meta_action: result.is_meta_action,
        is_reflex: result.is_reflex,
        tau_elapsed_ms: result.tau_elapsed_ms,
    })
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub valence: f64,
    pub intensity: f64,
    pub credibility: f64,
}

async fn set_feedback(State(state): State<ApiState>, Json(request): Json<FeedbackRequest>) -> StatusCode {
    let mut engine = state.write().await;
    engine.set_feedback(FeedbackState {
        valence: request.valence,
        intensity: request.intensity,
        credibility: request.credibility,
    });
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct EnvironmentRequest {
    pub hostility: f64,
    pub noise: f64,
    pub familiarity: f64,
    pub social_density: f64,
}

async fn set_environment(State(state): State<ApiState>, Json(request): Json<EnvironmentRequest>) -> StatusCode {
    let mut engine = state.write().await;
    engine.set_environment(EnvironmentState {
        hostility: request.hostility,
        noise: request.noise,
        familiarity: request.familiarity,
        social_density: request.social_density,
    });
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct TraumaRequest {
    pub kind: String,
    pub intensity: f64,
    pub trigger_context: String,
}

async fn set_trauma(State(state): State<ApiState>, Json(request): Json<TraumaRequest>) -> Result<StatusCode, ApiError> {
    let kind = match request.kind.as_str() {
        "physical" => TraumaKind::Physical,
        "emotional" => TraumaKind::Emotional,
        "social" => TraumaKind::Social,
        other => return Err(ApiError::Validation(format!("unknown trauma kind '{other}'"))),
    };
    let mut engine = state.write().await;
    engine.set_trauma(Some(Trauma {
        kind,
        intensity: request.intensity,
        activation_time_ms: crate::types::now_ms(),
        trigger_context: request.trigger_context,
        source_memory_id: None,
    }));
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotReady(String),
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Validation { .. } => ApiError::Validation(error.to_string()),
            EngineError::NotReady(msg) => ApiError::NotReady(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotReady(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Binds and serves the router until the process is terminated.
pub async fn start_server(engine: Engine, bind_addr: &str) -> anyhow::Result<()> {
    let app = create_router(engine);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = bind_addr, "affect engine listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use axum_test::TestServer;

    fn test_engine() -> Engine {
        Engine::new(EngineConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let server = TestServer::new(create_router(test_engine())).unwrap();
        let response = server.get("/health").await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn state_before_any_tick_is_not_ready() {
        let server = TestServer::new(create_router(test_engine())).unwrap();
        let response = server.get("/affect/state").await;
        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn tick_then_state_round_trips() {
        let server = TestServer::new(create_router(test_engine())).unwrap();
        let response = server
            .post("/affect/tick")
            .json(&TickRequest {
                affect: [0.1; NUM_EMOTIONS],
            })
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let response = server.get("/affect/state").await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn decide_without_any_tick_returns_a_result() {
        let server = TestServer::new(create_router(test_engine())).unwrap();
        let response = server
            .post("/affect/decide")
            .json(&DecideRequest {
                context_type: "idle".to_string(),
            })
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }
}
