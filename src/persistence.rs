//! External memory-store / LLM adapter: asynchronous request/reply over
//! HTTP, with deadline, retry-with-backoff and a circuit breaker.
//!
//! The original system dispatched these same request kinds over a
//! RabbitMQ request/reply queue to an external graph-store service; this
//! adapter keeps the request/reply shape (`request_id`-correlated
//! `{request_type, payload}`) but carries it over HTTP, matching the rest
//! of the engine's external-interface stack.

use crate::error::{EngineError, EngineResult};
use crate::types::{AffectVector, NUM_EMOTIONS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    CreateMemory,
    CreateTrauma,
    MergeMemory,
    GetMemory,
    FindSimilar,
    Reactivate,
    ApplyDecay,
    DeleteMemory,
    RecordTransition,
    GetTransitions,
    CreateSession,
    UpdateSession,
    CypherQuery,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersistenceRequest {
    pub request_id: String,
    pub request_type: RequestType,
    pub payload: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceResponse {
    pub request_id: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open,
}

struct Circuit {
    state: CircuitState,
    opened_at_ms: u64,
}

/// Adapter to the external memory store and LLM endpoints. Degrades to
/// `NotReady` for any operation when its URL is unconfigured.
pub struct PersistenceClient {
    config: crate::config::PersistenceConfig,
    http: reqwest::Client,
    circuit: Mutex<Circuit>,
    consecutive_failures: AtomicU32,
    request_counter: AtomicU64,
}

impl PersistenceClient {
    pub fn new(config: crate::config::PersistenceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            circuit: Mutex::new(Circuit {
                state: CircuitState::Closed,
                opened_at_ms: 0,
            }),
            consecutive_failures: AtomicU32::new(0),
            request_counter: AtomicU64::new(0),
        }
    }

    pub fn is_store_ready(&self) -> bool {
        self.config.store_url.is_some()
    }

    pub fn is_llm_ready(&self) -> bool {
        self.config.llm_url.is_some()
    }

    fn generate_request_id(&self) -> String {
        let n = self.request_counter.fetch_add(1, Ordering::Relaxed);
        format!("req-{}-{n}", uuid::Uuid::new_v4())
    }

    fn circuit_allows_call(&self) -> bool {
        let mut circuit = self.circuit.lock().unwrap();
        if circuit.state == CircuitState::Closed {
            return true;
        }
        let now = crate::types::now_ms();
        if now.saturating_sub(circuit.opened_at_ms) >= self.config.circuit_breaker_timeout_s * 1000 {
            debug!("circuit breaker half-open, allowing a probe call");
            circuit.state = CircuitState::Closed;
            return true;
        }
        false
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let mut circuit = self.circuit.lock().unwrap();
        circuit.state = CircuitState::Closed;
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.config.circuit_breaker_threshold {
            let mut circuit = self.circuit.lock().unwrap();
            if circuit.state != CircuitState::Open {
                warn!(failures, "circuit breaker opened");
            }
            circuit.state = CircuitState::Open;
            circuit.opened_at_ms = crate::types::now_ms();
        }
    }

    /// Sends a request with deadline + retry-with-backoff; never panics on
    /// transport failure, always returns a typed error.
    pub async fn send(&self, request_type: RequestType, payload: Value) -> EngineResult<PersistenceResponse> {
        let url = self
            .config
            .store_url
            .as_ref()
            .ok_or_else(|| EngineError::NotReady("persistence store not configured".to_string()))?;

        if !self.circuit_allows_call() {
            return Err(EngineError::Transport("circuit breaker open".to_string()));
        }

        let request = PersistenceRequest {
            request_id: self.generate_request_id(),
            request_type,
            payload,
        };

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            let call = self.http.post(url).json(&request).send();
            let outcome = tokio::time::timeout(Duration::from_millis(self.config.request_timeout_ms), call).await;

            match outcome {
                Ok(Ok(resp)) => match resp.json::<PersistenceResponse>().await {
                    Ok(parsed) => {
                        self.record_success();
                        return Ok(parsed);
                    }
                    Err(err) => {
                        last_error = Some(EngineError::Serialization(err.to_string()));
                    }
                },
                Ok(Err(err)) => {
                    last_error = Some(EngineError::Transport(err.to_string()));
                }
                Err(_) => {
                    last_error = Some(EngineError::Timeout(format!("{request_type:?} timed out after {}ms", self.config.request_timeout_ms)));
                }
            }

            if attempt < self.config.max_retries {
                let backoff_ms = 100u64 * 2u64.pow(attempt);
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        self.record_failure();
        Err(last_error.unwrap_or_else(|| EngineError::Internal("persistence call failed with no error detail".to_string())))
    }

    pub async fn create_memory(&self, affect: &AffectVector, context: &str) -> EngineResult<PersistenceResponse> {
        self.send(
            RequestType::CreateMemory,
            serde_json::json!({ "affect": affect.values, "context": context }),
        )
        .await
    }

    pub async fn create_trauma(&self, affect: &AffectVector, trigger_keywords: &[String]) -> EngineResult<PersistenceResponse> {
        self.send(
            RequestType::CreateTrauma,
            serde_json::json!({ "affect": affect.values, "trigger_keywords": trigger_keywords }),
        )
        .await
    }

    pub async fn find_similar(&self, affect: &AffectVector, threshold: f64, limit: usize) -> EngineResult<PersistenceResponse> {
        self.send(
            RequestType::FindSimilar,
            serde_json::json!({ "affect": affect.values, "threshold": threshold, "limit": limit }),
        )
        .await
    }

    pub async fn record_transition(&self, from_pattern: &str, to_pattern: &str, duration_s: f64) -> EngineResult<PersistenceResponse> {
        self.send(
            RequestType::RecordTransition,
            serde_json::json!({ "from": from_pattern, "to": to_pattern, "duration_s": duration_s }),
        )
        .await
    }

    pub async fn cypher_query(&self, query: &str, params: Value) -> EngineResult<PersistenceResponse> {
        self.send(RequestType::CypherQuery, serde_json::json!({ "query": query, "params": params })).await
    }

    /// Calls the configured LLM endpoint with a plain-text prompt, returning
    /// its plain-text completion.
    pub async fn call_llm(&self, prompt: &str) -> EngineResult<String> {
        let url = self
            .config
            .llm_url
            .as_ref()
            .ok_or_else(|| EngineError::NotReady("llm endpoint not configured".to_string()))?;

        let call = self.http.post(url).json(&serde_json::json!({ "prompt": prompt })).send();
        let outcome = tokio::time::timeout(Duration::from_millis(self.config.request_timeout_ms), call)
            .await
            .map_err(|_| EngineError::Timeout("llm call timed out".to_string()))?
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        outcome.text().await.map_err(|e| EngineError::Transport(e.to_string()))
    }
}

const _: () = {
    // Compile-time reminder of the affect-vector width used by create_memory's payload.
    assert!(NUM_EMOTIONS == 24);
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistenceConfig;

    #[tokio::test]
    async fn send_returns_not_ready_without_store_url() {
        let client = PersistenceClient::new(PersistenceConfig::default());
        let result = client.send(RequestType::GetMemory, serde_json::json!({})).await;
        assert!(matches!(result, Err(EngineError::NotReady(_))));
    }

    #[tokio::test]
    async fn llm_call_returns_not_ready_without_url() {
        let client = PersistenceClient::new(PersistenceConfig::default());
        let result = client.call_llm("hello").await;
        assert!(matches!(result, Err(EngineError::NotReady(_))));
    }

    #[test]
    fn circuit_breaker_opens_after_threshold_failures() {
        let mut cfg = PersistenceConfig::default();
        cfg.circuit_breaker_threshold = 2;
        let client = PersistenceClient::new(cfg);
        client.record_failure();
        assert!(client.circuit_allows_call());
        client.record_failure();
        assert!(!client.circuit_allows_call());
    }
}
