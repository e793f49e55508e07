//! Structured configuration: one sub-struct per component, loaded from a
//! TOML file layered with an `AFFECT_ENGINE__`-prefixed environment overlay
//! (`config::Environment::with_separator("__")`), landing in `EngineConfig`.

use crate::error::{EngineError, EngineResult};
use crate::types::NUM_GOAL_VARIABLES;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    pub max_size: usize,
    pub time_window_seconds: f64,
    pub min_samples_for_signature: usize,
    pub emotion_min: f64,
    pub emotion_max: f64,
    pub min_nonzero_emotions: usize,
    pub max_jump_threshold: f64,
    pub exponential_weighting: bool,
    pub reject_on_failure: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_size: 120,
            time_window_seconds: 60.0,
            min_samples_for_signature: 5,
            emotion_min: 0.0,
            emotion_max: 1.0,
            min_nonzero_emotions: 1,
            max_jump_threshold: 0.6,
            exponential_weighting: true,
            reject_on_failure: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternStoreConfig {
    pub min_similarity_threshold: f64,
    pub min_confidence_for_creation: f64,
    pub learning_rate: f64,
    pub min_activations_for_fusion: u64,
    pub min_confidence_to_keep: f64,
    pub days_before_pruning: f64,
    pub max_patterns: usize,
    pub feedback_learning_rate: f64,
}

impl Default for PatternStoreConfig {
    fn default() -> Self {
        Self {
            min_similarity_threshold: 0.3,
            min_confidence_for_creation: 0.3,
            learning_rate: 0.1,
            min_activations_for_fusion: 10,
            min_confidence_to_keep: 0.15,
            days_before_pruning: 30.0,
            max_patterns: 64,
            feedback_learning_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub high_match_threshold: f64,
    pub medium_match_threshold: f64,
    pub low_match_threshold: f64,
    pub hysteresis_margin: f64,
    pub min_frames_before_switch: u32,
    pub min_phase_duration_s: f64,
    pub min_stability_for_creation: f64,
    pub min_confidence_for_creation: f64,
    pub max_matches_returned: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            high_match_threshold: 0.85,
            medium_match_threshold: 0.6,
            low_match_threshold: 0.4,
            hysteresis_margin: 0.1,
            min_frames_before_switch: 3,
            min_phase_duration_s: 30.0,
            min_stability_for_creation: 0.5,
            min_confidence_for_creation: 0.3,
            max_matches_returned: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    pub use_confidence_weighting: bool,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            use_confidence_weighting: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub temporal_window_ms: u64,
    pub causality_threshold_ms: u64,
    pub slow_emotion_causality_threshold_ms: u64,
    pub emotion_persistence_threshold_seconds: f64,
    pub edge_decay_factor: f64,
    pub edge_floor: f64,
    pub node_ttl_seconds: f64,
    pub min_activation_to_keep: f64,
    pub snapshot_interval_seconds: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            temporal_window_ms: 5_000,
            causality_threshold_ms: 3_000,
            slow_emotion_causality_threshold_ms: 10_000,
            emotion_persistence_threshold_seconds: 2.0,
            edge_decay_factor: 0.98,
            edge_floor: 0.02,
            node_ttl_seconds: 3_600.0,
            min_activation_to_keep: 1.0,
            snapshot_interval_seconds: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub trauma_dominance_threshold: f64,
    pub max_memories: usize,
    pub trauma_intensity_threshold: f64,
    pub trauma_valence_threshold: f64,
    pub activation_threshold_for_refresh: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            trauma_dominance_threshold: 0.7,
            max_memories: 5_000,
            trauma_intensity_threshold: 0.85,
            trauma_valence_threshold: 0.2,
            activation_threshold_for_refresh: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsciousnessConfig {
    pub weight_mct: f64,
    pub weight_mlt: f64,
    pub weight_mp: f64,
    pub weight_me: f64,
    pub weight_ms: f64,
    pub weight_ma: f64,
    pub weight_trauma: f64,
    pub weight_feedback: f64,
    pub weight_environment: f64,
    pub use_tanh_normalization: bool,
    pub ct_tanh_scale: f64,
    pub sentiment_history_size: usize,
    pub sentiment_history_decay: f64,
    pub sentiment_feedback_weight: f64,
    pub sentiment_tanh_scale: f64,
    pub wisdom_initial: f64,
    pub wisdom_max: f64,
    pub wisdom_growth_rate: f64,
    pub background_decay: f64,
}

impl Default for ConsciousnessConfig {
    fn default() -> Self {
        Self {
            weight_mct: 0.3,
            weight_mlt: 0.25,
            weight_mp: 0.1,
            weight_me: 0.15,
            weight_ms: 0.1,
            weight_ma: 0.1,
            weight_trauma: 0.4,
            weight_feedback: 0.3,
            weight_environment: 0.2,
            use_tanh_normalization: true,
            ct_tanh_scale: 0.1,
            sentiment_history_size: 20,
            sentiment_history_decay: 0.9,
            sentiment_feedback_weight: 0.2,
            sentiment_tanh_scale: 1.0,
            wisdom_initial: 1.0,
            wisdom_max: 2.0,
            wisdom_growth_rate: 0.1,
            background_decay: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalConfig {
    pub initial_weights: [f64; NUM_GOAL_VARIABLES],
    pub interaction_positive_scale: f64,
    pub interaction_negative_scale: f64,
    pub resilience_base: f64,
    pub resilience_growth_rate: f64,
    pub resilience_max: f64,
    pub resilience_decay_on_trauma: f64,
    pub stochasticity_amplitude: f64,
    pub stochasticity_bias: f64,
    pub alpha_memory_positive: f64,
    pub alpha_memory_negative: f64,
    pub gamma_trauma: f64,
    pub use_sigmoid_output: bool,
    pub sigmoid_steepness: f64,
    pub use_wisdom_modulation: bool,
    pub use_sentiment_for_feelings: bool,
    pub emergency_override: bool,
    pub weight_adaptation_rate: f64,
    pub emotion_intensity_floor: f64,
    pub emotion_mapping_attenuation: f64,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            initial_weights: [
                0.12, 0.10, 0.08, 0.08, 0.06, 0.07, 0.06, 0.08, 0.04, 0.05, 0.06, 0.05, 0.04, 0.04,
                0.03, 0.04,
            ],
            interaction_positive_scale: 0.1,
            interaction_negative_scale: 0.15,
            resilience_base: 0.5,
            resilience_growth_rate: 0.001,
            resilience_max: 1.0,
            resilience_decay_on_trauma: 0.1,
            stochasticity_amplitude: 0.05,
            stochasticity_bias: 0.0,
            alpha_memory_positive: 0.3,
            alpha_memory_negative: 0.3,
            gamma_trauma: 0.5,
            use_sigmoid_output: true,
            sigmoid_steepness: 2.0,
            use_wisdom_modulation: true,
            use_sentiment_for_feelings: true,
            emergency_override: true,
            weight_adaptation_rate: 0.01,
            emotion_intensity_floor: 0.05,
            emotion_mapping_attenuation: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmygdalaConfig {
    pub quiet: bool,
    pub default_phase_threshold: f64,
    pub trauma_activation_critical: f64,
}

impl Default for AmygdalaConfig {
    fn default() -> Self {
        Self {
            quiet: true,
            default_phase_threshold: 0.6,
            trauma_activation_critical: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    pub veto_threshold: f64,
    pub enable_meta_actions: bool,
    pub max_macro_options: usize,
    pub top_k_refinement: usize,
    pub max_simulation_depth: usize,
    pub urgency_reflex_threshold: f64,
    pub tau_max_ms: u64,
    pub theta_meta: f64,
    pub theta_info: f64,
    pub theta_confidence: f64,
    pub ft_weight_boost: f64,
    pub theta_automate: u64,
    pub history_size: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            veto_threshold: 0.7,
            enable_meta_actions: true,
            max_macro_options: 8,
            top_k_refinement: 3,
            max_simulation_depth: 5,
            urgency_reflex_threshold: 0.9,
            tau_max_ms: 2_000,
            theta_meta: 0.5,
            theta_info: 0.5,
            theta_confidence: 0.2,
            ft_weight_boost: 0.2,
            theta_automate: 5,
            history_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub store_url: Option<String>,
    pub llm_url: Option<String>,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_timeout_s: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            llm_url: None,
            request_timeout_ms: 2_000,
            max_retries: 3,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout_s: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Top-level configuration, one field per component config struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub buffer: BufferConfig,
    pub pattern_store: PatternStoreConfig,
    pub matcher: MatcherConfig,
    pub updater: UpdaterConfig,
    pub graph: GraphConfig,
    pub memory: MemoryConfig,
    pub consciousness: ConsciousnessConfig,
    pub goals: GoalConfig,
    pub amygdala: AmygdalaConfig,
    pub decision: DecisionConfig,
    pub persistence: PersistenceConfig,
    pub server: ServerConfig,
}

impl EngineConfig {
    /// Loads `path` (a TOML file, optional) layered with an
    /// `AFFECT_ENGINE__COMPONENT__FIELD`-style environment overlay, falling
    /// back entirely to defaults if neither is present.
    pub fn load(path: Option<&str>) -> EngineResult<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&EngineConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let built = builder
            .add_source(
                config::Environment::with_prefix("AFFECT_ENGINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: EngineConfig = built.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Sanity-checks cross-cutting invariants config loading cannot express
    /// structurally (weight renormalisation, threshold ordering).
    pub fn validate(&self) -> EngineResult<()> {
        let sum: f64 = self.goals.initial_weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(EngineError::Configuration(format!(
                "goals.initial_weights must sum to 1.0, got {sum}"
            )));
        }
        if self.matcher.low_match_threshold >= self.matcher.medium_match_threshold
            || self.matcher.medium_match_threshold >= self.matcher.high_match_threshold
        {
            return Err(EngineError::Configuration(
                "matcher thresholds must satisfy low < medium < high".to_string(),
            ));
        }
        crate::utils::ConfigValidator::validate_range(
            self.matcher.hysteresis_margin,
            0.0,
            1.0,
            "matcher.hysteresis_margin",
        )?;
        crate::utils::ConfigValidator::validate_positive(
            self.buffer.time_window_seconds,
            "buffer.time_window_seconds",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn default_goal_weights_sum_to_one() {
        let sum: f64 = GoalConfig::default().initial_weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn load_with_missing_file_falls_back_to_defaults() {
        let cfg = EngineConfig::load(Some("/nonexistent/path.toml")).unwrap();
        assert_eq!(cfg.matcher.high_match_threshold, 0.85);
    }

    #[test]
    fn validate_rejects_inverted_matcher_thresholds() {
        let mut cfg = EngineConfig::default();
        cfg.matcher.low_match_threshold = 0.9;
        assert!(cfg.validate().is_err());
    }
}
