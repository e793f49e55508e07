//! C8 — consciousness / sentiment engine: per-tick Ct, sentiment history
//! driven Ft, wisdom growth, and a stable affective background.

use crate::config::ConsciousnessConfig;
use crate::types::{EnvironmentState, FeedbackState, MemoryActivation, Trauma, NUM_EMOTIONS};
use std::collections::VecDeque;

#[derive(Debug)]
pub struct ConscienceState {
    pub ct: f64,
    pub emotion_component: f64,
    pub memory_component: f64,
    pub trauma_component: f64,
    pub feedback_component: f64,
    pub environment_component: f64,
    pub wisdom_factor: f64,
    pub active_pattern: String,
}

#[derive(Debug)]
pub struct SentimentState {
    pub ft: f64,
    pub ft_raw: f64,
    pub weighted_history: f64,
    pub feedback_influence: f64,
    pub history_depth: usize,
}

pub struct ConsciousnessEngine {
    config: ConsciousnessConfig,
    current_emotions: [f64; NUM_EMOTIONS],
    active_pattern: String,
    memory_activation: MemoryActivation,
    current_trauma: Option<Trauma>,
    current_feedback: FeedbackState,
    current_environment: EnvironmentState,
    alpha_modulation: [f64; NUM_EMOTIONS],
    memory_weights: [f64; 6],
    wisdom: f64,
    affective_background: f64,
    conscience_history: VecDeque<f64>,
    trauma_dominance_threshold: f64,
    last_conscience: Option<ConscienceState>,
    last_sentiment: Option<SentimentState>,
}

impl ConsciousnessEngine {
    pub fn new(config: ConsciousnessConfig) -> Self {
        let weight_mct = config.weight_mct;
        let weight_mlt = config.weight_mlt;
        let weight_mp = config.weight_mp;
        let weight_me = config.weight_me;
        let weight_ms = config.weight_ms;
        let weight_ma = config.weight_ma;
        let wisdom_initial = config.wisdom_initial;
        Self {
            config,
            current_emotions: [0.0; NUM_EMOTIONS],
            active_pattern: "SERENITY".to_string(),
            memory_activation: MemoryActivation::default(),
            current_trauma: None,
            current_feedback: FeedbackState::default(),
            current_environment: EnvironmentState::default(),
            alpha_modulation: [1.0; NUM_EMOTIONS],
            memory_weights: [weight_mct, weight_mlt, weight_mp, weight_me, weight_ms, weight_ma],
            wisdom: wisdom_initial,
            affective_background: 0.0,
            conscience_history: VecDeque::new(),
            trauma_dominance_threshold: 0.7,
            last_conscience: None,
            last_sentiment: None,
        }
    }

    pub fn update_emotions(&mut self, emotions: [f64; NUM_EMOTIONS], active_pattern: &str) {
        self.current_emotions = emotions;
        self.active_pattern = active_pattern.to_string();
    }

    pub fn update_memory_activation(&mut self, activation: MemoryActivation) {
        self.memory_activation = activation;
    }

    pub fn update_trauma(&mut self, trauma: Option<Trauma>) {
        self.current_trauma = trauma;
    }

    pub fn update_feedback(&mut self, feedback: FeedbackState) {
        self.current_feedback = feedback;
    }

    pub fn update_environment(&mut self, environment: EnvironmentState) {
        self.current_environment = environment;
    }

    pub fn modulate_emotion_coefficients(&mut self, modulation: [f64; NUM_EMOTIONS]) {
        self.alpha_modulation = modulation;
    }

    pub fn modulate_memory_coefficients(&mut self, weights: [f64; 6]) {
        self.memory_weights = weights;
    }

    fn emotion_component(&self) -> f64 {
        self.current_emotions
            .iter()
            .zip(self.alpha_modulation.iter())
            .map(|(e, a)| e * a)
            .sum()
    }

    fn memory_component(&self) -> f64 {
        let m = &self.memory_activation;
        let w = &self.memory_weights;
        w[0] * m.mct + w[1] * m.mlt + w[2] * m.mp + w[3] * m.me + w[4] * m.ms + w[5] * m.ma
    }

    fn trauma_component(&self) -> f64 {
        match &self.current_trauma {
            Some(t) if t.is_dominant(self.trauma_dominance_threshold) => self.config.weight_trauma * t.intensity,
            Some(t) if t.is_active() => 0.5 * self.config.weight_trauma * t.intensity,
            _ => 0.0,
        }
    }

    fn feedback_component(&self) -> f64 {
        self.config.weight_feedback * self.current_feedback.score()
    }

    fn environment_component(&self) -> f64 {
        let env = &self.current_environment;
        self.config.weight_environment
            * (0.4 * (1.0 - env.hostility) + 0.2 * (1.0 - env.noise) + 0.3 * env.familiarity
                + 0.1 * (1.0 - 0.5 * env.social_density))
    }

    pub fn compute_conscience(&mut self) -> ConscienceState {
        let emotion_component = self.emotion_component();
        let memory_component = self.memory_component();
        let trauma_component = self.trauma_component();
        let feedback_component = self.feedback_component();
        let environment_component = self.environment_component();

        let ct_raw = (emotion_component + memory_component + trauma_component + feedback_component + environment_component)
            * self.wisdom;
        let ct = if self.config.use_tanh_normalization {
            (self.config.ct_tanh_scale * ct_raw).tanh()
        } else {
            ct_raw.clamp(-1.0, 1.0)
        };

        self.add_to_history(ct);

        let state = ConscienceState {
            ct,
            emotion_component,
            memory_component,
            trauma_component,
            feedback_component,
            environment_component,
            wisdom_factor: self.wisdom,
            active_pattern: self.active_pattern.clone(),
        };
        self.last_conscience = Some(state.clone());
        state
    }

    fn add_to_history(&mut self, ct: f64) {
        if self.conscience_history.len() >= self.config.sentiment_history_size {
            self.conscience_history.pop_front();
        }
        self.conscience_history.push_back(ct);
    }

    fn weighted_history(&self) -> f64 {
        let gamma = self.config.sentiment_history_decay;
        let n = self.conscience_history.len();
        self.conscience_history
            .iter()
            .rev()
            .enumerate()
            .map(|(k, ct)| gamma.powi(k as i32) * ct)
            .sum::<f64>()
            .max(-1e9)
    }

    pub fn compute_sentiment(&mut self) -> SentimentState {
        let weighted_history = self.weighted_history();
        let feedback_influence = self.config.sentiment_feedback_weight * self.current_feedback.score();
        let ft_raw = weighted_history + feedback_influence;
        let ft = if self.config.use_tanh_normalization {
            (self.config.sentiment_tanh_scale * ft_raw).tanh()
        } else {
            ft_raw.clamp(-1.0, 1.0)
        };

        self.update_affective_background(ft);

        let state = SentimentState {
            ft,
            ft_raw,
            weighted_history,
            feedback_influence,
            history_depth: self.conscience_history.len(),
        };
        self.last_sentiment = Some(state.clone());
        state
    }

    fn update_affective_background(&mut self, ft: f64) {
        self.affective_background = self.config.background_decay * ft + (1.0 - self.config.background_decay) * self.affective_background;
    }

    /// Runs conscience then sentiment in sequence, returning both.
    pub fn tick(&mut self) -> (ConscienceState, SentimentState) {
        let conscience = self.compute_conscience();
        let sentiment = self.compute_sentiment();
        (conscience, sentiment)
    }

    pub fn add_experience(&mut self, experience_value: f64) {
        self.wisdom = (self.wisdom + self.config.wisdom_growth_rate * (1.0 + experience_value.abs()).ln())
            .min(self.config.wisdom_max);
    }

    pub fn reset_wisdom(&mut self) {
        self.wisdom = self.config.wisdom_initial;
    }

    pub fn wisdom(&self) -> f64 {
        self.wisdom
    }

    pub fn affective_background(&self) -> f64 {
        self.affective_background
    }

    pub fn last_conscience(&self) -> Option<&ConscienceState> {
        self.last_conscience.as_ref()
    }

    pub fn last_sentiment(&self) -> Option<&SentimentState> {
        self.last_sentiment.as_ref()
    }
}

impl Clone for ConscienceState {
    fn clone(&self) -> Self {
        Self {
            ct: self.ct,
            emotion_component: self.emotion_component,
            memory_component: self.memory_component,
            trauma_component: self.trauma_component,
            feedback_component: self.feedback_component,
            environment_component: self.environment_component,
            wisdom_factor: self.wisdom_factor,
            active_pattern: self.active_pattern.clone(),
        }
    }
}

impl Clone for SentimentState {
    fn clone(&self) -> Self {
        Self {
            ft: self.ft,
            ft_raw: self.ft_raw,
            weighted_history: self.weighted_history,
            feedback_influence: self.feedback_influence,
            history_depth: self.history_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conscience_zero_inputs_yields_zero_ct() {
        let mut engine = ConsciousnessEngine::new(ConsciousnessConfig::default());
        let state = engine.compute_conscience();
        assert!((state.ct).abs() < 1e-9);
    }

    #[test]
    fn wisdom_grows_and_is_capped() {
        let mut engine = ConsciousnessEngine::new(ConsciousnessConfig::default());
        for _ in 0..10_000 {
            engine.add_experience(1.0);
        }
        assert!(engine.wisdom() <= ConsciousnessConfig::default().wisdom_max);
    }

    #[test]
    fn dominant_trauma_contributes_full_weight() {
        let mut engine = ConsciousnessEngine::new(ConsciousnessConfig::default());
        engine.update_trauma(Some(crate::types::Trauma {
            kind: crate::types::TraumaKind::Emotional,
            intensity: 0.9,
            activation_time_ms: 0,
            trigger_context: String::new(),
            source_memory_id: None,
        }));
        let state = engine.compute_conscience();
        assert!(state.trauma_component > 0.0);
    }

    #[test]
    fn sentiment_background_is_stable_ema_of_ft() {
        let mut engine = ConsciousnessEngine::new(ConsciousnessConfig::default());
        engine.update_emotions([0.8; NUM_EMOTIONS], "JOY");
        for _ in 0..5 {
            engine.tick();
        }
        assert!(engine.affective_background().abs() <= 1.0);
    }

    #[test]
    fn trauma_intensity_strictly_increases_ct_magnitude() {
        let mut engine = ConsciousnessEngine::new(ConsciousnessConfig::default());
        engine.update_emotions([0.2; NUM_EMOTIONS], "SERENITY");
        engine.update_environment(EnvironmentState {
            social_density: 0.5,
            ..EnvironmentState::default()
        });
        let baseline = engine.compute_conscience();

        engine.update_trauma(Some(Trauma {
            kind: crate::types::TraumaKind::Physical,
            intensity: 0.9,
            activation_time_ms: 0,
            trigger_context: String::new(),
            source_memory_id: None,
        }));
        let with_trauma = engine.compute_conscience();

        assert!(with_trauma.ct.abs() > baseline.ct.abs());
        assert!(with_trauma.trauma_component > 0.0);
    }

    #[test]
    fn memory_activation_weights_match_configured_formula() {
        let mut engine = ConsciousnessEngine::new(ConsciousnessConfig::default());
        engine.update_emotions([0.3; NUM_EMOTIONS], "EXPLORATION");
        engine.update_memory_activation(MemoryActivation {
            mct: 0.8,
            mlt: 0.6,
            mp: 0.0,
            me: 0.9,
            ms: 0.0,
            ma: 0.0,
        });
        let state = engine.compute_conscience();
        assert!((state.memory_component - 0.525).abs() < 1e-9);
    }

    #[test]
    fn sentiment_accumulates_over_ten_increasing_ticks() {
        let config = ConsciousnessConfig {
            sentiment_history_decay: 0.9,
            sentiment_history_size: 10,
            ..ConsciousnessConfig::default()
        };
        let mut engine = ConsciousnessEngine::new(config);
        let mut last = (0.0, 0);
        for i in 0..10 {
            let level = 0.1 + 0.05 * i as f64;
            engine.update_emotions([level; NUM_EMOTIONS], "JOIE");
            let (_, sentiment) = engine.tick();
            last = (sentiment.ft, sentiment.history_depth);
        }
        assert!(last.0 > 0.0);
        assert_eq!(last.1, 10);
        assert!(engine.affective_background() > 0.0);
    }

    #[test]
    fn wisdom_growth_reaches_cap_and_resets() {
        let config = ConsciousnessConfig {
            wisdom_growth_rate: 0.1,
            wisdom_max: 2.0,
            wisdom_initial: 1.0,
            ..ConsciousnessConfig::default()
        };
        let mut engine = ConsciousnessEngine::new(config);
        for _ in 0..10 {
            engine.add_experience(1.0);
        }
        assert!(engine.wisdom() > 1.0);
        assert!(engine.wisdom() <= 2.0);

        engine.reset_wisdom();
        assert!((engine.wisdom() - 1.0).abs() < 1e-9);
    }
}
