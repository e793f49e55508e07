//! C9 — goal engine: the 16-variable goal model `(P, w, L)` driven by
//! emotion mapping, interaction synergies/oppositions, resilience,
//! stochasticity and word-affect-graph memory influence.

use crate::config::GoalConfig;
use crate::types::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Emotion -> goal-variable weight table, reindexed onto `EMOTION_NAMES`'
/// order from the Ekman-ordered source table. Rows with no reasonable
/// nearest-match emotion in the source table are left at zero (see
/// DESIGN.md's Open Question #2).
pub static EMOTION_VARIABLE_WEIGHTS: [[f64; NUM_GOAL_VARIABLES]; NUM_EMOTIONS] = {
    let mut table = [[0.0; NUM_GOAL_VARIABLES]; NUM_EMOTIONS];
    table[0][IDX_G_FEELINGS] = 0.5; // Admiration
    table[0][IDX_G_MODELS] = 0.7;
    table[0][IDX_G_MOTIVATIONS] = 0.4;
    table[0][IDX_G_SURPASSING] = 0.4;
    table[0][IDX_G_VALUES] = 0.2;

    table[1][IDX_G_FEELINGS] = 0.8; // Adoration (nearest: Amour)
    table[1][IDX_G_VALUES] = 0.4;
    table[1][IDX_G_NEEDS] = -0.4;
    table[1][IDX_G_EMOTIONAL_MEMORIES] = 0.5;
    table[1][IDX_G_SELF_KNOWLEDGE] = 0.2;

    table[IDX_ANXIETY][IDX_G_FEELINGS] = -0.5;
    table[IDX_ANXIETY][IDX_G_CLARITY] = -0.5;
    table[IDX_ANXIETY][IDX_G_SURPASSING] = -0.4;
    table[IDX_ANXIETY][IDX_G_NEEDS] = 0.4;
    table[IDX_ANXIETY][IDX_G_TRAUMAS] = 0.3;

    table[5][IDX_G_CLARITY] = -0.2; // Awe (nearest: Surprise)
    table[5][IDX_G_EXPERIENCES] = 0.3;
    table[5][IDX_G_SELF_KNOWLEDGE] = 0.2;
    table[5][IDX_G_ENVIRONMENT] = 0.2;

    table[6][IDX_G_FEELINGS] = -0.6; // Embarrassment (nearest: Honte)
    table[6][IDX_G_SELF_KNOWLEDGE] = 0.3;
    table[6][IDX_G_VALUES] = 0.2;
    table[6][IDX_G_SURPASSING] = -0.4;
    table[6][IDX_G_TRAUMAS] = 0.3;

    table[7][IDX_G_FEELINGS] = -0.2; // Boredom (nearest: Ennui)
    table[7][IDX_G_MOTIVATIONS] = -0.5;
    table[7][IDX_G_SURPASSING] = 0.3;
    table[7][IDX_G_ENVIRONMENT] = -0.3;
    table[7][IDX_G_CLARITY] = -0.2;

    table[8][IDX_G_FEELINGS] = 0.7; // Calm (nearest: Serenite)
    table[8][IDX_G_CLARITY] = 0.5;
    table[8][IDX_G_SELF_KNOWLEDGE] = 0.4;
    table[8][IDX_G_NEEDS] = -0.3;
    table[8][IDX_G_TRAUMAS] = -0.2;

    table[IDX_DISGUST][IDX_G_FEELINGS] = -0.4;
    table[IDX_DISGUST][IDX_G_VALUES] = 0.3;
    table[IDX_DISGUST][IDX_G_BELIEFS] = 0.2;
    table[IDX_DISGUST][IDX_G_ENVIRONMENT] = -0.3;

    table[11][IDX_G_FEELINGS] = -0.3; // EmpathicPain (nearest: Empathie, negated feelings)
    table[11][IDX_G_VALUES] = 0.5;
    table[11][IDX_G_SELF_KNOWLEDGE] = 0.3;
    table[11][IDX_G_BELIEFS] = 0.2;
    table[11][IDX_G_MODELS] = 0.2;

    table[IDX_EXCITEMENT][IDX_G_FEELINGS] = 0.5;
    table[IDX_EXCITEMENT][IDX_G_MOTIVATIONS] = 0.6;
    table[IDX_EXCITEMENT][IDX_G_SURPASSING] = 0.5;
    table[IDX_EXCITEMENT][IDX_G_CLARITY] = -0.2;

    table[IDX_FEAR][IDX_G_FEELINGS] = -0.6;
    table[IDX_FEAR][IDX_G_TRAUMAS] = 0.5;
    table[IDX_FEAR][IDX_G_SURPASSING] = -0.5;
    table[IDX_FEAR][IDX_G_CLARITY] = -0.4;
    table[IDX_FEAR][IDX_G_NEEDS] = 0.3;
    table[IDX_FEAR][IDX_G_ENVIRONMENT] = -0.3;

    // Horror: Fear's row scaled up, clamped to [-1, 1].
    table[IDX_HORROR][IDX_G_FEELINGS] = -0.72;
    table[IDX_HORROR][IDX_G_TRAUMAS] = 0.6;
    table[IDX_HORROR][IDX_G_SURPASSING] = -0.6;
    table[IDX_HORROR][IDX_G_CLARITY] = -0.48;
    table[IDX_HORROR][IDX_G_NEEDS] = 0.36;
    table[IDX_HORROR][IDX_G_ENVIRONMENT] = -0.36;

    table[IDX_JOY][IDX_G_FEELINGS] = 0.9;
    table[IDX_JOY][IDX_G_MOTIVATIONS] = 0.5;
    table[IDX_JOY][IDX_G_SURPASSING] = 0.4;
    table[IDX_JOY][IDX_G_EMOTIONAL_MEMORIES] = 0.6;
    table[IDX_JOY][IDX_G_SELF_KNOWLEDGE] = 0.2;
    table[IDX_JOY][IDX_G_REGRETS] = -0.3;

    table[18][IDX_G_EMOTIONAL_MEMORIES] = 0.8; // Nostalgia
    table[18][IDX_G_FEELINGS] = 0.2;
    table[18][IDX_G_REGRETS] = 0.3;
    table[18][IDX_G_EXPERIENCES] = 0.3;
    table[18][IDX_G_MODELS] = 0.2;

    table[IDX_SADNESS][IDX_G_FEELINGS] = -0.7;
    table[IDX_SADNESS][IDX_G_MOTIVATIONS] = -0.4;
    table[IDX_SADNESS][IDX_G_EMOTIONAL_MEMORIES] = 0.5;
    table[IDX_SADNESS][IDX_G_REGRETS] = 0.4;
    table[IDX_SADNESS][IDX_G_SELF_KNOWLEDGE] = 0.2;
    table[IDX_SADNESS][IDX_G_SURPASSING] = -0.3;

    table[IDX_SATISFACTION][IDX_G_FEELINGS] = 0.7; // nearest: Fierte
    table[IDX_SATISFACTION][IDX_G_SELF_KNOWLEDGE] = 0.5;
    table[IDX_SATISFACTION][IDX_G_COMPETENCES] = 0.4;
    table[IDX_SATISFACTION][IDX_G_SURPASSING] = 0.4;
    table[IDX_SATISFACTION][IDX_G_VALUES] = 0.2;

    table[22][IDX_G_FEELINGS] = 0.3; // Sympathy (nearest: Empathie)
    table[22][IDX_G_VALUES] = 0.5;
    table[22][IDX_G_SELF_KNOWLEDGE] = 0.3;
    table[22][IDX_G_BELIEFS] = 0.2;
    table[22][IDX_G_MODELS] = 0.2;

    table
};

struct Cluster {
    pairs: &'static [(usize, usize, f64)],
}

const POSITIVE_CLUSTER: Cluster = Cluster {
    pairs: &[
        (IDX_G_MOTIVATIONS, IDX_G_SURPASSING, 0.35),
        (IDX_G_COMPETENCES, IDX_G_SURPASSING, 0.30),
        (IDX_G_SELF_KNOWLEDGE, IDX_G_SURPASSING, 0.25),
        (IDX_G_EXPERIENCES, IDX_G_COMPETENCES, 0.30),
        (IDX_G_MODELS, IDX_G_SURPASSING, 0.20),
        (IDX_G_SELF_KNOWLEDGE, IDX_G_CLARITY, 0.35),
        (IDX_G_VALUES, IDX_G_CLARITY, 0.25),
        (IDX_G_EXPERIENCES, IDX_G_CLARITY, 0.20),
        (IDX_G_BELIEFS, IDX_G_CLARITY, 0.15),
        (IDX_G_VALUES, IDX_G_BELIEFS, 0.30),
        (IDX_G_VALUES, IDX_G_SELF_KNOWLEDGE, 0.25),
        (IDX_G_EXPERIENCES, IDX_G_SELF_KNOWLEDGE, 0.20),
        (IDX_G_MODELS, IDX_G_VALUES, 0.15),
        (IDX_G_MODELS, IDX_G_MOTIVATIONS, 0.25),
        (IDX_G_EMOTIONAL_MEMORIES, IDX_G_MOTIVATIONS, 0.20),
        (IDX_G_ENVIRONMENT, IDX_G_MOTIVATIONS, 0.20),
        (IDX_G_NEEDS, IDX_G_MOTIVATIONS, 0.15),
        (IDX_G_COMPETENCES, IDX_G_SELF_KNOWLEDGE, 0.20),
        (IDX_G_ENVIRONMENT, IDX_G_COMPETENCES, 0.15),
        (IDX_G_CIRCUMSTANCES, IDX_G_COMPETENCES, 0.10),
        (IDX_G_FEELINGS, IDX_G_MOTIVATIONS, 0.25),
        (IDX_G_FEELINGS, IDX_G_SURPASSING, 0.20),
        (IDX_G_EMOTIONAL_MEMORIES, IDX_G_FEELINGS, 0.25),
    ],
};

const NEGATIVE_CLUSTER: Cluster = Cluster {
    pairs: &[
        (IDX_G_TRAUMAS, IDX_G_SURPASSING, 0.45),
        (IDX_G_TRAUMAS, IDX_G_MOTIVATIONS, 0.40),
        (IDX_G_TRAUMAS, IDX_G_CLARITY, 0.35),
        (IDX_G_TRAUMAS, IDX_G_SELF_KNOWLEDGE, 0.30),
        (IDX_G_TRAUMAS, IDX_G_FEELINGS, 0.35),
        (IDX_G_REGRETS, IDX_G_MOTIVATIONS, 0.30),
        (IDX_G_REGRETS, IDX_G_SURPASSING, 0.25),
        (IDX_G_REGRETS, IDX_G_CLARITY, 0.20),
        (IDX_G_REGRETS, IDX_G_FEELINGS, 0.25),
        (IDX_G_CIRCUMSTANCES, IDX_G_ENVIRONMENT, 0.35),
        (IDX_G_CIRCUMSTANCES, IDX_G_MOTIVATIONS, 0.20),
        (IDX_G_CIRCUMSTANCES, IDX_G_SURPASSING, 0.25),
        (IDX_G_NEEDS, IDX_G_CLARITY, 0.25),
        (IDX_G_NEEDS, IDX_G_SURPASSING, 0.20),
        (IDX_G_BELIEFS, IDX_G_SURPASSING, 0.15),
        (IDX_G_EMOTIONAL_MEMORIES, IDX_G_CLARITY, 0.15),
        (IDX_G_ENVIRONMENT, IDX_G_NEEDS, 0.20),
    ],
};

fn build_matrix(cluster: &Cluster) -> [[f64; NUM_GOAL_VARIABLES]; NUM_GOAL_VARIABLES] {
    let mut m = [[0.0; NUM_GOAL_VARIABLES]; NUM_GOAL_VARIABLES];
    for &(i, j, value) in cluster.pairs {
        m[i][j] = value;
        m[j][i] = value;
    }
    m
}

#[derive(Debug, Clone)]
pub struct GoalVariables {
    pub p: [f64; NUM_GOAL_VARIABLES],
    pub w: [f64; NUM_GOAL_VARIABLES],
    pub l: [f64; NUM_GOAL_VARIABLES],
}

impl Default for GoalVariables {
    fn default() -> Self {
        Self {
            p: [0.5; NUM_GOAL_VARIABLES],
            w: [1.0 / NUM_GOAL_VARIABLES as f64; NUM_GOAL_VARIABLES],
            l: [1.0; NUM_GOAL_VARIABLES],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryGraphInfluence {
    pub s_positive: f64,
    pub s_negative: f64,
    pub t_trauma: f64,
}

impl MemoryGraphInfluence {
    pub fn compute(&self, alpha_pos: f64, alpha_neg: f64, gamma: f64) -> f64 {
        alpha_pos * self.s_positive - alpha_neg * self.s_negative - gamma * self.t_trauma
    }
}

#[derive(Debug, Clone)]
pub struct GoalState {
    pub g: f64,
    pub g_raw: f64,
    pub variables: GoalVariables,
    pub resilience: f64,
    pub stochasticity: f64,
    pub memory_influence: MemoryGraphInfluence,
    pub dominant_variable: &'static str,
    pub dominant_value: f64,
    pub emergency_override: bool,
    pub emergency_goal: Option<String>,
}

pub struct GoalEngine {
    config: GoalConfig,
    variables: GoalVariables,
    positive_interactions: [[f64; NUM_GOAL_VARIABLES]; NUM_GOAL_VARIABLES],
    negative_interactions: [[f64; NUM_GOAL_VARIABLES]; NUM_GOAL_VARIABLES],
    resilience: f64,
    memory_influence: MemoryGraphInfluence,
    emergency_flag: bool,
    emergency_goal: Option<String>,
    history: VecDeque<f64>,
    history_capacity: usize,
    rng: StdRng,
}

impl GoalEngine {
    /// Seeds the stochastic term from OS entropy. Use `with_seed` in tests
    /// that need `generate_stochasticity` to be deterministic.
    pub fn new(config: GoalConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_seed(config: GoalConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GoalConfig, rng: StdRng) -> Self {
        let mut variables = GoalVariables::default();
        variables.w = config.initial_weights;
        Self {
            resilience: config.resilience_base,
            config,
            variables,
            positive_interactions: build_matrix(&POSITIVE_CLUSTER),
            negative_interactions: build_matrix(&NEGATIVE_CLUSTER),
            memory_influence: MemoryGraphInfluence::default(),
            emergency_flag: false,
            emergency_goal: None,
            history: VecDeque::new(),
            history_capacity: 200,
            rng,
        }
    }

    pub fn set_emergency(&mut self, active: bool, label: Option<String>) {
        self.emergency_flag = active;
        self.emergency_goal = label;
    }

    pub fn set_memory_influence(&mut self, influence: MemoryGraphInfluence) {
        self.memory_influence = influence;
    }

    /// Box-Muller transform over the engine's own seedable RNG.
    fn gaussian(&mut self, mean: f64, amplitude: f64) -> f64 {
        let u1: f64 = self.rng.gen_range(1e-12..1.0);
        let u2: f64 = self.rng.gen_range(0.0..1.0);
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + amplitude * z
    }

    /// One tick of the ADDO-model update. Returns the new `GoalState`.
    pub fn tick(&mut self, affect: &AffectVector, ft: f64, wisdom: f64) -> GoalState {
        if self.emergency_flag && self.config.emergency_override {
            let state = GoalState {
                g: 1.0,
                g_raw: 1.0,
                variables: self.variables.clone(),
                resilience: self.resilience,
                stochasticity: 0.0,
                memory_influence: self.memory_influence.clone(),
                dominant_variable: GOAL_VARIABLE_NAMES[0],
                dominant_value: 1.0,
                emergency_override: true,
                emergency_goal: self.emergency_goal.clone(),
            };
            self.push_history(1.0);
            return state;
        }

        for i in 0..NUM_EMOTIONS {
            let intensity = affect.values[i];
            if intensity < self.config.emotion_intensity_floor {
                continue;
            }
            for j in 0..NUM_GOAL_VARIABLES {
                let w = EMOTION_VARIABLE_WEIGHTS[i][j];
                if w == 0.0 {
                    continue;
                }
                self.variables.p[j] = (self.variables.p[j]
                    + self.config.emotion_mapping_attenuation * intensity * w)
                    .clamp(0.0, 1.0);
            }
        }

        if self.config.use_sentiment_for_feelings {
            self.variables.p[IDX_G_FEELINGS] = ((ft + 1.0) / 2.0).clamp(0.0, 1.0);
        }
        self.variables.p[IDX_G_EMOTIONAL_MEMORIES] = affect.valence().clamp(0.0, 1.0);

        if self.config.use_wisdom_modulation {
            let rate = self.config.weight_adaptation_rate;
            for i in 0..NUM_GOAL_VARIABLES {
                let target = self.config.initial_weights[i] * wisdom;
                self.variables.w[i] += rate * (target - self.variables.w[i]);
            }
            let sum: f64 = self.variables.w.iter().sum();
            if sum > 1e-9 {
                for w in &mut self.variables.w {
                    *w /= sum;
                }
            }
        }

        let weighted_sum: f64 = (0..NUM_GOAL_VARIABLES)
            .map(|i| self.variables.w[i] * self.variables.p[i] * self.variables.l[i])
            .sum();

        let mut pos_interactions = 0.0;
        let mut neg_interactions = 0.0;
        for i in 0..NUM_GOAL_VARIABLES {
            for j in (i + 1)..NUM_GOAL_VARIABLES {
                pos_interactions += self.positive_interactions[i][j] * self.variables.p[i] * self.variables.p[j];
                neg_interactions += self.negative_interactions[i][j] * self.variables.p[i] * self.variables.p[j];
            }
        }
        pos_interactions *= self.config.interaction_positive_scale;
        neg_interactions *= self.config.interaction_negative_scale;

        let resilience_term =
            0.1 * self.resilience * (1.0 - (self.variables.p[IDX_G_REGRETS] + self.variables.p[IDX_G_TRAUMAS]));
        let stochastic_term = self.gaussian(self.config.stochasticity_bias, self.config.stochasticity_amplitude);
        let memory_term = self.memory_influence.compute(
            self.config.alpha_memory_positive,
            self.config.alpha_memory_negative,
            self.config.gamma_trauma,
        );

        let g_raw = weighted_sum + pos_interactions - neg_interactions + resilience_term + stochastic_term + memory_term;
        let g = if self.config.use_sigmoid_output {
            1.0 / (1.0 + (-self.config.sigmoid_steepness * (g_raw - 0.5)).exp())
        } else {
            g_raw.clamp(0.0, 1.0)
        };

        self.resilience =
            (self.resilience + self.config.resilience_growth_rate).min(self.config.resilience_max);

        let (dominant_idx, dominant_value) = (0..NUM_GOAL_VARIABLES)
            .map(|i| (i, self.variables.w[i] * self.variables.p[i] * self.variables.l[i]))
            .fold((0usize, 0.0), |acc, x| if x.1 > acc.1 { x } else { acc });

        self.push_history(g);

        GoalState {
            g,
            g_raw,
            variables: self.variables.clone(),
            resilience: self.resilience,
            stochasticity: stochastic_term,
            memory_influence: self.memory_influence.clone(),
            dominant_variable: GOAL_VARIABLE_NAMES[dominant_idx],
            dominant_value,
            emergency_override: false,
            emergency_goal: None,
        }
    }

    /// Decays resilience after a trauma activation.
    pub fn apply_trauma_decay(&mut self) {
        self.resilience = (self.resilience - self.config.resilience_decay_on_trauma).max(0.0);
    }

    fn push_history(&mut self, g: f64) {
        if self.history.len() >= self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(g);
    }

    pub fn history(&self) -> &VecDeque<f64> {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_override_forces_goal_to_one() {
        let mut engine = GoalEngine::new(GoalConfig::default());
        engine.set_emergency(true, Some("FLEE".to_string()));
        let state = engine.tick(&AffectVector::default(), 0.0, 1.0);
        assert_eq!(state.g, 1.0);
        assert!(state.emergency_override);
    }

    #[test]
    fn joy_emotion_raises_feelings_variable() {
        let mut engine = GoalEngine::new(GoalConfig::default());
        let mut values = [0.05; NUM_EMOTIONS];
        values[IDX_JOY] = 0.9;
        let affect = AffectVector::new(values);
        let before = engine.tick(&AffectVector::default(), 0.0, 1.0).variables.p[IDX_G_FEELINGS];
        let after = engine.tick(&affect, 0.0, 1.0).variables.p[IDX_G_FEELINGS];
        assert!(after >= before);
    }

    #[test]
    fn weights_stay_normalized_after_wisdom_modulation() {
        let mut engine = GoalEngine::new(GoalConfig::default());
        for _ in 0..10 {
            engine.tick(&AffectVector::default(), 0.2, 1.5);
        }
        let sum: f64 = engine.variables.w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn trauma_decay_reduces_resilience() {
        let mut engine = GoalEngine::new(GoalConfig::default());
        let before = engine.resilience;
        engine.apply_trauma_decay();
        assert!(engine.resilience < before);
    }

    #[test]
    fn same_seed_yields_identical_stochastic_term() {
        let mut a = GoalEngine::with_seed(GoalConfig::default(), 42);
        let mut b = GoalEngine::with_seed(GoalConfig::default(), 42);
        let sa = a.tick(&AffectVector::default(), 0.0, 1.0).stochasticity;
        let sb = b.tick(&AffectVector::default(), 0.0, 1.0).stochasticity;
        assert_eq!(sa, sb);
    }
}
