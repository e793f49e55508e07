//! Core data types shared across the engine: the 24-D affect vector, its
//! fixed emotion-name table and valence partition, and the small value types
//! (feedback, environment, trauma) that flow between components.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of tracked emotions. Fixed by the affect classifier upstream of
/// this engine; every array here is backed by a contiguous `[f64; NUM_EMOTIONS]`
/// rather than a map.
pub const NUM_EMOTIONS: usize = 24;

/// Number of goal variables tracked by the goal engine (C9).
pub const NUM_GOAL_VARIABLES: usize = 16;

/// Canonical, order-fixed emotion names. Every 24-D array in this crate is
/// indexed against this table; do not reorder without updating
/// `POSITIVE_VALENCE_INDICES`/`NEGATIVE_VALENCE_INDICES` and
/// `goals::EMOTION_VARIABLE_WEIGHTS` in lock-step.
pub const EMOTION_NAMES: [&str; NUM_EMOTIONS] = [
    "Admiration",
    "Adoration",
    "AestheticAppreciation",
    "Amusement",
    "Anxiety",
    "Awe",
    "Embarrassment",
    "Boredom",
    "Calm",
    "Confusion",
    "Disgust",
    "EmpathicPain",
    "Fascination",
    "Excitement",
    "Fear",
    "Horror",
    "Interest",
    "Joy",
    "Nostalgia",
    "Relief",
    "Sadness",
    "Satisfaction",
    "Sympathy",
    "Triumph",
];

/// Indices of `EMOTION_NAMES` carrying positive valence.
pub const POSITIVE_VALENCE_INDICES: [usize; 14] =
    [0, 1, 2, 3, 5, 8, 12, 13, 16, 17, 19, 21, 22, 23];

/// Indices of `EMOTION_NAMES` carrying negative valence.
pub const NEGATIVE_VALENCE_INDICES: [usize; 10] = [4, 6, 7, 9, 10, 11, 14, 15, 18, 20];

pub const IDX_FEAR: usize = 14;
pub const IDX_HORROR: usize = 15;
pub const IDX_ANXIETY: usize = 4;
pub const IDX_JOY: usize = 17;
pub const IDX_SATISFACTION: usize = 21;
pub const IDX_EXCITEMENT: usize = 13;
pub const IDX_SADNESS: usize = 20;
pub const IDX_DISGUST: usize = 10;
pub const IDX_CONFUSION: usize = 9;

/// Emotions the amygdala (C10) treats as critical / hypersensitive.
pub const CRITICAL_EMOTIONS: [usize; 3] = [IDX_FEAR, IDX_HORROR, IDX_ANXIETY];

/// Names of the 16 goal variables, fixed order.
pub const GOAL_VARIABLE_NAMES: [&str; NUM_GOAL_VARIABLES] = [
    "Values",
    "Motivations",
    "Experiences",
    "Feelings",
    "Clarity",
    "Environment",
    "Competences",
    "Needs",
    "Models",
    "SelfKnowledge",
    "Beliefs",
    "Surpassing",
    "Circumstances",
    "EmotionalMemories",
    "Regrets",
    "Traumas",
];

pub const IDX_G_VALUES: usize = 0;
pub const IDX_G_MOTIVATIONS: usize = 1;
pub const IDX_G_EXPERIENCES: usize = 2;
pub const IDX_G_FEELINGS: usize = 3;
pub const IDX_G_CLARITY: usize = 4;
pub const IDX_G_ENVIRONMENT: usize = 5;
pub const IDX_G_COMPETENCES: usize = 6;
pub const IDX_G_NEEDS: usize = 7;
pub const IDX_G_MODELS: usize = 8;
pub const IDX_G_SELF_KNOWLEDGE: usize = 9;
pub const IDX_G_BELIEFS: usize = 10;
pub const IDX_G_SURPASSING: usize = 11;
pub const IDX_G_CIRCUMSTANCES: usize = 12;
pub const IDX_G_EMOTIONAL_MEMORIES: usize = 13;
pub const IDX_G_REGRETS: usize = 14;
pub const IDX_G_TRAUMAS: usize = 15;

/// A 24-D affect vector plus its derived summary fields.
///
/// `e_global` and `variance_global` are derived, not independently settable
/// in normal use; `recompute_summary` keeps them in sync with `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectVector {
    pub values: [f64; NUM_EMOTIONS],
    pub e_global: f64,
    pub variance_global: f64,
}

impl Default for AffectVector {
    fn default() -> Self {
        Self {
            values: [0.0; NUM_EMOTIONS],
            e_global: 0.0,
            variance_global: 0.0,
        }
    }
}

impl AffectVector {
    pub fn new(values: [f64; NUM_EMOTIONS]) -> Self {
        let mut v = Self {
            values,
            e_global: 0.0,
            variance_global: 0.0,
        };
        v.recompute_summary();
        v
    }

    /// Recomputes `e_global` (mean) and `variance_global` (population
    /// variance) from `values`. Call after any in-place mutation.
    pub fn recompute_summary(&mut self) {
        let mean = self.values.iter().sum::<f64>() / NUM_EMOTIONS as f64;
        let var = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / NUM_EMOTIONS as f64;
        self.e_global = mean;
        self.variance_global = var.max(0.0);
    }

    /// Index, name and value of the dominant (highest-value) emotion.
    pub fn dominant(&self) -> (usize, &'static str, f64) {
        let mut idx = 0;
        let mut max = self.values[0];
        for (i, &v) in self.values.iter().enumerate().skip(1) {
            if v > max {
                max = v;
                idx = i;
            }
        }
        (idx, EMOTION_NAMES[idx], max)
    }

    /// Valence in [0, 1]: share of positive-valence mass among all
    /// valence-partitioned emotions. Returns 0.5 when both sums are ~0.
    pub fn valence(&self) -> f64 {
        let pos: f64 = POSITIVE_VALENCE_INDICES.iter().map(|&i| self.values[i]).sum();
        let neg: f64 = NEGATIVE_VALENCE_INDICES.iter().map(|&i| self.values[i]).sum();
        let total = pos + neg;
        if total < 1e-6 {
            0.5
        } else {
            pos / total
        }
    }

    /// Signed valence in [-1, 1]: `2*valence() - 1`.
    pub fn signed_valence(&self) -> f64 {
        2.0 * self.valence() - 1.0
    }

    pub fn cosine_similarity(&self, other: &AffectVector) -> f64 {
        cosine(&self.values, &other.values)
    }
}

/// Cosine similarity of two equal-length vectors, clamped to [0, 1].
/// Affect values are non-negative so a negative cosine should not occur;
/// the clamp only guards against floating-point noise at the boundary.
pub fn cosine(a: &[f64; NUM_EMOTIONS], b: &[f64; NUM_EMOTIONS]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na < 1e-9 || nb < 1e-9 {
        return 0.0;
    }
    (dot / (na * nb)).clamp(0.0, 1.0)
}

/// A timestamped affect state, optionally carrying the utterance it
/// coincided with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedState {
    pub affect: AffectVector,
    pub timestamp_ms: u64,
    pub utterance: Option<UtteranceContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtteranceContext {
    pub sentiment: f64,
    pub arousal: f64,
    pub text: String,
}

/// Wall-clock milliseconds since the epoch, used as the engine's timestamp
/// source. Buffer ordering additionally relies on arrival order, not solely
/// on this clock.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// External feedback signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeedbackState {
    pub valence: f64,
    pub intensity: f64,
    pub credibility: f64,
}

impl Default for FeedbackState {
    fn default() -> Self {
        Self {
            valence: 0.0,
            intensity: 0.0,
            credibility: 0.0,
        }
    }
}

impl FeedbackState {
    /// `valence * intensity * credibility`.
    pub fn score(&self) -> f64 {
        self.valence * self.intensity * self.credibility
    }
}

/// Ambient environment descriptor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EnvironmentState {
    pub hostility: f64,
    pub noise: f64,
    pub familiarity: f64,
    pub social_density: f64,
}

impl Default for EnvironmentState {
    fn default() -> Self {
        Self {
            hostility: 0.0,
            noise: 0.0,
            familiarity: 0.0,
            social_density: 0.0,
        }
    }
}

/// Kind of trauma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraumaKind {
    Physical,
    Emotional,
    Social,
}

/// A trauma descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trauma {
    pub kind: TraumaKind,
    pub intensity: f64,
    pub activation_time_ms: u64,
    pub trigger_context: String,
    pub source_memory_id: Option<uuid::Uuid>,
}

impl Trauma {
    pub fn is_active(&self) -> bool {
        self.intensity > 0.1
    }

    pub fn is_dominant(&self, trauma_dominance_threshold: f64) -> bool {
        self.intensity >= trauma_dominance_threshold
    }
}

/// Six fixed memory-activation scores fed into the consciousness engine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MemoryActivation {
    /// Short-term / "current" memory contribution.
    pub mct: f64,
    /// Long-term pattern memory contribution.
    pub mlt: f64,
    /// Procedural memory contribution.
    pub mp: f64,
    /// Episodic memory contribution.
    pub me: f64,
    /// Semantic memory contribution.
    pub ms: f64,
    /// Autobiographical/identity memory contribution.
    pub ma: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_recompute_matches_manual_mean_and_variance() {
        let mut values = [0.0; NUM_EMOTIONS];
        values[0] = 1.0;
        values[1] = 0.5;
        let v = AffectVector::new(values);
        let mean = 1.5 / NUM_EMOTIONS as f64;
        assert!((v.e_global - mean).abs() < 1e-12);
        assert!(v.variance_global >= 0.0);
    }

    #[test]
    fn valence_defaults_to_half_when_all_zero() {
        let v = AffectVector::default();
        assert!((v.valence() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn dominant_picks_max_index() {
        let mut values = [0.1; NUM_EMOTIONS];
        values[IDX_JOY] = 0.9;
        let v = AffectVector::new(values);
        let (idx, name, val) = v.dominant();
        assert_eq!(idx, IDX_JOY);
        assert_eq!(name, "Joy");
        assert!((val - 0.9).abs() < 1e-12);
    }

    #[test]
    fn cosine_similarity_is_one_for_identical_vectors() {
        let mut values = [0.0; NUM_EMOTIONS];
        values[0] = 0.3;
        values[5] = 0.7;
        let v = AffectVector::new(values);
        assert!((v.cosine_similarity(&v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn trauma_active_and_dominant_thresholds() {
        let t = Trauma {
            kind: TraumaKind::Physical,
            intensity: 0.75,
            activation_time_ms: 0,
            trigger_context: String::new(),
            source_memory_id: None,
        };
        assert!(t.is_active());
        assert!(t.is_dominant(0.7));
        assert!(!t.is_dominant(0.8));
    }
}
