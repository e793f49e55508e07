//! C3 — pattern store (PS): an ordered set of affect patterns (coefficients
//! + signature) with similarity matching and on-line update/merge/prune.

use crate::buffer::Signature;
use crate::config::PatternStoreConfig;
use crate::error::{EngineError, EngineResult};
use crate::types::{cosine, now_ms, NUM_EMOTIONS};
use crate::utils::generate_id_with_prefix;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// The parametric update-law coefficients `(alpha, beta, gamma, delta, theta)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coefficients {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
    pub theta: f64,
}

impl Coefficients {
    /// Sum-normalises the five coefficients to 1, used by feedback adjustment.
    pub fn renormalize(&mut self) {
        let sum = self.alpha + self.beta + self.gamma + self.delta + self.theta;
        if sum > 1e-9 {
            self.alpha /= sum;
            self.beta /= sum;
            self.gamma /= sum;
            self.delta /= sum;
            self.theta /= sum;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSignature {
    pub mean: [f64; NUM_EMOTIONS],
    pub std_dev: [f64; NUM_EMOTIONS],
    pub trend: [f64; NUM_EMOTIONS],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    pub description: String,
    pub signature: PatternSignature,
    pub coefficients: Coefficients,
    pub emergency_threshold: f64,
    pub memory_trigger_threshold: f64,
    pub activation_count: u64,
    pub confidence: f64,
    pub avg_duration_s: f64,
    pub created_at_ms: u64,
    pub last_activated_ms: u64,
    pub parent_ids: Vec<String>,
    pub child_ids: Vec<String>,
    pub transition_probabilities: HashMap<String, f64>,
    pub is_base: bool,
    pub is_active: bool,
    pub is_locked: bool,
}

impl Pattern {
    fn new(id: String, name: String, description: String, signature: PatternSignature, coefficients: Coefficients, confidence: f64) -> Self {
        let now = now_ms();
        Self {
            id,
            name,
            description,
            signature,
            coefficients,
            emergency_threshold: 0.7,
            memory_trigger_threshold: 0.5,
            activation_count: 0,
            confidence,
            avg_duration_s: 0.0,
            created_at_ms: now,
            last_activated_ms: now,
            parent_ids: Vec::new(),
            child_ids: Vec::new(),
            transition_probabilities: HashMap::new(),
            is_base: false,
            is_active: true,
            is_locked: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub pattern_id: String,
    pub similarity: f64,
    pub confidence: f64,
}

/// Ordered set of affect patterns keyed by stable id.
pub struct PatternStore {
    config: PatternStoreConfig,
    patterns: HashMap<String, Pattern>,
    order: Vec<String>,
    next_id: u64,
}

impl PatternStore {
    /// Builds a fresh store seeded with the 8 base patterns
    /// (SERENITY, JOY, EXPLORATION, ANXIETY, FEAR, SADNESS, DISGUST, CONFUSION).
    pub fn new(config: PatternStoreConfig) -> Self {
        let mut store = Self {
            config,
            patterns: HashMap::new(),
            order: Vec::new(),
            next_id: 0,
        };
        for base in base_patterns() {
            store.order.push(base.id.clone());
            store.patterns.insert(base.id.clone(), base);
        }
        store
    }

    pub fn get(&self, id: &str) -> Option<&Pattern> {
        self.patterns.get(id)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Similarity = cosine on mean-emotion vectors plus up to 0.2 valence/arousal
    /// proximity bonus, clipped to [0,1]. Returns up to `k` matches at or above
    /// `min_similarity_threshold`, sorted by `similarity * confidence`.
    pub fn find_matches(&self, sig: &Signature, k: usize) -> Vec<PatternMatch> {
        let mut scored: Vec<PatternMatch> = self
            .patterns
            .values()
            .map(|p| {
                let base = cosine(&p.signature.mean, &sig.mean);
                let p_valence = crate::types::AffectVector::new(p.signature.mean).valence();
                let valence_bonus = (0.1 * (1.0 - (p_valence - sig.global_valence).abs())).max(0.0);
                let p_arousal = p.signature.std_dev.iter().sum::<f64>() / NUM_EMOTIONS as f64;
                let arousal_bonus = (0.1 * (1.0 - (p_arousal - sig.global_arousal).abs())).max(0.0);
                let similarity = (base + valence_bonus + arousal_bonus).clamp(0.0, 1.0);
                PatternMatch {
                    pattern_id: p.id.clone(),
                    similarity,
                    confidence: p.confidence,
                }
            })
            .filter(|m| m.similarity >= self.config.min_similarity_threshold)
            .collect();
        scored.sort_by(|a, b| {
            (b.similarity * b.confidence)
                .partial_cmp(&(a.similarity * a.confidence))
                .unwrap()
        });
        scored.truncate(k);
        scored
    }

    /// Creates a new pattern from `sig`. `name` defaults to the top-two
    /// dominant emotions when absent.
    pub fn create(&mut self, sig: &Signature, name: Option<String>) -> String {
        let name = name.unwrap_or_else(|| top_two_dominant_name(sig));
        self.next_id += 1;
        let id = generate_id_with_prefix("pattern", self.next_id);
        let signature = PatternSignature {
            mean: sig.mean,
            std_dev: sig.std_dev,
            trend: sig.trend,
        };
        let pattern = Pattern::new(
            id.clone(),
            name,
            String::new(),
            signature,
            default_coefficients(),
            self.config.min_confidence_for_creation,
        );
        debug!(pattern_id = %id, "pattern created");
        self.order.push(id.clone());
        self.patterns.insert(id.clone(), pattern);
        id
    }

    /// EMA update of a pattern's signature and, optionally, its confidence
    /// from a scalar feedback in [-1,1]. No-op on base/locked patterns.
    pub fn update(&mut self, id: &str, sig: &Signature, feedback: Option<f64>) -> EngineResult<()> {
        let lambda = self.config.learning_rate;
        let Some(pattern) = self.patterns.get_mut(id) else {
            return Err(EngineError::NotReady(format!("unknown pattern {id}")));
        };
        if pattern.is_base || pattern.is_locked {
            return Ok(());
        }
        for i in 0..NUM_EMOTIONS {
            pattern.signature.mean[i] = (1.0 - lambda) * pattern.signature.mean[i] + lambda * sig.mean[i];
            pattern.signature.std_dev[i] =
                (1.0 - lambda) * pattern.signature.std_dev[i] + lambda * sig.std_dev[i];
            pattern.signature.trend[i] = (1.0 - lambda) * pattern.signature.trend[i] + lambda * sig.trend[i];
        }
        if let Some(fb) = feedback {
            pattern.confidence = (pattern.confidence + 0.1 * fb).clamp(0.0, 1.0);
        }
        pattern.last_activated_ms = now_ms();
        Ok(())
    }

    /// Requires both non-base, both with `activation_count >=
    /// min_activations_for_fusion`. Deactivates the sources (never deletes).
    pub fn merge(&mut self, id_a: &str, id_b: &str) -> EngineResult<String> {
        let (a, b) = {
            let a = self
                .patterns
                .get(id_a)
                .ok_or_else(|| EngineError::NotReady(format!("unknown pattern {id_a}")))?
                .clone();
            let b = self
                .patterns
                .get(id_b)
                .ok_or_else(|| EngineError::NotReady(format!("unknown pattern {id_b}")))?
                .clone();
            (a, b)
        };
        if a.is_base || b.is_base {
            return Err(EngineError::PatternLocked(format!(
                "cannot merge base patterns {id_a}/{id_b}"
            )));
        }
        let min_activations = self.config.min_activations_for_fusion;
        if a.activation_count < min_activations || b.activation_count < min_activations {
            return Err(EngineError::Validation {
                code: crate::error::ValidationCode::OutOfRange,
                message: "both patterns must meet min_activations_for_fusion".to_string(),
                offending_index: None,
                offending_value: None,
            });
        }
        let w1 = a.activation_count as f64 / (a.activation_count + b.activation_count + 1) as f64;
        let w2 = 1.0 - w1;
        let mut mean = [0.0; NUM_EMOTIONS];
        let mut std_dev = [0.0; NUM_EMOTIONS];
        let mut trend = [0.0; NUM_EMOTIONS];
        for i in 0..NUM_EMOTIONS {
            mean[i] = w1 * a.signature.mean[i] + w2 * b.signature.mean[i];
            std_dev[i] = w1 * a.signature.std_dev[i] + w2 * b.signature.std_dev[i];
            trend[i] = w1 * a.signature.trend[i] + w2 * b.signature.trend[i];
        }
        let coefficients = Coefficients {
            alpha: w1 * a.coefficients.alpha + w2 * b.coefficients.alpha,
            beta: w1 * a.coefficients.beta + w2 * b.coefficients.beta,
            gamma: w1 * a.coefficients.gamma + w2 * b.coefficients.gamma,
            delta: w1 * a.coefficients.delta + w2 * b.coefficients.delta,
            theta: w1 * a.coefficients.theta + w2 * b.coefficients.theta,
        };
        self.next_id += 1;
        let new_id = generate_id_with_prefix("pattern", self.next_id);
        let mut merged = Pattern::new(
            new_id.clone(),
            format!("{}+{}", a.name, b.name),
            format!("merged from {} and {}", a.description, b.description),
            PatternSignature { mean, std_dev, trend },
            coefficients,
            (a.confidence + b.confidence) / 2.0,
        );
        merged.activation_count = a.activation_count + b.activation_count;
        merged.emergency_threshold = a.emergency_threshold.min(b.emergency_threshold);
        merged.parent_ids = vec![a.id.clone(), b.id.clone()];

        self.order.push(new_id.clone());
        self.patterns.insert(new_id.clone(), merged);
        if let Some(p) = self.patterns.get_mut(id_a) {
            p.is_active = false;
            p.child_ids.push(new_id.clone());
        }
        if let Some(p) = self.patterns.get_mut(id_b) {
            p.is_active = false;
            p.child_ids.push(new_id.clone());
        }
        debug!(pattern_id = %new_id, from_a = %id_a, from_b = %id_b, "patterns merged");
        Ok(new_id)
    }

    /// Removes non-base, non-locked patterns below `min_confidence_to_keep`
    /// or inactive for more than `days_before_pruning` with few activations.
    /// If still over `max_patterns`, removes by ascending
    /// `confidence * ln(1+activation_count)` until size == max.
    pub fn prune(&mut self) -> usize {
        let now = now_ms();
        let day_ms = 86_400_000.0;
        let mut removed = 0usize;

        let to_remove: Vec<String> = self
            .patterns
            .values()
            .filter(|p| !p.is_base && !p.is_locked)
            .filter(|p| {
                let idle_days = (now.saturating_sub(p.last_activated_ms)) as f64 / day_ms;
                p.confidence < self.config.min_confidence_to_keep
                    || (idle_days > self.config.days_before_pruning && p.activation_count < 5)
            })
            .map(|p| p.id.clone())
            .collect();
        for id in to_remove {
            self.patterns.remove(&id);
            self.order.retain(|x| x != &id);
            removed += 1;
        }

        if self.patterns.len() > self.config.max_patterns {
            let mut candidates: Vec<(String, f64)> = self
                .patterns
                .values()
                .filter(|p| !p.is_base && !p.is_locked)
                .map(|p| (p.id.clone(), p.confidence * (1.0 + p.activation_count as f64).ln()))
                .collect();
            candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
            let excess = self.patterns.len() - self.config.max_patterns;
            for (id, _) in candidates.into_iter().take(excess) {
                self.patterns.remove(&id);
                self.order.retain(|x| x != &id);
                removed += 1;
            }
        }
        removed
    }

    /// Increments activation counters and normalises the per-pattern
    /// transition-probability map to sum 1.
    pub fn record_activation(&mut self, id: &str) {
        if let Some(p) = self.patterns.get_mut(id) {
            p.activation_count += 1;
            p.last_activated_ms = now_ms();
        }
    }

    pub fn record_transition(&mut self, from: &str, to: &str) {
        if let Some(p) = self.patterns.get_mut(from) {
            *p.transition_probabilities.entry(to.to_string()).or_insert(0.0) += 1.0;
            let sum: f64 = p.transition_probabilities.values().sum();
            if sum > 0.0 {
                for v in p.transition_probabilities.values_mut() {
                    *v /= sum;
                }
            }
        }
    }

    /// Adjusts `coefficients` toward a fixed mean of 0.2 proportional to
    /// `learning_rate * feedback`, then renormalises their sum to 1.
    pub fn adjust_coefficients(&mut self, id: &str, feedback: f64) {
        let lr = self.config.feedback_learning_rate;
        if let Some(p) = self.patterns.get_mut(id) {
            if p.is_base || p.is_locked {
                return;
            }
            let c = &mut p.coefficients;
            c.alpha += lr * feedback * (0.2 - c.alpha);
            c.beta += lr * feedback * (0.2 - c.beta);
            c.gamma += lr * feedback * (0.2 - c.gamma);
            c.delta += lr * feedback * (0.2 - c.delta);
            c.theta += lr * feedback * (0.2 - c.theta);
            c.renormalize();
        }
    }
}

fn default_coefficients() -> Coefficients {
    Coefficients {
        alpha: 0.2,
        beta: 0.2,
        gamma: 0.2,
        delta: 0.2,
        theta: 0.2,
    }
}

fn top_two_dominant_name(sig: &Signature) -> String {
    let mut indices: Vec<usize> = (0..NUM_EMOTIONS).collect();
    indices.sort_by(|&a, &b| sig.mean[b].partial_cmp(&sig.mean[a]).unwrap());
    format!(
        "{}-{}",
        crate::types::EMOTION_NAMES[indices[0]],
        crate::types::EMOTION_NAMES[indices[1]]
    )
}

/// The 8 base patterns installed at init, declaratively so tests can pin
/// their signatures. Never pruned or merged away (`is_base`).
fn base_patterns() -> Vec<Pattern> {
    let specs: [(&str, &str, [f64; NUM_EMOTIONS]); 8] = [
        ("SERENITY", "Serenity", peak(8, 0.7)),
        ("JOY", "Joy", peak(17, 0.8)),
        ("EXPLORATION", "Exploration", peak(16, 0.75)),
        ("ANXIETY", "Anxiety", peak(4, 0.7)),
        ("FEAR", "Fear", peak(14, 0.8)),
        ("SADNESS", "Sadness", peak(20, 0.7)),
        ("DISGUST", "Disgust", peak(10, 0.7)),
        ("CONFUSION", "Confusion", peak(9, 0.6)),
    ];
    specs
        .into_iter()
        .map(|(id, name, mean)| {
            let mut p = Pattern::new(
                id.to_string(),
                name.to_string(),
                format!("base pattern: {name}"),
                PatternSignature {
                    mean,
                    std_dev: [0.05; NUM_EMOTIONS],
                    trend: [0.0; NUM_EMOTIONS],
                },
                default_coefficients(),
                1.0,
            );
            p.is_base = true;
            p.is_locked = true;
            p
        })
        .collect()
}

fn peak(index: usize, value: f64) -> [f64; NUM_EMOTIONS] {
    let mut v = [0.05; NUM_EMOTIONS];
    v[index] = value;
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_seeds_eight_base_patterns() {
        let store = PatternStore::new(PatternStoreConfig::default());
        assert_eq!(store.len(), 8);
        assert!(store.get("SERENITY").unwrap().is_base);
    }

    #[test]
    fn base_patterns_are_never_modified_by_update() {
        let mut store = PatternStore::new(PatternStoreConfig::default());
        let sig = Signature {
            mean: [0.9; NUM_EMOTIONS],
            std_dev: [0.0; NUM_EMOTIONS],
            trend: [0.0; NUM_EMOTIONS],
            second_derivative: [0.0; NUM_EMOTIONS],
            oscillation_count: [0; NUM_EMOTIONS],
            peak_position: [0.0; NUM_EMOTIONS],
            global_intensity: 0.9,
            global_valence: 0.9,
            global_arousal: 0.0,
            stability: 1.0,
            dominant_frequency: 0.0,
        };
        let before = store.get("SERENITY").unwrap().signature.mean;
        store.update("SERENITY", &sig, None).unwrap();
        let after = store.get("SERENITY").unwrap().signature.mean;
        assert_eq!(before, after);
    }

    #[test]
    fn create_assigns_dominant_emotion_name_when_none_given() {
        let mut store = PatternStore::new(PatternStoreConfig::default());
        let sig = Signature {
            mean: peak(17, 0.9),
            std_dev: [0.0; NUM_EMOTIONS],
            trend: [0.0; NUM_EMOTIONS],
            second_derivative: [0.0; NUM_EMOTIONS],
            oscillation_count: [0; NUM_EMOTIONS],
            peak_position: [0.0; NUM_EMOTIONS],
            global_intensity: 0.9,
            global_valence: 0.9,
            global_arousal: 0.0,
            stability: 1.0,
            dominant_frequency: 0.0,
        };
        let id = store.create(&sig, None);
        assert!(store.get(&id).unwrap().name.starts_with("Joy"));
    }

    #[test]
    fn merge_requires_both_non_base() {
        let mut store = PatternStore::new(PatternStoreConfig::default());
        assert!(store.merge("SERENITY", "JOY").is_err());
    }

    #[test]
    fn adjust_coefficients_keeps_sum_normalized() {
        let mut store = PatternStore::new(PatternStoreConfig::default());
        let sig = Signature {
            mean: peak(17, 0.9),
            std_dev: [0.0; NUM_EMOTIONS],
            trend: [0.0; NUM_EMOTIONS],
            second_derivative: [0.0; NUM_EMOTIONS],
            oscillation_count: [0; NUM_EMOTIONS],
            peak_position: [0.0; NUM_EMOTIONS],
            global_intensity: 0.9,
            global_valence: 0.9,
            global_arousal: 0.0,
            stability: 1.0,
            dominant_frequency: 0.0,
        };
        let id = store.create(&sig, None);
        store.adjust_coefficients(&id, 0.8);
        let c = store.get(&id).unwrap().coefficients;
        let sum = c.alpha + c.beta + c.gamma + c.delta + c.theta;
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
