//! C7 — memory manager: in-process memory store with pattern-aware
//! scoring, influence aggregation, forgetting and consolidation decisions.

use crate::config::MemoryConfig;
use crate::types::{now_ms, AffectVector, NUM_EMOTIONS};
use crate::utils::generate_id_with_prefix;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsolidationAction {
    Trauma,
    ConsolidateStrong,
    ConsolidateNormal,
    Forget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub affect: AffectVector,
    pub pattern_id: String,
    pub context: String,
    pub weight: f64,
    pub activation: f64,
    pub activation_count: u64,
    pub is_trauma: bool,
    pub created_at_ms: u64,
    pub last_activated_ms: u64,
}

pub struct MemoryManager {
    config: MemoryConfig,
    memories: Vec<Memory>,
    next_id: u64,
}

fn is_fear_family(name: &str) -> bool {
    matches!(name, "Fear" | "Horror" | "Anxiety")
}

fn is_anxiety_family(name: &str) -> bool {
    matches!(name, "Anxiety" | "Embarrassment" | "EmpathicPain")
}

impl MemoryManager {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            memories: Vec::new(),
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    pub fn trauma_count(&self) -> usize {
        self.memories.iter().filter(|m| m.is_trauma).count()
    }

    /// Scores every memory against the active pattern and affect, returns
    /// the top `max` descending.
    pub fn query_relevant(&self, pattern_name: &str, affect: &AffectVector, max: usize) -> Vec<&Memory> {
        let mut scored: Vec<(&Memory, f64)> = self
            .memories
            .iter()
            .map(|m| (m, self.score(pattern_name, affect, m)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        scored.truncate(max);
        scored.into_iter().map(|(m, _)| m).collect()
    }

    fn score(&self, pattern_name: &str, affect: &AffectVector, memory: &Memory) -> f64 {
        let (dominant_idx, dominant_name, _) = memory.affect.dominant();
        let _ = dominant_idx;
        match pattern_name {
            "FEAR" => {
                if memory.is_trauma {
                    1.0 + memory.affect.values[crate::types::IDX_FEAR].max(memory.activation)
                } else if is_fear_family(dominant_name) {
                    0.8 * memory.activation
                } else {
                    0.0
                }
            }
            "JOY" => {
                let valence = memory.affect.valence();
                if valence > 0.5 && matches!(dominant_name, "Joy" | "Satisfaction" | "Excitement") {
                    valence * memory.activation
                } else {
                    0.0
                }
            }
            "ANXIETY" => {
                if is_anxiety_family(dominant_name) {
                    0.1 * memory.activation_count as f64 + memory.activation
                } else {
                    0.0
                }
            }
            _ => memory.weight * affect.cosine_similarity(&memory.affect),
        }
    }

    /// `influence_i = clip((sum(weight*activation*delta*mem_i)) / |memories|, 0, 1)`.
    pub fn compute_memory_influences(&self, memories: &[&Memory], delta: f64) -> [f64; NUM_EMOTIONS] {
        let mut influence = [0.0; NUM_EMOTIONS];
        if memories.is_empty() {
            return influence;
        }
        for memory in memories {
            for i in 0..NUM_EMOTIONS {
                influence[i] += memory.weight * memory.activation * delta * memory.affect.values[i];
            }
        }
        let count = memories.len() as f64;
        for v in &mut influence {
            *v = (*v / count).clamp(0.0, 1.0);
        }
        influence
    }

    /// Initial weight depends on the active pattern at creation time.
    pub fn record_memory(&mut self, affect: AffectVector, pattern_name: &str, context: String) -> &Memory {
        let intensity = affect.dominant().2;
        let valence = affect.valence();
        let weight = match pattern_name {
            "FEAR" => (0.7 + 0.3 * intensity).min(1.0),
            "JOY" if valence > 0.5 => (0.6 + 0.4 * valence).min(1.0),
            "JOY" => 0.3,
            "ANXIETY" if valence < 0.5 => (0.5 + 0.5 * (1.0 - valence)).min(1.0),
            "ANXIETY" => 0.2,
            _ => 0.5,
        };
        self.next_id += 1;
        let id = generate_id_with_prefix("memory", self.next_id);
        let now = now_ms();
        let memory = Memory {
            id,
            affect,
            pattern_id: pattern_name.to_string(),
            context,
            weight,
            activation: intensity,
            activation_count: 0,
            is_trauma: false,
            created_at_ms: now,
            last_activated_ms: now,
        };
        self.memories.push(memory);
        self.memories.last().unwrap()
    }

    /// Only records a trauma when `intensity > 0.85 && valence < 0.2`.
    pub fn create_potential_trauma(&mut self, affect: AffectVector) -> Option<&Memory> {
        let intensity = affect.dominant().2;
        let valence = affect.valence();
        if intensity <= self.config.trauma_intensity_threshold || valence >= self.config.trauma_valence_threshold {
            return None;
        }
        self.next_id += 1;
        let id = generate_id_with_prefix("trauma", self.next_id);
        let now = now_ms();
        let weight = (0.7 + 0.3 * intensity).min(1.0);
        let memory = Memory {
            id,
            affect,
            pattern_id: "FEAR".to_string(),
            context: "potential trauma".to_string(),
            weight,
            activation: intensity,
            activation_count: 0,
            is_trauma: true,
            created_at_ms: now,
            last_activated_ms: now,
        };
        self.memories.push(memory);
        self.memories.last()
    }

    /// `activation = forget*reinforce*match`, clamped; refreshes
    /// `last_activated_ms` and increments `activation_count` when > 0.3.
    pub fn update_activation(&mut self, id: &str, current_affect: &AffectVector) -> Option<f64> {
        let now = now_ms();
        let memory = self.memories.iter_mut().find(|m| m.id == id)?;
        let hours_since = (now.saturating_sub(memory.last_activated_ms)) as f64 / 3_600_000.0;
        let base_forget = (-0.693 * hours_since / 720.0).exp();
        let forget = if memory.is_trauma { base_forget.max(0.5) } else { base_forget };
        let reinforce = if memory.is_trauma { 1.5 } else { 1.0 };
        let match_score = current_affect.cosine_similarity(&memory.affect);
        let activation = (forget * reinforce * match_score).clamp(0.0, 1.0);
        memory.activation = activation;
        if activation > 0.3 {
            memory.activation_count += 1;
            memory.last_activated_ms = now;
        }
        Some(activation)
    }

    /// Non-traumas decay by `weight *= 1 - decay`; traumas by `1 - 0.1*decay`,
    /// floored at 0.5 so trauma weight never forgets past half strength.
    /// Non-traumas below 0.01 weight are deleted.
    pub fn apply_forget(&mut self, decay: f64) {
        for memory in &mut self.memories {
            if memory.is_trauma {
                memory.weight = (memory.weight * (1.0 - 0.1 * decay)).max(0.5);
            } else {
                memory.weight *= 1.0 - decay;
            }
        }
        self.memories.retain(|m| m.is_trauma || m.weight >= 0.01);
    }

    pub fn should_consolidate(&self, memory: &Memory, pattern_name: &str) -> ConsolidationAction {
        let intensity = memory.affect.dominant().2;
        let valence = memory.affect.valence();
        match pattern_name {
            "FEAR" if intensity > self.config.trauma_intensity_threshold && valence < self.config.trauma_valence_threshold => {
                ConsolidationAction::Trauma
            }
            "JOY" if valence > 0.5 && intensity > 0.5 => ConsolidationAction::ConsolidateStrong,
            "ANXIETY" if valence < 0.5 => ConsolidationAction::ConsolidateStrong,
            "ANXIETY" => ConsolidationAction::Forget,
            _ if intensity > 0.5 => ConsolidationAction::ConsolidateNormal,
            _ => ConsolidationAction::Forget,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Memory> {
        self.memories.iter().find(|m| m.id == id)
    }

    pub fn all(&self) -> &[Memory] {
        &self.memories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peaked(index: usize, value: f64) -> AffectVector {
        let mut v = [0.05; NUM_EMOTIONS];
        v[index] = value;
        AffectVector::new(v)
    }

    #[test]
    fn fear_pattern_prioritizes_traumas() {
        let mut mm = MemoryManager::new(MemoryConfig::default());
        let fear_affect = peaked(crate::types::IDX_FEAR, 0.9);
        mm.create_potential_trauma(fear_affect.clone()).unwrap();
        mm.record_memory(peaked(crate::types::IDX_JOY, 0.6), "JOY", "happy day".to_string());
        let results = mm.query_relevant("FEAR", &fear_affect, 5);
        assert!(results[0].is_trauma);
    }

    #[test]
    fn potential_trauma_rejected_below_thresholds() {
        let mut mm = MemoryManager::new(MemoryConfig::default());
        let mild = peaked(crate::types::IDX_FEAR, 0.5);
        assert!(mm.create_potential_trauma(mild).is_none());
    }

    #[test]
    fn apply_forget_removes_weak_non_traumas() {
        let mut mm = MemoryManager::new(MemoryConfig::default());
        mm.record_memory(peaked(crate::types::IDX_JOY, 0.3), "NEUTRAL", "mild".to_string());
        for _ in 0..50 {
            mm.apply_forget(0.3);
        }
        assert_eq!(mm.len(), 0);
    }

    #[test]
    fn should_consolidate_flags_fear_trauma() {
        let mm = MemoryManager::new(MemoryConfig::default());
        let memory = Memory {
            id: "m1".to_string(),
            affect: peaked(crate::types::IDX_FEAR, 0.95),
            pattern_id: "FEAR".to_string(),
            context: String::new(),
            weight: 0.9,
            activation: 0.9,
            activation_count: 0,
            is_trauma: false,
            created_at_ms: 0,
            last_activated_ms: 0,
        };
        assert_eq!(mm.should_consolidate(&memory, "FEAR"), ConsolidationAction::Trauma);
    }
}
