//! C4 — matcher: maps the STB signature to a pattern-store entry with
//! hysteresis, transition recording, and optional new-pattern creation.

use crate::buffer::{Signature, ShortTermBuffer};
use crate::config::MatcherConfig;
use crate::pattern::{Coefficients, PatternStore};
use crate::types::now_ms;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    UseExisting,
    CreateNew,
    ModifyExisting,
    MergePatterns,
    Uncertain,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub pattern_id: String,
    pub pattern_name: String,
    pub similarity: f64,
    pub confidence: f64,
    pub coefficients: Coefficients,
    pub emergency_threshold: f64,
    pub memory_trigger_threshold: f64,
    pub alternatives: Vec<(String, f64)>,
    pub is_new_pattern: bool,
    pub is_transition: bool,
    pub previous_pattern_id: Option<String>,
    pub transition_probability: f64,
}

pub struct Matcher {
    config: MatcherConfig,
    current_pattern_id: Option<String>,
    frames_in_current: u32,
    time_in_current_s: f64,
    current_similarity: f64,
    history: VecDeque<(String, u64)>,
    max_history: usize,
    total_matches: u64,
    patterns_created: u64,
    transitions_recorded: u64,
    sum_similarities: f64,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            current_pattern_id: None,
            frames_in_current: 0,
            time_in_current_s: 0.0,
            current_similarity: 0.0,
            history: VecDeque::new(),
            max_history: 100,
            total_matches: 0,
            patterns_created: 0,
            transitions_recorded: 0,
            sum_similarities: 0.0,
        }
    }

    pub fn current_pattern_id(&self) -> Option<&str> {
        self.current_pattern_id.as_deref()
    }

    pub fn total_matches(&self) -> u64 {
        self.total_matches
    }

    pub fn patterns_created(&self) -> u64 {
        self.patterns_created
    }

    pub fn transitions_recorded(&self) -> u64 {
        self.transitions_recorded
    }

    pub fn average_match_similarity(&self) -> f64 {
        if self.total_matches == 0 {
            0.0
        } else {
            self.sum_similarities / self.total_matches as f64
        }
    }

    pub fn decision_for(&self, best_similarity: f64, second_best: Option<f64>, stability: f64) -> MatchDecision {
        if best_similarity >= self.config.high_match_threshold {
            if let Some(second) = second_best {
                if second >= self.config.high_match_threshold {
                    return MatchDecision::MergePatterns;
                }
            }
            return MatchDecision::UseExisting;
        }
        if best_similarity >= self.config.medium_match_threshold {
            return MatchDecision::ModifyExisting;
        }
        if best_similarity < self.config.low_match_threshold {
            if stability >= self.config.min_stability_for_creation {
                return MatchDecision::CreateNew;
            }
            return MatchDecision::ModifyExisting;
        }
        MatchDecision::Uncertain
    }

    /// 1. Pulls a signature from the buffer; falls back to the current
    ///    pattern, or SERENITY, when absent.
    /// 2. Gets the top `max_matches_returned` from the store.
    /// 3. Decides a `MatchDecision`.
    /// 4. Applies hysteresis (AND of similarity margin + frame-count gate +
    ///    `min_phase_duration_s`) before switching.
    /// 5. Records the transition in the store on switch.
    pub fn do_match(
        &mut self,
        buffer: &ShortTermBuffer,
        store: &mut PatternStore,
        tick_duration_s: f64,
    ) -> MatchResult {
        let Some(sig) = buffer.extract_signature() else {
            return self.fallback_result(store);
        };

        let matches = store.find_matches(&sig, self.config.max_matches_returned);
        self.total_matches += 1;

        if matches.is_empty() {
            return self.create_new_pattern_result(store, &sig);
        }

        let best = matches[0].clone();
        self.sum_similarities += best.similarity;
        let second = matches.get(1).map(|m| m.similarity);
        let decision = self.decision_for(best.similarity, second, sig.stability);

        let should_create = matches!(decision, MatchDecision::CreateNew);
        if should_create {
            return self.create_new_pattern_result(store, &sig);
        }

        let candidate_id = best.pattern_id.clone();
        let is_different = self.current_pattern_id.as_deref() != Some(candidate_id.as_str());
        let margin_cleared = best.similarity > self.current_similarity + self.config.hysteresis_margin;
        let frames_cleared = self.frames_in_current >= self.config.min_frames_before_switch;
        let duration_cleared = self.time_in_current_s >= self.config.min_phase_duration_s;

        let should_switch = is_different && margin_cleared && frames_cleared && duration_cleared;

        if matches!(decision, MatchDecision::ModifyExisting) {
            let _ = store.update(&candidate_id, &sig, None);
        }

        if should_switch {
            let previous = self.current_pattern_id.clone();
            if let Some(prev_id) = &previous {
                store.record_transition(prev_id, &candidate_id);
                self.transitions_recorded += 1;
            }
            store.record_activation(&candidate_id);
            self.current_pattern_id = Some(candidate_id.clone());
            self.frames_in_current = 0;
            self.time_in_current_s = 0.0;
            self.current_similarity = best.similarity;
            self.push_history(candidate_id.clone());
            debug!(pattern_id = %candidate_id, from = ?previous, "pattern switched");

            let transition_probability = previous
                .as_ref()
                .and_then(|p| store.get(p))
                .and_then(|p| p.transition_probabilities.get(&candidate_id).copied())
                .unwrap_or(0.0);

            let pattern = store.get(&candidate_id).unwrap();
            return MatchResult {
                pattern_id: candidate_id,
                pattern_name: pattern.name.clone(),
                similarity: best.similarity,
                confidence: pattern.confidence,
                coefficients: pattern.coefficients,
                emergency_threshold: pattern.emergency_threshold,
                memory_trigger_threshold: pattern.memory_trigger_threshold,
                alternatives: matches.iter().skip(1).map(|m| (m.pattern_id.clone(), m.similarity)).collect(),
                is_new_pattern: false,
                is_transition: true,
                previous_pattern_id: previous,
                transition_probability,
            };
        }

        self.frames_in_current += 1;
        self.time_in_current_s += tick_duration_s;
        self.current_similarity = best.similarity;

        let active_id = self.current_pattern_id.clone().unwrap_or(candidate_id);
        let pattern = store
            .get(&active_id)
            .cloned()
            .unwrap_or_else(|| store.get("SERENITY").unwrap().clone());
        MatchResult {
            pattern_id: pattern.id.clone(),
            pattern_name: pattern.name.clone(),
            similarity: self.current_similarity,
            confidence: pattern.confidence,
            coefficients: pattern.coefficients,
            emergency_threshold: pattern.emergency_threshold,
            memory_trigger_threshold: pattern.memory_trigger_threshold,
            alternatives: matches.iter().skip(1).map(|m| (m.pattern_id.clone(), m.similarity)).collect(),
            is_new_pattern: false,
            is_transition: false,
            previous_pattern_id: None,
            transition_probability: 0.0,
        }
    }

    fn fallback_result(&self, store: &PatternStore) -> MatchResult {
        let id = self.current_pattern_id.clone().unwrap_or_else(|| "SERENITY".to_string());
        let pattern = store.get(&id).cloned().unwrap_or_else(|| store.get("SERENITY").unwrap().clone());
        MatchResult {
            pattern_id: pattern.id.clone(),
            pattern_name: pattern.name.clone(),
            similarity: self.current_similarity,
            confidence: pattern.confidence,
            coefficients: pattern.coefficients,
            emergency_threshold: pattern.emergency_threshold,
            memory_trigger_threshold: pattern.memory_trigger_threshold,
            alternatives: Vec::new(),
            is_new_pattern: false,
            is_transition: false,
            previous_pattern_id: None,
            transition_probability: 0.0,
        }
    }

    fn create_new_pattern_result(&mut self, store: &mut PatternStore, sig: &Signature) -> MatchResult {
        let id = store.create(sig, None);
        self.patterns_created += 1;
        store.record_activation(&id);
        let previous = self.current_pattern_id.clone();
        self.current_pattern_id = Some(id.clone());
        self.frames_in_current = 0;
        self.time_in_current_s = 0.0;
        self.current_similarity = 1.0;
        self.push_history(id.clone());
        let pattern = store.get(&id).unwrap();
        MatchResult {
            pattern_id: id,
            pattern_name: pattern.name.clone(),
            similarity: 1.0,
            confidence: pattern.confidence,
            coefficients: pattern.coefficients,
            emergency_threshold: pattern.emergency_threshold,
            memory_trigger_threshold: pattern.memory_trigger_threshold,
            alternatives: Vec::new(),
            is_new_pattern: true,
            is_transition: previous.is_some(),
            previous_pattern_id: previous,
            transition_probability: 0.0,
        }
    }

    fn push_history(&mut self, pattern_id: String) {
        if self.history.len() >= self.max_history {
            self.history.pop_front();
        }
        self.history.push_back((pattern_id, now_ms()));
    }

    pub fn history(&self, n: usize) -> Vec<(String, u64)> {
        self.history.iter().rev().take(n).cloned().collect()
    }

    pub fn current_phase_duration_s(&self) -> f64 {
        self.time_in_current_s
    }

    /// Positive feedback nudges coefficients toward a good-match profile;
    /// negative rejects the current pattern.
    pub fn confirm(&mut self, store: &mut PatternStore) {
        if let Some(id) = &self.current_pattern_id {
            store.adjust_coefficients(id, 1.0);
        }
    }

    pub fn reject(&mut self, store: &mut PatternStore, correct_id: Option<String>) {
        if let Some(id) = &self.current_pattern_id {
            store.adjust_coefficients(id, -1.0);
        }
        if let Some(correct) = correct_id {
            store.record_activation(&correct);
            self.current_pattern_id = Some(correct.clone());
            self.frames_in_current = 0;
            self.time_in_current_s = 0.0;
        }
    }

    pub fn provide_feedback(&mut self, store: &mut PatternStore, feedback: f64) {
        if let Some(id) = &self.current_pattern_id {
            store.adjust_coefficients(id, feedback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BufferConfig;
    use crate::config::PatternStoreConfig;
    use crate::types::AffectVector;

    fn matcher_with_fast_switching() -> (Matcher, PatternStore, ShortTermBuffer) {
        let mut mcfg = MatcherConfig::default();
        mcfg.min_frames_before_switch = 0;
        mcfg.min_phase_duration_s = 0.0;
        mcfg.hysteresis_margin = 0.0;
        let matcher = Matcher::new(mcfg);
        let store = PatternStore::new(PatternStoreConfig::default());
        let mut bcfg = BufferConfig::default();
        bcfg.min_samples_for_signature = 2;
        bcfg.max_jump_threshold = 1.0;
        let buffer = ShortTermBuffer::new(bcfg);
        (matcher, store, buffer)
    }

    #[test]
    fn does_not_switch_before_hysteresis_gates_clear() {
        let mut mcfg = MatcherConfig::default();
        mcfg.min_frames_before_switch = 5;
        let mut matcher = Matcher::new(mcfg);
        let mut store = PatternStore::new(PatternStoreConfig::default());
        let mut buffer = ShortTermBuffer::new({
            let mut b = BufferConfig::default();
            b.min_samples_for_signature = 2;
            b.max_jump_threshold = 1.0;
            b
        });
        buffer.push(AffectVector::new([0.2; 24])).unwrap();
        buffer.push(AffectVector::new([0.2; 24])).unwrap();
        let first = matcher.do_match(&buffer, &mut store, 1.0);
        let second = matcher.do_match(&buffer, &mut store, 1.0);
        assert_eq!(first.pattern_id, second.pattern_id);
    }

    #[test]
    fn fallback_to_serenity_when_no_signature_and_no_current_pattern() {
        let (mut matcher, mut store, buffer) = matcher_with_fast_switching();
        let result = matcher.do_match(&buffer, &mut store, 1.0);
        assert_eq!(result.pattern_id, "SERENITY");
    }
}
