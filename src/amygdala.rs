//! C10 — emergency short-circuit: detects critical-emotion spikes and
//! trauma activations that bypass normal pattern-matching deliberation.

use crate::config::AmygdalaConfig;
use crate::memory::Memory;
use crate::types::{AffectVector, CRITICAL_EMOTIONS, EMOTION_NAMES};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone)]
pub struct EmergencyResponse {
    pub action: &'static str,
    pub priority: Priority,
    pub trigger_emotion: &'static str,
    pub emotion_value: f64,
    pub sequence: u64,
}

pub struct Amygdala {
    config: AmygdalaConfig,
    emergency_count: u64,
}

impl Amygdala {
    pub fn new(config: AmygdalaConfig) -> Self {
        Self {
            config,
            emergency_count: 0,
        }
    }

    pub fn emergency_count(&self) -> u64 {
        self.emergency_count
    }

    pub fn reset_count(&mut self) {
        self.emergency_count = 0;
    }

    fn max_critical_emotion(&self, affect: &AffectVector) -> (&'static str, f64) {
        CRITICAL_EMOTIONS
            .iter()
            .map(|&idx| (EMOTION_NAMES[idx], affect.values[idx]))
            .fold(("", -1.0), |acc, x| if x.1 > acc.1 { x } else { acc })
    }

    pub fn is_trauma_activated(&self, memory: &Memory, threshold: f64) -> bool {
        memory.is_trauma && memory.activation > threshold
    }

    /// Three-stage check: a critical emotion above the phase threshold, a
    /// trauma activated above `phase_threshold - 0.2`, or a milder critical
    /// emotion (`threshold + 0.2`) combined with a strongly-activated
    /// (`> 0.6`) trauma.
    pub fn check_emergency(&self, affect: &AffectVector, active_memories: &[&Memory], phase_threshold: f64) -> bool {
        let (max_name, max_value) = self.max_critical_emotion(affect);
        if max_value > phase_threshold {
            warn!(emotion = max_name, value = max_value, phase_threshold, "critical emotion above phase threshold");
            return true;
        }

        let trauma_threshold = phase_threshold - 0.2;
        if active_memories.iter().any(|m| self.is_trauma_activated(m, trauma_threshold)) {
            warn!(trauma_threshold, "trauma activation above threshold");
            return true;
        }

        if max_value > phase_threshold + 0.2 && active_memories.iter().any(|m| m.is_trauma && m.activation > self.config.trauma_activation_critical) {
            warn!("critical emotion combined with strongly-activated trauma");
            return true;
        }

        false
    }

    pub fn trigger(&mut self, affect: &AffectVector) -> EmergencyResponse {
        self.emergency_count += 1;
        let (max_name, max_value) = self.max_critical_emotion(affect);
        let action = match max_name {
            "Fear" => "FLEE",
            "Horror" => "FREEZE",
            "Anxiety" => "ALERT",
            _ => "MONITOR",
        };
        let priority = if max_value > 0.85 {
            Priority::Critical
        } else if max_value > 0.70 {
            Priority::High
        } else if max_value > 0.50 {
            Priority::Medium
        } else {
            Priority::Low
        };

        if !self.config.quiet {
            warn!(sequence = self.emergency_count, action, ?priority, emotion = max_name, value = max_value, "emergency response triggered");
        }

        EmergencyResponse {
            action,
            priority,
            trigger_emotion: max_name,
            emotion_value: max_value,
            sequence: self.emergency_count,
        }
    }

    pub fn default_phase_threshold(&self) -> f64 {
        self.config.default_phase_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{now_ms, NUM_EMOTIONS};

    fn peaked(index: usize, value: f64) -> AffectVector {
        let mut v = [0.05; NUM_EMOTIONS];
        v[index] = value;
        AffectVector::new(v)
    }

    fn trauma_memory(activation: f64) -> Memory {
        Memory {
            id: "m1".to_string(),
            affect: AffectVector::default(),
            pattern_id: "FEAR".to_string(),
            context: String::new(),
            weight: 0.9,
            activation,
            activation_count: 0,
            is_trauma: true,
            created_at_ms: now_ms(),
            last_activated_ms: now_ms(),
        }
    }

    #[test]
    fn critical_emotion_above_threshold_triggers_emergency() {
        let amygdala = Amygdala::new(AmygdalaConfig::default());
        let affect = peaked(crate::types::IDX_FEAR, 0.9);
        assert!(amygdala.check_emergency(&affect, &[], 0.5));
    }

    #[test]
    fn trauma_activation_alone_triggers_emergency() {
        let amygdala = Amygdala::new(AmygdalaConfig::default());
        let affect = AffectVector::default();
        let mem = trauma_memory(0.95);
        assert!(amygdala.check_emergency(&affect, &[&mem], 0.6));
    }

    #[test]
    fn calm_state_does_not_trigger() {
        let amygdala = Amygdala::new(AmygdalaConfig::default());
        let affect = peaked(crate::types::IDX_JOY, 0.9);
        assert!(!amygdala.check_emergency(&affect, &[], 0.85));
    }

    #[test]
    fn trigger_picks_flee_for_fear_and_increments_count() {
        let mut amygdala = Amygdala::new(AmygdalaConfig::default());
        let affect = peaked(crate::types::IDX_FEAR, 0.95);
        let response = amygdala.trigger(&affect);
        assert_eq!(response.action, "FLEE");
        assert_eq!(response.priority, Priority::Critical);
        assert_eq!(amygdala.emergency_count(), 1);
    }
}
