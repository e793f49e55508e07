//! C5 — affect updater: the parametric per-emotion update law driven by the
//! matcher's selected pattern coefficients and the memory-influence vector.

use crate::config::UpdaterConfig;
use crate::pattern::Coefficients;
use crate::types::{AffectVector, NUM_EMOTIONS};

#[derive(Debug, Clone)]
pub struct UpdateInputs {
    pub feedback_external: f64,
    pub feedback_internal: f64,
    pub delta_t: f64,
    pub memory_influence: [f64; NUM_EMOTIONS],
    pub wisdom: f64,
}

impl Default for UpdateInputs {
    fn default() -> Self {
        Self {
            feedback_external: 0.0,
            feedback_internal: 0.0,
            delta_t: 1.0,
            memory_influence: [0.0; NUM_EMOTIONS],
            wisdom: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateResult {
    pub affect: AffectVector,
    pub variance_per_emotion: [f64; NUM_EMOTIONS],
    pub variance_global: f64,
}

pub struct Updater {
    config: UpdaterConfig,
    e_global_prev: f64,
}

impl Updater {
    pub fn new(config: UpdaterConfig) -> Self {
        Self {
            config,
            e_global_prev: 0.0,
        }
    }

    /// `E_i(t+dt) = clip(E_i + a*fb_ext + b*fb_int - g*dt + d*mem_i + t*W, 0, 1)`.
    /// `match_confidence`, when confidence weighting is enabled, scales the
    /// raw `current` affect before the update (`0.5 + 0.5*confidence`).
    pub fn update(
        &mut self,
        current: &AffectVector,
        coefficients: &Coefficients,
        inputs: &UpdateInputs,
        match_confidence: f64,
    ) -> UpdateResult {
        let scale = if self.config.use_confidence_weighting {
            0.5 + 0.5 * match_confidence.clamp(0.0, 1.0)
        } else {
            1.0
        };

        let mut values = [0.0; NUM_EMOTIONS];
        for i in 0..NUM_EMOTIONS {
            let e = current.values[i] * scale;
            let raw = e + coefficients.alpha * inputs.feedback_external
                + coefficients.beta * inputs.feedback_internal
                - coefficients.gamma * inputs.delta_t
                + coefficients.delta * inputs.memory_influence[i]
                + coefficients.theta * inputs.wisdom;
            values[i] = raw.clamp(0.0, 1.0);
        }

        let mut affect = AffectVector::new(values);

        let variance_per_emotion = self.variance_against_memories(&affect, &inputs.memory_influence);
        let variance_global = variance_per_emotion.iter().sum::<f64>() / NUM_EMOTIONS as f64;

        let mean_e: f64 = affect.values.iter().sum::<f64>() / NUM_EMOTIONS as f64;
        let e_global = (self.e_global_prev + mean_e * (1.0 - variance_global.clamp(0.0, 1.0))).tanh();
        self.e_global_prev = e_global;
        affect.e_global = e_global;
        affect.variance_global = variance_global;

        UpdateResult {
            affect,
            variance_per_emotion,
            variance_global,
        }
    }

    /// Variance of the affect against a single memory-influence reference
    /// set (m=1 here; callers comparing against many memories average this
    /// across calls before use). `(1/m) * sum((E_i - S_ij)^2)`.
    fn variance_against_memories(&self, affect: &AffectVector, reference: &[f64; NUM_EMOTIONS]) -> [f64; NUM_EMOTIONS] {
        let mut variance = [0.0; NUM_EMOTIONS];
        for i in 0..NUM_EMOTIONS {
            let diff = affect.values[i] - reference[i];
            variance[i] = diff * diff;
        }
        variance
    }

    pub fn reset(&mut self) {
        self.e_global_prev = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_coefficients() -> Coefficients {
        Coefficients {
            alpha: 0.2,
            beta: 0.2,
            gamma: 0.2,
            delta: 0.2,
            theta: 0.2,
        }
    }

    #[test]
    fn update_clamps_to_unit_range() {
        let mut updater = Updater::new(UpdaterConfig::default());
        let current = AffectVector::new([0.95; NUM_EMOTIONS]);
        let mut inputs = UpdateInputs::default();
        inputs.feedback_external = 1.0;
        inputs.wisdom = 2.0;
        let result = updater.update(&current, &unit_coefficients(), &inputs, 1.0);
        assert!(result.affect.values.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn decay_term_reduces_affect_over_ticks_with_no_reinforcement() {
        let mut updater = Updater::new(UpdaterConfig::default());
        let mut current = AffectVector::new([0.5; NUM_EMOTIONS]);
        let inputs = UpdateInputs {
            delta_t: 1.0,
            ..UpdateInputs::default()
        };
        let first = updater.update(&current, &unit_coefficients(), &inputs, 1.0);
        current = first.affect.clone();
        let second = updater.update(&current, &unit_coefficients(), &inputs, 1.0);
        assert!(second.affect.values[0] < first.affect.values[0]);
    }

    #[test]
    fn confidence_weighting_scales_input_when_enabled() {
        let mut cfg = UpdaterConfig::default();
        cfg.use_confidence_weighting = true;
        let mut updater = Updater::new(cfg);
        let current = AffectVector::new([0.8; NUM_EMOTIONS]);
        let inputs = UpdateInputs::default();
        let low_conf = updater.update(&current, &unit_coefficients(), &inputs, 0.0);
        let mut updater2 = Updater::new(UpdaterConfig {
            use_confidence_weighting: true,
        });
        let high_conf = updater2.update(&current, &unit_coefficients(), &inputs, 1.0);
        assert!(high_conf.affect.values[0] >= low_conf.affect.values[0]);
    }
}
