//! C2 — short-term affect buffer (STB): a time-windowed ring of timestamped
//! affect states. Validates and sanitises input, integrates the window into
//! a stabilised state, and extracts a `Signature` for pattern matching.

use crate::config::BufferConfig;
use crate::error::{EngineError, ValidationCode};
use crate::types::{cosine, now_ms, AffectVector, TimestampedState, UtteranceContext, NUM_EMOTIONS};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Statistical fingerprint of a buffer window, used for pattern matching.
/// Defined only when the window holds at least `min_samples_for_signature`
/// states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub mean: [f64; NUM_EMOTIONS],
    pub std_dev: [f64; NUM_EMOTIONS],
    pub trend: [f64; NUM_EMOTIONS],
    pub second_derivative: [f64; NUM_EMOTIONS],
    pub oscillation_count: [u32; NUM_EMOTIONS],
    pub peak_position: [f64; NUM_EMOTIONS],
    pub global_intensity: f64,
    pub global_valence: f64,
    pub global_arousal: f64,
    pub stability: f64,
    pub dominant_frequency: f64,
}

/// Result of integrating the buffer's window into a single stabilised state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationResult {
    pub integrated_state: AffectVector,
    pub stability: f64,
    pub volatility: f64,
    pub trend: f64,
    pub velocity: [f64; NUM_EMOTIONS],
    pub sample_count: usize,
    pub time_span_s: f64,
}

/// Ring buffer of timestamped affect states, bounded by `max_size` entries
/// and `time_window_seconds`.
pub struct ShortTermBuffer {
    config: BufferConfig,
    entries: VecDeque<TimestampedState>,
    cached_integration: Option<IntegrationResult>,
}

impl ShortTermBuffer {
    pub fn new(config: BufferConfig) -> Self {
        let max_size = config.max_size;
        Self {
            config,
            entries: VecDeque::with_capacity(max_size),
            cached_integration: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cached_integration = None;
    }

    /// Validates `state`; if invalid and `reject_on_failure`, returns the
    /// validation error without mutating the buffer. Otherwise sanitises and
    /// inserts, evicting past `max_size`/`time_window_seconds`.
    pub fn push(&mut self, mut state: AffectVector) -> Result<(), EngineError> {
        if let Err(err) = self.validate(&state) {
            if self.config.reject_on_failure {
                warn!(error = %err, "buffer push rejected");
                return Err(err);
            }
            warn!(error = %err, "buffer push sanitised instead of rejected");
        }
        self.sanitize(&mut state);
        self.insert(TimestampedState {
            affect: state,
            timestamp_ms: now_ms(),
            utterance: None,
        });
        Ok(())
    }

    pub fn push_with_utterance(
        &mut self,
        mut state: AffectVector,
        sentiment: f64,
        arousal: f64,
        text: String,
    ) -> Result<(), EngineError> {
        if let Err(err) = self.validate(&state) {
            if self.config.reject_on_failure {
                return Err(err);
            }
        }
        self.sanitize(&mut state);
        self.insert(TimestampedState {
            affect: state,
            timestamp_ms: now_ms(),
            utterance: Some(UtteranceContext {
                sentiment,
                arousal,
                text,
            }),
        });
        Ok(())
    }

    fn insert(&mut self, entry: TimestampedState) {
        self.entries.push_back(entry);
        self.evict_past_limits();
        self.cached_integration = None;
        if self.entries.len() >= 2 {
            debug!(size = self.entries.len(), "buffer stability callback point");
        }
    }

    fn evict_past_limits(&mut self) {
        while self.entries.len() > self.config.max_size {
            self.entries.pop_front();
        }
        if let Some(newest) = self.entries.back() {
            let cutoff_ms = (self.config.time_window_seconds * 1000.0) as u64;
            let newest_ts = newest.timestamp_ms;
            while let Some(oldest) = self.entries.front() {
                if newest_ts.saturating_sub(oldest.timestamp_ms) > cutoff_ms {
                    self.entries.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    fn validate(&self, state: &AffectVector) -> Result<(), EngineError> {
        for (i, &v) in state.values.iter().enumerate() {
            if v.is_nan() || v.is_infinite() {
                return Err(EngineError::validation_at(
                    ValidationCode::NanOrInf,
                    "emotion value is NaN or infinite",
                    i,
                    v,
                ));
            }
            if v < self.config.emotion_min || v > self.config.emotion_max {
                return Err(EngineError::validation_at(
                    ValidationCode::OutOfRange,
                    "emotion value outside configured bounds",
                    i,
                    v,
                ));
            }
        }
        let nonzero = state.values.iter().filter(|&&v| v > 0.0).count();
        if nonzero < self.config.min_nonzero_emotions {
            return Err(EngineError::validation(
                ValidationCode::AllZero,
                "too few non-zero emotions",
            ));
        }
        if let Some(last) = self.entries.back() {
            for (i, (&prev, &cur)) in last.affect.values.iter().zip(state.values.iter()).enumerate() {
                if (cur - prev).abs() > self.config.max_jump_threshold {
                    return Err(EngineError::validation_at(
                        ValidationCode::ExtremeJump,
                        "emotion value jumped more than the configured threshold",
                        i,
                        cur,
                    ));
                }
            }
        }
        Ok(())
    }

    fn sanitize(&self, state: &mut AffectVector) {
        let last = self.entries.back().map(|e| e.affect.clone());
        for i in 0..NUM_EMOTIONS {
            let v = &mut state.values[i];
            if v.is_nan() || v.is_infinite() {
                *v = 0.0;
            }
            *v = v.clamp(self.config.emotion_min, self.config.emotion_max);
            if let Some(prev) = &last {
                let delta = *v - prev.values[i];
                if delta.abs() > self.config.max_jump_threshold {
                    *v = prev.values[i] + delta.signum() * self.config.max_jump_threshold;
                }
            }
        }
        if state.values.iter().all(|&v| v <= 0.0) {
            let idx = state
                .values
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .map(|(i, _)| i)
                .unwrap_or(0);
            state.values[idx] = 0.01;
        }
        state.recompute_summary();
        state.variance_global = state.variance_global.max(0.0);
    }

    /// Integrates the window via an exponentially-weighted mean (half-life
    /// `time_window_seconds/3`) when `exponential_weighting` is enabled,
    /// otherwise a uniform mean. Memoised until the next mutation.
    pub fn integrate(&mut self) -> Option<IntegrationResult> {
        if let Some(cached) = &self.cached_integration {
            return Some(cached.clone());
        }
        if self.entries.is_empty() {
            return None;
        }
        let n = self.entries.len();
        let newest_ts = self.entries.back().unwrap().timestamp_ms as f64;
        let oldest_ts = self.entries.front().unwrap().timestamp_ms as f64;
        let time_span_s = (newest_ts - oldest_ts).max(0.0) / 1000.0;

        let mut weights = vec![1.0_f64; n];
        if self.config.exponential_weighting {
            let half_life = (self.config.time_window_seconds / 3.0).max(1e-6);
            let decay_rate = std::f64::consts::LN_2 / half_life;
            for (i, entry) in self.entries.iter().enumerate() {
                let age_s = (newest_ts - entry.timestamp_ms as f64).max(0.0) / 1000.0;
                weights[i] = (-decay_rate * age_s).exp();
            }
        }
        let weight_sum: f64 = weights.iter().sum();

        let mut mean = [0.0; NUM_EMOTIONS];
        for (entry, &w) in self.entries.iter().zip(weights.iter()) {
            for i in 0..NUM_EMOTIONS {
                mean[i] += entry.affect.values[i] * w;
            }
        }
        for v in mean.iter_mut() {
            *v /= weight_sum.max(1e-9);
        }

        let mut stddev_sum = 0.0;
        let mut velocity = [0.0; NUM_EMOTIONS];
        for i in 0..NUM_EMOTIONS {
            let variance: f64 = self
                .entries
                .iter()
                .zip(weights.iter())
                .map(|(e, &w)| w * (e.affect.values[i] - mean[i]).powi(2))
                .sum::<f64>()
                / weight_sum.max(1e-9);
            stddev_sum += variance.sqrt();
        }
        if n >= 2 {
            let first = &self.entries[0].affect.values;
            let last = &self.entries[n - 1].affect.values;
            let dt = time_span_s.max(1e-6);
            for i in 0..NUM_EMOTIONS {
                velocity[i] = (last[i] - first[i]) / dt;
            }
        }

        let mean_stddev = stddev_sum / NUM_EMOTIONS as f64;
        let stability = (1.0 - 2.0 * mean_stddev).max(0.0);
        let volatility = 1.0 - stability;

        let global_means: Vec<f64> = self
            .entries
            .iter()
            .map(|e| e.affect.values.iter().sum::<f64>() / NUM_EMOTIONS as f64)
            .collect();
        let trend = if n >= 2 {
            let slope = (global_means[n - 1] - global_means[0]) / n as f64;
            (slope * 10.0).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        let mut integrated = AffectVector::new(mean);
        integrated.variance_global = (stddev_sum / NUM_EMOTIONS as f64).powi(2);

        let result = IntegrationResult {
            integrated_state: integrated,
            stability,
            volatility,
            trend,
            velocity,
            sample_count: n,
            time_span_s,
        };
        self.cached_integration = Some(result.clone());
        Some(result)
    }

    /// Returns `None` iff the window holds fewer than
    /// `min_samples_for_signature` states.
    pub fn extract_signature(&self) -> Option<Signature> {
        let n = self.entries.len();
        if n < self.config.min_samples_for_signature {
            return None;
        }
        let third = (n / 3).max(1);
        let values: Vec<&[f64; NUM_EMOTIONS]> =
            self.entries.iter().map(|e| &e.affect.values).collect();

        let mut mean = [0.0; NUM_EMOTIONS];
        let mut std_dev = [0.0; NUM_EMOTIONS];
        let mut trend = [0.0; NUM_EMOTIONS];
        let mut second_derivative = [0.0; NUM_EMOTIONS];
        let mut oscillation_count = [0u32; NUM_EMOTIONS];
        let mut peak_position = [0.0; NUM_EMOTIONS];

        for i in 0..NUM_EMOTIONS {
            let series: Vec<f64> = values.iter().map(|v| v[i]).collect();
            let m = series.iter().sum::<f64>() / n as f64;
            mean[i] = m;
            std_dev[i] = (series.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64).sqrt();

            let first_third_mean = series[..third].iter().sum::<f64>() / third as f64;
            let last_third_mean = series[n - third..].iter().sum::<f64>() / third as f64;
            trend[i] = last_third_mean - first_third_mean;

            if n >= 2 * third {
                let mid_third_mean =
                    series[third..n - third].iter().sum::<f64>() / (n - 2 * third).max(1) as f64;
                let early_trend = mid_third_mean - first_third_mean;
                let late_trend = last_third_mean - mid_third_mean;
                second_derivative[i] = late_trend - early_trend;
            }

            let (peak_idx, _) = series
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .unwrap();
            peak_position[i] = peak_idx as f64 / (n - 1).max(1) as f64;

            oscillation_count[i] = count_sign_flips(&series);
        }

        let global_intensity = mean.iter().sum::<f64>() / NUM_EMOTIONS as f64;
        let av = AffectVector::new(mean);
        let global_valence = av.valence();
        let global_arousal = std_dev.iter().sum::<f64>() / NUM_EMOTIONS as f64;
        let mean_stddev = std_dev.iter().sum::<f64>() / NUM_EMOTIONS as f64;
        let stability = (1.0 - 2.0 * mean_stddev).max(0.0);

        let total_oscillations: u32 = oscillation_count.iter().sum();
        let time_span_s = {
            let newest = self.entries.back().unwrap().timestamp_ms;
            let oldest = self.entries.front().unwrap().timestamp_ms;
            ((newest - oldest) as f64 / 1000.0).max(1e-6)
        };
        let dominant_frequency = total_oscillations as f64 / time_span_s;

        Some(Signature {
            mean,
            std_dev,
            trend,
            second_derivative,
            oscillation_count,
            peak_position,
            global_intensity,
            global_valence,
            global_arousal,
            stability,
            dominant_frequency,
        })
    }

    /// Cosine on the 24-D means plus small proximity bonuses (≤0.1 each)
    /// for global valence and arousal, clipped to [0,1].
    pub fn similarity_with(&self, sig: &Signature) -> f64 {
        let Some(current) = self.extract_signature() else {
            return 0.0;
        };
        let base = cosine(&current.mean, &sig.mean);
        let valence_bonus = (0.1 * (1.0 - (current.global_valence - sig.global_valence).abs())).max(0.0);
        let arousal_bonus = (0.1 * (1.0 - (current.global_arousal - sig.global_arousal).abs())).max(0.0);
        (base + valence_bonus + arousal_bonus).clamp(0.0, 1.0)
    }
}

fn count_sign_flips(series: &[f64]) -> u32 {
    let mut flips = 0u32;
    let mut last_sign: Option<f64> = None;
    for w in series.windows(2) {
        let diff = w[1] - w[0];
        if diff.abs() > 0.01 {
            let sign = diff.signum();
            if let Some(prev) = last_sign {
                if prev != sign {
                    flips += 1;
                }
            }
            last_sign = Some(sign);
        }
    }
    flips
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_state(value: f64) -> AffectVector {
        AffectVector::new([value; NUM_EMOTIONS])
    }

    #[test]
    fn push_rejects_nan() {
        let mut buf = ShortTermBuffer::new(BufferConfig::default());
        let mut bad = flat_state(0.2);
        bad.values[0] = f64::NAN;
        assert!(buf.push(bad).is_err());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn push_evicts_past_max_size() {
        let mut cfg = BufferConfig::default();
        cfg.max_size = 3;
        cfg.max_jump_threshold = 1.0;
        let mut buf = ShortTermBuffer::new(cfg);
        for _ in 0..5 {
            buf.push(flat_state(0.3)).unwrap();
        }
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn extract_signature_absent_below_minimum_samples() {
        let mut cfg = BufferConfig::default();
        cfg.min_samples_for_signature = 5;
        cfg.max_jump_threshold = 1.0;
        let mut buf = ShortTermBuffer::new(cfg);
        buf.push(flat_state(0.3)).unwrap();
        assert!(buf.extract_signature().is_none());
    }

    #[test]
    fn extract_signature_present_at_minimum_samples() {
        let mut cfg = BufferConfig::default();
        cfg.min_samples_for_signature = 3;
        cfg.max_jump_threshold = 1.0;
        let mut buf = ShortTermBuffer::new(cfg);
        for _ in 0..3 {
            buf.push(flat_state(0.3)).unwrap();
        }
        assert!(buf.extract_signature().is_some());
    }

    #[test]
    fn integrate_is_cached_until_next_push() {
        let mut cfg = BufferConfig::default();
        cfg.max_jump_threshold = 1.0;
        let mut buf = ShortTermBuffer::new(cfg);
        buf.push(flat_state(0.3)).unwrap();
        let first = buf.integrate().unwrap();
        let second = buf.integrate().unwrap();
        assert_eq!(first.sample_count, second.sample_count);
        buf.push(flat_state(0.3)).unwrap();
        let third = buf.integrate().unwrap();
        assert_eq!(third.sample_count, 2);
    }

    #[test]
    fn sanitize_lifts_all_zero_vector() {
        let mut cfg = BufferConfig::default();
        cfg.reject_on_failure = false;
        cfg.max_jump_threshold = 1.0;
        cfg.min_nonzero_emotions = 0;
        let mut buf = ShortTermBuffer::new(cfg);
        buf.push(AffectVector::default()).unwrap();
        let entry = &buf.entries[0];
        assert!(entry.affect.values.iter().any(|&v| v > 0.0));
    }
}
