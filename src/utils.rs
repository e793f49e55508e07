//! Small generic helpers shared across components: id generation, an EMA
//! accumulator, a bounded sliding window, and a checkpoint timer.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Generate an id with the given prefix, e.g. `pattern_<ms>_<counter>`-style
/// uniqueness via a monotonic-ish timestamp plus a caller-supplied counter.
pub fn generate_id_with_prefix(prefix: &str, counter: u64) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_micros();
    format!("{prefix}_{timestamp}_{counter}")
}

/// Exponential moving average accumulator used by the pattern store's
/// signature update and the matcher's running similarity average.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExponentialMovingAverage {
    alpha: f64,
    current_value: Option<f64>,
}

impl ExponentialMovingAverage {
    pub fn new(alpha: f64) -> Result<Self, EngineError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(EngineError::Configuration(format!(
                "alpha must be in [0,1], got {alpha}"
            )));
        }
        Ok(Self {
            alpha,
            current_value: None,
        })
    }

    pub fn update(&mut self, new_value: f64) -> f64 {
        let updated = match self.current_value {
            None => new_value,
            Some(current) => self.alpha * new_value + (1.0 - self.alpha) * current,
        };
        self.current_value = Some(updated);
        updated
    }

    pub fn get_value(&self) -> Option<f64> {
        self.current_value
    }

    pub fn reset(&mut self) {
        self.current_value = None;
    }
}

/// Bounded sliding window over scalar samples, used for the STB's
/// per-emotion stability/trend bookkeeping and the CSE's `Ct` history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidingWindow {
    values: std::collections::VecDeque<f64>,
    max_size: usize,
}

impl SlidingWindow {
    pub fn new(max_size: usize) -> Result<Self, EngineError> {
        if max_size == 0 {
            return Err(EngineError::Configuration(
                "window size must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            values: std::collections::VecDeque::new(),
            max_size,
        })
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() >= self.max_size {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &f64> {
        self.values.iter()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
        }
    }

    pub fn std_dev(&self) -> Option<f64> {
        if self.values.len() < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = self
            .values
            .iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f64>()
            / (self.values.len() - 1) as f64;
        Some(variance.sqrt())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Checkpoint timer used to populate `DecisionResult.tau_elapsed`.
#[derive(Debug)]
pub struct PerformanceTimer {
    start_time: std::time::Instant,
}

impl PerformanceTimer {
    pub fn new() -> Self {
        Self {
            start_time: std::time::Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for PerformanceTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared config-field validation helpers used by `config::EngineConfig::validate`.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate_probability(value: f64, name: &str) -> Result<(), EngineError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(EngineError::Configuration(format!(
                "{name} must be between 0.0 and 1.0, got {value}"
            )));
        }
        Ok(())
    }

    pub fn validate_positive(value: f64, name: &str) -> Result<(), EngineError> {
        if value <= 0.0 {
            return Err(EngineError::Configuration(format!(
                "{name} must be positive, got {value}"
            )));
        }
        Ok(())
    }

    pub fn validate_range(value: f64, min: f64, max: f64, name: &str) -> Result<(), EngineError> {
        if value < min || value > max {
            return Err(EngineError::Configuration(format!(
                "{name} must be between {min} and {max}, got {value}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_moving_average_matches_manual_computation() {
        let mut ema = ExponentialMovingAverage::new(0.5).unwrap();
        assert_eq!(ema.update(10.0), 10.0);
        assert_eq!(ema.update(20.0), 15.0);
        assert_eq!(ema.update(30.0), 22.5);
    }

    #[test]
    fn sliding_window_evicts_oldest_past_capacity() {
        let mut window = SlidingWindow::new(3).unwrap();
        window.push(1.0);
        window.push(2.0);
        window.push(3.0);
        assert_eq!(window.mean(), Some(2.0));
        window.push(4.0);
        assert_eq!(window.mean(), Some(3.0));
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn config_validator_rejects_out_of_range() {
        assert!(ConfigValidator::validate_probability(1.5, "x").is_err());
        assert!(ConfigValidator::validate_probability(0.5, "x").is_ok());
    }
}
