//! Cross-module invariants from the testable-properties list: pattern
//! coefficient normalisation, short-term buffer bounds, trauma weight
//! persistence under forgetting, and full-pipeline trauma dominance.

use affect_engine::config::{BufferConfig, EngineConfig, MemoryConfig, PatternStoreConfig};
use affect_engine::memory::MemoryManager;
use affect_engine::pattern::PatternStore;
use affect_engine::types::{AffectVector, Trauma, TraumaKind, NUM_EMOTIONS};
use affect_engine::Engine;

const BASE_PATTERN_IDS: [&str; 8] = [
    "SERENITY",
    "JOY",
    "EXPLORATION",
    "ANXIETY",
    "FEAR",
    "SADNESS",
    "DISGUST",
    "CONFUSION",
];

#[test]
fn base_pattern_coefficients_sum_to_one() {
    let store = PatternStore::new(PatternStoreConfig::default());
    for id in BASE_PATTERN_IDS {
        let pattern = store.get(id).unwrap();
        let c = &pattern.coefficients;
        let sum = c.alpha + c.beta + c.gamma + c.delta + c.theta;
        assert!((sum - 1.0).abs() < 1e-6, "{id} coefficients sum to {sum}");
    }
}

#[test]
fn short_term_buffer_respects_max_size_and_time_window() {
    let config = BufferConfig {
        max_size: 10,
        ..BufferConfig::default()
    };
    let mut buffer = affect_engine::buffer::ShortTermBuffer::new(config.clone());
    for i in 0..50 {
        let mut values = [0.1; NUM_EMOTIONS];
        values[0] = (i % 10) as f64 / 10.0;
        buffer.push(AffectVector::new(values)).unwrap();
    }
    assert!(buffer.len() <= config.max_size);
}

#[test]
fn trauma_memory_weight_stays_high_under_repeated_forgetting() {
    let mut mm = MemoryManager::new(MemoryConfig::default());
    let mut values = [0.0; NUM_EMOTIONS];
    values[affect_engine::types::IDX_FEAR] = 0.95;
    let affect = AffectVector::new(values);
    let trauma = mm.create_potential_trauma(affect).expect("should cross trauma thresholds");
    let id = trauma.id.clone();

    for _ in 0..50 {
        mm.apply_forget(0.3);
        let memory = mm.get(&id).unwrap();
        assert!(memory.weight >= 0.5, "trauma weight dropped below floor: {}", memory.weight);
    }
}

#[test]
fn full_pipeline_trauma_sets_dominance_and_increases_ct_magnitude() {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();

    let mut serene = [0.2; NUM_EMOTIONS];
    serene[0] = 0.2;
    let tick_before = engine.tick(AffectVector::new(serene)).unwrap();
    let c0 = engine.publish_consciousness(&tick_before).ct;

    engine.set_trauma(Some(Trauma {
        kind: TraumaKind::Physical,
        intensity: 0.9,
        activation_time_ms: affect_engine::types::now_ms(),
        trigger_context: "full pipeline check".to_string(),
        source_memory_id: None,
    }));
    let tick_after = engine.tick(AffectVector::new(serene)).unwrap();
    let consciousness_after = engine.publish_consciousness(&tick_after);

    assert!(consciousness_after.ct.abs() > c0.abs());
}
