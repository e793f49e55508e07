//! Supervisor: owns every component as a plain field (no component owns
//! another engine) and runs the per-tick pipeline in data-flow order —
//! C2 -> C4 -> C7 -> C5 -> C2 -> C8 -> C9 -> C10. The deliberation engine
//! (C11) is not part of `tick`; it runs on explicit request via `decide`.
//! Concurrent access (from the API layer) wraps the whole `Engine` in a
//! single `Arc<RwLock<Engine>>` rather than locking each component, so a
//! tick never has to acquire more than one lock.

use crate::amygdala::{Amygdala, EmergencyResponse};
use crate::buffer::{IntegrationResult, ShortTermBuffer};
use crate::config::EngineConfig;
use crate::consciousness::{ConscienceState, ConsciousnessEngine as ConsciousnessComputer, SentimentState};
use crate::decision::{DecisionEngine, DecisionResult};
use crate::error::EngineResult;
use crate::goals::{GoalEngine, GoalState, MemoryGraphInfluence};
use crate::graph::{Snapshot, WordAffectGraph};
use crate::matcher::{MatchResult, Matcher};
use crate::memory::MemoryManager;
use crate::pattern::PatternStore;
use crate::persistence::PersistenceClient;
use crate::types::{AffectVector, EnvironmentState, FeedbackState, MemoryActivation, Trauma, EMOTION_NAMES};
use crate::updater::{UpdateInputs, Updater};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// One token of an ingested sentence, feeding the word-affect graph (C6).
#[derive(Debug, Clone)]
pub struct TokenIn {
    pub lemma: String,
    pub pos: String,
    pub original: String,
}

/// A sentence's tokens plus any semantic relations between them (indices
/// into `tokens`), ingested independently of the affect tick.
#[derive(Debug, Clone)]
pub struct TokenBatch {
    pub sentence_id: String,
    pub tokens: Vec<TokenIn>,
    pub relations: Vec<(usize, usize, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternPublication {
    pub id: String,
    pub name: String,
    pub similarity: f64,
    pub confidence: f64,
    pub is_new: bool,
    pub is_transition: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoefficientPublication {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
    pub theta: f64,
    pub emergency_threshold: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BufferPublication {
    pub size: usize,
    pub stability: f64,
    pub volatility: f64,
    pub trend: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphPublication {
    pub word_count: usize,
    pub affect_count: usize,
    pub edge_count: usize,
    pub causal_edge_count: usize,
    pub density: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsPublication {
    pub transitions: u64,
    pub emergency_triggers: u64,
    pub wisdom: f64,
    pub total_patterns: usize,
    pub total_matches: u64,
    pub patterns_created: u64,
}

/// Per-tick JSON-shaped state publication (spec.md §6 "State publication").
#[derive(Debug, Clone, Serialize)]
pub struct StatePublication {
    pub affect: BTreeMap<&'static str, f64>,
    pub e_global: f64,
    pub variance_global: f64,
    pub valence: f64,
    pub intensity: f64,
    pub dominant_name: &'static str,
    pub dominant_value: f64,
    pub pattern: PatternPublication,
    pub coefficients: CoefficientPublication,
    pub phase_label: String,
    pub phase_duration_s: f64,
    pub buffer: BufferPublication,
    pub graph: GraphPublication,
    pub statistics: StatisticsPublication,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsciousnessComponents {
    pub emotion: f64,
    pub memory: f64,
    pub trauma: f64,
    pub feedback: f64,
    pub environment: f64,
    pub wisdom_factor: f64,
}

/// Consciousness/sentiment JSON block (spec.md §6).
#[derive(Debug, Clone, Serialize)]
pub struct ConsciousnessPublication {
    pub ct: f64,
    pub components: ConsciousnessComponents,
    pub active_pattern: String,
    pub has_trauma: bool,
    pub ft: f64,
    pub ft_raw: f64,
    pub accumulated_conscience: f64,
    pub feedback_influence: f64,
    pub history_depth: usize,
    pub affective_background: f64,
    pub wisdom: f64,
}

/// Raw per-tick result, before JSON publication shaping.
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub affect: AffectVector,
    pub match_result: MatchResult,
    pub conscience: ConscienceState,
    pub sentiment: SentimentState,
    pub goal_state: GoalState,
    pub emergency: Option<EmergencyResponse>,
    pub has_trauma: bool,
    pub new_memory_id: Option<String>,
    pub new_trauma_id: Option<String>,
    pub integration: Option<IntegrationResult>,
    pub snapshot: Option<Snapshot>,
}

pub struct Engine {
    config: EngineConfig,
    buffer: ShortTermBuffer,
    pattern_store: PatternStore,
    matcher: Matcher,
    updater: Updater,
    graph: WordAffectGraph,
    memory: MemoryManager,
    consciousness: ConsciousnessComputer,
    goals: GoalEngine,
    amygdala: Amygdala,
    decision: DecisionEngine,
    persistence: PersistenceClient,
    current_feedback: FeedbackState,
    current_environment: EnvironmentState,
    current_trauma: Option<Trauma>,
    tick_duration_s: f64,
    tick_count: u64,
    last_goal_state: Option<GoalState>,
    last_tick: Option<TickOutput>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            buffer: ShortTermBuffer::new(config.buffer.clone()),
            pattern_store: PatternStore::new(config.pattern_store.clone()),
            matcher: Matcher::new(config.matcher.clone()),
            updater: Updater::new(config.updater.clone()),
            graph: WordAffectGraph::new(config.graph.clone()),
            memory: MemoryManager::new(config.memory.clone()),
            consciousness: ConsciousnessComputer::new(config.consciousness.clone()),
            goals: GoalEngine::new(config.goals.clone()),
            amygdala: Amygdala::new(config.amygdala.clone()),
            decision: DecisionEngine::new(config.decision.clone()),
            persistence: PersistenceClient::new(config.persistence.clone()),
            current_feedback: FeedbackState::default(),
            current_environment: EnvironmentState::default(),
            current_trauma: None,
            tick_duration_s: 1.0,
            tick_count: 0,
            last_goal_state: None,
            last_tick: None,
            config,
        })
    }

    /// Builds an engine whose goal engine's stochastic term is reproducible
    /// (spec.md §9 stochasticity injection) — for tests only.
    #[cfg(test)]
    pub fn with_seed(config: EngineConfig, seed: u64) -> EngineResult<Self> {
        config.validate()?;
        let mut engine = Self::new(config)?;
        engine.goals = GoalEngine::with_seed(engine.config.goals.clone(), seed);
        Ok(engine)
    }

    pub fn set_feedback(&mut self, feedback: FeedbackState) {
        self.current_feedback = feedback.clone();
        self.consciousness.update_feedback(feedback);
    }

    pub fn set_environment(&mut self, environment: EnvironmentState) {
        self.current_environment = environment.clone();
        self.consciousness.update_environment(environment);
    }

    pub fn set_trauma(&mut self, trauma: Option<Trauma>) {
        self.current_trauma = trauma.clone();
        self.consciousness.update_trauma(trauma);
    }

    pub fn tick_duration_s(&self) -> f64 {
        self.tick_duration_s
    }

    pub fn set_tick_duration_s(&mut self, seconds: f64) {
        self.tick_duration_s = seconds;
    }

    /// Runs one full pipeline pass over an incoming raw affect sample.
    ///
    /// The amygdala check (C10) runs before `goals.tick` (C9) rather than
    /// after, so an emergency detected this tick can override this same
    /// tick's goal output: `GoalEngine::tick` reads its emergency flag at
    /// entry, so setting it first is what makes the override immediate
    /// instead of one tick late.
    pub fn tick(&mut self, affect_in: AffectVector) -> EngineResult<TickOutput> {
        self.tick_count += 1;
        self.buffer.push(affect_in.clone())?;

        let match_result = self.matcher.do_match(&self.buffer, &mut self.pattern_store, self.tick_duration_s);

        let integration = self.buffer.integrate();
        let current_affect = integration
            .as_ref()
            .map(|r| r.integrated_state.clone())
            .unwrap_or(affect_in);

        let relevant_memories = self.memory.query_relevant(&match_result.pattern_name, &current_affect, 10);
        let memory_influence = self.memory.compute_memory_influences(&relevant_memories, 0.1);
        let has_trauma = relevant_memories.iter().any(|m| m.is_trauma);

        let inputs = UpdateInputs {
            feedback_external: self.current_feedback.score(),
            feedback_internal: 0.0,
            delta_t: self.tick_duration_s,
            memory_influence,
            wisdom: self.consciousness.wisdom(),
        };
        let update_result = self
            .updater
            .update(&current_affect, &match_result.coefficients, &inputs, match_result.confidence);

        self.buffer.push(update_result.affect.clone())?;

        let phase_threshold = match_result
            .emergency_threshold
            .max(self.amygdala.default_phase_threshold());
        let triggered = self.amygdala.check_emergency(&update_result.affect, &relevant_memories, phase_threshold);
        let emergency = if triggered {
            let response = self.amygdala.trigger(&update_result.affect);
            self.goals.set_emergency(true, Some(response.action.to_string()));
            Some(response)
        } else {
            self.goals.set_emergency(false, None);
            None
        };

        let t_trauma = if relevant_memories.is_empty() {
            0.0
        } else {
            relevant_memories.iter().filter(|m| m.is_trauma).map(|m| m.activation).sum::<f64>()
                / relevant_memories.len() as f64
        };
        // last use of `relevant_memories`; `self.memory` can be mutated from here on.
        drop(relevant_memories);

        let mut new_memory_id = None;
        let mut new_trauma_id = None;
        if let Some(trauma) = self.memory.create_potential_trauma(update_result.affect.clone()) {
            new_trauma_id = Some(trauma.id.clone());
        } else {
            let memory = self.memory.record_memory(update_result.affect.clone(), &match_result.pattern_name, String::new());
            new_memory_id = Some(memory.id.clone());
        }

        self.consciousness.update_emotions(update_result.affect.values, &match_result.pattern_name);
        self.consciousness.update_memory_activation(MemoryActivation::default());
        self.consciousness.update_trauma(self.current_trauma.clone());
        let (conscience, sentiment) = self.consciousness.tick();

        let (s_positive, s_negative) = self.graph.affect_edge_balance();
        self.goals.set_memory_influence(MemoryGraphInfluence {
            s_positive,
            s_negative,
            t_trauma,
        });
        let goal_state = self.goals.tick(&update_result.affect, sentiment.ft, self.consciousness.wisdom());
        self.last_goal_state = Some(goal_state.clone());

        let snapshot = self.graph.create_snapshot();
        if snapshot.is_some() {
            self.graph.apply_edge_decay();
        }

        if emergency.is_some() {
            warn!(tick = self.tick_count, "tick completed under emergency override");
        } else {
            info!(tick = self.tick_count, pattern = %match_result.pattern_name, "tick completed");
        }

        let output = TickOutput {
            affect: update_result.affect,
            match_result,
            conscience,
            sentiment,
            goal_state,
            emergency,
            has_trauma,
            new_memory_id,
            new_trauma_id,
            integration,
            snapshot,
        };
        self.last_tick = Some(output.clone());
        Ok(output)
    }

    /// The most recently completed tick's result, if any.
    pub fn last_tick(&self) -> Option<&TickOutput> {
        self.last_tick.as_ref()
    }

    /// Ingests a sentence's tokens into the word-affect graph (C6), run
    /// independently of the affect tick on the raw token stream.
    pub fn ingest_tokens(&mut self, batch: TokenBatch) {
        let mut word_ids = Vec::with_capacity(batch.tokens.len());
        for token in &batch.tokens {
            let id = self.graph.add_word(&token.lemma, &token.pos, &batch.sentence_id, &token.original);
            self.graph.detect_temporal_cooccurrences(&id);
            word_ids.push(id);
        }
        for (src, dst, relation_type) in &batch.relations {
            if let (Some(src_id), Some(dst_id)) = (word_ids.get(*src), word_ids.get(*dst)) {
                self.graph.add_semantic_edge(src_id, dst_id, relation_type);
            }
        }
    }

    /// Registers the current affect as a graph affect node once it has
    /// persisted long enough, and runs causality detection from it.
    pub fn ingest_affect_context(&mut self, affect: &AffectVector, persistence_duration_s: f64) -> Option<String> {
        let (_, _, dominant_value) = affect.dominant();
        let id = self
            .graph
            .add_affect_with_context(affect.clone(), persistence_duration_s, affect.valence(), dominant_value)?;
        self.graph.detect_causality(&id);
        Some(id)
    }

    /// Runs the deliberation engine (C11) against the last tick's state.
    /// Not part of `tick` — called on request, per the data-flow contract.
    pub fn decide(&mut self, context_type: &str) -> DecisionResult {
        let affect = self
            .buffer
            .integrate()
            .map(|r| r.integrated_state)
            .unwrap_or_default();
        let ct = self.consciousness.last_conscience().map(|c| c.ct).unwrap_or(0.0);
        let ft = self.consciousness.last_sentiment().map(|s| s.ft).unwrap_or(0.0);
        let goals = self
            .last_goal_state
            .clone()
            .unwrap_or_else(|| self.goals.tick(&affect, ft, self.consciousness.wisdom()));
        self.decision.decide(&affect, ct, ft, &goals, context_type)
    }

    pub fn buffer(&self) -> &ShortTermBuffer {
        &self.buffer
    }

    pub fn pattern_store(&self) -> &PatternStore {
        &self.pattern_store
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn graph(&self) -> &WordAffectGraph {
        &self.graph
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn consciousness(&self) -> &ConsciousnessComputer {
        &self.consciousness
    }

    pub fn goals(&self) -> &GoalEngine {
        &self.goals
    }

    pub fn amygdala(&self) -> &Amygdala {
        &self.amygdala
    }

    pub fn decision(&self) -> &DecisionEngine {
        &self.decision
    }

    pub fn persistence(&self) -> &PersistenceClient {
        &self.persistence
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Assembles the per-tick state-publication JSON shape (spec.md §6).
    pub fn publish_state(&self, tick: &TickOutput) -> StatePublication {
        let mut affect = BTreeMap::new();
        for (name, value) in EMOTION_NAMES.iter().zip(tick.affect.values.iter()) {
            affect.insert(*name, *value);
        }
        let (_, dominant_name, dominant_value) = tick.affect.dominant();
        let buffer_metrics = tick
            .integration
            .as_ref()
            .map(|r| BufferPublication {
                size: self.buffer.len(),
                stability: r.stability,
                volatility: r.volatility,
                trend: r.trend,
            })
            .unwrap_or(BufferPublication {
                size: self.buffer.len(),
                stability: 0.0,
                volatility: 0.0,
                trend: 0.0,
            });

        StatePublication {
            affect,
            e_global: tick.affect.e_global,
            variance_global: tick.affect.variance_global,
            valence: tick.affect.valence(),
            intensity: dominant_value,
            dominant_name,
            dominant_value,
            pattern: PatternPublication {
                id: tick.match_result.pattern_id.clone(),
                name: tick.match_result.pattern_name.clone(),
                similarity: tick.match_result.similarity,
                confidence: tick.match_result.confidence,
                is_new: tick.match_result.is_new_pattern,
                is_transition: tick.match_result.is_transition,
            },
            coefficients: CoefficientPublication {
                alpha: tick.match_result.coefficients.alpha,
                beta: tick.match_result.coefficients.beta,
                gamma: tick.match_result.coefficients.gamma,
                delta: tick.match_result.coefficients.delta,
                theta: tick.match_result.coefficients.theta,
                emergency_threshold: tick.match_result.emergency_threshold,
            },
            phase_label: tick.match_result.pattern_name.clone(),
            phase_duration_s: self.matcher.current_phase_duration_s(),
            buffer: buffer_metrics,
            graph: GraphPublication {
                word_count: self.graph.word_count(),
                affect_count: self.graph.affect_node_count(),
                edge_count: self.graph.edge_count(),
                causal_edge_count: self.graph.causal_edge_count(),
                density: self.graph.density(),
            },
            statistics: StatisticsPublication {
                transitions: self.matcher.transitions_recorded(),
                emergency_triggers: self.amygdala.emergency_count(),
                wisdom: self.consciousness.wisdom(),
                total_patterns: self.pattern_store.len(),
                total_matches: self.matcher.total_matches(),
                patterns_created: self.matcher.patterns_created(),
            },
        }
    }

    /// Assembles the consciousness/sentiment JSON block (spec.md §6).
    pub fn publish_consciousness(&self, tick: &TickOutput) -> ConsciousnessPublication {
        ConsciousnessPublication {
            ct: tick.conscience.ct,
            components: ConsciousnessComponents {
                emotion: tick.conscience.emotion_component,
                memory: tick.conscience.memory_component,
                trauma: tick.conscience.trauma_component,
                feedback: tick.conscience.feedback_component,
                environment: tick.conscience.environment_component,
                wisdom_factor: tick.conscience.wisdom_factor,
            },
            active_pattern: tick.conscience.active_pattern.clone(),
            has_trauma: tick.has_trauma,
            ft: tick.sentiment.ft,
            ft_raw: tick.sentiment.ft_raw,
            accumulated_conscience: tick.sentiment.weighted_history,
            feedback_influence: tick.sentiment.feedback_influence,
            history_depth: tick.sentiment.history_depth,
            affective_background: self.consciousness.affective_background(),
            wisdom: self.consciousness.wisdom(),
        }
    }

    /// Fires memory persistence to the external store, absorbing any
    /// transport/timeout error rather than letting it block the caller —
    /// external-I/O failures never block the tick pipeline (spec.md §7).
    pub async fn persist_memory(&self, affect: &AffectVector, context: &str) {
        if !self.persistence.is_store_ready() {
            return;
        }
        if let Err(err) = self.persistence.create_memory(affect, context).await {
            warn!(error = %err, "memory persistence call failed, continuing without it");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{now_ms, IDX_FEAR, IDX_JOY, NUM_EMOTIONS};

    fn peaked(index: usize, value: f64) -> AffectVector {
        let mut v = [0.05; NUM_EMOTIONS];
        v[index] = value;
        AffectVector::new(v)
    }

    #[test]
    fn tick_runs_full_pipeline_and_publishes_state() {
        let mut engine = Engine::with_seed(EngineConfig::default(), 42).unwrap();
        let out = engine.tick(peaked(IDX_JOY, 0.8)).unwrap();
        let state = engine.publish_state(&out);
        assert_eq!(state.affect.len(), NUM_EMOTIONS);
        assert!((state.e_global).is_finite());
        assert!(!state.pattern.name.is_empty());
    }

    #[test]
    fn reflex_bypass_on_extreme_fear() {
        let mut engine = Engine::with_seed(EngineConfig::default(), 7).unwrap();
        for _ in 0..3 {
            engine.tick(peaked(IDX_FEAR, 0.97)).unwrap();
        }
        let decision = engine.decide("threat");
        assert!(decision.is_reflex);
        assert!(decision.confidence >= 0.5);
    }

    #[test]
    fn sustained_fear_triggers_amygdala_and_overrides_goal() {
        let mut engine = Engine::with_seed(EngineConfig::default(), 11).unwrap();
        let mut triggered_once = false;
        for _ in 0..5 {
            let out = engine.tick(peaked(IDX_FEAR, 0.95)).unwrap();
            if out.emergency.is_some() {
                triggered_once = true;
                assert!((out.goal_state.g - 1.0).abs() < 1e-9);
            }
        }
        assert!(triggered_once);
    }

    #[test]
    fn repeated_joy_settles_into_a_stable_pattern() {
        let mut engine = Engine::with_seed(EngineConfig::default(), 3).unwrap();
        let mut last = None;
        for _ in 0..10 {
            let out = engine.tick(peaked(IDX_JOY, 0.7)).unwrap();
            last = Some(out);
        }
        let out = last.unwrap();
        assert!(out.match_result.confidence >= 0.0);
        assert!(engine.pattern_store().len() >= 1);
    }

    #[test]
    fn token_ingestion_grows_the_graph() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.ingest_tokens(TokenBatch {
            sentence_id: "s1".to_string(),
            tokens: vec![
                TokenIn {
                    lemma: "storm".to_string(),
                    pos: "NOUN".to_string(),
                    original: "storm".to_string(),
                },
                TokenIn {
                    lemma: "fear".to_string(),
                    pos: "NOUN".to_string(),
                    original: "feared".to_string(),
                },
            ],
            relations: vec![(0, 1, "causes".to_string())],
        });
        assert_eq!(engine.graph().word_count(), 2);
        assert_eq!(engine.graph().edge_count(), 1);
    }

    #[test]
    fn buffer_validation_error_propagates_out_of_tick() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let mut v = [0.05; NUM_EMOTIONS];
        v[0] = f64::NAN;
        let bad = AffectVector::new(v);
        assert!(engine.tick(bad).is_err());
    }

    #[test]
    fn now_ms_is_monotonic_enough_for_snapshot_gating() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }
}
