//! C6 — word-affect graph: a bipartite graph of word nodes and affect
//! nodes linked by temporal, semantic, causal and lexical edges.

use crate::config::GraphConfig;
use crate::types::{now_ms, AffectVector};
use crate::utils::generate_id_with_prefix;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordNode {
    pub id: String,
    pub lemma: String,
    pub pos: String,
    pub sentence_id: String,
    pub original: String,
    pub first_seen_ms: u64,
    pub activations: u64,
    pub last_activation_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectNode {
    pub id: String,
    pub affect: AffectVector,
    pub valence: f64,
    pub intensity: f64,
    pub persistence_duration_s: f64,
    pub birth_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    Temporal,
    Semantic,
    Causal,
    Lexical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub src: String,
    pub dst: String,
    pub strength: f64,
    pub relation_type: Option<String>,
    pub last_reinforced_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalityReport {
    pub word_id: String,
    pub triggered_affect_ids: Vec<String>,
    pub causal_strength: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp_ms: u64,
    pub word_node_count: usize,
    pub affect_node_count: usize,
    pub edge_count: usize,
    pub adjacency: Vec<(String, String, f64)>,
}

pub struct WordAffectGraph {
    config: GraphConfig,
    word_nodes: HashMap<String, WordNode>,
    lemma_index: HashMap<String, String>,
    affect_nodes: HashMap<String, AffectNode>,
    edges: Vec<Edge>,
    next_id: u64,
    last_snapshot_ms: Option<u64>,
}

impl WordAffectGraph {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            word_nodes: HashMap::new(),
            lemma_index: HashMap::new(),
            affect_nodes: HashMap::new(),
            edges: Vec::new(),
            next_id: 0,
            last_snapshot_ms: None,
        }
    }

    fn gen_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        generate_id_with_prefix(prefix, self.next_id)
    }

    /// Upserts a word node keyed by lemma; reinforces activation on repeat.
    pub fn add_word(&mut self, lemma: &str, pos: &str, sentence_id: &str, original: &str) -> String {
        if let Some(id) = self.lemma_index.get(lemma).cloned() {
            if let Some(node) = self.word_nodes.get_mut(&id) {
                node.activations += 1;
                node.last_activation_ms = now_ms();
            }
            return id;
        }
        let id = self.gen_id("word");
        let now = now_ms();
        self.word_nodes.insert(
            id.clone(),
            WordNode {
                id: id.clone(),
                lemma: lemma.to_string(),
                pos: pos.to_string(),
                sentence_id: sentence_id.to_string(),
                original: original.to_string(),
                first_seen_ms: now,
                activations: 1,
                last_activation_ms: now,
            },
        );
        self.lemma_index.insert(lemma.to_string(), id.clone());
        id
    }

    pub fn word_node(&self, id: &str) -> Option<&WordNode> {
        self.word_nodes.get(id)
    }

    /// Inserts an affect node only if `persistence_duration_s` meets the
    /// configured threshold; returns `None` otherwise.
    pub fn add_affect_with_context(
        &mut self,
        affect: AffectVector,
        persistence_duration_s: f64,
        valence: f64,
        intensity: f64,
    ) -> Option<String> {
        if persistence_duration_s < self.config.emotion_persistence_threshold_seconds {
            return None;
        }
        let id = self.gen_id("affect");
        self.affect_nodes.insert(
            id.clone(),
            AffectNode {
                id: id.clone(),
                affect,
                valence,
                intensity,
                persistence_duration_s,
                birth_time_ms: now_ms(),
            },
        );
        Some(id)
    }

    pub fn affect_node(&self, id: &str) -> Option<&AffectNode> {
        self.affect_nodes.get(id)
    }

    /// Adds or reinforces temporal edges between `word_id` and every other
    /// word whose last activation falls within `temporal_window_ms`.
    pub fn detect_temporal_cooccurrences(&mut self, word_id: &str) {
        let Some(anchor) = self.word_nodes.get(word_id).map(|w| w.last_activation_ms) else {
            return;
        };
        let window = self.config.temporal_window_ms;
        let candidates: Vec<String> = self
            .word_nodes
            .values()
            .filter(|w| w.id != word_id)
            .filter(|w| anchor.abs_diff(w.last_activation_ms) <= window)
            .map(|w| w.id.clone())
            .collect();
        for other in candidates {
            self.reinforce_or_create(EdgeKind::Temporal, word_id, &other, 0.2, None);
        }
    }

    pub fn add_semantic_edge(&mut self, src_word: &str, dst_word: &str, relation_type: &str) {
        self.reinforce_or_create(EdgeKind::Semantic, src_word, dst_word, 0.3, Some(relation_type.to_string()));
    }

    /// Creates/reinforces causal edges from words activated within the
    /// causality window of `affect_id`'s birth (the slower window applies
    /// to low-arousal affects, i.e. ones whose dominant value is modest).
    pub fn detect_causality(&mut self, affect_id: &str) {
        let Some(node) = self.affect_nodes.get(affect_id).cloned() else {
            return;
        };
        let is_low_arousal = node.intensity < 0.4;
        let window_ms = if is_low_arousal {
            self.config.slow_emotion_causality_threshold_ms
        } else {
            self.config.causality_threshold_ms
        };
        let candidates: Vec<(String, u64)> = self
            .word_nodes
            .values()
            .filter(|w| node.birth_time_ms.saturating_sub(w.last_activation_ms) <= window_ms
                && w.last_activation_ms <= node.birth_time_ms)
            .map(|w| (w.id.clone(), w.last_activation_ms))
            .collect();
        for (word_id, activation_ms) in candidates {
            let proximity = 1.0 - (node.birth_time_ms.saturating_sub(activation_ms) as f64 / window_ms.max(1) as f64);
            let strength = (proximity.clamp(0.0, 1.0) * node.intensity).clamp(0.0, 1.0);
            self.reinforce_or_create(EdgeKind::Causal, &word_id, affect_id, strength, None);
        }
    }

    /// Aggregates causal edges per triggering word.
    pub fn analyze_causality(&self) -> Vec<CausalityReport> {
        let mut by_word: HashMap<String, (Vec<String>, f64)> = HashMap::new();
        for edge in self.edges.iter().filter(|e| e.kind == EdgeKind::Causal) {
            let entry = by_word.entry(edge.src.clone()).or_insert_with(|| (Vec::new(), 0.0));
            entry.0.push(edge.dst.clone());
            entry.1 = entry.1.max(edge.strength);
        }
        by_word
            .into_iter()
            .map(|(word_id, (triggered, strength))| CausalityReport {
                word_id,
                triggered_affect_ids: triggered,
                causal_strength: strength,
            })
            .collect()
    }

    /// Drops word/affect nodes past TTL or below the minimum activation to
    /// keep, and any edge referencing a dropped node.
    pub fn prune_expired_nodes(&mut self) {
        let now = now_ms();
        let ttl_ms = (self.config.node_ttl_seconds * 1000.0) as u64;
        let min_activation = self.config.min_activation_to_keep;

        let expired_words: Vec<String> = self
            .word_nodes
            .values()
            .filter(|w| now.saturating_sub(w.first_seen_ms) > ttl_ms && (w.activations as f64) < min_activation)
            .map(|w| w.id.clone())
            .collect();
        for id in &expired_words {
            if let Some(w) = self.word_nodes.remove(id) {
                self.lemma_index.remove(&w.lemma);
            }
        }

        let expired_affects: Vec<String> = self
            .affect_nodes
            .values()
            .filter(|a| now.saturating_sub(a.birth_time_ms) > ttl_ms)
            .map(|a| a.id.clone())
            .collect();
        for id in &expired_affects {
            self.affect_nodes.remove(id);
        }

        self.edges.retain(|e| {
            !expired_words.contains(&e.src)
                && !expired_words.contains(&e.dst)
                && !expired_affects.contains(&e.src)
                && !expired_affects.contains(&e.dst)
        });
    }

    /// Multiplies every edge strength by `edge_decay_factor`; drops edges
    /// below `edge_floor`.
    pub fn apply_edge_decay(&mut self) {
        for edge in &mut self.edges {
            edge.strength *= self.config.edge_decay_factor;
        }
        self.edges.retain(|e| e.strength >= self.config.edge_floor);
    }

    /// Returns a snapshot at most once per `snapshot_interval_seconds`;
    /// returns `None` if called again before the interval elapses.
    pub fn create_snapshot(&mut self) -> Option<Snapshot> {
        let now = now_ms();
        let interval_ms = (self.config.snapshot_interval_seconds * 1000.0) as u64;
        if let Some(last) = self.last_snapshot_ms {
            if now.saturating_sub(last) < interval_ms {
                return None;
            }
        }
        self.last_snapshot_ms = Some(now);
        Some(Snapshot {
            timestamp_ms: now,
            word_node_count: self.word_nodes.len(),
            affect_node_count: self.affect_nodes.len(),
            edge_count: self.edges.len(),
            adjacency: self
                .edges
                .iter()
                .map(|e| (e.src.clone(), e.dst.clone(), e.strength))
                .collect(),
        })
    }

    fn reinforce_or_create(&mut self, kind: EdgeKind, src: &str, dst: &str, base_strength: f64, relation_type: Option<String>) {
        let now = now_ms();
        if let Some(edge) = self
            .edges
            .iter_mut()
            .find(|e| e.kind == kind && e.src == src && e.dst == dst)
        {
            edge.strength = (edge.strength + base_strength * (1.0 - edge.strength)).clamp(0.0, 1.0);
            edge.last_reinforced_ms = now;
            return;
        }
        self.edges.push(Edge {
            kind,
            src: src.to_string(),
            dst: dst.to_string(),
            strength: base_strength.clamp(0.0, 1.0),
            relation_type,
            last_reinforced_ms: now,
        });
    }

    pub fn word_count(&self) -> usize {
        self.word_nodes.len()
    }

    pub fn affect_node_count(&self) -> usize {
        self.affect_nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn causal_edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.kind == EdgeKind::Causal).count()
    }

    pub fn density(&self) -> f64 {
        let n = self.word_nodes.len() + self.affect_nodes.len();
        if n < 2 {
            return 0.0;
        }
        let max_edges = (n * (n - 1) / 2) as f64;
        self.edges.len() as f64 / max_edges
    }

    /// Aggregates causal/lexical edge strength into the two scalars the goal
    /// engine's memory-influence term expects, split by the linked affect
    /// node's valence (`>= 0.5` positive, else negative).
    pub fn affect_edge_balance(&self) -> (f64, f64) {
        let mut positive = 0.0;
        let mut negative = 0.0;
        for edge in &self.edges {
            if !matches!(edge.kind, EdgeKind::Causal | EdgeKind::Lexical) {
                continue;
            }
            let node = self.affect_nodes.get(&edge.dst).or_else(|| self.affect_nodes.get(&edge.src));
            let Some(node) = node else { continue };
            if node.valence >= 0.5 {
                positive += edge.strength;
            } else {
                negative += edge.strength;
            }
        }
        (positive, negative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NUM_EMOTIONS;

    #[test]
    fn add_word_reinforces_on_repeat_lemma() {
        let mut graph = WordAffectGraph::new(GraphConfig::default());
        let id1 = graph.add_word("storm", "NOUN", "s1", "storm");
        let id2 = graph.add_word("storm", "NOUN", "s2", "storms");
        assert_eq!(id1, id2);
        assert_eq!(graph.word_node(&id1).unwrap().activations, 2);
    }

    #[test]
    fn affect_node_rejected_below_persistence_threshold() {
        let mut graph = WordAffectGraph::new(GraphConfig::default());
        let result = graph.add_affect_with_context(AffectVector::new([0.1; NUM_EMOTIONS]), 0.1, 0.5, 0.5);
        assert!(result.is_none());
    }

    #[test]
    fn semantic_edge_is_added_between_two_words() {
        let mut graph = WordAffectGraph::new(GraphConfig::default());
        let a = graph.add_word("fire", "NOUN", "s1", "fire");
        let b = graph.add_word("burn", "VERB", "s1", "burned");
        graph.add_semantic_edge(&a, &b, "causes");
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn edge_decay_drops_edges_below_floor() {
        let mut graph = WordAffectGraph::new(GraphConfig {
            edge_decay_factor: 0.1,
            edge_floor: 0.05,
            ..GraphConfig::default()
        });
        let a = graph.add_word("a", "NOUN", "s1", "a");
        let b = graph.add_word("b", "NOUN", "s1", "b");
        graph.add_semantic_edge(&a, &b, "rel");
        graph.apply_edge_decay();
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn snapshot_is_rate_limited_by_interval() {
        let mut graph = WordAffectGraph::new(GraphConfig {
            snapshot_interval_seconds: 3600.0,
            ..GraphConfig::default()
        });
        let first = graph.create_snapshot();
        assert!(first.is_some());
        let second = graph.create_snapshot();
        assert!(second.is_none());
    }
}
