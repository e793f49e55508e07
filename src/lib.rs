//! # Affect Engine
//!
//! An affective cognitive engine: a short-term/long-term affect memory
//! pipeline, a word-affect graph, consciousness/sentiment computation, and
//! goal and deliberation engines, composed into a single per-tick
//! supervisor (`engine::Engine`) and exposed over HTTP (`api::create_router`).

pub mod amygdala;
pub mod api;
pub mod buffer;
pub mod config;
pub mod consciousness;
pub mod decision;
pub mod engine;
pub mod error;
pub mod goals;
pub mod graph;
pub mod matcher;
pub mod memory;
pub mod pattern;
pub mod persistence;
pub mod types;
pub mod updater;
pub mod utils;

pub use api::{create_router, start_server};
pub use config::EngineConfig;
pub use engine::{Engine, TickOutput};
pub use error::{EngineError, EngineResult};

/// Current crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_engine_constructs() {
        let engine = Engine::new(EngineConfig::default());
        assert!(engine.is_ok());
    }
}
