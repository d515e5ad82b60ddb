//! Executes the calculation graph.
pub mod baseline;
pub mod engine;
pub mod ledger;
pub mod strategy;

pub use baseline::Baselines;
pub use engine::{Engine, PassReport};
pub use ledger::{EngineError, Result, Snapshot};
pub use strategy::{Dependencies, DependencyList, FnStrategy, Strategy, StrategyError};
