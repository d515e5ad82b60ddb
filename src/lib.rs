//! Incremental dependency-graph calculation engine for magnetometer
//! front-end parameter tuning.
//!
//! Named physical parameters feed a directed acyclic graph of named
//! computations. The [`Engine`] validates the graph on every structural
//! change, recomputes only what a parameter change affects, and keeps the
//! current, previous and caller-saved result snapshots.

pub mod analysis;
pub mod compute;
pub mod config;
pub mod display;
pub mod store;
pub mod strategies;

pub use compute::{Dependencies, Engine, EngineError, FnStrategy, PassReport, Result, Snapshot, Strategy, StrategyError};
pub use config::{EngineConfig, FailurePolicy};
pub use display::DependencyTree;
pub use store::{ParameterStore, ResultEnvelope, Value};
pub use strategies::StrategyRegistry;
