//! The TAO Engine and Janitor: the layer that drives one run from its
//! current on-disk state to a terminal or waiting status, and reconciles
//! a `RUNNING` run against real OS state at resume time.

pub mod engine;
pub mod error;
pub mod janitor;

pub use engine::{Engine, EngineConfig, ASK_HUMAN_TOOL};
pub use error::EngineError;
pub use janitor::{reconcile, JanitorOutcome};
