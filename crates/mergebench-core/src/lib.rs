pub mod config;
pub mod corpus;
pub mod error;
pub mod logging;
pub mod model;
pub mod records;
pub mod strategy;

pub use config::{Settings, StrategySpec, WrongMergePolicy};
pub use corpus::Corpus;
pub use error::{CorpusError, EvalError};
pub use model::{
    Classification, Comparison, ExecutionStatus, ExpectedLabel, MergeOutput, Scenario,
    StrategyRun, Verdict,
};
pub use strategy::MergeStrategy;
