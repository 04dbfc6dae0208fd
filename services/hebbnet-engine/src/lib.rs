//! HebbNet Engine
//!
//! Competitive Hebbian learners for market signal classification: a spherical
//! k-means core with conscience and refractory dynamics, seeded ensembles,
//! risk-managed trading signals and specialist sub-networks.

pub mod config;
pub mod dataset;
pub mod ensemble;
pub mod error;
pub mod indicators;
pub mod network;
pub mod persistence;
pub mod specialist;
pub mod state;
pub mod trading;
pub mod training;
pub mod voting;

// Re-export main types for convenience
pub use config::{
    EngineConfig, EnsembleConfig, LearnerConfig, RegimeConfig, ReseedSchedule,
    SpecialistsConfig, TradingConfig, TrainingConfig,
};
pub use dataset::{Dataset, BUY, HOLD, SELL};
pub use ensemble::{
    Ensemble, EnsembleSignal, Member, MemberReport, TradingEnsemble, TradingSettings,
    TrainingSummary,
};
pub use error::{EngineError, Result};
pub use network::{Learner, NetworkStats};
pub use persistence::Persist;
pub use specialist::{
    Candle, ConsensusReport, LabeledWindow, SpecialistCoordinator, SpecialistKind,
};
pub use trading::{MarketRegime, Signal, SignalStrength, SignalType, TradingLearner};
pub use training::{fit, FitReport};
pub use voting::VotingStrategy;
