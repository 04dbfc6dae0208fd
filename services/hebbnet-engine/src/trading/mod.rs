//! Trading extension: regimes, signals and the trading learner

mod learner;
mod regime;
mod signal;

pub use learner::{price_from_f64, PerformanceCounters, PerformanceMetrics, TradingLearner};
pub use regime::MarketRegime;
pub use signal::{ClassProbabilities, Signal, SignalStrength, SignalType};
