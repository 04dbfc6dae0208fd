//! HebbNet demo - trains every model on synthetic data and prints signals
//!
//! 1. Loads configuration (optional file from HEBBNET_CONFIG, plus HEBBNET__* env)
//! 2. Trains a voting ensemble on labelled feature clusters and grades its signal
//! 3. Trains a trading ensemble and emits a risk-managed signal
//! 4. Trains the specialists on a synthetic candle series and reports consensus

use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hebbnet_engine::trading::price_from_f64;
use hebbnet_engine::{
    Candle, Dataset, EngineConfig, Ensemble, LabeledWindow, SpecialistCoordinator,
    TradingEnsemble, VotingStrategy, BUY, HOLD, SELL,
};

const FEATURES: usize = 8;
const WINDOW: usize = 30;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting HebbNet demo...");

    let path = std::env::var("HEBBNET_CONFIG").ok().map(PathBuf::from);
    let config = EngineConfig::load(path.as_deref()).context("loading configuration")?;
    info!(
        "Config: {} units, ensemble of {}, {} epochs",
        config.learner.hidden_size, config.ensemble.size, config.training.epochs
    );

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let train = clusters(&mut rng, 600)?;
    let val = clusters(&mut rng, 200)?;
    let test = clusters(&mut rng, 200)?;

    let mut ensemble: Ensemble = Ensemble::from_config(FEATURES, &config)?;
    ensemble.train(&train, &val, None)?;
    for strategy in [
        VotingStrategy::Majority,
        VotingStrategy::Weighted,
        VotingStrategy::Confidence,
    ] {
        let mut correct = 0;
        for (x, y) in test.iter() {
            if ensemble.predict(x, strategy)? == y {
                correct += 1;
            }
        }
        info!(
            "📊 {:?} voting test accuracy: {:.1}%",
            strategy,
            100.0 * correct as f64 / test.len() as f64
        );
    }

    let (query, _) = test.iter().next().context("empty test set")?;
    let signal = ensemble.trading_signal(query, Decimal::ONE_HUNDRED, Utc::now(), &config.trading)?;
    info!(
        "Voting ensemble signal: {:?} ({:?}) confidence {:.2}",
        signal.action, signal.strength, signal.confidence
    );

    let mut trading = TradingEnsemble::from_config(FEATURES, &config)?;
    trading.train(&train, &val, None)?;
    let prices = random_walk(&mut rng, 100.0, 40)?;
    let closes: Vec<f64> = prices.iter().map(|c| c.close).collect();
    let regime = trading.detect_regime(&closes);
    info!("Market regime: {}", regime);

    let last = closes.last().copied().context("empty price series")?;
    let signal = trading.generate_ensemble_signal(query, price_from_f64(last)?, Utc::now())?;
    info!(
        "📈 Ensemble signal: {:?} ({:?}) confidence {:.2}, agreement {:.0}%",
        signal.action,
        signal.strength,
        signal.confidence,
        signal.agreement * 100.0
    );

    let candles = random_walk(&mut rng, 100.0, 1_200)?;
    let windows = label_windows(&candles, config.trading.hold_tolerance);
    let split = windows.len() * 4 / 5;
    let mut specialists = SpecialistCoordinator::new(config.specialists.clone())?;
    specialists.train(&windows[..split], &windows[split..])?;
    let recent = &candles[candles.len() - WINDOW..];
    let consensus = specialists.get_consensus(recent)?;
    info!(
        "🔭 Specialist consensus: {} (agreement {:.0}%, confidence {:.2})",
        consensus.signal,
        consensus.agreement * 100.0,
        consensus.avg_confidence
    );

    Ok(())
}

/// Three noisy clusters, one per class
fn clusters(rng: &mut ChaCha8Rng, n: usize) -> anyhow::Result<Dataset> {
    let noise = Normal::new(0.0, 0.15)?;
    let mut features = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let label = [SELL, HOLD, BUY][i % 3];
        let center = (label + 1) as usize * 2;
        let x: Vec<f64> = (0..FEATURES)
            .map(|d| {
                let base = if d == center || d == center + 1 { 1.0 } else { 0.0 };
                base + noise.sample(rng)
            })
            .collect();
        features.push(x);
        labels.push(label);
    }
    Ok(Dataset::new(features, labels)?)
}

fn random_walk(rng: &mut ChaCha8Rng, start: f64, n: usize) -> anyhow::Result<Vec<Candle>> {
    let step = Normal::new(0.0005, 0.01)?;
    let mut close = start;
    let mut candles = Vec::with_capacity(n);
    for i in 0..n {
        let open = close;
        close = (open * (1.0 + step.sample(rng))).max(0.01);
        let wick = open.max(close) * rng.gen_range(0.0..0.005);
        candles.push(Candle {
            timestamp: 1_700_000_000 + 60 * i as i64,
            open,
            high: open.max(close) + wick,
            low: (open.min(close) - wick).max(0.0),
            close,
            volume: rng.gen_range(500.0..1_500.0),
        });
    }
    Ok(candles)
}

/// Label each window by the next bar's return
fn label_windows(candles: &[Candle], tolerance: f64) -> Vec<LabeledWindow> {
    candles
        .windows(WINDOW + 1)
        .map(|w| {
            let (window, next) = w.split_at(WINDOW);
            let last = window[WINDOW - 1].close;
            let change = (next[0].close - last) / last;
            let label = if change > tolerance {
                BUY
            } else if change < -tolerance {
                SELL
            } else {
                HOLD
            };
            LabeledWindow {
                candles: window.to_vec(),
                label,
            }
        })
        .collect()
}
