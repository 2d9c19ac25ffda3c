//! Technical indicator payload and the calculations behind it.
//!
//! Values are aligned index-for-index with the input candle series.
//! Positions inside an indicator's warm-up window are reported as `0.0`
//! so every output vector has the same length as the input.

use serde::{Deserialize, Serialize};

/// MACD line, signal line and histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// Bollinger bands (20-period, 2 standard deviations)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

/// The full indicator payload cached per `(market, symbol, interval)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub ma5: Vec<f64>,
    pub ma10: Vec<f64>,
    pub ma20: Vec<f64>,
    pub ema12: Vec<f64>,
    pub ema26: Vec<f64>,
    pub macd: MacdSeries,
    pub rsi: Vec<f64>,
    pub bollinger: BollingerBands,
    pub volume: Vec<u64>,
}

/// Calculate Simple Moving Average for a given period
///
/// # Arguments
/// * `closes` - Slice of closing prices
/// * `period` - Period for the moving average (e.g., 5, 10, 20)
///
/// # Returns
/// * Vector of MA values aligned with the input (warm-up values are 0.0)
pub fn calculate_sma(closes: &[f64], period: usize) -> Vec<f64> {
    let mut ma_values = vec![0.0; closes.len()];

    if period == 0 || closes.len() < period {
        return ma_values;
    }

    for i in (period - 1)..closes.len() {
        let start_idx = i + 1 - period;
        let sum: f64 = closes[start_idx..=i].iter().sum();
        ma_values[i] = sum / period as f64;
    }

    ma_values
}

/// Calculate Exponential Moving Average for a given period
///
/// Seeded with the SMA of the first `period` values, then smoothed with
/// multiplier `2 / (period + 1)`.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    let mut ema_values = vec![0.0; closes.len()];

    if period == 0 || closes.len() < period {
        return ema_values;
    }

    let seed: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    let multiplier = 2.0 / (period as f64 + 1.0);

    ema_values[period - 1] = seed;
    for i in period..closes.len() {
        ema_values[i] = (closes[i] - ema_values[i - 1]) * multiplier + ema_values[i - 1];
    }

    ema_values
}

/// Calculate Relative Strength Index (Wilder smoothing)
///
/// # Returns
/// * Vector of RSI values in 0..=100 (warm-up values are 0.0)
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut rsi_values = vec![0.0; closes.len()];

    if period == 0 || closes.len() <= period {
        return rsi_values;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss += -change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    rsi_values[period] = rsi_from_averages(avg_gain, avg_loss);

    for i in (period + 1)..closes.len() {
        let change = closes[i] - closes[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;

        rsi_values[i] = rsi_from_averages(avg_gain, avg_loss);
    }

    rsi_values
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Calculate MACD (12/26 EMAs, 9-period signal)
pub fn calculate_macd(closes: &[f64]) -> MacdSeries {
    let ema12 = calculate_ema(closes, 12);
    let ema26 = calculate_ema(closes, 26);

    let macd: Vec<f64> = ema12
        .iter()
        .zip(ema26.iter())
        .map(|(fast, slow)| {
            if *fast == 0.0 || *slow == 0.0 {
                0.0
            } else {
                fast - slow
            }
        })
        .collect();

    let signal = calculate_ema(&macd, 9);
    let histogram: Vec<f64> = macd
        .iter()
        .zip(signal.iter())
        .map(|(m, s)| if *s == 0.0 { 0.0 } else { m - s })
        .collect();

    MacdSeries {
        macd,
        signal,
        histogram,
    }
}

/// Calculate Bollinger bands around an SMA
pub fn calculate_bollinger(closes: &[f64], period: usize, std_devs: f64) -> BollingerBands {
    let middle = calculate_sma(closes, period);
    let mut upper = vec![0.0; closes.len()];
    let mut lower = vec![0.0; closes.len()];

    if period > 0 && closes.len() >= period {
        for i in (period - 1)..closes.len() {
            let window = &closes[i + 1 - period..=i];
            let mean = middle[i];
            let variance: f64 =
                window.iter().map(|c| (c - mean) * (c - mean)).sum::<f64>() / period as f64;
            let deviation = variance.sqrt() * std_devs;
            upper[i] = mean + deviation;
            lower[i] = mean - deviation;
        }
    }

    BollingerBands {
        upper,
        middle,
        lower,
    }
}
