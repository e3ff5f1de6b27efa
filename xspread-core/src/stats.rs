//! Equity curve tracking and end-of-run risk statistics.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::position::SpreadTrade;

/// One equity observation, taken after processing a snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EquitySample {
    pub timestamp: DateTime<Utc>,
    pub realized: Decimal,
    pub unrealized: Decimal,
    pub equity: Decimal,
    pub peak: Decimal,
    pub drawdown: Decimal,
}

/// Monotone-peak-tracking equity history, built up one sample per
/// snapshot over the course of a run.
#[derive(Debug, Default)]
pub struct EquityCurve {
    samples: Vec<EquitySample>,
    peak: Decimal,
}

impl EquityCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, timestamp: DateTime<Utc>, realized: Decimal, unrealized: Decimal) {
        let equity = realized + unrealized;
        if equity > self.peak {
            self.peak = equity;
        }
        let drawdown = self.peak - equity;
        self.samples.push(EquitySample {
            timestamp,
            realized,
            unrealized,
            equity,
            peak: self.peak,
            drawdown,
        });
    }

    pub fn samples(&self) -> &[EquitySample] {
        &self.samples
    }

    pub fn max_drawdown_sample(&self) -> Option<EquitySample> {
        self.samples
            .iter()
            .copied()
            .max_by(|a, b| a.drawdown.cmp(&b.drawdown))
    }

    pub fn max_drawdown(&self) -> Decimal {
        self.max_drawdown_sample()
            .map(|s| s.drawdown)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn max_drawdown_pct(&self) -> Decimal {
        match self.max_drawdown_sample() {
            Some(sample) if !sample.peak.is_zero() => {
                sample.drawdown / sample.peak * Decimal::from(100)
            }
            _ => Decimal::ZERO,
        }
    }
}

/// Aggregate risk/performance statistics computed once at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub total_trades: usize,
    pub winners: usize,
    pub losers: usize,
    pub break_even: usize,
    pub win_rate_pct: Decimal,
    pub profit_factor: Option<Decimal>,
    pub gross_pnl: Decimal,
    pub total_fees: Decimal,
    pub net_pnl: Decimal,
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
}

impl Statistics {
    /// `days_in_range` is used to annualize the per-trade Sharpe/Sortino
    /// ratios via `sqrt(252 * trades_per_day)`.
    pub fn compute(trades: &[SpreadTrade], equity_curve: &EquityCurve, days_in_range: f64) -> Self {
        let closed: Vec<&SpreadTrade> = trades.iter().filter(|t| !t.is_open).collect();
        let total_trades = closed.len();
        let winners = closed.iter().filter(|t| t.net_pnl > Decimal::ZERO).count();
        let losers = closed.iter().filter(|t| t.net_pnl < Decimal::ZERO).count();
        let break_even = total_trades - winners - losers;

        let win_rate_pct = if total_trades == 0 {
            Decimal::ZERO
        } else {
            Decimal::from(winners) / Decimal::from(total_trades) * Decimal::from(100)
        };

        let gross_pnl: Decimal = closed.iter().map(|t| t.gross_pnl).sum();
        let total_fees: Decimal = closed.iter().map(|t| t.fees).sum();
        let net_pnl: Decimal = closed.iter().map(|t| t.net_pnl).sum();

        let positive_sum: Decimal = closed
            .iter()
            .filter(|t| t.net_pnl > Decimal::ZERO)
            .map(|t| t.net_pnl)
            .sum();
        let negative_sum: Decimal = closed
            .iter()
            .filter(|t| t.net_pnl < Decimal::ZERO)
            .map(|t| t.net_pnl)
            .sum();
        let profit_factor = if negative_sum.is_zero() {
            None
        } else {
            Some(positive_sum / negative_sum.abs())
        };

        let returns: Vec<f64> = closed
            .iter()
            .map(|t| t.net_pnl.to_f64().unwrap_or(0.0))
            .collect();
        // Spec: `trades_per_day = total / max(1, days_in_range)` — a one-day
        // floor on the denominator, so a sub-day run doesn't inflate the
        // annualization factor.
        let trades_per_day = total_trades as f64 / days_in_range.max(1.0);
        let annualization = (252.0 * trades_per_day).sqrt();

        Self {
            total_trades,
            winners,
            losers,
            break_even,
            win_rate_pct,
            profit_factor,
            gross_pnl,
            total_fees,
            net_pnl,
            max_drawdown: equity_curve.max_drawdown(),
            max_drawdown_pct: equity_curve.max_drawdown_pct(),
            sharpe_ratio: sharpe_ratio(&returns, annualization),
            sortino_ratio: sortino_ratio(&returns, annualization),
        }
    }
}

fn population_stdev(values: &[f64], mean: f64) -> f64 {
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn sharpe_ratio(returns: &[f64], annualization: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let sigma = population_stdev(returns, mean);
    if sigma == 0.0 {
        return None;
    }
    Some(mean / sigma * annualization)
}

/// Downside deviation is root-mean-square of the negative returns
/// themselves (deviation from zero, i.e. semi-deviation against a zero
/// target return), not deviation from the overall mean — the numerator
/// still uses the overall mean, matching the Sharpe numerator.
fn sortino_ratio(returns: &[f64], annualization: f64) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.is_empty() {
        return None;
    }
    let downside_variance =
        downside.iter().map(|r| r.powi(2)).sum::<f64>() / downside.len() as f64;
    let downside_sigma = downside_variance.sqrt();
    if downside_sigma == 0.0 {
        return None;
    }
    Some(mean / downside_sigma * annualization)
}
