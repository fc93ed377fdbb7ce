//! Consensus value reconciliation
//!
//! Collapses several reviewers' integer opinions (usually chosen slice
//! indices) into one value. All rounding is round-half-up on exact integer
//! arithmetic, so the same inputs always give the same label.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use medfabric_common::ReconcileError;
use serde::{Deserialize, Serialize};

/// Returned by [`ReconcileStrategy::Majority`] when no value has a strict majority
pub const NO_MAJORITY: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileStrategy {
    Mean,
    Median,
    Mode,
    Majority,
}

impl ReconcileStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileStrategy::Mean => "mean",
            ReconcileStrategy::Median => "median",
            ReconcileStrategy::Mode => "mode",
            ReconcileStrategy::Majority => "majority",
        }
    }
}

impl fmt::Display for ReconcileStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconcileStrategy {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(ReconcileStrategy::Mean),
            "median" => Ok(ReconcileStrategy::Median),
            "mode" => Ok(ReconcileStrategy::Mode),
            "majority" => Ok(ReconcileStrategy::Majority),
            _ => Err(ReconcileError::UnsupportedStrategy(s.to_string())),
        }
    }
}

/// Reconcile by strategy name, as received from callers
pub fn reconcile_named(values: &[i64], strategy: &str) -> Result<i64, ReconcileError> {
    let strategy = strategy.parse::<ReconcileStrategy>()?;
    reconcile(values, strategy)
}

pub fn reconcile(values: &[i64], strategy: ReconcileStrategy) -> Result<i64, ReconcileError> {
    if values.is_empty() {
        return Err(ReconcileError::EmptyInput);
    }

    let value = match strategy {
        ReconcileStrategy::Mean => mean(values),
        ReconcileStrategy::Median => median(values),
        ReconcileStrategy::Mode => mode(values),
        ReconcileStrategy::Majority => majority(values),
    };
    Ok(value)
}

/// floor(sum / n + 1/2), computed as floor((2 * sum + n) / (2 * n))
fn mean(values: &[i64]) -> i64 {
    let sum: i128 = values.iter().map(|v| *v as i128).sum();
    let n = values.len() as i128;
    (2 * sum + n).div_euclid(2 * n) as i64
}

fn median(values: &[i64]) -> i64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        let pair = sorted[mid - 1] as i128 + sorted[mid] as i128;
        (pair + 1).div_euclid(2) as i64
    }
}

fn counts(values: &[i64]) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for value in values {
        *counts.entry(*value).or_insert(0) += 1;
    }
    counts
}

/// Most frequent value; smallest value wins a tie
fn mode(values: &[i64]) -> i64 {
    let mut best = (values[0], 0usize);
    // BTreeMap iterates ascending, so strict `>` keeps the smallest on ties
    for (value, count) in counts(values) {
        if count > best.1 {
            best = (value, count);
        }
    }
    best.0
}

fn majority(values: &[i64]) -> i64 {
    let candidate = mode(values);
    let count = values.iter().filter(|v| **v == candidate).count();
    if count * 2 > values.len() {
        candidate
    } else {
        NO_MAJORITY
    }
}
