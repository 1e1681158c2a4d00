//! Core data types for walk-forward research.
//!
//! A `PriceSeries` is the time-indexed table every strategy evaluator reads.
//! Windows borrow contiguous slices of its bars, so the series itself is
//! never copied or mutated during an optimization run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("Timestamps must be strictly increasing: {previous} followed by {current} at row {row}")]
    NotIncreasing {
        row: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("Non-finite close price at row {row} ({date})")]
    InvalidClose { row: usize, date: NaiveDate },
}

/// One observation of a futures session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Session date (unique within a series)
    pub date: NaiveDate,

    #[serde(default)]
    pub open: f64,

    #[serde(default)]
    pub high: f64,

    #[serde(default)]
    pub low: f64,

    /// Closing price, the only price field the reference evaluator requires
    pub close: f64,

    #[serde(default)]
    pub volume: f64,
}

impl Bar {
    /// Bar carrying only a close; the other price fields mirror it.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }
}

/// Ordered series of bars with strictly increasing, unique dates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Build a series, rejecting out-of-order or duplicate dates.
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for (row, bar) in bars.iter().enumerate() {
            if !bar.close.is_finite() {
                return Err(SeriesError::InvalidClose {
                    row,
                    date: bar.date,
                });
            }
            if row > 0 {
                let previous = bars[row - 1].date;
                if bar.date <= previous {
                    return Err(SeriesError::NotIncreasing {
                        row,
                        previous,
                        current: bar.date,
                    });
                }
            }
        }

        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Closing prices in series order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}
