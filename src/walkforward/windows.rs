//! Walk-forward window generation.
//!
//! Slices an ordered series into rolling in-sample/out-of-sample pairs.
//! The out-of-sample slice always starts where the in-sample slice ends.

use std::ops::Range;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::Bar;

/// Index bounds of one window, independent of any data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    /// Window number (1-indexed).
    pub index: usize,
    /// Offset of the first in-sample observation.
    pub offset: usize,
    /// In-sample observation range.
    pub in_sample: Range<usize>,
    /// Out-of-sample observation range.
    pub out_sample: Range<usize>,
}

impl WindowBounds {
    /// Total observations covered by the window.
    pub fn total_len(&self) -> usize {
        self.out_sample.end - self.in_sample.start
    }
}

/// A window over borrowed series data.
#[derive(Debug, Clone, Copy)]
pub struct WalkForwardWindow<'a> {
    /// Window number (1-indexed).
    pub index: usize,
    pub offset: usize,
    pub in_sample: &'a [Bar],
    pub out_sample: &'a [Bar],
}

impl<'a> WalkForwardWindow<'a> {
    /// Date of the first in-sample observation.
    pub fn start_date(&self) -> NaiveDate {
        self.in_sample[0].date
    }

    /// Date of the last in-sample observation.
    pub fn in_sample_end(&self) -> NaiveDate {
        self.in_sample[self.in_sample.len() - 1].date
    }

    /// Date of the first out-of-sample observation.
    pub fn out_sample_start(&self) -> NaiveDate {
        self.out_sample[0].date
    }

    /// Date of the last out-of-sample observation.
    pub fn end_date(&self) -> NaiveDate {
        self.out_sample[self.out_sample.len() - 1].date
    }
}

/// Generator for walk-forward windows.
///
/// All sizes must be positive; `WalkForwardConfig::validate` enforces this
/// before a scheduler is built by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowScheduler {
    in_sample_size: usize,
    out_sample_size: usize,
    step_size: usize,
}

impl WindowScheduler {
    pub fn new(in_sample_size: usize, out_sample_size: usize, step_size: usize) -> Self {
        Self {
            in_sample_size,
            out_sample_size,
            step_size,
        }
    }

    fn span(&self) -> usize {
        self.in_sample_size + self.out_sample_size
    }

    /// Get expected number of windows for a series of `len` observations.
    pub fn expected_windows(&self, len: usize) -> usize {
        if self.step_size == 0 || self.in_sample_size == 0 || self.out_sample_size == 0 {
            return 0;
        }
        if len < self.span() {
            return 0;
        }
        (len - self.span()) / self.step_size + 1
    }

    /// Generate index bounds for every window that fits in `len` observations.
    pub fn bounds(&self, len: usize) -> Vec<WindowBounds> {
        (0..self.expected_windows(len))
            .map(|i| {
                let offset = i * self.step_size;
                let split = offset + self.in_sample_size;
                WindowBounds {
                    index: i + 1,
                    offset,
                    in_sample: offset..split,
                    out_sample: split..split + self.out_sample_size,
                }
            })
            .collect()
    }

    /// Generate all windows over `bars`.
    pub fn generate<'a>(&self, bars: &'a [Bar]) -> Vec<WalkForwardWindow<'a>> {
        self.bounds(bars.len())
            .into_iter()
            .map(|b| WalkForwardWindow {
                index: b.index,
                offset: b.offset,
                in_sample: &bars[b.in_sample],
                out_sample: &bars[b.out_sample],
            })
            .collect()
    }
}
