//! Rejection of the bounce echoes the G-series housing produces.
//!
//! The classifier is table driven. Each sample's range class code is looked up
//! in three sets, and a short window around the sample decides whether a
//! near-range reading is a pingpong echo. Rules for sample `i` of `n`:
//!
//! 1. `range_mm < 1000`: tentatively filtered unless one of the next three
//!    samples carries a multi-range or smaller-range code.
//! 2. unique-range code: filtered.
//! 3. multi-range code: samples `i-3..=i` and `i+1` are filtered.
//! 4. `i < 3` or `i >= n - 3`: filtered.
//!
//! Rules 2 to 4 force the decision. Rule 1 only contributes when nothing forces
//! the sample, so a forced mark set from a neighbour is never undone.

use crate::constants::{
    EDGE_SAMPLES, MULTI_RANGE_CODES, MULTI_RANGE_LOOKBEHIND, PINGPONG_LOOKAHEAD,
    PINGPONG_RANGE_MM, SMALLER_RANGE_CODES, UNIQUE_RANGE_CODES,
};
use std::collections::HashSet;
use ydlidar_frame::RawSample;

/// Range class codes with a known meaning. Built once, never mutated.
#[derive(Clone, Debug)]
pub struct NoiseTables {
    unique_range: HashSet<u16>,
    multi_range: HashSet<u16>,
    smaller_range: HashSet<u16>,
}

impl NoiseTables {
    pub fn new(unique_range: &[u16], multi_range: &[u16], smaller_range: &[u16]) -> NoiseTables {
        NoiseTables {
            unique_range: unique_range.iter().copied().collect(),
            multi_range: multi_range.iter().copied().collect(),
            smaller_range: smaller_range.iter().copied().collect(),
        }
    }

    pub fn is_unique(&self, code: u16) -> bool {
        self.unique_range.contains(&code)
    }

    pub fn is_multi(&self, code: u16) -> bool {
        self.multi_range.contains(&code)
    }

    pub fn is_smaller(&self, code: u16) -> bool {
        self.smaller_range.contains(&code)
    }
}

impl Default for NoiseTables {
    fn default() -> Self {
        NoiseTables::new(&UNIQUE_RANGE_CODES, &MULTI_RANGE_CODES, &SMALLER_RANGE_CODES)
    }
}

/// Filtered/kept flag per sample of one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterDecisions {
    filtered: Vec<bool>,
}

impl FilterDecisions {
    pub fn is_filtered(&self, index: usize) -> bool {
        self.filtered.get(index).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    pub fn n_filtered(&self) -> usize {
        self.filtered.iter().filter(|f| **f).count()
    }
}

#[derive(Clone, Debug)]
pub struct NoiseFilter {
    enabled: bool,
    tables: NoiseTables,
}

impl NoiseFilter {
    pub fn new(enabled: bool) -> NoiseFilter {
        NoiseFilter {
            enabled,
            tables: NoiseTables::default(),
        }
    }

    pub fn with_tables(enabled: bool, tables: NoiseTables) -> NoiseFilter {
        NoiseFilter { enabled, tables }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Classifies every sample of a frame. All samples are kept when disabled.
    pub fn decide(&self, samples: &[RawSample]) -> FilterDecisions {
        let n = samples.len();
        if !self.enabled {
            return FilterDecisions {
                filtered: vec![false; n],
            };
        }

        let mut tentative = vec![false; n];
        let mut forced = vec![false; n];
        for (i, sample) in samples.iter().enumerate() {
            if sample.range_mm() < PINGPONG_RANGE_MM {
                let end = usize::min(i + 1 + PINGPONG_LOOKAHEAD, n);
                let echo_ahead = samples[i + 1..end].iter().any(|next| {
                    let code = next.range_class_code();
                    self.tables.is_multi(code) || self.tables.is_smaller(code)
                });
                tentative[i] = !echo_ahead;
            }

            let code = sample.range_class_code();
            if self.tables.is_unique(code) {
                forced[i] = true;
            }

            if self.tables.is_multi(code) {
                for flag in &mut forced[i.saturating_sub(MULTI_RANGE_LOOKBEHIND)..=i] {
                    *flag = true;
                }
                if i + 1 < n {
                    forced[i + 1] = true;
                }
            }

            if i < EDGE_SAMPLES || i + EDGE_SAMPLES >= n {
                forced[i] = true;
            }
        }

        let filtered = forced
            .iter()
            .zip(tentative.iter())
            .map(|(f, t)| *f || *t)
            .collect();
        FilterDecisions { filtered }
    }
}
