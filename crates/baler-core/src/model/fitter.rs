//! Per-column statistics gathering for model fitting.
//!
//! Fitting runs at most two passes over the sample: an estimate pass fed
//! from random draws plus a streamed prefix, then a full tuning pass only
//! if some column's statistics had not settled. A column is settled when
//! the recent half of its feeds produced nothing new.

use std::collections::HashMap;

use crate::error::Result;
use crate::schema::{AttrVector, Schema, SlotKind};

/// Rows drawn uniformly at random before sequential streaming starts.
pub const EST_SAMPLE: usize = 2000;

/// Minimum rows streamed before the estimate pass may stop early.
pub const NON_FULL_PASS_STOP: usize = 5000;

/// Largest decimal exponent a real column may be scaled by.
pub const MAX_REAL_SCALE_POW: u32 = 6;

/// Quantisation step for an integer column with the given tolerance.
/// Rounding division by an odd step keeps the error at `(step - 1) / 2`,
/// which is `floor(tolerance)`; tolerances below one are lossless.
pub fn int_step(tolerance: f64) -> i64 {
    2 * (tolerance.max(0.0) as i64) + 1
}

pub fn quantize(v: i64, step: i64) -> i64 {
    if step == 1 {
        return v;
    }
    let half = step / 2;
    if v >= 0 {
        (v + half) / step
    } else {
        (v - half) / step
    }
}

/// Smallest decimal exponent that represents `v` within its relative
/// tolerance, capped at `MAX_REAL_SCALE_POW`.
fn required_pow(v: f64, tolerance: f64) -> u32 {
    for p in 0..=MAX_REAL_SCALE_POW {
        let scale = 10f64.powi(p as i32);
        let err = (((v * scale).round() / scale) - v).abs();
        if err <= tolerance * v.abs() {
            return p;
        }
    }
    MAX_REAL_SCALE_POW
}

/// Exponent floor implied by the tolerance alone, so values written after
/// fitting stay inside it even when the sample needed less precision
/// (quantisation error is at most `0.5 / 10^p`).
fn tolerance_pow(tolerance: f64) -> u32 {
    if tolerance <= 0.0 {
        return MAX_REAL_SCALE_POW;
    }
    let p = (0.5 / tolerance).log10().ceil();
    (p.max(0.0) as u32).min(MAX_REAL_SCALE_POW)
}

#[derive(Debug)]
pub(super) enum SlotStats {
    /// Enum columns, and Int columns after quantisation.
    Symbolic {
        step: i64,
        counts: HashMap<i64, u64>,
        feeds: usize,
        last_new: usize,
    },
    /// Real columns: counts at maximum precision plus the decimal
    /// exponent the samples actually need.
    Scaled {
        tolerance: f64,
        pow: u32,
        counts: HashMap<i64, u64>,
        feeds: usize,
        last_new: usize,
    },
    /// String columns: character frequencies.
    Chars {
        counts: HashMap<i64, u64>,
        feeds: usize,
        last_new: usize,
    },
}

impl SlotStats {
    fn new(kind: SlotKind, tolerance: f64) -> Self {
        match kind {
            SlotKind::Enum { .. } => SlotStats::Symbolic {
                step: 1,
                counts: HashMap::new(),
                feeds: 0,
                last_new: 0,
            },
            SlotKind::Int => SlotStats::Symbolic {
                step: int_step(tolerance),
                counts: HashMap::new(),
                feeds: 0,
                last_new: 0,
            },
            SlotKind::Real => SlotStats::Scaled {
                tolerance,
                pow: tolerance_pow(tolerance),
                counts: HashMap::new(),
                feeds: 0,
                last_new: 0,
            },
            SlotKind::Str => SlotStats::Chars {
                counts: HashMap::new(),
                feeds: 0,
                last_new: 0,
            },
        }
    }

    fn learn(&mut self, v: &AttrVector, slot: usize) -> Result<()> {
        match self {
            SlotStats::Symbolic { step, counts, feeds, last_new } => {
                *feeds += 1;
                let q = quantize(v.get_int(slot)?, *step);
                if *counts.entry(q).and_modify(|c| *c += 1).or_insert(1) == 1 {
                    *last_new = *feeds;
                }
            }
            SlotStats::Scaled { tolerance, pow, counts, feeds, last_new } => {
                *feeds += 1;
                let value = v.get_real(slot)?;
                let need = required_pow(value, *tolerance);
                if need > *pow {
                    *pow = need;
                    *last_new = *feeds;
                }
                let max_scale = 10f64.powi(MAX_REAL_SCALE_POW as i32);
                let key = (value * max_scale).round() as i64;
                if *counts.entry(key).and_modify(|c| *c += 1).or_insert(1) == 1 {
                    *last_new = *feeds;
                }
            }
            SlotStats::Chars { counts, feeds, last_new } => {
                *feeds += 1;
                for b in v.get_str(slot)?.bytes() {
                    if *counts.entry(b as i64).and_modify(|c| *c += 1).or_insert(1) == 1 {
                        *last_new = *feeds;
                    }
                }
            }
        }
        Ok(())
    }

    fn settled(&self) -> bool {
        let (feeds, last_new) = match self {
            SlotStats::Symbolic { feeds, last_new, .. }
            | SlotStats::Scaled { feeds, last_new, .. }
            | SlotStats::Chars { feeds, last_new, .. } => (*feeds, *last_new),
        };
        feeds >= 64 && (feeds - last_new) * 2 >= feeds
    }

    /// Final `(step-or-scale, counts)` for the code table, with real
    /// counts rescaled from max precision down to the fitted exponent.
    pub(super) fn finish(&self) -> (i64, HashMap<i64, u64>) {
        match self {
            SlotStats::Symbolic { step, counts, .. } => (*step, counts.clone()),
            SlotStats::Scaled { pow, counts, .. } => {
                let scale = 10i64.pow(*pow);
                let down = 10f64.powi((MAX_REAL_SCALE_POW - *pow) as i32);
                let mut rescaled: HashMap<i64, u64> = HashMap::with_capacity(counts.len());
                for (&k, &c) in counts {
                    *rescaled.entry((k as f64 / down).round() as i64).or_insert(0) += c;
                }
                (scale, rescaled)
            }
            SlotStats::Chars { counts, .. } => (1, counts.clone()),
        }
    }
}

/// Streaming statistics over one relation's sample.
#[derive(Debug)]
pub struct Fitter {
    pub(super) stats: Vec<SlotStats>,
    feeds: usize,
}

impl Fitter {
    pub fn new(schema: &Schema) -> Self {
        let stats = schema
            .slots()
            .iter()
            .map(|d| SlotStats::new(d.kind, d.tolerance))
            .collect();
        Self { stats, feeds: 0 }
    }

    pub fn learn(&mut self, row: &AttrVector) -> Result<()> {
        self.feeds += 1;
        for (slot, stats) in self.stats.iter_mut().enumerate() {
            stats.learn(row, slot)?;
        }
        Ok(())
    }

    /// True while some column's statistics are still moving and a full
    /// tuning pass would change the model.
    pub fn require_full_pass(&self) -> bool {
        !self.stats.iter().all(SlotStats::settled)
    }

    pub fn feeds(&self) -> usize {
        self.feeds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SlotDesc;

    #[test]
    fn test_int_step() {
        assert_eq!(int_step(0.0), 1);
        assert_eq!(int_step(0.5), 1);
        assert_eq!(int_step(1.0), 3);
        assert_eq!(int_step(2.5), 5);
    }

    #[test]
    fn test_quantize_error_within_tolerance() {
        for tol in [0.5, 1.0, 3.0] {
            let step = int_step(tol);
            for v in -50..=50 {
                let q = quantize(v, step);
                assert!(((q * step) - v).abs() as f64 <= tol, "v={v} tol={tol}");
            }
        }
    }

    #[test]
    fn test_required_pow_money() {
        // Two-decimal money under a quarter-percent relative tolerance.
        assert!(required_pow(123.45, 0.0025) <= 2);
        assert_eq!(required_pow(100.0, 0.0025), 0);
    }

    #[test]
    fn test_tolerance_pow_floor() {
        assert_eq!(tolerance_pow(0.0025), 3);
        assert_eq!(tolerance_pow(2.5e-5), 5);
        assert_eq!(tolerance_pow(0.0), MAX_REAL_SCALE_POW);
        assert_eq!(tolerance_pow(1.0), 0);
    }

    #[test]
    fn test_fitter_settles_on_small_domain() {
        let schema = Schema::new(vec![SlotDesc::enumerated(10)]);
        let mut fitter = Fitter::new(&schema);
        let mut v = schema.new_vector();
        for i in 0..200 {
            v.set_int(0, i % 5).unwrap();
            fitter.learn(&v).unwrap();
        }
        assert!(!fitter.require_full_pass());
    }

    #[test]
    fn test_fitter_requests_full_pass_on_growing_domain() {
        let schema = Schema::new(vec![SlotDesc::enumerated(100_000)]);
        let mut fitter = Fitter::new(&schema);
        let mut v = schema.new_vector();
        for i in 0..200 {
            v.set_int(0, i).unwrap();
            fitter.learn(&v).unwrap();
        }
        assert!(fitter.require_full_pass());
    }
}
