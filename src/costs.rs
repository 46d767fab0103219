//! Random-access view over arc costs.
//!
//! Real arcs read the caller's dense row-major distance matrix through the
//! retained-index remapping; artificial arcs read an internal buffer that
//! the solver fills with the big-M cost. Both backings share one
//! contiguous id space, so the hot pivot loop never dispatches on arc
//! kind beyond a single range check.

use crate::{E, I};

/// Cost lookup for all arcs of the reduced problem.
///
/// The distance slice and the retained column map are borrowed from the
/// driver; only the per-row offsets (`rows[i] * stride`) are materialized
/// so a real-arc lookup is one add after the id split.
pub struct ArcCosts<'a> {
    distance: &'a [E],
    row_offsets: Vec<I>,
    cols: &'a [I],
    demand_count: I,
    real_count: I,
    // Costs of artificial arcs have no slot in the caller's matrix and
    // are stored here instead.
    extended: Vec<E>,
}

impl<'a> ArcCosts<'a> {
    /// `stride` is the column count of the caller's matrix (the original
    /// demand count), not the retained one.
    pub fn new(distance: &'a [E], rows: &[I], cols: &'a [I], stride: I) -> Self {
        let row_offsets: Vec<I> = rows.iter().map(|&r| r * stride).collect();
        let real_count = row_offsets.len() * cols.len();
        Self {
            distance,
            row_offsets,
            cols,
            demand_count: cols.len(),
            real_count,
            extended: Vec::new(),
        }
    }

    pub fn real_count(&self) -> I {
        self.real_count
    }

    /// Grows the artificial backing to cover arc ids `[real, len)`.
    /// Never truncates previously allocated storage.
    pub fn resize(&mut self, len: I) {
        let extended_len = len - self.real_count;
        if extended_len > self.extended.len() {
            self.extended.resize(extended_len, 0.);
        }
    }

    #[inline]
    pub fn get(&self, arc: I) -> E {
        if arc < self.real_count {
            let row = self.row_offsets[arc / self.demand_count];
            self.distance[row + self.cols[arc % self.demand_count]]
        } else {
            self.extended[arc - self.real_count]
        }
    }

    pub fn set_artificial(&mut self, arc: I, value: E) {
        self.extended[arc - self.real_count] = value;
    }

    /// Largest absolute distance among retained entries. Used to
    /// calibrate the big-M cost and the optimality tolerance.
    pub fn max_abs_real(&self) -> E {
        let mut max = 0.;
        for &row in &self.row_offsets {
            for &col in self.cols {
                let val = self.distance[row + col].abs();
                if val > max {
                    max = val;
                }
            }
        }
        max
    }
}
