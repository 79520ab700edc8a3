//! Row and column selections.
//!
//! Any Rust range (`..`, `a..b`, `a..`, `..b`, `a..=b`, `..=b`), a single
//! index ([`Idx`]) or a [`StridedRange`] can select rows or columns. Each is
//! validated against the dimension into a half-open [`Selection`].

use std::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo, RangeToInclusive};

use crate::table::Axis;
use crate::{Result, TableError};

/// A validated half-open selection `[start, end)` with step `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
    pub step: usize,
}

impl Selection {
    /// The whole dimension.
    #[inline]
    pub fn full(dim: usize) -> Self {
        Self {
            start: 0,
            end: dim,
            step: 1,
        }
    }

    /// Number of selected indices.
    #[inline]
    pub fn count(&self) -> usize {
        (self.end - self.start).div_ceil(self.step)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The `i`-th selected index.
    #[inline]
    pub fn index(&self, i: usize) -> usize {
        self.start + i * self.step
    }
}

/// Trait for types that can select rows or columns.
///
/// This mirrors the usual `SliceIndex = Union{RangeIndex, Colon}` convention:
/// implementors only report raw bounds and step; validation is shared.
pub trait SliceIndex {
    /// Raw `(start, end)` given the dimension size. May be out of bounds.
    fn bounds(&self, dim_size: usize) -> (usize, usize);

    /// The step size (1 for regular ranges).
    fn step(&self) -> usize {
        1
    }

    /// Validate against a dimension of size `dim_size`.
    ///
    /// Fails with a range error if `step == 0`, `start > end` or
    /// `end > dim_size`.
    fn selection(&self, axis: Axis, dim_size: usize) -> Result<Selection> {
        let (start, end) = self.bounds(dim_size);
        let step = self.step();
        if step == 0 {
            return Err(TableError::ZeroStep { axis });
        }
        if start > end {
            return Err(TableError::InvalidRange { axis, start, end });
        }
        if end > dim_size {
            return Err(TableError::OutOfBounds {
                axis,
                start,
                end,
                bound: dim_size,
            });
        }
        Ok(Selection { start, end, step })
    }
}

impl SliceIndex for RangeFull {
    fn bounds(&self, dim_size: usize) -> (usize, usize) {
        (0, dim_size)
    }
}

impl SliceIndex for Range<usize> {
    fn bounds(&self, _dim_size: usize) -> (usize, usize) {
        (self.start, self.end)
    }
}

impl SliceIndex for RangeFrom<usize> {
    fn bounds(&self, dim_size: usize) -> (usize, usize) {
        (self.start, dim_size)
    }
}

impl SliceIndex for RangeTo<usize> {
    fn bounds(&self, _dim_size: usize) -> (usize, usize) {
        (0, self.end)
    }
}

impl SliceIndex for RangeInclusive<usize> {
    fn bounds(&self, _dim_size: usize) -> (usize, usize) {
        (*self.start(), self.end().saturating_add(1))
    }
}

impl SliceIndex for RangeToInclusive<usize> {
    fn bounds(&self, _dim_size: usize) -> (usize, usize) {
        (0, self.end.saturating_add(1))
    }
}

impl SliceIndex for Selection {
    fn bounds(&self, _dim_size: usize) -> (usize, usize) {
        (self.start, self.end)
    }

    fn step(&self) -> usize {
        self.step
    }
}

/// A single index.
#[derive(Debug, Clone, Copy)]
pub struct Idx(pub usize);

impl SliceIndex for Idx {
    fn bounds(&self, _dim_size: usize) -> (usize, usize) {
        (self.0, self.0.saturating_add(1))
    }
}

/// A strided range (`start..end` taking every `step`-th index).
#[derive(Debug, Clone, Copy)]
pub struct StridedRange {
    pub start: usize,
    pub end: usize,
    pub step: usize,
}

impl StridedRange {
    pub fn new(start: usize, end: usize, step: usize) -> Self {
        Self { start, end, step }
    }
}

impl SliceIndex for StridedRange {
    fn bounds(&self, _dim_size: usize) -> (usize, usize) {
        (self.start, self.end)
    }

    fn step(&self) -> usize {
        self.step
    }
}
