//! Slice geometry resolution.
//!
//! A row selection and a column selection are mapped to a physical access
//! pattern in buffer order: `size`, `offset` and `step` as `(x, y)` pairs
//! plus the leading dimension of the buffer. `x` is the contiguous
//! direction, `y` walks over leading-dimension strides.
//!
//! The geometry is computed in natural (row-major) terms first, where `x`
//! indexes columns and `y` indexes rows; for a column-major table the `x`
//! and `y` roles are swapped. Everything downstream (the copy policy and the
//! gather/scatter loops) is therefore layout-agnostic.

use crate::range::Selection;
use crate::table::{DataLayout, TableMetadata};

/// A pair of per-direction values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexPair {
    pub x: usize,
    pub y: usize,
}

impl IndexPair {
    #[inline]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn swapped(self) -> Self {
        Self {
            x: self.y,
            y: self.x,
        }
    }
}

/// Physical access pattern of a rectangular selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SliceGeometry {
    /// Number of selected elements along each direction.
    pub size: IndexPair,
    /// Buffer coordinates of the first selected element.
    pub offset: IndexPair,
    /// Distance between selected elements along each direction.
    pub step: IndexPair,
    /// Elements between consecutive `y` positions in the buffer.
    pub leading_dimension: usize,
}

impl SliceGeometry {
    /// Total number of selected elements.
    #[inline]
    pub fn element_count(&self) -> usize {
        self.size.x * self.size.y
    }

    /// Buffer index of the first selected element.
    #[inline]
    pub fn base_offset(&self) -> usize {
        self.offset.y * self.leading_dimension + self.offset.x
    }

    /// Buffer index of output element `(x, y)`.
    #[inline]
    pub fn source_index(&self, x: usize, y: usize) -> usize {
        (y * self.step.y + self.offset.y) * self.leading_dimension
            + (x * self.step.x + self.offset.x)
    }
}

/// Resolve `rows × columns` of a table into buffer-order geometry.
///
/// Both selections must already be validated against `meta`.
pub fn resolve(meta: &TableMetadata, rows: &Selection, columns: &Selection) -> SliceGeometry {
    let size = IndexPair::new(columns.count(), rows.count());
    let offset = IndexPair::new(columns.start, rows.start);
    let step = IndexPair::new(columns.step, rows.step);
    match meta.layout() {
        DataLayout::RowMajor => SliceGeometry {
            size,
            offset,
            step,
            leading_dimension: meta.column_count(),
        },
        DataLayout::ColumnMajor => SliceGeometry {
            size: size.swapped(),
            offset: offset.swapped(),
            step: step.swapped(),
            leading_dimension: meta.row_count(),
        },
    }
}
