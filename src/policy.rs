//! Zero-copy decision.
//!
//! A selection can alias the table buffer only if its elements are
//! consecutive in buffer order and no type conversion is needed:
//!
//! - both steps are 1, and
//! - the selection covers at most one `y` position, or spans the full
//!   leading dimension (so consecutive `y` positions are adjacent).
//!
//! Anything else is gathered into a new densely packed buffer of
//! `size.x * size.y` elements.

use crate::geometry::SliceGeometry;
use crate::Conversion;

/// How an accessor serves a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPlan {
    /// Borrow `len` elements of the buffer starting at element `offset`.
    Alias { offset: usize, len: usize },
    /// Copy (and convert) into a new buffer.
    Gather,
}

impl AccessPlan {
    #[inline]
    pub fn is_alias(&self) -> bool {
        matches!(self, AccessPlan::Alias { .. })
    }
}

/// Whether the selected elements form one contiguous run in the buffer.
#[inline]
pub fn is_contiguous(geometry: &SliceGeometry) -> bool {
    geometry.step.x == 1
        && geometry.step.y == 1
        && (geometry.size.y <= 1 || geometry.size.x == geometry.leading_dimension)
}

/// Choose between aliasing and gathering.
///
/// Any conversion other than [`Conversion::Identity`] forces a gather, even
/// when the geometry alone would allow aliasing.
pub fn decide(geometry: &SliceGeometry, conversion: Conversion) -> AccessPlan {
    if conversion != Conversion::Identity || !is_contiguous(geometry) {
        return AccessPlan::Gather;
    }
    let len = geometry.element_count();
    if len == 0 {
        return AccessPlan::Alias { offset: 0, len: 0 };
    }
    AccessPlan::Alias {
        offset: geometry.base_offset(),
        len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::IndexPair;

    fn geom(size: (usize, usize), offset: (usize, usize), step: (usize, usize), ld: usize) -> SliceGeometry {
        SliceGeometry {
            size: IndexPair::new(size.0, size.1),
            offset: IndexPair::new(offset.0, offset.1),
            step: IndexPair::new(step.0, step.1),
            leading_dimension: ld,
        }
    }

    #[test]
    fn test_single_row_aliases() {
        let g = geom((2, 1), (1, 1), (1, 1), 4);
        assert_eq!(
            decide(&g, Conversion::Identity),
            AccessPlan::Alias { offset: 5, len: 2 }
        );
    }

    #[test]
    fn test_full_width_block_aliases() {
        let g = geom((3, 2), (0, 1), (1, 1), 3);
        assert_eq!(
            decide(&g, Conversion::Identity),
            AccessPlan::Alias { offset: 3, len: 6 }
        );
    }

    #[test]
    fn test_sub_width_multi_row_gathers() {
        let g = geom((1, 4), (0, 0), (1, 1), 2);
        assert_eq!(decide(&g, Conversion::Identity), AccessPlan::Gather);
    }

    #[test]
    fn test_step_gathers() {
        let g = geom((3, 2), (0, 0), (1, 2), 3);
        assert!(!is_contiguous(&g));
        assert_eq!(decide(&g, Conversion::Identity), AccessPlan::Gather);
    }

    #[test]
    fn test_conversion_forces_gather() {
        let g = geom((3, 2), (0, 0), (1, 1), 3);
        assert!(is_contiguous(&g));
        assert_eq!(decide(&g, Conversion::Widen), AccessPlan::Gather);
    }

    #[test]
    fn test_empty_aliases_nothing() {
        let g = geom((3, 0), (3, 4), (1, 1), 3);
        assert_eq!(
            decide(&g, Conversion::Identity),
            AccessPlan::Alias { offset: 0, len: 0 }
        );
    }
}
