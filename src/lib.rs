//! Typed, layout-aware data access for dense homogeneous numeric tables.
//!
//! A [`Table`] couples a shared [`ElementBuffer`] with immutable
//! [`TableMetadata`] (row count, column count, element kind, physical
//! layout). Algorithm code never indexes the buffer directly; it asks an
//! accessor for a rectangular view of some rows and columns in the element
//! type it wants, and writes results back the same way.
//!
//! # Core Types
//!
//! - [`Table`] / [`TableBuilder`]: immutable-shape tables and their zero-initialized builder
//! - [`ElementBuffer`]: owned or borrowed (host/accelerator) byte storage with readiness events
//! - [`View`] / [`ViewMut`]: either an alias into the table buffer or a materialized copy
//! - [`BlockAccessor`], [`RowAccessor`], [`ColumnAccessor`]: the typed pull/push protocol
//!
//! # Zero-Copy Rule
//!
//! A pull aliases the buffer when the requested type is the stored type, the
//! selection has unit step, and the selected elements are consecutive in
//! buffer order (a single logical row, or full rows of the leading
//! dimension). Otherwise the elements are gathered (and converted) into a new
//! densely packed buffer. See [`geometry`] and [`policy`].
//!
//! # Example
//!
//! ```rust
//! use homogen_table::{ColumnAccessor, DataLayout, Table};
//!
//! let data: Vec<f32> = (1..=8).map(|v| v as f32).collect();
//! let table = Table::from_vec(data, 4, 2, DataLayout::RowMajor).unwrap();
//!
//! let acc = ColumnAccessor::<f64, _>::new(&table);
//! let col = acc.pull(0, ..).unwrap();
//! assert_eq!(&col[..], &[1.0, 3.0, 5.0, 7.0]);
//! assert!(col.is_owned());
//! ```
//!
//! # Builder Example
//!
//! ```rust
//! use homogen_table::{ColumnAccessor, DataLayout, DataType, TableBuilder};
//!
//! let mut builder = TableBuilder::zeros(DataType::Float32, 3, 2, DataLayout::RowMajor).unwrap();
//! {
//!     let mut acc = ColumnAccessor::<f64, _>::new(&mut builder);
//!     acc.push(&[1.0, 2.0, 3.0], 1, ..).unwrap();
//! }
//! let table = builder.build();
//! assert_eq!(table.data::<f32>().unwrap(), &[0.0, 1.0, 0.0, 2.0, 0.0, 3.0]);
//! ```

pub mod accessor;
pub mod buffer;
pub mod builder;
pub mod event;
pub mod geometry;
mod kernel;
pub mod policy;
pub mod range;
pub mod table;
pub mod view;

// ============================================================================
// Element kinds (re-exported from homogen-traits)
// ============================================================================
pub use homogen_traits::{Conversion, DataType, Element, Scalar, TypedVec};

// ============================================================================
// Tables and storage
// ============================================================================
pub use buffer::{AllocationKind, ElementBuffer};
pub use builder::TableBuilder;
pub use event::{CompletionEvent, HostEvent, ReadinessToken};
pub use table::{Axis, DataLayout, Table, TableMetadata};

// ============================================================================
// Geometry and policy
// ============================================================================
pub use geometry::{resolve, IndexPair, SliceGeometry};
pub use policy::{decide, AccessPlan};
pub use range::{Idx, Selection, SliceIndex, StridedRange};

// ============================================================================
// Accessors and views
// ============================================================================
pub use accessor::{BlockAccessor, ColumnAccessor, RowAccessor, TableSource, TableSourceMut};
pub use view::{Packed, View, ViewData, ViewMut};

// ============================================================================
// Constants
// ============================================================================

/// Element count above which gather/scatter loops split rows across threads
/// (only with the `parallel` feature).
///
/// Override at runtime with the `HOMOGEN_TABLE_PAR_THRESHOLD` environment
/// variable.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 1 << 16;

/// Effective parallel threshold, read once from the environment.
pub fn parallel_threshold() -> usize {
    static THRESHOLD: std::sync::OnceLock<usize> = std::sync::OnceLock::new();
    *THRESHOLD.get_or_init(|| {
        std::env::var("HOMOGEN_TABLE_PAR_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PARALLEL_THRESHOLD)
    })
}

// ============================================================================
// Error types
// ============================================================================

/// Broad category of a [`TableError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Construction-time invariant violated; no table was created.
    InvalidArgument,
    /// Index or range outside the table, or mismatched push geometry.
    Range,
    /// Unsupported element kind or memory that cannot be accessed as requested.
    Domain,
    /// A materialized buffer could not be allocated.
    Allocation,
}

/// Errors that can occur while building tables or accessing them.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// Index or range end exceeds the dimension.
    #[error("{axis} range {start}..{end} out of bounds for dimension {bound}")]
    OutOfBounds {
        axis: Axis,
        start: usize,
        end: usize,
        bound: usize,
    },

    /// Range with `start > end`.
    #[error("{axis} range start {start} is greater than end {end}")]
    InvalidRange { axis: Axis, start: usize, end: usize },

    /// A strided selection with step 0.
    #[error("{axis} range step must be at least 1")]
    ZeroStep { axis: Axis },

    /// Values passed to `push` do not match the resolved geometry.
    #[error("push of {actual} elements into a selection of {expected} elements")]
    GeometryMismatch { expected: usize, actual: usize },

    /// A view passed to `push` has a different shape than the selection.
    #[error(
        "push of a {actual_rows}x{actual_cols} view into a {expected_rows}x{expected_cols} selection"
    )]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        actual_rows: usize,
        actual_cols: usize,
    },

    /// Element type requested does not match the stored type.
    #[error("type mismatch: table stores {stored}, requested {requested}")]
    TypeMismatch {
        stored: DataType,
        requested: DataType,
    },

    /// Unknown numeric element-kind tag.
    #[error("unknown data type id {0}")]
    UnknownDataType(u32),

    /// Memory that host code cannot dereference.
    #[error("{0:?} memory is not host accessible")]
    HostInaccessible(AllocationKind),

    /// Strided selection where a contiguous block is required.
    #[error("{axis} selection must be contiguous")]
    NonContiguous { axis: Axis },

    /// Materialized buffer allocation failed.
    #[error("failed to allocate {bytes} bytes")]
    AllocationFailed { bytes: usize },

    /// Buffer byte length does not match `rows * cols * size_of(type)`.
    #[error("buffer holds {actual} bytes, table shape requires {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Negative row or column count at a signed boundary.
    #[error("negative {axis} count {value}")]
    NegativeDimension { axis: Axis, value: i64 },

    /// Integer overflow while computing sizes.
    #[error("size overflow while computing table extent")]
    Overflow,

    /// Buffer pointer is not aligned for the element kind.
    #[error("buffer is not aligned for {0}")]
    Misaligned(DataType),

    /// Write attempted through read-only foreign memory.
    #[error("buffer is read-only")]
    ReadOnly,

    /// Write attempted through foreign memory shared by other tables.
    #[error("foreign buffer is shared by other tables and cannot be written")]
    SharedForeignBuffer,
}

impl TableError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TableError::OutOfBounds { .. }
            | TableError::InvalidRange { .. }
            | TableError::ZeroStep { .. }
            | TableError::GeometryMismatch { .. }
            | TableError::ShapeMismatch { .. } => ErrorKind::Range,
            TableError::TypeMismatch { .. }
            | TableError::UnknownDataType(_)
            | TableError::HostInaccessible(_)
            | TableError::NonContiguous { .. } => ErrorKind::Domain,
            TableError::AllocationFailed { .. } => ErrorKind::Allocation,
            TableError::SizeMismatch { .. }
            | TableError::NegativeDimension { .. }
            | TableError::Overflow
            | TableError::Misaligned(_)
            | TableError::ReadOnly
            | TableError::SharedForeignBuffer => ErrorKind::InvalidArgument,
        }
    }

    /// Whether this is a range error.
    pub fn is_range(&self) -> bool {
        self.kind() == ErrorKind::Range
    }
}

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// Look up a [`DataType`] by its numeric tag.
pub fn data_type_from_id(id: u32) -> Result<DataType> {
    DataType::from_id(id).ok_or(TableError::UnknownDataType(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = TableError::OutOfBounds {
            axis: Axis::Row,
            start: 1,
            end: 5,
            bound: 4,
        };
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(err.is_range());
        assert_eq!(
            TableError::AllocationFailed { bytes: 8 }.kind(),
            ErrorKind::Allocation
        );
        assert_eq!(
            TableError::SizeMismatch {
                expected: 8,
                actual: 4
            }
            .kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(TableError::UnknownDataType(9).kind(), ErrorKind::Domain);
    }

    #[test]
    fn test_error_display() {
        let err = TableError::OutOfBounds {
            axis: Axis::Column,
            start: 2,
            end: 3,
            bound: 2,
        };
        assert_eq!(
            err.to_string(),
            "column range 2..3 out of bounds for dimension 2"
        );
        let err = TableError::ShapeMismatch {
            expected_rows: 4,
            expected_cols: 1,
            actual_rows: 2,
            actual_cols: 2,
        };
        assert!(err.is_range());
        assert_eq!(
            err.to_string(),
            "push of a 2x2 view into a 4x1 selection"
        );
    }

    #[test]
    fn test_data_type_from_id() {
        assert_eq!(data_type_from_id(1).unwrap(), DataType::Float64);
        assert!(matches!(
            data_type_from_id(77),
            Err(TableError::UnknownDataType(77))
        ));
    }

    #[test]
    fn test_parallel_threshold_positive() {
        assert!(parallel_threshold() > 0);
    }
}
