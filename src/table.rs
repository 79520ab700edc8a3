//! Table metadata and the homogeneous table type.

use std::fmt;
use std::ptr::NonNull;

use crate::buffer::{ElementBuffer, ForeignBuffer};
use crate::range::SliceIndex;
use crate::{DataType, Element, Result, TableError};

/// Physical storage order of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataLayout {
    /// Rows are contiguous (C order).
    #[default]
    RowMajor,
    /// Columns are contiguous (Fortran order).
    ColumnMajor,
}

/// Logical table dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Row,
    Column,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::Row => "row",
            Axis::Column => "column",
        })
    }
}

/// Shape and typing of a table. Immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableMetadata {
    row_count: usize,
    column_count: usize,
    data_type: DataType,
    layout: DataLayout,
}

impl TableMetadata {
    /// Create metadata, checking that the total byte size is representable.
    pub fn new(
        row_count: usize,
        column_count: usize,
        data_type: DataType,
        layout: DataLayout,
    ) -> Result<Self> {
        let meta = Self {
            row_count,
            column_count,
            data_type,
            layout,
        };
        meta.checked_size_in_bytes()?;
        Ok(meta)
    }

    /// Create metadata from signed dimensions, as received from binding
    /// layers that use signed 64-bit counts.
    pub fn from_signed(
        row_count: i64,
        column_count: i64,
        data_type: DataType,
        layout: DataLayout,
    ) -> Result<Self> {
        let rows = usize::try_from(row_count).map_err(|_| TableError::NegativeDimension {
            axis: Axis::Row,
            value: row_count,
        })?;
        let cols = usize::try_from(column_count).map_err(|_| TableError::NegativeDimension {
            axis: Axis::Column,
            value: column_count,
        })?;
        Self::new(rows, cols, data_type, layout)
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    #[inline]
    pub fn layout(&self) -> DataLayout {
        self.layout
    }

    /// Size of `axis`.
    #[inline]
    pub fn dimension(&self, axis: Axis) -> usize {
        match axis {
            Axis::Row => self.row_count,
            Axis::Column => self.column_count,
        }
    }

    #[inline]
    pub fn element_count(&self) -> usize {
        self.row_count * self.column_count
    }

    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.element_count() * self.data_type.size_in_bytes()
    }

    /// Distance in elements between consecutive rows (row-major) or columns
    /// (column-major) in the buffer.
    #[inline]
    pub fn leading_dimension(&self) -> usize {
        match self.layout {
            DataLayout::RowMajor => self.column_count,
            DataLayout::ColumnMajor => self.row_count,
        }
    }

    fn checked_size_in_bytes(&self) -> Result<usize> {
        self.row_count
            .checked_mul(self.column_count)
            .and_then(|n| n.checked_mul(self.data_type.size_in_bytes()))
            .ok_or(TableError::Overflow)
    }
}

/// A dense, homogeneously typed 2D table.
///
/// The shape is fixed for the table's lifetime. Cloning shares the buffer;
/// data changes only through accessor `push` or mutable views, which require
/// `&mut Table`.
#[derive(Debug, Clone)]
pub struct Table {
    meta: TableMetadata,
    buffer: ElementBuffer,
}

impl Table {
    /// Couple a buffer with metadata.
    ///
    /// Fails unless the buffer holds exactly
    /// `row_count * column_count * size_of(data_type)` bytes and its address
    /// is aligned for `data_type`.
    pub fn from_buffer(
        buffer: ElementBuffer,
        data_type: DataType,
        row_count: usize,
        column_count: usize,
        layout: DataLayout,
    ) -> Result<Self> {
        let meta = TableMetadata::new(row_count, column_count, data_type, layout)?;
        Self::from_parts(meta, buffer)
    }

    pub(crate) fn from_parts(meta: TableMetadata, buffer: ElementBuffer) -> Result<Self> {
        let expected = meta.checked_size_in_bytes()?;
        if buffer.len() != expected {
            return Err(TableError::SizeMismatch {
                expected,
                actual: buffer.len(),
            });
        }
        if buffer.as_ptr() as usize % meta.data_type.size_in_bytes() != 0 {
            return Err(TableError::Misaligned(meta.data_type));
        }
        Ok(Self { meta, buffer })
    }

    /// Take ownership of `data`, interpreted in `layout` order.
    pub fn from_vec<T: Element>(
        data: Vec<T>,
        row_count: usize,
        column_count: usize,
        layout: DataLayout,
    ) -> Result<Self> {
        let buffer = ElementBuffer::from_typed_vec(T::into_typed_vec(data));
        Self::from_buffer(buffer, T::DATA_TYPE, row_count, column_count, layout)
    }

    /// Wrap read-only host memory that this layer does not own.
    ///
    /// # Safety
    /// `ptr` must be valid for reads of `row_count * column_count` elements
    /// for the lifetime of the table and all its clones, and must not be
    /// mutated elsewhere while the table is read.
    pub unsafe fn from_raw_parts<T: Element>(
        ptr: NonNull<T>,
        row_count: usize,
        column_count: usize,
        layout: DataLayout,
    ) -> Result<Self> {
        let meta = TableMetadata::new(row_count, column_count, T::DATA_TYPE, layout)?;
        let buffer = ForeignBuffer::new(ptr.cast(), meta.size_in_bytes()).build();
        Self::from_parts(meta, buffer)
    }

    /// Wrap writable host memory that this layer does not own.
    ///
    /// # Safety
    /// As [`Table::from_raw_parts`]; additionally the memory must be valid
    /// for writes and not accessed by anyone else while the table is written.
    pub unsafe fn from_raw_parts_mut<T: Element>(
        ptr: NonNull<T>,
        row_count: usize,
        column_count: usize,
        layout: DataLayout,
    ) -> Result<Self> {
        let meta = TableMetadata::new(row_count, column_count, T::DATA_TYPE, layout)?;
        let buffer = ForeignBuffer::new(ptr.cast(), meta.size_in_bytes())
            .writable()
            .build();
        Self::from_parts(meta, buffer)
    }

    #[inline]
    pub fn metadata(&self) -> &TableMetadata {
        &self.meta
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.meta.row_count
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.meta.column_count
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.meta.data_type
    }

    #[inline]
    pub fn layout(&self) -> DataLayout {
        self.meta.layout
    }

    #[inline]
    pub fn buffer(&self) -> &ElementBuffer {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.meta.element_count() == 0
    }

    /// All elements in buffer order, if `T` is the stored type.
    pub fn data<T: Element>(&self) -> Result<&[T]> {
        self.check_type::<T>()?;
        let bytes = self.buffer.bytes()?;
        bytemuck::try_cast_slice(bytes).map_err(|_| TableError::Misaligned(T::DATA_TYPE))
    }

    /// Mutable elements in buffer order, if `T` is the stored type.
    pub(crate) fn data_mut<T: Element>(&mut self) -> Result<&mut [T]> {
        self.check_type::<T>()?;
        let bytes = self.buffer.bytes_mut()?;
        bytemuck::try_cast_slice_mut(bytes).map_err(|_| TableError::Misaligned(T::DATA_TYPE))
    }

    pub(crate) fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        self.buffer.bytes_mut()
    }

    fn check_type<T: Element>(&self) -> Result<()> {
        if T::DATA_TYPE != self.meta.data_type {
            return Err(TableError::TypeMismatch {
                stored: self.meta.data_type,
                requested: T::DATA_TYPE,
            });
        }
        Ok(())
    }

    /// A table over a contiguous block of the outer dimension, sharing this
    /// table's buffer: rows of a row-major table, columns of a column-major
    /// one. The step must be 1.
    pub fn outer_block<I: SliceIndex>(&self, index: I) -> Result<Table> {
        let axis = match self.meta.layout {
            DataLayout::RowMajor => Axis::Row,
            DataLayout::ColumnMajor => Axis::Column,
        };
        let sel = index.selection(axis, self.meta.dimension(axis))?;
        if sel.step != 1 {
            return Err(TableError::NonContiguous { axis });
        }
        let stride_bytes = self.meta.leading_dimension() * self.meta.data_type.size_in_bytes();
        let window = self
            .buffer
            .window(sel.start * stride_bytes..sel.end * stride_bytes);
        let (rows, cols) = match axis {
            Axis::Row => (sel.count(), self.meta.column_count),
            Axis::Column => (self.meta.row_count, sel.count()),
        };
        let meta = TableMetadata::new(rows, cols, self.meta.data_type, self.meta.layout)?;
        Self::from_parts(meta, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::StridedRange;

    #[test]
    fn test_from_vec() {
        let t = Table::from_vec(vec![1.0f32; 6], 2, 3, DataLayout::RowMajor).unwrap();
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.column_count(), 3);
        assert_eq!(t.data_type(), DataType::Float32);
        assert_eq!(t.metadata().leading_dimension(), 3);
        assert_eq!(t.metadata().size_in_bytes(), 24);
        assert!(t.buffer().is_owned());
    }

    #[test]
    fn test_size_mismatch() {
        let err = Table::from_vec(vec![1i32; 5], 2, 3, DataLayout::RowMajor).unwrap_err();
        match err {
            TableError::SizeMismatch { expected, actual } => {
                assert_eq!(expected, 24);
                assert_eq!(actual, 20);
            }
            _ => panic!("unexpected error: {err:?}"),
        }
    }

    #[test]
    fn test_empty_table() {
        let t = Table::from_vec(Vec::<f64>::new(), 0, 4, DataLayout::ColumnMajor).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.metadata().leading_dimension(), 0);
    }

    #[test]
    fn test_from_signed_rejects_negative() {
        let err =
            TableMetadata::from_signed(-1, 3, DataType::Float64, DataLayout::RowMajor).unwrap_err();
        assert!(matches!(
            err,
            TableError::NegativeDimension {
                axis: Axis::Row,
                value: -1
            }
        ));
        let meta =
            TableMetadata::from_signed(4, 3, DataType::Float64, DataLayout::RowMajor).unwrap();
        assert_eq!(meta.element_count(), 12);
    }

    #[test]
    fn test_metadata_overflow() {
        let err = TableMetadata::new(usize::MAX, 2, DataType::Int32, DataLayout::RowMajor)
            .unwrap_err();
        assert!(matches!(err, TableError::Overflow));
    }

    #[test]
    fn test_data_type_mismatch() {
        let t = Table::from_vec(vec![1i64, 2], 1, 2, DataLayout::RowMajor).unwrap();
        assert_eq!(t.data::<i64>().unwrap(), &[1, 2]);
        let err = t.data::<f64>().unwrap_err();
        assert!(matches!(
            err,
            TableError::TypeMismatch {
                stored: DataType::Int64,
                requested: DataType::Float64
            }
        ));
    }

    #[test]
    fn test_raw_parts_borrowed() {
        let mut data = vec![1.0f64, 2.0, 3.0, 4.0];
        let ptr = NonNull::new(data.as_mut_ptr()).unwrap();
        let t = unsafe { Table::from_raw_parts(ptr, 2, 2, DataLayout::ColumnMajor) }.unwrap();
        assert!(!t.buffer().is_owned());
        assert_eq!(t.buffer().as_ptr(), data.as_ptr() as *const u8);
        assert_eq!(t.data::<f64>().unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        drop(t);
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn test_outer_block_row_major() {
        let t = Table::from_vec((0..12).collect::<Vec<i32>>(), 4, 3, DataLayout::RowMajor).unwrap();
        let block = t.outer_block(1..3).unwrap();
        assert_eq!(block.row_count(), 2);
        assert_eq!(block.column_count(), 3);
        assert!(block.buffer().shares_allocation(t.buffer()));
        assert_eq!(block.data::<i32>().unwrap(), &[3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_outer_block_column_major() {
        let t =
            Table::from_vec((0..12).collect::<Vec<i32>>(), 4, 3, DataLayout::ColumnMajor).unwrap();
        let block = t.outer_block(2..).unwrap();
        assert_eq!(block.row_count(), 4);
        assert_eq!(block.column_count(), 1);
        assert_eq!(block.data::<i32>().unwrap(), &[8, 9, 10, 11]);
    }

    #[test]
    fn test_outer_block_rejects_step_and_bounds() {
        let t = Table::from_vec(vec![0i32; 8], 4, 2, DataLayout::RowMajor).unwrap();
        assert!(t.outer_block(StridedRange::new(0, 4, 2)).is_err());
        assert!(t.outer_block(2..5).unwrap_err().is_range());
    }
}
