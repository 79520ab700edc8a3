//! Typed pull/push accessors.
//!
//! An accessor binds a table source to a requested element type `T`:
//!
//! - [`BlockAccessor`]: any rectangle of rows and columns
//! - [`RowAccessor`]: a range of rows over all columns
//! - [`ColumnAccessor`]: one column over a range of rows
//!
//! `pull` returns a [`View`] that aliases the table buffer when the policy
//! in [`crate::policy`] allows it, or a converted copy otherwise. `push`
//! writes values back through the identical geometry; a pulled view must
//! match the selection's shape, a plain slice only its element count. Sources
//! are `&Table` / `&TableBuilder` (read-only) or `&mut Table` /
//! `&mut TableBuilder` (read-write).
//!
//! # Example
//! ```rust
//! use homogen_table::{BlockAccessor, DataLayout, StridedRange, Table};
//!
//! let mut table = Table::from_vec((0..12).collect::<Vec<i64>>(), 3, 4, DataLayout::RowMajor).unwrap();
//! let mut acc = BlockAccessor::<f64, _>::new(&mut table);
//!
//! let block = acc.pull(0..2, StridedRange::new(0, 4, 2)).unwrap();
//! assert_eq!(&block[..], &[0.0, 2.0, 4.0, 6.0]);
//!
//! acc.push(&[-1.0, -2.0], 2..3, 1..3).unwrap();
//! assert_eq!(table.data::<i64>().unwrap()[8..], [8, -1, -2, 11]);
//! ```

use std::marker::PhantomData;

use crate::builder::TableBuilder;
use crate::geometry::{resolve, SliceGeometry};
use crate::kernel;
use crate::policy::{decide, AccessPlan};
use crate::range::{Idx, Selection, SliceIndex};
use crate::table::{Axis, Table, TableMetadata};
use crate::view::{Packed, View, ViewData, ViewMut};
use crate::{Element, Result, TableError};

// ============================================================================
// Table sources
// ============================================================================

/// Something an accessor can read from.
pub trait TableSource {
    fn source_table(&self) -> &Table;
}

/// Something an accessor can also write to.
pub trait TableSourceMut: TableSource {
    fn source_table_mut(&mut self) -> &mut Table;
}

impl TableSource for &Table {
    fn source_table(&self) -> &Table {
        self
    }
}

impl TableSource for &mut Table {
    fn source_table(&self) -> &Table {
        self
    }
}

impl TableSourceMut for &mut Table {
    fn source_table_mut(&mut self) -> &mut Table {
        self
    }
}

impl TableSource for &TableBuilder {
    fn source_table(&self) -> &Table {
        TableBuilder::table(self)
    }
}

impl TableSource for &mut TableBuilder {
    fn source_table(&self) -> &Table {
        TableBuilder::table(self)
    }
}

impl TableSourceMut for &mut TableBuilder {
    fn source_table_mut(&mut self) -> &mut Table {
        TableBuilder::table_mut(self)
    }
}

// ============================================================================
// Shared engine
// ============================================================================

fn select<R: SliceIndex, C: SliceIndex>(
    meta: &TableMetadata,
    rows: &R,
    columns: &C,
) -> Result<(Selection, Selection)> {
    let rows = rows.selection(Axis::Row, meta.row_count())?;
    let columns = columns.selection(Axis::Column, meta.column_count())?;
    Ok((rows, columns))
}

fn pull_view<'t, T: Element>(
    table: &'t Table,
    rows: &Selection,
    columns: &Selection,
) -> Result<View<'t, T>> {
    let buffer = table.buffer();
    buffer.wait_ready()?;

    let meta = table.metadata();
    let geometry = resolve(meta, rows, columns);
    let conversion = meta.data_type().conversion_to(T::DATA_TYPE);
    let plan = decide(&geometry, conversion);
    tracing::debug!(
        rows = rows.count(),
        columns = columns.count(),
        stored = %meta.data_type(),
        requested = %T::DATA_TYPE,
        ?conversion,
        ?plan,
        "pull"
    );

    let data = match plan {
        AccessPlan::Alias { offset, len } => {
            ViewData::Borrowed(&table.data::<T>()?[offset..offset + len])
        }
        AccessPlan::Gather => {
            ViewData::Owned(kernel::gather(buffer.bytes()?, meta.data_type(), &geometry)?)
        }
    };
    Ok(View::new(
        data,
        rows.count(),
        columns.count(),
        meta.layout(),
        buffer.kind(),
        meta.data_type() != T::DATA_TYPE,
    ))
}

fn pull_view_mut<'t, T: Element>(
    table: &'t mut Table,
    rows: &Selection,
    columns: &Selection,
) -> Result<ViewMut<'t, T>> {
    table.buffer().wait_ready()?;

    let meta = *table.metadata();
    let geometry = resolve(&meta, rows, columns);
    let conversion = meta.data_type().conversion_to(T::DATA_TYPE);
    let plan = decide(&geometry, conversion);
    tracing::debug!(
        rows = rows.count(),
        columns = columns.count(),
        stored = %meta.data_type(),
        requested = %T::DATA_TYPE,
        ?conversion,
        ?plan,
        "pull_mut"
    );

    match plan {
        AccessPlan::Alias { offset, len } => {
            let kind = table.buffer().kind();
            let data = table.data_mut::<T>()?;
            Ok(ViewMut::alias(
                &mut data[offset..offset + len],
                rows.count(),
                columns.count(),
                meta.layout(),
                kind,
            ))
        }
        AccessPlan::Gather => {
            table.buffer().check_writable()?;
            let values = kernel::gather(table.buffer().bytes()?, meta.data_type(), &geometry)?;
            Ok(ViewMut::staged(
                values,
                table,
                geometry,
                rows.count(),
                columns.count(),
            ))
        }
    }
}

fn push_values<T: Element>(
    table: &mut Table,
    values: Packed<'_, T>,
    rows: &Selection,
    columns: &Selection,
) -> Result<()> {
    let meta = *table.metadata();
    if let Some((actual_rows, actual_cols)) = values.shape() {
        if (actual_rows, actual_cols) != (rows.count(), columns.count()) {
            return Err(TableError::ShapeMismatch {
                expected_rows: rows.count(),
                expected_cols: columns.count(),
                actual_rows,
                actual_cols,
            });
        }
    }
    let geometry: SliceGeometry = resolve(&meta, rows, columns);
    let expected = geometry.element_count();
    if values.len() != expected {
        return Err(TableError::GeometryMismatch {
            expected,
            actual: values.len(),
        });
    }
    let values = values.in_layout(meta.layout())?;
    tracing::debug!(
        rows = rows.count(),
        columns = columns.count(),
        stored = %meta.data_type(),
        requested = %T::DATA_TYPE,
        "push"
    );
    kernel::scatter(table.bytes_mut()?, meta.data_type(), &values, &geometry)
}

// ============================================================================
// Accessors
// ============================================================================

macro_rules! accessor_common {
    ($name:ident) => {
        impl<T: Element, S: TableSource> $name<T, S> {
            pub fn new(source: S) -> Self {
                Self {
                    source,
                    _marker: PhantomData,
                }
            }

            /// Metadata of the bound table.
            pub fn metadata(&self) -> &TableMetadata {
                self.source.source_table().metadata()
            }

            /// Release the bound source.
            pub fn into_inner(self) -> S {
                self.source
            }
        }
    };
}

/// Accessor over arbitrary row and column ranges.
pub struct BlockAccessor<T, S> {
    source: S,
    _marker: PhantomData<fn() -> T>,
}

accessor_common!(BlockAccessor);

impl<T: Element, S: TableSource> BlockAccessor<T, S> {
    /// Read `rows × columns` as `T`.
    pub fn pull<R: SliceIndex, C: SliceIndex>(&self, rows: R, columns: C) -> Result<View<'_, T>> {
        let table = self.source.source_table();
        let (rows, columns) = select(table.metadata(), &rows, &columns)?;
        pull_view(table, &rows, &columns)
    }
}

impl<T: Element, S: TableSourceMut> BlockAccessor<T, S> {
    /// Read `rows × columns` as `T` for modification.
    pub fn pull_mut<R: SliceIndex, C: SliceIndex>(
        &mut self,
        rows: R,
        columns: C,
    ) -> Result<ViewMut<'_, T>> {
        let table = self.source.source_table_mut();
        let (rows, columns) = select(table.metadata(), &rows, &columns)?;
        pull_view_mut(table, &rows, &columns)
    }

    /// Write `values` into `rows × columns`.
    ///
    /// A [`View`] must have the shape of the selection. A plain slice is
    /// taken as packed in the table's layout order.
    pub fn push<'v, V, R, C>(&mut self, values: V, rows: R, columns: C) -> Result<()>
    where
        V: Into<Packed<'v, T>>,
        T: 'v,
        R: SliceIndex,
        C: SliceIndex,
    {
        let table = self.source.source_table_mut();
        let (rows, columns) = select(table.metadata(), &rows, &columns)?;
        push_values(table, values.into(), &rows, &columns)
    }
}

/// Accessor over ranges of whole rows.
pub struct RowAccessor<T, S> {
    source: S,
    _marker: PhantomData<fn() -> T>,
}

accessor_common!(RowAccessor);

impl<T: Element, S: TableSource> RowAccessor<T, S> {
    /// Read all columns of `rows` as `T`.
    pub fn pull<R: SliceIndex>(&self, rows: R) -> Result<View<'_, T>> {
        let table = self.source.source_table();
        let (rows, columns) = select(table.metadata(), &rows, &..)?;
        pull_view(table, &rows, &columns)
    }
}

impl<T: Element, S: TableSourceMut> RowAccessor<T, S> {
    pub fn pull_mut<R: SliceIndex>(&mut self, rows: R) -> Result<ViewMut<'_, T>> {
        let table = self.source.source_table_mut();
        let (rows, columns) = select(table.metadata(), &rows, &..)?;
        pull_view_mut(table, &rows, &columns)
    }

    /// Write whole rows.
    pub fn push<'v, V, R>(&mut self, values: V, rows: R) -> Result<()>
    where
        V: Into<Packed<'v, T>>,
        T: 'v,
        R: SliceIndex,
    {
        let table = self.source.source_table_mut();
        let (rows, columns) = select(table.metadata(), &rows, &..)?;
        push_values(table, values.into(), &rows, &columns)
    }
}

/// Accessor over a single column.
///
/// Views are a contiguous vector of the selected rows, whatever the table
/// layout.
pub struct ColumnAccessor<T, S> {
    source: S,
    _marker: PhantomData<fn() -> T>,
}

accessor_common!(ColumnAccessor);

impl<T: Element, S: TableSource> ColumnAccessor<T, S> {
    /// Read `rows` of `column` as `T`.
    pub fn pull<R: SliceIndex>(&self, column: usize, rows: R) -> Result<View<'_, T>> {
        let table = self.source.source_table();
        let (rows, columns) = select(table.metadata(), &rows, &Idx(column))?;
        pull_view(table, &rows, &columns)
    }
}

impl<T: Element, S: TableSourceMut> ColumnAccessor<T, S> {
    pub fn pull_mut<R: SliceIndex>(&mut self, column: usize, rows: R) -> Result<ViewMut<'_, T>> {
        let table = self.source.source_table_mut();
        let (rows, columns) = select(table.metadata(), &rows, &Idx(column))?;
        pull_view_mut(table, &rows, &columns)
    }

    /// Write `values` into `rows` of `column`.
    pub fn push<'v, V, R>(&mut self, values: V, column: usize, rows: R) -> Result<()>
    where
        V: Into<Packed<'v, T>>,
        T: 'v,
        R: SliceIndex,
    {
        let table = self.source.source_table_mut();
        let (rows, columns) = select(table.metadata(), &rows, &Idx(column))?;
        push_values(table, values.into(), &rows, &columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::StridedRange;
    use crate::table::DataLayout;
    use crate::DataType;

    fn table_4x2() -> Table {
        Table::from_vec((1..=8).map(|v| v as f32).collect(), 4, 2, DataLayout::RowMajor).unwrap()
    }

    #[test]
    fn test_row_pull_aliases() {
        let t = table_4x2();
        let acc = RowAccessor::<f32, _>::new(&t);
        let rows = acc.pull(1..3).unwrap();
        assert!(rows.is_borrowed());
        assert!(!rows.converted());
        assert_eq!(rows.as_ptr(), t.data::<f32>().unwrap()[2..].as_ptr());
        assert_eq!(&rows[..], &[3.0, 4.0, 5.0, 6.0]);
        assert_eq!(rows.get(1, 0), Some(5.0));
    }

    #[test]
    fn test_column_of_row_major_gathers() {
        let t = table_4x2();
        let acc = ColumnAccessor::<f32, _>::new(&t);
        let col = acc.pull(1, ..).unwrap();
        assert!(col.is_owned());
        assert!(!col.converted());
        assert_eq!(&col[..], &[2.0, 4.0, 6.0, 8.0]);
        assert_eq!(col.row_count(), 4);
        assert_eq!(col.column_count(), 1);
    }

    #[test]
    fn test_strided_block() {
        let t = Table::from_vec((0..24).collect::<Vec<i32>>(), 6, 4, DataLayout::RowMajor).unwrap();
        let acc = BlockAccessor::<i32, _>::new(&t);
        let v = acc
            .pull(StridedRange::new(1, 6, 2), StridedRange::new(0, 4, 3))
            .unwrap();
        assert_eq!(v.row_count(), 3);
        assert_eq!(v.column_count(), 2);
        assert_eq!(&v[..], &[4, 7, 12, 15, 20, 23]);
    }

    #[test]
    fn test_pull_mut_alias_writes_through() {
        let mut t = table_4x2();
        {
            let mut acc = RowAccessor::<f32, _>::new(&mut t);
            let mut v = acc.pull_mut(0..1).unwrap();
            assert!(!v.is_owned());
            v[1] = 20.0;
        }
        assert_eq!(t.data::<f32>().unwrap()[..2], [1.0, 20.0]);
    }

    #[test]
    fn test_pull_mut_copy_needs_commit() {
        let mut t = table_4x2();
        let mut acc = ColumnAccessor::<i64, _>::new(&mut t);
        {
            let mut v = acc.pull_mut(0, ..).unwrap();
            assert!(v.is_owned());
            assert!(v.converted());
            v[0] = 100;
            // dropped without commit
        }
        assert_eq!(acc.pull(0, 0..1).unwrap()[0], 1);

        let mut v = acc.pull_mut(0, ..).unwrap();
        v[0] = 100;
        v.commit().unwrap();
        assert_eq!(t.data::<f32>().unwrap()[0], 100.0);
    }

    #[test]
    fn test_push_geometry_mismatch_leaves_table() {
        let mut t = table_4x2();
        let before = t.data::<f32>().unwrap().to_vec();
        let mut acc = BlockAccessor::<f64, _>::new(&mut t);
        let err = acc.push(&[0.0; 3], 0..2, ..).unwrap_err();
        assert!(matches!(
            err,
            TableError::GeometryMismatch {
                expected: 4,
                actual: 3
            }
        ));
        assert!(err.is_range());
        assert_eq!(t.data::<f32>().unwrap(), &before[..]);
    }

    #[test]
    fn test_push_view_checks_shape() {
        let mut t = Table::from_vec((0..8).collect::<Vec<i32>>(), 4, 2, DataLayout::RowMajor)
            .unwrap();
        let block = BlockAccessor::<i32, _>::new(&t)
            .pull(0..2, ..)
            .unwrap()
            .detach();
        assert_eq!(block.len(), 4);

        // same element count as a 4x1 column, different shape
        let err = ColumnAccessor::<i32, _>::new(&mut t)
            .push(&block, 0, ..)
            .unwrap_err();
        assert!(matches!(
            err,
            TableError::ShapeMismatch {
                expected_rows: 4,
                expected_cols: 1,
                actual_rows: 2,
                actual_cols: 2,
            }
        ));
        assert!(err.is_range());
        assert_eq!(t.data::<i32>().unwrap(), &[0, 1, 2, 3, 4, 5, 6, 7]);

        BlockAccessor::<i32, _>::new(&mut t)
            .push(&block, 2..4, ..)
            .unwrap();
        assert_eq!(t.data::<i32>().unwrap(), &[0, 1, 2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn test_push_view_across_layouts() {
        let src = Table::from_vec((0..6).collect::<Vec<i64>>(), 2, 3, DataLayout::ColumnMajor)
            .unwrap();
        let mut dst = Table::from_vec(vec![0i64; 6], 2, 3, DataLayout::RowMajor).unwrap();
        let read = BlockAccessor::<i64, _>::new(&src);
        let block = read.pull(.., ..).unwrap();
        assert!(block.is_borrowed());
        assert_eq!(block.layout(), DataLayout::ColumnMajor);

        BlockAccessor::<i64, _>::new(&mut dst)
            .push(&block, .., ..)
            .unwrap();
        assert_eq!(dst.data::<i64>().unwrap(), &[0, 2, 4, 1, 3, 5]);

        let read = ColumnAccessor::<i64, _>::new(&src);
        let col = read.pull(2, ..).unwrap();
        ColumnAccessor::<i64, _>::new(&mut dst)
            .push(&col, 0, ..)
            .unwrap();
        assert_eq!(dst.data::<i64>().unwrap(), &[4, 2, 4, 5, 3, 5]);
    }

    #[test]
    fn test_pull_mut_shared_foreign_fails_early() {
        let mut data = [1i32, 2, 3, 4];
        let ptr = std::ptr::NonNull::new(data.as_mut_ptr()).unwrap();
        {
            let mut t =
                unsafe { Table::from_raw_parts_mut(ptr, 2, 2, DataLayout::RowMajor) }.unwrap();
            let other = t.clone();
            let mut acc = ColumnAccessor::<i32, _>::new(&mut t);
            assert!(matches!(
                acc.pull_mut(1, ..),
                Err(TableError::SharedForeignBuffer)
            ));
            drop(other);

            let mut v = acc.pull_mut(1, ..).unwrap();
            v[0] = 20;
            v.commit().unwrap();
        }
        assert_eq!(data, [1, 20, 3, 4]);
    }

    #[test]
    fn test_column_index_out_of_range() {
        let t = table_4x2();
        let acc = ColumnAccessor::<f32, _>::new(&t);
        let err = acc.pull(2, ..).unwrap_err();
        assert!(matches!(
            err,
            TableError::OutOfBounds {
                axis: Axis::Column,
                ..
            }
        ));
    }

    #[test]
    fn test_builder_source() {
        let mut b = TableBuilder::zeros(DataType::Int32, 2, 3, DataLayout::ColumnMajor).unwrap();
        let mut acc = ColumnAccessor::<f32, _>::new(&mut b);
        acc.push(&[1.5, 2.5], 2, ..).unwrap();
        assert_eq!(acc.metadata().column_count(), 3);
        let b = acc.into_inner();
        let read = RowAccessor::<i32, _>::new(&*b);
        assert_eq!(&read.pull(..).unwrap()[..], &[0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_pull_does_not_need_writable() {
        let data = [1i32, 2, 3, 4];
        let ptr = std::ptr::NonNull::new(data.as_ptr() as *mut i32).unwrap();
        let mut t = unsafe { Table::from_raw_parts(ptr, 2, 2, DataLayout::RowMajor) }.unwrap();
        {
            let acc = BlockAccessor::<i32, _>::new(&t);
            assert!(acc.pull(.., 1..2).unwrap().is_owned());
        }
        let mut acc = BlockAccessor::<i32, _>::new(&mut t);
        assert!(matches!(
            acc.push(&[9, 9], .., 1..2),
            Err(TableError::ReadOnly)
        ));
        assert!(matches!(
            acc.pull_mut(.., 1..2),
            Err(TableError::ReadOnly)
        ));
        assert_eq!(data, [1, 2, 3, 4]);
    }
}
