//! Owning table construction.

use crate::buffer::ElementBuffer;
use crate::table::{DataLayout, Table, TableMetadata};
use crate::{DataType, Element, Result};

/// Builds a [`Table`] over storage it allocates and owns.
///
/// Accessors can be bound to `&mut TableBuilder` to fill the storage before
/// [`build`](TableBuilder::build) hands it over to the table.
///
/// # Example
/// ```rust
/// use homogen_table::{RowAccessor, TableBuilder};
///
/// let mut builder = TableBuilder::new::<i32>(2, 2).unwrap();
/// RowAccessor::<i32, _>::new(&mut builder)
///     .push(&[1, 2], 1..2)
///     .unwrap();
/// let table = builder.build();
/// assert_eq!(table.data::<i32>().unwrap(), &[0, 0, 1, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    /// Zero-initialized storage for `row_count * column_count` elements of
    /// `data_type`.
    pub fn zeros(
        data_type: DataType,
        row_count: usize,
        column_count: usize,
        layout: DataLayout,
    ) -> Result<Self> {
        let meta = TableMetadata::new(row_count, column_count, data_type, layout)?;
        let buffer = ElementBuffer::zeros(data_type, meta.element_count())?;
        Ok(Self {
            table: Table::from_parts(meta, buffer)?,
        })
    }

    /// Zero-initialized row-major storage of `T`.
    pub fn new<T: Element>(row_count: usize, column_count: usize) -> Result<Self> {
        Self::zeros(T::DATA_TYPE, row_count, column_count, DataLayout::RowMajor)
    }

    /// Replace the storage with `data`, keeping the current layout.
    ///
    /// On error the builder is left unchanged.
    pub fn reset<T: Element>(
        &mut self,
        data: Vec<T>,
        row_count: usize,
        column_count: usize,
    ) -> Result<()> {
        self.table = Table::from_vec(data, row_count, column_count, self.table.layout())?;
        Ok(())
    }

    /// Reinterpret the storage in `layout` order. No elements move.
    pub fn set_layout(&mut self, layout: DataLayout) -> Result<()> {
        let current = self.table.metadata();
        let meta = TableMetadata::new(
            current.row_count(),
            current.column_count(),
            current.data_type(),
            layout,
        )?;
        self.table = Table::from_parts(meta, self.table.buffer().clone())?;
        Ok(())
    }

    #[inline]
    pub fn metadata(&self) -> &TableMetadata {
        self.table.metadata()
    }

    /// Hand the storage over to a table.
    pub fn build(self) -> Table {
        self.table
    }

    pub(crate) fn table(&self) -> &Table {
        &self.table
    }

    pub(crate) fn table_mut(&mut self) -> &mut Table {
        &mut self.table
    }
}
