//! Accessor results.
//!
//! A [`View`] is either an alias into the table buffer or a materialized,
//! densely packed copy. Either way its elements are laid out in the table's
//! physical order ([`View::layout`]), `row_count * column_count` long.

use std::borrow::Cow;
use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::buffer::AllocationKind;
use crate::geometry::SliceGeometry;
use crate::kernel;
use crate::table::{DataLayout, Table};
use crate::{Element, Result};

/// Storage of a [`View`].
#[derive(Debug, Clone, PartialEq)]
pub enum ViewData<'a, T> {
    /// Alias into the table buffer.
    Borrowed(&'a [T]),
    /// Freshly allocated copy, freed when the view is dropped.
    Owned(Vec<T>),
}

impl<T> ViewData<'_, T> {
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        match self {
            ViewData::Borrowed(s) => s,
            ViewData::Owned(v) => v,
        }
    }
}

/// Shape and provenance shared by [`View`] and [`ViewMut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ViewShape {
    rows: usize,
    cols: usize,
    layout: DataLayout,
    kind: AllocationKind,
    converted: bool,
}

impl ViewShape {
    fn index(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(match self.layout {
            DataLayout::RowMajor => row * self.cols + col,
            DataLayout::ColumnMajor => col * self.rows + row,
        })
    }
}

/// Read-only result of a `pull`.
pub struct View<'a, T> {
    data: ViewData<'a, T>,
    shape: ViewShape,
}

impl<'a, T: Element> View<'a, T> {
    pub(crate) fn new(
        data: ViewData<'a, T>,
        rows: usize,
        cols: usize,
        layout: DataLayout,
        kind: AllocationKind,
        converted: bool,
    ) -> Self {
        debug_assert_eq!(data.as_slice().len(), rows * cols);
        Self {
            data,
            shape: ViewShape {
                rows,
                cols,
                layout,
                kind,
                converted,
            },
        }
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.shape.rows
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.shape.cols
    }

    /// Physical order of the elements (the table's layout).
    #[inline]
    pub fn layout(&self) -> DataLayout {
        self.shape.layout
    }

    /// Whether the elements were converted from a different stored type.
    #[inline]
    pub fn converted(&self) -> bool {
        self.shape.converted
    }

    /// Allocation kind of the memory the view reads from: the table's kind
    /// for aliases, [`AllocationKind::Heap`] for materialized copies.
    pub fn allocation_kind(&self) -> AllocationKind {
        match self.data {
            ViewData::Borrowed(_) => self.shape.kind,
            ViewData::Owned(_) => AllocationKind::Heap,
        }
    }

    #[inline]
    pub fn is_owned(&self) -> bool {
        matches!(self.data, ViewData::Owned(_))
    }

    #[inline]
    pub fn is_borrowed(&self) -> bool {
        !self.is_owned()
    }

    #[inline]
    pub fn data(&self) -> &ViewData<'a, T> {
        &self.data
    }

    /// Element at logical `(row, col)` of the view.
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.shape.index(row, col).map(|i| self.data.as_slice()[i])
    }

    /// The elements as an owned vector, copying only if borrowed.
    pub fn into_owned(self) -> Vec<T> {
        match self.data {
            ViewData::Borrowed(s) => s.to_vec(),
            ViewData::Owned(v) => v,
        }
    }

    /// The same view with its own copy of the elements, no longer tied to the
    /// table borrow. Lets a pulled view be pushed back through the accessor
    /// it came from.
    pub fn detach(self) -> View<'static, T> {
        let shape = self.shape;
        View {
            data: ViewData::Owned(self.into_owned()),
            shape,
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.data.as_slice().as_ptr()
    }
}

impl<T> Deref for View<'_, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.data.as_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for View<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("rows", &self.shape.rows)
            .field("cols", &self.shape.cols)
            .field("layout", &self.shape.layout)
            .field("owned", &matches!(self.data, ViewData::Owned(_)))
            .field("converted", &self.shape.converted)
            .field("data", &self.data.as_slice())
            .finish()
    }
}

/// Values handed to `push`.
///
/// Views keep the shape and layout they were pulled with, and a push checks
/// that shape against the target selection. Plain slices carry no shape: they
/// must be packed in the table's layout order and only their length is
/// checked.
#[derive(Debug, Clone, Copy)]
pub struct Packed<'v, T> {
    data: &'v [T],
    shape: Option<(usize, usize, DataLayout)>,
}

impl<'v, T: Element> Packed<'v, T> {
    /// `rows × cols` values packed in `layout` order.
    pub fn with_shape(data: &'v [T], rows: usize, cols: usize, layout: DataLayout) -> Self {
        Self {
            data,
            shape: Some((rows, cols, layout)),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub(crate) fn values(&self) -> &'v [T] {
        self.data
    }

    /// Logical `(rows, cols)`, if known.
    #[inline]
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.shape.map(|(rows, cols, _)| (rows, cols))
    }

    /// The values in `layout` order, copying only when the packed layout
    /// differs. The length must already match the shape.
    pub(crate) fn in_layout(&self, layout: DataLayout) -> Result<Cow<'v, [T]>> {
        let (rows, cols, from) = match self.shape {
            Some(shape) if shape.2 != layout && shape.0 > 1 && shape.1 > 1 => shape,
            _ => return Ok(Cow::Borrowed(self.data)),
        };
        let src = ViewShape {
            rows,
            cols,
            layout: from,
            kind: AllocationKind::Heap,
            converted: false,
        };
        let dst = ViewShape { layout, ..src };
        let mut out = kernel::try_alloc::<T>(rows * cols)?;
        for row in 0..rows {
            for col in 0..cols {
                if let (Some(i), Some(j)) = (dst.index(row, col), src.index(row, col)) {
                    out[i] = self.data[j];
                }
            }
        }
        Ok(Cow::Owned(out))
    }
}

impl<'v, T: Element> From<&'v [T]> for Packed<'v, T> {
    fn from(data: &'v [T]) -> Self {
        Self { data, shape: None }
    }
}

impl<'v, T: Element, const N: usize> From<&'v [T; N]> for Packed<'v, T> {
    fn from(data: &'v [T; N]) -> Self {
        Self {
            data: &data[..],
            shape: None,
        }
    }
}

impl<'v, T: Element> From<&'v Vec<T>> for Packed<'v, T> {
    fn from(data: &'v Vec<T>) -> Self {
        Self {
            data: data.as_slice(),
            shape: None,
        }
    }
}

impl<'v, T: Element> From<&'v View<'_, T>> for Packed<'v, T> {
    fn from(view: &'v View<'_, T>) -> Self {
        Self {
            data: view.data.as_slice(),
            shape: Some((view.shape.rows, view.shape.cols, view.shape.layout)),
        }
    }
}

impl<'v, T: Element> From<&'v ViewMut<'_, T>> for Packed<'v, T> {
    fn from(view: &'v ViewMut<'_, T>) -> Self {
        Self {
            data: &view[..],
            shape: Some((view.shape.rows, view.shape.cols, view.shape.layout)),
        }
    }
}

enum Target<'a, T> {
    Alias(&'a mut [T]),
    Staged {
        values: Vec<T>,
        table: &'a mut Table,
        geometry: SliceGeometry,
    },
}

/// Mutable result of `pull_mut`.
///
/// An aliasing view writes straight into the table. A materialized view is a
/// private copy: changes reach the table only through [`ViewMut::commit`],
/// and are discarded if the view is dropped uncommitted.
pub struct ViewMut<'a, T> {
    target: Target<'a, T>,
    shape: ViewShape,
}

impl<'a, T: Element> ViewMut<'a, T> {
    pub(crate) fn alias(
        slice: &'a mut [T],
        rows: usize,
        cols: usize,
        layout: DataLayout,
        kind: AllocationKind,
    ) -> Self {
        Self {
            target: Target::Alias(slice),
            shape: ViewShape {
                rows,
                cols,
                layout,
                kind,
                converted: false,
            },
        }
    }

    pub(crate) fn staged(
        values: Vec<T>,
        table: &'a mut Table,
        geometry: SliceGeometry,
        rows: usize,
        cols: usize,
    ) -> Self {
        let shape = ViewShape {
            rows,
            cols,
            layout: table.layout(),
            kind: AllocationKind::Heap,
            converted: table.data_type() != T::DATA_TYPE,
        };
        Self {
            target: Target::Staged {
                values,
                table,
                geometry,
            },
            shape,
        }
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.shape.rows
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.shape.cols
    }

    #[inline]
    pub fn layout(&self) -> DataLayout {
        self.shape.layout
    }

    #[inline]
    pub fn converted(&self) -> bool {
        self.shape.converted
    }

    #[inline]
    pub fn is_owned(&self) -> bool {
        matches!(self.target, Target::Staged { .. })
    }

    /// Element at logical `(row, col)` of the view.
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.shape.index(row, col).map(|i| self[i])
    }

    /// Mutable element at logical `(row, col)` of the view.
    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        let i = self.shape.index(row, col)?;
        Some(&mut self[i])
    }

    /// Write the view back into its table.
    ///
    /// A no-op for aliasing views. A materialized view is scattered back with
    /// the inverse conversion and then freed.
    pub fn commit(self) -> Result<()> {
        match self.target {
            Target::Alias(_) => Ok(()),
            Target::Staged {
                values,
                table,
                geometry,
            } => {
                tracing::debug!(
                    elements = values.len(),
                    stored = %table.data_type(),
                    requested = %T::DATA_TYPE,
                    "committing materialized view"
                );
                let stored = table.data_type();
                kernel::scatter(table.bytes_mut()?, stored, &values, &geometry)
            }
        }
    }
}

impl<T> Deref for ViewMut<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        match &self.target {
            Target::Alias(s) => s,
            Target::Staged { values, .. } => values,
        }
    }
}

impl<T> DerefMut for ViewMut<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        match &mut self.target {
            Target::Alias(s) => s,
            Target::Staged { values, .. } => values,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ViewMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewMut")
            .field("rows", &self.shape.rows)
            .field("cols", &self.shape.cols)
            .field("layout", &self.shape.layout)
            .field("owned", &matches!(self.target, Target::Staged { .. }))
            .field("data", &self.deref())
            .finish()
    }
}
