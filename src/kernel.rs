//! Gather and scatter loops.
//!
//! Both loops walk a [`SliceGeometry`] in buffer order: `x` fastest, then
//! `y`. The packed side (the gathered `Vec` or the pushed slice) holds
//! `size.x` consecutive elements per `y` position.
//!
//! The stored kind is only known at runtime, so the entry points dispatch on
//! the table's [`DataType`] once and run a monomorphized loop per
//! `(stored, requested)` pair.

use crate::geometry::SliceGeometry;
use crate::{DataType, Element, Result, TableError};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Bind `$S` to the Rust type of the runtime kind `$dt` and evaluate `$body`.
macro_rules! with_stored_type {
    ($dt:expr, $S:ident => $body:expr) => {
        match $dt {
            DataType::Float32 => {
                type $S = f32;
                $body
            }
            DataType::Float64 => {
                type $S = f64;
                $body
            }
            DataType::Int32 => {
                type $S = i32;
                $body
            }
            DataType::Int64 => {
                type $S = i64;
                $body
            }
        }
    };
}

fn cast_elements<S: Element>(bytes: &[u8]) -> Result<&[S]> {
    bytemuck::try_cast_slice(bytes).map_err(|_| TableError::Misaligned(S::DATA_TYPE))
}

fn cast_elements_mut<S: Element>(bytes: &mut [u8]) -> Result<&mut [S]> {
    bytemuck::try_cast_slice_mut(bytes).map_err(|_| TableError::Misaligned(S::DATA_TYPE))
}

#[inline]
fn use_parallel(count: usize) -> bool {
    cfg!(feature = "parallel") && count >= crate::parallel_threshold()
}

/// Copy the selection out of `bytes` (holding `stored` elements) into a new
/// densely packed `Vec<T>`, converting each element.
pub(crate) fn gather<T: Element>(
    bytes: &[u8],
    stored: DataType,
    geometry: &SliceGeometry,
) -> Result<Vec<T>> {
    with_stored_type!(stored, S => {
        let src = cast_elements::<S>(bytes)?;
        gather_typed::<S, T>(src, geometry)
    })
}

/// Write `values` (densely packed, `geometry.element_count()` long) into the
/// selection of `bytes`, converting each element to the stored kind.
pub(crate) fn scatter<T: Element>(
    bytes: &mut [u8],
    stored: DataType,
    values: &[T],
    geometry: &SliceGeometry,
) -> Result<()> {
    debug_assert_eq!(values.len(), geometry.element_count());
    with_stored_type!(stored, S => {
        let dst = cast_elements_mut::<S>(bytes)?;
        scatter_typed::<S, T>(dst, values, geometry);
        Ok(())
    })
}

/// Allocate a zeroed `Vec<T>` of `count` elements, reporting failure as an
/// allocation error instead of aborting.
pub(crate) fn try_alloc<T: Element>(count: usize) -> Result<Vec<T>> {
    let bytes = count.saturating_mul(std::mem::size_of::<T>());
    let mut out = Vec::new();
    out.try_reserve_exact(count)
        .map_err(|_| TableError::AllocationFailed { bytes })?;
    out.resize(count, T::zero());
    Ok(out)
}

fn gather_typed<S: Element, T: Element>(src: &[S], g: &SliceGeometry) -> Result<Vec<T>> {
    gather_rows(src, g, use_parallel(g.element_count()))
}

fn gather_rows<S: Element, T: Element>(
    src: &[S],
    g: &SliceGeometry,
    parallel: bool,
) -> Result<Vec<T>> {
    let count = g.element_count();
    if count == 0 {
        return Ok(Vec::new());
    }
    let mut out = try_alloc::<T>(count)?;
    let width = g.size.x;

    let fill_row = |y: usize, row: &mut [T]| {
        if g.step.x == 1 {
            let start = g.source_index(0, y);
            for (d, s) in row.iter_mut().zip(&src[start..start + width]) {
                *d = s.convert();
            }
        } else {
            for (x, d) in row.iter_mut().enumerate() {
                *d = src[g.source_index(x, y)].convert();
            }
        }
    };

    if parallel {
        #[cfg(feature = "parallel")]
        {
            out.par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| fill_row(y, row));
            return Ok(out);
        }
    }

    for (y, row) in out.chunks_mut(width).enumerate() {
        fill_row(y, row);
    }
    Ok(out)
}

fn scatter_typed<S: Element, T: Element>(dst: &mut [S], values: &[T], g: &SliceGeometry) {
    scatter_rows(dst, values, g, use_parallel(g.element_count()))
}

fn scatter_rows<S: Element, T: Element>(
    dst: &mut [S],
    values: &[T],
    g: &SliceGeometry,
    parallel: bool,
) {
    if g.element_count() == 0 {
        return;
    }
    let width = g.size.x;
    let ld = g.leading_dimension;

    // Each `y` position owns one leading-dimension line of `dst`.
    let store_line = |line: &mut [S], row: &[T]| {
        if g.step.x == 1 {
            for (d, s) in line[g.offset.x..g.offset.x + width].iter_mut().zip(row) {
                *d = s.convert();
            }
        } else {
            for (x, s) in row.iter().enumerate() {
                line[x * g.step.x + g.offset.x] = s.convert();
            }
        }
    };

    if parallel {
        #[cfg(feature = "parallel")]
        {
            dst.par_chunks_mut(ld)
                .skip(g.offset.y)
                .step_by(g.step.y)
                .take(g.size.y)
                .zip(values.par_chunks(width))
                .for_each(|(line, row)| store_line(line, row));
            return;
        }
    }

    for (line, row) in dst
        .chunks_mut(ld)
        .skip(g.offset.y)
        .step_by(g.step.y)
        .take(g.size.y)
        .zip(values.chunks(width))
    {
        store_line(line, row);
    }
}
