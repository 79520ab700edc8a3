//! Kind-tagged owned storage.

use crate::data_type::DataType;
use crate::element::Element;

/// An owned, properly aligned vector of one supported element kind.
///
/// This is the storage behind every buffer the table layer allocates itself.
/// Keeping the typed `Vec` (instead of a `Vec<u8>`) guarantees the alignment
/// of the element kind without extra bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedVec {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

impl TypedVec {
    /// Zero-initialized storage of `len` elements.
    ///
    /// Returns `None` if the allocation cannot be satisfied.
    pub fn zeros(data_type: DataType, len: usize) -> Option<Self> {
        Some(match data_type {
            DataType::Float32 => TypedVec::F32(try_zeros(len)?),
            DataType::Float64 => TypedVec::F64(try_zeros(len)?),
            DataType::Int32 => TypedVec::I32(try_zeros(len)?),
            DataType::Int64 => TypedVec::I64(try_zeros(len)?),
        })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            TypedVec::F32(_) => DataType::Float32,
            TypedVec::F64(_) => DataType::Float64,
            TypedVec::I32(_) => DataType::Int32,
            TypedVec::I64(_) => DataType::Int64,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            TypedVec::F32(v) => v.len(),
            TypedVec::F64(v) => v.len(),
            TypedVec::I32(v) => v.len(),
            TypedVec::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            TypedVec::F32(v) => bytemuck::cast_slice(v),
            TypedVec::F64(v) => bytemuck::cast_slice(v),
            TypedVec::I32(v) => bytemuck::cast_slice(v),
            TypedVec::I64(v) => bytemuck::cast_slice(v),
        }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        match self {
            TypedVec::F32(v) => bytemuck::cast_slice_mut(v),
            TypedVec::F64(v) => bytemuck::cast_slice_mut(v),
            TypedVec::I32(v) => bytemuck::cast_slice_mut(v),
            TypedVec::I64(v) => bytemuck::cast_slice_mut(v),
        }
    }

    /// Typed view of the elements, if `T` is the stored kind.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        if T::DATA_TYPE != self.data_type() {
            return None;
        }
        bytemuck::try_cast_slice(self.as_bytes()).ok()
    }

    /// Copy of the elements in `byte_range`, re-tagged with the same kind.
    ///
    /// The range must be element-aligned; returns `None` otherwise.
    pub fn copy_byte_range(&self, byte_range: std::ops::Range<usize>) -> Option<Self> {
        let elem = self.data_type().size_in_bytes();
        if byte_range.start % elem != 0 || byte_range.end % elem != 0 {
            return None;
        }
        let range = byte_range.start / elem..byte_range.end / elem;
        Some(match self {
            TypedVec::F32(v) => TypedVec::F32(v.get(range)?.to_vec()),
            TypedVec::F64(v) => TypedVec::F64(v.get(range)?.to_vec()),
            TypedVec::I32(v) => TypedVec::I32(v.get(range)?.to_vec()),
            TypedVec::I64(v) => TypedVec::I64(v.get(range)?.to_vec()),
        })
    }
}

fn try_zeros<T: Element>(len: usize) -> Option<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).ok()?;
    v.resize(len, T::zero());
    Some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let v = TypedVec::zeros(DataType::Float64, 6).unwrap();
        assert_eq!(v.len(), 6);
        assert_eq!(v.as_bytes().len(), 48);
        assert_eq!(v.as_slice::<f64>().unwrap(), &[0.0; 6]);
        assert!(v.as_slice::<f32>().is_none());
    }

    #[test]
    fn test_into_typed_vec() {
        let v = <i32 as Element>::into_typed_vec(vec![1, 2, 3]);
        assert_eq!(v.data_type(), DataType::Int32);
        assert_eq!(v.as_slice::<i32>().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_bytes_mut_writes_through() {
        let mut v = TypedVec::I32(vec![0, 0]);
        v.as_bytes_mut()[..4].copy_from_slice(&7i32.to_ne_bytes());
        assert_eq!(v.as_slice::<i32>().unwrap(), &[7, 0]);
    }

    #[test]
    fn test_copy_byte_range() {
        let v = TypedVec::F32(vec![1.0, 2.0, 3.0, 4.0]);
        let sub = v.copy_byte_range(4..12).unwrap();
        assert_eq!(sub.as_slice::<f32>().unwrap(), &[2.0, 3.0]);
        assert!(v.copy_byte_range(2..12).is_none());
        assert!(v.copy_byte_range(4..20).is_none());
    }
}
