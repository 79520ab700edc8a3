//! Element type bounds for table accessors.

use crate::data_type::DataType;
use crate::typed_vec::TypedVec;

/// A single value of any supported kind.
///
/// Conversions between kinds route through `Scalar`; since the source kind
/// is known statically inside each copy loop, the match folds away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    F32(f32),
    F64(f64),
    I32(i32),
    I64(i64),
}

impl Scalar {
    #[inline]
    pub fn data_type(self) -> DataType {
        match self {
            Scalar::F32(_) => DataType::Float32,
            Scalar::F64(_) => DataType::Float64,
            Scalar::I32(_) => DataType::Int32,
            Scalar::I64(_) => DataType::Int64,
        }
    }
}

/// Trait implemented by exactly the element types a table can hold or be
/// viewed as: `f32`, `f64`, `i32`, `i64`.
///
/// The set is closed; a table's runtime [`DataType`] tag always names one of
/// these implementors.
pub trait Element:
    bytemuck::Pod
    + num_traits::Zero
    + Copy
    + Send
    + Sync
    + PartialEq
    + std::fmt::Debug
    + 'static
{
    /// Runtime tag of this type.
    const DATA_TYPE: DataType;

    fn to_scalar(self) -> Scalar;

    /// Convert from any kind using the rule in
    /// [`DataType::conversion_to`](crate::DataType::conversion_to).
    fn from_scalar(value: Scalar) -> Self;

    /// Wrap an owned vector into kind-tagged storage without copying.
    fn into_typed_vec(values: Vec<Self>) -> TypedVec;

    /// Convert `self` to another element type.
    #[inline(always)]
    fn convert<D: Element>(self) -> D {
        D::from_scalar(self.to_scalar())
    }
}

#[inline(always)]
fn saturate_to_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

macro_rules! impl_element_common {
    ($dt:ident, $variant:ident) => {
        const DATA_TYPE: DataType = DataType::$dt;

        #[inline(always)]
        fn to_scalar(self) -> Scalar {
            Scalar::$variant(self)
        }

        fn into_typed_vec(values: Vec<Self>) -> TypedVec {
            TypedVec::$variant(values)
        }
    };
}

impl Element for f32 {
    impl_element_common!(Float32, F32);

    #[inline(always)]
    fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::F32(v) => v,
            Scalar::F64(v) => v as f32,
            Scalar::I32(v) => v as f32,
            Scalar::I64(v) => v as f32,
        }
    }
}

impl Element for f64 {
    impl_element_common!(Float64, F64);

    #[inline(always)]
    fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::F32(v) => f64::from(v),
            Scalar::F64(v) => v,
            Scalar::I32(v) => f64::from(v),
            Scalar::I64(v) => v as f64,
        }
    }
}

impl Element for i32 {
    impl_element_common!(Int32, I32);

    #[inline(always)]
    fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::F32(v) => v as i32,
            Scalar::F64(v) => v as i32,
            Scalar::I32(v) => v,
            Scalar::I64(v) => saturate_to_i32(v),
        }
    }
}

impl Element for i64 {
    impl_element_common!(Int64, I64);

    #[inline(always)]
    fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::F32(v) => v as i64,
            Scalar::F64(v) => v as i64,
            Scalar::I32(v) => i64::from(v),
            Scalar::I64(v) => v,
        }
    }
}
