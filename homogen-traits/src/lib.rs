//! Shared element traits for the homogen-table ecosystem.
//!
//! This crate provides the closed set of element kinds a table can store,
//! the conversion rules between them, and the typed owned storage backing
//! tables that this layer allocates itself.
//!
//! External crates (algorithm kernels, binding layers) can depend on
//! `homogen-traits` to name element kinds without depending on the accessor
//! engine.

pub mod data_type;
pub mod element;
pub mod typed_vec;

pub use data_type::{Conversion, DataType};
pub use element::{Element, Scalar};
pub use typed_vec::TypedVec;
