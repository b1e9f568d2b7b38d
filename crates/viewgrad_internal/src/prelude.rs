pub use crate::core::{array::NdArray, error::Result, index::Index};
pub use crate::tensor::{mem_guard_off, no_autodiff, Tensor};
