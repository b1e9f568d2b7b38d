pub mod prelude;

pub use viewgrad_core as core;
pub use viewgrad_tensor as tensor;

pub use crate::core::{
    array::NdArray,
    error::{Error, ErrorKind, Result},
    index::Index,
    layout::Layout,
};
pub use crate::tensor::{
    is_mem_guard_active, is_tracking, mem_guard_off, mem_guard_on, no_autodiff, with_mem_guard_off, Tensor, TensorId,
};
#[cfg(feature = "serde")]
pub use crate::tensor::io::{load, save};
