pub use crate::{
    is_mem_guard_active, is_tracking, mem_guard_off, mem_guard_on, no_autodiff, with_mem_guard_off, Tensor,
    TensorAdapter,
};
pub use viewgrad_core::{
    array::NdArray,
    error::{Error, Result},
    index::Index,
};
