//! `viewgrad` computes reverse-mode gradients through tensors that alias each
//! other's storage and that may be written in place after a graph was built.

pub use viewgrad_internal::*;
