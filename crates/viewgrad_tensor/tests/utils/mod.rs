#![allow(dead_code)]

use rand::{rngs::StdRng, SeedableRng};
use viewgrad_core::{error::Result, index::Index};
use viewgrad_tensor::Tensor;

pub const SEED: u64 = 0x5eed;

pub fn seeded_rng(offset: u64) -> StdRng {
    StdRng::seed_from_u64(SEED + offset)
}

pub fn setup_tensor(data: Vec<f64>) -> Result<Tensor> {
    Tensor::try_new(data)
}

pub fn setup_tensor_with_shape(data: Vec<f64>, shape: &[usize]) -> Result<Tensor> {
    Tensor::try_from_flatten_vec(data, shape)
}

pub fn setup_constant(data: Vec<f64>) -> Result<Tensor> {
    Tensor::try_constant(data)
}

/// `[1.0, 2.0, ..., n]`.
pub fn one_to(n: usize) -> Vec<f64> {
    (1..=n).map(|v| v as f64).collect()
}

/// The tensor itself, or a full view of it.
pub fn family_member(tensor: &Tensor, on_view: bool) -> Result<Tensor> {
    if on_view {
        tensor.try_index(&[Index::Ellipsis])
    } else {
        Ok(*tensor)
    }
}

pub fn ellipsis() -> [Index; 1] {
    [Index::Ellipsis]
}

/// `[:stop]`
pub fn head(stop: isize) -> [Index; 1] {
    [Index::slice(None, Some(stop), 1)]
}

/// `[start:]`
pub fn tail(start: isize) -> [Index; 1] {
    [Index::slice(Some(start), None, 1)]
}

pub fn grad_vec(tensor: &Tensor) -> Option<Vec<f64>> {
    tensor.grad().map(|grad| grad.to_vec())
}

pub fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "length mismatch: {:?} vs {:?}", actual, expected);
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        let tolerance = 1e-9 * e.abs().max(1.0);
        assert!(
            (a - e).abs() <= tolerance,
            "element {} differs: {} vs {} ({:?} vs {:?})",
            i,
            a,
            e,
            actual,
            expected
        );
    }
}

/// Generates one test per entry, run once on a root and once on a full view
/// of that root.
#[macro_export]
macro_rules! test_on_base_and_view {
    ([$($case:ident),* $(,)?]) => {
        $(
            mod $case {
                use super::*;
                use paste::paste;

                paste! {
                    #[test]
                    fn on_base() -> Result<()> {
                        test_functions::[<$case _test>](false)
                    }

                    #[test]
                    fn on_view() -> Result<()> {
                        test_functions::[<$case _test>](true)
                    }
                }
            }
        )*
    };
}

/// Generates one test per entry for each requested flag combination.
#[macro_export]
macro_rules! test_with_flags {
    ([
        $($case:ident: [$($name:ident => ($($flag:expr),*)),* $(,)?]),* $(,)?
    ]) => {
        $(
            mod $case {
                use super::*;
                use paste::paste;

                paste! {
                    $(
                        #[test]
                        fn $name() -> Result<()> {
                            test_functions::[<$case _test>]($($flag),*)
                        }
                    )*
                }
            }
        )*
    };
}
