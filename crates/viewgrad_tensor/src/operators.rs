use crate::Tensor;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

macro_rules! impl_binary_operator {
    ($trait:ident, $fn_name:ident, $scalar_fn:ident) => {
        impl $trait<&Tensor> for &Tensor {
            type Output = Tensor;

            fn $fn_name(self, rhs: &Tensor) -> Self::Output {
                Tensor::$fn_name(self, rhs)
            }
        }

        impl $trait<Tensor> for &Tensor {
            type Output = Tensor;

            fn $fn_name(self, rhs: Tensor) -> Self::Output {
                Tensor::$fn_name(self, &rhs)
            }
        }

        impl $trait<&Tensor> for Tensor {
            type Output = Tensor;

            fn $fn_name(self, rhs: &Tensor) -> Self::Output {
                Tensor::$fn_name(&self, rhs)
            }
        }

        impl $trait<Tensor> for Tensor {
            type Output = Tensor;

            fn $fn_name(self, rhs: Tensor) -> Self::Output {
                Tensor::$fn_name(&self, &rhs)
            }
        }

        impl $trait<f64> for Tensor {
            type Output = Tensor;

            fn $fn_name(self, rhs: f64) -> Self::Output {
                Tensor::$scalar_fn(&self, rhs)
            }
        }

        impl $trait<f64> for &Tensor {
            type Output = Tensor;

            fn $fn_name(self, rhs: f64) -> Self::Output {
                Tensor::$scalar_fn(self, rhs)
            }
        }

        impl $trait<Tensor> for f64 {
            type Output = Tensor;

            fn $fn_name(self, rhs: Tensor) -> Self::Output {
                Tensor::$fn_name(&Tensor::scalar(self), &rhs)
            }
        }

        impl $trait<&Tensor> for f64 {
            type Output = Tensor;

            fn $fn_name(self, rhs: &Tensor) -> Self::Output {
                Tensor::$fn_name(&Tensor::scalar(self), rhs)
            }
        }
    };
}

impl_binary_operator!(Add, add, add_scalar);
impl_binary_operator!(Sub, sub, sub_scalar);
impl_binary_operator!(Mul, mul, mul_scalar);
impl_binary_operator!(Div, div, div_scalar);

impl Neg for Tensor {
    type Output = Tensor;

    fn neg(self) -> Self::Output {
        Tensor::neg(&self)
    }
}

impl Neg for &Tensor {
    type Output = Tensor;

    fn neg(self) -> Self::Output {
        Tensor::neg(self)
    }
}

// Compound assignment writes in place, through every view of the buffer.
macro_rules! impl_assign_operator {
    ($trait:ident, $fn_name:ident, $inplace:ident) => {
        impl $trait<&Tensor> for Tensor {
            fn $fn_name(&mut self, rhs: &Tensor) {
                self.$inplace(rhs)
            }
        }

        impl $trait<Tensor> for Tensor {
            fn $fn_name(&mut self, rhs: Tensor) {
                self.$inplace(&rhs)
            }
        }

        impl $trait<f64> for Tensor {
            fn $fn_name(&mut self, rhs: f64) {
                self.$inplace(&Tensor::scalar(rhs))
            }
        }
    };
}

impl_assign_operator!(AddAssign, add_assign, add_);
impl_assign_operator!(SubAssign, sub_assign, sub_);
impl_assign_operator!(MulAssign, mul_assign, mul_);
impl_assign_operator!(DivAssign, div_assign, div_);
