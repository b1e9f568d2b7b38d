use super::{operand, BackwardCtx, Op, OpArgs, OpDescriptor, OpKind};
use crate::{graph::apply, Tensor};
use std::collections::HashMap;
use viewgrad_core::{
    array::NdArray,
    error::{Error, Result},
};

macro_rules! binary_forward {
    ($fn_name:ident, |$a:ident, $b:ident| $body:expr) => {
        fn $fn_name(operands: &[NdArray], _args: &OpArgs) -> Result<NdArray> {
            operand(operands, 0)?.zip_with(operand(operands, 1)?, |$a, $b| $body)
        }
    };
}

binary_forward!(add_forward, |a, b| a + b);
binary_forward!(sub_forward, |a, b| a - b);
binary_forward!(mul_forward, |a, b| a * b);
binary_forward!(div_forward, |a, b| a / b);
binary_forward!(pow_forward, |a, b| a.powf(b));

/// Gradients of `lhs` and `rhs` reduced back to their own shapes.
fn unbroadcast(ctx: &BackwardCtx, lhs: NdArray, rhs: NdArray) -> Result<Vec<Option<NdArray>>> {
    Ok(vec![
        Some(lhs.sum_to(ctx.operand(0)?.shape())?),
        Some(rhs.sum_to(ctx.operand(1)?.shape())?),
    ])
}

fn add_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    unbroadcast(ctx, ctx.grad.clone(), ctx.grad.clone())
}

fn sub_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    unbroadcast(ctx, ctx.grad.clone(), ctx.grad.map(|g| -g))
}

fn mul_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    let (a, b) = (ctx.operand(0)?, ctx.operand(1)?);
    unbroadcast(ctx, ctx.grad.zip_with(b, |g, b| g * b)?, ctx.grad.zip_with(a, |g, a| g * a)?)
}

fn div_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    let b = ctx.operand(1)?;
    let lhs = ctx.grad.zip_with(b, |g, b| g / b)?;
    // d(a/b)/db = -a / b^2 = -result / b
    let rhs = ctx.grad.zip_with(ctx.result, |g, r| -g * r)?.zip_with(b, |v, b| v / b)?;
    unbroadcast(ctx, lhs, rhs)
}

fn pow_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    let (a, b) = (ctx.operand(0)?, ctx.operand(1)?);
    let lhs = a
        .zip_with(b, |a, b| b * a.powf(b - 1.0))?
        .zip_with(ctx.grad, |d, g| d * g)?;
    // the exponent gradient only exists for a positive base
    let rhs = ctx
        .result
        .zip_with(a, |r, a| if a > 0.0 { r * a.ln() } else { 0.0 })?
        .zip_with(ctx.grad, |d, g| d * g)?;
    unbroadcast(ctx, lhs, rhs)
}

fn multiply_sequence_forward(operands: &[NdArray], _args: &OpArgs) -> Result<NdArray> {
    let (first, rest) = operands
        .split_first()
        .ok_or_else(|| Error::InvalidArgument("multiply_sequence needs at least one operand".into()))?;
    rest.iter()
        .try_fold(first.clone(), |acc, next| acc.zip_with(next, |a, b| a * b))
}

fn multiply_sequence_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    let mut grads = Vec::with_capacity(ctx.operands.len());
    for (i, target) in ctx.operands.iter().enumerate() {
        let mut partial = ctx.grad.clone();
        for (j, other) in ctx.operands.iter().enumerate() {
            if i != j {
                partial = partial.zip_with(other, |g, v| g * v)?;
            }
        }
        grads.push(Some(partial.sum_to(target.shape())?));
    }
    Ok(grads)
}

pub(super) fn register(registry: &mut HashMap<OpKind, OpDescriptor>) {
    let entries = [
        OpDescriptor::new(OpKind::Add, add_forward, add_backward),
        OpDescriptor::new(OpKind::Sub, sub_forward, sub_backward),
        OpDescriptor::new(OpKind::Mul, mul_forward, mul_backward),
        OpDescriptor::new(OpKind::Div, div_forward, div_backward),
        OpDescriptor::new(OpKind::Pow, pow_forward, pow_backward),
        OpDescriptor::new(
            OpKind::MultiplySequence,
            multiply_sequence_forward,
            multiply_sequence_backward,
        ),
    ];
    registry.extend(entries.map(|d| (d.kind, d)));
}

/// ## Binary operations
///
/// Operands broadcast numpy-style. Scalar forms wrap the scalar in a
/// constant 0-d tensor.
impl Tensor {
    pub fn try_add(&self, rhs: &Tensor) -> Result<Tensor> {
        apply(Op::plain(OpKind::Add), &[*self, *rhs])
    }

    pub fn try_sub(&self, rhs: &Tensor) -> Result<Tensor> {
        apply(Op::plain(OpKind::Sub), &[*self, *rhs])
    }

    pub fn try_mul(&self, rhs: &Tensor) -> Result<Tensor> {
        apply(Op::plain(OpKind::Mul), &[*self, *rhs])
    }

    pub fn try_div(&self, rhs: &Tensor) -> Result<Tensor> {
        apply(Op::plain(OpKind::Div), &[*self, *rhs])
    }

    pub fn try_pow(&self, exponent: &Tensor) -> Result<Tensor> {
        apply(Op::plain(OpKind::Pow), &[*self, *exponent])
    }

    /// Elementwise product of every tensor in `tensors`, in one graph node.
    pub fn try_multiply_sequence(tensors: &[Tensor]) -> Result<Tensor> {
        apply(Op::plain(OpKind::MultiplySequence), tensors)
    }

    pub fn try_add_scalar(&self, value: f64) -> Result<Tensor> {
        self.try_add(&Tensor::scalar(value))
    }

    pub fn try_sub_scalar(&self, value: f64) -> Result<Tensor> {
        self.try_sub(&Tensor::scalar(value))
    }

    pub fn try_mul_scalar(&self, value: f64) -> Result<Tensor> {
        self.try_mul(&Tensor::scalar(value))
    }

    pub fn try_div_scalar(&self, value: f64) -> Result<Tensor> {
        self.try_div(&Tensor::scalar(value))
    }

    pub fn try_pow_scalar(&self, exponent: f64) -> Result<Tensor> {
        self.try_pow(&Tensor::scalar(exponent))
    }

    pub fn add(&self, rhs: &Tensor) -> Tensor {
        self.try_add(rhs).expect("failed to add tensors")
    }

    pub fn sub(&self, rhs: &Tensor) -> Tensor {
        self.try_sub(rhs).expect("failed to subtract tensors")
    }

    pub fn mul(&self, rhs: &Tensor) -> Tensor {
        self.try_mul(rhs).expect("failed to multiply tensors")
    }

    pub fn div(&self, rhs: &Tensor) -> Tensor {
        self.try_div(rhs).expect("failed to divide tensors")
    }

    pub fn pow(&self, exponent: &Tensor) -> Tensor {
        self.try_pow(exponent).expect("failed to compute pow")
    }

    pub fn multiply_sequence(tensors: &[Tensor]) -> Tensor {
        Self::try_multiply_sequence(tensors).expect("failed to multiply sequence")
    }

    pub fn add_scalar(&self, value: f64) -> Tensor {
        self.try_add_scalar(value).expect("failed to add scalar")
    }

    pub fn sub_scalar(&self, value: f64) -> Tensor {
        self.try_sub_scalar(value).expect("failed to subtract scalar")
    }

    pub fn mul_scalar(&self, value: f64) -> Tensor {
        self.try_mul_scalar(value).expect("failed to multiply by scalar")
    }

    pub fn div_scalar(&self, value: f64) -> Tensor {
        self.try_div_scalar(value).expect("failed to divide by scalar")
    }

    pub fn pow_scalar(&self, exponent: f64) -> Tensor {
        self.try_pow_scalar(exponent).expect("failed to compute pow")
    }
}
