use super::{operand, BackwardCtx, Op, OpArgs, OpDescriptor, OpKind};
use crate::{graph::apply, Tensor};
use std::collections::HashMap;
use viewgrad_core::{array::NdArray, error::Result};

fn sum_forward(operands: &[NdArray], args: &OpArgs) -> Result<NdArray> {
    let (axes, keepdims) = args.reduce()?;
    operand(operands, 0)?.sum_axes(axes, keepdims)
}

fn mean_forward(operands: &[NdArray], args: &OpArgs) -> Result<NdArray> {
    let input = operand(operands, 0)?;
    let summed = sum_forward(operands, args)?;
    let count = reduced_count(input, &summed);
    Ok(summed.map(|v| v / count))
}

/// Number of input elements folded into each output element.
fn reduced_count(input: &NdArray, output: &NdArray) -> f64 {
    if output.is_empty() {
        return 1.0;
    }
    input.len() as f64 / output.len() as f64
}

/// Spreads the upstream gradient back over the reduced axes.
fn expand_grad(ctx: &BackwardCtx) -> Result<NdArray> {
    let input = ctx.operand(0)?;
    let (axes, _) = ctx.args.reduce()?;
    let kept: Vec<usize> = input
        .shape()
        .iter()
        .enumerate()
        .map(|(i, &dim)| match axes {
            Some(axes) if !axes.contains(&i) => dim,
            _ => 1,
        })
        .collect();
    ctx.grad.reshape(&kept)?.broadcast_to(input.shape())
}

fn sum_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    Ok(vec![Some(expand_grad(ctx)?)])
}

fn mean_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    let count = reduced_count(ctx.operand(0)?, ctx.result);
    Ok(vec![Some(expand_grad(ctx)?.map(|g| g / count))])
}

pub(super) fn register(registry: &mut HashMap<OpKind, OpDescriptor>) {
    let entries = [
        OpDescriptor::new(OpKind::Sum, sum_forward, sum_backward),
        OpDescriptor::new(OpKind::Mean, mean_forward, mean_backward),
    ];
    registry.extend(entries.map(|d| (d.kind, d)));
}

fn reduce_args(axes: Option<&[usize]>, keepdims: bool) -> OpArgs {
    OpArgs::Reduce {
        axes: axes.map(|axes| axes.to_vec()),
        keepdims,
    }
}

/// ## Reductions
///
/// * `sum`/`mean` over the given axes, optionally keeping them as size 1
/// * `sum_all`/`mean_all` reduce to a 0-d tensor
impl Tensor {
    pub fn try_sum(&self, axes: &[usize], keepdims: bool) -> Result<Tensor> {
        apply(Op::new(OpKind::Sum, reduce_args(Some(axes), keepdims)), &[*self])
    }

    pub fn try_sum_all(&self) -> Result<Tensor> {
        apply(Op::new(OpKind::Sum, reduce_args(None, false)), &[*self])
    }

    pub fn try_mean(&self, axes: &[usize], keepdims: bool) -> Result<Tensor> {
        apply(Op::new(OpKind::Mean, reduce_args(Some(axes), keepdims)), &[*self])
    }

    pub fn try_mean_all(&self) -> Result<Tensor> {
        apply(Op::new(OpKind::Mean, reduce_args(None, false)), &[*self])
    }

    pub fn sum(&self, axes: &[usize], keepdims: bool) -> Tensor {
        self.try_sum(axes, keepdims).expect("failed to compute sum")
    }

    pub fn sum_all(&self) -> Tensor {
        self.try_sum_all().expect("failed to compute sum_all")
    }

    pub fn mean(&self, axes: &[usize], keepdims: bool) -> Tensor {
        self.try_mean(axes, keepdims).expect("failed to compute mean")
    }

    pub fn mean_all(&self) -> Tensor {
        self.try_mean_all().expect("failed to compute mean_all")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_backward_spreads_evenly() -> Result<()> {
        let input = NdArray::new((0..6).map(f64::from).collect(), &[2, 3])?;
        let args = reduce_args(Some(&[1]), false);
        let result = mean_forward(&[input.clone()], &args)?;
        assert_eq!(result.to_vec(), vec![1.0, 4.0]);

        let grad = NdArray::new(vec![3.0, 6.0], &[2])?;
        let ctx = BackwardCtx {
            args: &args,
            operands: &[input],
            result: &result,
            grad: &grad,
        };
        let grads = mean_backward(&ctx)?;
        assert_eq!(
            grads[0].as_ref().map(|g| g.to_vec()),
            Some(vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0])
        );
        Ok(())
    }
}
