use super::{operand, BackwardCtx, Op, OpArgs, OpDescriptor, OpKind};
use crate::{graph::apply, Tensor};
use std::collections::HashMap;
use viewgrad_core::{array::NdArray, error::Result};

macro_rules! unary_forward {
    ($fn_name:ident, |$x:ident| $body:expr) => {
        fn $fn_name(operands: &[NdArray], _args: &OpArgs) -> Result<NdArray> {
            Ok(operand(operands, 0)?.map(|$x| $body))
        }
    };
}

unary_forward!(neg_forward, |x| -x);
unary_forward!(positive_forward, |x| x);
unary_forward!(exp_forward, |x| x.exp());
unary_forward!(log_forward, |x| x.ln());
unary_forward!(copy_forward, |x| x);

fn neg_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    Ok(vec![Some(ctx.grad.map(|g| -g))])
}

fn identity_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    Ok(vec![Some(ctx.grad.clone())])
}

fn exp_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    Ok(vec![Some(ctx.grad.zip_with(ctx.result, |g, r| g * r)?)])
}

fn log_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    Ok(vec![Some(ctx.grad.zip_with(ctx.operand(0)?, |g, x| g / x)?)])
}

pub(super) fn register(registry: &mut HashMap<OpKind, OpDescriptor>) {
    let entries = [
        OpDescriptor::new(OpKind::Neg, neg_forward, neg_backward),
        OpDescriptor::new(OpKind::Positive, positive_forward, identity_backward),
        OpDescriptor::new(OpKind::Exp, exp_forward, exp_backward),
        OpDescriptor::new(OpKind::Log, log_forward, log_backward),
        OpDescriptor::new(OpKind::Copy, copy_forward, identity_backward),
    ];
    registry.extend(entries.map(|d| (d.kind, d)));
}

/// ## Unary operations
///
/// `copy` always allocates fresh storage, so its result never aliases `self`.
impl Tensor {
    pub fn try_neg(&self) -> Result<Tensor> {
        apply(Op::plain(OpKind::Neg), &[*self])
    }

    pub fn try_positive(&self) -> Result<Tensor> {
        apply(Op::plain(OpKind::Positive), &[*self])
    }

    pub fn try_exp(&self) -> Result<Tensor> {
        apply(Op::plain(OpKind::Exp), &[*self])
    }

    pub fn try_log(&self) -> Result<Tensor> {
        apply(Op::plain(OpKind::Log), &[*self])
    }

    pub fn try_copy(&self) -> Result<Tensor> {
        apply(Op::plain(OpKind::Copy), &[*self])
    }

    pub fn neg(&self) -> Tensor {
        self.try_neg().expect("failed to negate tensor")
    }

    pub fn positive(&self) -> Tensor {
        self.try_positive().expect("failed to compute positive")
    }

    pub fn exp(&self) -> Tensor {
        self.try_exp().expect("failed to compute exp")
    }

    pub fn log(&self) -> Tensor {
        self.try_log().expect("failed to compute log")
    }

    pub fn copy(&self) -> Tensor {
        self.try_copy().expect("failed to copy tensor")
    }
}
