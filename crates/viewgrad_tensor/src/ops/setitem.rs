use super::{operand, BackwardCtx, OpArgs, OpDescriptor, OpKind};
use std::collections::HashMap;
use viewgrad_core::{array::NdArray, error::Result};

// Operands are the pre-assignment root values and the assigned source. The
// region addresses flat positions of the root.

fn setitem_forward(operands: &[NdArray], args: &OpArgs) -> Result<NdArray> {
    let region = args.region()?;
    let source = operand(operands, 1)?.broadcast_to(region.shape())?;
    let mut out = operand(operands, 0)?.clone();
    out.zero_region(region);
    out.scatter_add(region, &source)?;
    Ok(out)
}

fn setitem_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    let region = ctx.args.region()?;
    let mut target = ctx.grad.clone();
    target.zero_region(region);
    let source = ctx.grad.gather(region)?.sum_to(ctx.operand(1)?.shape())?;
    Ok(vec![Some(target), Some(source)])
}

pub(super) fn register(registry: &mut HashMap<OpKind, OpDescriptor>) {
    registry.insert(
        OpKind::SetItem,
        OpDescriptor::new(OpKind::SetItem, setitem_forward, setitem_backward),
    );
}
