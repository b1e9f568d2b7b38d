use super::{operand, BackwardCtx, Op, OpArgs, OpDescriptor, OpKind, ViewFn};
use crate::{graph::apply, Tensor};
use std::collections::HashMap;
use viewgrad_core::{
    array::NdArray,
    error::{Error, Result},
    index::Index,
    layout::Layout,
};

// ─── View layouts ───

fn index_layout(layout: &Layout, args: &OpArgs) -> Result<Option<Layout>> {
    layout.index(args.index()?).map(Some)
}

fn transpose_layout(layout: &Layout, args: &OpArgs) -> Result<Option<Layout>> {
    layout.permute(args.axes()?).map(Some)
}

fn reshape_layout(layout: &Layout, args: &OpArgs) -> Result<Option<Layout>> {
    layout.reshape(args.shape()?)
}

fn squeeze_layout(layout: &Layout, args: &OpArgs) -> Result<Option<Layout>> {
    layout.squeeze(*args.axis()?).map(Some)
}

fn unsqueeze_layout(layout: &Layout, args: &OpArgs) -> Result<Option<Layout>> {
    layout.unsqueeze(*args.axis()?).map(Some)
}

fn diagonal_layout(layout: &Layout, _args: &OpArgs) -> Result<Option<Layout>> {
    layout.diagonal().map(Some)
}

/// The view applied to a contiguous operand, so its offsets are flat indices.
fn flat_view(view: ViewFn, input: &NdArray, args: &OpArgs) -> Result<Layout> {
    view(&Layout::from_shape(input.shape()), args)?
        .ok_or_else(|| Error::InvalidState("view of a contiguous layout must exist".into()))
}

fn gather_through(view: ViewFn, operands: &[NdArray], args: &OpArgs) -> Result<NdArray> {
    let input = operand(operands, 0)?;
    input.gather(&flat_view(view, input, args)?)
}

fn scatter_through(view: ViewFn, ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    let input = ctx.operand(0)?;
    let mut grad = NdArray::zeros(input.shape());
    grad.scatter_add(&flat_view(view, input, ctx.args)?, ctx.grad)?;
    Ok(vec![Some(grad)])
}

macro_rules! view_op {
    ($forward:ident, $backward:ident, $layout:ident) => {
        fn $forward(operands: &[NdArray], args: &OpArgs) -> Result<NdArray> {
            gather_through($layout, operands, args)
        }

        fn $backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
            scatter_through($layout, ctx)
        }
    };
}

view_op!(index_forward, index_backward, index_layout);
view_op!(transpose_forward, transpose_backward, transpose_layout);
view_op!(reshape_forward, reshape_backward, reshape_layout);
view_op!(squeeze_forward, squeeze_backward, squeeze_layout);
view_op!(unsqueeze_forward, unsqueeze_backward, unsqueeze_layout);
view_op!(diagonal_forward, diagonal_backward, diagonal_layout);

// ─── Take ───

/// Selects position `at` along `axis`, keeping the leading axes whole.
fn select(axis: usize, at: usize) -> Vec<Index> {
    let mut indices = vec![Index::full(); axis];
    indices.push(Index::at(at as isize));
    indices
}

struct TakePlan {
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
    axis: usize,
    indices: Vec<usize>,
}

impl TakePlan {
    fn new(shape: &[usize], indices: &[isize], axis: Option<usize>) -> Result<Self> {
        let input_shape = match axis {
            Some(_) => shape.to_vec(),
            None => vec![shape.iter().product()],
        };
        let axis = axis.unwrap_or(0);
        let size = *input_shape.get(axis).ok_or(Error::DimensionOutOfBounds {
            dim: axis as i64,
            ndim: input_shape.len(),
        })?;
        let indices = indices
            .iter()
            .map(|&i| {
                let resolved = if i < 0 { i + size as isize } else { i };
                if resolved < 0 || resolved >= size as isize {
                    return Err(Error::IndexOutOfBounds { index: i as i64, size });
                }
                Ok(resolved as usize)
            })
            .collect::<Result<Vec<_>>>()?;
        let mut output_shape = input_shape.clone();
        output_shape[axis] = indices.len();
        Ok(Self {
            input_shape,
            output_shape,
            axis,
            indices,
        })
    }

    /// `(source, destination)` layouts per selected index.
    fn pairs(&self) -> Result<Vec<(Layout, Layout)>> {
        let input = Layout::from_shape(&self.input_shape);
        let output = Layout::from_shape(&self.output_shape);
        self.indices
            .iter()
            .enumerate()
            .map(|(k, &i)| Ok((input.index(&select(self.axis, i))?, output.index(&select(self.axis, k))?)))
            .collect()
    }
}

fn take_forward(operands: &[NdArray], args: &OpArgs) -> Result<NdArray> {
    let input = operand(operands, 0)?;
    let (indices, axis) = args.take()?;
    let plan = TakePlan::new(input.shape(), indices, axis)?;
    let input = input.reshape(&plan.input_shape)?;
    let mut out = NdArray::zeros(&plan.output_shape);
    for (src, dst) in plan.pairs()? {
        out.scatter_add(&dst, &input.gather(&src)?)?;
    }
    Ok(out)
}

fn take_backward(ctx: &BackwardCtx) -> Result<Vec<Option<NdArray>>> {
    let input = ctx.operand(0)?;
    let (indices, axis) = ctx.args.take()?;
    let plan = TakePlan::new(input.shape(), indices, axis)?;
    let mut grad = NdArray::zeros(&plan.input_shape);
    // repeated indices accumulate
    for (src, dst) in plan.pairs()? {
        grad.scatter_add(&src, &ctx.grad.gather(&dst)?)?;
    }
    Ok(vec![Some(grad.reshape(input.shape())?)])
}

pub(super) fn register(registry: &mut HashMap<OpKind, OpDescriptor>) {
    let entries = [
        OpDescriptor::new(OpKind::Index, index_forward, index_backward).with_view(index_layout),
        OpDescriptor::new(OpKind::Transpose, transpose_forward, transpose_backward).with_view(transpose_layout),
        OpDescriptor::new(OpKind::Reshape, reshape_forward, reshape_backward).with_view(reshape_layout),
        OpDescriptor::new(OpKind::Squeeze, squeeze_forward, squeeze_backward).with_view(squeeze_layout),
        OpDescriptor::new(OpKind::Unsqueeze, unsqueeze_forward, unsqueeze_backward).with_view(unsqueeze_layout),
        OpDescriptor::new(OpKind::Diagonal, diagonal_forward, diagonal_backward).with_view(diagonal_layout),
        OpDescriptor::new(OpKind::Take, take_forward, take_backward),
    ];
    registry.extend(entries.map(|d| (d.kind, d)));
}

/// ## Views
///
/// Basic indexing, permutations, squeeze/unsqueeze and the main diagonal
/// always return views sharing `self`'s storage. `reshape` returns a view
/// when the layout is contiguous and a copy otherwise. `take` always copies.
impl Tensor {
    pub fn try_index(&self, indices: &[Index]) -> Result<Tensor> {
        apply(Op::new(OpKind::Index, OpArgs::Index(indices.to_vec())), &[*self])
    }

    pub fn try_permute(&self, axes: &[usize]) -> Result<Tensor> {
        apply(Op::new(OpKind::Transpose, OpArgs::Axes(axes.to_vec())), &[*self])
    }

    pub fn try_transpose(&self, dim0: usize, dim1: usize) -> Result<Tensor> {
        let ndim = self.try_layout()?.ndim();
        if dim0 >= ndim || dim1 >= ndim {
            return Err(Error::DimensionOutOfBounds {
                dim: dim0.max(dim1) as i64,
                ndim,
            });
        }
        let mut axes: Vec<usize> = (0..ndim).collect();
        axes.swap(dim0, dim1);
        self.try_permute(&axes)
    }

    /// Reverses every axis.
    pub fn try_t(&self) -> Result<Tensor> {
        let ndim = self.try_layout()?.ndim();
        let axes: Vec<usize> = (0..ndim).rev().collect();
        self.try_permute(&axes)
    }

    /// Reverses `axis`.
    pub fn try_flip(&self, axis: usize) -> Result<Tensor> {
        let ndim = self.try_layout()?.ndim();
        if axis >= ndim {
            return Err(Error::DimensionOutOfBounds { dim: axis as i64, ndim });
        }
        let mut indices = vec![Index::full(); axis];
        indices.push(Index::rev());
        self.try_index(&indices)
    }

    pub fn try_reshape(&self, shape: &[usize]) -> Result<Tensor> {
        apply(Op::new(OpKind::Reshape, OpArgs::Shape(shape.to_vec())), &[*self])
    }

    pub fn try_squeeze(&self, dim: usize) -> Result<Tensor> {
        apply(Op::new(OpKind::Squeeze, OpArgs::Axis(dim)), &[*self])
    }

    pub fn try_unsqueeze(&self, dim: usize) -> Result<Tensor> {
        apply(Op::new(OpKind::Unsqueeze, OpArgs::Axis(dim)), &[*self])
    }

    /// Main diagonal of a 2-d tensor.
    pub fn try_diagonal(&self) -> Result<Tensor> {
        apply(Op::plain(OpKind::Diagonal), &[*self])
    }

    /// Integer-list indexing along `axis`, or over the flattened tensor when
    /// `axis` is `None`. Negative indices count from the end.
    pub fn try_take(&self, indices: &[isize], axis: Option<usize>) -> Result<Tensor> {
        let args = OpArgs::Take {
            indices: indices.to_vec(),
            axis,
        };
        apply(Op::new(OpKind::Take, args), &[*self])
    }

    pub fn index(&self, indices: &[Index]) -> Tensor {
        self.try_index(indices).expect("failed to index tensor")
    }

    pub fn permute(&self, axes: &[usize]) -> Tensor {
        self.try_permute(axes).expect("failed to permute tensor")
    }

    pub fn transpose(&self, dim0: usize, dim1: usize) -> Tensor {
        self.try_transpose(dim0, dim1).expect("failed to transpose tensor")
    }

    pub fn t(&self) -> Tensor {
        self.try_t().expect("failed to transpose tensor")
    }

    pub fn flip(&self, axis: usize) -> Tensor {
        self.try_flip(axis).expect("failed to flip tensor")
    }

    pub fn reshape(&self, shape: &[usize]) -> Tensor {
        self.try_reshape(shape).expect("failed to reshape tensor")
    }

    pub fn squeeze(&self, dim: usize) -> Tensor {
        self.try_squeeze(dim).expect("failed to squeeze tensor")
    }

    pub fn unsqueeze(&self, dim: usize) -> Tensor {
        self.try_unsqueeze(dim).expect("failed to unsqueeze tensor")
    }

    pub fn diagonal(&self) -> Tensor {
        self.try_diagonal().expect("failed to take diagonal")
    }

    pub fn take(&self, indices: &[isize], axis: Option<usize>) -> Tensor {
        self.try_take(indices, axis).expect("failed to take from tensor")
    }
}
