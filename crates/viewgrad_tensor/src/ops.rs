// Operation registry and the tensor methods built on it.

// ## Operations that create new tensors with new storage
mod binary;
mod reduction;
mod setitem;
mod unary;

// ## Operations that may return a view over the operand's storage
// These fall back to a copy when no view layout exists.
mod view;

use std::{collections::HashMap, sync::LazyLock};
use viewgrad_core::{
    array::NdArray,
    error::{Error, Result},
    index::Index,
    layout::Layout,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    Positive,
    Exp,
    Log,
    Sum,
    Mean,
    MultiplySequence,
    Copy,
    Take,
    Index,
    Transpose,
    Reshape,
    Squeeze,
    Unsqueeze,
    Diagonal,
    SetItem,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Mul => "mul",
            OpKind::Div => "div",
            OpKind::Pow => "pow",
            OpKind::Neg => "neg",
            OpKind::Positive => "positive",
            OpKind::Exp => "exp",
            OpKind::Log => "log",
            OpKind::Sum => "sum",
            OpKind::Mean => "mean",
            OpKind::MultiplySequence => "multiply_sequence",
            OpKind::Copy => "copy",
            OpKind::Take => "take",
            OpKind::Index => "index",
            OpKind::Transpose => "transpose",
            OpKind::Reshape => "reshape",
            OpKind::Squeeze => "squeeze",
            OpKind::Unsqueeze => "unsqueeze",
            OpKind::Diagonal => "diagonal",
            OpKind::SetItem => "setitem",
        }
    }
}

/// Non-tensor arguments of an operation.
#[derive(Clone, Debug, PartialEq)]
pub enum OpArgs {
    None,
    Index(Vec<Index>),
    Axes(Vec<usize>),
    Shape(Vec<usize>),
    Axis(usize),
    Reduce { axes: Option<Vec<usize>>, keepdims: bool },
    Take { indices: Vec<isize>, axis: Option<usize> },
    /// Region of a root written by an assignment, as a layout over the root.
    Region(Layout),
}

macro_rules! args_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(&self) -> Result<&$ty> {
            match self {
                OpArgs::$variant(value) => Ok(value),
                other => Err(Error::InvalidState(format!(
                    "expected {} arguments, got {:?}",
                    stringify!($variant),
                    other
                ))),
            }
        }
    };
}

impl OpArgs {
    args_accessor!(index, Index, Vec<Index>);
    args_accessor!(axes, Axes, Vec<usize>);
    args_accessor!(shape, Shape, Vec<usize>);
    args_accessor!(axis, Axis, usize);
    args_accessor!(region, Region, Layout);

    pub fn reduce(&self) -> Result<(Option<&[usize]>, bool)> {
        match self {
            OpArgs::Reduce { axes, keepdims } => Ok((axes.as_deref(), *keepdims)),
            other => Err(Error::InvalidState(format!("expected Reduce arguments, got {:?}", other))),
        }
    }

    pub fn take(&self) -> Result<(&[isize], Option<usize>)> {
        match self {
            OpArgs::Take { indices, axis } => Ok((indices.as_slice(), *axis)),
            other => Err(Error::InvalidState(format!("expected Take arguments, got {:?}", other))),
        }
    }
}

/// A recorded operation: what ran and with which non-tensor arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Op {
    pub kind: OpKind,
    pub args: OpArgs,
}

impl Op {
    pub fn new(kind: OpKind, args: OpArgs) -> Self {
        Self { kind, args }
    }

    pub fn plain(kind: OpKind) -> Self {
        Self::new(kind, OpArgs::None)
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }
}

/// Everything a backward function may look at.
pub struct BackwardCtx<'a> {
    pub args: &'a OpArgs,
    /// Operand values as recorded at construction time.
    pub operands: &'a [NdArray],
    pub result: &'a NdArray,
    /// Upstream gradient, shaped like `result`.
    pub grad: &'a NdArray,
}

impl BackwardCtx<'_> {
    pub fn operand(&self, index: usize) -> Result<&NdArray> {
        operand(self.operands, index)
    }
}

pub type ForwardFn = fn(&[NdArray], &OpArgs) -> Result<NdArray>;
/// Maps the operand's layout to the result's layout over the same storage.
pub type ViewFn = fn(&Layout, &OpArgs) -> Result<Option<Layout>>;
/// One gradient per operand; `None` means no contribution.
pub type BackwardFn = fn(&BackwardCtx) -> Result<Vec<Option<NdArray>>>;

pub struct OpDescriptor {
    pub kind: OpKind,
    pub name: &'static str,
    pub forward: ForwardFn,
    pub view: Option<ViewFn>,
    pub backward: BackwardFn,
}

impl OpDescriptor {
    pub(crate) fn new(kind: OpKind, forward: ForwardFn, backward: BackwardFn) -> Self {
        Self {
            kind,
            name: kind.as_str(),
            forward,
            view: None,
            backward,
        }
    }

    pub(crate) fn with_view(mut self, view: ViewFn) -> Self {
        self.view = Some(view);
        self
    }
}

static REGISTRY: LazyLock<HashMap<OpKind, OpDescriptor>> = LazyLock::new(|| {
    let mut registry = HashMap::new();
    binary::register(&mut registry);
    unary::register(&mut registry);
    reduction::register(&mut registry);
    view::register(&mut registry);
    setitem::register(&mut registry);
    registry
});

pub fn descriptor(kind: OpKind) -> Result<&'static OpDescriptor> {
    REGISTRY
        .get(&kind)
        .ok_or_else(|| Error::InvalidState(format!("no descriptor registered for {}", kind.as_str())))
}

pub(crate) fn operand(operands: &[NdArray], index: usize) -> Result<&NdArray> {
    operands
        .get(index)
        .ok_or_else(|| Error::InvalidState(format!("missing operand {}", index)))
}
