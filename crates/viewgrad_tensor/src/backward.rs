use crate::{
    graph::{is_snapshot, release_upstream, topological_order},
    ops::{descriptor, BackwardCtx},
    register_root, register_view, try_with_node, try_with_node_mut, Tensor, TensorId,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, trace};
use viewgrad_core::{
    array::NdArray,
    error::{Error, Result},
};

fn accumulate(grads: &mut HashMap<TensorId, NdArray>, tid: TensorId, grad: NdArray) -> Result<()> {
    match grads.get_mut(&tid) {
        Some(acc) => acc.add_assign(&grad),
        None => {
            grads.insert(tid, grad);
            Ok(())
        },
    }
}

/// Pushes `grad` of one node into the accumulators of its in-set parents.
fn propagate(
    tid: TensorId,
    grad: &NdArray,
    in_set: &HashSet<TensorId>,
    grads: &mut HashMap<TensorId, NdArray>,
) -> Result<()> {
    let (creator, base, layout) = try_with_node(tid, |node| (node.creator.clone(), node.base, node.layout.clone()))?;
    match (creator, base) {
        (Some(creator), _) => {
            let operands = creator
                .operands
                .iter()
                .map(|&operand| Tensor::from_id(operand).try_to_array())
                .collect::<Result<Vec<_>>>()?;
            let result = Tensor::from_id(tid).try_to_array()?;
            let ctx = BackwardCtx {
                args: &creator.op.args,
                operands: &operands,
                result: &result,
                grad,
            };
            let partials = (descriptor(creator.op.kind)?.backward)(&ctx)?;
            trace!(op = creator.op.name(), node = ?tid, "backward");
            for (operand, partial) in creator.operands.iter().zip(partials) {
                if let Some(partial) = partial {
                    if in_set.contains(operand) {
                        accumulate(grads, *operand, partial)?;
                    }
                }
            }
        },
        // a view without a creator hands its gradient straight to its root
        (None, Some(base)) if in_set.contains(&base) => {
            let root_shape = try_with_node(base, |node| node.layout.shape().to_vec())?;
            let mut root_grad = NdArray::zeros(&root_shape);
            root_grad.scatter_add(&layout, grad)?;
            accumulate(grads, base, root_grad)?;
        },
        _ => {},
    }
    Ok(())
}

/// Stores the accumulated gradients as constant tensors: roots own fresh
/// storage, views become views of their root's gradient.
fn deposit(terminal: TensorId, order: &[TensorId], mut grads: HashMap<TensorId, NdArray>) -> Result<()> {
    let mut roots: Vec<TensorId> = Vec::new();
    let mut views: Vec<TensorId> = Vec::new();
    for &tid in order {
        if is_snapshot(tid) {
            continue;
        }
        match try_with_node(tid, |node| node.base)? {
            Some(base) => {
                views.push(tid);
                roots.push(base);
            },
            None => roots.push(tid),
        }
    }

    // every non-constant member of the terminal's family gets a gradient view
    let family_root = try_with_node(terminal, |node| node.base.unwrap_or(terminal))?;
    roots.push(family_root);
    for view in try_with_node(family_root, |node| node.views.clone())? {
        if !try_with_node(view, |node| node.constant)? {
            views.push(view);
        }
    }

    let mut root_grads: HashMap<TensorId, TensorId> = HashMap::new();
    for root in roots {
        if root_grads.contains_key(&root) {
            continue;
        }
        let grad = match grads.remove(&root) {
            Some(grad) => grad,
            None => NdArray::zeros(&try_with_node(root, |node| node.layout.shape().to_vec())?),
        };
        let grad = register_root(grad, true).id();
        try_with_node_mut(root, |node| node.grad = Some(grad))?;
        root_grads.insert(root, grad);
    }

    let mut seen = HashSet::new();
    for view in views {
        if !seen.insert(view) {
            continue;
        }
        let (base, layout) = try_with_node(view, |node| (node.base, node.layout.clone()))?;
        let base = base.ok_or_else(|| Error::InvalidState(format!("{:?} is not a view", view)))?;
        let root_grad = root_grads
            .get(&base)
            .copied()
            .ok_or_else(|| Error::InvalidState(format!("no gradient for the root of {:?}", view)))?;
        let grad = register_view(root_grad, layout, true)?.id();
        try_with_node_mut(view, |node| node.grad = Some(grad))?;
    }
    Ok(())
}

#[instrument(skip_all, fields(terminal = ?terminal.id()))]
pub(crate) fn run_backward(terminal: Tensor, upstream: Option<&NdArray>) -> Result<()> {
    let tid = terminal.id();
    let (constant, released, shape) =
        try_with_node(tid, |node| (node.constant, node.released, node.layout.shape().to_vec()))?;
    if constant {
        return Err(Error::ConstantTensor);
    }
    if released {
        return Err(Error::NoGraph);
    }
    let seed = match upstream {
        Some(grad) => grad.broadcast_to(&shape)?,
        None => NdArray::ones(&shape),
    };

    let topo = topological_order(tid, true)?;
    debug!(nodes = topo.order.len(), "backward pass");
    let in_set: HashSet<TensorId> = topo.order.iter().copied().collect();
    let mut grads = HashMap::from([(tid, seed)]);
    for &node in &topo.order {
        // an absent accumulator is zero and contributes nothing
        let Some(grad) = grads.get(&node).cloned() else {
            continue;
        };
        propagate(node, &grad, &in_set, &mut grads)?;
    }

    deposit(tid, &topo.order, grads)?;
    release_upstream(tid, false)
}

/// ## Backpropagation
///
/// * `backward` seeds the tensor with ones, `backward_with` with an explicit
///   upstream gradient broadcastable to its shape
/// * gradients land on every non-constant tensor the pass reaches
/// * afterwards the traversed graph is released: creators are dropped and
///   buffers become writeable again
impl Tensor {
    pub fn try_backward(&self) -> Result<()> {
        run_backward(*self, None)
    }

    pub fn try_backward_with(&self, upstream: &NdArray) -> Result<()> {
        run_backward(*self, Some(upstream))
    }

    /// Runs [`try_backward`](Self::try_backward) and panics on failure.
    pub fn backward(&self) {
        self.try_backward().expect("failed to run backward")
    }

    /// Runs [`try_backward_with`](Self::try_backward_with) and panics on failure.
    pub fn backward_with(&self, upstream: &NdArray) {
        self.try_backward_with(upstream).expect("failed to run backward")
    }

    /// Releases this tensor's graph, then every upstream node nothing else
    /// depends on, nulling their gradients. Calling it twice is a no-op.
    pub fn try_clear_graph(&self) -> Result<()> {
        release_upstream(self.id(), true)
    }

    pub fn clear_graph(&self) {
        self.try_clear_graph().expect("failed to clear graph")
    }
}
