mod adapter;
mod backward;
mod creation;
mod display;
mod graph;
#[cfg(feature = "serde")]
pub mod io;
mod memory;
mod mutation;
mod operators;
pub mod ops;
pub mod prelude;

pub use adapter::TensorAdapter;
pub use memory::{
    is_mem_guard_active, mem_guard_off, mem_guard_on, with_mem_guard_off, MemGuard, StorageId,
};
use dashmap::DashMap;
use std::{
    cell::Cell,
    sync::{
        atomic::{AtomicUsize, Ordering},
        LazyLock,
    },
};
use viewgrad_core::{
    array::NdArray,
    error::{Error, Result},
    layout::Layout,
};

use crate::ops::Op;

// ────────────────────────────────────────────────────────────────────────────
//  Tensor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(usize);
static TENSOR_COUNTER: AtomicUsize = AtomicUsize::new(1);
#[inline]
pub(crate) fn next_tensor_id() -> TensorId {
    TensorId(TENSOR_COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// Handle to a node of the computational graph.
///
/// Handles are `Copy`; all state lives in the process-wide node registry, so
/// two handles with the same id are the same tensor.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tensor(TensorId);

impl Tensor {
    #[inline]
    pub fn id(&self) -> TensorId {
        self.0
    }

    #[inline]
    pub(crate) fn from_id(id: TensorId) -> Self {
        Self(id)
    }
}

// ────────────────────────────────────────────────────────────────────────────
//  Graph tracking context
// ────────────────────────────────────────────────────────────────────────────

thread_local! {
    static TRACK_GRAPH: Cell<bool> = const { Cell::new(true) };
}

pub fn is_tracking() -> bool {
    TRACK_GRAPH.with(|t| t.get())
}

pub struct GraphTrackingGuard {
    prev: bool,
}

impl GraphTrackingGuard {
    fn new(enabled: bool) -> Self {
        let prev = TRACK_GRAPH.with(|t| t.replace(enabled));
        Self { prev }
    }
}

impl Drop for GraphTrackingGuard {
    fn drop(&mut self) {
        TRACK_GRAPH.with(|t| t.set(self.prev));
    }
}

/// Stops recording operations until the guard is dropped. Results created
/// meanwhile are constants without a creator.
pub fn no_autodiff() -> GraphTrackingGuard {
    GraphTrackingGuard::new(false)
}

pub fn track_graph() -> GraphTrackingGuard {
    GraphTrackingGuard::new(true)
}

/// Disables graph recording in the current lexical scope.
///
/// ### Example
/// ```rust
/// use viewgrad_tensor::{no_autodiff, Tensor};
///
/// let x = Tensor::new(vec![1.0, 2.0]);
/// {
///     viewgrad_tensor::no_autodiff!();
///     let y = x.mul_scalar(2.0);
///     assert!(y.is_constant());
/// }
/// ```
#[macro_export]
macro_rules! no_autodiff {
    () => {
        let _tracking_guard = $crate::no_autodiff();
    };
}

// ────────────────────────────────────────────────────────────────────────────
//  Node registry
// ────────────────────────────────────────────────────────────────────────────

/// Operation and operands that produced a node.
#[derive(Clone, Debug)]
pub(crate) struct Creator {
    pub(crate) op: Op,
    pub(crate) operands: Vec<TensorId>,
}

#[derive(Clone, Debug)]
pub(crate) struct TensorNode {
    pub(crate) storage: StorageId,
    pub(crate) layout: Layout,
    /// Root of the view family; `None` for roots.
    pub(crate) base: Option<TensorId>,
    /// Views of this root, in creation order.
    pub(crate) views: Vec<TensorId>,
    pub(crate) creator: Option<Creator>,
    /// Nodes whose creator lists this node, once per occurrence.
    pub(crate) consumers: Vec<TensorId>,
    pub(crate) grad: Option<TensorId>,
    pub(crate) constant: bool,
    /// Copy-on-write stand-in for pre-mutation state; never handed out.
    pub(crate) snapshot: bool,
    pub(crate) released: bool,
    /// Storages this node holds a memory-guard lock on.
    pub(crate) locks: Vec<StorageId>,
}

impl TensorNode {
    pub(crate) fn root(storage: StorageId, layout: Layout, constant: bool) -> Self {
        Self {
            storage,
            layout,
            base: None,
            views: Vec::new(),
            creator: None,
            consumers: Vec::new(),
            grad: None,
            constant,
            snapshot: false,
            released: false,
            locks: Vec::new(),
        }
    }

    pub(crate) fn view(storage: StorageId, layout: Layout, base: TensorId, constant: bool) -> Self {
        Self {
            base: Some(base),
            ..Self::root(storage, layout, constant)
        }
    }

    pub(crate) fn is_view(&self) -> bool {
        self.base.is_some()
    }
}

static NODES: LazyLock<DashMap<TensorId, TensorNode>> =
    LazyLock::new(|| DashMap::with_capacity_and_shard_amount(1 << 12, 64));

pub(crate) fn insert_node(tid: TensorId, node: TensorNode) {
    NODES.insert(tid, node);
}

pub(crate) fn remove_node(tid: TensorId) -> Option<TensorNode> {
    NODES.remove(&tid).map(|(_, node)| node)
}

pub(crate) fn try_with_node<R>(tid: TensorId, func: impl FnOnce(&TensorNode) -> R) -> Result<R> {
    let entry = NODES
        .get(&tid)
        .ok_or_else(|| Error::InvalidState(format!("tensor {:?} is not registered", tid)))?;
    Ok(func(entry.value()))
}

pub(crate) fn try_with_node_mut<R>(tid: TensorId, func: impl FnOnce(&mut TensorNode) -> R) -> Result<R> {
    let mut entry = NODES
        .get_mut(&tid)
        .ok_or_else(|| Error::InvalidState(format!("tensor {:?} is not registered", tid)))?;
    Ok(func(entry.value_mut()))
}

/// Registers a root owning fresh storage filled with `array`.
pub(crate) fn register_root(array: NdArray, constant: bool) -> Tensor {
    let layout = Layout::from_shape(array.shape());
    let sid = memory::insert_storage(viewgrad_core::buffer::Buffer::from_vec(array.into_data()));
    let tid = next_tensor_id();
    insert_node(tid, TensorNode::root(sid, layout, constant));
    Tensor(tid)
}

/// Registers a view of `root` over its storage and records it in the family.
pub(crate) fn register_view(root: TensorId, layout: Layout, constant: bool) -> Result<Tensor> {
    let storage = try_with_node(root, |node| node.storage)?;
    let tid = next_tensor_id();
    insert_node(tid, TensorNode::view(storage, layout, root, constant));
    try_with_node_mut(root, |node| node.views.push(tid))?;
    Ok(Tensor(tid))
}

/// ## Node queries
///
/// * Shape accessors (`layout`, `shape`, `ndim`, `size`)
/// * Graph state (`base`, `grad`, `is_constant`, `has_creator`, `creator_name`)
/// * Values (`to_array`, `to_vec`, `item`)
/// * Aliasing (`shares_memory`, `may_share_memory`)
///
/// Accessors without a `try_` prefix panic if the handle isn't registered,
/// which only happens for internal ids.
impl Tensor {
    fn read<R>(&self, func: impl FnOnce(&TensorNode) -> R) -> R {
        try_with_node(self.0, func).expect("tensor handle is not registered")
    }

    pub fn try_layout(&self) -> Result<Layout> {
        try_with_node(self.0, |node| node.layout.clone())
    }

    pub fn layout(&self) -> Layout {
        self.read(|node| node.layout.clone())
    }

    pub fn shape(&self) -> Vec<usize> {
        self.read(|node| node.layout.shape().to_vec())
    }

    pub fn ndim(&self) -> usize {
        self.read(|node| node.layout.ndim())
    }

    pub fn size(&self) -> usize {
        self.read(|node| node.layout.size())
    }

    pub fn storage_id(&self) -> StorageId {
        self.read(|node| node.storage)
    }

    /// Root of this tensor's view family, or `None` when the tensor owns its storage.
    pub fn base(&self) -> Option<Tensor> {
        self.read(|node| node.base.map(Tensor))
    }

    pub fn is_view(&self) -> bool {
        self.read(|node| node.is_view())
    }

    /// Gradient deposited by the last backward pass that reached this tensor.
    ///
    /// For a view this is itself a view of `self.base().grad()`. A view's
    /// gradient is only valid while its base still holds the gradient it was
    /// taken from; once the base's gradient is cleared or replaced, the view
    /// reports none.
    pub fn try_grad(&self) -> Result<Option<Tensor>> {
        let (base, grad) = try_with_node(self.0, |node| (node.base, node.grad))?;
        let (Some(base), Some(grad)) = (base, grad) else {
            return Ok(grad.map(Tensor));
        };
        let Some(base_grad) = try_with_node(base, |node| node.grad)? else {
            return Ok(None);
        };
        let current = try_with_node(grad, |node| node.base == Some(base_grad)).unwrap_or(false);
        Ok(current.then_some(Tensor(grad)))
    }

    pub fn grad(&self) -> Option<Tensor> {
        self.try_grad().expect("failed to read gradient")
    }

    pub fn is_constant(&self) -> bool {
        self.read(|node| node.constant)
    }

    pub fn has_creator(&self) -> bool {
        self.read(|node| node.creator.is_some())
    }

    pub fn creator_name(&self) -> Option<&'static str> {
        self.read(|node| node.creator.as_ref().map(|c| c.op.name()))
    }

    /// Views registered on this root, oldest first; empty for views.
    pub fn views(&self) -> Vec<Tensor> {
        self.read(|node| node.views.iter().copied().map(Tensor).collect())
    }

    pub fn try_to_array(&self) -> Result<NdArray> {
        let (sid, layout) = try_with_node(self.0, |node| (node.storage, node.layout.clone()))?;
        memory::try_with_storage(sid, |storage| storage.buffer.read(&layout))?
    }

    pub fn to_array(&self) -> NdArray {
        self.try_to_array().expect("failed to read tensor values")
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.to_array().into_data()
    }

    pub fn try_item(&self) -> Result<f64> {
        let array = self.try_to_array()?;
        match array.data() {
            [value] => Ok(*value),
            _ => Err(Error::InvalidArgument(format!(
                "item() needs a tensor with a single element, got shape {:?}",
                array.shape()
            ))),
        }
    }

    pub fn item(&self) -> f64 {
        self.try_item().expect("failed to read tensor item")
    }

    /// Whether both tensors address at least one common storage element.
    pub fn shares_memory(&self, other: &Tensor) -> bool {
        let (sa, la) = self.read(|node| (node.storage, node.layout.clone()));
        let (sb, lb) = other.read(|node| (node.storage, node.layout.clone()));
        if sa != sb {
            return false;
        }
        let seen: std::collections::HashSet<usize> = la.offsets().into_iter().collect();
        lb.offsets().into_iter().any(|pos| seen.contains(&pos))
    }

    /// Whether both tensors sit on the same storage.
    pub fn may_share_memory(&self, other: &Tensor) -> bool {
        self.storage_id() == other.storage_id()
    }
}
