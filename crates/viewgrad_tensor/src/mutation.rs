use crate::{
    graph::{reclaim_snapshots, register_snapshot},
    insert_node, is_tracking,
    memory::{
        clone_storage, is_mem_guard_active, lock_storages, transfer_locks, try_with_storage, try_with_storage_mut,
        StorageId,
    },
    next_tensor_id,
    ops::{descriptor, Op, OpArgs, OpKind},
    try_with_node, try_with_node_mut, Creator, Tensor, TensorId, TensorNode,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, warn};
use viewgrad_core::{
    broadcast::compute_broadcast_shape,
    error::{Error, Result},
    index::Index,
    layout::Layout,
};

/// Rewrites recorded references from live family members to their snapshots.
struct Repair {
    live: StorageId,
    frozen: StorageId,
    snapshots: HashMap<TensorId, TensorId>,
    moved_locks: usize,
}

impl Repair {
    fn snapshot_of(&self, tid: TensorId) -> TensorId {
        self.snapshots.get(&tid).copied().unwrap_or(tid)
    }

    fn remap_creator(&self, creator: &mut Creator) {
        for operand in creator.operands.iter_mut() {
            *operand = self.snapshot_of(*operand);
        }
    }

    /// Hands the snapshots over to the reclaimer.
    fn publish(&self) {
        for &snapshot in self.snapshots.values() {
            register_snapshot(snapshot);
        }
    }

    fn remap_locks(&mut self, locks: &mut [StorageId]) {
        for lock in locks.iter_mut() {
            if *lock == self.live {
                *lock = self.frozen;
                self.moved_locks += 1;
            }
        }
    }
}

/// Moves the family's recorded history onto snapshot nodes over a frozen
/// copy of the storage and returns the snapshot of each member.
///
/// Snapshots become reclaimable only once the caller has wired its own
/// edges to them; see [`Repair::publish`].
fn freeze_family(root: TensorId, family: &[TensorId], live: StorageId) -> Result<Repair> {
    let mut repair = Repair {
        live,
        frozen: clone_storage(live)?,
        snapshots: family.iter().map(|&tid| (tid, next_tensor_id())).collect(),
        moved_locks: 0,
    };
    let snapshot_root = repair.snapshot_of(root);
    let frozen = repair.frozen;

    let mut snapshots = Vec::with_capacity(family.len());
    let mut outside: Vec<TensorId> = Vec::new();
    let mut upstream: Vec<(TensorId, TensorId)> = Vec::new();
    for &member in family {
        let mut snapshot = try_with_node_mut(member, |node| TensorNode {
            storage: frozen,
            layout: node.layout.clone(),
            base: node.base.map(|_| snapshot_root),
            views: Vec::new(),
            creator: node.creator.take(),
            consumers: std::mem::take(&mut node.consumers),
            grad: None,
            constant: node.constant,
            snapshot: true,
            released: std::mem::replace(&mut node.released, false),
            locks: std::mem::take(&mut node.locks),
        })?;
        if let Some(creator) = snapshot.creator.as_mut() {
            for &operand in &creator.operands {
                if !repair.snapshots.contains_key(&operand) {
                    upstream.push((operand, member));
                }
            }
            repair.remap_creator(creator);
        }
        let mut locks = std::mem::take(&mut snapshot.locks);
        repair.remap_locks(&mut locks);
        snapshot.locks = locks;
        for consumer in snapshot.consumers.iter_mut() {
            match repair.snapshots.get(consumer) {
                Some(&mapped) => *consumer = mapped,
                None => outside.push(*consumer),
            }
        }
        snapshots.push((repair.snapshot_of(member), snapshot));
    }

    // operands outside the family now feed the snapshot instead
    for (operand, member) in upstream {
        let snapshot = repair.snapshot_of(member);
        try_with_node_mut(operand, |node| {
            if let Some(slot) = node.consumers.iter_mut().find(|c| **c == member) {
                *slot = snapshot;
            }
        })?;
    }

    let mut seen = HashSet::new();
    for consumer in outside {
        if !seen.insert(consumer) {
            continue;
        }
        let mut locks = try_with_node_mut(consumer, |node| {
            if let Some(creator) = node.creator.as_mut() {
                repair.remap_creator(creator);
            }
            std::mem::take(&mut node.locks)
        })?;
        repair.remap_locks(&mut locks);
        try_with_node_mut(consumer, |node| node.locks = locks)?;
    }

    let view_snapshots: Vec<TensorId> = snapshots
        .iter()
        .filter(|(tid, _)| *tid != snapshot_root)
        .map(|(tid, _)| *tid)
        .collect();
    for (tid, mut snapshot) in snapshots {
        if tid == snapshot_root {
            snapshot.views = view_snapshots.clone();
        }
        insert_node(tid, snapshot);
    }
    transfer_locks(repair.live, repair.frozen, repair.moved_locks)?;
    Ok(repair)
}

/// Rejects writes into buffers the user marked read-only, unless the memory
/// guard is disabled.
fn check_writeable(storage: StorageId) -> Result<()> {
    let writeable = try_with_storage(storage, |storage| storage.writeable)?;
    if !writeable {
        if is_mem_guard_active() {
            return Err(Error::ReadOnly);
        }
        warn!("writing into a read-only buffer with the memory guard disabled");
    }
    Ok(())
}

/// ## In-place mutation
///
/// Writes go through the whole view family: every view sharing the buffer
/// sees the new values. Computations recorded before the write keep seeing
/// the old ones, and gradients flow through the assignment.
impl Tensor {
    #[instrument(skip_all, fields(target = ?self.id()))]
    pub fn try_set(&self, indices: &[Index], source: &Tensor) -> Result<()> {
        let target = self.id();
        let (root, target_layout, target_constant) =
            try_with_node(target, |node| (node.base.unwrap_or(target), node.layout.clone(), node.constant))?;
        let (live, root_layout, views) =
            try_with_node(root, |node| (node.storage, node.layout.clone(), node.views.clone()))?;
        check_writeable(live)?;

        let region = target_layout.index(indices)?;
        let source_constant = try_with_node(source.id(), |node| node.constant)?;
        let values = source.try_to_array()?;
        values.broadcast_to(region.shape())?;
        let current = try_with_storage(live, |storage| storage.buffer.read(&root_layout))??;
        let args = OpArgs::Region(region);
        let updated = (descriptor(OpKind::SetItem)?.forward)(&[current, values], &args)?;

        let family: Vec<TensorId> = std::iter::once(root).chain(views).collect();
        debug!(family = family.len(), "mutating view family");
        let repair = freeze_family(root, &family, live)?;

        let tracking = is_tracking();
        if tracking {
            let snapshot_root = repair.snapshot_of(root);
            let assigned = repair.snapshot_of(source.id());
            for operand in [snapshot_root, assigned] {
                try_with_node_mut(operand, |node| node.consumers.push(root))?;
            }
            try_with_node_mut(source.id(), |node| node.grad = None)?;

            let mut locks = Vec::new();
            if is_mem_guard_active() {
                locks.push(repair.frozen);
                locks.push(try_with_node(assigned, |node| node.storage)?);
                locks.push(live);
                lock_storages(&locks)?;
            }
            try_with_node_mut(root, |node| {
                node.creator = Some(Creator {
                    op: Op::new(OpKind::SetItem, args),
                    operands: vec![snapshot_root, assigned],
                });
                node.locks = locks;
            })?;
        }

        try_with_storage_mut(live, |storage| storage.buffer.overwrite(updated.data()))??;

        let constant = target_constant && source_constant;
        for &member in &family {
            try_with_node_mut(member, |node| {
                if tracking {
                    node.constant = constant;
                }
                node.grad = None;
            })?;
        }

        repair.publish();
        reclaim_snapshots()
    }

    /// Runs [`try_set`](Self::try_set) and panics on failure.
    pub fn set(&self, indices: &[Index], source: &Tensor) {
        self.try_set(indices, source).expect("failed to assign into tensor")
    }

    pub fn try_set_scalar(&self, indices: &[Index], value: f64) -> Result<()> {
        self.try_set(indices, &Tensor::scalar(value))
    }

    pub fn set_scalar(&self, indices: &[Index], value: f64) {
        self.try_set_scalar(indices, value).expect("failed to assign into tensor")
    }

    /// Computes `op(self, rhs)` out of place and assigns it back to `self`.
    /// Shape and writeability are checked before anything is recorded.
    fn try_update(&self, rhs: &Tensor, op: fn(&Tensor, &Tensor) -> Result<Tensor>) -> Result<()> {
        let (storage, layout) = try_with_node(self.id(), |node| (node.storage, node.layout.clone()))?;
        check_writeable(storage)?;
        let rhs_layout: Layout = rhs.try_layout()?;
        let shape = compute_broadcast_shape(layout.shape(), rhs_layout.shape())?;
        if shape != layout.shape() {
            return Err(Error::InvalidShape {
                message: format!(
                    "in-place result of shape {:?} doesn't fit into shape {:?}",
                    shape,
                    layout.shape()
                ),
            });
        }
        let out = op(self, rhs)?;
        self.try_set(&[Index::Ellipsis], &out)
    }

    pub fn try_add_(&self, rhs: &Tensor) -> Result<()> {
        self.try_update(rhs, Tensor::try_add)
    }

    pub fn try_sub_(&self, rhs: &Tensor) -> Result<()> {
        self.try_update(rhs, Tensor::try_sub)
    }

    pub fn try_mul_(&self, rhs: &Tensor) -> Result<()> {
        self.try_update(rhs, Tensor::try_mul)
    }

    pub fn try_div_(&self, rhs: &Tensor) -> Result<()> {
        self.try_update(rhs, Tensor::try_div)
    }

    pub fn add_(&self, rhs: &Tensor) {
        self.try_add_(rhs).expect("failed to add_ tensors")
    }

    pub fn sub_(&self, rhs: &Tensor) {
        self.try_sub_(rhs).expect("failed to sub_ tensors")
    }

    pub fn mul_(&self, rhs: &Tensor) {
        self.try_mul_(rhs).expect("failed to mul_ tensors")
    }

    pub fn div_(&self, rhs: &Tensor) {
        self.try_div_(rhs).expect("failed to div_ tensors")
    }
}
