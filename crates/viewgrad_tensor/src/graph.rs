use crate::{
    is_tracking,
    memory::{is_mem_guard_active, lock_storages, remove_storage, unlock_storages},
    ops::{descriptor, Op},
    register_root, register_view, remove_node, try_with_node, try_with_node_mut, Creator, Tensor, TensorId,
    TensorNode,
};
use dashmap::DashSet;
use std::{
    collections::{HashMap, VecDeque},
    sync::LazyLock,
};
use tracing::trace;
use viewgrad_core::error::{Error, Result};

// ────────────────────────────────────────────────────────────────────────────
//  Builder
// ────────────────────────────────────────────────────────────────────────────

/// Runs `op` on `operands` and records the result in the graph.
///
/// Everything that can fail happens before the first registry change.
pub(crate) fn apply(op: Op, operands: &[Tensor]) -> Result<Tensor> {
    let desc = descriptor(op.kind)?;
    let first = operands
        .first()
        .ok_or_else(|| Error::InvalidArgument(format!("{} needs at least one operand", desc.name)))?;

    let tracking = is_tracking();
    let mut all_constant = true;
    for operand in operands {
        all_constant &= try_with_node(operand.id(), |node| node.constant)?;
    }
    let constant = !tracking || all_constant;

    let view_layout = match desc.view {
        Some(view) => {
            let layout = first.try_layout()?;
            view(&layout, &op.args)?
        },
        None => None,
    };

    let result = match view_layout {
        Some(layout) => {
            let root = try_with_node(first.id(), |node| node.base.unwrap_or(first.id()))?;
            register_view(root, layout, constant)?
        },
        None => {
            let arrays = operands
                .iter()
                .map(|operand| operand.try_to_array())
                .collect::<Result<Vec<_>>>()?;
            register_root((desc.forward)(&arrays, &op.args)?, constant)
        },
    };

    if tracking {
        record(result, op, operands)?;
    }
    Ok(result)
}

fn record(result: Tensor, op: Op, operands: &[Tensor]) -> Result<()> {
    trace!(op = op.name(), result = ?result.id(), "recording");
    let operand_ids: Vec<TensorId> = operands.iter().map(|t| t.id()).collect();
    for &operand in &operand_ids {
        try_with_node_mut(operand, |node| {
            node.consumers.push(result.id());
            node.grad = None;
        })?;
    }

    let mut locks = Vec::new();
    if is_mem_guard_active() {
        for &operand in &operand_ids {
            locks.push(try_with_node(operand, |node| node.storage)?);
        }
        locks.push(try_with_node(result.id(), |node| node.storage)?);
        lock_storages(&locks)?;
    }

    try_with_node_mut(result.id(), |node| {
        node.creator = Some(Creator {
            op,
            operands: operand_ids,
        });
        node.locks = locks;
    })
}

// ────────────────────────────────────────────────────────────────────────────
//  Traversal
// ────────────────────────────────────────────────────────────────────────────

/// Upstream neighbours: the creator's operands, or the family root for a
/// view without a creator.
pub(crate) fn parents(node: &TensorNode) -> Vec<TensorId> {
    match (&node.creator, node.base) {
        (Some(creator), _) => creator.operands.clone(),
        (None, Some(base)) => vec![base],
        (None, None) => Vec::new(),
    }
}

pub(crate) struct TopoOrder {
    /// Terminal first; every node precedes all of its parents.
    pub(crate) order: Vec<TensorId>,
    /// Parents of each node restricted to the traversed set, with multiplicity.
    pub(crate) parents: HashMap<TensorId, Vec<TensorId>>,
}

/// Kahn ordering of `terminal` and its ancestors. With `prune_constants`,
/// constant nodes and everything reachable only through them are skipped.
pub(crate) fn topological_order(terminal: TensorId, prune_constants: bool) -> Result<TopoOrder> {
    let mut parent_map: HashMap<TensorId, Vec<TensorId>> = HashMap::new();
    let mut queue = VecDeque::from([terminal]);
    while let Some(tid) = queue.pop_front() {
        if parent_map.contains_key(&tid) {
            continue;
        }
        let ups = try_with_node(tid, parents)?;
        let mut kept = Vec::with_capacity(ups.len());
        for up in ups {
            if prune_constants && try_with_node(up, |node| node.constant)? {
                continue;
            }
            kept.push(up);
            queue.push_back(up);
        }
        parent_map.insert(tid, kept);
    }

    let mut in_degree: HashMap<TensorId, usize> = parent_map.keys().map(|&tid| (tid, 0)).collect();
    for ups in parent_map.values() {
        for up in ups {
            *in_degree.entry(*up).or_insert(0) += 1;
        }
    }

    let mut order = Vec::with_capacity(parent_map.len());
    let mut ready = VecDeque::from([terminal]);
    while let Some(tid) = ready.pop_front() {
        order.push(tid);
        for up in parent_map.get(&tid).map(|ups| ups.as_slice()).unwrap_or_default() {
            if let Some(degree) = in_degree.get_mut(up) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(*up);
                }
            }
        }
    }

    if order.len() != parent_map.len() {
        return Err(Error::InvalidState("computational graph contains a cycle".into()));
    }
    Ok(TopoOrder {
        order,
        parents: parent_map,
    })
}

// ────────────────────────────────────────────────────────────────────────────
//  Release
// ────────────────────────────────────────────────────────────────────────────

/// Drops a node's creator, consumer edges and memory-guard locks.
pub(crate) fn release(tid: TensorId) -> Result<()> {
    let (creator, locks) = try_with_node_mut(tid, |node| {
        let creator = node.creator.take();
        if creator.is_some() || node.is_view() {
            node.released = true;
        }
        (creator, std::mem::take(&mut node.locks))
    })?;
    unlock_storages(&locks)?;
    if let Some(creator) = creator {
        for operand in creator.operands {
            remove_consumer(operand, tid);
        }
    }
    Ok(())
}

/// Removes one occurrence of `consumer`; a reclaimed operand has none left.
pub(crate) fn remove_consumer(tid: TensorId, consumer: TensorId) {
    let _ = try_with_node_mut(tid, |node| {
        if let Some(pos) = node.consumers.iter().position(|&c| c == consumer) {
            node.consumers.remove(pos);
        }
    });
}

/// Releases `terminal`, then every ancestor left without consumers.
pub(crate) fn release_upstream(terminal: TensorId, null_grads: bool) -> Result<()> {
    let topo = topological_order(terminal, false)?;
    for (i, &tid) in topo.order.iter().enumerate() {
        let unused = i == 0 || try_with_node(tid, |node| node.consumers.is_empty())?;
        if !unused {
            continue;
        }
        release(tid)?;
        if null_grads {
            try_with_node_mut(tid, |node| node.grad = None)?;
        }
    }
    reclaim_snapshots()
}

// ────────────────────────────────────────────────────────────────────────────
//  Snapshots
// ────────────────────────────────────────────────────────────────────────────

static SNAPSHOTS: LazyLock<DashSet<TensorId>> = LazyLock::new(DashSet::new);

pub(crate) fn register_snapshot(tid: TensorId) {
    SNAPSHOTS.insert(tid);
}

/// Removes snapshots no recorded computation can reach any more, until none
/// is left to remove.
pub(crate) fn reclaim_snapshots() -> Result<()> {
    loop {
        let candidates: Vec<TensorId> = SNAPSHOTS.iter().map(|entry| *entry.key()).collect();
        let mut removed = false;
        for tid in candidates {
            let (referenced, base, views, storage) = try_with_node(tid, |node| {
                (!node.consumers.is_empty(), node.base, node.views.clone(), node.storage)
            })?;
            let holds_views = views.iter().any(|view| SNAPSHOTS.contains(view));
            if referenced || holds_views {
                continue;
            }

            release(tid)?;
            remove_node(tid);
            SNAPSHOTS.remove(&tid);
            match base {
                Some(base) => {
                    let _ = try_with_node_mut(base, |node| node.views.retain(|&v| v != tid));
                },
                None => remove_storage(storage),
            }
            trace!(snapshot = ?tid, "reclaimed");
            removed = true;
        }
        if !removed {
            return Ok(());
        }
    }
}

pub(crate) fn is_snapshot(tid: TensorId) -> bool {
    SNAPSHOTS.contains(&tid)
}
