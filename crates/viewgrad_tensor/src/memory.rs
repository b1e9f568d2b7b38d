use crate::{try_with_node, Tensor};
use dashmap::DashMap;
use std::{
    cell::Cell,
    sync::{
        atomic::{AtomicUsize, Ordering},
        LazyLock,
    },
};
use tracing::warn;
use viewgrad_core::{
    array::NdArray,
    buffer::Buffer,
    error::{Error, Result},
    index::Index,
};

// ────────────────────────────────────────────────────────────────────────────
//  Storage registry
// ────────────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StorageId(usize);
static STORAGE_COUNTER: AtomicUsize = AtomicUsize::new(1);
#[inline]
pub(crate) fn next_storage_id() -> StorageId {
    StorageId(STORAGE_COUNTER.fetch_add(1, Ordering::SeqCst))
}

pub(crate) struct Storage {
    pub(crate) buffer: Buffer,
    /// Writeability the user asked for.
    pub(crate) writeable: bool,
    /// Live graph dependencies on this buffer.
    pub(crate) locks: usize,
}

static STORAGES: LazyLock<DashMap<StorageId, Storage>> =
    LazyLock::new(|| DashMap::with_capacity_and_shard_amount(1 << 12, 64));

pub(crate) fn insert_storage(buffer: Buffer) -> StorageId {
    let sid = next_storage_id();
    STORAGES.insert(
        sid,
        Storage {
            buffer,
            writeable: true,
            locks: 0,
        },
    );
    sid
}

pub(crate) fn remove_storage(sid: StorageId) {
    STORAGES.remove(&sid);
}

pub(crate) fn try_with_storage<R>(sid: StorageId, func: impl FnOnce(&Storage) -> R) -> Result<R> {
    let entry = STORAGES
        .get(&sid)
        .ok_or_else(|| Error::InvalidState(format!("storage {:?} is not registered", sid)))?;
    Ok(func(entry.value()))
}

pub(crate) fn try_with_storage_mut<R>(sid: StorageId, func: impl FnOnce(&mut Storage) -> R) -> Result<R> {
    let mut entry = STORAGES
        .get_mut(&sid)
        .ok_or_else(|| Error::InvalidState(format!("storage {:?} is not registered", sid)))?;
    Ok(func(entry.value_mut()))
}

/// Copies a storage's buffer into a fresh, unlocked storage.
pub(crate) fn clone_storage(sid: StorageId) -> Result<StorageId> {
    let buffer = try_with_storage(sid, |storage| storage.buffer.clone())?;
    Ok(insert_storage(buffer))
}

pub(crate) fn lock_storages(sids: &[StorageId]) -> Result<()> {
    for &sid in sids {
        try_with_storage_mut(sid, |storage| storage.locks += 1)?;
    }
    Ok(())
}

pub(crate) fn unlock_storages(sids: &[StorageId]) -> Result<()> {
    for &sid in sids {
        try_with_storage_mut(sid, |storage| storage.locks = storage.locks.saturating_sub(1))?;
    }
    Ok(())
}

/// Moves `count` locks from one storage to another.
pub(crate) fn transfer_locks(from: StorageId, to: StorageId, count: usize) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    try_with_storage_mut(from, |storage| storage.locks = storage.locks.saturating_sub(count))?;
    try_with_storage_mut(to, |storage| storage.locks += count)
}

// ────────────────────────────────────────────────────────────────────────────
//  Memory guard context
// ────────────────────────────────────────────────────────────────────────────

thread_local! {
    static MEM_GUARD: Cell<bool> = const { Cell::new(true) };
}

/// Whether operations currently lock the buffers they depend on.
pub fn is_mem_guard_active() -> bool {
    MEM_GUARD.with(|g| g.get())
}

/// Restores the previous memory-guard state when dropped.
pub struct MemGuard {
    prev: bool,
}

impl MemGuard {
    fn new(active: bool) -> Self {
        let prev = MEM_GUARD.with(|g| g.replace(active));
        Self { prev }
    }
}

impl Drop for MemGuard {
    fn drop(&mut self) {
        MEM_GUARD.with(|g| g.set(self.prev));
    }
}

/// Disables the memory guard until the returned guard is dropped.
///
/// While disabled, new operations take no buffer locks, writes ignore
/// existing locks, and read-only buffers may be written through
/// [`Tensor::set`].
pub fn mem_guard_off() -> MemGuard {
    MemGuard::new(false)
}

pub fn mem_guard_on() -> MemGuard {
    MemGuard::new(true)
}

/// Runs `func` with the memory guard disabled.
pub fn with_mem_guard_off<F, R>(func: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = mem_guard_off();
    func()
}

/// Disables the memory guard in the current lexical scope.
///
/// ### Example
/// ```rust
/// viewgrad_tensor::mem_guard_off!();
/// assert!(!viewgrad_tensor::is_mem_guard_active());
/// ```
#[macro_export]
macro_rules! mem_guard_off {
    () => {
        let _mem_guard = $crate::mem_guard_off();
    };
}

// ────────────────────────────────────────────────────────────────────────────
//  Writeability
// ────────────────────────────────────────────────────────────────────────────

/// ## Buffer writeability
///
/// * `is_writeable` – user flag and no live graph dependency
/// * `set_writeable` – user flag of the whole view family's buffer
/// * `write_raw` – graph-unaware write, subject to the memory guard
impl Tensor {
    pub fn is_writeable(&self) -> bool {
        self.try_is_writeable().unwrap_or(false)
    }

    pub fn try_is_writeable(&self) -> Result<bool> {
        let sid = try_with_node(self.id(), |node| node.storage)?;
        try_with_storage(sid, |storage| storage.writeable && storage.locks == 0)
    }

    /// Number of live graph dependencies holding this tensor's buffer.
    pub fn lock_count(&self) -> usize {
        try_with_node(self.id(), |node| node.storage)
            .and_then(|sid| try_with_storage(sid, |storage| storage.locks))
            .unwrap_or(0)
    }

    pub fn try_set_writeable(&self, writeable: bool) -> Result<()> {
        let sid = try_with_node(self.id(), |node| node.storage)?;
        try_with_storage_mut(sid, |storage| storage.writeable = writeable)
    }

    /// Runs [`try_set_writeable`](Self::try_set_writeable) and panics on failure.
    pub fn set_writeable(&self, writeable: bool) {
        self.try_set_writeable(writeable).expect("failed to set writeability")
    }

    /// Marks the buffer read-only and returns the tensor.
    pub fn read_only(self) -> Self {
        self.set_writeable(false);
        self
    }

    /// Writes `values` into the indexed region without touching the graph.
    ///
    /// With the memory guard active this fails on read-only or locked
    /// buffers. With it disabled, anything recorded on this buffer may be
    /// silently invalidated.
    pub fn try_write_raw(&self, indices: &[Index], values: &NdArray) -> Result<()> {
        let (sid, layout) = try_with_node(self.id(), |node| (node.storage, node.layout.clone()))?;
        let region = layout.index(indices)?;
        let values = values.broadcast_to(region.shape())?;
        let guarded = is_mem_guard_active();

        try_with_storage_mut(sid, |storage| {
            if guarded {
                if !storage.writeable {
                    return Err(Error::ReadOnly);
                }
                if storage.locks > 0 {
                    return Err(Error::BufferLocked { locks: storage.locks });
                }
            } else if storage.locks > 0 {
                warn!(locks = storage.locks, "raw write into a buffer with live graph dependencies");
            }
            storage.buffer.write(&region, &values)
        })?
    }

    /// Runs [`try_write_raw`](Self::try_write_raw) and panics on failure.
    pub fn write_raw(&self, indices: &[Index], values: &NdArray) {
        self.try_write_raw(indices, values).expect("failed to write tensor buffer")
    }
}
