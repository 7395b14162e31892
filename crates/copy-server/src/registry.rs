//! In-flight operation registry.
//!
//! Operations are indexed by destination path (admission: at most one
//! in-flight copy per path) and, for multipart copies, by copy id (routing
//! of chunk and complete requests). Both indexes live behind one lock, so
//! check-and-insert is a single atomic step and a multipart op is never
//! visible under one key but not the other.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chunkcopy_protocol::CopyId;

/// Lifecycle of a multipart copy. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MultipartState {
    Initializing = 0,
    /// Copy id assigned; chunks may arrive.
    Initiated = 1,
    /// A complete request is stitching the parts.
    Completing = 2,
    Completed = 3,
}

impl MultipartState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Initializing,
            1 => Self::Initiated,
            2 => Self::Completing,
            _ => Self::Completed,
        }
    }
}

/// Handle for one in-flight multipart copy.
#[derive(Debug)]
pub struct MultipartOp {
    copy_id: CopyId,
    path: String,
    scratch_dir: PathBuf,
    state: AtomicU8,
    completed_parts: AtomicU64,
}

impl MultipartOp {
    fn new(copy_id: CopyId, path: String, scratch_root: &Path) -> Self {
        Self {
            copy_id,
            scratch_dir: scratch_root.join(copy_id.to_string()),
            path,
            state: AtomicU8::new(MultipartState::Initializing as u8),
            completed_parts: AtomicU64::new(0),
        }
    }

    pub fn copy_id(&self) -> CopyId {
        self.copy_id
    }

    /// Destination path of the stitched file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Directory holding this copy's chunk files.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn state(&self) -> MultipartState {
        MultipartState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of chunks written so far.
    pub fn completed_parts(&self) -> u64 {
        self.completed_parts.load(Ordering::Acquire)
    }

    /// Counts one more chunk as written. Returns the new total.
    pub fn record_part(&self) -> u64 {
        self.completed_parts.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Moves INITIATED -> COMPLETING. Returns `false` if another complete
    /// request got there first.
    pub fn begin_completion(&self) -> bool {
        self.transition(MultipartState::Initiated, MultipartState::Completing)
    }

    /// Moves COMPLETING -> COMPLETED.
    pub fn mark_completed(&self) -> bool {
        self.transition(MultipartState::Completing, MultipartState::Completed)
    }

    fn transition(&self, from: MultipartState, to: MultipartState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[derive(Debug, Clone)]
enum Operation {
    Single,
    Multipart(Arc<MultipartOp>),
}

#[derive(Debug, Default)]
struct RegistryInner {
    by_path: HashMap<String, Operation>,
    by_id: HashMap<CopyId, Arc<MultipartOp>>,
}

/// Concurrent map of in-flight copies.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    inner: Mutex<RegistryInner>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admits a single copy to `path` if no other copy targets it.
    ///
    /// The returned guard deregisters the path when dropped, so the entry
    /// is removed exactly once whether the copy succeeds or fails.
    pub fn admit_single(&self, path: &str) -> Option<SingleCopyGuard<'_>> {
        let mut inner = self.lock();
        match inner.by_path.entry(path.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Operation::Single);
                Some(SingleCopyGuard {
                    registry: self,
                    path: path.to_string(),
                })
            }
        }
    }

    /// Registers a new multipart copy to `path` under a fresh copy id.
    ///
    /// Returns `None` if another copy already targets `path`. The returned
    /// op is in the INITIATED state.
    pub fn begin_multipart(&self, path: &str, scratch_root: &Path) -> Option<Arc<MultipartOp>> {
        let mut inner = self.lock();
        let RegistryInner { by_path, by_id } = &mut *inner;

        let slot = match by_path.entry(path.to_string()) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(slot) => slot,
        };

        let mut copy_id = CopyId::new_random();
        while by_id.contains_key(&copy_id) {
            copy_id = CopyId::new_random();
        }

        let op = Arc::new(MultipartOp::new(copy_id, path.to_string(), scratch_root));
        slot.insert(Operation::Multipart(Arc::clone(&op)));
        by_id.insert(copy_id, Arc::clone(&op));
        op.transition(MultipartState::Initializing, MultipartState::Initiated);

        Some(op)
    }

    /// Looks up an in-flight multipart copy.
    pub fn multipart(&self, copy_id: &CopyId) -> Option<Arc<MultipartOp>> {
        self.lock().by_id.get(copy_id).cloned()
    }

    /// Removes a multipart copy from both indexes.
    ///
    /// Returns `false` if it was already removed.
    pub fn finish_multipart(&self, op: &MultipartOp) -> bool {
        let mut inner = self.lock();
        let removed = inner.by_id.remove(&op.copy_id).is_some();
        if removed {
            let owned_by_op = matches!(
                inner.by_path.get(&op.path),
                Some(Operation::Multipart(registered)) if registered.copy_id == op.copy_id
            );
            if owned_by_op {
                inner.by_path.remove(&op.path);
            }
        }
        removed
    }

    /// Whether any copy currently targets `path`.
    pub fn is_path_busy(&self, path: &str) -> bool {
        self.lock().by_path.contains_key(path)
    }

    /// Number of in-flight copies (single and multipart).
    pub fn len(&self) -> usize {
        self.lock().by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of in-flight multipart copies.
    pub fn multipart_count(&self) -> usize {
        self.lock().by_id.len()
    }

    fn release_single(&self, path: &str) {
        let mut inner = self.lock();
        if matches!(inner.by_path.get(path), Some(Operation::Single)) {
            inner.by_path.remove(path);
        }
    }
}

/// Registration of an in-flight single copy; deregisters on drop.
#[derive(Debug)]
pub struct SingleCopyGuard<'a> {
    registry: &'a OperationRegistry,
    path: String,
}

impl SingleCopyGuard<'_> {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for SingleCopyGuard<'_> {
    fn drop(&mut self) {
        self.registry.release_single(&self.path);
    }
}
