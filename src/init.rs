//! Boot-time assembly (C9): builds a [`VnodeSubsystem`] and walks the
//! filesystem-switch table, mirroring `vfsinit`'s "thread every
//! preallocated slot into the free chain, then call each registered
//! filesystem's init hook" sequence. Table construction and freelist
//! threading live on [`VnodeSubsystem::new`] itself (so tests can build
//! a subsystem without a switch table); this module adds the
//! filesystem-switch walk on top.

use alloc::vec::Vec;

use crate::collab::{BufferCache, Scheduler};
use crate::lookup::NameCache;
use crate::mount::{FsId, MountId};
use crate::ops::OpsHandle;
use crate::subsystem::{VnodeSubsystem, VnodeSubsystemConfig};

/// One entry in the filesystem-switch table (`struct vfsops` plus its
/// name, as `vfssw[]` holds in the original).
pub struct FsTypeDescriptor<S: Scheduler, N: NameCache, B: BufferCache> {
    pub name: &'static str,
    /// `None` for a filesystem type with no one-time setup, matching
    /// `vfsinit`'s "skipping null entries".
    pub init: Option<fn(&mut VnodeSubsystem<S, N, B>)>,
}

/// `vfssw[]`: the ordered set of registered filesystem types.
pub struct FsSwitch<S: Scheduler, N: NameCache, B: BufferCache> {
    entries: Vec<FsTypeDescriptor<S, N, B>>,
}

impl<S: Scheduler, N: NameCache, B: BufferCache> FsSwitch<S, N, B> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, entry: FsTypeDescriptor<S, N, B>) {
        self.entries.push(entry);
    }
}

impl<S: Scheduler, N: NameCache, B: BufferCache> Default for FsSwitch<S, N, B> {
    fn default() -> Self {
        Self::new()
    }
}

/// `vfsinit`: build the table and freelist, then invoke every
/// registered filesystem's init hook in registration order.
pub fn vfsinit<S: Scheduler, N: NameCache, B: BufferCache>(
    config: VnodeSubsystemConfig,
    root_fsid: FsId,
    dead_ops: OpsHandle,
    spec_ops: OpsHandle,
    scheduler: S,
    name_cache: N,
    buffer_cache: B,
    switch: &FsSwitch<S, N, B>,
) -> (VnodeSubsystem<S, N, B>, MountId) {
    let (mut subsystem, root) = VnodeSubsystem::new(
        config,
        root_fsid,
        dead_ops,
        spec_ops,
        scheduler,
        name_cache,
        buffer_cache,
    );

    for entry in &switch.entries {
        match entry.init {
            Some(init) => {
                log::debug!("vfsinit: initializing filesystem {}", entry.name);
                init(&mut subsystem);
            }
            None => log::debug!("vfsinit: filesystem {} has no init hook", entry.name),
        }
    }

    (subsystem, root)
}
