//! The mount registry (C3): a circular list of mounted filesystems, plus
//! `vfs_lock`/`vfs_unlock`/`vfs_remove`/`getvfs` lookup by filesystem id.

use alloc::vec::Vec;

use crate::error::Error;
use crate::list::Link;
use crate::vnode::VnodeId;

/// Index of a [`Mount`] in a [`MountRegistry`]. Stands in for `struct
/// mount *`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MountId(pub u32);

/// `fsid_t`: a two-word filesystem identifier, unique among currently
/// mounted filesystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FsId(pub u32, pub u32);

bitflags::bitflags! {
    /// `m_flag`: `MLOCK`/`MWAIT`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MountFlags: u8 {
        const MLOCK = 1 << 0;
        const MWAIT = 1 << 1;
    }
}

/// `struct mount`.
pub struct Mount {
    pub fsid: FsId,
    pub flag: MountFlags,
    /// `m_vnodecovered`: the directory vnode in the parent filesystem
    /// this mount is attached over. `None` only for the root mount.
    pub covered: Option<VnodeId>,
    pub(crate) ring_link: Link<MountId>,
    /// Head of this mount's per-mount vnode list (C4); maintained by
    /// [`crate::subsystem::VnodeSubsystem::insmntque`].
    pub(crate) vnode_head: Option<VnodeId>,
}

impl Mount {
    fn new(fsid: FsId, covered: Option<VnodeId>) -> Self {
        Self {
            fsid,
            flag: MountFlags::empty(),
            covered,
            ring_link: Link::new(),
            vnode_head: None,
        }
    }
}

/// `vfreeh`-style global reduced to one owned value: the non-empty
/// circular list of mounted filesystems, anchored at the root.
pub struct MountRegistry {
    mounts: Vec<Mount>,
    root: MountId,
}

impl MountRegistry {
    /// Creates a registry anchored at a freshly created root mount.
    pub fn new(root_fsid: FsId) -> (Self, MountId) {
        let root_mount = Mount::new(root_fsid, None);
        let mut reg = Self {
            mounts: Vec::new(),
            root: MountId(0),
        };
        reg.mounts.push(root_mount);
        let root = MountId(0);
        reg.mounts[0].ring_link = Link {
            prev: Some(root),
            next: Some(root),
        };
        (reg, root)
    }

    pub fn root(&self) -> MountId {
        self.root
    }

    pub fn get(&self, id: MountId) -> &Mount {
        &self.mounts[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: MountId) -> &mut Mount {
        &mut self.mounts[id.0 as usize]
    }

    /// Inserts a freshly mounted filesystem into the ring, just before
    /// the root (i.e. at the "tail" of the ring as seen from root).
    pub fn insert(&mut self, fsid: FsId, covered: VnodeId) -> MountId {
        let id = MountId(self.mounts.len() as u32);
        self.mounts.push(Mount::new(fsid, Some(covered)));

        let root_prev = self.mounts[self.root.0 as usize].ring_link.prev.unwrap();
        self.mounts[id.0 as usize].ring_link = Link {
            prev: Some(root_prev),
            next: Some(self.root),
        };
        self.mounts[root_prev.0 as usize].ring_link.next = Some(id);
        self.mounts[self.root.0 as usize].ring_link.prev = Some(id);
        id
    }

    /// `vfs_remove`: splices `mp` out of the ring and clears the
    /// coverage back-pointer in its parent directory vnode (returned to
    /// the caller, since clearing `v_mountedhere` is a `Vnode` field the
    /// subsystem owns, not this module).
    ///
    /// # Panics
    /// If `mp` is the root mount — unmounting the root is forbidden.
    pub fn remove(&mut self, mp: MountId) -> Option<VnodeId> {
        assert_ne!(mp, self.root, "vfs_remove: unmounting root");
        let link = self.mounts[mp.0 as usize].ring_link;
        let prev = link.prev.unwrap();
        let next = link.next.unwrap();
        self.mounts[prev.0 as usize].ring_link.next = Some(next);
        self.mounts[next.0 as usize].ring_link.prev = Some(prev);
        self.mounts[mp.0 as usize].ring_link = Link::new();
        self.mounts[mp.0 as usize].covered.take()
    }

    /// `getvfs`: walks the ring once looking for a matching `fsid`.
    pub fn find_by_fsid(&self, fsid: FsId) -> Option<MountId> {
        let mut cur = self.root;
        loop {
            if self.mounts[cur.0 as usize].fsid == fsid {
                return Some(cur);
            }
            let next = self.mounts[cur.0 as usize].ring_link.next.unwrap();
            if next == self.root {
                return None;
            }
            cur = next;
        }
    }

    /// `vfs_lock`: sets `MLOCK`, or raises `MWAIT` and reports
    /// [`Error::MountWouldBlock`] if already locked.
    pub fn lock(&mut self, mp: MountId) -> Result<(), Error> {
        let m = &mut self.mounts[mp.0 as usize];
        if m.flag.contains(MountFlags::MLOCK) {
            m.flag.insert(MountFlags::MWAIT);
            return Err(Error::MountWouldBlock);
        }
        m.flag.insert(MountFlags::MLOCK);
        Ok(())
    }

    /// `vfs_unlock`: clears `MLOCK` and, if a waiter was recorded, wakes
    /// it (the caller is expected to retry [`Self::lock`]).
    ///
    /// # Panics
    /// If `mp` is not currently locked: "locking is not reentrant and
    /// attempting to unlock an unlocked mount is a fatal invariant
    /// violation."
    pub fn unlock(&mut self, mp: MountId) -> bool {
        let m = &mut self.mounts[mp.0 as usize];
        assert!(m.flag.contains(MountFlags::MLOCK), "vfs_unlock: locked fs");
        m.flag.remove(MountFlags::MLOCK);
        if m.flag.contains(MountFlags::MWAIT) {
            m.flag.remove(MountFlags::MWAIT);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_lookup_and_removal() {
        let (mut reg, root) = MountRegistry::new(FsId(1, 1));
        let m0 = reg.insert(FsId(7, 7), VnodeId(100));
        let m1 = reg.insert(FsId(9, 9), VnodeId(101));

        assert_eq!(reg.find_by_fsid(FsId(9, 9)), Some(m1));
        reg.remove(m1);
        assert_eq!(reg.find_by_fsid(FsId(9, 9)), None);
        assert_eq!(reg.find_by_fsid(FsId(7, 7)), Some(m0));
        assert_eq!(root, reg.root());
    }

    #[test]
    #[should_panic(expected = "unmounting root")]
    fn removing_root_panics() {
        let (mut reg, root) = MountRegistry::new(FsId(1, 1));
        reg.remove(root);
    }

    #[test]
    fn lock_unlock_wait_protocol() {
        let (mut reg, root) = MountRegistry::new(FsId(1, 1));
        reg.lock(root).unwrap();
        assert!(matches!(reg.lock(root), Err(Error::MountWouldBlock)));
        let had_waiter = reg.unlock(root);
        assert!(had_waiter);
    }

    #[test]
    #[should_panic(expected = "vfs_unlock: locked fs")]
    fn double_unlock_panics() {
        let (mut reg, root) = MountRegistry::new(FsId(1, 1));
        reg.unlock(root);
    }
}
