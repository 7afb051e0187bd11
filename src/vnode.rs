//! The vnode record (C1): the per-object state shared by every
//! filesystem entity the kernel can open, independent of which concrete
//! filesystem implements it.

use alloc::boxed::Box;
use core::any::Any;

use bitflags::bitflags;
use static_assertions::const_assert;

use crate::alias::Rdev;
use crate::list::Link;
use crate::mount::MountId;
use crate::ops::OpsHandle;

/// Index of a [`Vnode`] in a [`crate::subsystem::VnodeSubsystem`]'s
/// table. Stands in for the original's raw `struct vnode *`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VnodeId(pub u32);

const_assert!(core::mem::size_of::<VnodeId>() == 4);

/// `enum vtype`: the kind of filesystem entity a vnode represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VnodeType {
    /// `VNON`: not yet claimed by any filesystem.
    None,
    /// `VREG`.
    Regular,
    /// `VDIR`.
    Directory,
    /// `VBLK`.
    BlockDevice,
    /// `VCHR`.
    CharDevice,
    /// `VLNK`.
    Symlink,
    /// `VSOCK`.
    Socket,
    /// `VFIFO`.
    Fifo,
    /// `VBAD`: fully retired; eligible for immediate reuse.
    Bad,
}

impl VnodeType {
    /// Whether this type denotes a special (block/char) device, i.e.
    /// whether it participates in the device-alias hash.
    pub fn is_special_device(self) -> bool {
        matches!(self, VnodeType::BlockDevice | VnodeType::CharDevice)
    }
}

/// `enum vtagtype`: which filesystem claimed this vnode. `None` until a
/// filesystem installs its own tag via `getnewvnode`/`checkalias`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    None,
    Fs(u16),
}

impl Tag {
    pub fn is_claimed(self) -> bool {
        !matches!(self, Tag::None)
    }
}

bitflags! {
    /// `v_flag`. Bit meanings follow `vfs_subr.c`/`vnode.h` exactly.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VnodeFlags: u16 {
        /// This vnode is the root of its filesystem.
        const ROOT     = 1 << 0;
        /// Text (program image) is in use from this vnode.
        const TEXT     = 1 << 1;
        /// Teardown (`vclean`) is in progress; see invariant 2.
        const XLOCK    = 1 << 2;
        /// A thread is waiting for `XLOCK` to clear.
        const XWANT    = 1 << 3;
        /// Exclusive content lock held.
        const EXLOCK   = 1 << 4;
        /// Shared content lock held.
        const SHLOCK   = 1 << 5;
        /// A thread is waiting on the content lock.
        const LWAIT    = 1 << 6;
        /// This special-device vnode shares its `(rdev, type)` with at
        /// least one other vnode.
        const ALIASED  = 1 << 7;
        /// A thread is waiting on a buffer I/O completion.
        const BWAIT    = 1 << 8;
    }
}

/// `struct specinfo`: per-device state owned by a special-device vnode.
/// The original allocates this with `MALLOC`/frees it with `FREE`; here
/// it is just an owned field, freed by dropping it in `vgone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecInfo {
    pub rdev: Rdev,
}

/// `struct vnode`.
pub struct Vnode {
    pub typ: VnodeType,
    pub tag: Tag,
    pub op: OpsHandle,
    pub flag: VnodeFlags,

    /// References that keep this vnode out of the freelist.
    pub usecount: i32,
    /// Soft holds from the buffer/page cache.
    pub holdcnt: i32,

    pub mount: Option<MountId>,
    pub(crate) mount_link: Link<VnodeId>,
    pub(crate) free_link: Link<VnodeId>,

    /// `v_mountedhere`: the filesystem mounted on top of this (directory)
    /// vnode, if any. Distinct from `mount`, which names the filesystem
    /// this vnode itself belongs to.
    pub mounted_here: Option<MountId>,

    /// `v_specinfo`/`v_rdev`: only populated while `typ` is a special
    /// device. Chain membership itself (`v_hashchain`/`v_specnext`) is
    /// owned by `AliasTable`'s own per-bucket vector, not by a link field
    /// here — alias chains are short enough that an arena-index list
    /// buys nothing over storing the bucket as a `Vec<VnodeId>`.
    pub specinfo: Option<SpecInfo>,

    /// Per-filesystem private data, opaque to the core.
    pub private: Option<Box<dyn Any>>,
}

impl Vnode {
    pub(crate) fn new_bad(dead_ops: OpsHandle) -> Self {
        Self {
            typ: VnodeType::Bad,
            tag: Tag::None,
            op: dead_ops,
            flag: VnodeFlags::empty(),
            usecount: 0,
            holdcnt: 0,
            mount: None,
            mount_link: Link::new(),
            free_link: Link::new(),
            mounted_here: None,
            specinfo: None,
            private: None,
        }
    }

    /// Whether this vnode currently sits on the freelist (invariant 1:
    /// `usecount == 0 <=> on-freelist`; the subsystem is responsible for
    /// keeping `free_link` consistent with `usecount`).
    pub fn is_freelisted(&self) -> bool {
        self.usecount == 0
    }
}

impl core::fmt::Debug for Vnode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Vnode")
            .field("typ", &self.typ)
            .field("tag", &self.tag)
            .field("flag", &self.flag)
            .field("usecount", &self.usecount)
            .field("holdcnt", &self.holdcnt)
            .field("mount", &self.mount)
            .field("mounted_here", &self.mounted_here)
            .field("specinfo", &self.specinfo)
            .finish()
    }
}

/// `vattr_null`: resets a vnode-attribute struct to the "don't care"
/// sentinel in every field, exactly as `vfs_subr.c` does before a
/// filesystem fills in the fields it actually supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VAttr {
    pub va_type: VnodeType,
    pub va_mode: i64,
    pub va_nlink: i64,
    pub va_uid: i64,
    pub va_gid: i64,
    pub va_fsid: i64,
    pub va_fileid: i64,
    pub va_size: i64,
    pub va_blocksize: i64,
    pub va_rdev: i64,
    pub va_bytes: i64,
    pub va_atime: (i64, i64),
    pub va_mtime: (i64, i64),
    pub va_ctime: (i64, i64),
    pub va_flags: i64,
    pub va_gen: i64,
}

/// Sentinel written into every "don't care" field by [`vattr_null`].
pub const VNOVAL: i64 = -1;

impl VAttr {
    pub fn null() -> Self {
        let mut v = Self {
            va_type: VnodeType::None,
            va_mode: VNOVAL,
            va_nlink: VNOVAL,
            va_uid: VNOVAL,
            va_gid: VNOVAL,
            va_fsid: VNOVAL,
            va_fileid: VNOVAL,
            va_size: VNOVAL,
            va_blocksize: VNOVAL,
            va_rdev: VNOVAL,
            va_bytes: VNOVAL,
            va_atime: (VNOVAL, VNOVAL),
            va_mtime: (VNOVAL, VNOVAL),
            va_ctime: (VNOVAL, VNOVAL),
            va_flags: VNOVAL,
            va_gen: VNOVAL,
        };
        vattr_null(&mut v);
        v
    }
}

/// Free function mirroring the original's `vattr_null(vap)` signature,
/// for callers that hold an existing `VAttr` they want to reset in
/// place rather than constructing a fresh one.
pub fn vattr_null(vap: &mut VAttr) {
    vap.va_type = VnodeType::None;
    vap.va_mode = VNOVAL;
    vap.va_nlink = VNOVAL;
    vap.va_uid = VNOVAL;
    vap.va_gid = VNOVAL;
    vap.va_fsid = VNOVAL;
    vap.va_fileid = VNOVAL;
    vap.va_size = VNOVAL;
    vap.va_blocksize = VNOVAL;
    vap.va_rdev = VNOVAL;
    vap.va_bytes = VNOVAL;
    vap.va_atime = (VNOVAL, VNOVAL);
    vap.va_mtime = (VNOVAL, VNOVAL);
    vap.va_ctime = (VNOVAL, VNOVAL);
    vap.va_flags = VNOVAL;
    vap.va_gen = VNOVAL;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vattr_null_sets_every_field_to_sentinel() {
        let va = VAttr::null();
        assert_eq!(va.va_type, VnodeType::None);
        assert_eq!(va.va_mode, VNOVAL);
        assert_eq!(va.va_gen, VNOVAL);
        assert_eq!(va.va_atime, (VNOVAL, VNOVAL));
    }

    #[test]
    fn special_device_classification() {
        assert!(VnodeType::BlockDevice.is_special_device());
        assert!(VnodeType::CharDevice.is_special_device());
        assert!(!VnodeType::Regular.is_special_device());
        assert!(!VnodeType::Bad.is_special_device());
    }
}
