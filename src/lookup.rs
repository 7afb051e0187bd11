//! Name-lookup context (C8): the thin struct that carries the vnode
//! references and credentials a pathname lookup is working with.
//! `ndinit`/`nddup`/`ndrele` are tightly coupled to vnode lifetime (every
//! reference a context holds contributes to the target vnode's
//! `usecount`), which is why they live in this crate rather than in the
//! (out of scope) name-resolution layer itself.

use crate::vnode::VnodeId;

/// `cache_purge`: the name cache lives outside this core as an injected
/// collaborator; the core only needs to tell it a vnode is going away.
pub trait NameCache {
    fn purge(&mut self, vnode: VnodeId);
}

/// A name cache that remembers nothing, for hosts/tests with no real
/// name cache underneath this core.
#[derive(Debug, Default)]
pub struct NullNameCache;

impl NameCache for NullNameCache {
    fn purge(&mut self, _vnode: VnodeId) {}
}

/// `crhold`/`crfree`: a credential handle the core reference-counts on
/// the caller's behalf but never interprets. Hosts provide their own
/// `Credential` type; `hold` should behave like `Clone` plus whatever
/// bookkeeping `crhold` does, and a `Credential` should release its
/// share of the underlying credential when dropped (standing in for
/// `crfree`).
pub trait Credential: Sized {
    fn hold(&self) -> Self;
}

/// Direction of the scratch I/O vector a [`NameLookupContext`] presets,
/// mirroring `ni_rw`'s `UIO_READ`/`UIO_WRITE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoDirection {
    Read,
    Write,
}

/// Address space the scratch I/O vector is tagged with, mirroring
/// `ni_uioseg`'s `UIO_USERSPACE`/`UIO_SYSSPACE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSpace {
    User,
    System,
}

/// `struct nameidata`, restricted to the fields this core is
/// responsible for keeping balanced: the vnode references and the
/// credential handle. The direntry scratch buffer and path string live
/// in the (out-of-scope) name-resolution layer.
pub struct NameLookupContext<C: Credential> {
    pub current_dir: Option<VnodeId>,
    pub root_dir: Option<VnodeId>,
    pub cred: Option<C>,
    pub direction: IoDirection,
    pub address_space: AddressSpace,
}

impl<C: Credential> NameLookupContext<C> {
    /// `ndinit`: a zero-cleared context preset for a write-out of a
    /// name, in kernel (system) address space.
    pub fn init() -> Self {
        Self {
            current_dir: None,
            root_dir: None,
            cred: None,
            direction: IoDirection::Write,
            address_space: AddressSpace::System,
        }
    }
}
