//! The per-filesystem operation vector.
//!
//! The core invokes filesystem behavior purely by name, through this
//! trait, without knowing (or caring) which concrete filesystem backs
//! any given vnode — the same role `struct vnodeops` plays in
//! `vfs_subr.c`. [`DeadOps`] is the vector installed by `vclean`: every
//! entry reports that the vnode is no longer usable, so a caller that
//! raced the teardown observes a clean failure rather than touching
//! freed or reused state.

use alloc::rc::Rc;

use crate::error::{Error, FsError};
use crate::vnode::VnodeId;

/// Flags passed to [`VnodeOps::close`], mirroring the file-open flags
/// the original passes through to `vn_close`.
pub type CloseFlags = i32;

/// Stand-in for the credential pointer `vn_close` receives (`NOCRED` in
/// the original when closing during reclaim). The core never interprets
/// this value.
pub type Cred = u32;

/// The operation vector a filesystem installs on every vnode it owns.
///
/// Contract: `reclaim` must release all filesystem-private state
/// attached to the vnode and is called exactly once per vnode lifetime,
/// from [`crate::subsystem::VnodeSubsystem::vclean`].
pub trait VnodeOps {
    /// Acquire the vnode's content lock.
    fn lock(&self, vnode: VnodeId) -> Result<(), Error>;

    /// Release the vnode's content lock.
    fn unlock(&self, vnode: VnodeId) -> Result<(), Error>;

    /// Called when `usecount` drops to zero; last chance to flush
    /// cached state before the vnode becomes freelistable.
    fn inactive(&self, vnode: VnodeId) -> Result<(), Error>;

    /// Called once, during `vclean`, to release filesystem-private
    /// data. A failure here is fatal to the caller (there is no defined
    /// recovery path).
    fn reclaim(&self, vnode: VnodeId) -> Result<(), FsError>;

    /// Called for an active vnode during a closing `vclean`.
    fn close(&self, vnode: VnodeId, flags: CloseFlags, cred: Cred) -> Result<(), Error>;

    /// Diagnostic dump, analogous to the original's `vn_print`.
    fn print(&self, vnode: VnodeId);
}

/// The operation vector every reclaimed ("dead") vnode is switched to.
///
/// Installing this is the type-safe substitute for "this object has
/// been destroyed but we haven't freed the memory yet": late callers
/// that still hold a reference to a vnode observe a clean error from
/// every entry point instead of undefined behavior.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeadOps;

const DEAD: FsError = FsError("vnode is dead");

impl VnodeOps for DeadOps {
    fn lock(&self, _vnode: VnodeId) -> Result<(), Error> {
        Err(Error::Fs(DEAD))
    }

    fn unlock(&self, _vnode: VnodeId) -> Result<(), Error> {
        Err(Error::Fs(DEAD))
    }

    fn inactive(&self, _vnode: VnodeId) -> Result<(), Error> {
        Err(Error::Fs(DEAD))
    }

    fn reclaim(&self, _vnode: VnodeId) -> Result<(), FsError> {
        Err(DEAD)
    }

    fn close(&self, _vnode: VnodeId, _flags: CloseFlags, _cred: Cred) -> Result<(), Error> {
        Err(Error::Fs(DEAD))
    }

    fn print(&self, vnode: VnodeId) {
        log::trace!("vnode {vnode:?}: dead");
    }
}

/// A shared, swappable handle to an operation vector. `Rc` (not `Arc`):
/// the subsystem is single-threaded cooperative, with no concurrent
/// access to guard against.
pub type OpsHandle = Rc<dyn VnodeOps>;
