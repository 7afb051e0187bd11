//! Error categories surfaced by the core.
//!
//! Invariant violations (freelist underflow, double `vclean`, a missing
//! alias entry, a failed `reclaim`, ...) are not represented here: they are
//! programmer errors on the caller's part and are reported via `panic!`
//! at the point of detection, matching the fatal treatment `vfs_subr.c`
//! gives them.

use core::fmt;

/// Recoverable failures the core can return to a caller.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// `getnewvnode` found the freelist empty (`ENFILE`-equivalent).
    #[error("vnode table is full")]
    TableFull,

    /// `vflush` without `force` found at least one busy vnode
    /// (`EBUSY`-equivalent).
    #[error("mount point is busy")]
    Busy,

    /// A caller tried to act on a vnode that is mid-teardown (`xlock` is
    /// set). The core has raised `xwant` and "slept"; the caller must
    /// not use the vnode and should re-resolve whatever named it.
    #[error("vnode is locked for teardown, retry after it settles")]
    WouldBlock,

    /// A caller tried to lock a mount that is already locked. The core
    /// has raised `MWAIT` and "slept"; the caller should retry.
    #[error("mount is locked, retry after it unlocks")]
    MountWouldBlock,

    /// The underlying filesystem's operation vector reported a failure.
    /// Surfaced unchanged, except for `reclaim`, whose failure is fatal.
    #[error("filesystem operation failed: {0}")]
    Fs(FsError),
}

/// Opaque error value returned by a [`crate::ops::VnodeOps`] callback.
///
/// The core never interprets this value; it only propagates it. Hosts
/// implementing `VnodeOps` can stash whatever detail they need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsError(pub &'static str);

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<FsError> for Error {
    fn from(e: FsError) -> Self {
        Error::Fs(e)
    }
}
