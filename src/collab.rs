//! External collaborators the core calls into but does not implement:
//! the scheduler's sleep/wakeup primitive and the buffer cache's
//! invalidate hook. The name cache and credential collaborators live in
//! [`crate::lookup`], next to the name-lookup context that is their
//! main client.

use crate::vnode::VnodeId;

/// A channel a thread can sleep on and another thread can wake. The
/// original identifies channels by address (`sleep((caddr_t)vp, ...)`);
/// here a vnode or mount id already is a stable, comparable identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitChannel {
    Vnode(VnodeId),
    Mount(crate::mount::MountId),
}

/// The cooperative scheduler primitive consumed (not implemented) by
/// the core. This core treats every suspension point as an immediate
/// typed error rather than actually blocking, so [`NullScheduler`] below
/// is a legitimate host: there is never anything for it to do.
pub trait Scheduler {
    fn sleep(&mut self, channel: WaitChannel);
    fn wakeup(&mut self, channel: WaitChannel);
}

/// A scheduler that does nothing — appropriate for a host that has
/// already decided to treat every suspension point as a retryable
/// error, as this crate does.
#[derive(Debug, Default)]
pub struct NullScheduler;

impl Scheduler for NullScheduler {
    fn sleep(&mut self, _channel: WaitChannel) {}
    fn wakeup(&mut self, _channel: WaitChannel) {}
}

/// `vinvalbuf`: invalidate cached buffer-cache content for a vnode.
/// Called by `vclean` when `doclose` is set.
pub trait BufferCache {
    fn invalidate(&mut self, vnode: VnodeId, flags: i32);
}

/// A buffer cache that holds nothing, for hosts/tests with no real
/// buffer layer underneath this core.
#[derive(Debug, Default)]
pub struct NullBufferCache;

impl BufferCache for NullBufferCache {
    fn invalidate(&mut self, _vnode: VnodeId, _flags: i32) {}
}
