//! The vnode freelist (C2): a doubly linked LRU of unused
//! (`usecount == 0`) vnodes, supplying recycled slots to `getnewvnode`.
//!
//! Three operations beyond plain list push/pop earn this its own
//! module instead of being a bare [`crate::list::IntrusiveList`]:
//! `push_tail`'s empty-list special case (an "Open Question" in the base
//! spec, implemented bit-exact — see DESIGN.md), `move_to_head` (used by
//! `vgone` to prioritize reclaimed slots for reuse), and `detach` (used
//! by `vget` reviving a freelisted vnode without changing its position
//! semantics elsewhere).

use crate::list::{IntrusiveList, Link};
use crate::vnode::VnodeId;

/// Accessors a caller must supply so this module can manipulate link
/// state that actually lives on each `Vnode` in the subsystem's table.
pub trait FreelistHost {
    fn link(&self, vnode: VnodeId) -> Link<VnodeId>;
    fn set_link(&mut self, vnode: VnodeId, link: Link<VnodeId>);
}

#[derive(Default)]
pub struct Freelist {
    list: IntrusiveList<VnodeId>,
}

impl Freelist {
    pub fn new() -> Self {
        Self {
            list: IntrusiveList::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn head(&self) -> Option<VnodeId> {
        self.list.head()
    }

    /// Pops the least-recently-released vnode. `None` if the freelist
    /// is empty (`getnewvnode`'s `table-full`/`ENFILE` case).
    pub fn pop_head(&mut self, host: &mut impl FreelistHost) -> Option<VnodeId> {
        let head = self.list.head()?;
        self.detach(head, host);
        Some(head)
    }

    /// `vrele`'s append: push to the tail, except that pushing into an
    /// empty list makes the pushed vnode the head too (the original's
    /// `if (vfreeh == NULL) { vfreeh = vp; ... } else { *vfreet = vp;
    /// ... }` — the same thing `IntrusiveList::push_back` already does,
    /// named here to keep the "open question" callout attached to the
    /// call site that matters).
    pub fn push_tail(&mut self, vnode: VnodeId, host: &mut impl FreelistHost) {
        let list = &mut self.list;
        list.push_back(
            vnode,
            |k, l| host.set_link(k, l),
            |k, n| {
                let mut l = host.link(k);
                l.next = n;
                host.set_link(k, l);
            },
        );
    }

    /// `vgone`'s reuse-soonest policy: if `vnode` is on the freelist,
    /// move it to the head so it is the next slot `getnewvnode` hands
    /// out.
    pub fn move_to_head(&mut self, vnode: VnodeId, host: &mut impl FreelistHost) {
        let link = host.link(vnode);
        if !link.is_linked() && self.list.head() != Some(vnode) {
            return;
        }
        self.detach(vnode, host);
        let list = &mut self.list;
        list.push_front(
            vnode,
            |k, l| host.set_link(k, l),
            |k, p| {
                let mut l = host.link(k);
                l.prev = p;
                host.set_link(k, l);
            },
        );
    }

    /// `vget`'s "if `usecount == 0`, splice it out of the freelist"
    /// step, also used by [`Self::pop_head`]/[`Self::move_to_head`].
    pub fn detach(&mut self, vnode: VnodeId, host: &mut impl FreelistHost) {
        let link = host.link(vnode);
        let list = &mut self.list;
        list.unlink(
            vnode,
            link,
            |k, n| {
                let mut l = host.link(k);
                l.next = n;
                host.set_link(k, l);
            },
            |k, p| {
                let mut l = host.link(k);
                l.prev = p;
                host.set_link(k, l);
            },
        );
        host.set_link(vnode, Link::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestHost(HashMap<VnodeId, Link<VnodeId>>);
    impl FreelistHost for TestHost {
        fn link(&self, vnode: VnodeId) -> Link<VnodeId> {
            self.0.get(&vnode).copied().unwrap_or_default()
        }
        fn set_link(&mut self, vnode: VnodeId, link: Link<VnodeId>) {
            self.0.insert(vnode, link);
        }
    }

    fn drain(list: &Freelist, host: &TestHost) -> Vec<VnodeId> {
        let mut out = vec![];
        let mut cur = list.list.head();
        while let Some(v) = cur {
            out.push(v);
            cur = host.link(v).next;
        }
        out
    }

    #[test]
    fn lru_pop_and_push() {
        let mut host = TestHost::default();
        let mut fl = Freelist::new();
        fl.push_tail(VnodeId(1), &mut host);
        fl.push_tail(VnodeId(2), &mut host);
        fl.push_tail(VnodeId(3), &mut host);
        assert_eq!(fl.pop_head(&mut host), Some(VnodeId(1)));
        assert_eq!(drain(&fl, &host), vec![VnodeId(2), VnodeId(3)]);
    }

    #[test]
    fn move_to_head_reprioritizes() {
        let mut host = TestHost::default();
        let mut fl = Freelist::new();
        fl.push_tail(VnodeId(1), &mut host);
        fl.push_tail(VnodeId(2), &mut host);
        fl.push_tail(VnodeId(3), &mut host);
        fl.move_to_head(VnodeId(3), &mut host);
        assert_eq!(drain(&fl, &host), vec![VnodeId(3), VnodeId(1), VnodeId(2)]);
    }

    #[test]
    fn pop_on_empty_list_is_none() {
        let mut host = TestHost::default();
        let mut fl = Freelist::new();
        assert_eq!(fl.pop_head(&mut host), None);
    }
}
