//! Device-alias hash storage (C5): the bucket table keyed by `rdev` that
//! lets two or more vnodes which represent the same special device find
//! each other. `checkalias`/`vgone`'s chain-splice logic lives in
//! [`crate::subsystem`], since both need to call back into `vclean`;
//! this module only owns the bucket storage itself, mirroring
//! `speclisth`/`SPECHASH` in `vfs_subr.c`.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::vnode::{VnodeId, VnodeType};

/// `dev_t`: a raw device number. The original hashes this with
/// `SPECHASH`; a `BTreeMap` keyed directly on the value gives the same
/// "one chain per device" behavior without picking a bucket count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rdev(pub u64);

/// The key identifying one alias chain: a device number plus the vnode
/// type (block vs. char — the original's `checkalias` treats `VBLK` and
/// `VCHR` aliases for the same `rdev` as distinct chains).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AliasKey(pub Rdev, pub VnodeType);

impl AliasKey {
    pub fn new(rdev: Rdev, typ: VnodeType) -> Option<Self> {
        typ.is_special_device().then_some(Self(rdev, typ))
    }
}

/// The alias hash table: one ordered chain of vnode ids per
/// `(rdev, type)`. Chain order matters — `checkalias` links new aliases
/// in at the front of the bucket.
#[derive(Default)]
pub struct AliasTable {
    buckets: BTreeMap<AliasKey, Vec<VnodeId>>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The chain for `key`, in hash-bucket order (front to back).
    pub fn chain(&self, key: AliasKey) -> &[VnodeId] {
        self.buckets.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Links `vnode` at the front of `key`'s chain.
    pub fn push_front(&mut self, key: AliasKey, vnode: VnodeId) {
        self.buckets.entry(key).or_default().insert(0, vnode);
    }

    /// Removes `vnode` from `key`'s chain.
    ///
    /// # Panics
    /// If `vnode` is not present — "a special-device vnode not found in
    /// its own hash chain is a fatal invariant violation."
    pub fn remove(&mut self, key: AliasKey, vnode: VnodeId) {
        let chain = self.buckets.get_mut(&key).expect("missing bdev");
        let pos = chain
            .iter()
            .position(|&v| v == vnode)
            .expect("missing bdev");
        chain.remove(pos);
        if chain.is_empty() {
            self.buckets.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_grows_at_front_and_shrinks() {
        let mut table = AliasTable::new();
        let key = AliasKey::new(Rdev(0x0101), VnodeType::BlockDevice).unwrap();
        table.push_front(key, VnodeId(1));
        table.push_front(key, VnodeId(2));
        assert_eq!(table.chain(key), &[VnodeId(2), VnodeId(1)]);

        table.remove(key, VnodeId(2));
        assert_eq!(table.chain(key), &[VnodeId(1)]);
    }

    #[test]
    #[should_panic(expected = "missing bdev")]
    fn removing_absent_member_panics() {
        let mut table = AliasTable::new();
        let key = AliasKey::new(Rdev(1), VnodeType::CharDevice).unwrap();
        table.remove(key, VnodeId(9));
    }

    #[test]
    fn non_special_type_has_no_alias_key() {
        assert!(AliasKey::new(Rdev(1), VnodeType::Regular).is_none());
    }
}
