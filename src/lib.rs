//! Vnode management core: the table, freelist, mount registry,
//! device-alias hash, and teardown protocol that sit between the
//! filesystem-independent upper kernel and the filesystem-dependent
//! lower layer of a UNIX-style VFS.
//!
//! This crate owns allocation, reference counting, per-mount membership,
//! device aliasing, and orderly reclaim of vnodes. It does not implement
//! any concrete filesystem, perform name resolution, or cache file data;
//! those are external collaborators reached through the traits in
//! [`ops`], [`collab`], and [`lookup`].
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod alias;
pub mod collab;
pub mod error;
pub mod freelist;
pub mod init;
pub mod list;
pub mod lookup;
pub mod mount;
pub mod ops;
pub mod subsystem;
pub mod vnode;

pub use alias::{AliasKey, AliasTable, Rdev};
pub use error::{Error, FsError};
pub use init::{vfsinit, FsSwitch, FsTypeDescriptor};
pub use mount::{FsId, Mount, MountFlags, MountId, MountRegistry};
pub use ops::{DeadOps, OpsHandle, VnodeOps};
pub use subsystem::{VnodeSubsystem, VnodeSubsystemConfig};
pub use vnode::{SpecInfo, Tag, VAttr, Vnode, VnodeFlags, VnodeId, VnodeType, VNOVAL};
