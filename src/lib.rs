//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-sync`, `core-store`). Host
//! applications can depend on `riffsync-workspace` and enable the documented
//! features without needing to wire each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(feature = "engine-only")]
pub use core_store as store;
#[cfg(feature = "engine-only")]
pub use core_sync as sync;
