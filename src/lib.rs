//! Phobos Local Resource Scheduler
//!
//! Tracks the live state of every device and medium usable on this
//! host, picks device/medium pairs for read, write and format
//! requests, and drives the physical load/mount/unload/unmount
//! sequences through pluggable library, device and filesystem
//! adapters.

pub mod adapters;
pub mod dss;
pub mod lrs;
