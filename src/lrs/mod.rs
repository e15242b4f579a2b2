//! Local Resource Scheduler core
//!
//! The scheduler tracks every device usable on this host for one
//! medium family, decides which device/medium pair satisfies a
//! request, and drives the physical load/mount/unload/unmount
//! sequences. All device state changes go through the state machine
//! in [`device`]; the acquisition protocols live in [`scheduler`].

mod error;
pub use error::*;

mod device;
pub use device::*;

mod directory;
pub use directory::*;

mod select;
pub use select::*;

mod scheduler;
pub use scheduler::*;

#[cfg(test)]
mod test;

/// Default directory under which media get mounted
pub const DEFAULT_MOUNT_PREFIX: &str = "/mnt/phobos";
