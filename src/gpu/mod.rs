//! Compute-device backend for first-match search.
//!
//! [`device`] binds an adapter and compiles the kernel once; [`GpuMatcher`]
//! uploads each source/template pair, dispatches one work-item per candidate
//! offset and reads back a single result slot.

pub mod device;
mod matcher;

pub use device::{
    AdapterInfo, DeviceClass, DeviceContext, DeviceManager, DevicePreference, WorkgroupSize,
};
pub use matcher::GpuMatcher;
