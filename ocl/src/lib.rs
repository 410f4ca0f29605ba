//! # xir-ocl
//!
//! OpenCL device-capability probe. [`device`] holds the capability model
//! and the pure derivation rules (instruction-set support, display-device
//! selection, SIMD defaults); [`probe`] runs the live queries and the
//! confirmation kernel, and is only built with the `opencl` feature.

#[allow(unused_imports)]
#[macro_use]
extern crate log;

pub mod device;
#[cfg(feature = "opencl")]
pub mod probe;

pub use device::{DeviceClass, DeviceInfo, GfxVersion, MemoryCaps};
