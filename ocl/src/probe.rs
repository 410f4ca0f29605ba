//! Live device interrogation. Standard parameters go through the typed
//! [`Device`] getters; Intel extension parameters go through a raw
//! `clGetDeviceInfo` call, since their ids are not part of core OpenCL.

use std::ffi::c_void;
use std::ptr::null_mut;

use anyhow::anyhow;
use opencl3::{
    command_queue::CommandQueue,
    context::Context,
    device::Device,
    kernel::{ExecuteKernel, Kernel},
    memory::{Buffer, CL_MEM_WRITE_ONLY},
    program::Program,
    types::{cl_uchar, CL_BLOCKING},
};

use crate::device::{
    driver_dev_id, imad_support, immad_support, usm_access, DeviceClass, DeviceInfo, GfxVersion,
    MemoryCaps, BLOCK_IO_EXPECTED, BLOCK_IO_KERNEL_NAME, BLOCK_IO_KERNEL_SOURCE,
    DEFAULT_SIMD_SIZES,
};

// Core parameters, from cl.h.
const CL_DEVICE_IMAGE_SUPPORT: u32 = 0x1016;
const CL_DEVICE_HALF_FP_CONFIG: u32 = 0x1033;
const CL_DEVICE_HOST_UNIFIED_MEMORY: u32 = 0x1035;
const CL_FP_DENORM: u64 = 1 << 0;

// cl_intel_required_subgroup_size.
const CL_DEVICE_SUB_GROUP_SIZES_INTEL: u32 = 0x4108;

// cl_intel_unified_shared_memory.
const CL_DEVICE_HOST_MEM_CAPABILITIES_INTEL: u32 = 0x4190;
const CL_DEVICE_DEVICE_MEM_CAPABILITIES_INTEL: u32 = 0x4191;
const CL_DEVICE_SINGLE_DEVICE_SHARED_MEM_CAPABILITIES_INTEL: u32 = 0x4192;

// cl_intel_device_attribute_query.
const CL_DEVICE_IP_VERSION_INTEL: u32 = 0x4250;
const CL_DEVICE_ID_INTEL: u32 = 0x4251;
const CL_DEVICE_NUM_SLICES_INTEL: u32 = 0x4252;
const CL_DEVICE_NUM_SUB_SLICES_PER_SLICE_INTEL: u32 = 0x4253;
const CL_DEVICE_NUM_EUS_PER_SUB_SLICE_INTEL: u32 = 0x4254;
const CL_DEVICE_NUM_THREADS_PER_EU_INTEL: u32 = 0x4255;
const CL_DEVICE_FEATURE_CAPABILITIES_INTEL: u32 = 0x4256;

extern "system" {
    fn clGetDeviceInfo(
        device: *mut c_void,
        param_name: u32,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> i32;
}

fn raw_u32(device: &Device, param: u32) -> Option<u32> {
    let mut value = 0u32;
    let status = unsafe {
        clGetDeviceInfo(
            device.id(),
            param,
            std::mem::size_of::<u32>(),
            &mut value as *mut u32 as *mut c_void,
            null_mut(),
        )
    };
    (status == 0).then_some(value)
}

fn raw_u64(device: &Device, param: u32) -> Option<u64> {
    let mut value = 0u64;
    let status = unsafe {
        clGetDeviceInfo(
            device.id(),
            param,
            std::mem::size_of::<u64>(),
            &mut value as *mut u64 as *mut c_void,
            null_mut(),
        )
    };
    (status == 0).then_some(value)
}

fn raw_sizes(device: &Device, param: u32) -> Option<Vec<usize>> {
    let mut bytes = 0usize;
    let status = unsafe { clGetDeviceInfo(device.id(), param, 0, null_mut(), &mut bytes) };
    if status != 0 || bytes % std::mem::size_of::<usize>() != 0 {
        return None;
    }
    let mut value = vec![0usize; bytes / std::mem::size_of::<usize>()];
    let status = unsafe {
        clGetDeviceInfo(device.id(), param, bytes, value.as_mut_ptr() as *mut c_void, null_mut())
    };
    (status == 0).then_some(value)
}

/// Interrogate one device. Queries that fail or that the driver does not
/// understand degrade to conservative defaults, so this never errors.
pub fn probe(device: &Device) -> (DeviceInfo, MemoryCaps) {
    let extensions = device.extensions().unwrap_or_default();
    let has = |ext: &str| extensions.split_whitespace().any(|word| word == ext);

    let name = device.name().unwrap_or_default();
    let unified = raw_u32(device, CL_DEVICE_HOST_UNIFIED_MEMORY).unwrap_or(0) != 0;
    let class = DeviceClass::from_host_unified_memory(unified);

    // Topology and instruction-set bits come from the Intel attribute
    // query when the driver has it; otherwise the PCI id comes from the
    // host and the rest stays unknown.
    let attr_query = has("cl_intel_device_attribute_query");
    let gfx_ver = if attr_query {
        GfxVersion::from_raw(raw_u32(device, CL_DEVICE_IP_VERSION_INTEL).unwrap_or(0))
    } else {
        GfxVersion::default()
    };
    let device_id = if attr_query {
        raw_u32(device, CL_DEVICE_ID_INTEL).unwrap_or(0)
    } else {
        driver_dev_id()
    };
    let topo = |param| if attr_query { raw_u32(device, param).unwrap_or(0) } else { 0 };
    let features =
        if attr_query { raw_u64(device, CL_DEVICE_FEATURE_CAPABILITIES_INTEL).unwrap_or(0) } else { 0 };

    let supports_fp16 = has("cl_khr_fp16");
    let half_fp_config = raw_u64(device, CL_DEVICE_HALF_FP_CONFIG).unwrap_or(0);

    let supports_usm = has("cl_intel_unified_shared_memory");
    let memory_caps = if supports_usm {
        MemoryCaps::new(
            usm_access(raw_u64(device, CL_DEVICE_HOST_MEM_CAPABILITIES_INTEL).unwrap_or(0)),
            usm_access(
                raw_u64(device, CL_DEVICE_SINGLE_DEVICE_SHARED_MEM_CAPABILITIES_INTEL)
                    .unwrap_or(0),
            ),
            usm_access(raw_u64(device, CL_DEVICE_DEVICE_MEM_CAPABILITIES_INTEL).unwrap_or(0)),
        )
    } else {
        MemoryCaps::default()
    };

    let supported_simd_sizes = if has("cl_intel_required_subgroup_size") {
        raw_sizes(device, CL_DEVICE_SUB_GROUP_SIZES_INTEL)
            .unwrap_or_else(|| DEFAULT_SIMD_SIZES.to_vec())
    } else {
        DEFAULT_SIMD_SIZES.to_vec()
    };

    let supports_local_block_io =
        has("cl_intel_subgroup_local_block_io") && confirm_local_block_io(device);

    let info = DeviceInfo {
        vendor_id: device.vendor_id().unwrap_or(0),
        driver_version: device.driver_version().unwrap_or_default(),
        class,
        execution_units_count: device.max_compute_units().unwrap_or(0),
        gpu_frequency: device.max_clock_frequency().unwrap_or(0),
        max_work_group_size: device.max_work_group_size().unwrap_or(0) as u64,
        max_local_mem_size: device.local_mem_size().unwrap_or(0),
        max_global_mem_size: device.global_mem_size().unwrap_or(0),
        max_alloc_mem_size: device.max_mem_alloc_size().unwrap_or(0),
        supports_image: raw_u32(device, CL_DEVICE_IMAGE_SUPPORT).unwrap_or(0) != 0,
        max_image2d_width: device.image2d_max_width().unwrap_or(0) as u64,
        max_image2d_height: device.image2d_max_height().unwrap_or(0) as u64,
        supports_fp16,
        supports_fp64: has("cl_khr_fp64"),
        supports_fp16_denorms: supports_fp16 && half_fp_config & CL_FP_DENORM != 0,
        supports_subgroups: has("cl_intel_subgroups") || has("cl_khr_subgroups"),
        supports_subgroups_short: has("cl_intel_subgroups_short"),
        supports_subgroups_char: has("cl_intel_subgroups_char"),
        supports_imad: imad_support(&name, class, device_id, features),
        supports_immad: immad_support(features),
        supports_usm,
        supports_local_block_io,
        supports_queue_families: has("cl_intel_command_queue_families"),
        supported_simd_sizes,
        gfx_ver,
        device_id,
        num_slices: topo(CL_DEVICE_NUM_SLICES_INTEL),
        num_sub_slices_per_slice: topo(CL_DEVICE_NUM_SUB_SLICES_PER_SLICE_INTEL),
        num_eus_per_sub_slice: topo(CL_DEVICE_NUM_EUS_PER_SUB_SLICE_INTEL),
        num_threads_per_eu: topo(CL_DEVICE_NUM_THREADS_PER_EU_INTEL),
        name,
    };
    (info, memory_caps)
}

/// Some drivers advertise the extension but miscompile the block reads;
/// run the kernel once and check the answer.
fn confirm_local_block_io(device: &Device) -> bool {
    match run_block_io_kernel(device) {
        Ok(out) => out == BLOCK_IO_EXPECTED,
        Err(e) => {
            debug!("local block io confirmation failed: {e:?}");
            false
        }
    }
}

fn run_block_io_kernel(device: &Device) -> anyhow::Result<[u8; 8]> {
    let context = Context::from_device(device).map_err(|e| anyhow!("{e}"))?;
    let queue = CommandQueue::create_with_properties(&context, device.id(), 0, 0)
        .map_err(|e| anyhow!("{e}"))?;
    let program = Program::create_and_build_from_source(
        &context,
        BLOCK_IO_KERNEL_SOURCE,
        "-Dcl_intel_subgroup_local_block_io",
    )
    .map_err(|e| anyhow!("{e}"))?;
    let kernel = Kernel::create(&program, BLOCK_IO_KERNEL_NAME).map_err(|e| anyhow!("{e}"))?;

    let lanes = BLOCK_IO_EXPECTED.len();
    let mut dst = Buffer::<cl_uchar>::create(&context, CL_MEM_WRITE_ONLY, lanes, null_mut())
        .map_err(|e| anyhow!("{e}"))?;

    let mut run = ExecuteKernel::new(&kernel);
    run.set_arg(&dst).set_global_work_sizes(&[lanes]).set_local_work_sizes(&[lanes]);
    let run = run.enqueue_nd_range(&queue).map_err(|e| anyhow!("{e}"))?;

    let mut out = [0u8; 8];
    queue
        .enqueue_read_buffer(&mut dst, CL_BLOCKING, 0, &mut out, &[run.get()])
        .map_err(|e| anyhow!("{e}"))?;
    Ok(out)
}
