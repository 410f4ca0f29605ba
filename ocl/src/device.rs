//! Device capability model and the derivation rules that do not need a
//! live OpenCL context.

use derive_new::new;

/// Integrated devices share host memory (the host-unified-memory flag);
/// everything else is discrete.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum DeviceClass {
    #[default]
    IntegratedGpu,
    DiscreteGpu,
}

impl DeviceClass {
    pub fn from_host_unified_memory(unified: bool) -> DeviceClass {
        if unified {
            DeviceClass::IntegratedGpu
        } else {
            DeviceClass::DiscreteGpu
        }
    }
}

/// Graphics IP version, packed by the driver as 16/8/8 bits.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, new)]
pub struct GfxVersion {
    pub major: u16,
    pub minor: u8,
    pub revision: u8,
}

impl GfxVersion {
    pub fn from_raw(raw: u32) -> GfxVersion {
        GfxVersion {
            major: (raw >> 16) as u16,
            minor: ((raw >> 8) & 0xff) as u8,
            revision: (raw & 0xff) as u8,
        }
    }
}

/// Static capabilities of one compute device.
#[derive(Debug, Default, Clone)]
pub struct DeviceInfo {
    pub vendor_id: u32,
    pub name: String,
    pub driver_version: String,
    pub class: DeviceClass,
    pub execution_units_count: u32,
    pub gpu_frequency: u32,
    pub max_work_group_size: u64,
    pub max_local_mem_size: u64,
    pub max_global_mem_size: u64,
    pub max_alloc_mem_size: u64,
    pub supports_image: bool,
    pub max_image2d_width: u64,
    pub max_image2d_height: u64,
    pub supports_fp16: bool,
    pub supports_fp64: bool,
    pub supports_fp16_denorms: bool,
    pub supports_subgroups: bool,
    pub supports_subgroups_short: bool,
    pub supports_subgroups_char: bool,
    pub supports_imad: bool,
    pub supports_immad: bool,
    pub supports_usm: bool,
    pub supports_local_block_io: bool,
    pub supports_queue_families: bool,
    pub supported_simd_sizes: Vec<usize>,
    pub gfx_ver: GfxVersion,
    pub device_id: u32,
    pub num_slices: u32,
    pub num_sub_slices_per_slice: u32,
    pub num_eus_per_sub_slice: u32,
    pub num_threads_per_eu: u32,
}

/// USM allocation classes with the ACCESS capability bit set.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, new)]
pub struct MemoryCaps {
    pub usm_host: bool,
    pub usm_shared: bool,
    pub usm_device: bool,
}

/// Intel device feature capability bits.
pub const FEATURE_FLAG_DP4A: u64 = 1 << 0;
pub const FEATURE_FLAG_DPAS: u64 = 1 << 1;

/// ACCESS bit of a USM capability word.
pub const USM_ACCESS: u64 = 1 << 0;

/// Integrated Gen12 parts with integer dot-product support, by PCI id.
pub const IMAD_DEVICE_IDS: [u32; 12] = [
    0x9A40, 0x9A49, 0x9A59, 0x9AD9, 0x9A60, 0x9A68, 0x9A70, 0x9A78, 0x9A7F, 0x9AF8, 0x9AC0,
    0x9AC9,
];

/// Display-controller ids that must never be picked as the GPU.
pub const RESERVED_DEVICE_IDS: [u32; 4] = [0x4905, 0x4906, 0x4907, 0x4908];

/// Reasonable SIMD widths when the device does not advertise its own.
pub const DEFAULT_SIMD_SIZES: [usize; 3] = [8, 16, 32];

/// Integer multiply-add support: Gen12/Xe parts by name, known integrated
/// parts by PCI id, discrete parts unconditionally. The DP4A feature bit
/// overrides everything.
pub fn imad_support(name: &str, class: DeviceClass, device_id: u32, features: u64) -> bool {
    if features & FEATURE_FLAG_DP4A != 0 {
        return true;
    }
    if name.contains("Gen12") || name.contains("Xe") {
        return true;
    }
    match class {
        DeviceClass::DiscreteGpu => true,
        DeviceClass::IntegratedGpu => device_id != 0 && IMAD_DEVICE_IDS.contains(&device_id),
    }
}

/// Integer matrix-multiply support comes only from the DPAS feature bit.
pub fn immad_support(features: u64) -> bool {
    features & FEATURE_FLAG_DPAS != 0
}

pub fn usm_access(capability_word: u64) -> bool {
    capability_word & USM_ACCESS != 0
}

/// Pick the display device id out of the enumerated candidates: drop the
/// reserved ids, take the last survivor, default to 0.
pub fn pick_display_device_id(ids: &[u32]) -> u32 {
    ids.iter().rev().find(|id| !RESERVED_DEVICE_IDS.contains(id)).copied().unwrap_or(0)
}

/// Confirmation kernel for `cl_intel_subgroup_local_block_io`: 8 lanes
/// block-write a lane-indexed pattern to SLM, barrier, block-read it back
/// and add one.
pub const BLOCK_IO_KERNEL_NAME: &str = "is_local_block_io_supported";
pub const BLOCK_IO_KERNEL_SOURCE: &str = concat!(
    "__attribute__((intel_reqd_sub_group_size(8)))",
    "__attribute__((reqd_work_group_size(8, 1, 1)))",
    "void kernel is_local_block_io_supported(global uchar* dst) {",
    "    uint lid = get_sub_group_local_id();",
    "    uchar val = (uchar)lid * 2;",
    "    __local uchar tmp_slm[8];",
    "    intel_sub_group_block_write_uc2(tmp_slm, (uchar2)(val));",
    "    barrier(CLK_LOCAL_MEM_FENCE);",
    "    uchar2 read = intel_sub_group_block_read_uc2(tmp_slm);",
    "    dst[lid] = read.s0 + 1;",
    "}",
);

/// The only output the confirmation kernel may produce.
pub const BLOCK_IO_EXPECTED: [u8; 8] = [1, 3, 5, 7, 9, 11, 13, 15];

/// PCI id of the display device, from the host when the OpenCL attribute
/// query extension is missing. Linux reads the sysfs display controller;
/// elsewhere there is no fallback.
pub fn driver_dev_id() -> u32 {
    pick_display_device_id(&enumerate_display_devices())
}

#[cfg(target_os = "linux")]
fn enumerate_display_devices() -> Vec<u32> {
    const DEV_BASE: &str = "/sys/devices/pci0000:00/0000:00:02.0/";
    let read_hex = |file: &str| -> Option<u32> {
        let text = std::fs::read_to_string(format!("{DEV_BASE}{file}")).ok()?;
        let text = text.trim().trim_start_matches("0x");
        u32::from_str_radix(text, 16).ok()
    };
    if read_hex("vendor") == Some(0x8086) {
        read_hex("device").into_iter().collect()
    } else {
        vec![]
    }
}

#[cfg(not(target_os = "linux"))]
fn enumerate_display_devices() -> Vec<u32> {
    vec![]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gfx_version_unpacks_16_8_8() {
        let v = GfxVersion::from_raw(0x000C_0102);
        assert_eq!(v, GfxVersion::new(12, 1, 2));
        assert_eq!(GfxVersion::from_raw(0), GfxVersion::default());
        assert_eq!(GfxVersion::from_raw(0xFFFF_FFFF), GfxVersion::new(0xFFFF, 0xFF, 0xFF));
    }

    #[test]
    fn imad_rules() {
        use DeviceClass::*;
        // Name match beats everything but needs nothing else.
        assert!(imad_support("Intel(R) Gen12LP HD Graphics", IntegratedGpu, 0, 0));
        assert!(imad_support("Intel(R) Xe Graphics", IntegratedGpu, 0, 0));
        // Integrated: only the known id list.
        assert!(imad_support("Intel(R) UHD Graphics", IntegratedGpu, 0x9A49, 0));
        assert!(!imad_support("Intel(R) UHD Graphics", IntegratedGpu, 0x5916, 0));
        assert!(!imad_support("Intel(R) UHD Graphics", IntegratedGpu, 0, 0));
        // Discrete: unconditional.
        assert!(imad_support("Intel(R) Arc(TM) A770", DiscreteGpu, 0, 0));
        // DP4A feature bit overrides a negative verdict.
        assert!(imad_support("Intel(R) UHD Graphics", IntegratedGpu, 0, FEATURE_FLAG_DP4A));
    }

    #[test]
    fn immad_is_dpas_only() {
        assert!(!immad_support(0));
        assert!(!immad_support(FEATURE_FLAG_DP4A));
        assert!(immad_support(FEATURE_FLAG_DPAS));
        assert!(immad_support(FEATURE_FLAG_DP4A | FEATURE_FLAG_DPAS));
    }

    #[test]
    fn display_device_pick_skips_reserved_ids() {
        assert_eq!(pick_display_device_id(&[]), 0);
        assert_eq!(pick_display_device_id(&[0x4905]), 0);
        assert_eq!(pick_display_device_id(&[0x9A49, 0x4906]), 0x9A49);
        assert_eq!(pick_display_device_id(&[0x9A49, 0x56A0]), 0x56A0);
        assert_eq!(pick_display_device_id(&[0x4905, 0x4906, 0x4907, 0x4908]), 0);
    }

    #[test]
    fn usm_access_bit() {
        assert!(!usm_access(0));
        assert!(usm_access(USM_ACCESS));
        assert!(usm_access(USM_ACCESS | 0x8));
        assert!(!usm_access(0x8));
    }

    #[test]
    fn block_io_pattern_is_odd_ramp() {
        for (lane, value) in BLOCK_IO_EXPECTED.iter().enumerate() {
            assert_eq!(*value as usize, lane * 2 + 1);
        }
        assert!(BLOCK_IO_KERNEL_SOURCE.contains(BLOCK_IO_KERNEL_NAME));
    }
}
