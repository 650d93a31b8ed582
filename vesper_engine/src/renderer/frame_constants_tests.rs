//! Unit tests for constant-buffer dirty checking and dynamic growth

use crate::renderer::frame_constants::{ConstantBufferSet, ObjectConstants, UberConstants};
use crate::rhi::null::{NullBuffer, NullDevice};
use crate::rhi::{Buffer, RhiDevice};

fn null_buffer<'a>(set: &'a ConstantBufferSet<UberConstants>) -> &'a NullBuffer {
    set.gpu().as_any().downcast_ref::<NullBuffer>().unwrap()
}

#[test]
fn test_upload_if_dirty_skips_unchanged_content() {
    let device = NullDevice::new();
    let mut set: ConstantBufferSet<UberConstants> =
        ConstantBufferSet::new(device.as_ref() as &dyn RhiDevice, "uber", 1).unwrap();

    assert!(set.upload_if_dirty().unwrap());
    // Identical contents: no second upload
    assert!(!set.upload_if_dirty().unwrap());

    set.cpu.blur_sigma = 2.0;
    assert!(set.upload_if_dirty().unwrap());
}

#[test]
fn test_upload_writes_cpu_bytes() {
    let device = NullDevice::new();
    let mut set: ConstantBufferSet<UberConstants> =
        ConstantBufferSet::new(device.as_ref() as &dyn RhiDevice, "uber", 1).unwrap();

    set.cpu.blur_sigma = 4.0;
    set.upload().unwrap();

    let bytes = null_buffer(&set).contents();
    let uploaded: &UberConstants = bytemuck::from_bytes(&bytes[..std::mem::size_of::<UberConstants>()]);
    assert_eq!(uploaded.blur_sigma, 4.0);
}

#[test]
fn test_dynamic_upload_skips_same_content_same_offset() {
    let device = NullDevice::new();
    let mut set: ConstantBufferSet<ObjectConstants> =
        ConstantBufferSet::new(device.as_ref() as &dyn RhiDevice, "object", 8).unwrap();

    assert!(set.upload_dynamic(0).unwrap());
    assert!(!set.upload_dynamic(0).unwrap());

    // Same content, new offset: re-upload (and re-bind) required
    assert!(set.upload_dynamic(1).unwrap());
    assert_eq!(set.gpu().offset_index(), 1);
}

#[test]
fn test_dynamic_upload_grows_by_doubling() {
    let device = NullDevice::new();
    let mut set: ConstantBufferSet<ObjectConstants> =
        ConstantBufferSet::new(device.as_ref() as &dyn RhiDevice, "object", 4).unwrap();

    assert_eq!(set.gpu().element_count(), 4);

    // Index 9 requires 10 slots: 4 -> 8 -> 16
    assert!(set.upload_dynamic(9).unwrap());
    assert_eq!(set.gpu().element_count(), 16);
    assert_eq!(set.gpu().offset_index(), 9);
}

#[test]
fn test_dynamic_upload_within_capacity_does_not_reallocate() {
    let device = NullDevice::new();
    let mut set: ConstantBufferSet<ObjectConstants> =
        ConstantBufferSet::new(device.as_ref() as &dyn RhiDevice, "object", 8).unwrap();

    set.upload_dynamic(7).unwrap();
    assert_eq!(set.gpu().element_count(), 8);

    let null = set.gpu().as_any().downcast_ref::<NullBuffer>().unwrap();
    assert_eq!(null.reallocation_count(), 0);
}

#[test]
fn test_constant_struct_sizes_are_16_byte_multiples() {
    // Constant buffers bind with 16-byte alignment rules
    assert_eq!(std::mem::size_of::<UberConstants>() % 16, 0);
    assert_eq!(std::mem::size_of::<ObjectConstants>() % 16, 0);
    assert_eq!(std::mem::size_of::<crate::renderer::frame_constants::FrameConstants>() % 16, 0);
    assert_eq!(std::mem::size_of::<crate::renderer::frame_constants::LightConstants>() % 16, 0);
}
