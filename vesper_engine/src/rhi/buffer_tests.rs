//! Unit tests for buffer growth and mapped writes

use crate::rhi::buffer::next_capacity;
use crate::rhi::null::NullBuffer;
use crate::rhi::{Buffer, BufferDesc, BufferKind};

// ============================================================================
// GROWTH POLICY
// ============================================================================

#[test]
fn test_growth_idempotent_below_threshold() {
    // Requests within the current capacity never change it
    assert_eq!(next_capacity(64, 1), 64);
    assert_eq!(next_capacity(64, 63), 64);
    assert_eq!(next_capacity(64, 64), 64);
}

#[test]
fn test_growth_doubles_until_requirement_fits() {
    assert_eq!(next_capacity(64, 65), 128);
    assert_eq!(next_capacity(64, 129), 256);
    assert_eq!(next_capacity(64, 1000), 1024);
}

#[test]
fn test_growth_is_monotonic_and_sufficient() {
    for current in [1u32, 2, 7, 64, 100] {
        for required in [1u32, 5, 64, 65, 500, 4096] {
            let grown = next_capacity(current, required);
            assert!(grown >= required, "capacity {} < requirement {}", grown, required);
            assert!(grown >= current, "capacity never shrinks");
        }
    }
}

#[test]
fn test_growth_from_zero() {
    assert_eq!(next_capacity(0, 3), 4);
}

// ============================================================================
// MAPPED WRITES
// ============================================================================

fn constant_buffer(stride: u32, count: u32) -> NullBuffer {
    NullBuffer::new(&BufferDesc {
        kind: BufferKind::Constant,
        stride,
        element_count: count,
        dynamic: true,
        name: "test".to_string(),
    })
}

#[test]
fn test_map_write_writes_the_requested_slot() {
    let buffer = constant_buffer(4, 4);

    buffer.map_write(2, &mut |bytes| bytes.copy_from_slice(&[7, 7, 7, 7])).unwrap();

    let contents = buffer.contents();
    assert_eq!(&contents[8..12], &[7, 7, 7, 7]);
    assert_eq!(&contents[0..8], &[0; 8]);
}

#[test]
fn test_map_write_out_of_range_fails() {
    let buffer = constant_buffer(4, 2);
    let result = buffer.map_write(2, &mut |_| {});
    assert!(result.is_err());
}

#[test]
fn test_reallocate_grows_and_resets() {
    let buffer = constant_buffer(16, 4);
    assert_eq!(buffer.element_count(), 4);

    buffer.reallocate(16).unwrap();
    assert_eq!(buffer.element_count(), 16);
    assert_eq!(buffer.contents().len(), 256);
    assert_eq!(buffer.reallocation_count(), 1);
}

#[test]
fn test_offset_index_round_trips() {
    let buffer = constant_buffer(16, 8);
    assert_eq!(buffer.offset_index(), 0);
    buffer.set_offset_index(5);
    assert_eq!(buffer.offset_index(), 5);
}
