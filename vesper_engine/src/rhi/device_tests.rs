//! Unit tests for hardware enumeration and device validation

use crate::rhi::null::NullDevice;
use crate::rhi::{DeviceInfo, DeviceLimits, DisplayMode, PhysicalDevice, RhiDevice};

fn adapter(name: &str, memory_mb: u32) -> PhysicalDevice {
    PhysicalDevice {
        name: name.to_string(),
        memory_mb,
        vendor_id: 0x10DE,
        driver_version: "1.0".to_string(),
    }
}

// ============================================================================
// PHYSICAL DEVICES
// ============================================================================

#[test]
fn test_physical_devices_sorted_by_memory_descending() {
    let mut info = DeviceInfo::new();
    info.register_physical_device(adapter("integrated", 2048));
    info.register_physical_device(adapter("discrete", 8192));
    info.register_physical_device(adapter("old", 1024));

    let names: Vec<&str> = info.physical_devices().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["discrete", "integrated", "old"]);
}

#[test]
fn test_primary_physical_device_defaults_to_largest_memory() {
    let mut info = DeviceInfo::new();
    info.register_physical_device(adapter("small", 512));
    info.register_physical_device(adapter("large", 16384));

    // No explicit index set: index 0 post-sort is the largest adapter
    let primary = info.primary_physical_device().unwrap();
    assert_eq!(primary.name, "large");
    assert_eq!(primary.memory_mb, 16384);
}

#[test]
fn test_set_primary_physical_device_selects_index() {
    let mut info = DeviceInfo::new();
    info.register_physical_device(adapter("a", 4096));
    info.register_physical_device(adapter("b", 2048));

    info.set_primary_physical_device(1);
    assert_eq!(info.primary_physical_device().unwrap().name, "b");
}

#[test]
fn test_set_primary_physical_device_invalid_index_is_noop() {
    let mut info = DeviceInfo::new();
    info.register_physical_device(adapter("only", 4096));

    info.set_primary_physical_device(5);
    // Selection unchanged, no panic
    assert_eq!(info.primary_physical_device().unwrap().name, "only");
}

#[test]
fn test_primary_physical_device_none_when_empty() {
    let info = DeviceInfo::new();
    assert!(info.primary_physical_device().is_none());
}

// ============================================================================
// DISPLAY MODES
// ============================================================================

#[test]
fn test_display_modes_sorted_by_refresh_rate_descending() {
    let mut info = DeviceInfo::new();
    info.register_display_mode(DisplayMode { width: 1920, height: 1080, refresh_rate_hz: 60.0 });
    info.register_display_mode(DisplayMode { width: 2560, height: 1440, refresh_rate_hz: 144.0 });
    info.register_display_mode(DisplayMode { width: 1920, height: 1080, refresh_rate_hz: 120.0 });

    let rates: Vec<f32> = info.display_modes().iter().map(|m| m.refresh_rate_hz).collect();
    assert_eq!(rates, vec![144.0, 120.0, 60.0]);
    assert_eq!(info.primary_display_mode().unwrap().refresh_rate_hz, 144.0);
}

// ============================================================================
// RESOLUTION VALIDATION
// ============================================================================

#[test]
fn test_validate_resolution_boundaries() {
    let device = NullDevice::with_limits(DeviceLimits { max_texture_dimension_2d: 4096 });
    let max = 4096;

    // Boundary values {0, 1, max, max + 1} in both dimensions
    assert!(!device.validate_resolution(0, 1080));
    assert!(!device.validate_resolution(1920, 0));
    assert!(!device.validate_resolution(0, 0));
    assert!(device.validate_resolution(1, 1));
    assert!(device.validate_resolution(max, max));
    assert!(!device.validate_resolution(max + 1, max));
    assert!(!device.validate_resolution(max, max + 1));
    assert!(device.validate_resolution(1920, 1080));
}

#[test]
fn test_queue_wait_all_waits_every_queue() {
    let device = NullDevice::new();
    device.queue_wait_all().unwrap();
    // Graphics, transfer and compute
    assert_eq!(device.queue_wait_count(), 3);
}
