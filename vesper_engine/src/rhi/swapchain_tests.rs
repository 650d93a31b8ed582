//! Unit tests for the swap chain front-end

use std::sync::Arc;

use crate::rhi::null::NullDevice;
use crate::rhi::{
    DeviceLimits, PresentFlags, RhiDevice, SwapChain, SwapChainDesc, TextureFormat,
};

fn desc(width: u32, height: u32) -> SwapChainDesc {
    SwapChainDesc {
        width,
        height,
        format: TextureFormat::R8G8B8A8_UNORM,
        buffer_count: 2,
        flags: PresentFlags::IMMEDIATE | PresentFlags::FLIP_DISCARD,
    }
}

fn make(device: &Arc<NullDevice>, width: u32, height: u32) -> SwapChain {
    let device: Arc<dyn RhiDevice> = device.clone();
    SwapChain::new(&device, None, &desc(width, height))
}

#[test]
fn test_creation_succeeds_headless() {
    let device = NullDevice::new();
    let swap_chain = make(&device, 1280, 720);
    assert!(swap_chain.is_initialized());
    assert_eq!(swap_chain.width(), 1280);
    assert_eq!(swap_chain.height(), 720);
    assert_eq!(swap_chain.buffer_count(), 2);
}

#[test]
fn test_creation_with_invalid_resolution_leaves_uninitialized() {
    let device = NullDevice::with_limits(DeviceLimits { max_texture_dimension_2d: 4096 });

    let zero = make(&device, 0, 720);
    assert!(!zero.is_initialized());

    let too_big = make(&device, 8192, 720);
    assert!(!too_big.is_initialized());
}

#[test]
fn test_resize_same_dimensions_is_noop() {
    let device = NullDevice::new();
    let mut swap_chain = make(&device, 1280, 720);

    let resizes_before = device.log().count_of("swapchain_resize");
    assert!(swap_chain.resize(device.as_ref(), 1280, 720));
    // No backend reallocation
    assert_eq!(device.log().count_of("swapchain_resize"), resizes_before);
}

#[test]
fn test_zero_area_resize_suspends_presentation() {
    let device = NullDevice::new();
    let mut swap_chain = make(&device, 1280, 720);

    // Minimized window: success, no backend resources touched
    assert!(swap_chain.resize(device.as_ref(), 0, 0));
    assert!(swap_chain.is_suspended());
    assert_eq!(device.log().count_of("swapchain_resize"), 0);

    // Acquire reports success immediately while suspended
    assert!(swap_chain.acquire_next_image());
    assert_eq!(device.log().count_of("swapchain_acquire"), 0);

    // Restoring the window resumes presentation
    assert!(swap_chain.resize(device.as_ref(), 1280, 720));
    assert!(!swap_chain.is_suspended());
}

#[test]
fn test_real_resize_drains_queues_and_recreates() {
    let device = NullDevice::new();
    let mut swap_chain = make(&device, 1280, 720);

    let waits_before = device.queue_wait_count();
    assert!(swap_chain.resize(device.as_ref(), 1920, 1080));

    assert_eq!(swap_chain.width(), 1920);
    assert_eq!(swap_chain.height(), 1080);
    assert_eq!(device.log().count_of("swapchain_resize"), 1);
    assert!(device.queue_wait_count() > waits_before);
}

#[test]
fn test_present_without_acquire_fails() {
    let device = NullDevice::new();
    let mut swap_chain = make(&device, 1280, 720);

    assert!(!swap_chain.present());
    assert_eq!(device.log().count_of("swapchain_present"), 0);
}

#[test]
fn test_acquire_then_present_cycles_image_index() {
    let device = NullDevice::new();
    let mut swap_chain = make(&device, 1280, 720);

    assert!(swap_chain.acquire_next_image());
    let first = swap_chain.image_index();
    assert!(swap_chain.present());

    assert!(swap_chain.acquire_next_image());
    let second = swap_chain.image_index();
    assert!(swap_chain.present());

    assert_ne!(first, second);
    assert!(second < swap_chain.buffer_count());
}

#[test]
fn test_command_pool_resets_after_full_cycle() {
    let device = NullDevice::new();
    let mut swap_chain = make(&device, 1280, 720);

    // Two buffers: every second acquire recycles the pool
    assert!(swap_chain.acquire_next_image());
    assert!(swap_chain.present());
    assert_eq!(device.log().count_of("swapchain_reset_pool"), 0);

    assert!(swap_chain.acquire_next_image());
    assert!(swap_chain.present());
    assert_eq!(device.log().count_of("swapchain_reset_pool"), 1);
}

#[test]
fn test_take_and_return_cmd_list() {
    let device = NullDevice::new();
    let mut swap_chain = make(&device, 1280, 720);

    assert!(swap_chain.acquire_next_image());
    let cmd = swap_chain.take_cmd_list().expect("command list available");
    // Checked out: the slot is empty
    assert!(swap_chain.take_cmd_list().is_none());

    swap_chain.return_cmd_list(cmd);
    assert!(swap_chain.take_cmd_list().is_some());
}

#[test]
fn test_set_layout_is_idempotent() {
    let device = NullDevice::new();
    let mut swap_chain = make(&device, 1280, 720);
    let mut cmd = swap_chain.take_cmd_list().unwrap();

    swap_chain.set_layout(crate::rhi::ImageLayout::Present, &mut cmd).unwrap();
    let transitions = device.log().count_of("transition:");
    assert_eq!(transitions, 2); // one per backing image

    // Same layout again: skipped
    swap_chain.set_layout(crate::rhi::ImageLayout::Present, &mut cmd).unwrap();
    assert_eq!(device.log().count_of("transition:"), transitions);
}
