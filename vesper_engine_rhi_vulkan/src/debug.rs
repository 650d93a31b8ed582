//! Validation layer plumbing, compiled in only with the
//! `vulkan-validation` feature

#![cfg(feature = "vulkan-validation")]

use ash::vk;
use colored::*;
use std::ffi::CStr;

pub const VALIDATION_LAYER: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Message callback: routes validation output through the engine logger
/// with severity-colored prefixes.
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = if data.is_null() {
        String::from("<empty validation message>")
    } else {
        CStr::from_ptr((*data).p_message).to_string_lossy().into_owned()
    };

    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            vesper_engine::engine_error!("vesper::vulkan::validation", "{}", message.red());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            vesper_engine::engine_warn!("vesper::vulkan::validation", "{}", message.yellow());
        }
        _ => {
            vesper_engine::engine_debug!("vesper::vulkan::validation", "{}", message);
        }
    }

    vk::FALSE
}

/// Create the debug messenger for an instance
pub fn create_messenger(
    debug_utils: &ash::ext::debug_utils::Instance,
) -> Result<vk::DebugUtilsMessengerEXT, vk::Result> {
    let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    unsafe { debug_utils.create_debug_utils_messenger(&info, None) }
}
