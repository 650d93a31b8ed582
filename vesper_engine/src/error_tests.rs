//! Unit tests for the error module

use crate::error::Error;

#[test]
fn test_error_display_backend() {
    let err = Error::BackendError("device lost".to_string());
    assert_eq!(format!("{}", err), "Backend error: device lost");
}

#[test]
fn test_error_display_out_of_memory() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_error_display_invalid_resource() {
    let err = Error::InvalidResource("texture 'albedo'".to_string());
    assert_eq!(format!("{}", err), "Invalid resource: texture 'albedo'");
}

#[test]
fn test_error_display_invalid_parameter() {
    let err = Error::InvalidParameter("width = 0".to_string());
    assert_eq!(format!("{}", err), "Invalid parameter: width = 0");
}

#[test]
fn test_error_display_initialization_failed() {
    let err = Error::InitializationFailed("no suitable GPU".to_string());
    assert_eq!(format!("{}", err), "Initialization failed: no suitable GPU");
}

#[test]
fn test_error_display_shader_compilation() {
    let err = Error::ShaderCompilation("entry point missing".to_string());
    assert_eq!(format!("{}", err), "Shader compilation failed: entry point missing");
}

#[test]
fn test_error_implements_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&Error::OutOfMemory);
}
