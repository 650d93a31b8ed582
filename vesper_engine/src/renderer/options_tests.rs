//! Unit tests for render options

use crate::renderer::options::{Options, OptionValue, RenderOptions, ToneMapper};

#[test]
fn test_default_flags() {
    let options = RenderOptions::default();
    assert!(options.is_enabled(Options::REVERSE_Z));
    assert!(options.is_enabled(Options::BLOOM));
    assert!(options.is_enabled(Options::TAA));
    assert!(options.is_enabled(Options::SSAO));
    assert!(!options.is_enabled(Options::FXAA));
    assert!(!options.is_enabled(Options::DITHERING));
    assert!(!options.is_enabled(Options::CHROMATIC_ABERRATION));
    assert!(!options.is_enabled(Options::DEPTH_PREPASS));
}

#[test]
fn test_toggle_flags() {
    let mut options = RenderOptions::default();

    options.set_enabled(Options::FXAA, true);
    assert!(options.is_enabled(Options::FXAA));

    options.set_enabled(Options::FXAA, false);
    assert!(!options.is_enabled(Options::FXAA));

    // Toggling one flag leaves the others alone
    assert!(options.is_enabled(Options::BLOOM));
}

#[test]
fn test_default_values() {
    let options = RenderOptions::default();
    assert_eq!(options.value(OptionValue::Anisotropy), 16.0);
    assert_eq!(options.value(OptionValue::ShadowResolution), 4096.0);
    assert_eq!(options.value(OptionValue::Gamma), 2.2);
    assert_eq!(options.value(OptionValue::Tonemapping), ToneMapper::Aces as i32 as f32);
}

#[test]
fn test_set_value_raw_round_trips() {
    let mut options = RenderOptions::default();
    options.set_value_raw(OptionValue::Exposure, 1.5);
    assert_eq!(options.value(OptionValue::Exposure), 1.5);
}
