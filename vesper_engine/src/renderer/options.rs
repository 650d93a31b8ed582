/// Render options - feature bitmask plus scalar option values

use bitflags::bitflags;
use rustc_hash::FxHashMap;

bitflags! {
    /// Boolean render features
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Options: u32 {
        const BLOOM                     = 1 << 0;
        const VOLUMETRIC_LIGHTING       = 1 << 1;
        const MOTION_BLUR               = 1 << 2;
        const SSAO                      = 1 << 3;
        const SCREEN_SPACE_SHADOWS      = 1 << 4;
        const SSR                       = 1 << 5;
        const TAA                       = 1 << 6;
        const FXAA                      = 1 << 7;
        const DITHERING                 = 1 << 8;
        const CHROMATIC_ABERRATION      = 1 << 9;
        const SHARPENING                = 1 << 10;
        const DEPTH_PREPASS             = 1 << 11;
        const REVERSE_Z                 = 1 << 12;
        const DEBUG_GRID                = 1 << 13;
        const DEBUG_LIGHTS              = 1 << 14;
        const DEBUG_TRANSFORM           = 1 << 15;
        const DEBUG_SELECTION_OUTLINE   = 1 << 16;
        const DEBUG_WIREFRAME           = 1 << 17;
        const DEBUG_AABB                = 1 << 18;
        const DEBUG_PICKING_RAY         = 1 << 19;
        const DEBUG_PERFORMANCE_METRICS = 1 << 20;
    }
}

impl Default for Options {
    /// The default feature set a new renderer starts with
    fn default() -> Self {
        Options::REVERSE_Z
            | Options::BLOOM
            | Options::VOLUMETRIC_LIGHTING
            | Options::MOTION_BLUR
            | Options::SSAO
            | Options::SCREEN_SPACE_SHADOWS
            | Options::SSR
            | Options::TAA
            | Options::SHARPENING
            | Options::DEBUG_GRID
            | Options::DEBUG_LIGHTS
            | Options::DEBUG_TRANSFORM
    }
}

/// Scalar option values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionValue {
    Anisotropy,
    ShadowResolution,
    Tonemapping,
    Exposure,
    Gamma,
    SharpenStrength,
    SharpenClamp,
    BloomIntensity,
    MotionBlurIntensity,
}

/// Tone-mapping operators, stored as the `Tonemapping` option value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneMapper {
    Off = 0,
    Aces = 1,
    Reinhard = 2,
    Uncharted2 = 3,
}

/// Smallest allowed shadow-map resolution
pub const SHADOW_RESOLUTION_MIN: f32 = 128.0;

/// Largest allowed anisotropy level
pub const ANISOTROPY_MAX: f32 = 16.0;

/// Feature flags plus the parallel scalar value map
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub flags: Options,
    values: FxHashMap<OptionValue, f32>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        let mut values = FxHashMap::default();
        values.insert(OptionValue::Anisotropy, 16.0);
        values.insert(OptionValue::ShadowResolution, 4096.0);
        values.insert(OptionValue::Tonemapping, ToneMapper::Aces as i32 as f32);
        values.insert(OptionValue::Exposure, 0.0);
        values.insert(OptionValue::Gamma, 2.2);
        values.insert(OptionValue::SharpenStrength, 1.0);
        values.insert(OptionValue::SharpenClamp, 0.35);
        values.insert(OptionValue::BloomIntensity, 0.003);
        values.insert(OptionValue::MotionBlurIntensity, 0.01);

        Self { flags: Options::default(), values }
    }
}

impl RenderOptions {
    pub fn is_enabled(&self, option: Options) -> bool {
        self.flags.contains(option)
    }

    pub fn set_enabled(&mut self, option: Options, enable: bool) {
        self.flags.set(option, enable);
    }

    pub fn value(&self, option: OptionValue) -> f32 {
        self.values.get(&option).copied().unwrap_or(0.0)
    }

    /// Store a raw value. Clamping and side effects (shadow-map regeneration)
    /// live in `Renderer::set_option_value`, which has the device and world
    /// at hand.
    pub(crate) fn set_value_raw(&mut self, option: OptionValue, value: f32) {
        self.values.insert(option, value);
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
