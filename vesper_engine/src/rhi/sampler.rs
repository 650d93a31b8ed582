/// Sampler trait and descriptor

use std::any::Any;

/// Texture filtering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Texture addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Clamp,
    Mirror,
}

/// Depth comparison for shadow samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerCompare {
    Disabled,
    GreaterOrEqual,
    LessOrEqual,
}

/// Descriptor for creating a sampler
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDesc {
    pub filter_min: Filter,
    pub filter_mag: Filter,
    pub filter_mip: Filter,
    pub address_mode: AddressMode,
    /// Anisotropy level; 0.0 disables anisotropic filtering
    pub anisotropy: f32,
    pub compare: SamplerCompare,
}

impl SamplerDesc {
    pub fn bilinear_clamp() -> Self {
        Self {
            filter_min: Filter::Linear,
            filter_mag: Filter::Linear,
            filter_mip: Filter::Nearest,
            address_mode: AddressMode::Clamp,
            anisotropy: 0.0,
            compare: SamplerCompare::Disabled,
        }
    }

    pub fn bilinear_wrap() -> Self {
        Self { address_mode: AddressMode::Wrap, ..Self::bilinear_clamp() }
    }

    pub fn point_clamp() -> Self {
        Self {
            filter_min: Filter::Nearest,
            filter_mag: Filter::Nearest,
            filter_mip: Filter::Nearest,
            ..Self::bilinear_clamp()
        }
    }

    pub fn trilinear_clamp() -> Self {
        Self { filter_mip: Filter::Linear, ..Self::bilinear_clamp() }
    }

    pub fn anisotropic_wrap(anisotropy: f32) -> Self {
        Self {
            filter_mip: Filter::Linear,
            address_mode: AddressMode::Wrap,
            anisotropy,
            ..Self::bilinear_clamp()
        }
    }

    /// Comparison sampler for shadow-map depth tests. The comparison
    /// direction depends on whether reverse-Z is active.
    pub fn compare_depth(reverse_z: bool) -> Self {
        Self {
            compare: if reverse_z { SamplerCompare::GreaterOrEqual } else { SamplerCompare::LessOrEqual },
            ..Self::bilinear_clamp()
        }
    }
}

/// Sampler resource trait
pub trait Sampler: Send + Sync {
    /// Unique id for binding deduplication
    fn id(&self) -> u64;

    fn desc(&self) -> &SamplerDesc;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}
