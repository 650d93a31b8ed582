/// Conversions from the engine's backend-agnostic enums to Vulkan

use ash::vk;
use vesper_engine::rhi::{
    AddressMode, BlendFactor, BlendOp, CompareOp, CullMode, FillMode, Filter, ImageLayout,
    PrimitiveTopology, SamplerCompare, TextureFormat,
};

pub fn format(value: TextureFormat) -> vk::Format {
    match value {
        TextureFormat::R8_UNORM => vk::Format::R8_UNORM,
        TextureFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::R11G11B10_FLOAT => vk::Format::B10G11R11_UFLOAT_PACK32,
        TextureFormat::R16_FLOAT => vk::Format::R16_SFLOAT,
        TextureFormat::R16G16_FLOAT => vk::Format::R16G16_SFLOAT,
        TextureFormat::R16G16B16A16_FLOAT => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::R32_FLOAT => vk::Format::R32_SFLOAT,
        TextureFormat::R32G32_FLOAT => vk::Format::R32G32_SFLOAT,
        TextureFormat::R32G32B32A32_FLOAT => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::D32_FLOAT => vk::Format::D32_SFLOAT,
        TextureFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
    }
}

pub fn image_layout(value: ImageLayout) -> vk::ImageLayout {
    match value {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ImageLayout::ShaderRead => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::Present => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn topology(value: PrimitiveTopology) -> vk::PrimitiveTopology {
    match value {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
    }
}

pub fn cull_mode(value: CullMode) -> vk::CullModeFlags {
    match value {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub fn polygon_mode(value: FillMode) -> vk::PolygonMode {
    match value {
        FillMode::Solid => vk::PolygonMode::FILL,
        FillMode::Wireframe => vk::PolygonMode::LINE,
    }
}

pub fn compare_op(value: CompareOp) -> vk::CompareOp {
    match value {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

pub fn blend_factor(value: BlendFactor) -> vk::BlendFactor {
    match value {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
    }
}

pub fn blend_op(value: BlendOp) -> vk::BlendOp {
    match value {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub fn filter(value: Filter) -> vk::Filter {
    match value {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub fn mipmap_mode(value: Filter) -> vk::SamplerMipmapMode {
    match value {
        Filter::Nearest => vk::SamplerMipmapMode::NEAREST,
        Filter::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn address_mode(value: AddressMode) -> vk::SamplerAddressMode {
    match value {
        AddressMode::Wrap => vk::SamplerAddressMode::REPEAT,
        AddressMode::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::Mirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
    }
}

pub fn sampler_compare(value: SamplerCompare) -> Option<vk::CompareOp> {
    match value {
        SamplerCompare::Disabled => None,
        SamplerCompare::GreaterOrEqual => Some(vk::CompareOp::GREATER_OR_EQUAL),
        SamplerCompare::LessOrEqual => Some(vk::CompareOp::LESS_OR_EQUAL),
    }
}

/// The image aspect for a format
pub fn aspect_mask(value: TextureFormat) -> vk::ImageAspectFlags {
    if value.is_depth() {
        if value.has_stencil() {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        }
    } else {
        vk::ImageAspectFlags::COLOR
    }
}
