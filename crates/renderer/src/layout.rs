//! Fixed per-vertex attribute layout of [`Vertex`].

use std::mem::{offset_of, size_of};

use asset::Vertex;
use wgpu::{VertexBufferLayout, VertexFormat, VertexStepMode};

/// How the device interprets an attribute's components in the shader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// 32-bit floats, passed through unnormalized.
    Float,
    /// 32-bit signed integers, kept as integers (never converted to float).
    Int,
}

/// One attribute slot: `components` values of `kind` at `offset` inside a vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub slot: u32,
    pub components: u32,
    pub kind: AttributeKind,
    pub offset: u32,
}

impl VertexAttribute {
    const fn float(slot: u32, components: u32, offset: usize) -> Self {
        Self {
            slot,
            components,
            kind: AttributeKind::Float,
            offset: offset as u32,
        }
    }

    const fn int(slot: u32, components: u32, offset: usize) -> Self {
        Self {
            slot,
            components,
            kind: AttributeKind::Int,
            offset: offset as u32,
        }
    }

    /// Size in bytes of one attribute value.
    #[inline]
    pub const fn byte_size(&self) -> u32 {
        self.components * 4
    }

    /// Matching wgpu vertex format.
    pub fn wgpu_format(&self) -> VertexFormat {
        match (self.kind, self.components) {
            (AttributeKind::Float, 1) => VertexFormat::Float32,
            (AttributeKind::Float, 2) => VertexFormat::Float32x2,
            (AttributeKind::Float, 3) => VertexFormat::Float32x3,
            (AttributeKind::Float, _) => VertexFormat::Float32x4,
            (AttributeKind::Int, 1) => VertexFormat::Sint32,
            (AttributeKind::Int, 2) => VertexFormat::Sint32x2,
            (AttributeKind::Int, 3) => VertexFormat::Sint32x3,
            (AttributeKind::Int, _) => VertexFormat::Sint32x4,
        }
    }
}

pub const POSITION_SLOT: u32 = 0;
pub const NORMAL_SLOT: u32 = 1;
pub const UV_SLOT: u32 = 2;
pub const TANGENT_SLOT: u32 = 3;
pub const BITANGENT_SLOT: u32 = 4;
pub const BONE_IDS_SLOT: u32 = 5;
pub const BONE_WEIGHTS_SLOT: u32 = 6;

/// Bytes between consecutive vertices.
pub const VERTEX_STRIDE: u32 = size_of::<Vertex>() as u32;

/// Attribute table declared on every mesh's vertex array, in slot order.
pub const VERTEX_LAYOUT: [VertexAttribute; 7] = [
    VertexAttribute::float(POSITION_SLOT, 3, offset_of!(Vertex, position)),
    VertexAttribute::float(NORMAL_SLOT, 3, offset_of!(Vertex, normal)),
    VertexAttribute::float(UV_SLOT, 2, offset_of!(Vertex, uv)),
    VertexAttribute::float(TANGENT_SLOT, 3, offset_of!(Vertex, tangent)),
    VertexAttribute::float(BITANGENT_SLOT, 3, offset_of!(Vertex, bitangent)),
    VertexAttribute::int(BONE_IDS_SLOT, 4, offset_of!(Vertex, bone_ids)),
    VertexAttribute::float(BONE_WEIGHTS_SLOT, 4, offset_of!(Vertex, bone_weights)),
];

/// The same table for wgpu pipelines. Tightly packed, so the macro offsets agree.
pub const WGPU_ATTRIBUTES: [wgpu::VertexAttribute; 7] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x2,
    3 => Float32x3,
    4 => Float32x3,
    5 => Sint32x4,
    6 => Float32x4,
];

/// Vertex buffer layout for `wgpu::RenderPipelineDescriptor::vertex.buffers`.
pub const WGPU_VERTEX_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: VERTEX_STRIDE as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &WGPU_ATTRIBUTES,
};
