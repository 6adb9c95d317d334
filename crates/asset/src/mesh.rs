//! CPU-side mesh representation handed to the renderer for upload.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use thiserror::Error;

use crate::texture::TextureRef;

/// Number of bone influences stored per vertex.
pub const MAX_BONE_INFLUENCE: usize = 4;

/// Vertex with full tangent frame and skinning data. Values are in object space.
///
/// The field order is the upload layout: the renderer declares attribute
/// offsets straight from this struct, so it must stay `#[repr(C)]` and free of
/// padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    /// Indices into an external skeleton. 0 or -1 mark an unused slot.
    pub bone_ids: [i32; MAX_BONE_INFLUENCE],
    /// Parallel to `bone_ids`; expected to sum to ~1.0 when bones are used.
    pub bone_weights: [f32; MAX_BONE_INFLUENCE],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            ..Self::default()
        }
    }

    pub fn from_glam(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self::new(position.to_array(), normal.to_array(), uv.to_array())
    }

    pub fn with_tangent_frame(mut self, tangent: [f32; 3], bitangent: [f32; 3]) -> Self {
        self.tangent = tangent;
        self.bitangent = bitangent;
        self
    }

    pub fn with_bones(
        mut self,
        ids: [i32; MAX_BONE_INFLUENCE],
        weights: [f32; MAX_BONE_INFLUENCE],
    ) -> Self {
        self.bone_ids = ids;
        self.bone_weights = weights;
        self
    }

    /// Sum of the bone weights. Not validated anywhere; skinning code owns that rule.
    #[inline]
    pub fn bone_weight_sum(&self) -> f32 {
        self.bone_weights.iter().sum()
    }
}

/// Reasons a vertex/index pair cannot be drawn as a triangle list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("index count {0} is not a multiple of 3")]
    IndexCountNotTriangles(usize),
    #[error("index {index} at position {position} is out of range (vertex count {vertex_count})")]
    IndexOutOfRange {
        position: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("vertex count {0} does not fit in a u32 index")]
    TooManyVertices(usize),
    #[error("index count {0} does not fit in a u32 draw count")]
    TooManyIndices(usize),
}

/// Checks that `indices` describe a triangle list over `vertices`.
pub fn validate_geometry(vertices: &[Vertex], indices: &[u32]) -> Result<(), GeometryError> {
    if u32::try_from(vertices.len()).is_err() {
        return Err(GeometryError::TooManyVertices(vertices.len()));
    }
    if u32::try_from(indices.len()).is_err() {
        return Err(GeometryError::TooManyIndices(indices.len()));
    }
    if indices.len() % 3 != 0 {
        return Err(GeometryError::IndexCountNotTriangles(indices.len()));
    }
    if let Some((position, &index)) = indices
        .iter()
        .enumerate()
        .find(|&(_, &i)| i as usize >= vertices.len())
    {
        return Err(GeometryError::IndexOutOfRange {
            position,
            index,
            vertex_count: vertices.len(),
        });
    }
    Ok(())
}

/// Indexed triangle mesh plus the textures it samples.
///
/// `H` is the device texture handle type; the textures are referenced, not owned.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshData<H> {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub textures: Vec<TextureRef<H>>,
}

impl<H> MeshData<H> {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, textures: Vec<TextureRef<H>>) -> Self {
        Self {
            vertices,
            indices,
            textures,
        }
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        validate_geometry(&self.vertices, &self.indices)
    }

    /// Returns `true` if the geometry can be uploaded and drawn. Empty geometry
    /// is valid and draws nothing.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

impl<H> Default for MeshData<H> {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }
}
