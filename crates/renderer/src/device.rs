//! Graphics device abstraction the mesh uploads to and draws through.
//!
//! The model is a bind-to-edit context: creating a buffer leaves it bound to its
//! target, attribute declarations read the bound vertex buffer and are captured
//! by the bound vertex array, and textures bind to the active unit. Backends own
//! the real context; every method must be called from the thread that owns it.

use std::fmt::Debug;

use thiserror::Error;

use crate::layout::VertexAttribute;

/// Device object allocation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Device out of memory")]
    OutOfMemory,
}

/// Bind point for a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Per-vertex attribute data.
    Vertex,
    /// Element indices; captured by the bound vertex array.
    Index,
}

/// Upload usage hint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    #[default]
    StaticDraw,
}

pub trait GraphicsDevice {
    type Buffer: Copy + Debug + PartialEq;
    type VertexArray: Copy + Debug + PartialEq;
    type Texture: Copy + Debug + PartialEq;
    type Program;
    type UniformLocation;

    fn create_vertex_array(&self) -> Result<Self::VertexArray, DeviceError>;
    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>);
    fn delete_vertex_array(&self, vertex_array: Self::VertexArray);

    /// Allocate a buffer, bind it to `target` and upload `data` in one transfer.
    /// The buffer stays bound.
    fn create_buffer(
        &self,
        target: BufferTarget,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<Self::Buffer, DeviceError>;
    fn delete_buffer(&self, buffer: Self::Buffer);

    /// Enable `attribute.slot` and point it at the bound vertex buffer.
    fn declare_attribute(&self, attribute: &VertexAttribute, stride: u32);

    fn active_texture(&self, unit: u32);
    /// Bind a 2D texture to the active unit.
    fn bind_texture(&self, texture: Self::Texture);

    fn uniform_location(&self, program: &Self::Program, name: &str)
    -> Option<Self::UniformLocation>;
    fn set_uniform_i32(&self, program: &Self::Program, location: &Self::UniformLocation, value: i32);

    /// Draw `index_count` `u32` indices from the bound vertex array as a triangle list.
    fn draw_indexed_triangles(&self, index_count: u32);
}
