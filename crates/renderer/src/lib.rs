//! Renderer: device abstraction, vertex layout and the drawable [`Mesh`].
//!
//! The mesh never talks to a graphics API directly; it drives a
//! [`GraphicsDevice`]. [`RecordingDevice`] is the in-memory backend used for
//! headless runs and tests, and [`layout::WGPU_VERTEX_LAYOUT`] exposes the same
//! attribute table to wgpu pipelines.

use thiserror::Error;

pub mod device;
pub mod layout;
pub mod mesh;
pub mod recording;
pub mod sampler;

pub use asset::GeometryError;
pub use device::{BufferTarget, BufferUsage, DeviceError, GraphicsDevice};
pub use layout::{AttributeKind, VERTEX_LAYOUT, VERTEX_STRIDE, VertexAttribute};
pub use mesh::{Mesh, MeshHandles};
pub use recording::RecordingDevice;
pub use sampler::SamplerNames;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Malformed geometry: {0}")]
    MalformedGeometry(#[from] GeometryError),
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

pub type RenderResult<T> = Result<T, MeshError>;
