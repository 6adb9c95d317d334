//! CPU-side mesh data (vertices, indices, texture references) and geometry validation.

pub mod mesh;
pub mod texture;

pub use mesh::{GeometryError, MAX_BONE_INFLUENCE, MeshData, Vertex, validate_geometry};
pub use texture::{TextureKind, TextureRef};
