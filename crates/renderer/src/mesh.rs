//! GPU mesh: uploads vertices/indices once, binds textures and draws per frame.

use std::rc::Rc;

use asset::{MeshData, TextureRef, Vertex, validate_geometry};

use crate::device::{BufferTarget, BufferUsage, DeviceError, GraphicsDevice};
use crate::layout::{VERTEX_LAYOUT, VERTEX_STRIDE};
use crate::sampler::SamplerNames;
use crate::{MeshError, RenderResult};

/// Device objects owned by a [`Mesh`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshHandles<A, B> {
    pub vertex_array: A,
    pub vertex_buffer: B,
    pub index_buffer: B,
}

/// A drawable sub-mesh.
///
/// Owns its vertex array and both buffers and deletes them on drop. Textures
/// are only referenced; their lifetime belongs to whoever created them.
pub struct Mesh<D: GraphicsDevice> {
    device: Rc<D>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    textures: Vec<TextureRef<D::Texture>>,
    index_count: u32,
    handles: MeshHandles<D::VertexArray, D::Buffer>,
}

impl<D: GraphicsDevice> Mesh<D> {
    /// Validate the geometry and upload it to `device`.
    ///
    /// Fails with [`MeshError::MalformedGeometry`] before touching the device if
    /// the indices are not a triangle list over `vertices`, and with
    /// [`MeshError::Device`] if an allocation fails.
    pub fn new(
        device: Rc<D>,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        textures: Vec<TextureRef<D::Texture>>,
    ) -> RenderResult<Self> {
        validate_geometry(&vertices, &indices)?;
        let index_count = indices.len() as u32;

        let handles = upload(device.as_ref(), &vertices, &indices)?;
        log::debug!(
            "Mesh uploaded: {} vertices, {} indices, {} textures ({:?})",
            vertices.len(),
            indices.len(),
            textures.len(),
            handles
        );

        Ok(Self {
            device,
            vertices,
            indices,
            textures,
            index_count,
            handles,
        })
    }

    pub fn from_data(device: Rc<D>, data: MeshData<D::Texture>) -> RenderResult<Self> {
        Self::new(device, data.vertices, data.indices, data.textures)
    }

    /// Bind textures to units `0..N`, draw every index once, restore unit 0.
    ///
    /// A texture whose sampler uniform the program does not declare is skipped
    /// with a warning; the draw still happens.
    pub fn draw(&self, program: &D::Program) {
        let device = self.device.as_ref();
        let mut names = SamplerNames::new();

        for (unit, texture) in (0u32..).zip(&self.textures) {
            device.active_texture(unit);
            let name = names.next_name(&texture.kind);
            match device.uniform_location(program, &name) {
                Some(location) => {
                    device.set_uniform_i32(program, &location, unit as i32);
                    device.bind_texture(texture.handle);
                    log::trace!("Bound '{}' to unit {} as {}", texture.path, unit, name);
                }
                None => log::warn!(
                    "Program has no sampler '{}'; skipping texture '{}' on unit {}",
                    name,
                    texture.path,
                    unit
                ),
            }
        }

        device.bind_vertex_array(Some(self.handles.vertex_array));
        device.draw_indexed_triangles(self.index_count);
        device.bind_vertex_array(None);

        device.active_texture(0);
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn textures(&self) -> &[TextureRef<D::Texture>] {
        &self.textures
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    #[inline]
    pub fn handles(&self) -> MeshHandles<D::VertexArray, D::Buffer> {
        self.handles
    }
}

impl<D: GraphicsDevice> Drop for Mesh<D> {
    fn drop(&mut self) {
        let MeshHandles {
            vertex_array,
            vertex_buffer,
            index_buffer,
        } = self.handles;
        self.device.delete_vertex_array(vertex_array);
        self.device.delete_buffer(vertex_buffer);
        self.device.delete_buffer(index_buffer);
        log::debug!("Mesh released ({:?})", self.handles);
    }
}

/// Create the vertex array and both buffers, then declare the vertex layout.
/// Anything created before a failed allocation is deleted again.
fn upload<D: GraphicsDevice>(
    device: &D,
    vertices: &[Vertex],
    indices: &[u32],
) -> RenderResult<MeshHandles<D::VertexArray, D::Buffer>> {
    let vertex_array = device.create_vertex_array()?;
    device.bind_vertex_array(Some(vertex_array));

    let abort = |buffers: &[D::Buffer], err: DeviceError| -> MeshError {
        device.bind_vertex_array(None);
        for &buffer in buffers {
            device.delete_buffer(buffer);
        }
        device.delete_vertex_array(vertex_array);
        log::error!("Mesh upload failed: {}", err);
        MeshError::Device(err)
    };

    let vertex_buffer = device
        .create_buffer(
            BufferTarget::Vertex,
            bytemuck::cast_slice(vertices),
            BufferUsage::StaticDraw,
        )
        .map_err(|err| abort(&[], err))?;
    let index_buffer = device
        .create_buffer(
            BufferTarget::Index,
            bytemuck::cast_slice(indices),
            BufferUsage::StaticDraw,
        )
        .map_err(|err| abort(&[vertex_buffer], err))?;

    for attribute in &VERTEX_LAYOUT {
        device.declare_attribute(attribute, VERTEX_STRIDE);
    }
    device.bind_vertex_array(None);

    Ok(MeshHandles {
        vertex_array,
        vertex_buffer,
        index_buffer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{AttributeKind, BONE_IDS_SLOT};
    use crate::recording::{AttributeValue, DeviceCall, ProgramId, RecordingDevice, TextureId};
    use asset::{GeometryError, TextureKind};

    const ALL_SAMPLERS: &[&str] = &[
        "texture_diffuse1",
        "texture_diffuse2",
        "texture_specular1",
        "texture_normal1",
        "texture_height1",
    ];

    fn quad_vertices() -> Vec<Vertex> {
        vec![
            Vertex::new([-1.0, -1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, -1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([1.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([-1.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ]
    }

    const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

    fn texture(device: &RecordingDevice, kind: TextureKind) -> TextureRef<TextureId> {
        let path = format!("{}.png", kind);
        TextureRef::new(device.create_texture(), kind, path)
    }

    fn quad_mesh(
        kinds: &[TextureKind],
    ) -> (Rc<RecordingDevice>, ProgramId, Mesh<RecordingDevice>) {
        let device = Rc::new(RecordingDevice::new());
        let program = device.create_program(ALL_SAMPLERS);
        let textures = kinds.iter().cloned().map(|k| texture(&device, k)).collect();
        let mesh = Mesh::new(
            device.clone(),
            quad_vertices(),
            QUAD_INDICES.to_vec(),
            textures,
        )
        .expect("valid quad");
        device.clear_calls();
        (device, program, mesh)
    }

    fn draws(calls: &[DeviceCall]) -> Vec<&DeviceCall> {
        calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::DrawIndexed { .. }))
            .collect()
    }

    #[test]
    fn construction_creates_three_live_objects() {
        let (device, _, mesh) = quad_mesh(&[]);
        let handles = mesh.handles();
        assert_eq!(device.live_objects(), 3);
        assert_eq!(device.index_buffer_of(handles.vertex_array), Some(handles.index_buffer));
        assert_eq!(
            device.buffer_data(handles.vertex_buffer).map(|d| d.len()),
            Some(4 * VERTEX_STRIDE as usize)
        );
        assert_eq!(
            device.buffer_data(handles.index_buffer),
            Some(bytemuck::cast_slice::<u32, u8>(&QUAD_INDICES).to_vec())
        );
        assert_eq!(device.bound_vertex_array(), None);
    }

    #[test]
    fn uploads_use_static_usage_and_declare_every_slot() {
        let device = Rc::new(RecordingDevice::new());
        let _mesh = Mesh::new(device.clone(), quad_vertices(), QUAD_INDICES.to_vec(), Vec::new())
            .unwrap();
        let calls = device.calls();
        let usages: Vec<BufferUsage> = calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::CreateBuffer { usage, .. } => Some(*usage),
                _ => None,
            })
            .collect();
        assert_eq!(usages, [BufferUsage::StaticDraw, BufferUsage::StaticDraw]);
        let declared: Vec<u32> = calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::DeclareAttribute { attribute, stride } => {
                    assert_eq!(*stride, VERTEX_STRIDE);
                    Some(attribute.slot)
                }
                _ => None,
            })
            .collect();
        assert_eq!(declared, [0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn out_of_range_index_fails_without_allocating() {
        let device = Rc::new(RecordingDevice::new());
        let result = Mesh::new(device.clone(), quad_vertices(), vec![0, 1, 4], Vec::new());
        assert!(matches!(
            result,
            Err(MeshError::MalformedGeometry(GeometryError::IndexOutOfRange { index: 4, .. }))
        ));
        assert!(device.calls().is_empty());
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn non_triangle_index_count_is_malformed() {
        let device = Rc::new(RecordingDevice::new());
        let result = Mesh::new(device, quad_vertices(), vec![0, 1], Vec::new());
        assert!(matches!(result, Err(MeshError::MalformedGeometry(_))));
    }

    #[test]
    fn failed_allocation_releases_partial_objects() {
        // vertex array + vertex buffer succeed, index buffer fails
        let device = Rc::new(RecordingDevice::with_allocation_budget(2));
        let result = Mesh::new(device.clone(), quad_vertices(), QUAD_INDICES.to_vec(), Vec::new());
        assert!(matches!(result, Err(MeshError::Device(_))));
        assert_eq!(device.live_objects(), 0);
        assert_eq!(device.bound_vertex_array(), None);
    }

    #[test]
    fn drop_releases_all_device_objects() {
        let (device, _, mesh) = quad_mesh(&[TextureKind::Diffuse]);
        let handles = mesh.handles();
        drop(mesh);
        assert_eq!(device.live_objects(), 0);
        let calls = device.calls();
        assert!(calls.contains(&DeviceCall::DeleteVertexArray(handles.vertex_array)));
        assert!(calls.contains(&DeviceCall::DeleteBuffer(handles.vertex_buffer)));
        assert!(calls.contains(&DeviceCall::DeleteBuffer(handles.index_buffer)));
    }

    #[test]
    fn quad_with_one_diffuse_texture() {
        let (device, program, mesh) = quad_mesh(&[TextureKind::Diffuse]);
        mesh.draw(&program);

        let tex = mesh.textures()[0].handle;
        let vao = mesh.handles().vertex_array;
        assert_eq!(
            device.calls(),
            [
                DeviceCall::ActiveTexture(0),
                DeviceCall::SetUniform {
                    program,
                    name: "texture_diffuse1".into(),
                    value: 0
                },
                DeviceCall::BindTexture { unit: 0, texture: tex },
                DeviceCall::BindVertexArray(Some(vao)),
                DeviceCall::DrawIndexed {
                    vertex_array: Some(vao),
                    index_count: 6
                },
                DeviceCall::BindVertexArray(None),
                DeviceCall::ActiveTexture(0),
            ]
        );
        assert_eq!(device.uniform_value(program, "texture_diffuse1"), Some(0));
        assert_eq!(device.bound_texture(0), Some(tex));
    }

    #[test]
    fn per_type_ordinals_and_sequential_units() {
        let (device, program, mesh) = quad_mesh(&[
            TextureKind::Diffuse,
            TextureKind::Specular,
            TextureKind::Diffuse,
        ]);
        mesh.draw(&program);

        let calls = device.calls();
        let units: Vec<u32> = calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::ActiveTexture(u) => Some(*u),
                _ => None,
            })
            .collect();
        // units 0..3, then the reset
        assert_eq!(units, [0, 1, 2, 0]);

        let uniforms: Vec<(String, i32)> = calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::SetUniform { name, value, .. } => Some((name.clone(), *value)),
                _ => None,
            })
            .collect();
        assert_eq!(
            uniforms,
            [
                ("texture_diffuse1".to_owned(), 0),
                ("texture_specular1".to_owned(), 1),
                ("texture_diffuse2".to_owned(), 2),
            ]
        );
        for (unit, texture) in mesh.textures().iter().enumerate() {
            assert_eq!(device.bound_texture(unit as u32), Some(texture.handle));
        }
    }

    #[test]
    fn repeated_draws_are_identical_and_end_on_unit_zero() {
        let (device, program, mesh) = quad_mesh(&[
            TextureKind::Diffuse,
            TextureKind::Normal,
            TextureKind::Height,
            TextureKind::Specular,
        ]);
        mesh.draw(&program);
        let first = device.calls();
        assert_eq!(device.active_unit(), 0);

        device.clear_calls();
        mesh.draw(&program);
        let second = device.calls();
        assert_eq!(device.active_unit(), 0);

        assert_eq!(first, second);
        assert_eq!(draws(&first).len(), 1);
        assert_eq!(
            draws(&second),
            [&DeviceCall::DrawIndexed {
                vertex_array: Some(mesh.handles().vertex_array),
                index_count: mesh.indices().len() as u32
            }]
        );
    }

    #[test]
    fn unresolved_sampler_skips_texture_but_still_draws() {
        let device = Rc::new(RecordingDevice::new());
        let program = device.create_program(&["texture_diffuse1"]);
        let textures = vec![
            texture(&device, TextureKind::Specular),
            texture(&device, TextureKind::Diffuse),
        ];
        let mesh = Mesh::new(device.clone(), quad_vertices(), QUAD_INDICES.to_vec(), textures)
            .unwrap();
        device.clear_calls();

        mesh.draw(&program);

        assert_eq!(device.bound_texture(0), None);
        assert_eq!(device.bound_texture(1), Some(mesh.textures()[1].handle));
        assert_eq!(device.uniform_value(program, "texture_diffuse1"), Some(1));
        assert_eq!(draws(&device.calls()).len(), 1);
        assert_eq!(device.active_unit(), 0);
    }

    #[test]
    fn bone_ids_round_trip_as_integers() {
        let device = Rc::new(RecordingDevice::new());
        let vertices: Vec<Vertex> = quad_vertices()
            .into_iter()
            .map(|v| v.with_bones([0, 1, 2, 3], [0.1, 0.2, 0.3, 0.4]))
            .collect();
        let mesh = Mesh::new(device.clone(), vertices, QUAD_INDICES.to_vec(), Vec::new()).unwrap();
        let vao = mesh.handles().vertex_array;

        assert_eq!(
            device.declared_attribute(vao, BONE_IDS_SLOT).map(|a| a.kind),
            Some(AttributeKind::Int)
        );
        for vertex in 0..4 {
            assert_eq!(
                device.read_attribute(vao, BONE_IDS_SLOT, vertex),
                Some(AttributeValue::Int(vec![0, 1, 2, 3]))
            );
        }
        assert_eq!(
            device.read_attribute(vao, 6, 2),
            Some(AttributeValue::Float(vec![0.1, 0.2, 0.3, 0.4]))
        );
    }

    #[test]
    fn positions_read_back_per_vertex() {
        let (device, _, mesh) = quad_mesh(&[]);
        let vao = mesh.handles().vertex_array;
        assert_eq!(
            device.read_attribute(vao, 0, 2),
            Some(AttributeValue::Float(vec![1.0, 1.0, 0.0]))
        );
        assert_eq!(
            device.read_attribute(vao, 2, 3),
            Some(AttributeValue::Float(vec![0.0, 1.0]))
        );
    }

    #[test]
    fn empty_mesh_uploads_and_draws_nothing() {
        let device = Rc::new(RecordingDevice::new());
        let program = device.create_program(ALL_SAMPLERS);
        let one_vertex = quad_vertices()[..1].to_vec();
        let mesh = Mesh::new(device.clone(), one_vertex, Vec::new(), Vec::new())
            .expect("empty index list is a valid triangle list");
        assert_eq!(device.live_objects(), 3);
        assert_eq!(device.buffer_data(mesh.handles().index_buffer), Some(Vec::new()));
        device.clear_calls();

        mesh.draw(&program);
        assert_eq!(
            draws(&device.calls()),
            [&DeviceCall::DrawIndexed {
                vertex_array: Some(mesh.handles().vertex_array),
                index_count: 0
            }]
        );

        let no_vertices = Mesh::new(device.clone(), Vec::new(), Vec::new(), Vec::new());
        assert!(no_vertices.is_ok());
        drop(no_vertices);
        drop(mesh);
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn unrecognized_tag_binds_under_its_raw_name() {
        let device = Rc::new(RecordingDevice::new());
        let program = device.create_program(&["texture_diffuse1", "texture_emissive"]);
        let textures = vec![
            texture(&device, TextureKind::from_tag("texture_emissive")),
            texture(&device, TextureKind::Diffuse),
        ];
        let mesh = Mesh::new(device.clone(), quad_vertices(), QUAD_INDICES.to_vec(), textures)
            .unwrap();
        device.clear_calls();

        mesh.draw(&program);

        let uniforms: Vec<(String, i32)> = device
            .calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::SetUniform { name, value, .. } => Some((name.clone(), *value)),
                _ => None,
            })
            .collect();
        assert_eq!(
            uniforms,
            [
                ("texture_emissive".to_owned(), 0),
                ("texture_diffuse1".to_owned(), 1),
            ]
        );
        assert_eq!(device.bound_texture(0), Some(mesh.textures()[0].handle));
        assert_eq!(device.bound_texture(1), Some(mesh.textures()[1].handle));
        assert_eq!(device.active_unit(), 0);
    }

    #[test]
    fn from_data_matches_new() {
        let device = Rc::new(RecordingDevice::new());
        let data = MeshData::new(
            quad_vertices(),
            QUAD_INDICES.to_vec(),
            vec![texture(&device, TextureKind::Height)],
        );
        let mesh = Mesh::from_data(device, data.clone()).unwrap();
        assert_eq!(mesh.vertices(), data.vertices.as_slice());
        assert_eq!(mesh.indices(), data.indices.as_slice());
        assert_eq!(mesh.textures(), data.textures.as_slice());
        assert_eq!(mesh.index_count(), 6);
    }
}
