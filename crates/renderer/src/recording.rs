//! In-memory device that records every call and keeps the state a real context would.
//! Used for headless runs and tests; nothing is rendered.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::device::{BufferTarget, BufferUsage, DeviceError, GraphicsDevice};
use crate::layout::{AttributeKind, VertexAttribute};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Resolved sampler uniform of a recorded program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub program: ProgramId,
    pub index: u32,
}

/// One device call, in issue order.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    CreateVertexArray(VertexArrayId),
    BindVertexArray(Option<VertexArrayId>),
    DeleteVertexArray(VertexArrayId),
    CreateBuffer {
        buffer: BufferId,
        target: BufferTarget,
        usage: BufferUsage,
        len: usize,
    },
    DeleteBuffer(BufferId),
    DeclareAttribute {
        attribute: VertexAttribute,
        stride: u32,
    },
    ActiveTexture(u32),
    BindTexture {
        unit: u32,
        texture: TextureId,
    },
    SetUniform {
        program: ProgramId,
        name: String,
        value: i32,
    },
    DrawIndexed {
        vertex_array: Option<VertexArrayId>,
        index_count: u32,
    },
}

/// Attribute value decoded from uploaded vertex bytes.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Float(Vec<f32>),
    Int(Vec<i32>),
}

#[derive(Debug)]
struct StoredBuffer {
    target: BufferTarget,
    data: Vec<u8>,
}

#[derive(Clone, Copy, Debug)]
struct AttributeBinding {
    attribute: VertexAttribute,
    stride: u32,
    buffer: BufferId,
}

#[derive(Debug, Default)]
struct VertexArrayState {
    attributes: BTreeMap<u32, AttributeBinding>,
    index_buffer: Option<BufferId>,
}

#[derive(Debug, Default)]
struct ProgramState {
    samplers: Vec<String>,
    values: HashMap<String, i32>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    /// Remaining buffer/vertex-array allocations; `None` is unlimited.
    budget: Option<usize>,
    buffers: HashMap<BufferId, StoredBuffer>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayState>,
    programs: HashMap<ProgramId, ProgramState>,
    bound_vertex_array: Option<VertexArrayId>,
    bound_vertex_buffer: Option<BufferId>,
    active_unit: u32,
    texture_units: BTreeMap<u32, TextureId>,
    calls: Vec<DeviceCall>,
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn allocate(&mut self) -> Result<u32, DeviceError> {
        if let Some(budget) = self.budget.as_mut() {
            if *budget == 0 {
                return Err(DeviceError::OutOfMemory);
            }
            *budget -= 1;
        }
        Ok(self.next_id())
    }
}

/// Fake [`GraphicsDevice`] backend.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    state: Mutex<State>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that fails with [`DeviceError::OutOfMemory`] after `allocations`
    /// buffers or vertex arrays have been created.
    pub fn with_allocation_budget(allocations: usize) -> Self {
        let device = Self::new();
        device.state.lock().budget = Some(allocations);
        device
    }

    /// Stand-in for an externally cached texture.
    pub fn create_texture(&self) -> TextureId {
        TextureId(self.state.lock().next_id())
    }

    /// Program exposing the given sampler uniforms.
    pub fn create_program(&self, samplers: &[&str]) -> ProgramId {
        let mut state = self.state.lock();
        let id = ProgramId(state.next_id());
        state.programs.insert(
            id,
            ProgramState {
                samplers: samplers.iter().map(|s| (*s).to_owned()).collect(),
                values: HashMap::new(),
            },
        );
        id
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn active_unit(&self) -> u32 {
        self.state.lock().active_unit
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.state.lock().texture_units.get(&unit).copied()
    }

    pub fn bound_vertex_array(&self) -> Option<VertexArrayId> {
        self.state.lock().bound_vertex_array
    }

    pub fn uniform_value(&self, program: ProgramId, name: &str) -> Option<i32> {
        let state = self.state.lock();
        state.programs.get(&program)?.values.get(name).copied()
    }

    /// Buffers plus vertex arrays that have been created and not deleted.
    pub fn live_objects(&self) -> usize {
        let state = self.state.lock();
        state.buffers.len() + state.vertex_arrays.len()
    }

    pub fn buffer_data(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&buffer).map(|b| b.data.clone())
    }

    pub fn buffer_target(&self, buffer: BufferId) -> Option<BufferTarget> {
        self.state.lock().buffers.get(&buffer).map(|b| b.target)
    }

    /// Element buffer captured by `vertex_array`.
    pub fn index_buffer_of(&self, vertex_array: VertexArrayId) -> Option<BufferId> {
        self.state.lock().vertex_arrays.get(&vertex_array)?.index_buffer
    }

    pub fn declared_attribute(&self, vertex_array: VertexArrayId, slot: u32) -> Option<VertexAttribute> {
        let state = self.state.lock();
        let binding = state.vertex_arrays.get(&vertex_array)?.attributes.get(&slot)?;
        Some(binding.attribute)
    }

    /// Read attribute `slot` of vertex `vertex` back from device memory, decoded
    /// the way the vertex array declared it.
    pub fn read_attribute(
        &self,
        vertex_array: VertexArrayId,
        slot: u32,
        vertex: usize,
    ) -> Option<AttributeValue> {
        let state = self.state.lock();
        let binding = state.vertex_arrays.get(&vertex_array)?.attributes.get(&slot)?;
        let data = &state.buffers.get(&binding.buffer)?.data;
        let start = vertex * binding.stride as usize + binding.attribute.offset as usize;
        let end = start + binding.attribute.byte_size() as usize;
        let words = data.get(start..end)?.chunks_exact(4);
        Some(match binding.attribute.kind {
            AttributeKind::Float => AttributeValue::Float(
                words.map(bytemuck::pod_read_unaligned::<f32>).collect(),
            ),
            AttributeKind::Int => {
                AttributeValue::Int(words.map(bytemuck::pod_read_unaligned::<i32>).collect())
            }
        })
    }
}

impl GraphicsDevice for RecordingDevice {
    type Buffer = BufferId;
    type VertexArray = VertexArrayId;
    type Texture = TextureId;
    type Program = ProgramId;
    type UniformLocation = UniformLocation;

    fn create_vertex_array(&self) -> Result<VertexArrayId, DeviceError> {
        let mut state = self.state.lock();
        let id = VertexArrayId(state.allocate()?);
        state.vertex_arrays.insert(id, VertexArrayState::default());
        state.calls.push(DeviceCall::CreateVertexArray(id));
        Ok(id)
    }

    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayId>) {
        let mut state = self.state.lock();
        state.bound_vertex_array = vertex_array;
        state.calls.push(DeviceCall::BindVertexArray(vertex_array));
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) {
        let mut state = self.state.lock();
        if state.vertex_arrays.remove(&vertex_array).is_none() {
            log::warn!("Deleting unknown vertex array {:?}", vertex_array);
        }
        if state.bound_vertex_array == Some(vertex_array) {
            state.bound_vertex_array = None;
        }
        state.calls.push(DeviceCall::DeleteVertexArray(vertex_array));
    }

    fn create_buffer(
        &self,
        target: BufferTarget,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<BufferId, DeviceError> {
        let mut state = self.state.lock();
        let id = BufferId(state.allocate()?);
        state.buffers.insert(
            id,
            StoredBuffer {
                target,
                data: data.to_vec(),
            },
        );
        match target {
            BufferTarget::Vertex => state.bound_vertex_buffer = Some(id),
            BufferTarget::Index => {
                if let Some(vao) = state.bound_vertex_array {
                    if let Some(vao_state) = state.vertex_arrays.get_mut(&vao) {
                        vao_state.index_buffer = Some(id);
                    }
                }
            }
        }
        state.calls.push(DeviceCall::CreateBuffer {
            buffer: id,
            target,
            usage,
            len: data.len(),
        });
        Ok(id)
    }

    fn delete_buffer(&self, buffer: BufferId) {
        let mut state = self.state.lock();
        if state.buffers.remove(&buffer).is_none() {
            log::warn!("Deleting unknown buffer {:?}", buffer);
        }
        if state.bound_vertex_buffer == Some(buffer) {
            state.bound_vertex_buffer = None;
        }
        state.calls.push(DeviceCall::DeleteBuffer(buffer));
    }

    fn declare_attribute(&self, attribute: &VertexAttribute, stride: u32) {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::DeclareAttribute {
            attribute: *attribute,
            stride,
        });
        let (Some(vao), Some(buffer)) = (state.bound_vertex_array, state.bound_vertex_buffer) else {
            log::warn!(
                "Attribute {} declared without a bound vertex array and vertex buffer",
                attribute.slot
            );
            return;
        };
        if let Some(vao_state) = state.vertex_arrays.get_mut(&vao) {
            vao_state.attributes.insert(
                attribute.slot,
                AttributeBinding {
                    attribute: *attribute,
                    stride,
                    buffer,
                },
            );
        }
    }

    fn active_texture(&self, unit: u32) {
        let mut state = self.state.lock();
        state.active_unit = unit;
        state.calls.push(DeviceCall::ActiveTexture(unit));
    }

    fn bind_texture(&self, texture: TextureId) {
        let mut state = self.state.lock();
        let unit = state.active_unit;
        state.texture_units.insert(unit, texture);
        state.calls.push(DeviceCall::BindTexture { unit, texture });
    }

    fn uniform_location(&self, program: &ProgramId, name: &str) -> Option<UniformLocation> {
        let state = self.state.lock();
        let index = state
            .programs
            .get(program)?
            .samplers
            .iter()
            .position(|s| s == name)?;
        Some(UniformLocation {
            program: *program,
            index: index as u32,
        })
    }

    fn set_uniform_i32(&self, program: &ProgramId, location: &UniformLocation, value: i32) {
        let mut state = self.state.lock();
        if location.program != *program {
            log::warn!("Uniform location of {:?} used with {:?}", location.program, program);
            return;
        }
        let Some(program_state) = state.programs.get_mut(program) else {
            return;
        };
        let Some(name) = program_state.samplers.get(location.index as usize).cloned() else {
            return;
        };
        program_state.values.insert(name.clone(), value);
        state.calls.push(DeviceCall::SetUniform {
            program: *program,
            name,
            value,
        });
    }

    fn draw_indexed_triangles(&self, index_count: u32) {
        let mut state = self.state.lock();
        let vertex_array = state.bound_vertex_array;
        state.calls.push(DeviceCall::DrawIndexed {
            vertex_array,
            index_count,
        });
    }
}
