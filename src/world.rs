// ============================================================================
// world.rs — gpulife
// Resource allocation: geometry table, uniform parameters, and the pair of
// cell-state buffers, populated with their initial contents.
// ============================================================================

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::binding::Slot;
use crate::config::GridConfig;
use crate::error::InitError;
use crate::geometry::QUAD_VERTICES;
use crate::gpu::{GpuContext, ScopeFault};

// ======================== Uniform Struct ========================

/// Grid dimensions as seen by both programs. Padded to 16 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GridUniforms {
    pub size: [f32; 2],
    pub _pad: [f32; 2],
}

impl GridUniforms {
    pub fn new(grid: GridConfig) -> Self {
        Self {
            size: [grid.width as f32, grid.height as f32],
            _pad: [0.0; 2],
        }
    }
}

// ======================== State Buffers ========================

/// One generation's worth of cell words in GPU memory.
pub struct StateBuffer {
    pub buffer: wgpu::Buffer,
    cells: u32,
}

impl StateBuffer {
    pub fn cell_count(&self) -> u32 {
        self.cells
    }
}

// ======================== WorldBuffers ========================

pub struct WorldBuffers {
    pub geometry: wgpu::Buffer,
    pub uniforms: wgpu::Buffer,
    s0: StateBuffer,
    s1: StateBuffer,
}

impl WorldBuffers {
    /// Allocate every buffer for `grid`. `initial` seeds S0; S1 starts zeroed.
    pub fn allocate(
        gpu: &GpuContext,
        grid: GridConfig,
        initial: &[u32],
    ) -> Result<Self, InitError> {
        let n = grid.cell_count();
        if initial.len() != n as usize {
            return Err(InitError::InvalidConfig(format!(
                "initial state has {} cells, grid {}x{} needs {}",
                initial.len(),
                grid.width,
                grid.height,
                n
            )));
        }

        let limit = gpu.device.limits().max_storage_buffer_binding_size as u64;
        if grid.state_bytes() > limit {
            return Err(InitError::ResourceAllocationFailure(format!(
                "state buffer of {} bytes exceeds device binding limit of {} bytes",
                grid.state_bytes(),
                limit
            )));
        }

        let zeros = vec![0u32; n as usize];
        let usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST;

        let buffers = gpu.guarded(|device| {
            let create_state_buffer = |label: &str, data: &[u32]| StateBuffer {
                buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytemuck::cast_slice(data),
                    usage,
                }),
                cells: n,
            };

            let geometry = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("cell_quad"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });

            let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("grid_uniforms"),
                contents: bytemuck::bytes_of(&GridUniforms::new(grid)),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

            WorldBuffers {
                geometry,
                uniforms,
                s0: create_state_buffer("cell_state_0", initial),
                s1: create_state_buffer("cell_state_1", &zeros),
            }
        });

        buffers.map_err(|fault| match fault {
            ScopeFault::OutOfMemory(msg) | ScopeFault::Validation(msg) => {
                InitError::ResourceAllocationFailure(msg)
            }
        })
    }

    pub fn state(&self, slot: Slot) -> &StateBuffer {
        match slot {
            Slot::S0 => &self.s0,
            Slot::S1 => &self.s1,
        }
    }
}
