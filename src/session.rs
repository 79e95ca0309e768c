// ============================================================================
// session.rs — gpulife
// Session: every GPU resource for one grid configuration plus the generation
// counter, and the per-tick command encoding (compute then render).
// ============================================================================

use crate::binding::{BindingGrouping, BindingSet, Grouping, Slot};
use crate::config::{GridConfig, InitialState};
use crate::error::{InitError, TickError};
use crate::geometry::QUAD_VERTICES;
use crate::gpu::GpuContext;
use crate::pipeline::{create_pipelines, dispatch_extent, Pipelines, Programs};
use crate::world::WorldBuffers;

pub struct Session {
    id: u64,
    grid: GridConfig,
    world: WorldBuffers,
    pipelines: Pipelines,
    bindings: BindingSet,
    generation: u64,
}

impl Session {
    /// Allocate, build pipelines, then wire bindings. Any failure aborts
    /// before later stages run; nothing partially built escapes.
    pub fn build(
        gpu: &GpuContext,
        id: u64,
        grid: GridConfig,
        initial: &InitialState,
        programs: &Programs,
        format: wgpu::TextureFormat,
    ) -> Result<Self, InitError> {
        grid.validate()?;
        let cells = initial.materialize(grid)?;

        let world = WorldBuffers::allocate(gpu, grid, &cells)?;
        let pipelines = create_pipelines(gpu, grid, programs, format)?;
        let bindings = BindingSet::new(gpu, &pipelines.layout, &world)?;

        log::info!(
            "Session {} ready: {}x{} ({} cells)",
            id,
            grid.width,
            grid.height,
            grid.cell_count()
        );

        Ok(Self {
            id,
            grid,
            world,
            pipelines,
            bindings,
            generation: 0,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn grid(&self) -> GridConfig {
        self.grid
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Grouping whose compute pass runs on the next tick.
    pub fn active_grouping(&self) -> &BindingGrouping {
        self.bindings.get(Grouping::for_generation(self.generation))
    }

    /// Slot holding the cells of the current generation.
    pub fn current_slot(&self) -> Slot {
        self.active_grouping().input()
    }

    pub fn state_len(&self, slot: Slot) -> u32 {
        self.world.state(slot).cell_count()
    }

    /// Record one generation step: a compute dispatch through the active
    /// grouping, then a render pass that draws the cells it just wrote.
    pub fn encode_step(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let grouping = Grouping::for_generation(self.generation);
        let compute_group = self.bindings.get(grouping);
        // The flipped grouping reads, as input, the buffer compute writes.
        let render_group = self.bindings.get(grouping.flipped());
        debug_assert_eq!(render_group.input(), compute_group.output());

        let (dispatch_x, dispatch_y) = dispatch_extent(self.grid);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("life_step_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.compute);
            pass.set_bind_group(0, &compute_group.bind_group, &[]);
            pass.dispatch_workgroups(dispatch_x, dispatch_y, 1);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("cells_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color(self.generation + 1)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipelines.render);
            pass.set_bind_group(0, &render_group.bind_group, &[]);
            pass.set_vertex_buffer(0, self.world.geometry.slice(..));
            pass.draw(0..QUAD_VERTICES.len() as u32, 0..self.grid.cell_count());
        }
    }

    /// Called once the step encoded by `encode_step` has been submitted.
    pub(crate) fn advance(&mut self) {
        self.generation += 1;
    }

    /// Copy the current generation back to the CPU. Blocks until the GPU has
    /// finished all submitted work.
    pub fn read_cells(&self, gpu: &GpuContext) -> Result<Vec<u32>, TickError> {
        let source = &self.world.state(self.current_slot()).buffer;
        let size = source.size();

        let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cell_readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback_encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        gpu.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(TickError::ReadbackFailed(e.to_string())),
            Err(e) => return Err(TickError::ReadbackFailed(e.to_string())),
        }

        let data = slice.get_mapped_range();
        let cells: Vec<u32> = bytemuck::cast_slice(&data[..]).to_vec();
        drop(data);
        staging.unmap();

        Ok(cells)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        log::debug!(
            "Releasing session {} at generation {}",
            self.id,
            self.generation
        );
    }
}

/// Background color for the frame showing `generation`. Slow cosmetic pulse.
pub fn clear_color(generation: u64) -> wgpu::Color {
    const PERIOD: u64 = 64;
    let phase = (generation % PERIOD) as f64 / PERIOD as f64;
    let t = (phase * std::f64::consts::TAU).sin() * 0.5 + 0.5;
    wgpu::Color {
        r: 0.02 + 0.03 * t,
        g: 0.02,
        b: 0.08 + 0.06 * t,
        a: 1.0,
    }
}
