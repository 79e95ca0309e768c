// ============================================================================
// pipeline.rs — gpulife
// Compute and render pipeline creation against one shared bind-group layout
// (uniform grid, read-only input cells, read-write output cells).
// ============================================================================

use std::borrow::Cow;
use std::num::NonZeroU64;

use crate::config::GridConfig;
use crate::error::InitError;
use crate::geometry::Vertex;
use crate::gpu::{GpuContext, ScopeFault};
use crate::world::GridUniforms;

/// Edge length of the compute workgroup tile. Must match `@workgroup_size`
/// in `life_step.wgsl`.
pub const WORKGROUP_SIZE: u32 = 8;

pub const COMPUTE_ENTRY: &str = "main";
pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

// ======================== Programs ========================

/// WGSL source for the transition rule and the cell shading stage.
#[derive(Clone, Debug)]
pub struct Programs {
    pub compute: Cow<'static, str>,
    pub render: Cow<'static, str>,
}

impl Default for Programs {
    fn default() -> Self {
        Self {
            compute: Cow::Borrowed(include_str!("shaders/life_step.wgsl")),
            render: Cow::Borrowed(include_str!("shaders/cells.wgsl")),
        }
    }
}

// ======================== Pipelines ========================

pub struct Pipelines {
    pub layout: wgpu::BindGroupLayout,
    pub compute: wgpu::ComputePipeline,
    pub render: wgpu::RenderPipeline,
}

/// Workgroups needed to cover `grid` with `WORKGROUP_SIZE` tiles.
pub fn dispatch_extent(grid: GridConfig) -> (u32, u32) {
    (
        grid.width.div_ceil(WORKGROUP_SIZE),
        grid.height.div_ceil(WORKGROUP_SIZE),
    )
}

pub fn create_pipelines(
    gpu: &GpuContext,
    grid: GridConfig,
    programs: &Programs,
    surface_format: wgpu::TextureFormat,
) -> Result<Pipelines, InitError> {
    let state_bytes = NonZeroU64::new(grid.state_bytes())
        .ok_or_else(|| InitError::InvalidConfig("grid has no cells".into()))?;

    let built = gpu.guarded(|device| {
        // ---- Load shaders ----
        let step_shader = load_shader(device, "life_step", &programs.compute);
        let cells_shader = load_shader(device, "cells", &programs.render);

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cells_bgl"),
            entries: &[
                bgl_uniform(0),
                bgl_storage_ro(1, state_bytes),
                bgl_storage_rw(2, state_bytes),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("cells_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        // ================================================================
        // COMPUTE PIPELINE
        // ================================================================
        let compute = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("life_step_pipeline"),
            layout: Some(&pipeline_layout),
            module: &step_shader,
            entry_point: Some(COMPUTE_ENTRY),
            compilation_options: Default::default(),
            cache: None,
        });

        // ================================================================
        // RENDER PIPELINE
        // ================================================================
        let render = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("cells_render_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &cells_shader,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &cells_shader,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Pipelines {
            layout,
            compute,
            render,
        }
    });

    built.map_err(|fault| match fault {
        ScopeFault::Validation(msg) => InitError::ProgramCompileFailure(msg),
        ScopeFault::OutOfMemory(msg) => InitError::ResourceAllocationFailure(msg),
    })
}

// ======================== Helpers ========================

fn load_shader(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn bgl_uniform(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE | wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<GridUniforms>() as u64),
        },
        count: None,
    }
}

fn bgl_storage_ro(binding: u32, size: NonZeroU64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE | wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: Some(size),
        },
        count: None,
    }
}

fn bgl_storage_rw(binding: u32, size: NonZeroU64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: Some(size),
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::tests::test_gpu;

    #[test]
    fn test_dispatch_extent_covers_partial_tiles() {
        assert_eq!(dispatch_extent(GridConfig::new(64, 64)), (8, 8));
        assert_eq!(dispatch_extent(GridConfig::new(65, 1)), (9, 1));
        assert_eq!(dispatch_extent(GridConfig::new(1, 1)), (1, 1));
        assert_eq!(dispatch_extent(GridConfig::new(10, 17)), (2, 3));
    }

    #[test]
    fn test_compute_program_tile_matches_constant() {
        let programs = Programs::default();
        let tile = format!("@workgroup_size({WORKGROUP_SIZE}, {WORKGROUP_SIZE})");
        assert!(programs.compute.contains(&tile));
        assert!(programs.compute.contains(&format!("fn {COMPUTE_ENTRY}(")));
        assert!(programs.render.contains(&format!("fn {VERTEX_ENTRY}(")));
        assert!(programs.render.contains(&format!("fn {FRAGMENT_ENTRY}(")));
    }

    #[test]
    fn test_builtin_programs_build() {
        let Some(gpu) = test_gpu() else { return };

        let result = create_pipelines(
            &gpu,
            GridConfig::new(16, 16),
            &Programs::default(),
            wgpu::TextureFormat::Rgba8UnormSrgb,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_malformed_program_is_compile_failure() {
        let Some(gpu) = test_gpu() else { return };

        let programs = Programs {
            compute: Cow::Borrowed("@compute @workgroup_size(8, 8) fn main( {"),
            ..Programs::default()
        };
        let result = create_pipelines(
            &gpu,
            GridConfig::new(16, 16),
            &programs,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        );
        assert!(matches!(result, Err(InitError::ProgramCompileFailure(_))));
    }
}
