// ============================================================================
// geometry.rs — gpulife
// Static per-cell quad shared by every instance.
// ============================================================================

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
}

const fn v(x: f32, y: f32) -> Vertex {
    Vertex { position: [x, y] }
}

/// Two triangles forming a unit quad centered at the origin.
pub const QUAD_VERTICES: [Vertex; 6] = [
    v(-0.5, -0.5),
    v(0.5, -0.5),
    v(0.5, 0.5),
    //
    v(-0.5, -0.5),
    v(0.5, 0.5),
    v(-0.5, 0.5),
];

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}
