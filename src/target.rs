// ============================================================================
// target.rs — gpulife
// Drawable targets for the render pass: the window swapchain or an owned
// offscreen texture.
// ============================================================================

use crate::error::TickError;

/// A texture acquired for one frame.
pub struct Frame {
    pub view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl Frame {
    /// Hand the frame to the display. No-op for offscreen frames.
    pub fn present(self) {
        if let Some(texture) = self.surface_texture {
            texture.present();
        }
    }
}

pub trait FrameTarget {
    fn format(&self) -> wgpu::TextureFormat;

    /// `Ok(None)` means no frame is available this time and the tick should
    /// be skipped. An error means the target is gone until reconfigured.
    fn acquire(&mut self) -> Result<Option<Frame>, TickError>;
}

// ======================== Window Surface ========================

pub struct SurfaceTarget {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl SurfaceTarget {
    pub fn new(
        device: &wgpu::Device,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    ) -> Self {
        surface.configure(device, &config);
        Self { surface, config }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(device, &self.config);
        }
    }

    /// Re-apply the current configuration after the surface was lost.
    pub fn reconfigure(&mut self, device: &wgpu::Device) {
        self.surface.configure(device, &self.config);
    }
}

impl FrameTarget for SurfaceTarget {
    fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn acquire(&mut self) -> Result<Option<Frame>, TickError> {
        let texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Timeout) => {
                log::debug!("Surface acquire timed out; skipping frame");
                return Ok(None);
            }
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                return Err(TickError::SurfaceUnavailable(e.to_string()));
            }
            Err(e) => {
                log::error!("Surface error: {:?}", e);
                return Err(TickError::SurfaceUnavailable(e.to_string()));
            }
        };
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Some(Frame {
            view,
            surface_texture: Some(texture),
        }))
    }
}

// ======================== Offscreen ========================

pub struct OffscreenTarget {
    texture: wgpu::Texture,
    format: wgpu::TextureFormat,
}

impl OffscreenTarget {
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen_frame"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Self { texture, format }
    }
}

impl FrameTarget for OffscreenTarget {
    fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    fn acquire(&mut self) -> Result<Option<Frame>, TickError> {
        Ok(Some(Frame {
            view: self
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
            surface_texture: None,
        }))
    }
}

#[cfg(test)]
impl OffscreenTarget {
    /// Copy the texture back as tightly packed RGBA rows, top row first.
    pub fn read_pixels(&self, gpu: &crate::gpu::GpuContext) -> Result<Vec<[u8; 4]>, TickError> {
        let width = self.texture.width();
        let height = self.texture.height();
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let unpadded_bpr = width * 4;
        let padded_bpr = unpadded_bpr.div_ceil(align) * align;

        let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_readback"),
            size: (padded_bpr * height) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
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
        let pixels: Vec<[u8; 4]> = data
            .chunks(padded_bpr as usize)
            .flat_map(|row| row[..unpadded_bpr as usize].chunks_exact(4))
            .map(|px| [px[0], px[1], px[2], px[3]])
            .collect();
        drop(data);
        staging.unmap();
        Ok(pixels)
    }
}
