// ============================================================================
// gpu.rs — gpulife
// Adapter/device acquisition and error-scope helpers.
// ============================================================================

use crate::error::InitError;

/// Device + queue handed to the frame driver. Acquired once at startup.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

/// A GPU error captured by an error scope.
#[derive(Debug)]
pub enum ScopeFault {
    OutOfMemory(String),
    Validation(String),
}

impl GpuContext {
    /// Acquire an adapter compatible with `surface` and return the device
    /// together with a surface configuration for `width` x `height`.
    pub fn for_surface(
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'_>,
        width: u32,
        height: u32,
    ) -> Result<(Self, wgpu::SurfaceConfiguration), InitError> {
        pollster::block_on(async {
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: Some(surface),
                    force_fallback_adapter: false,
                })
                .await
                .ok_or(InitError::UnsupportedAccelerator)?;

            let surface_caps = surface.get_capabilities(&adapter);
            let surface_format = surface_caps
                .formats
                .iter()
                .find(|f| f.is_srgb())
                .copied()
                .or_else(|| surface_caps.formats.first().copied())
                .ok_or_else(|| {
                    InitError::SurfaceUnavailable("surface reports no supported formats".into())
                })?;
            let alpha_mode = surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto);

            let gpu = Self::from_adapter(adapter).await?;

            let surface_config = wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format: surface_format,
                width: width.max(1),
                height: height.max(1),
                present_mode: wgpu::PresentMode::Fifo,
                alpha_mode,
                view_formats: vec![],
                desired_maximum_frame_latency: 2,
            };

            Ok::<_, InitError>((gpu, surface_config))
        })
    }

    /// Acquire any adapter without a surface, for offscreen runs and tests.
    pub fn headless() -> Result<Self, InitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        pollster::block_on(async {
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .ok_or(InitError::UnsupportedAccelerator)?;
            Self::from_adapter(adapter).await
        })
    }

    async fn from_adapter(adapter: wgpu::Adapter) -> Result<Self, InitError> {
        let adapter_info = adapter.get_info();
        log::info!("GPU: {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("gpulife_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self { device, queue })
    }

    /// Run `f` inside out-of-memory and validation error scopes and report
    /// whichever fault the device raised while it ran.
    pub fn guarded<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, ScopeFault> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let value = f(&self.device);

        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        if let Some(err) = out_of_memory {
            return Err(ScopeFault::OutOfMemory(err.to_string()));
        }
        if let Some(err) = validation {
            return Err(ScopeFault::Validation(err.to_string()));
        }
        Ok(value)
    }
}
