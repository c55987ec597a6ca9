//! wgpu implementation of [`GpuBackend`].
//!
//! ## Usage
//!
//! Run the blur on a `wgpu::Device` owned by the host renderer.
//!
//! Filter passes are recorded into one command encoder and submitted on
//! [`GpuBackend::flush`]. The screen the blur reads is whatever texture was last
//! handed to [`WgpuBackend::set_screen_target`]; it must have `COPY_SRC` usage,
//! a sample count of 1, and its producing commands must already be submitted
//! when a blur callback is replayed.

mod init;
mod screen;

use tracing::{debug, warn};

use crate::{
    backend::{GpuBackend, ScreenCapture, Viewport},
    error::BackendError,
    filter::{FilterKind, validate_wgsl},
    pass::PassConstants,
};

use screen::ScreenCopy;

/// Format of every chain level and of the output surface.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Render state owned by the backend between passes.
#[derive(Clone, Debug, Default)]
pub struct WgpuRenderState {
    target: Option<wgpu::TextureView>,
    viewport: Option<Viewport>,
    pipeline: Option<wgpu::RenderPipeline>,
    input: Option<wgpu::TextureView>,
}

/// [`GpuBackend`] on top of wgpu.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    sampler: wgpu::Sampler,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    uniforms: Vec<wgpu::Buffer>,
    next_uniform: usize,
    bound_uniform: Option<usize>,
    encoder: Option<wgpu::CommandEncoder>,
    screen: Option<wgpu::Texture>,
    screen_copy: Option<ScreenCopy>,
    state: WgpuRenderState,
}

impl WgpuBackend {
    /// Creates the sampler and layouts shared by both filter programs.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let sampler = init::create_mirror_sampler(&device);
        let bind_group_layout = init::create_bind_group_layout(&device);
        let pipeline_layout = init::create_pipeline_layout(&device, &bind_group_layout);
        Self {
            device,
            queue,
            sampler,
            bind_group_layout,
            pipeline_layout,
            uniforms: Vec::new(),
            next_uniform: 0,
            bound_uniform: None,
            encoder: None,
            screen: None,
            screen_copy: None,
            state: WgpuRenderState::default(),
        }
    }

    /// Sets the texture the next blur captures as its backdrop.
    pub fn set_screen_target(&mut self, screen: &wgpu::Texture) {
        self.screen = Some(screen.clone());
    }

    /// Forgets the screen target; blurs are skipped until a new one is set.
    pub fn clear_screen_target(&mut self) {
        self.screen = None;
    }

    /// Returns the device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns the queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Backdrop Blur Encoder"),
                })
        })
    }
}

/// Returns an error if a `width` x `height` texture cannot exist on a device with `max_dimension`.
fn check_extent(width: u32, height: u32, max_dimension: u32) -> Result<(), BackendError> {
    let reason = if width == 0 || height == 0 {
        "zero-sized textures are not allowed".to_owned()
    } else if width > max_dimension || height > max_dimension {
        format!("exceeds the device limit of {max_dimension}")
    } else {
        return Ok(());
    };
    Err(BackendError::TextureCreation {
        width,
        height,
        reason,
    })
}

impl GpuBackend for WgpuBackend {
    type Texture = wgpu::Texture;
    type TargetView = wgpu::TextureView;
    type ReadView = wgpu::TextureView;
    type Program = wgpu::RenderPipeline;
    type RenderState = WgpuRenderState;

    fn create_texture(&mut self, width: u32, height: u32) -> Result<wgpu::Texture, BackendError> {
        check_extent(width, height, self.device.limits().max_texture_dimension_2d)?;
        Ok(self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Backdrop Blur Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        }))
    }

    fn create_target_view(
        &mut self,
        texture: &wgpu::Texture,
    ) -> Result<wgpu::TextureView, BackendError> {
        Ok(texture.create_view(&wgpu::TextureViewDescriptor::default()))
    }

    fn create_read_view(
        &mut self,
        texture: &wgpu::Texture,
    ) -> Result<wgpu::TextureView, BackendError> {
        Ok(texture.create_view(&wgpu::TextureViewDescriptor::default()))
    }

    fn compile_program(
        &mut self,
        kind: FilterKind,
        source: &str,
    ) -> Result<wgpu::RenderPipeline, BackendError> {
        validate_wgsl(kind, source)?;
        Ok(init::create_filter_pipeline(
            &self.device,
            &self.pipeline_layout,
            kind,
            source,
        ))
    }

    fn capture_screen(&mut self) -> Option<ScreenCapture<wgpu::TextureView>> {
        let screen = self.screen.clone()?;
        if screen.width() == 0 || screen.height() == 0 {
            return None;
        }
        if screen.sample_count() != 1 || !screen.usage().contains(wgpu::TextureUsages::COPY_SRC)
        {
            warn!("Screen target cannot be copied (needs COPY_SRC and a single sample)");
            return None;
        }
        self.encoder();
        let encoder = self.encoder.as_mut()?;
        let view = ScreenCopy::capture(&mut self.screen_copy, &self.device, encoder, &screen);
        Some(ScreenCapture {
            view: view.clone(),
            width: screen.width(),
            height: screen.height(),
        })
    }

    fn save_render_state(&mut self) -> WgpuRenderState {
        self.state.clone()
    }

    fn restore_render_state(&mut self, state: WgpuRenderState) {
        self.state = state;
    }

    fn bind_filter_state(&mut self) {
        // Culling, depth and scissor are baked into the filter pipelines.
        self.bound_uniform = None;
    }

    fn clear_target(&mut self, target: &wgpu::TextureView, color: [f32; 4]) {
        let [r, g, b, a] = color.map(f64::from);
        let encoder = self.encoder();
        drop(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Backdrop Blur Clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            ..Default::default()
        }));
    }

    fn bind_target(&mut self, target: &wgpu::TextureView, viewport: Viewport) {
        self.state.target = Some(target.clone());
        self.state.viewport = Some(viewport);
    }

    fn upload_constants(&mut self, constants: &PassConstants) {
        if self.next_uniform == self.uniforms.len() {
            self.uniforms
                .push(self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Backdrop Blur Constants"),
                    size: std::mem::size_of::<PassConstants>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }));
        }
        let index = self.next_uniform;
        self.queue
            .write_buffer(&self.uniforms[index], 0, bytemuck::bytes_of(constants));
        self.bound_uniform = Some(index);
        self.next_uniform += 1;
    }

    fn bind_program(&mut self, program: &wgpu::RenderPipeline) {
        self.state.pipeline = Some(program.clone());
    }

    fn bind_input_mirrored(&mut self, source: &wgpu::TextureView) {
        self.state.input = Some(source.clone());
    }

    fn draw_fullscreen_quad(&mut self) {
        let (Some(target), Some(viewport), Some(pipeline), Some(input), Some(uniform)) = (
            self.state.target.clone(),
            self.state.viewport,
            self.state.pipeline.clone(),
            self.state.input.clone(),
            self.bound_uniform,
        ) else {
            warn!("Filter draw skipped: pass state incomplete");
            return;
        };

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Backdrop Blur Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms[uniform].as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&input),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let encoder = self.encoder();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Backdrop Blur Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            ..Default::default()
        });
        pass.set_viewport(
            viewport.x as f32,
            viewport.y as f32,
            viewport.width as f32,
            viewport.height as f32,
            0.0,
            1.0,
        );
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..4, 0..1);
    }

    fn unbind_input(&mut self) {
        self.state.input = None;
    }

    fn flush(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
            debug!("Submitted {} blur passes", self.next_uniform);
        }
        self.next_uniform = 0;
        self.bound_uniform = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackdropBlur, BlurConfig, BlurSettings, ExecuteOutcome, host::UiHost};

    fn create_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter_result =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: true,
            }));
        let adapter = match adapter_result {
            Ok(adapter) => adapter,
            Err(_) => return None,
        };
        let device_result = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            label: None,
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::Off,
            experimental_features: wgpu::ExperimentalFeatures::default(),
        }));
        device_result.ok()
    }

    struct NullHost(Vec<crate::DrawCallback>);

    impl UiHost for NullHost {
        type Texture = wgpu::TextureView;

        fn add_callback(&mut self, callback: crate::DrawCallback) {
            self.0.push(callback);
        }

        fn display_size(&self) -> glam::Vec2 {
            glam::Vec2::new(64.0, 48.0)
        }

        fn add_image_rounded(&mut self, _image: crate::ImageQuad<wgpu::TextureView>) {}
    }

    #[test]
    fn test_blur_on_fallback_adapter() {
        let Some((device, queue)) = create_device() else {
            return;
        };
        let screen = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Test Screen"),
            size: wgpu::Extent3d {
                width: 64,
                height: 48,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let mut blur = BackdropBlur::setup(WgpuBackend::new(device, queue), BlurConfig::default())
            .expect("filter programs compile");
        let mut host = NullHost(Vec::new());
        let handle = blur
            .process(&mut host, BlurSettings::default().iterations(2))
            .unwrap();

        assert_eq!(
            blur.execute(handle),
            ExecuteOutcome::Skipped(crate::SkipReason::NoScreen)
        );
        blur.backend_mut().set_screen_target(&screen);
        assert_eq!(blur.execute(handle), ExecuteOutcome::Rendered { passes: 5 });
        assert!(blur.texture().is_some());
        blur.destroy();
    }

    #[test]
    fn test_check_extent() {
        assert!(check_extent(1, 1, 8192).is_ok());
        assert!(check_extent(8192, 8192, 8192).is_ok());
        assert!(matches!(
            check_extent(0, 10, 8192),
            Err(BackendError::TextureCreation { width: 0, .. })
        ));
        assert!(check_extent(8193, 10, 8192).is_err());
    }
}
