//! Headless backdrop blur demo.
//!
//! Paints a moving stripe pattern into an off-screen "screen" texture, blurs it
//! behind a panel for a few frames and logs what the blur did.

use anyhow::{Context, Result};
use backdrop_blur::{
    BackdropBlur, BackdropRect, BlurConfig, BlurSettings, CornerFlags, DrawCallback, ImageQuad,
    UiHost, WgpuBackend,
};
use glam::{Vec2, Vec4};
use tracing::info;

const SCREEN_WIDTH: u32 = 800;
const SCREEN_HEIGHT: u32 = 600;
const FRAMES: u32 = 4;

/// Minimal draw list: queued callbacks and images of the current frame.
struct FrameHost {
    display: Vec2,
    callbacks: Vec<DrawCallback>,
    images: Vec<ImageQuad<wgpu::TextureView>>,
}

impl FrameHost {
    fn new(width: u32, height: u32) -> Self {
        Self {
            display: Vec2::new(width as f32, height as f32),
            callbacks: Vec::new(),
            images: Vec::new(),
        }
    }

    fn begin_frame(&mut self) {
        self.callbacks.clear();
        self.images.clear();
    }
}

impl UiHost for FrameHost {
    type Texture = wgpu::TextureView;

    fn add_callback(&mut self, callback: DrawCallback) {
        self.callbacks.push(callback);
    }

    fn display_size(&self) -> Vec2 {
        self.display
    }

    fn add_image_rounded(&mut self, image: ImageQuad<wgpu::TextureView>) {
        self.images.push(image);
    }
}

fn init_tracing() {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match tracing_subscriber::EnvFilter::try_new(
            "warn,backdrop_blur=debug,backdrop_blur_demo=info",
        ) {
            Ok(filter) => filter,
            Err(_) => tracing_subscriber::EnvFilter::new("warn"),
        },
    };

    let _ = tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(filter)
        .try_init();
}

async fn request_device() -> Result<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .context("no suitable graphics adapter")?;
    info!("Using adapter {:?}", adapter.get_info().name);
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            label: Some("Backdrop Blur Demo Device"),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::Off,
            experimental_features: wgpu::ExperimentalFeatures::default(),
        })
        .await
        .context("failed to create device")
}

fn create_screen(device: &wgpu::Device) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Demo Screen"),
        size: wgpu::Extent3d {
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

/// Uploads diagonal stripes shifted by `frame` pixels.
fn paint_screen(queue: &wgpu::Queue, screen: &wgpu::Texture, frame: u32) {
    let mut pixels = Vec::with_capacity((SCREEN_WIDTH * SCREEN_HEIGHT * 4) as usize);
    for y in 0..SCREEN_HEIGHT {
        for x in 0..SCREEN_WIDTH {
            let stripe = ((x + y + frame * 8) / 24) % 2 == 0;
            let shade = (x * 255 / SCREEN_WIDTH) as u8;
            if stripe {
                pixels.extend_from_slice(&[shade, 40, 255 - shade, 255]);
            } else {
                pixels.extend_from_slice(&[20, 20, 20, 255]);
            }
        }
    }
    queue.write_texture(
        screen.as_image_copy(),
        &pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(SCREEN_WIDTH * 4),
            rows_per_image: Some(SCREEN_HEIGHT),
        },
        screen.size(),
    );
}

async fn run() -> Result<()> {
    let (device, queue) = request_device().await?;
    let screen = create_screen(&device);
    let mut blur = BackdropBlur::setup(WgpuBackend::new(device, queue), BlurConfig::from_env())?;
    let mut host = FrameHost::new(SCREEN_WIDTH, SCREEN_HEIGHT);

    let settings = BlurSettings::default().iterations(4).offset(3.0).noise(0.15);
    let panel = BackdropRect::new(Vec2::new(120.0, 90.0), Vec2::new(680.0, 510.0))
        .tint(Vec4::new(1.0, 1.0, 1.0, 0.85))
        .rounded(18.0, CornerFlags::ALL);

    for frame in 0..FRAMES {
        host.begin_frame();
        paint_screen(blur.backend().queue(), &screen, frame);

        // Frame build.
        blur.process(&mut host, settings)?;
        let painted = blur.render(&mut host, panel);

        // Replay.
        blur.backend_mut().set_screen_target(&screen);
        let callbacks = std::mem::take(&mut host.callbacks);
        for callback in &callbacks {
            if let Some(outcome) = blur.handle_callback(callback) {
                info!("Frame {frame}: {outcome:?}");
            }
        }
        info!(
            "Frame {frame}: panel painted: {painted}, images queued: {}",
            host.images.len()
        );

        blur.collect();
    }

    info!("Stats: {:?}", blur.stats());
    let backend = blur.destroy();
    let _ = backend.device().poll(wgpu::PollType::Poll);
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    pollster::block_on(run())
}
