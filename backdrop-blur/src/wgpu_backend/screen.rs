//! Copy of the host's screen target that the first pass samples.

use tracing::debug;

/// Sampled copy of the screen, reallocated when the screen size or format changes.
pub(super) struct ScreenCopy {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl ScreenCopy {
    fn matches(&self, screen: &wgpu::Texture) -> bool {
        self.texture.width() == screen.width()
            && self.texture.height() == screen.height()
            && self.texture.format() == screen.format()
    }

    fn create(device: &wgpu::Device, screen: &wgpu::Texture) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Backdrop Blur Screen Copy"),
            size: screen.size(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: screen.format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Records a copy of `screen` into `slot`, reallocating it first if needed.
    pub(super) fn capture<'a>(
        slot: &'a mut Option<ScreenCopy>,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        screen: &wgpu::Texture,
    ) -> &'a wgpu::TextureView {
        if !slot.as_ref().is_some_and(|copy| copy.matches(screen)) {
            if let Some(previous) = slot.take() {
                previous.texture.destroy();
            }
            debug!(
                "Screen copy rebuilt at {}x{} ({:?})",
                screen.width(),
                screen.height(),
                screen.format()
            );
        }
        let copy = slot.get_or_insert_with(|| Self::create(device, screen));
        encoder.copy_texture_to_texture(
            screen.as_image_copy(),
            copy.texture.as_image_copy(),
            screen.size(),
        );
        &copy.view
    }
}
