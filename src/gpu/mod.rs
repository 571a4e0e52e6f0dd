//! GPU state: device, surface and the passes that draw the cloud.
//!
//! Frame structure:
//! 1. Cloud pass into the offscreen target (cleared to the background).
//! 2. Upscale pass from the target onto the surface.
//! 3. Egui overlay on the surface (with the `egui` feature).

mod post_process;
mod volume_render;

#[cfg(feature = "egui")]
mod egui_integration;

use std::sync::Arc;

use glam::{Mat4, Vec3};
use log::info;
use winit::window::Window;

pub use post_process::render_extent;
pub use volume_render::{spin_matrix, CloudUniforms, CLOUD_SHADER};

use post_process::UpscalePass;
use volume_render::{CloudRenderer, VOLUME_FORMAT};

#[cfg(feature = "egui")]
pub use egui_integration::{EguiFrameOutput, EguiIntegration};

use crate::camera::OrbitCamera;
use crate::config::CloudConfig;
use crate::density::DensityField;
use crate::error::GpuError;
use crate::params::RenderParameters;

/// Shown in place of the cloud when the machine cannot render it.
pub const FALLBACK_MESSAGE: &str =
    "No GPU adapter with filterable 3D texture support was found; the gas cloud cannot be rendered on this machine.";

/// Turn the result of a popped validation scope into a [`GpuError::Shader`].
fn check_scope<E: std::fmt::Display>(label: &'static str, error: Option<E>) -> Result<(), GpuError> {
    match error {
        Some(err) => Err(GpuError::Shader {
            label,
            message: err.to_string(),
        }),
        None => Ok(()),
    }
}

/// What the adapter must offer for the cloud pass, or `None` if it does.
pub fn missing_capability(
    volume_features: &wgpu::TextureFormatFeatures,
    limits: &wgpu::Limits,
    field_size: u32,
) -> Option<&'static str> {
    let usages = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
    if !volume_features.allowed_usages.contains(usages) {
        return Some("sampled R8Unorm textures");
    }
    if !volume_features
        .flags
        .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
    {
        return Some("filterable 3D R8Unorm textures");
    }
    if limits.max_texture_dimension_3d < field_size {
        return Some("3D textures as large as the density field");
    }
    None
}

/// Prefer a linear surface format so shader output reaches the screen as is.
fn pick_surface_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .find(|f| !f.is_srgb())
        .or_else(|| formats.first())
        .copied()
}

pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    adapter_name: String,
    cloud: Option<CloudRenderer>,
    upscale: UpscalePass,
    clear_color: wgpu::Color,
    base_color: Vec3,
    max_pixel_ratio: f64,
    scale_factor: f64,
    #[cfg(feature = "egui")]
    pub egui: EguiIntegration,
}

impl GpuState {
    /// Acquire an adapter and device for `window` and check they can run the
    /// cloud pass. No density data is needed yet.
    pub async fn new(window: Arc<Window>, cloud_config: &CloudConfig) -> Result<Self, GpuError> {
        let size = window.inner_size();
        let scale_factor = window.scale_factor();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let adapter_name = adapter.get_info().name;
        info!("Using adapter: {} ({:?})", adapter_name, adapter.get_info().backend);

        let volume_features = adapter.get_texture_format_features(VOLUME_FORMAT);
        if let Some(capability) = missing_capability(&volume_features, &adapter.limits(), cloud_config.size) {
            return Err(GpuError::Unsupported {
                adapter: adapter_name,
                capability,
            });
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = pick_surface_format(&surface_caps.formats).ok_or_else(|| GpuError::Unsupported {
            adapter: adapter_name.clone(),
            capability: "a presentable surface format",
        })?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let (target_w, target_h) = render_extent(
            (config.width, config.height),
            scale_factor,
            cloud_config.max_pixel_ratio,
        );
        let upscale = UpscalePass::new(&device, target_w, target_h, surface_format)?;

        let clear = cloud_config.clear_rgb();

        #[cfg(feature = "egui")]
        let egui = EguiIntegration::new(&device, surface_format, &window);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            adapter_name,
            cloud: None,
            upscale,
            clear_color: wgpu::Color {
                r: clear.x as f64,
                g: clear.y as f64,
                b: clear.z as f64,
                a: 1.0,
            },
            base_color: cloud_config.base_rgb(),
            max_pixel_ratio: cloud_config.max_pixel_ratio,
            scale_factor,
            #[cfg(feature = "egui")]
            egui,
        })
    }

    /// Name of the adapter in use.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Upload the density field and build the cloud pipeline around it.
    pub fn load_field(&mut self, field: &DensityField) -> Result<(), GpuError> {
        let cloud = CloudRenderer::new(&self.device, &self.queue, field, self.config.format)?;
        self.cloud = Some(cloud);
        info!("Uploaded {0}x{0}x{0} density texture", field.size());
        Ok(())
    }

    /// Reconfigure for a new window size. Zero sizes are ignored.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.resize_target();
        }
    }

    /// Track a new display pixel density.
    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
        self.resize_target();
    }

    fn resize_target(&mut self) {
        let (w, h) = render_extent(
            (self.config.width, self.config.height),
            self.scale_factor,
            self.max_pixel_ratio,
        );
        if self.upscale.size() != (w, h) {
            self.upscale.resize(&self.device, w, h);
        }
    }

    /// Width over height of the surface.
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    /// Draw one frame.
    pub fn render(
        &mut self,
        params: &RenderParameters,
        camera: &OrbitCamera,
        model: Mat4,
        #[cfg(feature = "egui")] ui: Option<&EguiFrameOutput>,
    ) -> Result<(), wgpu::SurfaceError> {
        if let Some(cloud) = &self.cloud {
            let uniforms = CloudUniforms::new(
                params,
                camera,
                self.aspect(),
                model,
                self.base_color,
                cloud.volume_size(),
            );
            cloud.update(&self.queue, &uniforms);
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        // Cloud pass
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Cloud Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.upscale.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(cloud) = &self.cloud {
                cloud.draw(&mut pass);
            }
        }

        // Present pass
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Upscale Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.upscale.draw(&mut pass);
        }

        #[cfg(feature = "egui")]
        if let Some(ui) = ui {
            let screen_descriptor = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [self.config.width, self.config.height],
                pixels_per_point: ui.pixels_per_point,
            };
            self.egui
                .prepare(&self.device, &self.queue, &mut encoder, ui, &screen_descriptor);
            self.egui.paint(&mut encoder, &view, ui, &screen_descriptor);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        #[cfg(feature = "egui")]
        if let Some(ui) = ui {
            self.egui.cleanup(ui);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(usages: wgpu::TextureUsages, flags: wgpu::TextureFormatFeatureFlags) -> wgpu::TextureFormatFeatures {
        wgpu::TextureFormatFeatures {
            allowed_usages: usages,
            flags,
        }
    }

    #[test]
    fn test_clean_scope_passes() {
        assert!(check_scope::<String>("Upscale Pipeline", None).is_ok());
    }

    #[test]
    fn test_scope_error_becomes_shader_error() {
        let err = check_scope("Upscale Pipeline", Some("entry point not found")).unwrap_err();
        assert!(!err.is_missing_capability());
        match err {
            GpuError::Shader { label, message } => {
                assert_eq!(label, "Upscale Pipeline");
                assert_eq!(message, "entry point not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_fallback_message_names_3d_textures() {
        assert!(FALLBACK_MESSAGE.contains("3D texture"));
        assert!(!FALLBACK_MESSAGE.to_lowercase().contains("webgl"));
    }

    #[test]
    fn test_capable_adapter() {
        let f = features(
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            wgpu::TextureFormatFeatureFlags::FILTERABLE,
        );
        assert_eq!(missing_capability(&f, &wgpu::Limits::default(), 128), None);
    }

    #[test]
    fn test_unfilterable_volume_rejected() {
        let f = features(
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            wgpu::TextureFormatFeatureFlags::empty(),
        );
        assert_eq!(
            missing_capability(&f, &wgpu::Limits::default(), 128),
            Some("filterable 3D R8Unorm textures")
        );
    }

    #[test]
    fn test_small_3d_limit_rejected() {
        let f = features(
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            wgpu::TextureFormatFeatureFlags::FILTERABLE,
        );
        let limits = wgpu::Limits {
            max_texture_dimension_3d: 64,
            ..wgpu::Limits::default()
        };
        assert!(missing_capability(&f, &limits, 128).is_some());
        assert!(missing_capability(&f, &limits, 64).is_none());
    }

    #[test]
    fn test_surface_format_prefers_linear() {
        let formats = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm,
        ];
        assert_eq!(pick_surface_format(&formats), Some(wgpu::TextureFormat::Bgra8Unorm));
        assert_eq!(
            pick_surface_format(&[wgpu::TextureFormat::Rgba8UnormSrgb]),
            Some(wgpu::TextureFormat::Rgba8UnormSrgb)
        );
        assert_eq!(pick_surface_format(&[]), None);
    }
}
