//! Offscreen cloud target and the pass that puts it on screen.
//!
//! The cloud is rendered at a pixel density capped below the display's, then
//! stretched over the surface with a linear sampler as a fullscreen pass.

use crate::error::GpuError;

use super::check_scope;

/// GPU resources for the offscreen target and the upscale pass.
pub struct UpscalePass {
    texture: wgpu::Texture,
    /// View the cloud pass renders into.
    pub view: wgpu::TextureView,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    format: wgpu::TextureFormat,
}

/// Size of the offscreen target for a window.
///
/// `physical` is the window's surface size. The render target keeps the
/// same logical size but never uses more than `max_ratio` pixels per logical
/// pixel. Never returns a zero dimension.
pub fn render_extent(physical: (u32, u32), scale_factor: f64, max_ratio: f64) -> (u32, u32) {
    let scale = if scale_factor > 0.0 { scale_factor } else { 1.0 };
    let ratio = scale.min(max_ratio) / scale;
    let fit = |v: u32| ((v as f64 * ratio).round() as u32).clamp(1, v.max(1));
    (fit(physical.0), fit(physical.1))
}

impl UpscalePass {
    /// Create the offscreen target at `width` x `height`.
    ///
    /// Fails with [`GpuError::Shader`] if the upscale shader or pipeline does
    /// not validate.
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Result<Self, GpuError> {
        let (texture, view) = create_target(device, width, height, format);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Cloud Target Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Upscale Shader"),
            source: wgpu::ShaderSource::Wgsl(UPSCALE_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Upscale Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_group = create_bind_group(device, &bind_group_layout, &view, &sampler);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Upscale Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Upscale Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
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

        check_scope("Upscale Pipeline", pollster::block_on(device.pop_error_scope()))?;

        Ok(Self {
            texture,
            view,
            pipeline,
            bind_group,
            bind_group_layout,
            sampler,
            format,
        })
    }

    /// Current target size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    /// Recreate the target and bind group after a resize.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let (texture, view) = create_target(device, width, height, self.format);
        self.texture = texture;
        self.view = view;
        self.bind_group = create_bind_group(device, &self.bind_group_layout, &self.view, &self.sampler);
    }

    /// Draw the target over the whole of `pass`'s attachment.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn create_target(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Cloud Target"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Upscale Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Fullscreen triangle sampling the cloud target.
pub const UPSCALE_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@group(0) @binding(0)
var scene: texture_2d<f32>;
@group(0) @binding(1)
var scene_sampler: sampler;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    var uvs = array<vec2<f32>, 3>(
        vec2<f32>(0.0, 1.0),
        vec2<f32>(2.0, 1.0),
        vec2<f32>(0.0, -1.0),
    );

    var out: VertexOutput;
    out.clip_position = vec4<f32>(positions[vertex_index], 0.0, 1.0);
    out.uv = uvs[vertex_index];
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(scene, scene_sampler, in.uv);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upscale_shader_validates() {
        let module = naga::front::wgsl::parse_str(UPSCALE_SHADER).expect("parse");
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator.validate(&module).expect("validate");
    }

    #[test]
    fn test_render_extent_below_cap() {
        assert_eq!(render_extent((1280, 720), 1.0, 2.0), (1280, 720));
        assert_eq!(render_extent((2560, 1440), 2.0, 2.0), (2560, 1440));
    }

    #[test]
    fn test_render_extent_capped() {
        // 3x display, 2x cap: 1000x500 logical renders at 2000x1000
        assert_eq!(render_extent((3000, 1500), 3.0, 2.0), (2000, 1000));
    }

    #[test]
    fn test_render_extent_never_zero() {
        assert_eq!(render_extent((0, 0), 1.0, 2.0), (1, 1));
        assert_eq!(render_extent((1, 1), 4.0, 1.0), (1, 1));
        assert_eq!(render_extent((800, 600), 0.0, 2.0), (800, 600));
    }
}
