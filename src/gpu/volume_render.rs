//! Volume rendering of the density field.
//!
//! Uploads the field as a 3D `R8Unorm` texture and draws the unit cube with a
//! fragment shader that ray marches through it. The march itself lives in
//! `cloud.wgsl`; [`crate::raymarch`] is its CPU twin.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::camera::OrbitCamera;
use crate::density::DensityField;
use crate::error::GpuError;

use super::check_scope;
use crate::params::RenderParameters;

/// WGSL source for the cloud pass.
pub const CLOUD_SHADER: &str = include_str!("cloud.wgsl");

/// Format of the density texture.
pub const VOLUME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Unit cube corners in object space.
const CUBE_VERTICES: [[f32; 3]; 8] = [
    [-0.5, -0.5, -0.5],
    [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5],
    [-0.5, 0.5, -0.5],
    [-0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5],
    [-0.5, 0.5, 0.5],
];

/// Counter-clockwise when seen from outside the cube.
const CUBE_INDICES: [u16; 36] = [
    4, 5, 6, 4, 6, 7, // +z
    1, 0, 3, 1, 3, 2, // -z
    5, 1, 2, 5, 2, 6, // +x
    0, 4, 7, 0, 7, 3, // -x
    7, 6, 2, 7, 2, 3, // +y
    0, 1, 5, 0, 5, 4, // -y
];

/// Per-frame uniforms. Layout matches `CloudUniforms` in `cloud.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct CloudUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub base: [f32; 4],
    /// Camera position in the cube's object space.
    pub camera_pos: [f32; 3],
    pub threshold: f32,
    pub opacity: f32,
    pub range: f32,
    pub steps: u32,
    pub frame: u32,
    pub volume_size: f32,
    pub dither: u32,
    _pad: [u32; 2],
}

impl CloudUniforms {
    /// Build the uniforms for one frame.
    ///
    /// `model` places the cube in the world. The camera position is carried
    /// into object space so the shader never needs the inverse.
    pub fn new(
        params: &RenderParameters,
        camera: &OrbitCamera,
        aspect: f32,
        model: Mat4,
        base: Vec3,
        volume_size: u32,
    ) -> Self {
        let p = params.sanitized();
        let camera_pos = model.inverse().transform_point3(camera.position());
        Self {
            view_proj: camera.view_proj(aspect).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            base: base.extend(1.0).to_array(),
            camera_pos: camera_pos.to_array(),
            threshold: p.threshold,
            opacity: p.opacity,
            range: p.range,
            steps: p.steps,
            frame: p.frame,
            volume_size: volume_size as f32,
            dither: p.dither as u32,
            _pad: [0; 2],
        }
    }
}

/// Rotation of the cube about Y after `elapsed` seconds.
pub fn spin_matrix(elapsed: f32, spin_rate: f32) -> Mat4 {
    Mat4::from_rotation_y(-elapsed * spin_rate)
}

/// GPU state for the cloud pass.
pub struct CloudRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    volume: wgpu::Texture,
}

impl CloudRenderer {
    /// Build the pipeline and upload `field`.
    ///
    /// Shader and pipeline validation errors are caught and returned instead
    /// of reaching the device's uncaptured error handler.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        field: &DensityField,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, GpuError> {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cloud Uniform Buffer"),
            contents: bytemuck::bytes_of(&CloudUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cloud Cube Vertices"),
            contents: bytemuck::cast_slice(&CUBE_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cloud Cube Indices"),
            contents: bytemuck::cast_slice(&CUBE_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Cloud Volume Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cloud Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cloud Shader"),
            source: wgpu::ShaderSource::Wgsl(CLOUD_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Cloud Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Cloud Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        offset: 0,
                        shader_location: 0,
                        format: wgpu::VertexFormat::Float32x3,
                    }],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        check_scope("Cloud Pipeline", pollster::block_on(device.pop_error_scope()))?;

        let volume = create_volume_texture(device, queue, field);
        let bind_group = create_bind_group(device, &bind_group_layout, &uniform_buffer, &volume, &sampler);

        Ok(Self {
            pipeline,
            bind_group,
            uniform_buffer,
            vertex_buffer,
            index_buffer,
            volume,
        })
    }

    /// Resolution of the uploaded field.
    pub fn volume_size(&self) -> u32 {
        self.volume.width()
    }

    /// Write this frame's uniforms.
    pub fn update(&self, queue: &wgpu::Queue, uniforms: &CloudUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Record the cube draw into `pass`.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..CUBE_INDICES.len() as u32, 0, 0..1);
    }
}

fn create_volume_texture(device: &wgpu::Device, queue: &wgpu::Queue, field: &DensityField) -> wgpu::Texture {
    let n = field.size();
    let size = wgpu::Extent3d {
        width: n,
        height: n,
        depth_or_array_layers: n,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Cloud Density Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D3,
        format: VOLUME_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    // Field layout is x fastest, then y, then z: one texel row per (y, z)
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        field.as_bytes(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(n),
            rows_per_image: Some(n),
        },
        size,
    );

    texture
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform_buffer: &wgpu::Buffer,
    volume: &wgpu::Texture,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    let view = volume.create_view(&wgpu::TextureViewDescriptor {
        label: Some("Cloud Density View"),
        dimension: Some(wgpu::TextureViewDimension::D3),
        ..Default::default()
    });
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Cloud Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_wgsl(code: &str) -> Result<(), String> {
        let module = naga::front::wgsl::parse_str(code).map_err(|e| e.emit_to_string(code))?;
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;
        Ok(())
    }

    #[test]
    fn test_cloud_shader_validates() {
        if let Err(e) = validate_wgsl(CLOUD_SHADER) {
            panic!("cloud.wgsl failed validation:\n{}", e);
        }
    }

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<CloudUniforms>(), 192);
        assert_eq!(std::mem::size_of::<CloudUniforms>() % 16, 0);
    }

    #[test]
    fn test_cube_winding_faces_outward() {
        let v = |i: u16| Vec3::from(CUBE_VERTICES[i as usize]);
        for tri in CUBE_INDICES.chunks(3) {
            let (a, b, c) = (v(tri[0]), v(tri[1]), v(tri[2]));
            let normal = (b - a).cross(c - a);
            let center = (a + b + c) / 3.0;
            assert!(normal.dot(center) > 0.0, "triangle {:?} faces inward", tri);
        }
    }

    #[test]
    fn test_uniforms_sanitize_params() {
        let params = RenderParameters::new().with_threshold(3.0).with_steps(999);
        let u = CloudUniforms::new(&params, &OrbitCamera::new(), 1.0, Mat4::IDENTITY, Vec3::ONE, 128);
        assert_eq!(u.threshold, 1.0);
        assert_eq!(u.steps, 200);
        assert_eq!(u.dither, 1);
        assert_eq!(u.volume_size, 128.0);
    }

    #[test]
    fn test_camera_in_object_space() {
        let camera = OrbitCamera::new();
        let model = spin_matrix(7.5 * std::f32::consts::FRAC_PI_2, 1.0 / 7.5);
        let u = CloudUniforms::new(&RenderParameters::new(), &camera, 1.0, model, Vec3::ZERO, 4);
        let pos = Vec3::from(u.camera_pos);
        // Undoing a quarter turn of the cube swings the camera from +Z to +X
        assert!((pos.length() - 1.5).abs() < 1e-5);
        assert!((pos - Vec3::new(1.5, 0.0, 0.0)).length() < 1e-4, "{:?}", pos);
    }

    #[test]
    fn test_spin_matrix_at_zero_is_identity() {
        assert_eq!(spin_matrix(0.0, 1.0 / 7.5), Mat4::IDENTITY);
    }
}
