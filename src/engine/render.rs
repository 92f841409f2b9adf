// GPU side of the head slot: pipeline, depth buffer, and per-model uploads.
//
// The scene's head slot is re-uploaded only when its revision changes.
// Every draw of one model shares a model matrix; headwear vertices are
// pre-transformed by their fit so they can use the slot matrix too.

use glam::{Mat4, Vec3};
use image::RgbaImage;
use log::debug;
use wgpu::util::DeviceExt;
use crate::engine::components::Color;
use crate::engine::geometry::GeometryPatch;
use crate::head::assembly::{HeadNode, BACK_MATERIAL, FACE_MATERIAL};
use crate::head::headwear::{FittedHeadwear, FlatMaterial};
use super::mesh::{GpuVertex, RenderMesh};
use super::scene::{HeadModel, Scene};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const PLACEHOLDER_COLOR: Color = Color::new(0.72, 0.66, 0.62);

// ============================================================================
// UNIFORMS
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    light_dir: [f32; 4],
    eye: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct MaterialUniform {
    color: [f32; 4],
    params: [f32; 4],
}

/// CPU description of one material slot before upload.
enum MaterialDesc<'a> {
    Flat(FlatMaterial),
    Textured(&'a RgbaImage),
}

struct GpuMaterial {
    bind_group: wgpu::BindGroup,
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    /// (first index, index count, material slot)
    ranges: Vec<(u32, u32, usize)>,
}

// ============================================================================
// RENDERER
// ============================================================================

pub struct HeadRenderer {
    pipeline: wgpu::RenderPipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    material_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,

    meshes: Vec<GpuMesh>,
    materials: Vec<GpuMaterial>,
    uploaded_revision: Option<u64>,
}

impl HeadRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Head Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shader.wgsl").into()),
        });

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
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
                        view_dimension: wgpu::TextureViewDimension::D2,
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
            label: Some("material_bind_group_layout"),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Face Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // Flat materials still bind a texture; a 1x1 white one.
        let white = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        let white_view = upload_texture(device, queue, &white, "White Texture");

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Head Pipeline Layout"),
            bind_group_layouts: &[&camera_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Head Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[GpuVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // The shader lights back faces too.
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let depth_view = create_depth_view(device, width, height);

        Self {
            pipeline,
            camera_buffer,
            camera_bind_group,
            material_layout,
            sampler,
            white_view,
            depth_view,
            meshes: Vec::new(),
            materials: Vec::new(),
            uploaded_revision: None,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_view = create_depth_view(device, width, height);
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    /// Re-upload the head slot if it changed since the last call.
    pub fn sync(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, scene: &mut Scene) {
        if self.uploaded_revision == Some(scene.revision()) {
            return;
        }
        let revision = scene.revision();
        self.meshes.clear();
        self.materials.clear();

        if let Some((name, _, model)) = scene.current_head() {
            match model {
                HeadModel::Placeholder(mesh) => {
                    let flat = FlatMaterial { color: PLACEHOLDER_COLOR, roughness: 0.7, metalness: 0.0 };
                    let slot = self.add_material(device, queue, MaterialDesc::Flat(flat));
                    let ranges = vec![(0, mesh.index_count() as u32, slot)];
                    self.meshes.push(upload_mesh(device, mesh, ranges));
                }
                HeadModel::Built(node) => self.upload_node(device, queue, node),
            }
            debug!("uploaded head '{}' ({} meshes)", name.0, self.meshes.len());
        }
        self.uploaded_revision = Some(revision);
    }

    fn upload_node(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, node: &HeadNode) {
        let head = &node.mesh;
        let mut slots = [0usize; 2];
        slots[FACE_MATERIAL] = self.add_material(device, queue, MaterialDesc::Textured(&head.face_texture));
        slots[BACK_MATERIAL] = self.add_material(
            device,
            queue,
            MaterialDesc::Flat(FlatMaterial { color: head.back_color, roughness: 0.75, metalness: 0.0 }),
        );
        let ranges = head.groups.iter().map(|g| (g.start, g.count, slots[g.material])).collect();
        self.meshes.push(upload_mesh(device, &RenderMesh::from_patch(&head.geometry), ranges));

        let hat_slot = self.add_material(device, queue, MaterialDesc::Flat(node.headwear.material));
        for mesh in fitted_meshes(&node.headwear) {
            let ranges = vec![(0, mesh.index_count() as u32, hat_slot)];
            self.meshes.push(upload_mesh(device, &mesh, ranges));
        }
    }

    fn add_material(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, desc: MaterialDesc) -> usize {
        let (uniform, textured_view) = match desc {
            MaterialDesc::Flat(m) => (
                MaterialUniform {
                    color: srgb_to_linear(m.color),
                    params: [0.0, m.roughness, m.metalness, 0.0],
                },
                None,
            ),
            MaterialDesc::Textured(image) => (
                MaterialUniform { color: [1.0; 4], params: [1.0, 0.8, 0.0, 0.0] },
                Some(upload_texture(device, queue, image, "Face Texture")),
            ),
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let view = textured_view.as_ref().unwrap_or(&self.white_view);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&self.sampler) },
            ],
            label: Some("material_bind_group"),
        });
        self.materials.push(GpuMaterial { bind_group });
        self.materials.len() - 1
    }

    pub fn update_camera(&self, queue: &wgpu::Queue, view_proj: Mat4, model: Mat4, eye: Vec3) {
        let uniform = CameraUniform {
            view_proj: view_proj.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            light_dir: [-0.4, -0.6, -1.0, 0.0],
            eye: eye.extend(1.0).to_array(),
        };
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    /// Record every draw. Returns the number of draw calls.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) -> u32 {
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        let mut calls = 0;
        for mesh in &self.meshes {
            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            for &(start, count, material) in &mesh.ranges {
                if count == 0 {
                    continue;
                }
                render_pass.set_bind_group(1, &self.materials[material].bind_group, &[]);
                render_pass.draw_indexed(start..start + count, 0, 0..1);
                calls += 1;
            }
        }
        calls
    }
}

/// Headwear meshes with their fit baked into the vertices.
fn fitted_meshes(headwear: &FittedHeadwear) -> Vec<RenderMesh> {
    let m = headwear.transform.matrix();
    headwear
        .asset
        .meshes
        .iter()
        .map(|mesh| {
            let mut patch: GeometryPatch = mesh.to_patch();
            let moved: Vec<f32> = mesh.positions.iter().flat_map(|p| m.transform_point3(*p).to_array()).collect();
            patch.set_attribute(
                crate::engine::geometry::POSITION,
                crate::engine::geometry::Attribute::f32(3, moved),
            );
            patch.compute_vertex_normals();
            RenderMesh::from_patch(&patch)
        })
        .collect()
}

fn upload_mesh(device: &wgpu::Device, mesh: &RenderMesh, ranges: Vec<(u32, u32, usize)>) -> GpuMesh {
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Head Vertex Buffer"),
        contents: mesh.vertex_bytes(),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Head Index Buffer"),
        contents: mesh.index_bytes(),
        usage: wgpu::BufferUsages::INDEX,
    });
    GpuMesh { vertex_buffer, index_buffer, ranges }
}

fn upload_texture(device: &wgpu::Device, queue: &wgpu::Queue, image: &RgbaImage, label: &str) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: image.width().max(1),
        height: image.height().max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    if image.width() > 0 && image.height() > 0 {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width()),
                rows_per_image: Some(image.height()),
            },
            size,
        );
    }
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Colors are averaged from sRGB pixels; the surface expects linear output.
fn srgb_to_linear(c: Color) -> [f32; 4] {
    let f = |v: f32| {
        if v <= 0.04045 { v / 12.92 } else { ((v + 0.055) / 1.055).powf(2.4) }
    };
    [f(c.r), f(c.g), f(c.b), 1.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_conversion_endpoints() {
        assert_eq!(srgb_to_linear(Color::new(0.0, 1.0, 0.0)), [0.0, 1.0, 0.0, 1.0]);
        let mid = srgb_to_linear(Color::new(0.5, 0.5, 0.5))[0];
        assert!((mid - 0.214).abs() < 1e-3);
    }
}
