use anyhow::anyhow;
use bytemuck::{Pod, Zeroable};
use egui_wgpu::wgpu;
use egui_wgpu::wgpu::util::DeviceExt;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct Uniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub viewport_px: [f32; 2],
    pub point_size_px: f32,
    pub opacity: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CornerVert {
    corner: [f32; 2],
}

pub struct PointCloudGpu {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group: wgpu::BindGroup,
    pub uniform_buf: wgpu::Buffer,

    pub positions: wgpu::Buffer,
    pub colors: wgpu::Buffer,

    pub corners: wgpu::Buffer,

    pub n_points: u32,

    pub target_format: wgpu::TextureFormat,

    // Change detection:
    pub last_figure_id: u64,
}

impl PointCloudGpu {
    fn create_pipeline(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
    ) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout) {
        let shader_src = include_str!("../assets/pointcloud.wgsl");
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pointcloud.wgsl"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let storage_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pc_bgl"),
            entries: &[
                // uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Uniforms>() as u64),
                    },
                    count: None,
                },
                // positions
                storage_entry(1),
                // colors
                storage_entry(2),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pc_pl"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("pc_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<CornerVert>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x2,
                        offset: 0,
                        shader_location: 0,
                    }],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
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

        (pipeline, bgl)
    }

    fn storage_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.max(16),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn make_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniform_buf: &wgpu::Buffer,
        positions: &wgpu::Buffer,
        colors: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pc_bg"),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: uniform_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: positions.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: colors.as_entire_binding() },
            ],
        })
    }

    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let (pipeline, bgl) = Self::create_pipeline(device, format);

        let uniform_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pc_uniform"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Start tiny, grow on demand
        let positions = Self::storage_buffer(device, "pc_positions", 16);
        let colors = Self::storage_buffer(device, "pc_colors", 16);

        let corners_data = [
            CornerVert { corner: [-1.0, -1.0] },
            CornerVert { corner: [1.0, -1.0] },
            CornerVert { corner: [1.0, 1.0] },
            CornerVert { corner: [-1.0, -1.0] },
            CornerVert { corner: [1.0, 1.0] },
            CornerVert { corner: [-1.0, 1.0] },
        ];
        let corners = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pc_corners"),
            contents: bytemuck::cast_slice(&corners_data),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let bind_group = Self::make_bind_group(device, &bgl, &uniform_buf, &positions, &colors);

        Self {
            pipeline,
            bind_group,
            uniform_buf,
            positions,
            colors,
            corners,
            n_points: 0,
            target_format: format,
            last_figure_id: 0,
        }
    }

    /// Returns true if the buffer was replaced.
    fn ensure_storage_buffer(device: &wgpu::Device, buf: &mut wgpu::Buffer, label: &str, need_bytes: u64) -> bool {
        if buf.size() >= need_bytes {
            return false;
        }
        *buf = Self::storage_buffer(device, label, need_bytes.next_power_of_two());
        true
    }

    fn write_chunked(queue: &wgpu::Queue, buf: &wgpu::Buffer, data: &[u8]) {
        const CHUNK: usize = 16 * 1024 * 1024; // 16MB
        let mut offset = 0usize;
        while offset < data.len() {
            let end = (offset + CHUNK).min(data.len());
            queue.write_buffer(buf, offset as u64, &data[offset..end]);
            offset = end;
        }
    }

    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        params: &RenderParams,
    ) -> anyhow::Result<()> {
        // If pipeline must be recreated (format change), rebuild everything.
        if self.target_format != params.target_format {
            *self = Self::new(device, params.target_format);
        }

        if self.last_figure_id != params.figure_id {
            if params.colors.len() != params.positions.len() {
                return Err(anyhow!(
                    "colors len {} != positions len {}",
                    params.colors.len(),
                    params.positions.len()
                ));
            }
            let n = params.positions.len();
            let grew_pos = Self::ensure_storage_buffer(device, &mut self.positions, "pc_positions", (n * 16) as u64);
            let grew_col = Self::ensure_storage_buffer(device, &mut self.colors, "pc_colors", (n * 4) as u64);
            if grew_pos || grew_col {
                let bgl = self.pipeline.get_bind_group_layout(0);
                self.bind_group =
                    Self::make_bind_group(device, &bgl, &self.uniform_buf, &self.positions, &self.colors);
            }

            Self::write_chunked(queue, &self.positions, bytemuck::cast_slice(params.positions.as_slice()));
            Self::write_chunked(queue, &self.colors, bytemuck::cast_slice(params.colors.as_slice()));
            self.n_points = n as u32;
            self.last_figure_id = params.figure_id;
        }

        // Uniforms every frame
        queue.write_buffer(&self.uniform_buf, 0, bytemuck::bytes_of(&params.uniforms));
        Ok(())
    }

    pub fn paint<'rp>(&self, render_pass: &mut wgpu::RenderPass<'rp>) {
        if self.n_points == 0 {
            return;
        }
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.corners.slice(..));
        render_pass.draw(0..6, 0..self.n_points);
    }
}

/// What one pane wants drawn this frame.
pub struct RenderParams {
    pub target_format: wgpu::TextureFormat,

    /// Changes whenever `positions`/`colors` change; 0 means nothing drawn yet.
    pub figure_id: u64,
    /// xyz + padding, one per point.
    pub positions: Arc<Vec<[f32; 4]>>,
    pub colors: Arc<Vec<u32>>,

    pub uniforms: Uniforms,
}

pub struct SharedRender {
    pub params: Mutex<RenderParams>,
}

impl SharedRender {
    pub fn new(target_format: wgpu::TextureFormat) -> Self {
        Self {
            params: Mutex::new(RenderParams {
                target_format,
                figure_id: 0,
                positions: Arc::new(Vec::new()),
                colors: Arc::new(Vec::new()),
                uniforms: Uniforms::zeroed(),
            }),
        }
    }
}

/// GPU state for every pane, kept in egui_wgpu's callback resources.
#[derive(Default)]
pub struct PaneGpus {
    pub panes: HashMap<usize, PointCloudGpu>,
}
