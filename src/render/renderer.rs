use std::sync::Arc;

use image::RgbaImage;
use log::{debug, warn};
use wgpu::{Device, Queue, RenderPipeline, Surface, SurfaceConfiguration};

use super::frame::FrameSnapshot;
use super::projection::{Eye, EyeUniform};

const FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

struct FrameTexture {
    size: (u32, u32),
    bind_group: wgpu::BindGroup,
    texture: wgpu::Texture,
}

/// Draws one side-by-side frame into a target, one eye per half.
pub struct VrSbsRenderer {
    device: Arc<Device>,
    queue: Arc<Queue>,
    render_pipeline: RenderPipeline,
    frame_bind_group_layout: wgpu::BindGroupLayout,
    eye_buffers: [wgpu::Buffer; 2],
    eye_bind_groups: [wgpu::BindGroup; 2],
    sampler: wgpu::Sampler,
    frame: FrameTexture,
    has_frame: bool,
}

impl VrSbsRenderer {
    pub fn new(device: Arc<Device>, queue: Arc<Queue>, target_format: wgpu::TextureFormat) -> Self {
        let eye_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Eye Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let frame_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
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

        let eye_buffers = Eye::BOTH.map(|eye| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(match eye {
                    Eye::Left => "Left Eye Buffer",
                    Eye::Right => "Right Eye Buffer",
                }),
                size: std::mem::size_of::<EyeUniform>() as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        let eye_bind_groups = [0, 1].map(|i| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Eye Bind Group"),
                layout: &eye_bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: eye_buffers[i].as_entire_binding(),
                }],
            })
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("VR SBS Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/vr_sbs.wgsl").into()),
        });

        let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("VR SBS Pipeline Layout"),
            bind_group_layouts: &[&eye_bind_group_layout, &frame_bind_group_layout],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("VR SBS Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        // Black until the first frame arrives.
        let frame = create_frame_texture(&device, &queue, &frame_bind_group_layout, &sampler, &black_frame());

        Self {
            device,
            queue,
            render_pipeline,
            frame_bind_group_layout,
            eye_buffers,
            eye_bind_groups,
            sampler,
            frame,
            has_frame: false,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn has_frame(&self) -> bool {
        self.has_frame
    }

    /// Replaces the source frame. The texture is only reallocated when the size changes.
    pub fn upload_frame(&mut self, image: &RgbaImage) {
        if image.width() == 0 || image.height() == 0 {
            return;
        }
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        let resized;
        let image = if image.width() > max_dimension || image.height() > max_dimension {
            let (width, height) = fit_within(image.dimensions(), max_dimension);
            warn!(
                "frame {}x{} exceeds the {} texel limit, scaling to {}x{}",
                image.width(),
                image.height(),
                max_dimension,
                width,
                height
            );
            resized = image::imageops::resize(image, width, height, image::imageops::FilterType::Triangle);
            &resized
        } else {
            image
        };
        if self.has_frame && self.frame.size == image.dimensions() {
            write_frame(&self.queue, &self.frame.texture, image);
        } else {
            debug!("allocating frame texture {}x{}", image.width(), image.height());
            self.frame = create_frame_texture(
                &self.device,
                &self.queue,
                &self.frame_bind_group_layout,
                &self.sampler,
                image,
            );
        }
        self.has_frame = true;
    }

    /// Drops the current frame; both eyes render black until the next upload.
    pub fn clear_frame(&mut self) {
        if !self.has_frame {
            return;
        }
        self.frame = create_frame_texture(
            &self.device,
            &self.queue,
            &self.frame_bind_group_layout,
            &self.sampler,
            &black_frame(),
        );
        self.has_frame = false;
    }

    /// Records both eye passes into `encoder`. `width`/`height` are the target's full size.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        width: u32,
        height: u32,
        snapshot: &FrameSnapshot,
    ) {
        let eye_width = width as f32 / 2.0;
        let aspect = if height > 0 { eye_width / height as f32 } else { 1.0 };
        for (i, eye) in Eye::BOTH.into_iter().enumerate() {
            let uniform = EyeUniform::new(eye, &snapshot.pose, &snapshot.mode, aspect);
            self.queue
                .write_buffer(&self.eye_buffers[i], 0, bytemuck::cast_slice(&[uniform]));
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("VR SBS Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        if width < 2 || height == 0 {
            return;
        }

        render_pass.set_pipeline(&self.render_pipeline);
        render_pass.set_bind_group(1, &self.frame.bind_group, &[]);
        for (i, bind_group) in self.eye_bind_groups.iter().enumerate() {
            render_pass.set_viewport(eye_width * i as f32, 0.0, eye_width, height as f32, 0.0, 1.0);
            render_pass.set_bind_group(0, bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
    }

    /// Draws into the surface's next texture and presents it.
    pub fn render(
        &self,
        surface: &Surface<'_>,
        config: &SurfaceConfiguration,
        snapshot: &FrameSnapshot,
    ) -> Result<(), wgpu::SurfaceError> {
        let frame = surface.get_current_texture()?;
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("VR SBS Encoder"),
        });
        self.encode(&mut encoder, &view, config.width, config.height, snapshot);
        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

fn create_frame_texture(
    device: &Device,
    queue: &Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    image: &RgbaImage,
) -> FrameTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("SBS Frame Texture"),
        size: frame_extent(image),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FRAME_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    write_frame(queue, &texture, image);

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("SBS Frame Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    FrameTexture {
        size: image.dimensions(),
        bind_group,
        texture,
    }
}

/// Largest size with the same aspect whose sides fit in `max_dimension`.
fn fit_within((width, height): (u32, u32), max_dimension: u32) -> (u32, u32) {
    let scale = max_dimension as f64 / width.max(height) as f64;
    if scale >= 1.0 {
        return (width, height);
    }
    (
        ((width as f64 * scale).floor() as u32).max(1),
        ((height as f64 * scale).floor() as u32).max(1),
    )
}

fn black_frame() -> RgbaImage {
    RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255]))
}

fn frame_extent(image: &RgbaImage) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: image.width(),
        height: image.height(),
        depth_or_array_layers: 1,
    }
}

fn write_frame(queue: &Queue, texture: &wgpu::Texture, image: &RgbaImage) {
    let (aligned_data, aligned_bytes_per_row) = align_rows(image);
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &aligned_data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(aligned_bytes_per_row),
            rows_per_image: Some(image.height()),
        },
        frame_extent(image),
    );
}

/// Pads each RGBA row to the 256-byte copy alignment.
fn align_rows(image: &RgbaImage) -> (Vec<u8>, u32) {
    let bytes_per_row = image.width() * 4;
    let aligned_bytes_per_row = (bytes_per_row + 255) & !255;
    let raw = image.as_raw();
    if aligned_bytes_per_row == bytes_per_row {
        return (raw.clone(), bytes_per_row);
    }

    let mut aligned_data = vec![0u8; aligned_bytes_per_row as usize * image.height() as usize];
    for (src, dst) in raw
        .chunks_exact(bytes_per_row as usize)
        .zip(aligned_data.chunks_exact_mut(aligned_bytes_per_row as usize))
    {
        dst[..src.len()].copy_from_slice(src);
    }
    (aligned_data, aligned_bytes_per_row)
}
