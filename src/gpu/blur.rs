// gpu/blur.rs — the 3x3 binomial blur as a wgpu compute kernel.
//
// Mirrors the CPU reference in blur.rs. One shader invocation computes one
// output pixel; invocations never communicate (each output cell depends
// only on read-only input neighbors and is written exactly once, so the
// dispatch is race-free by construction).
//
// TEXTURE FORMAT: R32Float with raw intensities in [0, 255], not R8Unorm.
// R8Unorm would normalize to [0, 1] and force a x255 rescale before the
// truncating quantization, where a one-ULP wobble can flip the truncated
// result. Raw f32 keeps the GPU arithmetic identical to the CPU's.
//
// ROW ALIGNMENT: wgpu requires `bytes_per_row` in buffer↔texture copies to
// be a multiple of COPY_BYTES_PER_ROW_ALIGNMENT (256). Staging and
// readback buffers pad each row up to that boundary; the padding is
// stripped again on the CPU side.
//
// RESOURCE LIFETIME: everything allocated per image (staging buffer,
// both textures, params buffer, readback buffer) is a local of
// `blur_f32` and is released when it returns, on success or panic. Only
// the compiled pipeline and the device handle persist across images.

use wgpu::util::DeviceExt;

use crate::blur::{quantize, Blur};
use crate::gpu::device::{dispatch_size, GpuDevice};
use crate::image::Image;

/// Round `value` up to the next multiple of `alignment`.
#[inline]
fn align_to(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) / alignment * alignment
}

// ---------------------------------------------------------------------------
// Params uniform (must match the WGSL struct layout exactly)
// ---------------------------------------------------------------------------

/// Image dimensions uploaded as a uniform buffer.
///
/// Layout must match `BlurParams` in `blur.wgsl`:
///   offset 0: width  (u32)
///   offset 4: height (u32)
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurParams {
    width: u32,
    height: u32,
}

// ---------------------------------------------------------------------------
// GpuBlur
// ---------------------------------------------------------------------------

/// The compiled blur pipeline plus the device it runs on.
///
/// Create once at startup; shader compilation happens in [`GpuBlur::new`],
/// never per image. Implements [`Blur`] so the batch dispatcher can drive
/// it through the same seam as the CPU reference.
pub struct GpuBlur {
    gpu: GpuDevice,
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
}

impl GpuBlur {
    /// Compile `blur.wgsl` and create the compute pipeline.
    pub fn new(gpu: GpuDevice) -> Self {
        // The workgroup size is baked into the shader source as a literal
        // (16x16); dispatch_size() in gpu/device.rs uses the same constant.
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blur.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/blur.wgsl").into()),
        });

        // Mirrors the @group(0) bindings in blur.wgsl.
        let bgl = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GpuBlur BGL"),
            entries: &[
                // Binding 0 — input texture (texture_2d<f32>)
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    },
                    count: None,
                },
                // Binding 1 — output texture (storage write, r32float)
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::R32Float,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                // Binding 2 — params uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("GpuBlur pipeline layout"),
                bind_group_layouts: &[&bgl],
                push_constant_ranges: &[],
            });

        let pipeline = gpu
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("gaussian_blur"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: "gaussian_blur",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        GpuBlur { gpu, pipeline, bgl }
    }

    /// The device this pipeline was compiled for.
    pub fn device(&self) -> &GpuDevice {
        &self.gpu
    }

    /// Run the blur on the GPU, returning the f32 intermediate result.
    ///
    /// Upload → dispatch → readback, synchronous from the caller's point
    /// of view (blocks until the result is back in host memory). Panics
    /// only through wgpu's validation layer on device faults, which halts
    /// the batch — there is no per-image device error recovery.
    pub fn blur_f32(&self, src: &Image<u8>) -> Image<f32> {
        let width = src.width() as u32;
        let height = src.height() as u32;
        let device = &self.gpu.device;

        // --- Input texture: u8 pixels widened to f32, stride compacted ---
        let bytes_per_pixel: u32 = 4;
        let aligned_bytes_per_row =
            align_to(width * bytes_per_pixel, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let mut staging = vec![0u8; (aligned_bytes_per_row * height) as usize];
        let src_data = src.as_slice();
        let src_stride = src.stride();
        for y in 0..height as usize {
            let src_row_start = y * src_stride;
            let dst_row_byte_start = y * aligned_bytes_per_row as usize;
            for x in 0..width as usize {
                let v = src_data[src_row_start + x] as f32;
                let off = dst_row_byte_start + x * 4;
                staging[off..off + 4].copy_from_slice(&v.to_le_bytes());
            }
        }

        let input_tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("GpuBlur input"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let output_tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("GpuBlur output"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R32Float,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let staging_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("GpuBlur staging"),
            contents: &staging,
            usage: wgpu::BufferUsages::COPY_SRC,
        });

        let params = BlurParams { width, height };
        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("BlurParams"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let input_view = input_tex.create_view(&wgpu::TextureViewDescriptor::default());
        let output_view = output_tex.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("GpuBlur bind group"),
            layout: &self.bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&input_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&output_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });

        // --- Readback buffer (row-aligned, padding stripped after map) ---
        let readback_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("GpuBlur readback"),
            size: (aligned_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // --- Encode upload, dispatch, and readback in one submission ---
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("GpuBlur::blur_f32"),
        });

        encoder.copy_buffer_to_texture(
            wgpu::ImageCopyBuffer {
                buffer: &staging_buf,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(aligned_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::ImageCopyTexture {
                texture: &input_tex,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("gaussian_blur"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let (dx, dy) = dispatch_size(width, height);
            pass.dispatch_workgroups(dx, dy, 1);
        }

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &output_tex,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback_buf,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(aligned_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );

        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        // --- Map and unpack: block until the GPU round-trip completes ---
        let buf_slice = readback_buf.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buf_slice.map_async(wgpu::MapMode::Read, move |r| {
            tx.send(r).expect("readback channel closed");
        });
        self.gpu.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .expect("readback callback never fired")
            .expect("readback map failed");

        let mapped = buf_slice.get_mapped_range();
        let row_bytes = width as usize * 4;
        let mut dst = Image::<f32>::new(width as usize, height as usize);
        for y in 0..height as usize {
            let src_byte_start = y * aligned_bytes_per_row as usize;
            let row = &mapped[src_byte_start..src_byte_start + row_bytes];
            for x in 0..width as usize {
                let b: [u8; 4] = row[x * 4..x * 4 + 4].try_into().unwrap();
                dst.set(x, y, f32::from_le_bytes(b));
            }
        }
        drop(mapped);
        readback_buf.unmap();

        dst
    }
}

impl Blur for GpuBlur {
    fn blur(&self, src: &Image<u8>) -> Image<u8> {
        quantize(&self.blur_f32(src))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
