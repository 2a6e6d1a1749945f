// gpu/device.rs — wgpu device selection and dispatch geometry.
//
// Responsibilities:
//   - Enumerate adapters and pick real hardware over software rasterizers.
//   - Hold the device/queue pair for the lifetime of the process.
//   - Compute the workgroup grid needed to cover an image.
//
// ADAPTER SELECTION:
// wgpu's default `request_adapter` power-preference heuristics can grab a
// software rasterizer (llvmpipe) when it is the first Vulkan device
// enumerated. We enumerate explicitly and prefer discrete/integrated
// hardware, falling back to whatever exists only as a last resort. The
// chosen adapter is logged at startup so a silent llvmpipe run is at
// least visible.
//
// A compute-capable adapter is a startup requirement: `GpuDevice::new()`
// failing is fatal for the program, not something handled per image.

use std::fmt;

/// Workgroup edge length for the blur dispatch. Each workgroup covers a
/// 16x16 pixel tile; one invocation computes one output pixel.
pub const WORKGROUP_DIM: u32 = 16;

/// Number of workgroups along each axis needed to cover a `img_w` x `img_h`
/// image with [`WORKGROUP_DIM`]-sized tiles.
///
/// Ceiling division: the last workgroup along an axis may hang past the
/// image edge, so the shader must retire invocations with
/// `gid.x >= width || gid.y >= height`.
pub fn dispatch_size(img_w: u32, img_h: u32) -> (u32, u32) {
    let dx = (img_w + WORKGROUP_DIM - 1) / WORKGROUP_DIM;
    let dy = (img_h + WORKGROUP_DIM - 1) / WORKGROUP_DIM;
    (dx, dy)
}

/// Cached adapter information for logging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// The GPU context: adapter, device, queue.
///
/// Create once at startup via [`GpuDevice::new`] and keep it for the whole
/// batch — device initialization is expensive, per-image work is not.
///
/// # Field drop order
/// Rust drops struct fields in declaration order. `_instance` is declared
/// last so the `wgpu::Instance` outlives `device` and `queue`; some Vulkan
/// layers crash if the instance is destroyed while device-level objects
/// still reference it.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    /// Keeps the `wgpu::Instance` alive until `device` and `queue` drop.
    /// Never accessed directly.
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Create a `GpuDevice` on the best available adapter.
    ///
    /// # Errors
    /// Returns `Err` if no adapter is found or the device request fails.
    pub fn new() -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async())
    }

    async fn init_async() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let all_adapters: Vec<wgpu::Adapter> = instance
            .enumerate_adapters(wgpu::Backends::PRIMARY)
            .into_iter()
            .collect();

        if all_adapters.is_empty() {
            return Err(GpuError::NoAdapter);
        }

        for a in &all_adapters {
            let info = a.get_info();
            eprintln!(
                "[smudge] adapter: {} ({:?}, {:?})",
                info.name, info.backend, info.device_type
            );
        }

        // Tier 1: real hardware. Tier 2: anything, including software
        // rasterizers — slow, but the kernel still runs correctly.
        let adapter = all_adapters
            .into_iter()
            .max_by_key(|a| match a.get_info().device_type {
                wgpu::DeviceType::DiscreteGpu => 4,
                wgpu::DeviceType::IntegratedGpu => 3,
                wgpu::DeviceType::VirtualGpu => 2,
                wgpu::DeviceType::Other => 1,
                wgpu::DeviceType::Cpu => 0,
            })
            .ok_or(GpuError::NoAdapter)?;

        let raw_info = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw_info.name,
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("smudge"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceRequest)?;

        Ok(GpuDevice {
            device,
            queue,
            adapter_info,
            _instance: instance,
        })
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ adapter: {}, workgroup: {}x{} }}",
            self.adapter_info, WORKGROUP_DIM, WORKGROUP_DIM
        )
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from GPU device initialization. Both are fatal at startup.
#[derive(Debug)]
pub enum GpuError {
    /// No adapter enumerated at all. Check the graphics driver install.
    NoAdapter,
    /// The device request failed (driver issue, unsupported limits).
    DeviceRequest(wgpu::RequestDeviceError),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::NoAdapter => {
                write!(f, "no compute-capable adapter found (is a GPU driver installed?)")
            }
            GpuError::DeviceRequest(e) => write!(f, "device request failed: {e}"),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::DeviceRequest(e) => Some(e),
            GpuError::NoAdapter => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // dispatch_size is a pure function — these run without a GPU.

    #[test]
    fn test_dispatch_size_exact_multiples() {
        assert_eq!(dispatch_size(640, 480), (40, 30));
        assert_eq!(dispatch_size(16, 16), (1, 1));
    }

    #[test]
    fn test_dispatch_size_rounds_up() {
        // The last workgroup covers pixels past the image edge; the shader
        // guard retires those invocations.
        assert_eq!(dispatch_size(100, 100), (7, 7));
        assert_eq!(dispatch_size(641, 479), (41, 30));
    }

    #[test]
    fn test_dispatch_size_degenerate_strip() {
        // 17x1: two workgroups wide, one tall.
        assert_eq!(dispatch_size(17, 1), (2, 1));
        assert_eq!(dispatch_size(1, 17), (1, 2));
        assert_eq!(dispatch_size(1, 1), (1, 1));
    }

    // ---- GPU integration (subprocess-isolated) -----------------------------
    //
    // Behind #[ignore] so `cargo test` passes on machines without a GPU.
    // Run with `cargo test -- --include-ignored`. The inner test runs in a
    // child process and prints GPU_TEST_OK; the outer wrapper only checks
    // for that token, because some Vulkan layers crash during process exit
    // after a device has been created.

    fn run_gpu_test_in_subprocess(test_name: &str) -> String {
        let output = std::process::Command::new("cargo")
            .args([
                "test", "--lib", "--",
                test_name, "--exact", "--ignored", "--nocapture",
            ])
            .output()
            .unwrap_or_else(|e| panic!("failed to spawn subprocess for {test_name}: {e}"));
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        print!("{stdout}");
        eprint!("{stderr}");
        stdout + &stderr
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_device_init() {
        let gpu = GpuDevice::new().expect("should initialize a GPU device");
        println!("{gpu}");
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "requires a GPU"]
    fn test_device_init() {
        let out = run_gpu_test_in_subprocess("gpu::device::tests::inner_device_init");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }
}
