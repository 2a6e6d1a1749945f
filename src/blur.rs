// blur.rs — CPU reference implementation of the 3x3 binomial smoothing filter.
//
// This is the authoritative definition of the filter semantics. The GPU
// kernel in gpu/blur.rs mirrors it term-for-term and is validated against
// it in tests.
//
// BORDER HANDLING: truncated neighborhood, NOT renormalized.
// When the 3x3 window extends past the image boundary, out-of-bounds
// neighbors contribute nothing and the skipped weight is not redistributed.
// A corner pixel therefore sums weights 9/16 < 1 and comes out darker than
// an interior pixel would for the same content. This attenuation is a fixed
// behavior of the filter, preserved deliberately — do not "fix" it by
// clamping or renormalizing.
//
// QUANTIZATION: the f32 result is truncated (not rounded) to u8 on output.

use crate::image::Image;

/// The 3x3 binomial smoothing kernel, weights {1,2,1,2,4,2,1,2,1}/16.
///
/// Indexed `[dy + 1][dx + 1]` for neighbor offsets in [-1, 1]. Weights sum
/// to exactly 1.0 and every weight is a dyadic fraction, so convolution of
/// u8 input is exact in f32 arithmetic (no rounding error anywhere).
///
/// Process-wide immutable constant, shared by the CPU path and (as the
/// same literal values) by the WGSL shader. Never recomputed per image.
pub const KERNEL_3X3: [[f32; 3]; 3] = [
    [1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0],
    [2.0 / 16.0, 4.0 / 16.0, 2.0 / 16.0],
    [1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0],
];

/// Convolve `src` with [`KERNEL_3X3`], producing f32 intermediate values.
///
/// For every output pixel (x, y):
///
///   sum over (dy, dx) in [-1,0,1]^2 of
///       KERNEL_3X3[dy+1][dx+1] * src[y+dy, x+dx]
///
/// restricted to neighbors inside [0, width) x [0, height). Output has the
/// same dimensions as the input; each output cell is written exactly once.
pub fn blur_f32(src: &Image<u8>) -> Image<f32> {
    let w = src.width();
    let h = src.height();
    let mut dst = Image::<f32>::new(w, h);

    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx >= 0 && nx < w as i32 && ny >= 0 && ny < h as i32 {
                        let weight = KERNEL_3X3[(dy + 1) as usize][(dx + 1) as usize];
                        // SAFETY: nx/ny checked against width/height above.
                        let v = unsafe { src.get_unchecked(nx as usize, ny as usize) };
                        acc += v as f32 * weight;
                    }
                }
            }
            dst.set(x, y, acc);
        }
    }
    dst
}

/// Truncate f32 intensities back to u8.
///
/// Truncation, not rounding: 143.9 → 143. Matches the fixed output policy
/// of the filter. Values are clamped to [0, 255] first (`as` already
/// saturates, but the filter output never leaves the range anyway — the
/// kernel weights sum to at most 1).
pub fn quantize(src: &Image<f32>) -> Image<u8> {
    let mut dst = Image::<u8>::new(src.width(), src.height());
    for y in 0..src.height() {
        for x in 0..src.width() {
            dst.set(x, y, src.get(x, y).clamp(0.0, 255.0) as u8);
        }
    }
    dst
}

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// The seam between the batch dispatcher and whatever computes the blur.
///
/// Two implementations exist: [`CpuBlur`] (this module's reference code,
/// used by the dispatcher tests) and `gpu::blur::GpuBlur` (the production
/// compute kernel). Both must produce identical u8 output for the same
/// input.
///
/// The operation is infallible: the CPU path is pure arithmetic, and GPU
/// faults (allocation failure, lost device) surface through wgpu's
/// validation layer and halt the run — there is no per-image recovery
/// from a broken device.
pub trait Blur {
    /// Smooth a grayscale image, returning the quantized u8 result.
    fn blur(&self, src: &Image<u8>) -> Image<u8>;
}

/// CPU backend: [`blur_f32`] + [`quantize`].
pub struct CpuBlur;

impl Blur for CpuBlur {
    fn blur(&self, src: &Image<u8>) -> Image<u8> {
        quantize(&blur_f32(src))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
