// Smudge: GPU-accelerated batch Gaussian smoothing for grayscale images.
//
// Applies a fixed 3x3 binomial filter to every image in a directory and
// writes the results as JPEG to an output directory. The per-pixel
// convolution runs on the GPU; everything else is thin I/O glue.
//
// Architecture: the CPU implementation in `blur` is the authoritative
// reference for the filter semantics (including the attenuated-border
// behavior). The wgpu compute kernel in `gpu::blur` is validated against
// it pixel-for-pixel.

pub mod batch;
pub mod blur;
pub mod image;
pub mod io;

pub mod gpu;
