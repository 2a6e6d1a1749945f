// gpu/mod.rs — wgpu compute layer.
//
// The CPU implementation in `crate::blur` is the authoritative reference;
// the compute kernel here mirrors it term-for-term and is validated
// against it pixel-for-pixel in tests.
//
// Per-image flow:
//
//   upload u8 → R32Float texture → blur dispatch (16x16 workgroups)
//             → R32Float readback → quantize to u8 on CPU
//
// All device resources for one image (staging buffer, textures, readback
// buffer) are created inside the per-image call and dropped when it
// returns. Only the device handle and the compiled pipeline outlive an
// image.

pub mod blur;
pub mod device;
