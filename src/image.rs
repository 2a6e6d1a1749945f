// image.rs — Runtime-sized grayscale image container, generic over pixel type.
//
// Memory layout: row-major, contiguous buffer with explicit stride.
//
//   data index:  0  1  2  3 [4]  5  6  7  8 [9] 10 11 12 13 [14]
//   pixel:       ■  ■  ■  ■  ·   ■  ■  ■  ■  ·   ■  ■  ■  ■  ·
//   row:         |--- row 0 ---|  |--- row 1 ---|  |--- row 2 ---|
//
// (stride = 5, width = 4: one padding element per row). Stride is measured
// in *elements*, not bytes. Padding exists so rows can start at aligned
// addresses for GPU upload; decoded images use stride == width.
//
// Two pixel types are supported:
//   u8  — decoded images and final output (8-bit intensity).
//   f32 — intermediate precision during convolution. Raw values in
//         [0, 255], NOT normalized to [0, 1].

use std::fmt;

// ---------------------------------------------------------------------------
// Pixel trait
// ---------------------------------------------------------------------------

/// Trait for types that can serve as pixel values in an [`Image`].
///
/// Bounds: `Copy` (trivially copyable), `Default` (zero value for `new`),
/// `Send + Sync + 'static` (images cross thread boundaries freely).
pub trait Pixel: Copy + Default + Send + Sync + PartialOrd + 'static {
    /// Convert to f32 as a raw value (u8 42 → 42.0, not 42/255).
    fn to_f32(self) -> f32;
}

impl Pixel for u8 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }
}

impl Pixel for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
}

// ---------------------------------------------------------------------------
// Image<T>
// ---------------------------------------------------------------------------

/// A 2D grayscale image with runtime dimensions, generic over pixel type.
pub struct Image<T: Pixel> {
    /// Pixel data in row-major order. Length = height * stride.
    data: Vec<T>,
    width: usize,
    height: usize,
    /// Row stride in elements (not bytes). stride >= width.
    /// Pixels for row y start at index y * stride.
    stride: usize,
}

// Clone is implemented manually rather than derived to document that this
// is a deep copy of heap data, not a cheap handle copy.
impl<T: Pixel> Clone for Image<T> {
    fn clone(&self) -> Self {
        Image {
            data: self.data.clone(),
            width: self.width,
            height: self.height,
            stride: self.stride,
        }
    }
}

impl<T: Pixel> Image<T> {
    // --- Constructors ---

    /// Create a zero-initialized image. Stride equals width (no padding).
    pub fn new(width: usize, height: usize) -> Self {
        Self::new_with_stride(width, height, width)
    }

    /// Create a zero-initialized image with an explicit stride.
    ///
    /// # Panics
    /// Panics if `stride < width`.
    pub fn new_with_stride(width: usize, height: usize, stride: usize) -> Self {
        assert!(stride >= width, "stride ({stride}) must be >= width ({width})");
        Image {
            data: vec![T::default(); height * stride],
            width,
            height,
            stride,
        }
    }

    /// Create an image from an existing pixel vector with no stride padding.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length ({}) must equal width * height ({})",
            data.len(),
            width * height,
        );
        Image { data, width, height, stride: width }
    }

    /// Create an image from raw data with explicit stride.
    ///
    /// # Panics
    /// Panics if `data.len() != height * stride` or `stride < width`.
    pub fn from_vec_with_stride(
        width: usize,
        height: usize,
        stride: usize,
        data: Vec<T>,
    ) -> Self {
        assert!(stride >= width, "stride ({stride}) must be >= width ({width})");
        assert_eq!(
            data.len(),
            height * stride,
            "data length ({}) must equal height * stride ({})",
            data.len(),
            height * stride,
        );
        Image { data, width, height, stride }
    }

    // --- Accessors ---

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Get the pixel value at (x, y). x is column, y is row.
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.bounds_check(x, y);
        self.data[y * self.stride + x]
    }

    /// Set the pixel value at (x, y).
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.bounds_check(x, y);
        self.data[y * self.stride + x] = value;
    }

    /// Get a pixel value without bounds checking.
    ///
    /// # Safety
    /// Caller must guarantee x < width and y < height. Used in the
    /// convolution inner loop where bounds are validated at loop level —
    /// the same contract a GPU work-item has after its guard check.
    #[inline(always)]
    pub unsafe fn get_unchecked(&self, x: usize, y: usize) -> T {
        debug_assert!(
            x < self.width && y < self.height,
            "get_unchecked({x},{y}) out of bounds for {}x{}",
            self.width,
            self.height
        );
        *self.data.get_unchecked(y * self.stride + x)
    }

    /// Set a pixel value without bounds checking.
    ///
    /// # Safety
    /// Caller must guarantee x < width and y < height.
    #[inline(always)]
    pub unsafe fn set_unchecked(&mut self, x: usize, y: usize, value: T) {
        debug_assert!(
            x < self.width && y < self.height,
            "set_unchecked({x},{y}) out of bounds for {}x{}",
            self.width,
            self.height
        );
        *self.data.get_unchecked_mut(y * self.stride + x) = value;
    }

    /// Raw backing slice, including any stride padding.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Copy the active pixels into a packed vector (stride padding removed).
    ///
    /// Rows are concatenated with length = width * height. If stride
    /// already equals width this is a straight clone of the buffer.
    pub fn to_packed_vec(&self) -> Vec<T> {
        if self.stride == self.width {
            return self.data.clone();
        }
        let mut out = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            let start = y * self.stride;
            out.extend_from_slice(&self.data[start..start + self.width]);
        }
        out
    }

    #[inline]
    fn bounds_check(&self, x: usize, y: usize) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) out of bounds for {}x{} image",
            self.width,
            self.height
        );
    }
}

impl<T: Pixel> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Image {{ {}x{}, stride {} }}",
            self.width, self.height, self.stride
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
