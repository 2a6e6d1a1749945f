// io.rs — Image file decode/encode, delegated to the `image` crate.
//
// The dispatcher only ever needs two operations: read any supported file
// as 8-bit grayscale, and write an Image<u8> as JPEG. Both are thin
// wrappers; format handling, color conversion, and compression all live
// in the `image` crate.

use std::path::Path;

use image::{GrayImage, ImageError};

use crate::image::Image;

/// Decode the file at `path` as a single-channel 8-bit intensity grid.
///
/// Color inputs are converted to luma. Returns `Err` for unreadable,
/// corrupt, or unsupported content — the caller decides whether that is
/// fatal (for the dispatcher it is not; the file is skipped).
pub fn load_grayscale(path: &Path) -> Result<Image<u8>, ImageError> {
    let img = image::open(path)?.to_luma8();
    let (w, h) = img.dimensions();
    Ok(Image::from_vec(w as usize, h as usize, img.into_raw()))
}

/// Encode `img` as JPEG at `path`.
///
/// The output format is selected from the path's extension, so `path`
/// must end in `.jpg` (the dispatcher guarantees this). Stride padding
/// is stripped before encoding.
pub fn save_jpeg(path: &Path, img: &Image<u8>) -> Result<(), ImageError> {
    let w = img.width() as u32;
    let h = img.height() as u32;
    let buf = GrayImage::from_raw(w, h, img.to_packed_vec())
        .expect("packed pixel vector matches image dimensions");
    buf.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("smudge-io-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_round_trip_png() {
        // PNG is lossless, so a save/load cycle must be pixel-exact.
        let dir = scratch_dir("roundtrip");
        let path = dir.join("ramp.png");

        let pixels: Vec<u8> = (0..16 * 8).map(|i| (i % 256) as u8).collect();
        let src = Image::from_vec(16, 8, pixels.clone());
        let buf = GrayImage::from_raw(16, 8, src.to_packed_vec()).unwrap();
        buf.save(&path).unwrap();

        let loaded = load_grayscale(&path).unwrap();
        assert_eq!(loaded.width(), 16);
        assert_eq!(loaded.height(), 8);
        assert_eq!(loaded.to_packed_vec(), pixels);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_save_jpeg_writes_decodable_file() {
        let dir = scratch_dir("jpeg");
        let path = dir.join("flat.jpg");

        let src = Image::from_vec(32, 32, vec![128u8; 32 * 32]);
        save_jpeg(&path, &src).unwrap();

        // JPEG is lossy — just check the file decodes to the right shape
        // and roughly the right intensity.
        let loaded = load_grayscale(&path).unwrap();
        assert_eq!(loaded.width(), 32);
        assert_eq!(loaded.height(), 32);
        let v = loaded.get(16, 16) as i32;
        assert!((v - 128).abs() <= 2, "flat gray should survive JPEG, got {v}");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_zero_byte_file_fails() {
        let dir = scratch_dir("corrupt");
        let path = dir.join("bad.jpg");
        fs::write(&path, b"").unwrap();

        assert!(load_grayscale(&path).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
